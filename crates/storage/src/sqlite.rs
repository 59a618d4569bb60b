use rusqlite::{Connection, OptionalExtension};
use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;

use stonebystone_core::{Cemetery, CemeteryData, ChangeLogEntry, ChangeOp, EntityUuid, CEMETERY_ID};

use crate::error::StorageError;
use crate::traits::{Record, Storage, WriteBatch};

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, StorageError> {
    Ok(rmp_serde::to_vec_named(value)?)
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, StorageError> {
    Ok(rmp_serde::from_slice(bytes)?)
}

fn op_name(op: ChangeOp) -> &'static str {
    match op {
        ChangeOp::Set => "set",
        ChangeOp::Delete => "delete",
    }
}

fn upsert<T: Record>(conn: &Connection, record: &T) -> Result<(), StorageError> {
    conn.execute(
        &format!(
            "INSERT INTO {} (uuid, body) VALUES (?1, ?2)
             ON CONFLICT(uuid) DO UPDATE SET body = excluded.body",
            T::TABLE
        ),
        rusqlite::params![record.uuid().to_string(), encode(record)?],
    )?;
    Ok(())
}

fn insert_new<T: Record>(conn: &Connection, record: &T) -> Result<(), StorageError> {
    let result = conn.execute(
        &format!("INSERT INTO {} (uuid, body) VALUES (?1, ?2)", T::TABLE),
        rusqlite::params![record.uuid().to_string(), encode(record)?],
    );
    match result {
        Ok(_) => Ok(()),
        Err(rusqlite::Error::SqliteFailure(err, _))
            if err.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            Err(StorageError::DuplicateUuid {
                table: T::TABLE,
                uuid: record.uuid().to_string(),
            })
        }
        Err(e) => Err(StorageError::Sqlite(e)),
    }
}

fn write_cemetery(conn: &Connection, cemetery: &Cemetery) -> Result<(), StorageError> {
    conn.execute(
        "INSERT INTO cemetery (key, body) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET body = excluded.body",
        rusqlite::params![CEMETERY_ID, encode(cemetery)?],
    )?;
    Ok(())
}

fn write_change(conn: &Connection, entry: &ChangeLogEntry) -> Result<(), StorageError> {
    conn.execute(
        "INSERT INTO change_log (uuid, op, timestamp, body) VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![
            entry.uuid.to_string(),
            op_name(entry.op),
            entry.timestamp.as_str(),
            encode(entry)?,
        ],
    )?;
    Ok(())
}

pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    pub fn open(path: &str) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        crate::schema::init_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        crate::schema::init_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn count<T: Record>(&self) -> Result<u64, StorageError> {
        let count: i64 = self
            .conn
            .query_row(&format!("SELECT COUNT(*) FROM {}", T::TABLE), [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

impl Storage for SqliteStorage {
    fn get<T: Record>(&self, uuid: EntityUuid) -> Result<Option<T>, StorageError> {
        let body: Option<Vec<u8>> = self
            .conn
            .query_row(
                &format!("SELECT body FROM {} WHERE uuid = ?1", T::TABLE),
                rusqlite::params![uuid.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        body.map(|b| decode(&b)).transpose()
    }

    fn get_all<T: Record>(&self) -> Result<Vec<T>, StorageError> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT body FROM {} ORDER BY rowid", T::TABLE))?;
        let rows = stmt.query_map([], |row| row.get::<_, Vec<u8>>(0))?;

        let mut records = Vec::new();
        for row in rows {
            records.push(decode(&row?)?);
        }
        Ok(records)
    }

    fn put<T: Record>(&mut self, record: &T) -> Result<(), StorageError> {
        upsert(&self.conn, record)
    }

    fn delete<T: Record>(&mut self, uuid: EntityUuid) -> Result<bool, StorageError> {
        let removed = self.conn.execute(
            &format!("DELETE FROM {} WHERE uuid = ?1", T::TABLE),
            rusqlite::params![uuid.to_string()],
        )?;
        Ok(removed > 0)
    }

    fn get_cemetery(&self) -> Result<Option<Cemetery>, StorageError> {
        let body: Option<Vec<u8>> = self
            .conn
            .query_row(
                "SELECT body FROM cemetery WHERE key = ?1",
                rusqlite::params![CEMETERY_ID],
                |row| row.get(0),
            )
            .optional()?;
        body.map(|b| decode(&b)).transpose()
    }

    fn put_cemetery(&mut self, cemetery: &Cemetery) -> Result<(), StorageError> {
        write_cemetery(&self.conn, cemetery)
    }

    fn append_change(&mut self, entry: &ChangeLogEntry) -> Result<(), StorageError> {
        write_change(&self.conn, entry)
    }

    fn change_log(&self) -> Result<Vec<ChangeLogEntry>, StorageError> {
        let mut stmt = self.conn.prepare("SELECT body FROM change_log ORDER BY rowid")?;
        let rows = stmt.query_map([], |row| row.get::<_, Vec<u8>>(0))?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(decode(&row?)?);
        }
        Ok(entries)
    }

    fn write_batch(&mut self, batch: &WriteBatch) -> Result<(), StorageError> {
        let tx = self.conn.transaction()?;

        if let Some(cemetery) = &batch.cemetery {
            write_cemetery(&tx, cemetery)?;
        }
        for grave in &batch.graves {
            upsert(&tx, grave)?;
        }
        for landmark in &batch.landmarks {
            upsert(&tx, landmark)?;
        }
        for road in &batch.roads {
            upsert(&tx, road)?;
        }
        for group in &batch.groups {
            upsert(&tx, group)?;
        }
        for entry in &batch.changes {
            write_change(&tx, entry)?;
        }

        tx.commit()?;
        debug!(records = batch.len(), "wrote batch");
        Ok(())
    }

    fn replace_all(&mut self, data: &CemeteryData) -> Result<(), StorageError> {
        let tx = self.conn.transaction()?;

        tx.execute_batch(
            "DELETE FROM cemetery;
             DELETE FROM graves;
             DELETE FROM landmarks;
             DELETE FROM roads;
             DELETE FROM grave_groups;
             DELETE FROM change_log;",
        )?;

        write_cemetery(&tx, &data.cemetery)?;
        for grave in &data.graves {
            insert_new(&tx, grave)?;
        }
        for landmark in &data.landmarks {
            insert_new(&tx, landmark)?;
        }
        for road in &data.roads {
            insert_new(&tx, road)?;
        }
        for group in &data.groups {
            insert_new(&tx, group)?;
        }
        for entry in &data.change_log {
            write_change(&tx, entry)?;
        }

        tx.commit()?;
        debug!(
            graves = data.graves.len(),
            landmarks = data.landmarks.len(),
            roads = data.roads.len(),
            groups = data.groups.len(),
            changes = data.change_log.len(),
            "replaced dataset"
        );
        Ok(())
    }
}

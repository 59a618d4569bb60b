use serde::Serialize;

use crate::entity::Entity;
use crate::error::CoreError;
use crate::ids::DatasetDigest;
use crate::model::CemeteryData;

fn sorted_by_uuid<T: Entity>(items: &[T]) -> Vec<&T> {
    let mut refs: Vec<&T> = items.iter().collect();
    refs.sort_by_key(|e| e.uuid());
    refs
}

fn feed<T: Serialize + ?Sized>(hasher: &mut blake3::Hasher, value: &T) -> Result<(), CoreError> {
    let bytes = rmp_serde::to_vec_named(value).map_err(|e| CoreError::Serialization(e.to_string()))?;
    hasher.update(&(bytes.len() as u64).to_be_bytes());
    hasher.update(&bytes);
    Ok(())
}

impl CemeteryData {
    /// BLAKE3 over the MessagePack encoding of every collection in uuid
    /// order. Collection order and `schema_version` do not affect it.
    pub fn digest(&self) -> Result<DatasetDigest, CoreError> {
        let mut hasher = blake3::Hasher::new();
        feed(&mut hasher, &self.cemetery)?;
        feed(&mut hasher, &sorted_by_uuid(&self.graves))?;
        feed(&mut hasher, &sorted_by_uuid(&self.landmarks))?;
        feed(&mut hasher, &sorted_by_uuid(&self.roads))?;
        feed(&mut hasher, &sorted_by_uuid(&self.groups))?;

        let mut log: Vec<_> = self.change_log.iter().collect();
        log.sort_by(|a, b| {
            a.timestamp
                .cmp(&b.timestamp)
                .then_with(|| a.uuid.cmp(&b.uuid))
                .then_with(|| (a.op as u8).cmp(&(b.op as u8)))
        });
        feed(&mut hasher, &log)?;

        Ok(DatasetDigest::from_bytes(*hasher.finalize().as_bytes()))
    }
}

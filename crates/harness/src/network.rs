use stonebystone_core::CemeteryData;
use stonebystone_engine::{ConflictResolution, EngineError, MergeConflict, PendingMerge};

use crate::TestPeer;

/// Peers that exchange exported files, as users would by passing them around.
pub struct TestNetwork {
    peers: Vec<TestPeer>,
}

impl Default for TestNetwork {
    fn default() -> Self {
        Self::new()
    }
}

/// Deterministic tie-break used by [`TestNetwork::sync`]: the value written
/// by the lexically greater author wins, so both directions agree.
pub fn prefer_greater_author(conflict: &MergeConflict) -> ConflictResolution {
    if conflict.incoming_modified_by > conflict.local_modified_by {
        ConflictResolution::take_incoming(conflict)
    } else {
        ConflictResolution::keep_local(conflict)
    }
}

impl TestNetwork {
    pub fn new() -> Self {
        Self { peers: Vec::new() }
    }

    pub fn add_peer(&mut self, name: &str) -> Result<usize, EngineError> {
        let peer = TestPeer::new(name)?;
        let index = self.peers.len();
        self.peers.push(peer);
        Ok(index)
    }

    pub fn peer(&self, index: usize) -> &TestPeer {
        &self.peers[index]
    }

    pub fn peer_mut(&mut self, index: usize) -> &mut TestPeer {
        &mut self.peers[index]
    }

    /// `from` exports; `to` validates and analyses the file. Nothing is
    /// written on `to` yet.
    pub fn send(&self, from: usize, to: usize) -> Result<PendingMerge, EngineError> {
        let file = self.peers[from].export()?;
        self.peers[to].editor.import_merge(&file)
    }

    /// Sends and commits, answering each conflict with `resolve`.
    pub fn deliver(
        &mut self,
        from: usize,
        to: usize,
        resolve: impl Fn(&MergeConflict) -> ConflictResolution,
    ) -> Result<CemeteryData, EngineError> {
        let pending = self.send(from, to)?;
        let resolutions: Vec<_> = pending.conflicts().iter().map(resolve).collect();
        self.peers[to].editor.commit_merge(&pending, &resolutions)
    }

    /// Copies `from`'s whole dataset over `to`'s.
    pub fn replace(&mut self, from: usize, to: usize) -> Result<CemeteryData, EngineError> {
        let file = self.peers[from].export()?;
        self.peers[to].editor.import_replace(&file)
    }

    /// Exchanges files both ways so the two peers converge.
    pub fn sync(&mut self, a: usize, b: usize) -> Result<(), EngineError> {
        self.deliver(a, b, prefer_greater_author)?;
        self.deliver(b, a, prefer_greater_author)?;
        Ok(())
    }
}

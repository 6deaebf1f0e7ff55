use super::membership::{MembershipSnapshot, PeerAddress};
use crate::error::{PaperboyError, Result};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Round-robin peer selection over a membership snapshot.
///
/// The cursor is shared across all selection call sites. A selection reads
/// the snapshot reference exactly once and computes modulo against that
/// reference's length, so a concurrent snapshot swap cannot yield an index
/// computed against one length and applied to a shorter list.
pub struct RoundRobin {
    cursor: AtomicUsize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self {
            cursor: AtomicUsize::new(0),
        }
    }

    pub fn next(&self, snapshot: &MembershipSnapshot) -> Result<PeerAddress> {
        if snapshot.is_empty() {
            return Err(PaperboyError::NoPeersAvailable);
        }

        let index = self.cursor.fetch_add(1, Ordering::Relaxed) % snapshot.len();
        Ok(snapshot[index].clone())
    }
}

impl Default for RoundRobin {
    fn default() -> Self {
        Self::new()
    }
}

use std::{collections::HashSet, time::Duration};

use tokio::sync::watch;

use super::{Transport, TransferId};

/// Tracks transfers that are in flight so they can be waited on or killed
/// as a group during teardown.
#[derive(Debug)]
pub struct Anchor {
    tx: watch::Sender<HashSet<TransferId>>,
}

impl Anchor {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(HashSet::new());
        Self { tx }
    }

    /// Mark the given transfer as in flight
    pub fn anchor(&self, transfer: TransferId) {
        self.tx.send_modify(|anchored| {
            anchored.insert(transfer);
        });
    }

    /// Release the given transfer. Returns false if it was not anchored.
    pub fn unanchor(&self, transfer: TransferId) -> bool {
        let mut removed = false;
        self.tx.send_modify(|anchored| {
            removed = anchored.remove(&transfer);
        });
        removed
    }

    pub fn is_empty(&self) -> bool {
        self.tx.borrow().is_empty()
    }

    pub fn len(&self) -> usize {
        self.tx.borrow().len()
    }

    /// Wait until no transfer is anchored. Returns false if the timeout
    /// elapsed first.
    pub async fn wait_empty(&self, timeout: Duration) -> bool {
        let mut rx = self.tx.subscribe();
        let result = tokio::time::timeout(timeout, rx.wait_for(|anchored| anchored.is_empty())).await;
        matches!(result, Ok(Ok(_)))
    }

    /// Kill every anchored transfer and clear the anchor
    pub fn kill_anchored(&self, transport: &dyn Transport) {
        let mut killed = Vec::new();
        self.tx.send_modify(|anchored| {
            killed.extend(anchored.drain());
        });
        for transfer in killed {
            log::debug!("Killing transfer {transfer:?}");
            transport.kill(transfer);
        }
    }
}

impl Default for Anchor {
    fn default() -> Self {
        Self::new()
    }
}

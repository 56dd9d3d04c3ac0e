/// Observation taps for broadcast messages
///
/// Lets code outside any hub (the CLI, tests, a recorder) watch every message
/// the app broadcasts, without being a component. A tap whose receiver was
/// dropped is removed on the next publish.
use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;

use super::message::Message;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriberId(u64);

#[derive(Default)]
struct Taps {
    next: u64,
    senders: BTreeMap<SubscriberId, Sender<Arc<Message>>>,
}

#[derive(Default)]
pub struct EventBus {
    taps: Mutex<Taps>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a tap; messages arrive in publish order
    pub fn subscribe(&self) -> (Receiver<Arc<Message>>, SubscriberId) {
        let (tx, rx) = unbounded();
        let mut taps = self.taps.lock();
        taps.next += 1;
        let id = SubscriberId(taps.next);
        taps.senders.insert(id, tx);
        (rx, id)
    }

    pub fn unsubscribe(&self, id: SubscriberId) {
        if self.taps.lock().senders.remove(&id).is_none() {
            tracing::debug!("Tap {:?} was already closed", id);
        }
    }

    pub fn publish(&self, message: &Arc<Message>) {
        self.taps.lock().senders.retain(|id, tx| {
            let open = tx.send(Arc::clone(message)).is_ok();
            if !open {
                tracing::debug!("Tap {:?} closed by its receiver", id);
            }
            open
        });
    }

    pub fn len(&self) -> usize {
        self.taps.lock().senders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

mod dispatcher;
mod linked;
mod store;
mod view;

pub use dispatcher::*;
pub use linked::*;
pub use store::*;
pub use view::*;

use crate::{PrimaryKey, QueueItemData};

/// A snapshot of a room's queue, in play order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Queue {
    pub room_id: PrimaryKey,
    pub items: Vec<QueueItemData>,
}

impl Queue {
    /// The ids of the items, in play order
    pub fn ids(&self) -> Vec<PrimaryKey> {
        self.items.iter().map(|i| i.queue_id).collect()
    }

    pub fn get(&self, queue_id: PrimaryKey) -> Option<&QueueItemData> {
        self.items.iter().find(|i| i.queue_id == queue_id)
    }

    pub fn position(&self, queue_id: PrimaryKey) -> Option<usize> {
        self.items.iter().position(|i| i.queue_id == queue_id)
    }
}

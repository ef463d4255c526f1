use std::collections::HashMap;

use log::warn;

use crate::{PrimaryKey, QueueItemData};

/// Orders queue items by following each item's link to the one before it,
/// starting from the item without a predecessor.
///
/// Items that can't be reached from the head are appended in id order, so a
/// broken link never hides an item from the room.
pub fn order_by_links(items: Vec<QueueItemData>) -> Vec<QueueItemData> {
    let total = items.len();
    let mut by_prev: HashMap<Option<PrimaryKey>, Vec<QueueItemData>> = HashMap::new();

    for item in items {
        by_prev.entry(item.prev_queue_id).or_default().push(item);
    }

    // Lowest id first when several items claim the same predecessor
    for followers in by_prev.values_mut() {
        followers.sort_by_key(|i| std::cmp::Reverse(i.queue_id));
    }

    let mut ordered = Vec::with_capacity(total);
    let mut current = None;

    while let Some(item) = by_prev.get_mut(&current).and_then(|f| f.pop()) {
        current = Some(item.queue_id);
        ordered.push(item);
    }

    if ordered.len() < total {
        let mut unreachable: Vec<_> = by_prev.into_values().flatten().collect();
        unreachable.sort_by_key(|i| i.queue_id);

        warn!(
            "{} queue item(s) are not linked from the head of room {}",
            unreachable.len(),
            unreachable[0].room_id
        );

        ordered.extend(unreachable);
    }

    ordered
}

use crate::{PrimaryKey, Queue, QueueItemData};

/// What the room's player last reported
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlayerStatus {
    /// The item the player is on
    pub queue_id: Option<PrimaryKey>,
    pub is_at_queue_end: bool,
    /// Seconds into the current item
    pub position: f32,
    /// Items the player already went through
    pub history: Vec<PrimaryKey>,
    pub is_errored: bool,
    pub error_message: Option<String>,
}

/// Who is looking at the queue
#[derive(Debug, Clone, Copy)]
pub struct Viewer {
    pub user_id: PrimaryKey,
    pub is_admin: bool,
}

/// How a single queue item should be shown to a viewer
#[derive(Debug, Clone, PartialEq)]
pub struct QueueItemView {
    pub queue_id: PrimaryKey,
    pub is_current: bool,
    pub is_upcoming: bool,
    pub is_played: bool,
    pub is_owner: bool,
    pub is_movable: bool,
    pub is_removable: bool,
    pub is_skippable: bool,
    pub is_errored: bool,
    pub error_message: Option<String>,
    pub pct_played: f32,
    /// Seconds until the item starts, if every item before it has a known duration
    pub wait: Option<f32>,
}

/// Derives the display flags of every visible item, in queue order.
///
/// YouTube items whose video row is gone are hidden.
pub fn derive_views(queue: &Queue, status: &PlayerStatus, viewer: Viewer) -> Vec<QueueItemView> {
    let waits = waits(queue, status);

    queue
        .items
        .iter()
        .zip(waits)
        .filter(|(item, _)| item.youtube_video_id.is_none() || item.youtube_video.is_some())
        .map(|(item, wait)| {
            let is_player_item = status.queue_id == Some(item.queue_id);

            let is_current = is_player_item && !status.is_at_queue_end;
            let is_upcoming = !is_player_item && !status.history.contains(&item.queue_id);
            let is_owner = item.user_id == viewer.user_id;
            let can_manage = is_owner || viewer.is_admin;

            let pct_played = match duration_of(item) {
                Some(duration) if is_current && duration > 0. => status.position / duration * 100.,
                _ => 0.,
            };

            QueueItemView {
                queue_id: item.queue_id,
                is_current,
                is_upcoming,
                is_played: !is_current && !is_upcoming,
                is_owner,
                is_movable: is_upcoming && can_manage,
                is_removable: is_upcoming && can_manage,
                is_skippable: is_current && can_manage,
                is_errored: is_current && status.is_errored,
                error_message: status.error_message.clone().filter(|_| is_current),
                pct_played,
                wait: if is_upcoming { wait } else { None },
            }
        })
        .collect()
}

/// Where "move" puts an item: right after the most recent item of the same
/// user at or before the current one, or after the current item if there is none.
pub fn move_target(queue: &Queue, status: &PlayerStatus, queue_id: PrimaryKey) -> Option<PrimaryKey> {
    let current = status.queue_id?;
    let user_id = queue.get(queue_id)?.user_id;

    let Some(position) = queue.position(current) else {
        return Some(current);
    };

    let last_played = queue.items[..=position]
        .iter()
        .rev()
        .find(|i| i.user_id == user_id)
        .map(|i| i.queue_id);

    Some(last_played.unwrap_or(current))
}

fn duration_of(item: &QueueItemData) -> Option<f32> {
    item.youtube_video.as_ref().map(|v| v.duration)
}

/// Running wait per item, starting from the rest of the current item
fn waits(queue: &Queue, status: &PlayerStatus) -> Vec<Option<f32>> {
    let start = status
        .queue_id
        .and_then(|id| queue.position(id))
        .filter(|_| !status.is_at_queue_end);

    let mut elapsed = Some(0.);

    queue
        .items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            let Some(start) = start else {
                return None;
            };

            if index <= start {
                if index == start {
                    elapsed = duration_of(item).map(|d| (d - status.position).max(0.));
                }

                return None;
            }

            let wait = elapsed;
            elapsed = elapsed.zip(duration_of(item)).map(|(e, d)| e + d);

            wait
        })
        .collect()
}

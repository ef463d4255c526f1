use crate::{
    ArcedDatabase, DatabaseError, MovedQueueItem, NewQueueItem, PrimaryKey, Queue, QueueItemData,
};

use super::order_by_links;

/// Reads and writes the linked queues of rooms
pub struct QueueStore {
    database: ArcedDatabase,
}

impl QueueStore {
    pub fn new(database: &ArcedDatabase) -> Self {
        Self {
            database: database.clone(),
        }
    }

    /// Appends an item at the tail of its room's queue, returning its id
    pub async fn add(&self, new_item: NewQueueItem) -> Result<PrimaryKey, DatabaseError> {
        self.database.append_queue_item(new_item).await
    }

    pub async fn move_item(&self, moved: MovedQueueItem) -> Result<(), DatabaseError> {
        self.database.move_queue_item(moved).await
    }

    pub async fn remove(
        &self,
        room_id: PrimaryKey,
        queue_id: PrimaryKey,
    ) -> Result<(), DatabaseError> {
        self.database.delete_queue_item(room_id, queue_id).await
    }

    /// Returns the item if it's queued in the room
    pub async fn item(
        &self,
        room_id: PrimaryKey,
        queue_id: PrimaryKey,
    ) -> Result<Option<QueueItemData>, DatabaseError> {
        match self.database.queue_item_by_id(room_id, queue_id).await {
            Ok(item) => Ok(Some(item)),
            Err(DatabaseError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn is_owner(
        &self,
        user_id: PrimaryKey,
        queue_id: PrimaryKey,
    ) -> Result<bool, DatabaseError> {
        let owner = self.database.queue_item_owner(queue_id).await?;

        Ok(owner == Some(user_id))
    }

    /// Returns the room's queue in play order
    pub async fn get(&self, room_id: PrimaryKey) -> Result<Queue, DatabaseError> {
        let items = self.database.queue_items(room_id).await?;

        Ok(Queue {
            room_id,
            items: order_by_links(items),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{MemoryDatabase, UserData};

    fn store() -> QueueStore {
        let db = MemoryDatabase::default();
        db.add_user(UserData::mock(1, "Ann"));
        db.add_user(UserData::mock(2, "Bob"));
        db.add_room(1, "R1", None);
        db.add_room(2, "R2", None);

        let database: ArcedDatabase = Arc::new(db);
        QueueStore::new(&database)
    }

    fn song(room_id: PrimaryKey, user_id: PrimaryKey, song_id: PrimaryKey) -> NewQueueItem {
        NewQueueItem {
            room_id,
            user_id,
            song_id: Some(song_id),
            youtube_video_id: None,
        }
    }

    async fn songs(store: &QueueStore, room_id: PrimaryKey) -> Vec<PrimaryKey> {
        store
            .get(room_id)
            .await
            .unwrap()
            .items
            .iter()
            .filter_map(|i| i.song_id)
            .collect()
    }

    fn moved(queue_id: PrimaryKey, prev_queue_id: Option<PrimaryKey>) -> MovedQueueItem {
        MovedQueueItem {
            room_id: 1,
            queue_id,
            prev_queue_id,
        }
    }

    #[tokio::test]
    async fn add_appends_per_room() {
        let store = store();

        store.add(song(1, 1, 10)).await.unwrap();
        store.add(song(2, 1, 99)).await.unwrap();
        store.add(song(1, 2, 20)).await.unwrap();

        assert_eq!(songs(&store, 1).await, vec![10, 20]);
        assert_eq!(songs(&store, 2).await, vec![99]);
    }

    #[tokio::test]
    async fn move_relinks_items() {
        let store = store();
        let a = store.add(song(1, 1, 10)).await.unwrap();
        let b = store.add(song(1, 1, 20)).await.unwrap();
        let c = store.add(song(1, 1, 30)).await.unwrap();

        store.move_item(moved(c, Some(a))).await.unwrap();
        assert_eq!(songs(&store, 1).await, vec![10, 30, 20]);

        store.move_item(moved(b, None)).await.unwrap();
        assert_eq!(songs(&store, 1).await, vec![20, 10, 30]);

        // Already in place
        store.move_item(moved(a, Some(b))).await.unwrap();
        assert_eq!(songs(&store, 1).await, vec![20, 10, 30]);

        // After itself
        store.move_item(moved(c, Some(c))).await.unwrap();
        assert_eq!(songs(&store, 1).await, vec![20, 10, 30]);
    }

    #[tokio::test]
    async fn move_after_missing_item_fails() {
        let store = store();
        let a = store.add(song(1, 1, 10)).await.unwrap();

        let result = store.move_item(moved(a, Some(404))).await;

        assert!(matches!(result, Err(DatabaseError::NotFound { .. })));
        assert_eq!(songs(&store, 1).await, vec![10]);
    }

    #[tokio::test]
    async fn remove_closes_the_gap() {
        let store = store();
        store.add(song(1, 1, 10)).await.unwrap();
        let b = store.add(song(1, 1, 20)).await.unwrap();
        store.add(song(1, 1, 30)).await.unwrap();

        store.remove(1, b).await.unwrap();
        assert_eq!(songs(&store, 1).await, vec![10, 30]);

        // Appending still goes to the tail
        store.add(song(1, 2, 40)).await.unwrap();
        assert_eq!(songs(&store, 1).await, vec![10, 30, 40]);

        // Missing items and items of other rooms are left alone
        store.remove(1, 404).await.unwrap();
        let other = store.add(song(2, 1, 99)).await.unwrap();
        store.remove(1, other).await.unwrap();
        assert_eq!(songs(&store, 2).await, vec![99]);
    }

    #[tokio::test]
    async fn ownership() {
        let store = store();
        let a = store.add(song(1, 1, 10)).await.unwrap();

        assert!(store.is_owner(1, a).await.unwrap());
        assert!(!store.is_owner(2, a).await.unwrap());
        assert!(!store.is_owner(1, 404).await.unwrap());
    }
}

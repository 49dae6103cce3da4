//! The single work queue shared by every worker of a pass.
//!
//! All workers hold clones of the same [`SharedQueue`]; they do not get
//! partitions. Removal happens under a mutex so an item is handed to at
//! most one worker even on the multi-threaded runtime.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use pixelfleet_core::item::WorkItem;

/// Last-in-first-out queue of pending items, cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct SharedQueue {
    items: Arc<Mutex<Vec<WorkItem>>>,
}

impl SharedQueue {
    pub fn new(items: Vec<WorkItem>) -> Self {
        Self {
            items: Arc::new(Mutex::new(items)),
        }
    }

    /// Remove the most recently queued item. Each item is returned by
    /// exactly one call across all clones.
    pub fn pop(&self) -> Option<WorkItem> {
        self.lock().pop()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<WorkItem>> {
        // A panic while holding the lock cannot leave the Vec half-updated.
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    fn items(n: i32) -> Vec<WorkItem> {
        (0..n).map(|i| WorkItem::new(i, -i, 1)).collect()
    }

    #[test]
    fn pop_is_lifo() {
        let queue = SharedQueue::new(items(3));
        assert_eq!(queue.pop(), Some(WorkItem::new(2, -2, 1)));
        assert_eq!(queue.pop(), Some(WorkItem::new(1, -1, 1)));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn empty_queue_pops_none() {
        let queue = SharedQueue::default();
        assert!(queue.is_empty());
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn clones_share_one_collection() {
        let queue = SharedQueue::new(items(2));
        let other = queue.clone();
        other.pop();
        assert_eq!(queue.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_drain_hands_out_every_item_once() {
        const TOTAL: i32 = 10_000;
        let queue = SharedQueue::new(items(TOTAL));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let queue = queue.clone();
                tokio::spawn(async move {
                    let mut taken = Vec::new();
                    while let Some(item) = queue.pop() {
                        taken.push(item);
                        tokio::task::yield_now().await;
                    }
                    taken
                })
            })
            .collect();

        let mut all = Vec::new();
        for handle in handles {
            all.extend(handle.await.unwrap());
        }

        assert_eq!(all.len(), TOTAL as usize);
        let unique: HashSet<_> = all.iter().collect();
        assert_eq!(unique.len(), TOTAL as usize);
        assert!(queue.is_empty());
    }

    #[test]
    fn threads_drain_without_duplicates() {
        let queue = SharedQueue::new(items(5_000));
        let threads: Vec<_> = (0..8)
            .map(|_| {
                let queue = queue.clone();
                std::thread::spawn(move || {
                    let mut taken = 0usize;
                    while queue.pop().is_some() {
                        taken += 1;
                    }
                    taken
                })
            })
            .collect();

        let total: usize = threads.into_iter().map(|t| t.join().unwrap()).sum();
        assert_eq!(total, 5_000);
    }
}

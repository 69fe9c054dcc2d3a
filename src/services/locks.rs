use std::collections::BTreeSet;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Resource a scheduling write must hold exclusively between its checks and its commit.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LockKey {
    Place(String),
    Lecturer(i64),
    Class(i64),
}

type LockTable = DashMap<LockKey, Arc<Mutex<()>>>;

/// Process-wide table of per-key async mutexes. Entries live only while someone holds or
/// waits on them.
pub struct ScheduleLocks {
    locks: Arc<LockTable>,
}

/// Holds every acquired key until dropped, then prunes the entries nobody else wants.
pub struct ScheduleGuard {
    table: Arc<LockTable>,
    keys: Vec<LockKey>,
    guards: Vec<OwnedMutexGuard<()>>,
}

impl ScheduleLocks {
    pub fn new() -> Self {
        Self {
            locks: Arc::new(DashMap::new()),
        }
    }

    fn lock_for(&self, key: LockKey) -> Arc<Mutex<()>> {
        self.locks
            .entry(key)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Locks every key in ascending order, so two writers never wait on each other in a cycle.
    pub async fn acquire(&self, keys: impl IntoIterator<Item = LockKey>) -> ScheduleGuard {
        let keys: BTreeSet<LockKey> = keys.into_iter().collect();
        let mut held = ScheduleGuard {
            table: self.locks.clone(),
            keys: Vec::with_capacity(keys.len()),
            guards: Vec::with_capacity(keys.len()),
        };

        for key in keys {
            let guard = self.lock_for(key.clone()).lock_owned().await;
            held.keys.push(key);
            held.guards.push(guard);
        }

        held
    }
}

impl Drop for ScheduleGuard {
    fn drop(&mut self) {
        self.guards.clear();
        for key in &self.keys {
            // Only the table's own handle left: no holder and no waiter.
            self.table
                .remove_if(key, |_, lock| Arc::strong_count(lock) == 1);
        }
    }
}

impl Default for ScheduleLocks {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_key_is_exclusive() {
        let locks = ScheduleLocks::new();
        let guard = locks.acquire([LockKey::Place("Room A".into())]).await;

        let blocked = tokio::time::timeout(
            Duration::from_millis(50),
            locks.acquire([LockKey::Place("Room A".into())]),
        )
        .await;
        assert!(blocked.is_err());

        drop(guard);
        let reacquired = tokio::time::timeout(
            Duration::from_millis(50),
            locks.acquire([LockKey::Place("Room A".into())]),
        )
        .await;
        assert!(reacquired.is_ok());
    }

    #[tokio::test]
    async fn test_disjoint_keys_do_not_block() {
        let locks = ScheduleLocks::new();
        let _a = locks
            .acquire([LockKey::Place("Room A".into()), LockKey::Lecturer(1)])
            .await;

        let other = tokio::time::timeout(
            Duration::from_millis(50),
            locks.acquire([LockKey::Place("Room B".into()), LockKey::Lecturer(2), LockKey::Class(7)]),
        )
        .await;
        assert!(other.is_ok());
    }

    #[tokio::test]
    async fn test_released_keys_leave_the_table() {
        let locks = ScheduleLocks::new();
        let guard = locks
            .acquire([LockKey::Place("Room A".into()), LockKey::Lecturer(1)])
            .await;
        assert_eq!(locks.locks.len(), 2);

        drop(guard);
        assert!(locks.locks.is_empty());

        let pending = tokio::time::timeout(
            Duration::from_millis(50),
            locks.acquire([LockKey::Place("Room B".into())]),
        )
        .await
        .unwrap();
        drop(pending);
        assert!(locks.locks.is_empty());
    }

    #[tokio::test]
    async fn test_waited_on_keys_stay_in_the_table() {
        let locks = Arc::new(ScheduleLocks::new());
        let first = locks.acquire([LockKey::Class(1)]).await;

        let waiter = tokio::spawn({
            let locks = locks.clone();
            async move {
                let _second = locks.acquire([LockKey::Class(1)]).await;
            }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;

        drop(first);
        waiter.await.unwrap();
        assert!(locks.locks.is_empty());

        let third = locks.acquire([LockKey::Class(1)]).await;
        let waiting = locks.lock_for(LockKey::Class(1));
        drop(third);
        assert_eq!(locks.locks.len(), 1);
        drop(waiting);
    }

    #[tokio::test]
    async fn test_duplicate_keys_are_taken_once() {
        let locks = ScheduleLocks::new();
        let guard = tokio::time::timeout(
            Duration::from_millis(50),
            locks.acquire([LockKey::Class(3), LockKey::Class(3)]),
        )
        .await;
        assert!(guard.is_ok());
    }
}

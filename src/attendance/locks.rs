use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::model::attendance::SessionKey;

/// Serializes read-decide-write per (person, center, day) inside this process.
///
/// Entries only leave the registry after `idle` without use, never for size,
/// so a mutex is not dropped while its holder is mid-request. Other processes
/// are only kept in line by the store's conditional close; two processes can
/// still both open a session for the same key.
#[derive(Clone)]
pub struct SessionLocks {
    registry: Cache<SessionKey, Arc<Mutex<()>>>,
}

impl SessionLocks {
    pub fn new(idle: Duration) -> Self {
        Self {
            registry: Cache::builder().time_to_idle(idle).build(),
        }
    }

    pub async fn acquire(&self, key: &SessionKey) -> OwnedMutexGuard<()> {
        loop {
            let lock = self
                .registry
                .get_with(key.clone(), async { Arc::new(Mutex::new(())) })
                .await;
            let guard = lock.clone().lock_owned().await;

            // the entry may have expired while we waited and been replaced
            match self.registry.get(key).await {
                Some(current) if Arc::ptr_eq(&current, &lock) => return guard,
                _ => continue,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::attendance::PersonKind;
    use chrono::NaiveDate;

    fn key(person: &str) -> SessionKey {
        SessionKey {
            kind: PersonKind::Teacher,
            person_id: person.into(),
            center_code: "WX01".into(),
            date: NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
        }
    }

    #[actix_web::test]
    async fn same_key_is_exclusive() {
        let locks = SessionLocks::new(Duration::from_secs(60));
        let guard = locks.acquire(&key("T1")).await;

        let lock = locks.registry.get(&key("T1")).await.unwrap();
        assert!(lock.try_lock().is_err());

        drop(guard);
        assert!(lock.try_lock().is_ok());
    }

    #[actix_web::test]
    async fn waiter_relocks_when_the_entry_was_replaced() {
        let locks = SessionLocks::new(Duration::from_secs(60));
        let held = locks.acquire(&key("T1")).await;

        let waiter_key = key("T1");
        let waiter = locks.acquire(&waiter_key);
        let release = async {
            locks.registry.invalidate(&key("T1")).await;
            drop(held);
        };
        let (guard, ()) = futures::join!(waiter, release);

        // the guard belongs to the mutex later callers will find
        let current = locks.registry.get(&key("T1")).await.unwrap();
        assert!(current.try_lock().is_err());
        drop(guard);
        assert!(current.try_lock().is_ok());
    }

    #[actix_web::test]
    async fn different_keys_do_not_block() {
        let locks = SessionLocks::new(Duration::from_secs(60));
        let _a = locks.acquire(&key("T1")).await;
        let _b = locks.acquire(&key("T2")).await;
    }
}

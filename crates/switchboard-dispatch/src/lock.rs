//! Process-wide command lock.
//!
//! Serializes registry mutations against full command turns. A task that
//! already holds the lock and tries to take it again would deadlock, so the
//! lock marks its holder with a task-local flag and rejects same-task
//! re-entry with `DispatchError::CommandLockHeld`. Work the holder spawns
//! onto other tasks is not marked; callers must not wait on such work while
//! it tries to take the lock.

use std::future::Future;

use tokio::sync::Mutex;

use crate::error::DispatchError;

tokio::task_local! {
    static HOLDS_COMMAND_LOCK: bool;
}

/// The single serialization point for registry-mutating operations.
#[derive(Default)]
pub struct CommandLock {
    inner: Mutex<()>,
}

impl CommandLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the current task is running inside `run`.
    pub fn is_held_by_current_task() -> bool {
        HOLDS_COMMAND_LOCK.try_with(|held| *held).unwrap_or(false)
    }

    /// Precondition of every lock-taking operation.
    pub fn must_not_hold_lock() -> Result<(), DispatchError> {
        if Self::is_held_by_current_task() {
            return Err(DispatchError::CommandLockHeld);
        }
        Ok(())
    }

    /// Whether any task currently holds the lock.
    pub fn is_locked(&self) -> bool {
        self.inner.try_lock().is_err()
    }

    /// Run `fut` while holding the lock.
    pub async fn run<F, T>(&self, fut: F) -> Result<T, DispatchError>
    where
        F: Future<Output = Result<T, DispatchError>>,
    {
        Self::must_not_hold_lock()?;
        let _guard = self.inner.lock().await;
        HOLDS_COMMAND_LOCK.scope(true, fut).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_run_returns_inner_result() {
        let lock = CommandLock::new();
        let value = lock.run(async { Ok(7) }).await.unwrap();
        assert_eq!(value, 7);
        assert!(!lock.is_locked());

        let err = lock
            .run(async { Err::<(), _>(DispatchError::NoActiveRequest) })
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::NoActiveRequest));
        assert!(!lock.is_locked());
    }

    #[tokio::test]
    async fn test_reentry_fails_fast() {
        let lock = CommandLock::new();
        let result = lock
            .run(async {
                assert!(CommandLock::is_held_by_current_task());
                assert!(lock.is_locked());
                lock.run(async { Ok(()) }).await
            })
            .await;
        assert!(matches!(result, Err(DispatchError::CommandLockHeld)));
        assert!(!CommandLock::is_held_by_current_task());
    }

    #[tokio::test]
    async fn test_serializes_concurrent_holders() {
        let lock = Arc::new(CommandLock::new());
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));

        let (started_tx, started_rx) = tokio::sync::oneshot::channel();
        let first = {
            let lock = Arc::clone(&lock);
            let order = Arc::clone(&order);
            tokio::spawn(async move {
                lock.run(async {
                    started_tx.send(()).unwrap();
                    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
                    order.lock().unwrap().push("first");
                    Ok(())
                })
                .await
            })
        };

        started_rx.await.unwrap();
        lock.run(async {
            order.lock().unwrap().push("second");
            Ok(())
        })
        .await
        .unwrap();
        first.await.unwrap().unwrap();

        assert_eq!(*order.lock().unwrap(), vec!["first", "second"]);
    }
}

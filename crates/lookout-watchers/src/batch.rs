//! Request-scoped batch context
//!
//! The active batch id lives in a task-local scope wrapped around each inbound
//! request future, so concurrently handled requests never see each other's id.
//! Work spawned onto another task does not inherit the scope; wrap it with
//! [`scope`] again if it should be attributed to the request.

use lookout_domain::BatchId;
use std::future::Future;

tokio::task_local! {
    static CURRENT_BATCH: BatchId;
}

/// Run `fut` with `batch_id` as the active batch
pub async fn scope<F>(batch_id: BatchId, fut: F) -> F::Output
where
    F: Future,
{
    CURRENT_BATCH.scope(batch_id, fut).await
}

/// Run a synchronous closure with `batch_id` as the active batch
pub fn sync_scope<R>(batch_id: BatchId, f: impl FnOnce() -> R) -> R {
    CURRENT_BATCH.sync_scope(batch_id, f)
}

/// Batch id active on the current task, if any
pub fn current() -> Option<BatchId> {
    CURRENT_BATCH.try_with(|id| id.clone()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_no_batch_outside_scope() {
        assert!(current().is_none());
    }

    #[tokio::test]
    async fn test_scope_sets_current() {
        let id = BatchId::from_string("b-1");
        let seen = scope(id.clone(), async { current() }).await;
        assert_eq!(seen, Some(id));
        assert!(current().is_none());
    }

    #[tokio::test]
    async fn test_nested_scope_shadows() {
        let outer = BatchId::from_string("outer");
        let inner = BatchId::from_string("inner");
        let (a, b, c) = scope(outer.clone(), async {
            let a = current();
            let b = scope(inner.clone(), async { current() }).await;
            (a, b, current())
        })
        .await;
        assert_eq!(a, Some(outer.clone()));
        assert_eq!(b, Some(inner));
        assert_eq!(c, Some(outer));
    }

    #[tokio::test]
    async fn test_concurrent_scopes_are_isolated() {
        let first = BatchId::from_string("first");
        let second = BatchId::from_string("second");

        let a = tokio::spawn(scope(first.clone(), async {
            tokio::task::yield_now().await;
            current()
        }));
        let b = tokio::spawn(scope(second.clone(), async {
            tokio::task::yield_now().await;
            current()
        }));

        assert_eq!(a.await.unwrap(), Some(first));
        assert_eq!(b.await.unwrap(), Some(second));
    }

    #[test]
    fn test_sync_scope() {
        let id = BatchId::from_string("sync");
        assert_eq!(sync_scope(id.clone(), current), Some(id));
    }
}

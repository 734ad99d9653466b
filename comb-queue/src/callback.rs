//! Completion-callback adapter for callers that expect `(error, result)`
//! style notifications instead of awaiting the result.

use crate::error::{QueueError, QueueResult};
use std::future::Future;

/// Await `operation`, hand its outcome to `callback`, and return it.
///
/// ```
/// use comb_queue::callback::with_callback;
///
/// # tokio_test::block_on(async {
/// let result = with_callback(async { Ok::<_, comb_queue::QueueError>(7) }, |err, value| {
///     assert!(err.is_none());
///     assert_eq!(value, Some(&7));
/// })
/// .await;
/// assert_eq!(result.unwrap(), 7);
/// # });
/// ```
pub async fn with_callback<T, Fut, F>(operation: Fut, callback: F) -> QueueResult<T>
where
    Fut: Future<Output = QueueResult<T>>,
    F: FnOnce(Option<&QueueError>, Option<&T>),
{
    let result = operation.await;
    match &result {
        Ok(value) => callback(None, Some(value)),
        Err(err) => callback(Some(err), None),
    }
    result
}

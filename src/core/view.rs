//! Live view plumbing - request states, task-backed streams and the
//! switch-to-latest operator the aggregators are built from.

use crate::errors::{Error, Result};
use futures::{Stream, StreamExt, future, stream::BoxStream};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Items buffered between a view task and its consumer.
const SUBSCRIPTION_BUFFER: usize = 16;

/// State of a live view as seen by the presentation layer.
#[derive(Clone, Debug, PartialEq)]
pub enum ViewState<T> {
    /// No data has arrived yet.
    Loading,
    /// Latest snapshot.
    Success(T),
    /// The view failed; the message is meant for display.
    Error(String),
}

impl<T> ViewState<T> {
    /// True while waiting for the first snapshot.
    pub const fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }

    /// True for a snapshot.
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// True for a failure.
    pub const fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    /// Borrows the snapshot, if any.
    pub const fn as_success(&self) -> Option<&T> {
        match self {
            Self::Success(data) => Some(data),
            _ => None,
        }
    }

    /// Takes the snapshot, if any.
    pub fn success(self) -> Option<T> {
        match self {
            Self::Success(data) => Some(data),
            _ => None,
        }
    }

    /// The failure message, if any.
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Error(message) => Some(message),
            _ => None,
        }
    }

    /// Transforms the snapshot, passing `Loading` and `Error` through.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ViewState<U> {
        match self {
            Self::Loading => ViewState::Loading,
            Self::Success(data) => ViewState::Success(f(data)),
            Self::Error(message) => ViewState::Error(message),
        }
    }

    /// `Success` for `Ok`, an `Error` prefixed with `context` for `Err`.
    pub fn from_result(context: &str, result: Result<T>) -> Self {
        match result {
            Ok(data) => Self::Success(data),
            Err(e) => Self::Error(error_message(context, &e)),
        }
    }
}

/// Display message for a failed view: `"{context}: {cause}"`.
pub fn error_message(context: &str, error: &Error) -> String {
    let cause = error.to_string();
    if cause.trim().is_empty() {
        format!("{context}: Unknown error")
    } else {
        format!("{context}: {cause}")
    }
}

/// Stream fed by a background task.
///
/// Dropping the subscription aborts the task, which drops whatever the task
/// owns, including nested subscriptions and change feed receivers.
pub struct Subscription<T> {
    rx: mpsc::Receiver<T>,
    task: JoinHandle<()>,
}

impl<T: Send + 'static> Subscription<T> {
    /// Spawns `producer` with the sending half of the subscription.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn<F, Fut>(producer: F) -> Self
    where
        F: FnOnce(mpsc::Sender<T>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
        let task = tokio::spawn(producer(tx));
        Self { rx, task }
    }

    /// Drives `stream` on a background task.
    pub fn from_stream<S>(stream: S) -> Self
    where
        S: Stream<Item = T> + Send + 'static,
    {
        Self::spawn(move |tx| async move {
            let mut stream = Box::pin(stream);
            while let Some(item) = stream.next().await {
                if tx.send(item).await.is_err() {
                    return;
                }
            }
        })
    }
}

impl<T> Stream for Subscription<T> {
    type Item = T;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        self.get_mut().rx.poll_recv(cx)
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl<T> fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("finished", &self.task.is_finished())
            .finish_non_exhaustive()
    }
}

/// Maps every upstream item to an inner stream and forwards the inner stream
/// of the most recent item only.
///
/// A new upstream item drops the previous inner stream, cancelling any work
/// it still had in flight, so output for an older item can never follow
/// output for a newer one.
pub fn switch_latest<A, B, S, F, I>(upstream: S, f: F) -> Subscription<B>
where
    A: Send + 'static,
    B: Send + 'static,
    S: Stream<Item = A> + Send + 'static,
    F: FnMut(A) -> I + Send + 'static,
    I: Stream<Item = B> + Send + 'static,
{
    spawn_switch(None, upstream, f)
}

/// [`switch_latest`] for views: emits `Loading` first, then whatever the
/// inner stream of the latest upstream item produces.
pub fn live_view<A, T, S, F, I>(upstream: S, f: F) -> Subscription<ViewState<T>>
where
    A: Send + 'static,
    T: Send + 'static,
    S: Stream<Item = A> + Send + 'static,
    F: FnMut(A) -> I + Send + 'static,
    I: Stream<Item = ViewState<T>> + Send + 'static,
{
    spawn_switch(Some(ViewState::Loading), upstream, f)
}

/// A view that reports `Loading` and then a single failure.
pub fn failed_view<T: Send + 'static>(context: &str, error: &Error) -> Subscription<ViewState<T>> {
    Subscription::from_stream(futures::stream::iter([
        ViewState::Loading,
        ViewState::Error(error_message(context, error)),
    ]))
}

/// Inner stream of a view that settles on a single state.
pub fn single<T: Send + 'static>(state: ViewState<T>) -> BoxStream<'static, ViewState<T>> {
    futures::stream::once(future::ready(state)).boxed()
}

fn spawn_switch<A, B, S, F, I>(initial: Option<B>, upstream: S, mut f: F) -> Subscription<B>
where
    A: Send + 'static,
    B: Send + 'static,
    S: Stream<Item = A> + Send + 'static,
    F: FnMut(A) -> I + Send + 'static,
    I: Stream<Item = B> + Send + 'static,
{
    Subscription::spawn(move |tx| async move {
        if let Some(first) = initial {
            if tx.send(first).await.is_err() {
                return;
            }
        }

        let mut upstream = Box::pin(upstream);
        let mut inner: Option<Pin<Box<I>>> = None;
        loop {
            tokio::select! {
                biased;
                item = upstream.next() => match item {
                    Some(item) => inner = Some(Box::pin(f(item))),
                    None => break,
                },
                out = next_inner(&mut inner) => match out {
                    Some(value) => {
                        if tx.send(value).await.is_err() {
                            return;
                        }
                    }
                    None => inner = None,
                },
            }
        }

        // Upstream is done; the last inner stream still gets to finish.
        if let Some(mut rest) = inner {
            while let Some(value) = rest.next().await {
                if tx.send(value).await.is_err() {
                    return;
                }
            }
        }
    })
}

async fn next_inner<I: Stream + Unpin>(inner: &mut Option<I>) -> Option<I::Item> {
    match inner {
        Some(stream) => stream.next().await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::next_item;
    use futures::stream;
    use tokio::sync::oneshot;

    fn channel_stream<T: Send + 'static>(rx: mpsc::Receiver<T>) -> impl Stream<Item = T> {
        stream::unfold(rx, |mut rx| async move { rx.recv().await.map(|item| (item, rx)) })
    }

    #[tokio::test]
    async fn test_switch_latest_drops_stale_inner_work() {
        let (up_tx, up_rx) = mpsc::channel(4);
        let mut out = switch_latest(channel_stream(up_rx), |(n, gate): (u32, oneshot::Receiver<()>)| {
            stream::once(async move {
                let _ = gate.await;
                n
            })
        });

        let (slow_tx, slow_rx) = oneshot::channel();
        let (fast_tx, fast_rx) = oneshot::channel();
        up_tx.send((1, slow_rx)).await.unwrap();
        up_tx.send((2, fast_rx)).await.unwrap();
        fast_tx.send(()).unwrap();

        assert_eq!(next_item(&mut out).await, Some(2));
        // The inner stream for item 1 was dropped together with its gate.
        assert!(slow_tx.send(()).is_err());
    }

    #[tokio::test]
    async fn test_switch_latest_forwards_every_inner_item() {
        let mut out = switch_latest(stream::iter([3_u32]), |n| stream::iter(0..n));
        let mut seen = Vec::new();
        while let Some(item) = next_item(&mut out).await {
            seen.push(item);
        }
        assert_eq!(seen, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_live_view_starts_with_loading() {
        let mut view = live_view(stream::iter([7_u32]), |n| stream::once(async move {
            ViewState::Success(n)
        }));
        assert_eq!(next_item(&mut view).await, Some(ViewState::Loading));
        assert_eq!(next_item(&mut view).await, Some(ViewState::Success(7)));
    }

    #[tokio::test]
    async fn test_dropping_subscription_stops_the_task() {
        let (tx, rx) = oneshot::channel::<()>();
        let sub: Subscription<u8> = Subscription::spawn(move |_out| async move {
            let _keep = tx;
            std::future::pending::<()>().await;
        });
        drop(sub);
        // The task owned `tx`; aborting it closes the oneshot.
        assert!(rx.await.is_err());
    }

    #[test]
    fn test_view_state_helpers() {
        let state: ViewState<Vec<u8>> = ViewState::Success(vec![1]);
        assert!(state.is_success());
        assert_eq!(state.clone().map(|v| v.len()), ViewState::Success(1));
        assert_eq!(state.success(), Some(vec![1]));

        let failed: ViewState<u8> = ViewState::from_result("Error while reading", Err(Error::NotAuthenticated));
        assert_eq!(
            failed.error_message(),
            Some("Error while reading: User is not available.")
        );
        assert!(ViewState::<u8>::Loading.is_loading());
    }
}

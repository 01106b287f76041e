//! Fan-in of per-stage error streams.
//!
//! [`merge`] spawns a single fan-in task that drives one reader per input
//! stream concurrently and owns the merged sender. The merged stream closes
//! only after *every* reader has finished, so a fast-closing input can never
//! close the merged stream while another input still has an error in flight.
//! Since the readers live inside that one task, aborting and awaiting its
//! handle is enough to know no reader is left running.
//!
//! Readers take each event with a deferred acknowledgement and only release
//! the originating stage once the merged consumer has taken the event (or the
//! token was cancelled). A stage that reports an error therefore cannot close
//! its outputs before the orchestrator has the error in hand.
//!
//! Once the token is cancelled readers keep draining their input but stop
//! forwarding, so a late error never blocks its stage.

use crate::{
    StageError,
    handoff::{self, Receiver, Sender},
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Merges `streams` into a single error stream.
///
/// Returns the merged stream and the handle of the fan-in task, which
/// finishes after all readers finished and the merged stream was closed.
/// Events from different inputs arrive in no particular order.
pub fn merge<I>(token: CancellationToken, streams: I) -> (Receiver<StageError>, JoinHandle<()>)
where
    I: IntoIterator<Item = Receiver<StageError>>,
{
    let (merged_tx, merged_rx) = handoff::channel();

    let readers: Vec<_> = streams
        .into_iter()
        .enumerate()
        .map(|(i, stream)| forward_errors(i, token.clone(), stream, merged_tx.clone()))
        .collect();

    let barrier = tokio::spawn(async move {
        #[cfg(feature = "tracing")]
        tracing::trace!("Fan-in waiting on {} readers", readers.len());

        futures::future::join_all(readers).await;
        drop(merged_tx);

        #[cfg(feature = "tracing")]
        tracing::trace!("Fan-in closed");
    });

    (merged_rx, barrier)
}

/// Forwards every event from `input` to `merged` until `input` closes.
async fn forward_errors(
    _reader_id: usize,
    token: CancellationToken,
    mut input: Receiver<StageError>,
    merged: Sender<StageError>,
) {
    while let Some((err, ack)) = input.recv_deferred().await {
        if token.is_cancelled() {
            #[cfg(feature = "tracing")]
            tracing::debug!("Fan-in reader {_reader_id} draining after cancellation: {err}");
        } else {
            tokio::select! {
                biased;
                () = token.cancelled() => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!("Fan-in reader {_reader_id} cancelled while forwarding");
                }
                res = merged.send(err) => {
                    if res.is_err() {
                        #[cfg(feature = "tracing")]
                        tracing::debug!("Fan-in reader {_reader_id}: merged stream closed");
                    }
                }
            }
        }
        ack.ack();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StageKind;
    use futures::FutureExt;

    fn event(stage: StageKind, item: i64) -> StageError {
        StageError::new(stage, Some(item), format!("bad {item}"))
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn merges_events_from_every_input() {
        let token = CancellationToken::new();
        let (a_tx, a_rx) = handoff::channel();
        let (b_tx, b_rx) = handoff::channel();
        let (mut merged, barrier) = merge(token, [a_rx, b_rx]);

        let a = tokio::spawn(async move { a_tx.send(event(StageKind::Transform, 1)).await });
        let b = tokio::spawn(async move { b_tx.send(event(StageKind::Sink, 2)).await });

        let mut received = Vec::new();
        while let Some(err) = merged.recv().await {
            received.push(err);
        }
        received.sort_by_key(|e| e.item);

        assert_eq!(
            received,
            vec![event(StageKind::Transform, 1), event(StageKind::Sink, 2)]
        );
        assert!(a.await.unwrap().is_ok());
        assert!(b.await.unwrap().is_ok());
        barrier.await.unwrap();
    }

    #[tokio::test]
    async fn closes_only_after_every_input_closed() {
        let token = CancellationToken::new();
        let (a_tx, a_rx) = handoff::channel::<StageError>();
        let (b_tx, b_rx) = handoff::channel::<StageError>();
        let (mut merged, barrier) = merge(token, [a_rx, b_rx]);

        drop(a_tx);
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
        assert!(merged.recv().now_or_never().is_none());
        assert!(!barrier.is_finished());

        drop(b_tx);
        assert_eq!(merged.recv().await, None);
        barrier.await.unwrap();
    }

    #[tokio::test]
    async fn closes_with_no_inputs() {
        let token = CancellationToken::new();
        let (mut merged, barrier) = merge(token, Vec::<Receiver<StageError>>::new());

        assert_eq!(merged.recv().await, None);
        barrier.await.unwrap();
    }

    #[tokio::test]
    async fn origin_stays_blocked_until_merged_consumer_takes_event() {
        let token = CancellationToken::new();
        let (tx, rx) = handoff::channel();
        let (mut merged, _barrier) = merge(token, [rx]);

        let origin = tokio::spawn(async move { tx.send(event(StageKind::Transform, 6)).await });
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
        assert!(!origin.is_finished());

        assert_eq!(merged.recv().await, Some(event(StageKind::Transform, 6)));
        assert!(origin.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn aborting_fan_in_releases_every_input() {
        let token = CancellationToken::new();
        let (a_tx, a_rx) = handoff::channel::<StageError>();
        let (b_tx, b_rx) = handoff::channel::<StageError>();
        let (_merged, barrier) = merge(token, [a_rx, b_rx]);

        barrier.abort();
        assert!(barrier.await.unwrap_err().is_cancelled());

        // The readers went down with the fan-in task, dropping their inputs.
        assert!(a_tx.is_closed());
        assert!(b_tx.is_closed());
    }

    #[tokio::test]
    async fn drains_without_forwarding_after_cancellation() {
        let token = CancellationToken::new();
        let (tx, rx) = handoff::channel();
        let (mut merged, barrier) = merge(token.clone(), [rx]);
        token.cancel();

        // The send still completes even though nobody reads the merged side.
        assert!(tx.send(event(StageKind::Sink, 4)).await.is_ok());
        drop(tx);

        assert_eq!(merged.recv().await, None);
        barrier.await.unwrap();
    }
}

use crate::{
    Item, StageError, StageKind, Store,
    handoff::{self, Receiver, Sender},
    stage::spawn_stage,
};
use tokio::{sync::oneshot, task::JoinHandle};
use tokio_util::sync::CancellationToken;

/// Spawns the sink stage reading from `input`.
///
/// Returns the completion signal, the error stream and the stage's task
/// handle. The completion signal only fires when `input` was fully consumed;
/// on cancellation or a store failure its sender is dropped instead.
pub fn persist<S: Store>(
    token: CancellationToken,
    input: Receiver<Item>,
    store: S,
) -> (oneshot::Receiver<()>, Receiver<StageError>, JoinHandle<()>) {
    let (done_tx, done_rx) = oneshot::channel();
    let (err_tx, err_rx) = handoff::channel();
    let handle = spawn_stage("sink", sink_loop(token, input, store, done_tx, err_tx));
    (done_rx, err_rx, handle)
}

/// Persists every item received on `input`, in order.
///
/// An item that has been received is always persisted before the token is
/// checked again. A store failure emits one [`StageError`] and stops the
/// stage without signalling completion.
pub async fn sink_loop<S: Store>(
    token: CancellationToken,
    mut input: Receiver<Item>,
    mut store: S,
    done: oneshot::Sender<()>,
    errors: Sender<StageError>,
) {
    #[cfg(feature = "tracing")]
    tracing::trace!("Sink started");

    loop {
        let item = tokio::select! {
            biased;
            () = token.cancelled() => {
                #[cfg(feature = "tracing")]
                tracing::debug!("Sink cancelled");
                return;
            }
            item = input.recv() => match item {
                Some(item) => item,
                None => break,
            },
        };

        if let Err(e) = store.persist(item) {
            let err = StageError::new(StageKind::Sink, Some(item), e.to_string());

            #[cfg(feature = "tracing")]
            tracing::warn!("Sink failed to persist {item}: {err}");

            tokio::select! {
                biased;
                () = token.cancelled() => {}
                _ = errors.send(err) => {}
            }
            return;
        }

        #[cfg(feature = "tracing")]
        tracing::trace!("Persisted {item}");
    }

    if done.send(()).is_err() {
        #[cfg(feature = "tracing")]
        tracing::debug!("Sink finished but nobody is waiting for completion");
    }

    #[cfg(feature = "tracing")]
    tracing::trace!("Sink stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MemoryStore, PersistError, stage::source::generate};

    #[tokio::test]
    async fn persists_in_order_and_signals_completion() {
        let token = CancellationToken::new();
        let store = MemoryStore::new();
        let (input, _source) = generate(token.clone(), vec![5, 3, 8]);
        let (done, mut errors, handle) = persist(token, input, store.clone());

        assert!(done.await.is_ok());
        assert_eq!(errors.recv().await, None);
        handle.await.unwrap();
        assert_eq!(store.items(), vec![5, 3, 8]);
    }

    #[tokio::test]
    async fn empty_input_still_completes() {
        let token = CancellationToken::new();
        let (input, _source) = generate(token.clone(), Vec::new());
        let (done, _errors, handle) = persist(token, input, MemoryStore::new());

        assert!(done.await.is_ok());
        handle.await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn store_failure_emits_one_error_without_completion() {
        let token = CancellationToken::new();
        let memory = MemoryStore::new();
        let mut inner = memory.clone();
        let store = move |item: Item| {
            if item == 2 {
                return Err(PersistError::Rejected {
                    item,
                    reason: "full".to_string(),
                });
            }
            inner.persist(item)
        };

        let (input, _source) = generate(token.clone(), vec![0, 1, 2, 3]);
        let (done, mut errors, handle) = persist(token, input, store);

        let err = errors.recv().await.unwrap();
        assert_eq!(err.stage, StageKind::Sink);
        assert_eq!(err.item, Some(2));
        assert_eq!(err.to_string(), "sink error: store rejected 2: full");
        assert_eq!(errors.recv().await, None);
        assert!(done.await.is_err());
        handle.await.unwrap();
        assert_eq!(memory.items(), vec![0, 1]);
    }

    #[tokio::test]
    async fn cancellation_skips_completion() {
        let token = CancellationToken::new();
        let store = MemoryStore::new();
        let (input, source) = generate(token.clone(), vec![1, 2, 3]);
        token.cancel();
        let (done, _errors, handle) = persist(token, input, store.clone());

        assert!(done.await.is_err());
        handle.await.unwrap();
        source.await.unwrap();
        assert!(store.items().is_empty());
    }
}

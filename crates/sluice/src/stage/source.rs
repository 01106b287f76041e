use crate::{
    Item,
    handoff::{self, Receiver, Sender},
    stage::spawn_stage,
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Spawns the source stage over `items`.
///
/// Returns the output stream and the stage's task handle. The output closes
/// once every item was taken, or earlier if `token` is cancelled or the
/// consumer goes away.
pub fn generate(token: CancellationToken, items: Vec<Item>) -> (Receiver<Item>, JoinHandle<()>) {
    let (tx, rx) = handoff::channel();
    let handle = spawn_stage("source", source_loop(token, items, tx));
    (rx, handle)
}

/// Emits `items` one at a time, each send waiting for the consumer.
///
/// The source is infallible and has no error stream.
pub async fn source_loop(token: CancellationToken, items: Vec<Item>, tx: Sender<Item>) {
    #[cfg(feature = "tracing")]
    tracing::trace!("Source started with {} items", items.len());

    for item in items {
        if token.is_cancelled() {
            #[cfg(feature = "tracing")]
            tracing::debug!("Source cancelled before {item}");
            break;
        }

        tokio::select! {
            biased;
            () = token.cancelled() => {
                #[cfg(feature = "tracing")]
                tracing::debug!("Source cancelled while sending {item}");
                break;
            }
            res = tx.send(item) => {
                if res.is_err() {
                    #[cfg(feature = "tracing")]
                    tracing::debug!("Source output closed, dropping {item}");
                    break;
                }
            }
        }
    }

    #[cfg(feature = "tracing")]
    tracing::trace!("Source stopped");
}

use crate::{
    Item, Rule, StageError, StageKind,
    handoff::{self, Receiver, Sender},
    stage::spawn_stage,
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Spawns the transform stage reading from `input`.
///
/// Returns the mapped output stream, the error stream and the stage's task
/// handle. Both streams close together when the stage exits.
pub fn transform<R: Rule>(
    token: CancellationToken,
    input: Receiver<Item>,
    rule: R,
) -> (Receiver<Item>, Receiver<StageError>, JoinHandle<()>) {
    let (out_tx, out_rx) = handoff::channel();
    let (err_tx, err_rx) = handoff::channel();
    let handle = spawn_stage(
        "transform",
        transform_loop(token, input, rule, out_tx, err_tx),
    );
    (out_rx, err_rx, handle)
}

/// Applies `rule` to every item received on `input` and forwards the result.
///
/// # Behavior
///
/// - Stops without output or error as soon as `token` is observed cancelled.
/// - A rejected item produces exactly one [`StageError`] on `errors`, after
///   which nothing else is consumed.
/// - Stops when `input` closes or the downstream consumer goes away.
pub async fn transform_loop<R: Rule>(
    token: CancellationToken,
    mut input: Receiver<Item>,
    rule: R,
    out: Sender<Item>,
    errors: Sender<StageError>,
) {
    #[cfg(feature = "tracing")]
    tracing::trace!("Transform started");

    loop {
        let item = tokio::select! {
            biased;
            () = token.cancelled() => break,
            item = input.recv() => match item {
                Some(item) => item,
                None => break,
            },
        };

        if token.is_cancelled() {
            break;
        }

        match rule.apply(item) {
            Ok(mapped) => {
                tokio::select! {
                    biased;
                    () = token.cancelled() => break,
                    res = out.send(mapped) => {
                        if res.is_err() {
                            #[cfg(feature = "tracing")]
                            tracing::debug!("Transform output closed, dropping {mapped}");
                            break;
                        }
                    }
                }
            }
            Err(cause) => {
                let err = StageError::new(StageKind::Transform, Some(item), cause);

                #[cfg(feature = "tracing")]
                tracing::warn!("Transform rejected {item}: {err}");

                // The send completes once the error reached its consumer, so
                // the outputs below close only after that.
                tokio::select! {
                    biased;
                    () = token.cancelled() => {}
                    _ = errors.send(err) => {}
                }
                break;
            }
        }
    }

    #[cfg(feature = "tracing")]
    tracing::trace!("Transform stopped");
}

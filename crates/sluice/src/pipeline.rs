//! Wiring and termination logic for a source → transform → sink pipeline.
//!
//! [`Pipeline::run`] spawns the three stages and the error fan-in, then waits
//! for whichever of these happens first:
//!
//! - an error event on the merged error stream → [`Outcome::Failed`],
//! - the sink's completion signal → [`Outcome::Completed`],
//! - the upstream token being cancelled → [`Outcome::Interrupted`].
//!
//! The merged error stream closing on its own only means no further errors
//! are possible; the orchestrator keeps waiting on the other signals.
//!
//! Whatever the outcome, the pipeline token is cancelled before `run`
//! returns, every stage is joined (bounded by the shutdown timeout), and the
//! outcome is logged exactly once.

use crate::{
    Error, Item, PipelineConfig, Result, Rule, SentinelRule, StageError, StageKind, Store,
    config::DEFAULT_SHUTDOWN_TIMEOUT,
    fanin::merge,
    handoff::Receiver,
    stage::{sink::persist, source::generate, transform::transform},
};
use core::{fmt, time::Duration};
use tokio::{sync::oneshot, task::JoinHandle};
use tokio_util::sync::CancellationToken;

/// Terminal result of a pipeline run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// The sink consumed its whole input.
    Completed,
    /// A stage reported a fatal error; every stage was cancelled.
    Failed(StageError),
    /// The upstream token was cancelled before the pipeline finished.
    Interrupted,
}

impl Outcome {
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Completed)
    }

    /// # Errors
    ///
    /// [`Error::Stage`] for a failed run, [`Error::Interrupted`] for an
    /// interrupted one.
    pub fn into_result(self) -> Result<()> {
        match self {
            Self::Completed => Ok(()),
            Self::Failed(err) => Err(Error::Stage(err)),
            Self::Interrupted => Err(Error::Interrupted),
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => write!(f, "successfully finished processing"),
            Self::Failed(err) => write!(f, "pipeline error: {err}"),
            Self::Interrupted => write!(f, "pipeline interrupted"),
        }
    }
}

/// A source → transform → sink pipeline ready to run once.
pub struct Pipeline<R, S> {
    items: Vec<Item>,
    rule: R,
    store: S,
    token: CancellationToken,
    shutdown_timeout: Duration,
}

impl<S: Store> Pipeline<SentinelRule, S> {
    /// Builds a pipeline from a validated [`PipelineConfig`].
    ///
    /// The pipeline's token is a child of `upstream`: cancelling `upstream`
    /// interrupts the pipeline, while a stage failure only cancels the
    /// pipeline's own token.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if the config does not validate.
    pub fn from_config(
        config: PipelineConfig,
        store: S,
        upstream: &CancellationToken,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self::new(config.items, config.rule, store, upstream)
            .with_shutdown_timeout(config.shutdown_timeout))
    }
}

impl<R: Rule, S: Store> Pipeline<R, S> {
    pub fn new(items: Vec<Item>, rule: R, store: S, upstream: &CancellationToken) -> Self {
        Self {
            items,
            rule,
            store,
            token: upstream.child_token(),
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }

    #[must_use]
    pub const fn with_shutdown_timeout(mut self, shutdown_timeout: Duration) -> Self {
        self.shutdown_timeout = shutdown_timeout;
        self
    }

    /// The token shared by every stage of this pipeline.
    pub const fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Runs the pipeline to its terminal [`Outcome`].
    ///
    /// The pipeline token is cancelled on every exit path, including this
    /// future being dropped before completion.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, fields(items = self.items.len())))]
    pub async fn run(self) -> Outcome {
        let Self {
            items,
            rule,
            store,
            token,
            shutdown_timeout,
        } = self;
        let _cancel_on_exit = token.clone().drop_guard();

        let (source_out, source_task) = generate(token.clone(), items);
        let (transform_out, transform_errors, transform_task) =
            transform(token.clone(), source_out, rule);
        let (mut done, sink_errors, sink_task) = persist(token.clone(), transform_out, store);
        let (mut errors, fanin_task) = merge(token.clone(), [transform_errors, sink_errors]);

        let outcome = wait_for_outcome(&token, &mut errors, &mut done).await;

        #[cfg(feature = "tracing")]
        tracing::debug!("Cancelling pipeline");
        token.cancel();
        drop(errors);
        drop(done);

        join_stages(
            shutdown_timeout,
            [
                ("source", source_task),
                ("transform", transform_task),
                ("sink", sink_task),
                ("fan-in", fanin_task),
            ],
        )
        .await;

        report(&outcome);
        outcome
    }
}

/// Waits for the first terminal signal. The first ready signal wins.
async fn wait_for_outcome(
    token: &CancellationToken,
    errors: &mut Receiver<StageError>,
    done: &mut oneshot::Receiver<()>,
) -> Outcome {
    let mut errors_open = true;

    loop {
        tokio::select! {
            event = errors.recv(), if errors_open => match event {
                Some(err) => return Outcome::Failed(err),
                None => {
                    #[cfg(feature = "tracing")]
                    tracing::trace!("Error streams closed, no further errors possible");
                    errors_open = false;
                }
            },
            signal = &mut *done => {
                return match signal {
                    Ok(()) => Outcome::Completed,
                    Err(_) if token.is_cancelled() => Outcome::Interrupted,
                    // The sink went away without an error event (e.g. it
                    // panicked).
                    Err(_) => Outcome::Failed(StageError::new(
                        StageKind::Sink,
                        None,
                        "stage exited without signalling completion",
                    )),
                };
            }
            () = token.cancelled() => return Outcome::Interrupted,
        }
    }
}

/// Waits for every stage task, aborting any that outlives `limit`.
///
/// Returns only once every task has finished, aborted or not.
async fn join_stages<const N: usize>(limit: Duration, stages: [(&'static str, JoinHandle<()>); N]) {
    let waits = stages.into_iter().map(|(_name, mut handle)| async move {
        match tokio::time::timeout(limit, &mut handle).await {
            Ok(Ok(())) => {
                #[cfg(feature = "tracing")]
                tracing::trace!("Stage {_name} exited");
            }
            Ok(Err(_e)) => {
                #[cfg(feature = "tracing")]
                tracing::error!("Stage {_name} failed: {_e}");
            }
            Err(_) => {
                #[cfg(feature = "tracing")]
                tracing::warn!("Stage {_name} did not exit within {limit:?}, aborting");
                handle.abort();
                // Abort only lands at the task's next await point; a stage
                // stuck in a blocking call is still running until then.
                match handle.await {
                    Err(_e) if _e.is_panic() => {
                        #[cfg(feature = "tracing")]
                        tracing::error!("Stage {_name} failed: {_e}");
                    }
                    _ => {
                        #[cfg(feature = "tracing")]
                        tracing::debug!("Stage {_name} aborted");
                    }
                }
            }
        }
    });

    futures::future::join_all(waits).await;
}

fn report(_outcome: &Outcome) {
    #[cfg(feature = "tracing")]
    match _outcome {
        Outcome::Completed => tracing::info!("{_outcome}"),
        Outcome::Failed(_) => tracing::error!("{_outcome}"),
        Outcome::Interrupted => tracing::warn!("{_outcome}"),
    }
}

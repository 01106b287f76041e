//! The three pipeline stages.
//!
//! Each stage runs as its own Tokio task, reads from at most one rendezvous
//! channel and owns the channels it writes. Every stage:
//!
//! - checks the shared [`CancellationToken`](tokio_util::sync::CancellationToken)
//!   before each unit of work and races it against every blocking send or
//!   receive,
//! - closes everything it owns on every exit path by dropping it,
//! - emits at most one error event, then stops.
//!
//! ## Structure
//!
//! - [`source`] - emits the configured items in order.
//! - [`transform`] - validates and maps items through a [`Rule`](crate::Rule).
//! - [`sink`] - persists items through a [`Store`](crate::Store) and signals
//!   completion.

pub mod sink;
pub mod source;
pub mod transform;

use core::future::Future;
use tokio::task::JoinHandle;

/// Spawns a stage future, wrapped in a span when tracing is enabled.
pub(crate) fn spawn_stage<F>(_name: &'static str, fut: F) -> JoinHandle<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    #[cfg(feature = "tracing")]
    let fut = {
        use tracing::Instrument;
        fut.instrument(tracing::debug_span!("stage", name = _name))
    };

    tokio::spawn(fut)
}

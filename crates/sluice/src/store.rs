//! Persistence seam used by the sink stage.
//!
//! The sink calls [`Store::persist`] once per item, in the order items arrive.
//! A successful call is the pipeline's observable "persisted" record; a failed
//! call becomes the sink's error event.

use crate::{Item, PersistError};
use parking_lot::Mutex;
use std::{
    io::{self, Write},
    sync::Arc,
};

/// Side-effecting destination for transformed items.
///
/// `persist` is called synchronously on the sink's Tokio task and is expected
/// not to block for long. Cancellation is only observed between calls, so a
/// slow `persist` holds up both the sink and the pipeline's shutdown for as
/// long as it runs.
pub trait Store: Send + 'static {
    fn persist(&mut self, item: Item) -> Result<(), PersistError>;
}

impl<F> Store for F
where
    F: FnMut(Item) -> Result<(), PersistError> + Send + 'static,
{
    fn persist(&mut self, item: Item) -> Result<(), PersistError> {
        self(item)
    }
}

/// Writes one `persisted: <item>` line per item to stdout.
///
/// Each call locks stdout and writes synchronously, which is fine for a
/// terminal or pipe that keeps up but blocks the sink's worker thread if the
/// reader stalls.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutStore;

impl Store for StdoutStore {
    fn persist(&mut self, item: Item) -> Result<(), PersistError> {
        let mut out = io::stdout().lock();
        writeln!(out, "persisted: {item}")?;
        Ok(())
    }
}

/// Keeps every persisted item in memory.
///
/// Clones share the same buffer, so a caller can keep one clone and inspect
/// what the sink wrote after the pipeline returns.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    items: Arc<Mutex<Vec<Item>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of everything persisted so far, in order.
    pub fn items(&self) -> Vec<Item> {
        self.items.lock().clone()
    }
}

impl Store for MemoryStore {
    fn persist(&mut self, item: Item) -> Result<(), PersistError> {
        self.items.lock().push(item);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_clones_share_items() {
        let store = MemoryStore::new();
        let mut writer = store.clone();
        writer.persist(2).unwrap();
        writer.persist(4).unwrap();

        assert_eq!(store.items(), vec![2, 4]);
    }

    #[test]
    fn closures_are_stores() {
        let mut seen = Vec::new();
        let mut store = move |item: Item| {
            if item == 3 {
                return Err(PersistError::Rejected {
                    item,
                    reason: "odd one out".to_string(),
                });
            }
            seen.push(item);
            Ok(())
        };

        assert!(store.persist(1).is_ok());
        assert!(matches!(
            store.persist(3),
            Err(PersistError::Rejected { item: 3, .. })
        ));
    }
}

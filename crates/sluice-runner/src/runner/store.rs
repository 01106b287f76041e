use super::telemetry;
use sluice::{Item, PersistError, Store};

/// Counts successfully persisted items before delegating to `S`.
pub struct MeteredStore<S>(S);

impl<S: Store> MeteredStore<S> {
    pub const fn new(inner: S) -> Self {
        Self(inner)
    }
}

impl<S: Store> Store for MeteredStore<S> {
    fn persist(&mut self, item: Item) -> Result<(), PersistError> {
        self.0.persist(item)?;
        telemetry::increment_items_persisted();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sluice::MemoryStore;

    #[test]
    fn delegates_to_inner_store() {
        let memory = MemoryStore::new();
        let mut store = MeteredStore::new(memory.clone());

        store.persist(4).unwrap();
        store.persist(8).unwrap();

        assert_eq!(memory.items(), vec![4, 8]);
    }

    #[test]
    fn propagates_inner_failure() {
        let mut store = MeteredStore::new(|item: Item| -> Result<(), PersistError> {
            Err(PersistError::Rejected {
                item,
                reason: "read-only".to_string(),
            })
        });

        assert!(matches!(
            store.persist(1),
            Err(PersistError::Rejected { item: 1, .. })
        ));
    }
}

//! Catalog store seam: where finished snapshots are inserted

use serde::Serialize;
use serde_json::Value;
use sqlx::PgPool;

use crate::db::{repository::catalog, NewCatalogDocument};
use crate::error::StoreError;
use crate::models::{CatalogSnapshot, Collection};

fn to_values<T: Serialize>(docs: &[T]) -> Result<Vec<Value>, StoreError> {
    docs.iter()
        .map(|d| serde_json::to_value(d).map_err(StoreError::from))
        .collect()
}

// ============================================================================
// Trait for the catalog store (for testability)
// ============================================================================

#[async_trait::async_trait]
pub trait CatalogStore: Send + Sync {
    /// Insert documents into one collection; returns the number inserted
    async fn insert(&self, collection: Collection, documents: Vec<Value>) -> Result<u64, StoreError>;

    /// Insert a whole snapshot (movies, then series)
    async fn insert_snapshot(&self, snapshot: &CatalogSnapshot) -> Result<u64, StoreError> {
        let movies = to_values(&snapshot.movies)?;
        let series = to_values(&snapshot.series)?;
        let mut inserted = self.insert(Collection::Movies, movies).await?;
        inserted += self.insert(Collection::Series, series).await?;
        Ok(inserted)
    }
}

/// Postgres-backed store; one row per document in `catalog_documents`
#[derive(Clone)]
pub struct PgCatalogStore {
    pool: PgPool,
}

impl PgCatalogStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl CatalogStore for PgCatalogStore {
    async fn insert(&self, collection: Collection, documents: Vec<Value>) -> Result<u64, StoreError> {
        if documents.is_empty() {
            return Ok(0);
        }

        let rows: Vec<_> = documents
            .into_iter()
            .map(|doc| NewCatalogDocument::from_document(collection, doc))
            .collect();

        let mut tx = self.pool.begin().await?;
        let inserted = catalog::insert_documents(&mut tx, &rows).await?;
        tx.commit().await?;

        tracing::info!("Inserted {} documents into {}", inserted, collection);
        Ok(inserted)
    }

    /// Movies and series commit together or not at all
    async fn insert_snapshot(&self, snapshot: &CatalogSnapshot) -> Result<u64, StoreError> {
        let movies: Vec<_> = to_values(&snapshot.movies)?
            .into_iter()
            .map(|doc| NewCatalogDocument::from_document(Collection::Movies, doc))
            .collect();
        let series: Vec<_> = to_values(&snapshot.series)?
            .into_iter()
            .map(|doc| NewCatalogDocument::from_document(Collection::Series, doc))
            .collect();

        let mut tx = self.pool.begin().await?;
        let mut inserted = catalog::insert_documents(&mut tx, &movies).await?;
        inserted += catalog::insert_documents(&mut tx, &series).await?;
        tx.commit().await?;

        tracing::info!(
            "Inserted snapshot: {} movies, {} series",
            movies.len(),
            series.len()
        );
        Ok(inserted)
    }
}

#[cfg(test)]
pub mod memory {
    //! In-memory store for pipeline tests

    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct MemoryCatalogStore {
        inserts: Mutex<Vec<(Collection, Vec<Value>)>>,
        fail: AtomicBool,
    }

    impl MemoryCatalogStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn failing() -> Self {
            let store = Self::default();
            store.set_failing(true);
            store
        }

        pub fn set_failing(&self, fail: bool) {
            self.fail.store(fail, Ordering::SeqCst);
        }

        pub fn inserts(&self) -> Vec<(Collection, Vec<Value>)> {
            self.inserts.lock().unwrap().clone()
        }

        pub fn documents(&self, collection: Collection) -> Vec<Value> {
            self.inserts()
                .into_iter()
                .filter(|(c, _)| *c == collection)
                .flat_map(|(_, docs)| docs)
                .collect()
        }
    }

    #[async_trait::async_trait]
    impl CatalogStore for MemoryCatalogStore {
        async fn insert(&self, collection: Collection, documents: Vec<Value>) -> Result<u64, StoreError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(StoreError::Rejected(format!("{} insert refused", collection)));
            }
            let count = documents.len() as u64;
            self.inserts.lock().unwrap().push((collection, documents));
            Ok(count)
        }
    }
}

//! Database row types for PostgreSQL
//!
//! Catalog documents are stored whole as JSONB, with the collection, name and
//! path lifted into columns for lookups.

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::Collection;

/// Catalog document row from database
#[derive(Debug, Clone, FromRow)]
pub struct CatalogDocumentRow {
    pub id: Uuid,
    pub collection: String,
    pub name: String,
    pub path: String,
    pub document: Value,
    pub created_at: DateTime<Utc>,
}

/// Catalog document for insertion
#[derive(Debug, Clone)]
pub struct NewCatalogDocument {
    pub id: Uuid,
    pub collection: Collection,
    pub name: String,
    pub path: String,
    pub document: Value,
}

impl NewCatalogDocument {
    /// Build a row from a serialized movie or series document
    pub fn from_document(collection: Collection, document: Value) -> Self {
        let field = |key: &str| {
            document
                .get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };

        Self {
            id: Uuid::new_v4(),
            collection,
            name: field("name"),
            path: field("path"),
            document,
        }
    }
}

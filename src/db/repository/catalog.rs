//! Catalog documents repository

use sqlx::{PgPool, Postgres, Transaction};

use crate::db::models::{CatalogDocumentRow, NewCatalogDocument};
use crate::models::Collection;

/// Insert documents inside an open transaction
pub async fn insert_documents(
    tx: &mut Transaction<'_, Postgres>,
    documents: &[NewCatalogDocument],
) -> Result<u64, sqlx::Error> {
    let mut inserted = 0u64;

    for doc in documents {
        let result = sqlx::query(
            r#"
            INSERT INTO catalog_documents (id, collection, name, path, document)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(doc.id)
        .bind(doc.collection.as_str())
        .bind(&doc.name)
        .bind(&doc.path)
        .bind(&doc.document)
        .execute(&mut **tx)
        .await?;

        inserted += result.rows_affected();
    }

    Ok(inserted)
}

/// Documents of one collection, newest first
pub async fn find_by_collection(
    pool: &PgPool,
    collection: Collection,
    limit: i64,
) -> Result<Vec<CatalogDocumentRow>, sqlx::Error> {
    sqlx::query_as::<_, CatalogDocumentRow>(
        r#"
        SELECT id, collection, name, path, document, created_at
        FROM catalog_documents
        WHERE collection = $1
        ORDER BY created_at DESC
        LIMIT $2
        "#,
    )
    .bind(collection.as_str())
    .bind(limit)
    .fetch_all(pool)
    .await
}

/// Count documents per collection
pub async fn count_by_collection(pool: &PgPool, collection: Collection) -> Result<i64, sqlx::Error> {
    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM catalog_documents WHERE collection = $1")
        .bind(collection.as_str())
        .fetch_one(pool)
        .await?;

    Ok(count.0)
}

use sqlx::Executor;

use crate::connection::DbPool;
use crate::repositories::RepositoryError;

/// Slugs of every category in the sample catalog.
pub const SAMPLE_CATEGORY_SLUGS: &[&str] =
    &["electronics", "clothing", "books", "home-kitchen", "sports-outdoors"];

/// Products per category in the sample catalog.
pub const PRODUCTS_PER_CATEGORY: i64 = 3;

/// The sample storefront catalog: five categories with three products each.
///
/// Loading is idempotent; existing rows with the same ids are left untouched.
pub struct SampleCatalog;

impl SampleCatalog {
    pub const SQL: &str = include_str!("../../../config/fixtures/sample_catalog.sql");

    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let categories_before = count(pool, "SELECT COUNT(1) FROM category").await?;
        let products_before = count(pool, "SELECT COUNT(1) FROM product").await?;

        let mut tx = pool.begin().await?;
        tx.execute(sqlx::query(Self::SQL)).await?;
        tx.commit().await?;

        let categories_after = count(pool, "SELECT COUNT(1) FROM category").await?;
        let products_after = count(pool, "SELECT COUNT(1) FROM product").await?;

        Ok(SeedResult {
            categories_inserted: categories_after - categories_before,
            products_inserted: products_after - products_before,
        })
    }

    /// Check that every sample category exists with its full product set.
    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::new();

        for slug in SAMPLE_CATEGORY_SLUGS {
            let product_count: i64 = sqlx::query_scalar(
                "SELECT COUNT(1) FROM product p JOIN category c ON c.id = p.category_id
                 WHERE c.slug = ?1",
            )
            .bind(slug)
            .fetch_one(pool)
            .await?;
            checks.push((*slug, product_count >= PRODUCTS_PER_CATEGORY));
        }

        let unpriced: i64 =
            sqlx::query_scalar("SELECT COUNT(1) FROM product WHERE CAST(price AS REAL) <= 0")
                .fetch_one(pool)
                .await?;
        checks.push(("prices-positive", unpriced == 0));

        let all_present = checks.iter().all(|(_, ok)| *ok);
        Ok(VerificationResult { all_present, checks })
    }
}

async fn count(pool: &DbPool, sql: &'static str) -> Result<i64, RepositoryError> {
    Ok(sqlx::query_scalar(sql).fetch_one(pool).await?)
}

#[derive(Debug)]
pub struct SeedResult {
    pub categories_inserted: i64,
    pub products_inserted: i64,
}

#[derive(Debug)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}

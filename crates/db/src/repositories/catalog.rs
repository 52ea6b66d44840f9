use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{QueryBuilder, Row, Sqlite};

use storefront_core::domain::catalog::{Category, CategoryId, Product, ProductId};
use storefront_core::recommendations::{CatalogSource, SourceError};

use super::{CategoryRepository, ProductRepository, RepositoryError};
use crate::DbPool;

pub(crate) const PRODUCT_COLUMNS: &str =
    "p.id, p.category_id, p.name, p.slug, p.description, p.price, p.quantity, p.created_at";

#[derive(Clone)]
pub struct SqlCatalogStore {
    pool: DbPool,
}

impl SqlCatalogStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    async fn grouped_counts(
        &self,
        sql: &'static str,
    ) -> Result<Vec<(ProductId, u64)>, RepositoryError> {
        let rows = sqlx::query(sql).fetch_all(&self.pool).await?;
        rows.iter()
            .map(|row| {
                let product_id: i64 =
                    row.try_get("product_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
                let count: i64 =
                    row.try_get("count").map_err(|e| RepositoryError::Decode(e.to_string()))?;
                let count = u64::try_from(count)
                    .map_err(|_| RepositoryError::Decode(format!("negative count {count}")))?;
                Ok((ProductId(product_id), count))
            })
            .collect()
    }
}

pub(crate) fn row_to_category(row: &sqlx::sqlite::SqliteRow) -> Result<Category, RepositoryError> {
    let id: i64 = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let name: String = row.try_get("name").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let slug: String = row.try_get("slug").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let description: String =
        row.try_get("description").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(Category { id: CategoryId(id), name, slug, description })
}

pub(crate) fn row_to_product(row: &sqlx::sqlite::SqliteRow) -> Result<Product, RepositoryError> {
    let id: i64 = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let category_id: i64 =
        row.try_get("category_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let name: String = row.try_get("name").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let slug: String = row.try_get("slug").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let description: String =
        row.try_get("description").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let price_str: String =
        row.try_get("price").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let quantity: i64 =
        row.try_get("quantity").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at_str: String =
        row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let price = Decimal::from_str(&price_str)
        .map_err(|e| RepositoryError::Decode(format!("product {id} price `{price_str}`: {e}")))?;
    let quantity = u32::try_from(quantity)
        .map_err(|_| RepositoryError::Decode(format!("product {id} quantity {quantity}")))?;

    Ok(Product {
        id: ProductId(id),
        category_id: CategoryId(category_id),
        name,
        slug,
        description,
        price,
        quantity,
        created_at: parse_timestamp(&created_at_str)?,
    })
}

pub(crate) fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Decode(format!("timestamp `{value}`: {e}")))
}

/// Appends `AND <column> NOT IN (...)` when there is anything to exclude.
fn push_exclusions(builder: &mut QueryBuilder<'_, Sqlite>, column: &str, excluding: &[ProductId]) {
    if excluding.is_empty() {
        return;
    }

    builder.push(" AND ").push(column).push(" NOT IN (");
    let mut separated = builder.separated(", ");
    for product_id in excluding {
        separated.push_bind(product_id.0);
    }
    separated.push_unseparated(")");
}

#[async_trait]
impl CategoryRepository for SqlCatalogStore {
    async fn list_categories(&self) -> Result<Vec<Category>, RepositoryError> {
        let rows = sqlx::query("SELECT id, name, slug, description FROM category ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_category).collect()
    }

    async fn find_category_by_slug(
        &self,
        slug: &str,
    ) -> Result<Option<Category>, RepositoryError> {
        let row = sqlx::query("SELECT id, name, slug, description FROM category WHERE slug = ?")
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_category).transpose()
    }

    async fn save_category(&self, category: Category) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO category (id, name, slug, description)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 name = excluded.name,
                 slug = excluded.slug,
                 description = excluded.description",
        )
        .bind(category.id.0)
        .bind(&category.name)
        .bind(&category.slug)
        .bind(&category.description)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl ProductRepository for SqlCatalogStore {
    async fn find_by_id(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {PRODUCT_COLUMNS} FROM product p WHERE p.id = ?"))
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_product).transpose()
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<Product>, RepositoryError> {
        let row =
            sqlx::query(&format!("SELECT {PRODUCT_COLUMNS} FROM product p WHERE p.slug = ?"))
                .bind(slug)
                .fetch_optional(&self.pool)
                .await?;

        row.as_ref().map(row_to_product).transpose()
    }

    async fn list_by_category(
        &self,
        category_id: CategoryId,
    ) -> Result<Vec<Product>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM product p WHERE p.category_id = ? ORDER BY p.id"
        ))
        .bind(category_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_product).collect()
    }

    async fn save(&self, product: Product) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO product (id, category_id, name, slug, description, price, quantity, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 category_id = excluded.category_id,
                 name = excluded.name,
                 slug = excluded.slug,
                 description = excluded.description,
                 price = excluded.price,
                 quantity = excluded.quantity",
        )
        .bind(product.id.0)
        .bind(product.category_id.0)
        .bind(&product.name)
        .bind(&product.slug)
        .bind(&product.description)
        .bind(product.price.to_string())
        .bind(i64::from(product.quantity))
        .bind(product.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl CatalogSource for SqlCatalogStore {
    async fn find_product(&self, id: ProductId) -> Result<Option<Product>, SourceError> {
        Ok(ProductRepository::find_by_id(self, id).await?)
    }

    async fn products_engaged_with_audience_of(
        &self,
        anchor: ProductId,
        excluding: &[ProductId],
    ) -> Result<Vec<ProductId>, SourceError> {
        // The audience stays inside SQLite; only the anchor and exclusions are bound.
        let mut builder = QueryBuilder::<Sqlite>::new(
            "WITH engagement(user_id, product_id) AS (
                 SELECT user_id, product_id FROM saved_item
                 UNION
                 SELECT c.user_id, ci.product_id FROM cart_item ci JOIN cart c ON c.id = ci.cart_id
             )
             SELECT DISTINCT product_id FROM engagement
             WHERE user_id IN (SELECT user_id FROM engagement WHERE product_id = ",
        );
        builder.push_bind(anchor.0);
        builder.push(")");
        push_exclusions(&mut builder, "product_id", excluding);
        builder.push(" ORDER BY product_id");

        let ids: Vec<i64> = builder
            .build_query_scalar()
            .fetch_all(&self.pool)
            .await
            .map_err(RepositoryError::from)?;
        Ok(ids.into_iter().map(ProductId).collect())
    }

    async fn save_counts(&self) -> Result<Vec<(ProductId, u64)>, SourceError> {
        Ok(self
            .grouped_counts(
                "SELECT product_id, COUNT(*) AS count FROM saved_item GROUP BY product_id",
            )
            .await?)
    }

    async fn cart_counts(&self) -> Result<Vec<(ProductId, u64)>, SourceError> {
        Ok(self
            .grouped_counts(
                "SELECT product_id, COUNT(*) AS count FROM cart_item GROUP BY product_id",
            )
            .await?)
    }

    async fn products_in_category(
        &self,
        category_id: CategoryId,
        excluding: &[ProductId],
    ) -> Result<Vec<ProductId>, SourceError> {
        let mut builder =
            QueryBuilder::<Sqlite>::new("SELECT id FROM product WHERE category_id = ");
        builder.push_bind(category_id.0);
        push_exclusions(&mut builder, "id", excluding);
        builder.push(" ORDER BY id");

        let ids: Vec<i64> = builder
            .build_query_scalar()
            .fetch_all(&self.pool)
            .await
            .map_err(RepositoryError::from)?;
        Ok(ids.into_iter().map(ProductId).collect())
    }

    async fn products_excluding(
        &self,
        excluding: &[ProductId],
    ) -> Result<Vec<ProductId>, SourceError> {
        let mut builder = QueryBuilder::<Sqlite>::new("SELECT id FROM product WHERE 1 = 1");
        push_exclusions(&mut builder, "id", excluding);
        builder.push(" ORDER BY id");

        let ids: Vec<i64> = builder
            .build_query_scalar()
            .fetch_all(&self.pool)
            .await
            .map_err(RepositoryError::from)?;
        Ok(ids.into_iter().map(ProductId).collect())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use storefront_core::domain::catalog::{Category, CategoryId, Product, ProductId};
    use storefront_core::domain::interaction::UserId;
    use storefront_core::recommendations::CatalogSource;

    use super::SqlCatalogStore;
    use crate::repositories::{
        CategoryRepository, InteractionRepository, ProductRepository, SqlInteractionStore,
    };
    use crate::{connect_with_settings, migrations};

    async fn store() -> (SqlCatalogStore, SqlInteractionStore) {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrate");
        (SqlCatalogStore::new(pool.clone()), SqlInteractionStore::new(pool))
    }

    fn product(id: i64, category: i64) -> Product {
        Product {
            id: ProductId(id),
            category_id: CategoryId(category),
            name: format!("Product {id}"),
            slug: format!("product-{id}"),
            description: String::new(),
            price: Decimal::new(1999, 2),
            quantity: 10,
            created_at: Utc::now(),
        }
    }

    async fn seed(catalog: &SqlCatalogStore, category: i64, products: &[i64]) {
        catalog
            .save_category(Category {
                id: CategoryId(category),
                name: format!("Category {category}"),
                slug: format!("category-{category}"),
                description: String::new(),
            })
            .await
            .expect("save category");
        for id in products {
            catalog.save(product(*id, category)).await.expect("save product");
        }
    }

    #[tokio::test]
    async fn product_lookup_by_id_and_slug_decodes_price() {
        let (catalog, _) = store().await;
        seed(&catalog, 1, &[7]).await;

        let by_id = catalog.find_by_id(ProductId(7)).await.expect("find").expect("present");
        let by_slug = catalog.find_by_slug("product-7").await.expect("find").expect("present");

        assert_eq!(by_id.id, by_slug.id);
        assert_eq!(by_id.price, Decimal::new(1999, 2));
        assert!(catalog.find_by_slug("missing").await.expect("find").is_none());
    }

    #[tokio::test]
    async fn category_queries_honor_exclusions_and_order() {
        let (catalog, _) = store().await;
        seed(&catalog, 1, &[9, 3, 5]).await;
        seed(&catalog, 2, &[4]).await;

        let ids = catalog
            .products_in_category(CategoryId(1), &[ProductId(5)])
            .await
            .expect("category products");
        assert_eq!(ids, vec![ProductId(3), ProductId(9)]);

        let rest = catalog.products_excluding(&[ProductId(3), ProductId(9)]).await.expect("rest");
        assert_eq!(rest, vec![ProductId(4), ProductId(5)]);
    }

    #[tokio::test]
    async fn engagement_queries_union_saves_and_cart_lines() {
        let (catalog, interactions) = store().await;
        seed(&catalog, 1, &[1, 2, 3, 4]).await;

        interactions.toggle_saved(UserId(10), ProductId(1)).await.expect("save");
        interactions.toggle_saved(UserId(10), ProductId(2)).await.expect("save");
        interactions.add_to_cart(UserId(11), ProductId(1), 1).await.expect("cart");
        interactions.add_to_cart(UserId(11), ProductId(3), 2).await.expect("cart");

        interactions.toggle_saved(UserId(12), ProductId(4)).await.expect("save");

        let engaged = catalog
            .products_engaged_with_audience_of(ProductId(1), &[ProductId(1)])
            .await
            .expect("engaged");
        assert_eq!(engaged, vec![ProductId(2), ProductId(3)]);

        let narrowed = catalog
            .products_engaged_with_audience_of(ProductId(1), &[ProductId(1), ProductId(2)])
            .await
            .expect("narrowed");
        assert_eq!(narrowed, vec![ProductId(3)]);

        let unseen = catalog
            .products_engaged_with_audience_of(ProductId(2), &[ProductId(2)])
            .await
            .expect("single saver");
        assert_eq!(unseen, vec![ProductId(1)]);
        assert!(catalog
            .products_engaged_with_audience_of(ProductId(3), &[ProductId(1), ProductId(3)])
            .await
            .expect("fully excluded")
            .is_empty());
    }

    #[tokio::test]
    async fn counts_group_by_product() {
        let (catalog, interactions) = store().await;
        seed(&catalog, 1, &[1, 2]).await;

        interactions.toggle_saved(UserId(1), ProductId(2)).await.expect("save");
        interactions.toggle_saved(UserId(2), ProductId(2)).await.expect("save");
        interactions.add_to_cart(UserId(1), ProductId(1), 3).await.expect("cart");

        let mut saves = catalog.save_counts().await.expect("save counts");
        saves.sort();
        assert_eq!(saves, vec![(ProductId(2), 2)]);
        assert_eq!(catalog.cart_counts().await.expect("cart counts"), vec![(ProductId(1), 1)]);
    }
}

use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;

use storefront_core::domain::catalog::{Product, ProductId};
use storefront_core::domain::interaction::{CartLine, SaveToggle, UserId};

use super::catalog::{parse_timestamp, row_to_product, PRODUCT_COLUMNS};
use super::{InteractionRepository, RepositoryError};
use crate::DbPool;

#[derive(Clone)]
pub struct SqlInteractionStore {
    pool: DbPool,
}

impl SqlInteractionStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_cart_line(
    user_id: UserId,
    row: &sqlx::sqlite::SqliteRow,
) -> Result<CartLine, RepositoryError> {
    let product_id: i64 =
        row.try_get("product_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let quantity: i64 =
        row.try_get("quantity").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let added_at_str: String =
        row.try_get("added_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let quantity = u32::try_from(quantity)
        .map_err(|_| RepositoryError::Decode(format!("cart line quantity {quantity}")))?;

    Ok(CartLine {
        user_id,
        product_id: ProductId(product_id),
        quantity,
        added_at: parse_timestamp(&added_at_str)?,
    })
}

#[async_trait]
impl InteractionRepository for SqlInteractionStore {
    async fn toggle_saved(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<SaveToggle, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let removed = sqlx::query("DELETE FROM saved_item WHERE user_id = ? AND product_id = ?")
            .bind(user_id.0)
            .bind(product_id.0)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let outcome = if removed > 0 {
            SaveToggle::Removed
        } else {
            sqlx::query("INSERT INTO saved_item (user_id, product_id, saved_at) VALUES (?, ?, ?)")
                .bind(user_id.0)
                .bind(product_id.0)
                .bind(Utc::now().to_rfc3339())
                .execute(&mut *tx)
                .await?;
            SaveToggle::Saved
        };

        tx.commit().await?;
        Ok(outcome)
    }

    async fn is_saved(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<bool, RepositoryError> {
        let exists: i64 = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM saved_item WHERE user_id = ?1 AND product_id = ?2)",
        )
        .bind(user_id.0)
        .bind(product_id.0)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists == 1)
    }

    async fn saved_products(&self, user_id: UserId) -> Result<Vec<Product>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS}
             FROM product p
             JOIN (
                 SELECT product_id, MAX(saved_at) AS last_saved, MAX(id) AS last_id
                 FROM saved_item WHERE user_id = ? GROUP BY product_id
             ) s ON s.product_id = p.id
             ORDER BY s.last_saved DESC, s.last_id DESC"
        ))
        .bind(user_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_product).collect()
    }

    async fn add_to_cart(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<CartLine, RepositoryError> {
        if quantity == 0 {
            return Err(RepositoryError::InvalidInput(
                "cart quantity must be greater than zero".to_string(),
            ));
        }

        let now = Utc::now().to_rfc3339();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO cart (user_id, created_at) VALUES (?, ?)
             ON CONFLICT(user_id) DO NOTHING",
        )
        .bind(user_id.0)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        let cart_id: i64 = sqlx::query_scalar("SELECT id FROM cart WHERE user_id = ?")
            .bind(user_id.0)
            .fetch_one(&mut *tx)
            .await?;

        sqlx::query(
            "INSERT INTO cart_item (cart_id, product_id, quantity, added_at)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(cart_id, product_id) DO UPDATE SET
                 quantity = MIN(cart_item.quantity + excluded.quantity, ?)",
        )
        .bind(cart_id)
        .bind(product_id.0)
        .bind(i64::from(quantity))
        .bind(&now)
        // Saturate so the stored line always decodes back into a `u32`.
        .bind(i64::from(u32::MAX))
        .execute(&mut *tx)
        .await?;

        let row = sqlx::query(
            "SELECT product_id, quantity, added_at FROM cart_item
             WHERE cart_id = ? AND product_id = ?",
        )
        .bind(cart_id)
        .bind(product_id.0)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        row_to_cart_line(user_id, &row)
    }

    async fn set_cart_quantity(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<bool, RepositoryError> {
        let result = if quantity == 0 {
            sqlx::query(
                "DELETE FROM cart_item
                 WHERE product_id = ? AND cart_id = (SELECT id FROM cart WHERE user_id = ?)",
            )
            .bind(product_id.0)
            .bind(user_id.0)
            .execute(&self.pool)
            .await?
        } else {
            sqlx::query(
                "UPDATE cart_item SET quantity = ?
                 WHERE product_id = ? AND cart_id = (SELECT id FROM cart WHERE user_id = ?)",
            )
            .bind(i64::from(quantity))
            .bind(product_id.0)
            .bind(user_id.0)
            .execute(&self.pool)
            .await?
        };

        Ok(result.rows_affected() > 0)
    }

    async fn cart_lines(&self, user_id: UserId) -> Result<Vec<CartLine>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT ci.product_id, ci.quantity, ci.added_at
             FROM cart_item ci JOIN cart c ON c.id = ci.cart_id
             WHERE c.user_id = ?
             ORDER BY ci.id",
        )
        .bind(user_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(|row| row_to_cart_line(user_id, row)).collect()
    }
}

#[cfg(test)]
mod tests {
    use storefront_core::domain::catalog::ProductId;
    use storefront_core::domain::interaction::{SaveToggle, UserId};

    use super::SqlInteractionStore;
    use crate::fixtures::SampleCatalog;
    use crate::repositories::{InteractionRepository, RepositoryError};
    use crate::{connect_with_settings, migrations};

    async fn store() -> SqlInteractionStore {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrate");
        SampleCatalog::load(&pool).await.expect("load sample catalog");
        SqlInteractionStore::new(pool)
    }

    #[tokio::test]
    async fn toggle_saved_flips_state() {
        let store = store().await;
        let (user, product) = (UserId(1), ProductId(2));

        assert_eq!(store.toggle_saved(user, product).await.expect("save"), SaveToggle::Saved);
        assert!(store.is_saved(user, product).await.expect("is saved"));

        assert_eq!(store.toggle_saved(user, product).await.expect("unsave"), SaveToggle::Removed);
        assert!(!store.is_saved(user, product).await.expect("is saved"));
    }

    #[tokio::test]
    async fn saved_products_are_scoped_to_the_user() {
        let store = store().await;

        store.toggle_saved(UserId(1), ProductId(4)).await.expect("save");
        store.toggle_saved(UserId(2), ProductId(5)).await.expect("save");

        let saved = store.saved_products(UserId(1)).await.expect("saved products");
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].slug, "cotton-t-shirt");
    }

    #[tokio::test]
    async fn add_to_cart_increments_existing_line() {
        let store = store().await;
        let user = UserId(3);

        let first = store.add_to_cart(user, ProductId(1), 1).await.expect("add");
        assert_eq!(first.quantity, 1);

        let second = store.add_to_cart(user, ProductId(1), 2).await.expect("add again");
        assert_eq!(second.quantity, 3);

        store.add_to_cart(user, ProductId(7), 1).await.expect("add other");
        let lines = store.cart_lines(user).await.expect("cart lines");
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].product_id, ProductId(1));
    }

    #[tokio::test]
    async fn add_to_cart_saturates_at_the_largest_quantity() {
        let store = store().await;
        let user = UserId(5);

        store.add_to_cart(user, ProductId(2), u32::MAX).await.expect("add max");
        let line = store.add_to_cart(user, ProductId(2), 1).await.expect("add past max");
        assert_eq!(line.quantity, u32::MAX);

        let lines = store.cart_lines(user).await.expect("cart stays readable");
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].quantity, u32::MAX);
    }

    #[tokio::test]
    async fn add_to_cart_rejects_zero_and_unknown_products() {
        let store = store().await;

        let zero = store.add_to_cart(UserId(1), ProductId(1), 0).await;
        assert!(matches!(zero, Err(RepositoryError::InvalidInput(_))));

        let unknown = store.add_to_cart(UserId(1), ProductId(999), 1).await;
        assert!(matches!(unknown, Err(RepositoryError::Database(_))));
        assert!(store.cart_lines(UserId(1)).await.expect("cart lines").is_empty());
    }

    #[tokio::test]
    async fn set_cart_quantity_updates_or_removes() {
        let store = store().await;
        let user = UserId(4);
        store.add_to_cart(user, ProductId(10), 1).await.expect("add");

        assert!(store.set_cart_quantity(user, ProductId(10), 5).await.expect("update"));
        assert_eq!(store.cart_lines(user).await.expect("lines")[0].quantity, 5);

        assert!(store.set_cart_quantity(user, ProductId(10), 0).await.expect("remove"));
        assert!(store.cart_lines(user).await.expect("lines").is_empty());
        assert!(!store.set_cart_quantity(user, ProductId(10), 2).await.expect("missing line"));
    }
}

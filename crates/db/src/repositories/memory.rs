use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use storefront_core::domain::catalog::{Category, CategoryId, Product, ProductId};
use storefront_core::domain::interaction::{CartLine, SaveToggle, SavedItem, UserId};
use storefront_core::recommendations::{CatalogSource, SourceError};

use super::{CategoryRepository, InteractionRepository, ProductRepository, RepositoryError};

/// Catalog and interaction state held in process, for tests and demos.
#[derive(Default)]
pub struct InMemoryStore {
    categories: RwLock<HashMap<CategoryId, Category>>,
    products: RwLock<HashMap<ProductId, Product>>,
    saved: RwLock<Vec<SavedItem>>,
    cart: RwLock<Vec<CartLine>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn sorted_product_ids(&self, keep: impl Fn(&Product) -> bool) -> Vec<ProductId> {
        let products = self.products.read().await;
        let mut ids: Vec<ProductId> =
            products.values().filter(|product| keep(product)).map(|product| product.id).collect();
        ids.sort();
        ids
    }
}

fn count_by_product(product_ids: impl Iterator<Item = ProductId>) -> Vec<(ProductId, u64)> {
    let mut counts: HashMap<ProductId, u64> = HashMap::new();
    for product_id in product_ids {
        *counts.entry(product_id).or_insert(0) += 1;
    }
    counts.into_iter().collect()
}

#[async_trait]
impl CategoryRepository for InMemoryStore {
    async fn list_categories(&self) -> Result<Vec<Category>, RepositoryError> {
        let categories = self.categories.read().await;
        let mut listed: Vec<Category> = categories.values().cloned().collect();
        listed.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(listed)
    }

    async fn find_category_by_slug(
        &self,
        slug: &str,
    ) -> Result<Option<Category>, RepositoryError> {
        let categories = self.categories.read().await;
        Ok(categories.values().find(|category| category.slug == slug).cloned())
    }

    async fn save_category(&self, category: Category) -> Result<(), RepositoryError> {
        let mut categories = self.categories.write().await;
        categories.insert(category.id, category);
        Ok(())
    }
}

#[async_trait]
impl ProductRepository for InMemoryStore {
    async fn find_by_id(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let products = self.products.read().await;
        Ok(products.get(&id).cloned())
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<Product>, RepositoryError> {
        let products = self.products.read().await;
        Ok(products.values().find(|product| product.slug == slug).cloned())
    }

    async fn list_by_category(
        &self,
        category_id: CategoryId,
    ) -> Result<Vec<Product>, RepositoryError> {
        let products = self.products.read().await;
        let mut listed: Vec<Product> = products
            .values()
            .filter(|product| product.category_id == category_id)
            .cloned()
            .collect();
        listed.sort_by_key(|product| product.id);
        Ok(listed)
    }

    async fn save(&self, product: Product) -> Result<(), RepositoryError> {
        let mut products = self.products.write().await;
        products.insert(product.id, product);
        Ok(())
    }
}

#[async_trait]
impl InteractionRepository for InMemoryStore {
    async fn toggle_saved(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<SaveToggle, RepositoryError> {
        let mut saved = self.saved.write().await;
        let before = saved.len();
        saved.retain(|item| !(item.user_id == user_id && item.product_id == product_id));

        if saved.len() < before {
            return Ok(SaveToggle::Removed);
        }

        saved.push(SavedItem { user_id, product_id, saved_at: Utc::now() });
        Ok(SaveToggle::Saved)
    }

    async fn is_saved(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<bool, RepositoryError> {
        let saved = self.saved.read().await;
        Ok(saved.iter().any(|item| item.user_id == user_id && item.product_id == product_id))
    }

    async fn saved_products(&self, user_id: UserId) -> Result<Vec<Product>, RepositoryError> {
        let saved = self.saved.read().await;
        let products = self.products.read().await;

        let mut seen = BTreeSet::new();
        Ok(saved
            .iter()
            .rev()
            .filter(|item| item.user_id == user_id && seen.insert(item.product_id))
            .filter_map(|item| products.get(&item.product_id).cloned())
            .collect())
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
        if !self.products.read().await.contains_key(&product_id) {
            return Err(RepositoryError::InvalidInput(format!("unknown product {product_id}")));
        }

        let mut cart = self.cart.write().await;
        if let Some(line) =
            cart.iter_mut().find(|line| line.user_id == user_id && line.product_id == product_id)
        {
            line.quantity = line.quantity.saturating_add(quantity);
            return Ok(line.clone());
        }

        let line = CartLine { user_id, product_id, quantity, added_at: Utc::now() };
        cart.push(line.clone());
        Ok(line)
    }

    async fn set_cart_quantity(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<bool, RepositoryError> {
        let mut cart = self.cart.write().await;
        let Some(position) =
            cart.iter().position(|line| line.user_id == user_id && line.product_id == product_id)
        else {
            return Ok(false);
        };

        if quantity == 0 {
            cart.remove(position);
        } else {
            cart[position].quantity = quantity;
        }
        Ok(true)
    }

    async fn cart_lines(&self, user_id: UserId) -> Result<Vec<CartLine>, RepositoryError> {
        let cart = self.cart.read().await;
        Ok(cart.iter().filter(|line| line.user_id == user_id).cloned().collect())
    }
}

#[async_trait]
impl CatalogSource for InMemoryStore {
    async fn find_product(&self, id: ProductId) -> Result<Option<Product>, SourceError> {
        Ok(ProductRepository::find_by_id(self, id).await?)
    }

    async fn products_engaged_with_audience_of(
        &self,
        anchor: ProductId,
        excluding: &[ProductId],
    ) -> Result<Vec<ProductId>, SourceError> {
        let saved = self.saved.read().await;
        let cart = self.cart.read().await;

        let engagement = || {
            saved
                .iter()
                .map(|item| (item.user_id, item.product_id))
                .chain(cart.iter().map(|line| (line.user_id, line.product_id)))
        };
        let audience: BTreeSet<UserId> =
            engagement().filter(|(_, product_id)| *product_id == anchor).map(|(u, _)| u).collect();

        let engaged: BTreeSet<ProductId> = engagement()
            .filter(|(user_id, product_id)| {
                audience.contains(user_id) && !excluding.contains(product_id)
            })
            .map(|(_, product_id)| product_id)
            .collect();
        Ok(engaged.into_iter().collect())
    }

    async fn save_counts(&self) -> Result<Vec<(ProductId, u64)>, SourceError> {
        let saved = self.saved.read().await;
        Ok(count_by_product(saved.iter().map(|item| item.product_id)))
    }

    async fn cart_counts(&self) -> Result<Vec<(ProductId, u64)>, SourceError> {
        let cart = self.cart.read().await;
        Ok(count_by_product(cart.iter().map(|line| line.product_id)))
    }

    async fn products_in_category(
        &self,
        category_id: CategoryId,
        excluding: &[ProductId],
    ) -> Result<Vec<ProductId>, SourceError> {
        Ok(self
            .sorted_product_ids(|product| {
                product.category_id == category_id && !excluding.contains(&product.id)
            })
            .await)
    }

    async fn products_excluding(
        &self,
        excluding: &[ProductId],
    ) -> Result<Vec<ProductId>, SourceError> {
        Ok(self.sorted_product_ids(|product| !excluding.contains(&product.id)).await)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use storefront_core::domain::catalog::{CategoryId, Product, ProductId};
    use storefront_core::domain::interaction::{SaveToggle, UserId};
    use storefront_core::recommendations::CatalogSource;

    use super::InMemoryStore;
    use crate::repositories::{InteractionRepository, ProductRepository, RepositoryError};

    fn product(id: i64, category: i64) -> Product {
        Product {
            id: ProductId(id),
            category_id: CategoryId(category),
            name: format!("Product {id}"),
            slug: format!("product-{id}"),
            description: String::new(),
            price: Decimal::new(500, 2),
            quantity: 3,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn in_memory_product_repo_round_trip() {
        let store = InMemoryStore::new();
        let saved = product(1, 1);

        store.save(saved.clone()).await.expect("save product");

        assert_eq!(store.find_by_id(ProductId(1)).await.expect("find"), Some(saved.clone()));
        assert_eq!(store.find_by_slug("product-1").await.expect("find"), Some(saved));
    }

    #[tokio::test]
    async fn toggle_and_cart_behave_like_the_sql_store() {
        let store = InMemoryStore::new();
        store.save(product(1, 1)).await.expect("save product");

        assert_eq!(
            store.toggle_saved(UserId(1), ProductId(1)).await.expect("save"),
            SaveToggle::Saved
        );
        assert_eq!(
            store.toggle_saved(UserId(1), ProductId(1)).await.expect("unsave"),
            SaveToggle::Removed
        );

        store.add_to_cart(UserId(1), ProductId(1), 2).await.expect("add");
        let line = store.add_to_cart(UserId(1), ProductId(1), 1).await.expect("add again");
        assert_eq!(line.quantity, 3);

        let unknown = store.add_to_cart(UserId(1), ProductId(9), 1).await;
        assert!(matches!(unknown, Err(RepositoryError::InvalidInput(_))));

        store.add_to_cart(UserId(2), ProductId(1), u32::MAX).await.expect("add max");
        let line = store.add_to_cart(UserId(2), ProductId(1), 1).await.expect("add past max");
        assert_eq!(line.quantity, u32::MAX);
    }

    #[tokio::test]
    async fn audience_of_an_anchor_spans_saves_and_cart_lines() {
        let store = InMemoryStore::new();
        for id in 1..=4 {
            store.save(product(id, 1)).await.expect("save product");
        }
        store.toggle_saved(UserId(10), ProductId(1)).await.expect("save");
        store.toggle_saved(UserId(10), ProductId(3)).await.expect("save");
        store.add_to_cart(UserId(11), ProductId(1), 1).await.expect("add");
        store.add_to_cart(UserId(11), ProductId(2), 1).await.expect("add");
        store.toggle_saved(UserId(12), ProductId(4)).await.expect("save");

        let engaged = store
            .products_engaged_with_audience_of(ProductId(1), &[ProductId(1)])
            .await
            .expect("engaged");
        assert_eq!(engaged, vec![ProductId(2), ProductId(3)]);
    }

    #[tokio::test]
    async fn catalog_source_orders_ids_ascending() {
        let store = InMemoryStore::new();
        for (id, category) in [(5, 1), (2, 1), (8, 2), (3, 1)] {
            store.save(product(id, category)).await.expect("save product");
        }

        let in_category = store
            .products_in_category(CategoryId(1), &[ProductId(3)])
            .await
            .expect("category products");
        assert_eq!(in_category, vec![ProductId(2), ProductId(5)]);

        let rest = store.products_excluding(&[ProductId(2)]).await.expect("rest");
        assert_eq!(rest, vec![ProductId(3), ProductId(5), ProductId(8)]);
    }
}

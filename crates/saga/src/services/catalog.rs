//! Catalog service adapter: bulk price/detail lookup and listings.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use domain::{Money, ProductId};

use crate::retry::StepError;

/// A product as listed by the catalog.
#[derive(Debug, Clone)]
pub struct ProductListing {
    /// The product identifier.
    pub product_id: ProductId,
    /// Display name.
    pub name: String,
    /// Current unit price.
    pub price: Money,
    /// The category this product is listed under, if any.
    pub category_id: Option<String>,
}

/// A category as listed by the catalog.
#[derive(Debug, Clone)]
pub struct CategoryListing {
    /// The category identifier.
    pub category_id: String,
    /// Display name.
    pub name: String,
}

/// Trait for catalog lookups.
#[async_trait]
pub trait CatalogClient: Send + Sync {
    /// Bulk unit-price lookup by product id list.
    async fn unit_prices(
        &self,
        product_ids: &[ProductId],
    ) -> Result<HashMap<ProductId, Money>, StepError>;

    /// Lists all products, used to seed initial stock levels.
    async fn list_products(&self) -> Result<Vec<ProductListing>, StepError>;

    /// Lists the catalog's categories.
    async fn list_categories(&self) -> Result<Vec<CategoryListing>, StepError>;

    /// Lists the products in a category.
    async fn products_in_category(
        &self,
        category_id: &str,
    ) -> Result<Vec<ProductListing>, StepError>;
}

#[derive(Debug, Default)]
struct InMemoryCatalogState {
    products: Vec<ProductListing>,
    categories: Vec<CategoryListing>,
    fail_on_lookup: bool,
}

/// In-memory catalog for wiring and tests.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    state: Arc<RwLock<InMemoryCatalogState>>,
}

impl InMemoryCatalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a category to the catalog.
    pub fn add_category(&self, category_id: &str, name: &str) {
        self.state.write().unwrap().categories.push(CategoryListing {
            category_id: category_id.to_string(),
            name: name.to_string(),
        });
    }

    /// Adds an uncategorized product to the catalog.
    pub fn add_product(&self, product_id: impl Into<ProductId>, name: &str, price: Money) {
        self.state.write().unwrap().products.push(ProductListing {
            product_id: product_id.into(),
            name: name.to_string(),
            price,
            category_id: None,
        });
    }

    /// Adds a product under a category.
    pub fn add_product_in_category(
        &self,
        product_id: impl Into<ProductId>,
        name: &str,
        price: Money,
        category_id: &str,
    ) {
        self.state.write().unwrap().products.push(ProductListing {
            product_id: product_id.into(),
            name: name.to_string(),
            price,
            category_id: Some(category_id.to_string()),
        });
    }

    /// Configures the catalog to fail lookups with a transient error.
    pub fn set_fail_on_lookup(&self, fail: bool) {
        self.state.write().unwrap().fail_on_lookup = fail;
    }
}

#[async_trait]
impl CatalogClient for InMemoryCatalog {
    async fn unit_prices(
        &self,
        product_ids: &[ProductId],
    ) -> Result<HashMap<ProductId, Money>, StepError> {
        let state = self.state.read().unwrap();

        if state.fail_on_lookup {
            return Err(StepError::Transient("catalog unavailable".to_string()));
        }

        let mut prices = HashMap::new();
        for product_id in product_ids {
            let listing = state
                .products
                .iter()
                .find(|p| &p.product_id == product_id)
                .ok_or_else(|| {
                    StepError::Validation(format!("unknown product: {product_id}"))
                })?;
            prices.insert(product_id.clone(), listing.price);
        }
        Ok(prices)
    }

    async fn list_products(&self) -> Result<Vec<ProductListing>, StepError> {
        let state = self.state.read().unwrap();
        if state.fail_on_lookup {
            return Err(StepError::Transient("catalog unavailable".to_string()));
        }
        Ok(state.products.clone())
    }

    async fn list_categories(&self) -> Result<Vec<CategoryListing>, StepError> {
        let state = self.state.read().unwrap();
        if state.fail_on_lookup {
            return Err(StepError::Transient("catalog unavailable".to_string()));
        }
        Ok(state.categories.clone())
    }

    async fn products_in_category(
        &self,
        category_id: &str,
    ) -> Result<Vec<ProductListing>, StepError> {
        let state = self.state.read().unwrap();
        if state.fail_on_lookup {
            return Err(StepError::Transient("catalog unavailable".to_string()));
        }
        Ok(state
            .products
            .iter()
            .filter(|p| p.category_id.as_deref() == Some(category_id))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> InMemoryCatalog {
        let catalog = InMemoryCatalog::new();
        catalog.add_category("peripherals", "Peripherals");
        catalog.add_product_in_category("P1", "Widget", Money::from_cents(1000), "peripherals");
        catalog.add_product("P2", "Gadget", Money::from_cents(250));
        catalog
    }

    #[tokio::test]
    async fn test_unit_prices() {
        let catalog = catalog();
        let prices = catalog
            .unit_prices(&[ProductId::new("P1"), ProductId::new("P2")])
            .await
            .unwrap();

        assert_eq!(prices[&ProductId::new("P1")], Money::from_cents(1000));
        assert_eq!(prices[&ProductId::new("P2")], Money::from_cents(250));
    }

    #[tokio::test]
    async fn test_unknown_product_is_validation_error() {
        let catalog = catalog();
        let result = catalog.unit_prices(&[ProductId::new("P9")]).await;
        assert!(matches!(result, Err(StepError::Validation(_))));
    }

    #[tokio::test]
    async fn test_fail_on_lookup_is_transient() {
        let catalog = catalog();
        catalog.set_fail_on_lookup(true);
        let result = catalog.unit_prices(&[ProductId::new("P1")]).await;
        assert!(matches!(result, Err(StepError::Transient(_))));
    }

    #[tokio::test]
    async fn test_list_products() {
        let catalog = catalog();
        let products = catalog.list_products().await.unwrap();
        assert_eq!(products.len(), 2);
    }

    #[tokio::test]
    async fn test_category_listing() {
        let catalog = catalog();

        let categories = catalog.list_categories().await.unwrap();
        assert_eq!(categories.len(), 1);
        assert_eq!(categories[0].category_id, "peripherals");

        let in_category = catalog.products_in_category("peripherals").await.unwrap();
        assert_eq!(in_category.len(), 1);
        assert_eq!(in_category[0].product_id, ProductId::new("P1"));

        assert!(
            catalog
                .products_in_category("unknown")
                .await
                .unwrap()
                .is_empty()
        );
    }
}

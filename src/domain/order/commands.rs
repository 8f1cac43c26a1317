use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::OrderError;

// ============================================================================
// Order Commands - Represent user intent
// ============================================================================

/// One wanted product (optionally a specific variant) and quantity.
/// Quantity 0 means "remove this product".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRequest {
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub quantity: i32,
}

impl ProductRequest {
    pub fn new(product_id: Uuid, quantity: i32) -> Self {
        Self {
            product_id,
            variant_id: None,
            quantity,
        }
    }

    pub fn with_variant(mut self, variant_id: Uuid) -> Self {
        self.variant_id = Some(variant_id);
        self
    }
}

/// Line changes for a single order, built with [`OrderUpdates::builder`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderUpdates {
    products: Vec<ProductRequest>,
}

impl OrderUpdates {
    pub fn builder() -> OrderUpdatesBuilder {
        OrderUpdatesBuilder::default()
    }

    pub fn products(&self) -> &[ProductRequest] {
        &self.products
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}

// ============================================================================
// Typestate Builder
// ============================================================================
//
// `with_variant` exists only on `PendingProduct`, the value returned by
// `add_product`, so a variant can never be requested before its product.
//
// ============================================================================

#[derive(Debug, Default)]
pub struct OrderUpdatesBuilder {
    products: Vec<ProductRequest>,
}

impl OrderUpdatesBuilder {
    pub fn add_product(self, product_id: Uuid, quantity: i32) -> PendingProduct {
        PendingProduct {
            builder: self,
            current: ProductRequest::new(product_id, quantity),
        }
    }

    pub fn build(self) -> Result<OrderUpdates, OrderError> {
        let mut seen = Vec::with_capacity(self.products.len());
        for request in &self.products {
            if request.quantity < 0 {
                return Err(OrderError::InvalidLine(format!(
                    "Quantity for product {} cannot be negative: {}",
                    request.product_id, request.quantity
                )));
            }
            let key = (request.product_id, request.variant_id);
            if seen.contains(&key) {
                return Err(OrderError::InvalidLine(format!(
                    "Product {} requested more than once",
                    request.product_id
                )));
            }
            seen.push(key);
        }

        Ok(OrderUpdates {
            products: self.products,
        })
    }

    fn push(mut self, request: ProductRequest) -> Self {
        self.products.push(request);
        self
    }
}

/// A product that has been added but may still receive a variant
#[derive(Debug)]
pub struct PendingProduct {
    builder: OrderUpdatesBuilder,
    current: ProductRequest,
}

impl PendingProduct {
    pub fn with_variant(self, variant_id: Uuid) -> OrderUpdatesBuilder {
        self.builder.push(self.current.with_variant(variant_id))
    }

    pub fn add_product(self, product_id: Uuid, quantity: i32) -> PendingProduct {
        self.builder.push(self.current).add_product(product_id, quantity)
    }

    pub fn build(self) -> Result<OrderUpdates, OrderError> {
        self.builder.push(self.current).build()
    }
}

impl From<PendingProduct> for OrderUpdatesBuilder {
    fn from(pending: PendingProduct) -> Self {
        pending.builder.push(pending.current)
    }
}

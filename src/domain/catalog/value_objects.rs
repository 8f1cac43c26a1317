use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Catalog Value Objects
// ============================================================================

/// A sellable item scoped to one event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub event_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub vat_percent: Decimal,
    /// Quantity floor applied to every order line for this product
    pub minimum_quantity: i32,
    /// Number of units added automatically at registration; > 0 means mandatory
    pub mandatory_count: i32,
    pub variants: Vec<ProductVariant>,
}

impl Product {
    pub fn new(event_id: Uuid, name: impl Into<String>, price: Decimal) -> Self {
        Self {
            id: Uuid::now_v7(),
            event_id,
            name: name.into(),
            description: None,
            price,
            vat_percent: Decimal::ZERO,
            minimum_quantity: 1,
            mandatory_count: 0,
            variants: Vec::new(),
        }
    }

    pub fn with_vat(mut self, vat_percent: Decimal) -> Self {
        self.vat_percent = vat_percent;
        self
    }

    pub fn with_minimum_quantity(mut self, minimum_quantity: i32) -> Self {
        self.minimum_quantity = minimum_quantity;
        self
    }

    pub fn mandatory(mut self, count: i32) -> Self {
        self.mandatory_count = count;
        self
    }

    pub fn with_variant(mut self, name: impl Into<String>, price: Option<Decimal>) -> Self {
        let variant = ProductVariant {
            id: Uuid::now_v7(),
            product_id: self.id,
            name: name.into(),
            description: None,
            price,
            vat_percent: None,
        };
        self.variants.push(variant);
        self
    }

    pub fn is_mandatory(&self) -> bool {
        self.mandatory_count > 0
    }

    pub fn variant(&self, variant_id: Uuid) -> Option<&ProductVariant> {
        self.variants.iter().find(|v| v.id == variant_id)
    }

    /// Apply the product's quantity floor to a requested quantity
    pub fn floor_quantity(&self, requested: i32) -> i32 {
        requested.max(self.minimum_quantity)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductVariant {
    pub id: Uuid,
    pub product_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    /// Overrides the parent product's price when set
    pub price: Option<Decimal>,
    /// Overrides the parent product's VAT when set
    pub vat_percent: Option<Decimal>,
}

impl ProductVariant {
    pub fn effective_price(&self, product: &Product) -> Decimal {
        self.price.unwrap_or(product.price)
    }

    pub fn effective_vat(&self, product: &Product) -> Decimal {
        self.vat_percent.unwrap_or(product.vat_percent)
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_mandatory_derived_from_count() {
        let event_id = Uuid::now_v7();
        let optional = Product::new(event_id, "Dinner", dec!(450));
        let mandatory = Product::new(event_id, "Course fee", dec!(1200)).mandatory(1);

        assert!(!optional.is_mandatory());
        assert!(mandatory.is_mandatory());
    }

    #[test]
    fn test_variant_overrides_price_but_inherits_vat() {
        let product = Product::new(Uuid::now_v7(), "Hotel", dec!(900))
            .with_vat(dec!(12))
            .with_variant("Single room", Some(dec!(1100)))
            .with_variant("Double room", None);

        let single = &product.variants[0];
        let double = &product.variants[1];

        assert_eq!(single.effective_price(&product), dec!(1100));
        assert_eq!(single.effective_vat(&product), dec!(12));
        assert_eq!(double.effective_price(&product), dec!(900));
        assert_eq!(single.product_id, product.id);
    }

    #[test]
    fn test_quantity_floor() {
        let product = Product::new(Uuid::now_v7(), "Workshop", dec!(100)).with_minimum_quantity(2);
        assert_eq!(product.floor_quantity(1), 2);
        assert_eq!(product.floor_quantity(5), 5);
    }
}

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::domain::catalog::{Product, ProductVariant};

// ============================================================================
// Order Value Objects
// ============================================================================

/// Order lifecycle:
///
/// ```text
/// Draft ──▶ Verified ──▶ Invoiced ──▶ Cancelled
///   │                        └──────▶ Refunded
///   └──▶ Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    Draft,
    Verified,
    Invoiced,
    Refunded,
    Cancelled,
}

impl OrderStatus {
    pub fn can_transition_to(self, to: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, to),
            (Draft, Verified)
                | (Draft, Cancelled)
                | (Verified, Invoiced)
                | (Invoiced, Cancelled)
                | (Invoiced, Refunded)
        )
    }

    /// Draft and Verified orders still accept line changes
    pub fn is_editable(self) -> bool {
        matches!(self, OrderStatus::Draft | OrderStatus::Verified)
    }

    /// Cancelled and Refunded orders no longer count towards what was ordered
    pub fn is_settled_out(self) -> bool {
        matches!(self, OrderStatus::Cancelled | OrderStatus::Refunded)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Draft => "Draft",
            OrderStatus::Verified => "Verified",
            OrderStatus::Invoiced => "Invoiced",
            OrderStatus::Refunded => "Refunded",
            OrderStatus::Cancelled => "Cancelled",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentProvider {
    EmailInvoice,
    PowerOfficeEmailInvoice,
    PowerOfficeEhfInvoice,
    StripeInvoice,
    StripeDirect,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentMethod {
    pub id: Uuid,
    pub name: String,
    pub provider: PaymentProvider,
}

/// Customer details copied onto an order when it is created.
///
/// Deliberately a copy: later edits to the registration never rewrite
/// historical orders.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomerSnapshot {
    pub user_id: Uuid,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_vat_number: Option<String>,
    pub customer_invoice_reference: Option<String>,
}

/// A priced product/variant entry. Negative quantity denotes a refund.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLine {
    pub id: Uuid,
    pub product_id: Uuid,
    pub product_variant_id: Option<Uuid>,
    pub quantity: i32,
    pub price: Decimal,
    pub vat_percent: Decimal,
    pub product_name: String,
    pub product_description: Option<String>,
    pub variant_name: Option<String>,
    pub variant_description: Option<String>,
    /// Line this one refunds, if any
    pub refunded_line_id: Option<Uuid>,
}

impl OrderLine {
    /// Price and names are captured from the catalog at this moment
    pub fn for_product(product: &Product, variant: Option<&ProductVariant>, quantity: i32) -> Self {
        let (price, vat_percent) = match variant {
            Some(v) => (v.effective_price(product), v.effective_vat(product)),
            None => (product.price, product.vat_percent),
        };

        Self {
            id: Uuid::now_v7(),
            product_id: product.id,
            product_variant_id: variant.map(|v| v.id),
            quantity,
            price,
            vat_percent,
            product_name: product.name.clone(),
            product_description: product.description.clone(),
            variant_name: variant.map(|v| v.name.clone()),
            variant_description: variant.and_then(|v| v.description.clone()),
            refunded_line_id: None,
        }
    }

    /// Same product, variant, price and VAT with the quantity negated
    pub fn refund_line(&self) -> Self {
        Self {
            id: Uuid::now_v7(),
            quantity: -self.quantity,
            refunded_line_id: Some(self.id),
            ..self.clone()
        }
    }

    pub fn is_refund(&self) -> bool {
        self.quantity < 0 || self.refunded_line_id.is_some()
    }

    pub fn line_total(&self) -> Decimal {
        self.price * Decimal::from(self.quantity)
    }

    pub fn vat_amount(&self) -> Decimal {
        self.line_total() * self.vat_percent / Decimal::ONE_HUNDRED
    }

    pub fn matches(&self, product_id: Uuid, variant_id: Option<Uuid>) -> bool {
        self.product_id == product_id && self.product_variant_id == variant_id
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

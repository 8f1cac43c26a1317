use chrono::{DateTime, Utc};
use std::collections::HashSet;
use uuid::Uuid;

use super::commands::ProductRequest;
use super::errors::OrderError;
use super::value_objects::OrderLine;
use crate::domain::catalog::{Product, ProductVariant};
use crate::domain::event_info::EventInfo;
use crate::domain::registration::{Registration, RegistrationError};

// ============================================================================
// Order Composition - reconcile a wanted basket with what is already ordered
// ============================================================================
//
// 1. Products already on a live order (not Cancelled, not Refunded) that are
//    requested again conflict.
// 2. Every non-refund line of a conflicting product gets a refund line,
//    unless a live refund line already reverses it.
// 3. Requested lines (quantity floored at the product minimum, zero
//    quantities dropped) plus refund lines go to the lowest-id editable
//    order, or to a new order when none is editable.
//
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompositionOutcome {
    Created { order_id: Uuid, line_ids: Vec<Uuid> },
    Updated { order_id: Uuid, line_ids: Vec<Uuid> },
    Unchanged,
}

impl CompositionOutcome {
    pub fn order_id(&self) -> Option<Uuid> {
        match self {
            CompositionOutcome::Created { order_id, .. }
            | CompositionOutcome::Updated { order_id, .. } => Some(*order_id),
            CompositionOutcome::Unchanged => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            CompositionOutcome::Created { .. } => "created",
            CompositionOutcome::Updated { .. } => "updated",
            CompositionOutcome::Unchanged => "unchanged",
        }
    }
}

/// A request resolved against the event's catalog
pub(crate) struct ResolvedRequest<'a> {
    pub product: &'a Product,
    pub variant: Option<&'a ProductVariant>,
    pub quantity: i32,
}

/// Check that every product belongs to the event and every variant to its product
pub(crate) fn resolve_requests<'a>(
    event: &'a EventInfo,
    requests: &[ProductRequest],
) -> Result<Vec<ResolvedRequest<'a>>, OrderError> {
    requests
        .iter()
        .map(|request| {
            let product = event.product(request.product_id).ok_or_else(|| {
                OrderError::InvalidLine(format!(
                    "Product {} does not belong to event {}",
                    request.product_id, event.id
                ))
            })?;

            let variant = match request.variant_id {
                Some(variant_id) => Some(product.variant(variant_id).ok_or_else(|| {
                    OrderError::InvalidLine(format!(
                        "Variant {} does not belong to product {}",
                        variant_id, product.id
                    ))
                })?),
                None => None,
            };

            if request.quantity < 0 {
                return Err(OrderError::InvalidLine(format!(
                    "Quantity for product {} cannot be negative: {}",
                    product.id, request.quantity
                )));
            }

            Ok(ResolvedRequest {
                product,
                variant,
                quantity: request.quantity,
            })
        })
        .collect()
}

pub fn compose_order(
    registration: &mut Registration,
    event: &EventInfo,
    basket: &[ProductRequest],
    at: DateTime<Utc>,
) -> Result<CompositionOutcome, RegistrationError> {
    let resolved = resolve_requests(event, basket)?;

    let existing_product_ids: HashSet<Uuid> = registration
        .active_orders()
        .flat_map(|o| o.lines().iter().map(|l| l.product_id))
        .collect();

    let conflicting_product_ids: HashSet<Uuid> = basket
        .iter()
        .map(|r| r.product_id)
        .filter(|id| existing_product_ids.contains(id))
        .collect();

    let already_refunded: HashSet<Uuid> = registration
        .active_orders()
        .flat_map(|o| o.lines().iter())
        .filter_map(|l| l.refunded_line_id)
        .collect();

    let refund_lines: Vec<OrderLine> = registration
        .active_orders()
        .flat_map(|o| o.lines().iter())
        .filter(|l| conflicting_product_ids.contains(&l.product_id) && !l.is_refund())
        .filter(|l| !already_refunded.contains(&l.id))
        .map(OrderLine::refund_line)
        .collect();

    let mut lines: Vec<OrderLine> = resolved
        .iter()
        .filter(|r| r.quantity != 0)
        .map(|r| OrderLine::for_product(r.product, r.variant, r.product.floor_quantity(r.quantity)))
        .collect();
    lines.extend(refund_lines);

    tracing::debug!(
        registration_id = %registration.id,
        requested = basket.len(),
        conflicting = conflicting_product_ids.len(),
        line_count = lines.len(),
        "Composed order lines"
    );

    if lines.is_empty() {
        return Ok(CompositionOutcome::Unchanged);
    }

    let line_ids: Vec<Uuid> = lines.iter().map(|l| l.id).collect();

    match registration.first_editable_order_id() {
        Some(order_id) => {
            registration.order_mut(order_id)?.add_lines(lines)?;
            Ok(CompositionOutcome::Updated { order_id, line_ids })
        }
        None => {
            let order_id = registration.create_order(lines, at);
            Ok(CompositionOutcome::Created { order_id, line_ids })
        }
    }
}

/// Basket with every mandatory product at its minimum quantity
pub fn mandatory_basket(event: &EventInfo) -> Vec<ProductRequest> {
    event
        .mandatory_products()
        .map(|p| ProductRequest::new(p.id, p.minimum_quantity))
        .collect()
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::OrderStatus;
    use chrono::Utc;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    struct Fixture {
        event: EventInfo,
        registration: Registration,
        p1: Uuid,
        p2: Uuid,
    }

    fn fixture() -> Fixture {
        let mut event = EventInfo::new(Uuid::now_v7(), "Course");
        let p1 = event.add_product(Product::new(event.id, "Course fee", dec!(100)));
        let p2 = event.add_product(
            Product::new(event.id, "Dinner", dec!(40))
                .with_minimum_quantity(2)
                .with_variant("Vegetarian", Some(dec!(45))),
        );
        let registration =
            Registration::new(event.id, Uuid::now_v7(), "Ada", "ada@example.com", Utc::now());
        Fixture { event, registration, p1, p2 }
    }

    fn product_total(reg: &Registration, product_id: Uuid) -> i32 {
        reg.active_orders()
            .flat_map(|o| o.lines().iter())
            .filter(|l| l.product_id == product_id)
            .map(|l| l.quantity)
            .sum()
    }

    #[test]
    fn test_first_composition_creates_order() {
        let mut f = fixture();

        let outcome =
            compose_order(&mut f.registration, &f.event, &[ProductRequest::new(f.p1, 1)], Utc::now()).unwrap();

        let order_id = match outcome {
            CompositionOutcome::Created { order_id, ref line_ids } => {
                assert_eq!(line_ids.len(), 1);
                order_id
            }
            other => panic!("expected Created, got {other:?}"),
        };
        let order = f.registration.order(order_id).unwrap();
        assert_eq!(order.status(), OrderStatus::Draft);
        assert_eq!(order.total_amount(), dec!(100));
    }

    #[test]
    fn test_quantity_floor_and_variant_price() {
        let mut f = fixture();
        let variant_id = f.event.product(f.p2).unwrap().variants[0].id;

        let outcome = compose_order(
            &mut f.registration,
            &f.event,
            &[ProductRequest::new(f.p2, 1).with_variant(variant_id)],
            Utc::now(),
        )
        .unwrap();

        let order = f.registration.order(outcome.order_id().unwrap()).unwrap();
        let line = &order.lines()[0];
        assert_eq!(line.quantity, 2);
        assert_eq!(line.price, dec!(45));
        assert_eq!(line.product_variant_id, Some(variant_id));
    }

    #[test]
    fn test_conflicting_product_gets_refund_line() {
        let mut f = fixture();
        compose_order(&mut f.registration, &f.event, &[ProductRequest::new(f.p1, 2)], Utc::now()).unwrap();

        let outcome =
            compose_order(&mut f.registration, &f.event, &[ProductRequest::new(f.p1, 2)], Utc::now()).unwrap();

        assert!(matches!(outcome, CompositionOutcome::Updated { .. }));
        let order = f.registration.order(outcome.order_id().unwrap()).unwrap();
        let quantities: Vec<i32> = order.lines().iter().map(|l| l.quantity).collect();
        assert_eq!(quantities, vec![2, 2, -2]);

        let refund = &order.lines()[2];
        assert_eq!(refund.refunded_line_id, Some(order.lines()[0].id));
        assert_eq!(product_total(&f.registration, f.p1), 2);
    }

    #[test]
    fn test_repeated_basket_refunds_only_unreversed_lines() {
        let mut f = fixture();
        for _ in 0..3 {
            compose_order(&mut f.registration, &f.event, &[ProductRequest::new(f.p1, 2)], Utc::now())
                .unwrap();
        }

        let order = &f.registration.orders()[0];
        let quantities: Vec<i32> = order.lines().iter().map(|l| l.quantity).collect();
        assert_eq!(quantities, vec![2, 2, -2, 2, -2]);
        assert_eq!(order.lines()[4].refunded_line_id, Some(order.lines()[1].id));
        assert_eq!(product_total(&f.registration, f.p1), 2);
    }

    #[test]
    fn test_conflict_against_invoiced_order_goes_to_new_order() {
        let mut f = fixture();
        let first = compose_order(&mut f.registration, &f.event, &[ProductRequest::new(f.p1, 2)], Utc::now())
            .unwrap()
            .order_id()
            .unwrap();
        {
            let order = f.registration.order_mut(first).unwrap();
            order.transition(OrderStatus::Verified, None, Utc::now()).unwrap();
            order.transition(OrderStatus::Invoiced, None, Utc::now()).unwrap();
        }

        let outcome =
            compose_order(&mut f.registration, &f.event, &[ProductRequest::new(f.p1, 3)], Utc::now()).unwrap();

        let new_id = match outcome {
            CompositionOutcome::Created { order_id, .. } => order_id,
            other => panic!("expected Created, got {other:?}"),
        };
        assert_ne!(new_id, first);
        let order = f.registration.order(new_id).unwrap();
        let quantities: Vec<i32> = order.lines().iter().map(|l| l.quantity).collect();
        assert_eq!(quantities, vec![3, -2]);
        assert_eq!(order.total_amount(), dec!(100));
        assert_eq!(product_total(&f.registration, f.p1), 3);
    }

    #[test]
    fn test_cancelled_orders_do_not_conflict() {
        let mut f = fixture();
        let first = compose_order(&mut f.registration, &f.event, &[ProductRequest::new(f.p1, 1)], Utc::now())
            .unwrap()
            .order_id()
            .unwrap();
        f.registration
            .order_mut(first)
            .unwrap()
            .transition(OrderStatus::Cancelled, None, Utc::now())
            .unwrap();

        let outcome =
            compose_order(&mut f.registration, &f.event, &[ProductRequest::new(f.p1, 1)], Utc::now()).unwrap();

        let order = f.registration.order(outcome.order_id().unwrap()).unwrap();
        assert_eq!(order.lines().len(), 1);
        assert_eq!(order.lines()[0].quantity, 1);
    }

    #[test]
    fn test_zero_quantity_removes_product_via_refund() {
        let mut f = fixture();
        compose_order(&mut f.registration, &f.event, &[ProductRequest::new(f.p1, 1)], Utc::now()).unwrap();

        let outcome =
            compose_order(&mut f.registration, &f.event, &[ProductRequest::new(f.p1, 0)], Utc::now()).unwrap();

        assert!(matches!(outcome, CompositionOutcome::Updated { ref line_ids, .. } if line_ids.len() == 1));
        assert_eq!(product_total(&f.registration, f.p1), 0);
    }

    #[test]
    fn test_zero_quantity_without_history_is_noop() {
        let mut f = fixture();
        let outcome =
            compose_order(&mut f.registration, &f.event, &[ProductRequest::new(f.p1, 0)], Utc::now()).unwrap();
        assert_eq!(outcome, CompositionOutcome::Unchanged);
        assert!(f.registration.orders().is_empty());
    }

    #[test]
    fn test_lowest_editable_order_receives_lines() {
        let mut f = fixture();
        let first = f.registration.create_order(vec![], Utc::now());
        let _second = f.registration.create_order(vec![], Utc::now());

        let outcome =
            compose_order(&mut f.registration, &f.event, &[ProductRequest::new(f.p1, 1)], Utc::now()).unwrap();

        assert_eq!(outcome.order_id(), Some(first));
    }

    #[test]
    fn test_product_from_other_event_rejected() {
        let mut f = fixture();
        let foreign = Product::new(Uuid::now_v7(), "Elsewhere", Decimal::ONE);

        let err = compose_order(&mut f.registration, &f.event, &[ProductRequest::new(foreign.id, 1)], Utc::now())
            .unwrap_err();

        assert!(matches!(err, RegistrationError::Order(OrderError::InvalidLine(_))));
        assert!(f.registration.orders().is_empty());
    }

    #[test]
    fn test_variant_of_other_product_rejected() {
        let mut f = fixture();
        let variant_id = f.event.product(f.p2).unwrap().variants[0].id;

        let err = compose_order(
            &mut f.registration,
            &f.event,
            &[ProductRequest::new(f.p1, 1).with_variant(variant_id)],
            Utc::now(),
        )
        .unwrap_err();

        assert!(matches!(err, RegistrationError::Order(OrderError::InvalidLine(_))));
    }

    #[test]
    fn test_negative_quantity_rejected() {
        let mut f = fixture();
        let err = compose_order(&mut f.registration, &f.event, &[ProductRequest::new(f.p1, -1)], Utc::now())
            .unwrap_err();
        assert!(matches!(err, RegistrationError::Order(OrderError::InvalidLine(_))));
    }

    #[test]
    fn test_mandatory_basket_uses_minimum_quantity() {
        let mut event = EventInfo::new(Uuid::now_v7(), "Course");
        let mandatory = event.add_product(
            Product::new(event.id, "Fee", dec!(100))
                .with_minimum_quantity(3)
                .mandatory(1),
        );
        event.add_product(Product::new(event.id, "Optional", dec!(5)));

        assert_eq!(mandatory_basket(&event), vec![ProductRequest::new(mandatory, 3)]);
    }
}

use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::OrderError;
use super::value_objects::{CustomerSnapshot, OrderLine, OrderStatus, PaymentMethod};

// ============================================================================
// Order Aggregate - Status Machine and Line Ownership
// ============================================================================
//
// `status`, `lines` and `log` are private: status only moves through
// `transition`, lines only change while the order is editable, and the log
// is append-only.
//
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    // Identity
    pub id: Uuid,
    pub registration_id: Uuid,

    // Snapshot taken at creation time
    pub customer: CustomerSnapshot,

    pub payment_method: Option<PaymentMethod>,
    pub comments: Option<String>,
    pub created_at: DateTime<Utc>,

    status: OrderStatus,
    lines: Vec<OrderLine>,
    log: Vec<String>,
}

impl Order {
    pub fn new(
        registration_id: Uuid,
        customer: CustomerSnapshot,
        lines: Vec<OrderLine>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            registration_id,
            customer,
            payment_method: None,
            comments: None,
            created_at,
            status: OrderStatus::Draft,
            lines,
            log: Vec::new(),
        }
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn lines(&self) -> &[OrderLine] {
        &self.lines
    }

    pub fn log(&self) -> &[String] {
        &self.log
    }

    pub fn can_edit(&self) -> bool {
        self.status.is_editable()
    }

    /// Σ price × quantity over all lines, refunds included
    pub fn total_amount(&self) -> Decimal {
        self.lines.iter().map(OrderLine::line_total).sum()
    }

    pub fn total_vat(&self) -> Decimal {
        self.lines.iter().map(OrderLine::vat_amount).sum()
    }

    pub fn total_including_vat(&self) -> Decimal {
        self.total_amount() + self.total_vat()
    }

    pub fn contains_product(&self, product_id: Uuid) -> bool {
        self.lines.iter().any(|l| l.product_id == product_id)
    }

    // ------------------------------------------------------------------------
    // Status machine
    // ------------------------------------------------------------------------

    /// Validate the edge against the current status, then move and log it
    pub fn transition(
        &mut self,
        to: OrderStatus,
        note: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<(), OrderError> {
        if !self.status.can_transition_to(to) {
            return Err(OrderError::InvalidStateTransition {
                from: self.status,
                to,
            });
        }

        self.status = to;
        self.add_log(note.unwrap_or(to.as_str()), at);
        Ok(())
    }

    pub fn add_log(&mut self, text: &str, at: DateTime<Utc>) {
        let stamp = at.to_rfc3339_opts(SecondsFormat::Secs, true);
        self.log.push(format!("{stamp} {text}"));
    }

    /// Sibling Draft order that reverses every line of this invoiced order.
    /// This order keeps its own status.
    pub fn create_refund_order(&self, at: DateTime<Utc>) -> Result<Order, OrderError> {
        if self.status != OrderStatus::Invoiced {
            return Err(OrderError::InvalidOperation(format!(
                "Only invoiced orders can be refunded, order {} is {}",
                self.id, self.status
            )));
        }

        let lines = self.lines.iter().map(OrderLine::refund_line).collect();
        let mut refund = Order::new(self.registration_id, self.customer.clone(), lines, at);
        refund.payment_method = self.payment_method.clone();
        refund.comments = Some(format!("Refund of order {}", self.id));
        Ok(refund)
    }

    // ------------------------------------------------------------------------
    // Line mutation (editable orders only)
    // ------------------------------------------------------------------------

    fn ensure_editable(&self) -> Result<(), OrderError> {
        if !self.can_edit() {
            return Err(OrderError::NotEditable {
                order_id: self.id,
                status: self.status,
            });
        }
        Ok(())
    }

    pub fn add_line(&mut self, line: OrderLine) -> Result<(), OrderError> {
        self.ensure_editable()?;
        if line.quantity == 0 {
            return Err(OrderError::InvalidLine(format!(
                "Line for product {} has zero quantity",
                line.product_id
            )));
        }
        self.lines.push(line);
        Ok(())
    }

    pub fn add_lines(&mut self, lines: impl IntoIterator<Item = OrderLine>) -> Result<(), OrderError> {
        self.ensure_editable()?;
        for line in lines {
            self.add_line(line)?;
        }
        Ok(())
    }

    pub fn update_line_quantity(&mut self, line_id: Uuid, quantity: i32) -> Result<(), OrderError> {
        self.ensure_editable()?;
        if quantity == 0 {
            return Err(OrderError::InvalidLine(
                "Use remove_line to drop a line".to_string(),
            ));
        }

        let line = self
            .lines
            .iter_mut()
            .find(|l| l.id == line_id)
            .ok_or(OrderError::LineNotFound(line_id))?;
        line.quantity = quantity;
        Ok(())
    }

    pub fn remove_line(&mut self, line_id: Uuid) -> Result<OrderLine, OrderError> {
        self.ensure_editable()?;
        let index = self
            .lines
            .iter()
            .position(|l| l.id == line_id)
            .ok_or(OrderError::LineNotFound(line_id))?;
        Ok(self.lines.remove(index))
    }

    pub fn set_payment_method(&mut self, payment_method: Option<PaymentMethod>) -> Result<(), OrderError> {
        self.ensure_editable()?;
        self.payment_method = payment_method;
        Ok(())
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::catalog::Product;
    use crate::domain::order::PaymentProvider;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn customer() -> CustomerSnapshot {
        CustomerSnapshot {
            user_id: Uuid::now_v7(),
            customer_name: "Kari Nordmann".to_string(),
            customer_email: "kari@example.com".to_string(),
            customer_vat_number: Some("NO123456789".to_string()),
            customer_invoice_reference: Some("PO-42".to_string()),
        }
    }

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 8, 30, 0).unwrap()
    }

    fn line(price: Decimal, quantity: i32) -> OrderLine {
        let product = Product::new(Uuid::now_v7(), "Course fee", price);
        OrderLine::for_product(&product, None, quantity)
    }

    fn order_in(status: OrderStatus) -> Order {
        let mut order = Order::new(Uuid::now_v7(), customer(), vec![line(dec!(100), 1)], at());
        let path: &[OrderStatus] = match status {
            OrderStatus::Draft => &[],
            OrderStatus::Verified => &[OrderStatus::Verified],
            OrderStatus::Invoiced => &[OrderStatus::Verified, OrderStatus::Invoiced],
            OrderStatus::Refunded => &[OrderStatus::Verified, OrderStatus::Invoiced, OrderStatus::Refunded],
            OrderStatus::Cancelled => &[OrderStatus::Cancelled],
        };
        for step in path {
            order.transition(*step, None, at()).unwrap();
        }
        order
    }

    #[test]
    fn test_new_order_is_draft_and_editable() {
        let order = Order::new(Uuid::now_v7(), customer(), vec![], at());
        assert_eq!(order.status(), OrderStatus::Draft);
        assert!(order.can_edit());
        assert!(order.log().is_empty());
    }

    #[test]
    fn test_happy_path_to_refunded() {
        let order = order_in(OrderStatus::Refunded);
        assert_eq!(order.status(), OrderStatus::Refunded);
        assert_eq!(order.log().len(), 3);
    }

    #[test]
    fn test_illegal_transition_leaves_status_unchanged() {
        let mut order = order_in(OrderStatus::Draft);

        let err = order.transition(OrderStatus::Invoiced, None, at()).unwrap_err();
        assert!(matches!(
            err,
            OrderError::InvalidStateTransition { from: OrderStatus::Draft, to: OrderStatus::Invoiced }
        ));
        assert_eq!(order.status(), OrderStatus::Draft);
        assert!(order.log().is_empty());
    }

    #[test]
    fn test_verified_cannot_be_cancelled_or_reverified() {
        let mut order = order_in(OrderStatus::Verified);
        assert!(order.transition(OrderStatus::Cancelled, None, at()).is_err());
        assert!(order.transition(OrderStatus::Verified, None, at()).is_err());
        assert!(order.transition(OrderStatus::Refunded, None, at()).is_err());
        assert_eq!(order.status(), OrderStatus::Verified);
    }

    #[test]
    fn test_terminal_statuses_reject_everything() {
        for terminal in [OrderStatus::Cancelled, OrderStatus::Refunded] {
            let mut order = order_in(terminal);
            for to in [
                OrderStatus::Draft,
                OrderStatus::Verified,
                OrderStatus::Invoiced,
                OrderStatus::Refunded,
                OrderStatus::Cancelled,
            ] {
                assert!(order.transition(to, None, at()).is_err());
            }
            assert_eq!(order.status(), terminal);
        }
    }

    #[test]
    fn test_log_line_format() {
        let mut order = order_in(OrderStatus::Draft);
        order.transition(OrderStatus::Verified, None, at()).unwrap();
        order
            .transition(OrderStatus::Invoiced, Some("Sent to accounting"), at())
            .unwrap();

        assert_eq!(order.log()[0], "2024-03-01T08:30:00Z Verified");
        assert_eq!(order.log()[1], "2024-03-01T08:30:00Z Sent to accounting");
    }

    #[test]
    fn test_timestamps_come_from_the_caller() {
        let created = at();
        let later = Utc.with_ymd_and_hms(2024, 3, 2, 12, 0, 0).unwrap();
        let mut order = Order::new(Uuid::now_v7(), customer(), vec![line(dec!(100), 1)], created);
        assert_eq!(order.created_at, created);

        order.transition(OrderStatus::Verified, None, later).unwrap();
        order.transition(OrderStatus::Invoiced, None, later).unwrap();
        let refund = order.create_refund_order(later).unwrap();

        assert_eq!(order.log()[0], "2024-03-02T12:00:00Z Verified");
        assert_eq!(refund.created_at, later);
    }

    #[test]
    fn test_payment_method_only_while_editable() {
        let method = PaymentMethod {
            id: Uuid::now_v7(),
            name: "Invoice".to_string(),
            provider: PaymentProvider::EmailInvoice,
        };

        let mut order = order_in(OrderStatus::Verified);
        order.set_payment_method(Some(method.clone())).unwrap();
        assert_eq!(order.payment_method, Some(method.clone()));

        let mut invoiced = order_in(OrderStatus::Invoiced);
        assert!(matches!(
            invoiced.set_payment_method(Some(method)),
            Err(OrderError::NotEditable { .. })
        ));
        assert_eq!(invoiced.payment_method, None);
    }

    #[test]
    fn test_refund_requires_invoiced() {
        for status in [
            OrderStatus::Draft,
            OrderStatus::Verified,
            OrderStatus::Refunded,
            OrderStatus::Cancelled,
        ] {
            let err = order_in(status).create_refund_order(at()).unwrap_err();
            assert!(matches!(err, OrderError::InvalidOperation(_)));
        }
    }

    #[test]
    fn test_refund_order_negates_lines_and_keeps_source() {
        let mut order = Order::new(
            Uuid::now_v7(),
            customer(),
            vec![line(dec!(100), 2), line(dec!(35.50), 1)],
            at(),
        );
        order.transition(OrderStatus::Verified, None, at()).unwrap();
        order.transition(OrderStatus::Invoiced, None, at()).unwrap();

        let refund = order.create_refund_order(at()).unwrap();

        assert_eq!(order.status(), OrderStatus::Invoiced);
        assert_eq!(refund.status(), OrderStatus::Draft);
        assert_ne!(refund.id, order.id);
        assert_eq!(refund.registration_id, order.registration_id);
        assert_eq!(refund.customer, order.customer);

        let source_qty: Vec<i32> = order.lines().iter().map(|l| l.quantity).collect();
        let refund_qty: Vec<i32> = refund.lines().iter().map(|l| l.quantity).collect();
        assert_eq!(refund_qty, source_qty.iter().map(|q| -q).collect::<Vec<_>>());
        assert_eq!(refund.total_amount(), -order.total_amount());
    }

    #[test]
    fn test_total_tracks_line_changes() {
        let mut order = Order::new(Uuid::now_v7(), customer(), vec![line(dec!(100), 2)], at());
        assert_eq!(order.total_amount(), dec!(200));

        let extra = line(dec!(50), 3);
        let extra_id = extra.id;
        order.add_line(extra).unwrap();
        assert_eq!(order.total_amount(), dec!(350));

        order.update_line_quantity(extra_id, 1).unwrap();
        assert_eq!(order.total_amount(), dec!(250));

        let refund = order.lines()[0].refund_line();
        order.add_line(refund).unwrap();
        assert_eq!(order.total_amount(), dec!(50));

        order.remove_line(extra_id).unwrap();
        assert_eq!(order.total_amount(), dec!(0));

        let expected: Decimal = order
            .lines()
            .iter()
            .map(|l| l.price * Decimal::from(l.quantity))
            .sum();
        assert_eq!(order.total_amount(), expected);
    }

    #[test]
    fn test_vat_totals() {
        let product = Product::new(Uuid::now_v7(), "Book", dec!(200)).with_vat(dec!(25));
        let order = Order::new(
            Uuid::now_v7(),
            customer(),
            vec![OrderLine::for_product(&product, None, 2)],
            at(),
        );
        assert_eq!(order.total_vat(), dec!(100));
        assert_eq!(order.total_including_vat(), dec!(500));
    }

    #[test]
    fn test_line_changes_rejected_when_not_editable() {
        for status in [OrderStatus::Invoiced, OrderStatus::Cancelled, OrderStatus::Refunded] {
            let mut order = order_in(status);
            let line_id = order.lines()[0].id;

            assert!(matches!(
                order.add_line(line(dec!(10), 1)),
                Err(OrderError::NotEditable { .. })
            ));
            assert!(matches!(
                order.update_line_quantity(line_id, 4),
                Err(OrderError::NotEditable { .. })
            ));
            assert!(matches!(
                order.remove_line(line_id),
                Err(OrderError::NotEditable { .. })
            ));
            assert_eq!(order.lines().len(), 1);
        }
    }

    #[test]
    fn test_verified_order_still_editable() {
        let mut order = order_in(OrderStatus::Verified);
        order.add_line(line(dec!(10), 1)).unwrap();
        assert_eq!(order.lines().len(), 2);
    }

    #[test]
    fn test_zero_quantity_line_rejected() {
        let mut order = order_in(OrderStatus::Draft);
        assert!(matches!(
            order.add_line(line(dec!(10), 0)),
            Err(OrderError::InvalidLine(_))
        ));
    }

    #[test]
    fn test_unknown_line() {
        let mut order = order_in(OrderStatus::Draft);
        let missing = Uuid::now_v7();
        assert!(matches!(
            order.remove_line(missing),
            Err(OrderError::LineNotFound(id)) if id == missing
        ));
    }
}

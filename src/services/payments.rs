//! Payments against client (incoming) or vendor (outgoing) invoices.

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use super::pricing::{self, round_money};
use super::{activity, ServiceError};
use crate::database::models::invoice::Payment;
use crate::database::sequence;
use crate::error::ApiError;
use crate::types::{EntityType, ListParams};
use crate::validation::{clean, FieldErrors};

pub const PAYMENT_METHODS: &[&str] = &["bank_transfer", "cash", "cheque", "card", "other"];

const COLUMNS: &str = "id, payment_number, direction, client_invoice_id, vendor_invoice_id, amount, method, \
                       paid_on, reference, created_by, created_at";

/// Which invoice a payment settles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvoiceRef {
    Client(Uuid),
    Vendor(Uuid),
}

impl InvoiceRef {
    fn id(self) -> Uuid {
        match self {
            InvoiceRef::Client(id) | InvoiceRef::Vendor(id) => id,
        }
    }

    fn entity(self) -> EntityType {
        match self {
            InvoiceRef::Client(_) => EntityType::ClientInvoice,
            InvoiceRef::Vendor(_) => EntityType::VendorInvoice,
        }
    }

    fn number_column(self) -> &'static str {
        match self {
            InvoiceRef::Client(_) => "invoice_number",
            InvoiceRef::Vendor(_) => "reference_number",
        }
    }

    pub fn direction(self) -> &'static str {
        match self {
            InvoiceRef::Client(_) => "incoming",
            InvoiceRef::Vendor(_) => "outgoing",
        }
    }
}

/// New paid amount and invoice status after applying `amount`.
///
/// Overpayment is rejected; reaching the total exactly marks the invoice paid.
pub fn apply_payment(total: Decimal, already_paid: Decimal, amount: Decimal) -> Result<(Decimal, &'static str), ServiceError> {
    if amount <= Decimal::ZERO {
        return Err(ServiceError::validation("amount", "Amount must be greater than zero"));
    }
    let outstanding = total - already_paid;
    if amount > outstanding {
        return Err(ServiceError::validation(
            "amount",
            format!("Payment exceeds the outstanding balance of {}", outstanding),
        ));
    }
    let paid = already_paid + amount;
    let status = if paid >= total { "paid" } else { "partially_paid" };
    Ok((paid, status))
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewPayment {
    pub client_invoice_id: Option<Uuid>,
    pub vendor_invoice_id: Option<Uuid>,
    pub amount: Decimal,
    pub method: String,
    pub paid_on: Option<NaiveDate>,
    pub reference: Option<String>,
}

impl NewPayment {
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut errors = FieldErrors::new();
        errors
            .check(
                self.client_invoice_id.is_some() != self.vendor_invoice_id.is_some(),
                "invoice",
                "Exactly one of client_invoice_id or vendor_invoice_id is required",
            )
            .check(self.amount > Decimal::ZERO, "amount", "Amount must be greater than zero")
            .one_of("method", Some(self.method.as_str()), PAYMENT_METHODS)
            .max_len("reference", self.reference.as_deref(), 200);
        pricing::validate_money(&mut errors, "amount", Some(self.amount));
        errors.into_result()
    }

    pub fn invoice(&self) -> Option<InvoiceRef> {
        match (self.client_invoice_id, self.vendor_invoice_id) {
            (Some(id), None) => Some(InvoiceRef::Client(id)),
            (None, Some(id)) => Some(InvoiceRef::Vendor(id)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaymentFilter {
    pub direction: Option<String>,
    pub client_invoice_id: Option<Uuid>,
    pub vendor_invoice_id: Option<Uuid>,
}

pub async fn list(pool: &PgPool, params: &ListParams, filter: &PaymentFilter) -> Result<Vec<Payment>, ServiceError> {
    let sql = format!(
        "SELECT {COLUMNS} FROM payments
         WHERE ($1::text IS NULL OR payment_number ILIKE $1 OR reference ILIKE $1)
         AND ($2::text IS NULL OR direction = $2)
         AND ($3::uuid IS NULL OR client_invoice_id = $3)
         AND ($4::uuid IS NULL OR vendor_invoice_id = $4)
         ORDER BY paid_on DESC, payment_number DESC
         LIMIT $5 OFFSET $6"
    );
    let rows = sqlx::query_as::<_, Payment>(&sql)
        .bind(params.search_pattern())
        .bind(filter.direction.as_deref())
        .bind(filter.client_invoice_id)
        .bind(filter.vendor_invoice_id)
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

pub async fn get(pool: &PgPool, id: Uuid) -> Result<Payment, ServiceError> {
    let sql = format!("SELECT {COLUMNS} FROM payments WHERE id = $1");
    sqlx::query_as::<_, Payment>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ServiceError::not_found(EntityType::Payment))
}

/// Record a payment and roll the invoice's paid amount and status forward
pub async fn create(pool: &PgPool, input: NewPayment, user_id: Uuid) -> Result<Payment, ServiceError> {
    let invoice = input
        .invoice()
        .ok_or_else(|| ServiceError::validation("invoice", "Exactly one of client_invoice_id or vendor_invoice_id is required"))?;
    let table = invoice.entity().table();

    let mut tx = pool.begin().await?;

    let sql = format!(
        "SELECT {num} AS number, status, total, amount_paid FROM {table}
         WHERE id = $1 AND is_active = true FOR UPDATE",
        num = invoice.number_column()
    );
    let row = sqlx::query(&sql)
        .bind(invoice.id())
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| ServiceError::not_found(invoice.entity()))?;
    let invoice_number: String = row.try_get("number")?;
    let status: String = row.try_get("status")?;
    let total: Decimal = row.try_get("total")?;
    let already_paid: Decimal = row.try_get("amount_paid")?;

    if status == "void" {
        return Err(ServiceError::InvalidState(format!("Invoice {} is void", invoice_number)));
    }
    let amount = round_money(input.amount);
    let (amount_paid, new_status) = apply_payment(total, already_paid, amount)?;

    let paid_on = input.paid_on.unwrap_or_else(|| Utc::now().date_naive());
    let number = sequence::allocate(&mut tx, "payments", "payment_number", &sequence::PAYMENT, paid_on).await?;

    let id = Uuid::new_v4();
    let sql = format!(
        "INSERT INTO payments (id, payment_number, direction, client_invoice_id, vendor_invoice_id, amount, method, paid_on, reference, created_by)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
         RETURNING {COLUMNS}"
    );
    let payment = sqlx::query_as::<_, Payment>(&sql)
        .bind(id)
        .bind(&number)
        .bind(invoice.direction())
        .bind(input.client_invoice_id)
        .bind(input.vendor_invoice_id)
        .bind(amount)
        .bind(&input.method)
        .bind(paid_on)
        .bind(clean(input.reference))
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

    let sql = format!("UPDATE {table} SET amount_paid = $2, status = $3, updated_at = NOW() WHERE id = $1");
    sqlx::query(&sql)
        .bind(invoice.id())
        .bind(amount_paid)
        .bind(new_status)
        .execute(&mut *tx)
        .await?;

    activity::log(
        &mut tx,
        EntityType::Payment,
        id,
        "created",
        format!("Payment {} of {} against {}", number, amount, invoice_number),
        Some(user_id),
    )
    .await?;
    activity::log(
        &mut tx,
        invoice.entity(),
        invoice.id(),
        "payment_recorded",
        format!("{} received, invoice now {}", amount, new_status),
        Some(user_id),
    )
    .await?;

    tx.commit().await?;
    tracing::info!("Recorded payment {} ({}) against {}", number, amount, invoice_number);
    Ok(payment)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn partial_then_full_payment() {
        let (paid, status) = apply_payment(dec("1000.00"), Decimal::ZERO, dec("400.00")).unwrap();
        assert_eq!(paid, dec("400.00"));
        assert_eq!(status, "partially_paid");

        let (paid, status) = apply_payment(dec("1000.00"), paid, dec("600.00")).unwrap();
        assert_eq!(paid, dec("1000.00"));
        assert_eq!(status, "paid");
    }

    #[test]
    fn overpayment_is_rejected() {
        let err = apply_payment(dec("100.00"), dec("90.00"), dec("10.01")).unwrap_err();
        assert!(matches!(err, ServiceError::Validation { ref field, .. } if field == "amount"));
        let api: ApiError = err.into();
        assert_eq!(api.status_code(), 400);
    }

    #[test]
    fn non_positive_amounts_are_rejected() {
        assert!(apply_payment(dec("100"), Decimal::ZERO, Decimal::ZERO).is_err());
        assert!(apply_payment(dec("100"), Decimal::ZERO, dec("-5")).is_err());
    }

    #[test]
    fn payment_targets_exactly_one_invoice() {
        let mut input = NewPayment {
            client_invoice_id: Some(Uuid::new_v4()),
            vendor_invoice_id: Some(Uuid::new_v4()),
            amount: dec("10"),
            method: "cash".into(),
            paid_on: None,
            reference: None,
        };
        assert!(input.validate().is_err());
        assert!(input.invoice().is_none());

        input.vendor_invoice_id = None;
        assert!(input.validate().is_ok());
        assert_eq!(input.invoice().map(InvoiceRef::direction), Some("incoming"));
    }

    #[test]
    fn unknown_method_is_rejected() {
        let input = NewPayment {
            client_invoice_id: None,
            vendor_invoice_id: Some(Uuid::new_v4()),
            amount: dec("10"),
            method: "barter".into(),
            paid_on: None,
            reference: None,
        };
        let body = input.validate().unwrap_err().to_json();
        assert!(body["field_errors"]["method"].is_string());
    }

    #[test]
    fn amounts_must_fit_money_columns() {
        let mut input = NewPayment {
            client_invoice_id: Some(Uuid::new_v4()),
            vendor_invoice_id: None,
            amount: Decimal::MAX,
            method: "card".into(),
            paid_on: None,
            reference: None,
        };
        let body = input.validate().unwrap_err().to_json();
        assert!(body["field_errors"]["amount"].is_string());

        input.amount = dec("12.345");
        assert!(input.validate().is_err());

        input.amount = dec("12.340");
        assert!(input.validate().is_ok());
    }
}

//! Client invoices, vendor invoices and read-only legacy invoice history.

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use super::pricing::{self, round_money};
use super::{activity, ensure_active, ServiceError};
use crate::database::models::invoice::{ClientInvoice, LegacyInvoice, VendorInvoice};
use crate::database::sequence;
use crate::error::ApiError;
use crate::types::{EntityType, ListParams};
use crate::validation::{clean, FieldErrors};

pub const CLIENT_INVOICE_STATUSES: &[&str] = &["draft", "sent", "partially_paid", "paid", "overdue", "void"];
pub const VENDOR_INVOICE_STATUSES: &[&str] = &["received", "approved", "partially_paid", "paid", "void"];

/// Statuses driven by recorded payments, not set by hand
const PAYMENT_STATUSES: &[&str] = &["partially_paid", "paid"];

/// Manual moves still open once payments have been recorded
const CLIENT_STATUSES_AFTER_PAYMENT: &[&str] = &["overdue", "void"];
const VENDOR_STATUSES_AFTER_PAYMENT: &[&str] = &["void"];

pub(crate) const CLIENT_INVOICE_COLUMNS: &str = "id, invoice_number, client_id, project_id, quotation_id, status, \
    issue_date, due_date, subtotal, tax_rate, tax_amount, total, amount_paid, notes, accounting_invoice_id, \
    is_active, created_by, created_at, updated_at";

pub(crate) const VENDOR_INVOICE_COLUMNS: &str = "id, reference_number, vendor_id, purchase_order_id, \
    vendor_invoice_number, status, issue_date, due_date, total, amount_paid, notes, is_active, created_by, \
    created_at, updated_at";

const LEGACY_COLUMNS: &str = "id, legacy_number, party_name, issue_date, total, status, raw, imported_at";

fn check_due(errors: &mut FieldErrors, issue: Option<NaiveDate>, due: Option<NaiveDate>) {
    if let (Some(issue), Some(due)) = (issue, due) {
        errors.check(due >= issue, "due_date", "Due date cannot be before the issue date");
    }
}

fn check_manual_status(errors: &mut FieldErrors, status: Option<&str>, allowed: &[&str]) {
    errors.one_of("status", status, allowed);
    if let Some(status) = status {
        errors.check(
            !PAYMENT_STATUSES.contains(&status),
            "status",
            "Payment statuses are set by recording payments",
        );
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewClientInvoice {
    pub client_id: Uuid,
    pub project_id: Option<Uuid>,
    pub issue_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub subtotal: Decimal,
    pub tax_rate: Option<Decimal>,
    pub notes: Option<String>,
}

impl NewClientInvoice {
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut errors = FieldErrors::new();
        pricing::validate_money(&mut errors, "subtotal", Some(self.subtotal));
        pricing::validate_tax_rate(&mut errors, self.tax_rate);
        check_due(&mut errors, self.issue_date, self.due_date);
        errors.into_result()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClientInvoiceUpdate {
    pub status: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub subtotal: Option<Decimal>,
    pub tax_rate: Option<Decimal>,
    pub notes: Option<String>,
}

impl ClientInvoiceUpdate {
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut errors = FieldErrors::new();
        check_manual_status(&mut errors, self.status.as_deref(), CLIENT_INVOICE_STATUSES);
        pricing::validate_money(&mut errors, "subtotal", self.subtotal);
        pricing::validate_tax_rate(&mut errors, self.tax_rate);
        errors.into_result()
    }
}

/// Tax and total from a subtotal, rounded like line items
pub fn invoice_totals(subtotal: Decimal, tax_rate: Decimal) -> Result<(Decimal, Decimal), ServiceError> {
    pricing::tax_and_total(round_money(subtotal), tax_rate)
}

/// Once money has been received only the statuses in `allowed` remain
fn check_status_after_payment(
    number: &str,
    current: &str,
    requested: Option<&str>,
    amount_paid: Decimal,
    allowed: &[&str],
) -> Result<(), ServiceError> {
    match requested {
        Some(status) if status != current && amount_paid > Decimal::ZERO && !allowed.contains(&status) => {
            Err(ServiceError::InvalidState(format!(
                "Invoice {} already has payments; it can only be marked {}",
                number,
                allowed.join(" or ")
            )))
        }
        _ => Ok(()),
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InvoiceFilter {
    pub status: Option<String>,
    pub client_id: Option<Uuid>,
    pub vendor_id: Option<Uuid>,
}

pub async fn list_client(
    pool: &PgPool,
    params: &ListParams,
    filter: &InvoiceFilter,
    include_inactive: bool,
) -> Result<Vec<ClientInvoice>, ServiceError> {
    let sql = format!(
        "SELECT {CLIENT_INVOICE_COLUMNS} FROM client_invoices
         WHERE ($1 OR is_active = true)
         AND ($2::text IS NULL OR invoice_number ILIKE $2 OR notes ILIKE $2)
         AND ($3::text IS NULL OR status = $3)
         AND ($4::uuid IS NULL OR client_id = $4)
         ORDER BY invoice_number DESC
         LIMIT $5 OFFSET $6"
    );
    let rows = sqlx::query_as::<_, ClientInvoice>(&sql)
        .bind(include_inactive)
        .bind(params.search_pattern())
        .bind(filter.status.as_deref())
        .bind(filter.client_id)
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

pub async fn get_client(pool: &PgPool, id: Uuid) -> Result<ClientInvoice, ServiceError> {
    let sql = format!("SELECT {CLIENT_INVOICE_COLUMNS} FROM client_invoices WHERE id = $1");
    sqlx::query_as::<_, ClientInvoice>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ServiceError::not_found(EntityType::ClientInvoice))
}

pub async fn create_client(pool: &PgPool, input: NewClientInvoice, user_id: Uuid) -> Result<ClientInvoice, ServiceError> {
    let mut tx = pool.begin().await?;
    ensure_active(&mut tx, EntityType::Client, "client_id", input.client_id).await?;
    if let Some(project_id) = input.project_id {
        ensure_active(&mut tx, EntityType::Project, "project_id", project_id).await?;
    }

    let issue_date = input.issue_date.unwrap_or_else(|| Utc::now().date_naive());
    let number =
        sequence::allocate(&mut tx, "client_invoices", "invoice_number", &sequence::CLIENT_INVOICE, issue_date).await?;
    let tax_rate = input.tax_rate.unwrap_or(Decimal::ZERO);
    let (tax_amount, total) = invoice_totals(input.subtotal, tax_rate)?;

    let id = Uuid::new_v4();
    let sql = format!(
        "INSERT INTO client_invoices (id, invoice_number, client_id, project_id, status, issue_date, due_date,
                                      subtotal, tax_rate, tax_amount, total, notes, created_by)
         VALUES ($1, $2, $3, $4, 'draft', $5, $6, $7, $8, $9, $10, $11, $12)
         RETURNING {CLIENT_INVOICE_COLUMNS}"
    );
    let invoice = sqlx::query_as::<_, ClientInvoice>(&sql)
        .bind(id)
        .bind(&number)
        .bind(input.client_id)
        .bind(input.project_id)
        .bind(issue_date)
        .bind(input.due_date)
        .bind(round_money(input.subtotal))
        .bind(tax_rate)
        .bind(tax_amount)
        .bind(total)
        .bind(clean(input.notes))
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

    activity::log(
        &mut tx,
        EntityType::ClientInvoice,
        id,
        "created",
        format!("Invoice {} created for {}", number, total),
        Some(user_id),
    )
    .await?;
    tx.commit().await?;

    tracing::info!("Created client invoice {}", number);
    Ok(invoice)
}

pub async fn update_client(
    pool: &PgPool,
    id: Uuid,
    input: ClientInvoiceUpdate,
    user_id: Uuid,
) -> Result<ClientInvoice, ServiceError> {
    let mut tx = pool.begin().await?;
    let sql = format!("SELECT {CLIENT_INVOICE_COLUMNS} FROM client_invoices WHERE id = $1 AND is_active = true FOR UPDATE");
    let current = sqlx::query_as::<_, ClientInvoice>(&sql)
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| ServiceError::not_found(EntityType::ClientInvoice))?;

    if current.status == "void" || current.status == "paid" {
        return Err(ServiceError::InvalidState(format!(
            "Invoice {} is {} and can no longer be edited",
            current.invoice_number, current.status
        )));
    }
    if let Some(due) = input.due_date {
        if due < current.issue_date {
            return Err(ServiceError::validation("due_date", "Due date cannot be before the issue date"));
        }
    }

    check_status_after_payment(
        &current.invoice_number,
        &current.status,
        input.status.as_deref(),
        current.amount_paid,
        CLIENT_STATUSES_AFTER_PAYMENT,
    )?;

    let amounts_changed = input.subtotal.is_some() || input.tax_rate.is_some();
    if amounts_changed && current.amount_paid > Decimal::ZERO {
        return Err(ServiceError::InvalidState(format!(
            "Invoice {} already has payments; amounts are locked",
            current.invoice_number
        )));
    }
    let subtotal = round_money(input.subtotal.unwrap_or(current.subtotal));
    let tax_rate = input.tax_rate.unwrap_or(current.tax_rate);
    let (tax_amount, total) = invoice_totals(subtotal, tax_rate)?;

    let sql = format!(
        "UPDATE client_invoices SET
            status = COALESCE($2, status),
            due_date = COALESCE($3, due_date),
            notes = COALESCE($4, notes),
            subtotal = $5, tax_rate = $6, tax_amount = $7, total = $8,
            updated_at = NOW()
         WHERE id = $1
         RETURNING {CLIENT_INVOICE_COLUMNS}"
    );
    let invoice = sqlx::query_as::<_, ClientInvoice>(&sql)
        .bind(id)
        .bind(input.status.as_deref())
        .bind(input.due_date)
        .bind(clean(input.notes))
        .bind(subtotal)
        .bind(tax_rate)
        .bind(tax_amount)
        .bind(total)
        .fetch_one(&mut *tx)
        .await?;

    let summary = match &input.status {
        Some(status) if *status != current.status => {
            format!("Invoice {} {} -> {}", invoice.invoice_number, current.status, status)
        }
        _ => format!("Invoice {} updated", invoice.invoice_number),
    };
    activity::log(&mut tx, EntityType::ClientInvoice, id, "updated", summary, Some(user_id)).await?;
    tx.commit().await?;
    Ok(invoice)
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewVendorInvoice {
    pub vendor_id: Uuid,
    pub purchase_order_id: Option<Uuid>,
    pub vendor_invoice_number: String,
    pub issue_date: NaiveDate,
    pub due_date: Option<NaiveDate>,
    pub total: Decimal,
    pub notes: Option<String>,
}

impl NewVendorInvoice {
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut errors = FieldErrors::new();
        errors
            .require("vendor_invoice_number", &self.vendor_invoice_number)
            .max_len("vendor_invoice_number", Some(&self.vendor_invoice_number), 100);
        pricing::validate_money(&mut errors, "total", Some(self.total));
        check_due(&mut errors, Some(self.issue_date), self.due_date);
        errors.into_result()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VendorInvoiceUpdate {
    pub status: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub total: Option<Decimal>,
    pub notes: Option<String>,
}

impl VendorInvoiceUpdate {
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut errors = FieldErrors::new();
        check_manual_status(&mut errors, self.status.as_deref(), VENDOR_INVOICE_STATUSES);
        pricing::validate_money(&mut errors, "total", self.total);
        errors.into_result()
    }
}

pub async fn list_vendor(
    pool: &PgPool,
    params: &ListParams,
    filter: &InvoiceFilter,
    include_inactive: bool,
) -> Result<Vec<VendorInvoice>, ServiceError> {
    let sql = format!(
        "SELECT {VENDOR_INVOICE_COLUMNS} FROM vendor_invoices
         WHERE ($1 OR is_active = true)
         AND ($2::text IS NULL OR reference_number ILIKE $2 OR vendor_invoice_number ILIKE $2)
         AND ($3::text IS NULL OR status = $3)
         AND ($4::uuid IS NULL OR vendor_id = $4)
         ORDER BY reference_number DESC
         LIMIT $5 OFFSET $6"
    );
    let rows = sqlx::query_as::<_, VendorInvoice>(&sql)
        .bind(include_inactive)
        .bind(params.search_pattern())
        .bind(filter.status.as_deref())
        .bind(filter.vendor_id)
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

pub async fn get_vendor(pool: &PgPool, id: Uuid) -> Result<VendorInvoice, ServiceError> {
    let sql = format!("SELECT {VENDOR_INVOICE_COLUMNS} FROM vendor_invoices WHERE id = $1");
    sqlx::query_as::<_, VendorInvoice>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ServiceError::not_found(EntityType::VendorInvoice))
}

/// Duplicate vendor invoice numbers per vendor are rejected by a unique index
pub async fn create_vendor(pool: &PgPool, input: NewVendorInvoice, user_id: Uuid) -> Result<VendorInvoice, ServiceError> {
    let mut tx = pool.begin().await?;
    ensure_active(&mut tx, EntityType::Vendor, "vendor_id", input.vendor_id).await?;
    if let Some(po_id) = input.purchase_order_id {
        let po_vendor: Option<Uuid> = sqlx::query_scalar("SELECT vendor_id FROM purchase_orders WHERE id = $1 AND is_active = true")
            .bind(po_id)
            .fetch_optional(&mut *tx)
            .await?;
        match po_vendor {
            Some(vendor_id) if vendor_id == input.vendor_id => {}
            Some(_) => return Err(ServiceError::validation("purchase_order_id", "Purchase order belongs to another vendor")),
            None => return Err(ServiceError::validation("purchase_order_id", "Purchase order does not exist or is archived")),
        }
    }

    let number = sequence::allocate(
        &mut tx,
        "vendor_invoices",
        "reference_number",
        &sequence::VENDOR_INVOICE,
        input.issue_date,
    )
    .await?;

    let id = Uuid::new_v4();
    let sql = format!(
        "INSERT INTO vendor_invoices (id, reference_number, vendor_id, purchase_order_id, vendor_invoice_number,
                                      status, issue_date, due_date, total, notes, created_by)
         VALUES ($1, $2, $3, $4, $5, 'received', $6, $7, $8, $9, $10)
         RETURNING {VENDOR_INVOICE_COLUMNS}"
    );
    let invoice = sqlx::query_as::<_, VendorInvoice>(&sql)
        .bind(id)
        .bind(&number)
        .bind(input.vendor_id)
        .bind(input.purchase_order_id)
        .bind(input.vendor_invoice_number.trim())
        .bind(input.issue_date)
        .bind(input.due_date)
        .bind(round_money(input.total))
        .bind(clean(input.notes))
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

    activity::log(
        &mut tx,
        EntityType::VendorInvoice,
        id,
        "created",
        format!("Vendor invoice {} ({}) recorded", number, invoice.vendor_invoice_number),
        Some(user_id),
    )
    .await?;
    tx.commit().await?;

    tracing::info!("Recorded vendor invoice {}", number);
    Ok(invoice)
}

pub async fn update_vendor(
    pool: &PgPool,
    id: Uuid,
    input: VendorInvoiceUpdate,
    user_id: Uuid,
) -> Result<VendorInvoice, ServiceError> {
    let mut tx = pool.begin().await?;
    let sql = format!("SELECT {VENDOR_INVOICE_COLUMNS} FROM vendor_invoices WHERE id = $1 AND is_active = true FOR UPDATE");
    let current = sqlx::query_as::<_, VendorInvoice>(&sql)
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| ServiceError::not_found(EntityType::VendorInvoice))?;

    if current.status == "void" || current.status == "paid" {
        return Err(ServiceError::InvalidState(format!(
            "Vendor invoice {} is {} and can no longer be edited",
            current.reference_number, current.status
        )));
    }
    check_status_after_payment(
        &current.reference_number,
        &current.status,
        input.status.as_deref(),
        current.amount_paid,
        VENDOR_STATUSES_AFTER_PAYMENT,
    )?;
    if let Some(total) = input.total {
        if total < current.amount_paid {
            return Err(ServiceError::validation("total", "Total cannot be less than the amount already paid"));
        }
    }

    let sql = format!(
        "UPDATE vendor_invoices SET
            status = COALESCE($2, status),
            due_date = COALESCE($3, due_date),
            total = COALESCE($4, total),
            notes = COALESCE($5, notes),
            updated_at = NOW()
         WHERE id = $1
         RETURNING {VENDOR_INVOICE_COLUMNS}"
    );
    let invoice = sqlx::query_as::<_, VendorInvoice>(&sql)
        .bind(id)
        .bind(input.status.as_deref())
        .bind(input.due_date)
        .bind(input.total.map(round_money))
        .bind(clean(input.notes))
        .fetch_one(&mut *tx)
        .await?;

    activity::log(
        &mut tx,
        EntityType::VendorInvoice,
        id,
        "updated",
        format!("Vendor invoice {} updated", invoice.reference_number),
        Some(user_id),
    )
    .await?;
    tx.commit().await?;
    Ok(invoice)
}

pub async fn list_legacy(pool: &PgPool, params: &ListParams) -> Result<Vec<LegacyInvoice>, ServiceError> {
    let sql = format!(
        "SELECT {LEGACY_COLUMNS} FROM legacy_invoices
         WHERE ($1::text IS NULL OR legacy_number ILIKE $1 OR party_name ILIKE $1)
         ORDER BY issue_date DESC NULLS LAST, legacy_number
         LIMIT $2 OFFSET $3"
    );
    let rows = sqlx::query_as::<_, LegacyInvoice>(&sql)
        .bind(params.search_pattern())
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

pub async fn get_legacy(pool: &PgPool, id: Uuid) -> Result<LegacyInvoice, ServiceError> {
    let sql = format!("SELECT {LEGACY_COLUMNS} FROM legacy_invoices WHERE id = $1");
    sqlx::query_as::<_, LegacyInvoice>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ServiceError::NotFound("Legacy invoice not found".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn totals_from_subtotal() {
        assert_eq!(invoice_totals(dec("1000"), dec("15")).unwrap(), (dec("150.00"), dec("1150.00")));
        assert_eq!(invoice_totals(dec("10.005"), Decimal::ZERO).unwrap(), (Decimal::ZERO, dec("10.01")));
    }

    #[test]
    fn totals_beyond_column_limit_are_rejected() {
        assert!(matches!(
            invoice_totals(dec("999999999999.99"), dec("15")),
            Err(ServiceError::Validation { .. })
        ));
        assert!(matches!(
            invoice_totals(Decimal::MAX, dec("100")),
            Err(ServiceError::Validation { .. })
        ));
    }

    #[test]
    fn oversized_amounts_fail_validation() {
        let input = NewClientInvoice {
            client_id: Uuid::new_v4(),
            project_id: None,
            issue_date: None,
            due_date: None,
            subtotal: Decimal::MAX,
            tax_rate: Some(dec("7.125")),
            notes: None,
        };
        let body = input.validate().unwrap_err().to_json();
        assert!(body["field_errors"]["subtotal"].is_string());
        assert!(body["field_errors"]["tax_rate"].is_string());

        let update = ClientInvoiceUpdate { subtotal: Some(dec("10.001")), ..Default::default() };
        assert!(update.validate().is_err());

        let update = VendorInvoiceUpdate { total: Some(dec("1000000000000")), ..Default::default() };
        assert!(update.validate().is_err());
    }

    #[test]
    fn paid_invoices_only_move_to_overdue_or_void() {
        let paid = dec("250.00");
        for status in ["draft", "sent"] {
            assert!(matches!(
                check_status_after_payment("INV-2024-0001", "partially_paid", Some(status), paid, CLIENT_STATUSES_AFTER_PAYMENT),
                Err(ServiceError::InvalidState(_))
            ));
        }
        for status in ["overdue", "void", "partially_paid"] {
            assert!(check_status_after_payment("INV-2024-0001", "partially_paid", Some(status), paid, CLIENT_STATUSES_AFTER_PAYMENT).is_ok());
        }
        assert!(check_status_after_payment("INV-2024-0001", "sent", Some("draft"), Decimal::ZERO, CLIENT_STATUSES_AFTER_PAYMENT).is_ok());
        assert!(check_status_after_payment("VINV-2024-001", "partially_paid", Some("approved"), paid, VENDOR_STATUSES_AFTER_PAYMENT).is_err());
    }

    #[test]
    fn payment_statuses_cannot_be_set_by_hand() {
        let update = ClientInvoiceUpdate { status: Some("paid".into()), ..Default::default() };
        assert!(update.validate().is_err());

        let update = ClientInvoiceUpdate { status: Some("sent".into()), ..Default::default() };
        assert!(update.validate().is_ok());

        let update = VendorInvoiceUpdate { status: Some("sent".into()), ..Default::default() };
        assert!(update.validate().is_err(), "sent is not a vendor invoice status");
    }

    #[test]
    fn vendor_invoice_requires_supplier_number() {
        let input = NewVendorInvoice {
            vendor_id: Uuid::new_v4(),
            purchase_order_id: None,
            vendor_invoice_number: "  ".into(),
            issue_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            due_date: NaiveDate::from_ymd_opt(2024, 2, 1),
            total: dec("10"),
            notes: None,
        };
        let body = input.validate().unwrap_err().to_json();
        assert!(body["field_errors"]["vendor_invoice_number"].is_string());
        assert!(body["field_errors"]["due_date"].is_string());
    }
}

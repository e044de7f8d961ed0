//! Quotations: priced line items, a small status workflow, and conversion
//! into a client invoice.

use chrono::{Days, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use super::invoices::CLIENT_INVOICE_COLUMNS;
use super::pricing::{self, LineItemInput};
use super::{activity, ensure_active, ServiceError};
use crate::database::models::invoice::ClientInvoice;
use crate::database::models::quotation::{Quotation, QuotationDetail};
use crate::database::sequence;
use crate::error::ApiError;
use crate::types::{EntityType, ListParams};
use crate::validation::{clean, FieldErrors};

pub const QUOTATION_STATUSES: &[&str] = &["draft", "sent", "accepted", "rejected", "expired", "converted"];

/// Days between conversion and the invoice due date
pub const INVOICE_TERMS_DAYS: u64 = 30;

const COLUMNS: &str = "id, quotation_number, client_id, project_id, title, status, issue_date, valid_until, \
                       subtotal, tax_rate, tax_amount, total, notes, is_active, created_by, created_at, updated_at";

/// Status changes allowed through the status endpoint; `converted` is only
/// reachable through conversion.
pub fn can_transition(from: &str, to: &str) -> bool {
    matches!(
        (from, to),
        ("draft", "sent") | ("draft", "rejected") | ("sent", "accepted") | ("sent", "rejected") | ("sent", "expired")
    )
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewQuotation {
    pub client_id: Uuid,
    pub project_id: Option<Uuid>,
    pub title: String,
    pub issue_date: Option<NaiveDate>,
    pub valid_until: Option<NaiveDate>,
    pub tax_rate: Option<Decimal>,
    pub notes: Option<String>,
    pub items: Vec<LineItemInput>,
}

impl NewQuotation {
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut errors = FieldErrors::new();
        errors.require("title", &self.title).max_len("title", Some(&self.title), 200);
        if let (Some(issued), Some(valid)) = (self.issue_date, self.valid_until) {
            errors.check(valid >= issued, "valid_until", "Validity cannot end before the issue date");
        }
        pricing::validate_lines(&mut errors, &self.items, self.tax_rate);
        errors.into_result()
    }
}

/// Replaces every line when `items` is present
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QuotationUpdate {
    pub title: Option<String>,
    pub project_id: Option<Uuid>,
    pub valid_until: Option<NaiveDate>,
    pub tax_rate: Option<Decimal>,
    pub notes: Option<String>,
    pub items: Option<Vec<LineItemInput>>,
}

impl QuotationUpdate {
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut errors = FieldErrors::new();
        if let Some(title) = &self.title {
            errors.require("title", title).max_len("title", Some(title), 200);
        }
        if let Some(items) = &self.items {
            pricing::validate_items(&mut errors, items);
        }
        pricing::validate_tax_rate(&mut errors, self.tax_rate);
        errors.into_result()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatusChange {
    pub status: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct QuotationFilter {
    pub client_id: Option<Uuid>,
    pub status: Option<String>,
}

pub async fn list(
    pool: &PgPool,
    params: &ListParams,
    filter: &QuotationFilter,
    include_inactive: bool,
) -> Result<Vec<Quotation>, ServiceError> {
    let sql = format!(
        "SELECT {COLUMNS} FROM quotations
         WHERE ($1 OR is_active = true)
         AND ($2::text IS NULL OR title ILIKE $2 OR quotation_number ILIKE $2)
         AND ($3::uuid IS NULL OR client_id = $3)
         AND ($4::text IS NULL OR status = $4)
         ORDER BY quotation_number DESC
         LIMIT $5 OFFSET $6"
    );
    let rows = sqlx::query_as::<_, Quotation>(&sql)
        .bind(include_inactive)
        .bind(params.search_pattern())
        .bind(filter.client_id)
        .bind(filter.status.as_deref())
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

pub async fn get(pool: &PgPool, id: Uuid) -> Result<QuotationDetail, ServiceError> {
    let sql = format!("SELECT {COLUMNS} FROM quotations WHERE id = $1");
    let quotation = sqlx::query_as::<_, Quotation>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ServiceError::not_found(EntityType::Quotation))?;
    let items = pricing::load_lines(pool, "quotation_items", "quotation_id", id).await?;
    Ok(QuotationDetail { quotation, items })
}

/// Number, header, lines and activity in one transaction
pub async fn create(pool: &PgPool, input: NewQuotation, user_id: Uuid) -> Result<QuotationDetail, ServiceError> {
    let mut tx = pool.begin().await?;
    ensure_active(&mut tx, EntityType::Client, "client_id", input.client_id).await?;
    if let Some(project_id) = input.project_id {
        ensure_active(&mut tx, EntityType::Project, "project_id", project_id).await?;
    }

    let issue_date = input.issue_date.unwrap_or_else(|| Utc::now().date_naive());
    let number = sequence::allocate(&mut tx, "quotations", "quotation_number", &sequence::QUOTATION, issue_date).await?;
    let (lines, totals) = pricing::price(&input.items, input.tax_rate.unwrap_or(Decimal::ZERO))?;

    let id = Uuid::new_v4();
    let sql = format!(
        "INSERT INTO quotations (id, quotation_number, client_id, project_id, title, status, issue_date, valid_until,
                                 subtotal, tax_rate, tax_amount, total, notes, created_by)
         VALUES ($1, $2, $3, $4, $5, 'draft', $6, $7, $8, $9, $10, $11, $12, $13)
         RETURNING {COLUMNS}"
    );
    let quotation = sqlx::query_as::<_, Quotation>(&sql)
        .bind(id)
        .bind(&number)
        .bind(input.client_id)
        .bind(input.project_id)
        .bind(input.title.trim())
        .bind(issue_date)
        .bind(input.valid_until)
        .bind(totals.subtotal)
        .bind(totals.tax_rate)
        .bind(totals.tax_amount)
        .bind(totals.total)
        .bind(clean(input.notes))
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

    pricing::insert_lines(&mut tx, "quotation_items", "quotation_id", id, &lines).await?;
    activity::log(
        &mut tx,
        EntityType::Quotation,
        id,
        "created",
        format!("Quotation {} created for {}", number, totals.total),
        Some(user_id),
    )
    .await?;

    let items = pricing::load_lines(&mut *tx, "quotation_items", "quotation_id", id).await?;
    tx.commit().await?;

    tracing::info!("Created quotation {} with {} lines", number, items.len());
    Ok(QuotationDetail { quotation, items })
}

async fn lock(tx: &mut sqlx::PgConnection, id: Uuid) -> Result<Quotation, ServiceError> {
    let sql = format!("SELECT {COLUMNS} FROM quotations WHERE id = $1 AND is_active = true FOR UPDATE");
    sqlx::query_as::<_, Quotation>(&sql)
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| ServiceError::not_found(EntityType::Quotation))
}

/// Only drafts are editable; new items recompute every total
pub async fn update(
    pool: &PgPool,
    id: Uuid,
    input: QuotationUpdate,
    user_id: Uuid,
) -> Result<QuotationDetail, ServiceError> {
    let mut tx = pool.begin().await?;
    let current = lock(&mut tx, id).await?;
    if current.status != "draft" {
        return Err(ServiceError::InvalidState(format!(
            "Quotation {} is {} and can no longer be edited",
            current.quotation_number, current.status
        )));
    }
    if let Some(project_id) = input.project_id {
        ensure_active(&mut tx, EntityType::Project, "project_id", project_id).await?;
    }
    if let Some(valid_until) = input.valid_until {
        if valid_until < current.issue_date {
            return Err(ServiceError::validation("valid_until", "Validity cannot end before the issue date"));
        }
    }

    let tax_rate = input.tax_rate.unwrap_or(current.tax_rate);
    let totals = match &input.items {
        Some(items) => {
            let (lines, totals) = pricing::price(items, tax_rate)?;
            pricing::replace_lines(&mut tx, "quotation_items", "quotation_id", id, &lines).await?;
            totals
        }
        None => {
            let existing = pricing::load_lines(&mut *tx, "quotation_items", "quotation_id", id).await?;
            let inputs: Vec<LineItemInput> = existing
                .into_iter()
                .map(|l| LineItemInput { description: l.description, quantity: l.quantity, unit_price: l.unit_price })
                .collect();
            pricing::price(&inputs, tax_rate)?.1
        }
    };

    let sql = format!(
        "UPDATE quotations SET
            title = COALESCE($2, title),
            project_id = COALESCE($3, project_id),
            valid_until = COALESCE($4, valid_until),
            notes = COALESCE($5, notes),
            subtotal = $6, tax_rate = $7, tax_amount = $8, total = $9,
            updated_at = NOW()
         WHERE id = $1
         RETURNING {COLUMNS}"
    );
    let quotation = sqlx::query_as::<_, Quotation>(&sql)
        .bind(id)
        .bind(clean(input.title))
        .bind(input.project_id)
        .bind(input.valid_until)
        .bind(clean(input.notes))
        .bind(totals.subtotal)
        .bind(totals.tax_rate)
        .bind(totals.tax_amount)
        .bind(totals.total)
        .fetch_one(&mut *tx)
        .await?;

    activity::log(
        &mut tx,
        EntityType::Quotation,
        id,
        "updated",
        format!("Quotation {} updated, total {}", quotation.quotation_number, quotation.total),
        Some(user_id),
    )
    .await?;

    let items = pricing::load_lines(&mut *tx, "quotation_items", "quotation_id", id).await?;
    tx.commit().await?;
    Ok(QuotationDetail { quotation, items })
}

pub async fn set_status(pool: &PgPool, id: Uuid, status: &str, user_id: Uuid) -> Result<Quotation, ServiceError> {
    if !QUOTATION_STATUSES.contains(&status) {
        return Err(ServiceError::validation(
            "status",
            format!("Must be one of: {}", QUOTATION_STATUSES.join(", ")),
        ));
    }

    let mut tx = pool.begin().await?;
    let current = lock(&mut tx, id).await?;
    if !can_transition(&current.status, status) {
        return Err(ServiceError::InvalidState(format!(
            "Quotation {} cannot move from {} to {}",
            current.quotation_number, current.status, status
        )));
    }

    let sql = format!("UPDATE quotations SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING {COLUMNS}");
    let quotation = sqlx::query_as::<_, Quotation>(&sql)
        .bind(id)
        .bind(status)
        .fetch_one(&mut *tx)
        .await?;

    activity::log(
        &mut tx,
        EntityType::Quotation,
        id,
        "status_changed",
        format!("Quotation {} {} -> {}", quotation.quotation_number, current.status, status),
        Some(user_id),
    )
    .await?;
    tx.commit().await?;

    tracing::info!("Quotation {} moved to {}", quotation.quotation_number, status);
    Ok(quotation)
}

/// Turn an accepted quotation into a draft client invoice carrying its totals
pub async fn convert(pool: &PgPool, id: Uuid, user_id: Uuid) -> Result<ClientInvoice, ServiceError> {
    let mut tx = pool.begin().await?;
    let quotation = lock(&mut tx, id).await?;
    if quotation.status != "accepted" {
        return Err(ServiceError::InvalidState(format!(
            "Only accepted quotations can be converted; {} is {}",
            quotation.quotation_number, quotation.status
        )));
    }

    let issue_date = Utc::now().date_naive();
    let due_date = issue_date.checked_add_days(Days::new(INVOICE_TERMS_DAYS));
    let number =
        sequence::allocate(&mut tx, "client_invoices", "invoice_number", &sequence::CLIENT_INVOICE, issue_date).await?;

    let invoice_id = Uuid::new_v4();
    let sql = format!(
        "INSERT INTO client_invoices (id, invoice_number, client_id, project_id, quotation_id, status, issue_date, due_date,
                                      subtotal, tax_rate, tax_amount, total, notes, created_by)
         VALUES ($1, $2, $3, $4, $5, 'draft', $6, $7, $8, $9, $10, $11, $12, $13)
         RETURNING {CLIENT_INVOICE_COLUMNS}"
    );
    let invoice = sqlx::query_as::<_, ClientInvoice>(&sql)
        .bind(invoice_id)
        .bind(&number)
        .bind(quotation.client_id)
        .bind(quotation.project_id)
        .bind(quotation.id)
        .bind(issue_date)
        .bind(due_date)
        .bind(quotation.subtotal)
        .bind(quotation.tax_rate)
        .bind(quotation.tax_amount)
        .bind(quotation.total)
        .bind(format!("{}: {}", quotation.quotation_number, quotation.title))
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

    sqlx::query("UPDATE quotations SET status = 'converted', updated_at = NOW() WHERE id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    activity::log(
        &mut tx,
        EntityType::Quotation,
        id,
        "converted",
        format!("Quotation {} converted to invoice {}", quotation.quotation_number, number),
        Some(user_id),
    )
    .await?;
    activity::log(
        &mut tx,
        EntityType::ClientInvoice,
        invoice_id,
        "created",
        format!("Invoice {} created from quotation {}", number, quotation.quotation_number),
        Some(user_id),
    )
    .await?;

    tx.commit().await?;
    tracing::info!("Converted quotation {} into invoice {}", quotation.quotation_number, number);
    Ok(invoice)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workflow_transitions() {
        assert!(can_transition("draft", "sent"));
        assert!(can_transition("draft", "rejected"));
        assert!(can_transition("sent", "accepted"));
        assert!(can_transition("sent", "expired"));
        assert!(!can_transition("draft", "accepted"));
        assert!(!can_transition("accepted", "sent"));
        assert!(!can_transition("accepted", "converted"));
        assert!(!can_transition("converted", "draft"));
    }

    #[test]
    fn update_without_items_only_checks_present_fields() {
        assert!(QuotationUpdate::default().validate().is_ok());

        let bad_rate = QuotationUpdate { tax_rate: Some(Decimal::from(101)), ..Default::default() };
        let body = bad_rate.validate().unwrap_err().to_json();
        assert!(body["field_errors"]["tax_rate"].is_string());
        assert!(body["field_errors"].get("items").is_none());

        let no_lines = QuotationUpdate { items: Some(vec![]), ..Default::default() };
        assert!(no_lines.validate().is_err());
    }

    #[test]
    fn new_quotation_needs_lines() {
        let input = NewQuotation {
            client_id: Uuid::new_v4(),
            project_id: None,
            title: "Office refit".into(),
            issue_date: None,
            valid_until: None,
            tax_rate: None,
            notes: None,
            items: vec![],
        };
        let body = input.validate().unwrap_err().to_json();
        assert!(body["field_errors"]["items"].is_string());
    }
}

//! Purchase orders: vendor-coded numbers, line items and manager approval.

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use super::pricing::{self, LineItemInput};
use super::{activity, ensure_active, ServiceError};
use crate::auth::Role;
use crate::database::models::purchase_order::{PurchaseOrder, PurchaseOrderDetail};
use crate::database::sequence;
use crate::error::ApiError;
use crate::types::{EntityType, ListParams};
use crate::validation::{clean, FieldErrors};

pub const PO_STATUSES: &[&str] = &["pending_approval", "approved", "ordered", "received", "cancelled"];

/// Roles told about purchase orders awaiting approval
pub const APPROVERS: &[Role] = &[Role::Admin, Role::Manager];

const COLUMNS: &str = "id, po_number, vendor_id, project_id, status, order_date, expected_date, subtotal, tax_rate, \
                       tax_amount, total, notes, approved_by, approved_at, is_active, created_by, created_at, updated_at";

/// Status changes allowed through updates; approval has its own endpoint
pub fn can_transition(from: &str, to: &str) -> bool {
    matches!(
        (from, to),
        ("pending_approval", "cancelled")
            | ("approved", "ordered")
            | ("approved", "cancelled")
            | ("ordered", "received")
            | ("ordered", "cancelled")
    )
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewPurchaseOrder {
    pub vendor_id: Uuid,
    pub project_id: Option<Uuid>,
    pub order_date: Option<NaiveDate>,
    pub expected_date: Option<NaiveDate>,
    pub tax_rate: Option<Decimal>,
    pub notes: Option<String>,
    pub items: Vec<LineItemInput>,
}

impl NewPurchaseOrder {
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut errors = FieldErrors::new();
        if let (Some(order), Some(expected)) = (self.order_date, self.expected_date) {
            errors.check(expected >= order, "expected_date", "Expected date cannot be before the order date");
        }
        pricing::validate_lines(&mut errors, &self.items, self.tax_rate);
        errors.into_result()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PurchaseOrderUpdate {
    pub status: Option<String>,
    pub expected_date: Option<NaiveDate>,
    pub tax_rate: Option<Decimal>,
    pub notes: Option<String>,
    pub items: Option<Vec<LineItemInput>>,
}

impl PurchaseOrderUpdate {
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut errors = FieldErrors::new();
        errors.one_of("status", self.status.as_deref(), PO_STATUSES);
        if let Some(items) = &self.items {
            pricing::validate_items(&mut errors, items);
        }
        pricing::validate_tax_rate(&mut errors, self.tax_rate);
        errors.into_result()
    }

    fn changes_lines(&self) -> bool {
        self.items.is_some() || self.tax_rate.is_some()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PurchaseOrderFilter {
    pub vendor_id: Option<Uuid>,
    pub status: Option<String>,
}

pub async fn list(
    pool: &PgPool,
    params: &ListParams,
    filter: &PurchaseOrderFilter,
    include_inactive: bool,
) -> Result<Vec<PurchaseOrder>, ServiceError> {
    let sql = format!(
        "SELECT {COLUMNS} FROM purchase_orders
         WHERE ($1 OR is_active = true)
         AND ($2::text IS NULL OR po_number ILIKE $2 OR notes ILIKE $2)
         AND ($3::uuid IS NULL OR vendor_id = $3)
         AND ($4::text IS NULL OR status = $4)
         ORDER BY order_date DESC, po_number DESC
         LIMIT $5 OFFSET $6"
    );
    let rows = sqlx::query_as::<_, PurchaseOrder>(&sql)
        .bind(include_inactive)
        .bind(params.search_pattern())
        .bind(filter.vendor_id)
        .bind(filter.status.as_deref())
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

pub async fn get(pool: &PgPool, id: Uuid) -> Result<PurchaseOrderDetail, ServiceError> {
    let sql = format!("SELECT {COLUMNS} FROM purchase_orders WHERE id = $1");
    let purchase_order = sqlx::query_as::<_, PurchaseOrder>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ServiceError::not_found(EntityType::PurchaseOrder))?;
    let items = pricing::load_lines(pool, "purchase_order_items", "purchase_order_id", id).await?;
    Ok(PurchaseOrderDetail { purchase_order, items })
}

/// Insert the order and its lines, then ask approvers to review it
pub async fn create(pool: &PgPool, input: NewPurchaseOrder, user_id: Uuid) -> Result<PurchaseOrderDetail, ServiceError> {
    let mut tx = pool.begin().await?;

    let vendor_name: String = sqlx::query_scalar("SELECT name FROM vendors WHERE id = $1 AND is_active = true")
        .bind(input.vendor_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| ServiceError::validation("vendor_id", "Vendor does not exist or is archived"))?;
    if let Some(project_id) = input.project_id {
        ensure_active(&mut tx, EntityType::Project, "project_id", project_id).await?;
    }

    let order_date = input.order_date.unwrap_or_else(|| Utc::now().date_naive());
    let number = sequence::allocate_purchase_order(&mut tx, &vendor_name, order_date).await?;
    let (lines, totals) = pricing::price(&input.items, input.tax_rate.unwrap_or(Decimal::ZERO))?;

    let id = Uuid::new_v4();
    let sql = format!(
        "INSERT INTO purchase_orders (id, po_number, vendor_id, project_id, status, order_date, expected_date,
                                      subtotal, tax_rate, tax_amount, total, notes, created_by)
         VALUES ($1, $2, $3, $4, 'pending_approval', $5, $6, $7, $8, $9, $10, $11, $12)
         RETURNING {COLUMNS}"
    );
    let purchase_order = sqlx::query_as::<_, PurchaseOrder>(&sql)
        .bind(id)
        .bind(&number)
        .bind(input.vendor_id)
        .bind(input.project_id)
        .bind(order_date)
        .bind(input.expected_date)
        .bind(totals.subtotal)
        .bind(totals.tax_rate)
        .bind(totals.tax_amount)
        .bind(totals.total)
        .bind(clean(input.notes))
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

    pricing::insert_lines(&mut tx, "purchase_order_items", "purchase_order_id", id, &lines).await?;
    activity::log(
        &mut tx,
        EntityType::PurchaseOrder,
        id,
        "created",
        format!("Purchase order {} raised with {} for {}", number, vendor_name, totals.total),
        Some(user_id),
    )
    .await?;

    let link = format!("/app/purchase-orders/{}", id);
    let notified = activity::notify_roles(
        &mut tx,
        APPROVERS,
        None,
        "PO awaiting approval",
        &format!("{} for {} ({}) needs approval", number, vendor_name, totals.total),
        Some(&link),
    )
    .await?;

    let items = pricing::load_lines(&mut *tx, "purchase_order_items", "purchase_order_id", id).await?;
    tx.commit().await?;

    tracing::info!("Created purchase order {}; notified {} approvers", number, notified);
    Ok(PurchaseOrderDetail { purchase_order, items })
}

async fn lock(tx: &mut sqlx::PgConnection, id: Uuid) -> Result<PurchaseOrder, ServiceError> {
    let sql = format!("SELECT {COLUMNS} FROM purchase_orders WHERE id = $1 AND is_active = true FOR UPDATE");
    sqlx::query_as::<_, PurchaseOrder>(&sql)
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| ServiceError::not_found(EntityType::PurchaseOrder))
}

/// Lines and tax are editable while pending approval; status follows `can_transition`
pub async fn update(
    pool: &PgPool,
    id: Uuid,
    input: PurchaseOrderUpdate,
    user_id: Uuid,
) -> Result<PurchaseOrderDetail, ServiceError> {
    let mut tx = pool.begin().await?;
    let current = lock(&mut tx, id).await?;

    if let Some(status) = input.status.as_deref() {
        if status != current.status && !can_transition(&current.status, status) {
            return Err(ServiceError::InvalidState(format!(
                "Purchase order {} cannot move from {} to {}",
                current.po_number, current.status, status
            )));
        }
    }
    if input.changes_lines() && current.status != "pending_approval" {
        return Err(ServiceError::InvalidState(format!(
            "Purchase order {} is {}; lines can only change before approval",
            current.po_number, current.status
        )));
    }
    if let Some(expected) = input.expected_date {
        if expected < current.order_date {
            return Err(ServiceError::validation("expected_date", "Expected date cannot be before the order date"));
        }
    }

    let tax_rate = input.tax_rate.unwrap_or(current.tax_rate);
    let totals = match &input.items {
        Some(items) => {
            let (lines, totals) = pricing::price(items, tax_rate)?;
            pricing::replace_lines(&mut tx, "purchase_order_items", "purchase_order_id", id, &lines).await?;
            totals
        }
        None => {
            let existing = pricing::load_lines(&mut *tx, "purchase_order_items", "purchase_order_id", id).await?;
            let inputs: Vec<LineItemInput> = existing
                .into_iter()
                .map(|l| LineItemInput { description: l.description, quantity: l.quantity, unit_price: l.unit_price })
                .collect();
            pricing::price(&inputs, tax_rate)?.1
        }
    };

    let sql = format!(
        "UPDATE purchase_orders SET
            status = COALESCE($2, status),
            expected_date = COALESCE($3, expected_date),
            notes = COALESCE($4, notes),
            subtotal = $5, tax_rate = $6, tax_amount = $7, total = $8,
            updated_at = NOW()
         WHERE id = $1
         RETURNING {COLUMNS}"
    );
    let purchase_order = sqlx::query_as::<_, PurchaseOrder>(&sql)
        .bind(id)
        .bind(input.status.as_deref())
        .bind(input.expected_date)
        .bind(clean(input.notes))
        .bind(totals.subtotal)
        .bind(totals.tax_rate)
        .bind(totals.tax_amount)
        .bind(totals.total)
        .fetch_one(&mut *tx)
        .await?;

    let summary = match input.status.as_deref() {
        Some(status) if status != current.status => {
            format!("Purchase order {} {} -> {}", current.po_number, current.status, status)
        }
        _ => format!("Purchase order {} updated", current.po_number),
    };
    activity::log(&mut tx, EntityType::PurchaseOrder, id, "updated", summary, Some(user_id)).await?;

    let items = pricing::load_lines(&mut *tx, "purchase_order_items", "purchase_order_id", id).await?;
    tx.commit().await?;
    Ok(PurchaseOrderDetail { purchase_order, items })
}

/// Approve a pending order and tell whoever raised it
pub async fn approve(pool: &PgPool, id: Uuid, approver_id: Uuid) -> Result<PurchaseOrder, ServiceError> {
    let mut tx = pool.begin().await?;
    let current = lock(&mut tx, id).await?;
    if current.status != "pending_approval" {
        return Err(ServiceError::InvalidState(format!(
            "Purchase order {} is {}, not pending approval",
            current.po_number, current.status
        )));
    }

    let sql = format!(
        "UPDATE purchase_orders
         SET status = 'approved', approved_by = $2, approved_at = NOW(), updated_at = NOW()
         WHERE id = $1
         RETURNING {COLUMNS}"
    );
    let purchase_order = sqlx::query_as::<_, PurchaseOrder>(&sql)
        .bind(id)
        .bind(approver_id)
        .fetch_one(&mut *tx)
        .await?;

    activity::log(
        &mut tx,
        EntityType::PurchaseOrder,
        id,
        "approved",
        format!("Purchase order {} approved", purchase_order.po_number),
        Some(approver_id),
    )
    .await?;

    if let Some(creator) = purchase_order.created_by.filter(|c| *c != approver_id) {
        let link = format!("/app/purchase-orders/{}", id);
        activity::notify(
            &mut tx,
            creator,
            "PO approved",
            &format!("{} has been approved", purchase_order.po_number),
            Some(&link),
        )
        .await?;
    }

    tx.commit().await?;
    tracing::info!("Purchase order {} approved by {}", purchase_order.po_number, approver_id);
    Ok(purchase_order)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn approval_is_not_an_update_transition() {
        assert!(!can_transition("pending_approval", "approved"));
        assert!(can_transition("pending_approval", "cancelled"));
        assert!(can_transition("approved", "ordered"));
        assert!(can_transition("ordered", "received"));
        assert!(!can_transition("received", "cancelled"));
        assert!(!can_transition("cancelled", "approved"));
    }

    #[test]
    fn expected_date_follows_order_date() {
        let input = NewPurchaseOrder {
            vendor_id: Uuid::new_v4(),
            project_id: None,
            order_date: NaiveDate::from_ymd_opt(2024, 3, 15),
            expected_date: NaiveDate::from_ymd_opt(2024, 3, 1),
            tax_rate: None,
            notes: None,
            items: vec![LineItemInput {
                description: "Cable".into(),
                quantity: Decimal::ONE,
                unit_price: Decimal::TEN,
            }],
        };
        let body = input.validate().unwrap_err().to_json();
        assert!(body["field_errors"]["expected_date"].is_string());
    }

    #[test]
    fn update_detects_line_changes() {
        assert!(!PurchaseOrderUpdate::default().changes_lines());
        let update = PurchaseOrderUpdate { tax_rate: Some(Decimal::TEN), ..Default::default() };
        assert!(update.changes_lines());
    }
}

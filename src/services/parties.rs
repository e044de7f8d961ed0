//! Clients and vendors: same shape, different numbering and tables.

use chrono::Utc;
use serde::Deserialize;
use sqlx::{postgres::PgRow, FromRow, PgPool};
use uuid::Uuid;

use super::{activity, ServiceError};
use crate::database::sequence::{self, SequenceFormat};
use crate::error::ApiError;
use crate::types::{EntityType, ListParams};
use crate::validation::{clean, FieldErrors};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartyKind {
    Client,
    Vendor,
}

impl PartyKind {
    pub fn entity(self) -> EntityType {
        match self {
            PartyKind::Client => EntityType::Client,
            PartyKind::Vendor => EntityType::Vendor,
        }
    }

    fn table(self) -> &'static str {
        self.entity().table()
    }

    pub fn number_column(self) -> &'static str {
        match self {
            PartyKind::Client => "client_number",
            PartyKind::Vendor => "vendor_number",
        }
    }

    fn format(self) -> &'static SequenceFormat {
        match self {
            PartyKind::Client => &sequence::CLIENT,
            PartyKind::Vendor => &sequence::VENDOR,
        }
    }

    fn columns(self) -> String {
        format!(
            "id, {}, name, contact_person, email, phone, address, tax_number, accounting_contact_id, \
             is_active, created_by, created_at, updated_at",
            self.number_column()
        )
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewParty {
    pub name: String,
    pub contact_person: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub tax_number: Option<String>,
}

impl NewParty {
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut errors = FieldErrors::new();
        errors
            .require("name", &self.name)
            .max_len("name", Some(&self.name), 200)
            .email("email", self.email.as_deref())
            .max_len("phone", self.phone.as_deref(), 50)
            .max_len("tax_number", self.tax_number.as_deref(), 50);
        errors.into_result()
    }
}

/// Absent fields are left unchanged
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PartyUpdate {
    pub name: Option<String>,
    pub contact_person: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub tax_number: Option<String>,
}

impl PartyUpdate {
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut errors = FieldErrors::new();
        if let Some(name) = &self.name {
            errors.require("name", name).max_len("name", Some(name), 200);
        }
        errors
            .email("email", self.email.as_deref())
            .max_len("phone", self.phone.as_deref(), 50)
            .max_len("tax_number", self.tax_number.as_deref(), 50);
        errors.into_result()
    }
}

pub async fn list<T>(
    pool: &PgPool,
    kind: PartyKind,
    params: &ListParams,
    include_inactive: bool,
) -> Result<Vec<T>, ServiceError>
where
    T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
{
    let sql = format!(
        "SELECT {cols} FROM {table}
         WHERE ($1 OR is_active = true)
         AND ($2::text IS NULL OR name ILIKE $2 OR {num} ILIKE $2 OR email ILIKE $2)
         ORDER BY {num}
         LIMIT $3 OFFSET $4",
        cols = kind.columns(),
        table = kind.table(),
        num = kind.number_column(),
    );
    let rows = sqlx::query_as::<_, T>(&sql)
        .bind(include_inactive)
        .bind(params.search_pattern())
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

pub async fn get<T>(pool: &PgPool, kind: PartyKind, id: Uuid) -> Result<T, ServiceError>
where
    T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
{
    let sql = format!("SELECT {} FROM {} WHERE id = $1", kind.columns(), kind.table());
    sqlx::query_as::<_, T>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ServiceError::not_found(kind.entity()))
}

/// Allocate the next party number and insert, in one transaction
pub async fn create<T>(pool: &PgPool, kind: PartyKind, input: NewParty, user_id: Uuid) -> Result<T, ServiceError>
where
    T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
{
    let mut tx = pool.begin().await?;
    let number = sequence::allocate(
        &mut tx,
        kind.table(),
        kind.number_column(),
        kind.format(),
        Utc::now().date_naive(),
    )
    .await?;

    let id = Uuid::new_v4();
    let sql = format!(
        "INSERT INTO {table} (id, {num}, name, contact_person, email, phone, address, tax_number, created_by)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
         RETURNING {cols}",
        table = kind.table(),
        num = kind.number_column(),
        cols = kind.columns(),
    );
    let row = sqlx::query_as::<_, T>(&sql)
        .bind(id)
        .bind(&number)
        .bind(input.name.trim())
        .bind(clean(input.contact_person))
        .bind(clean(input.email).map(|e| e.to_lowercase()))
        .bind(clean(input.phone))
        .bind(clean(input.address))
        .bind(clean(input.tax_number))
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

    activity::log(
        &mut tx,
        kind.entity(),
        id,
        "created",
        format!("{} {} created", kind.entity().label(), number),
        Some(user_id),
    )
    .await?;

    tx.commit().await?;
    tracing::info!("Created {} {}", kind.entity(), number);
    Ok(row)
}

pub async fn update<T>(
    pool: &PgPool,
    kind: PartyKind,
    id: Uuid,
    input: PartyUpdate,
    user_id: Uuid,
) -> Result<T, ServiceError>
where
    T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
{
    let mut tx = pool.begin().await?;
    let sql = format!(
        "UPDATE {table} SET
            name = COALESCE($2, name),
            contact_person = COALESCE($3, contact_person),
            email = COALESCE($4, email),
            phone = COALESCE($5, phone),
            address = COALESCE($6, address),
            tax_number = COALESCE($7, tax_number),
            updated_at = NOW()
         WHERE id = $1 AND is_active = true
         RETURNING {cols}",
        table = kind.table(),
        cols = kind.columns(),
    );
    let row = sqlx::query_as::<_, T>(&sql)
        .bind(id)
        .bind(clean(input.name))
        .bind(clean(input.contact_person))
        .bind(clean(input.email).map(|e| e.to_lowercase()))
        .bind(clean(input.phone))
        .bind(clean(input.address))
        .bind(clean(input.tax_number))
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| ServiceError::not_found(kind.entity()))?;

    activity::log(
        &mut tx,
        kind.entity(),
        id,
        "updated",
        format!("{} details updated", kind.entity().label()),
        Some(user_id),
    )
    .await?;

    tx.commit().await?;
    Ok(row)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_map_to_their_tables() {
        assert_eq!(PartyKind::Client.table(), "clients");
        assert_eq!(PartyKind::Vendor.number_column(), "vendor_number");
        assert!(PartyKind::Vendor.columns().starts_with("id, vendor_number, name"));
        assert_eq!(PartyKind::Client.format().prefix, "AE-C");
    }

    #[test]
    fn new_party_requires_name_and_valid_email() {
        let input = NewParty {
            name: " ".into(),
            contact_person: None,
            email: Some("not-an-email".into()),
            phone: None,
            address: None,
            tax_number: None,
        };
        let body = input.validate().unwrap_err().to_json();
        assert!(body["field_errors"]["name"].is_string());
        assert!(body["field_errors"]["email"].is_string());
    }

    #[test]
    fn empty_update_is_valid() {
        assert!(PartyUpdate::default().validate().is_ok());
        let blank_name = PartyUpdate { name: Some("".into()), ..Default::default() };
        assert!(blank_name.validate().is_err());
    }
}

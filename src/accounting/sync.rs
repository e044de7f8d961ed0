//! Contact and invoice synchronisation with the accounting platform.
//!
//! Contacts sync both ways: unlinked clients and vendors are pushed, then
//! remote details are pulled onto linked records. Invoices only go out;
//! the platform's payment status comes back for invoices already pushed.

use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use std::collections::HashMap;
use tracing::{info, warn};
use uuid::Uuid;

use super::client::{AccountingProvider, ContactPayload, InvoicePayload, RemoteContact};
use super::AccountingError;
use crate::database::models::accounting::AccountingConnection;
use crate::services::activity;
use crate::services::parties::PartyKind;
use crate::types::EntityType;

/// Client invoice statuses whose payment state is pulled back
pub const UNPAID_STATUSES: [&str; 3] = ["sent", "partially_paid", "overdue"];

const MAX_REFERENCE_LEN: usize = 255;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SyncSummary {
    pub pushed: u32,
    pub pulled: u32,
    pub skipped: u32,
}

#[derive(Debug, Clone, FromRow)]
struct LocalContact {
    id: Uuid,
    name: String,
    email: Option<String>,
    phone: Option<String>,
    accounting_contact_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ContactFields {
    name: String,
    email: Option<String>,
    phone: Option<String>,
}

/// Remote details that differ from the local record. Blank remote values
/// never clear local data.
fn merge_remote(local: &LocalContact, remote: &RemoteContact) -> Option<ContactFields> {
    let name = match remote.name.trim() {
        "" => local.name.clone(),
        name => name.to_string(),
    };
    let email = remote
        .email
        .as_deref()
        .map(|e| e.trim().to_lowercase())
        .or_else(|| local.email.clone());
    let phone = remote
        .phone
        .as_deref()
        .map(|p| p.trim().to_string())
        .or_else(|| local.phone.clone());

    let changed = name != local.name || email != local.email || phone != local.phone;
    changed.then_some(ContactFields { name, email, phone })
}

fn contact_payload(kind: PartyKind, local: &LocalContact) -> ContactPayload {
    ContactPayload {
        id: local.accounting_contact_id.clone(),
        name: local.name.clone(),
        email: local.email.clone(),
        phone: local.phone.clone(),
        is_customer: kind == PartyKind::Client,
        is_supplier: kind == PartyKind::Vendor,
    }
}

async fn contacts_where(pool: &PgPool, kind: PartyKind, linked: bool) -> Result<Vec<LocalContact>, AccountingError> {
    let sql = format!(
        "SELECT id, name, email, phone, accounting_contact_id FROM {}
         WHERE is_active AND (accounting_contact_id IS NOT NULL) = $1
         ORDER BY created_at",
        kind.entity().table()
    );
    let rows = sqlx::query_as::<_, LocalContact>(&sql)
        .bind(linked)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

async fn link_contact(
    pool: &PgPool,
    kind: PartyKind,
    id: Uuid,
    remote_id: &str,
    user_id: Uuid,
) -> Result<(), AccountingError> {
    let mut tx = pool.begin().await?;
    let sql = format!(
        "UPDATE {} SET accounting_contact_id = $2, updated_at = NOW()
         WHERE id = $1 AND accounting_contact_id IS NULL",
        kind.entity().table()
    );
    sqlx::query(&sql).bind(id).bind(remote_id).execute(&mut *tx).await?;
    activity::log(
        &mut tx,
        kind.entity(),
        id,
        "accounting_linked",
        format!("Linked to accounting contact {}", remote_id),
        Some(user_id),
    )
    .await?;
    tx.commit().await?;
    Ok(())
}

async fn apply_remote(
    pool: &PgPool,
    kind: PartyKind,
    id: Uuid,
    fields: &ContactFields,
    user_id: Uuid,
) -> Result<(), AccountingError> {
    let mut tx = pool.begin().await?;
    let sql = format!(
        "UPDATE {} SET name = $2, email = $3, phone = $4, updated_at = NOW() WHERE id = $1",
        kind.entity().table()
    );
    sqlx::query(&sql)
        .bind(id)
        .bind(&fields.name)
        .bind(&fields.email)
        .bind(&fields.phone)
        .execute(&mut *tx)
        .await?;
    activity::log(
        &mut tx,
        kind.entity(),
        id,
        "accounting_pulled",
        "Updated from accounting platform",
        Some(user_id),
    )
    .await?;
    tx.commit().await?;
    Ok(())
}

/// Push unlinked clients and vendors, then pull remote details onto linked ones.
///
/// `pulled` counts remote contacts that changed at least one local record;
/// remote contacts with no local link or no differences are `skipped`.
pub async fn sync_contacts(
    pool: &PgPool,
    provider: &dyn AccountingProvider,
    connection: &AccountingConnection,
    user_id: Uuid,
) -> Result<SyncSummary, AccountingError> {
    let mut summary = SyncSummary::default();
    let kinds = [PartyKind::Client, PartyKind::Vendor];

    for kind in kinds {
        for local in contacts_where(pool, kind, false).await? {
            let remote_id = provider
                .upsert_contact(connection, &contact_payload(kind, &local))
                .await?;
            link_contact(pool, kind, local.id, &remote_id, user_id).await?;
            summary.pushed += 1;
        }
    }

    let mut linked: HashMap<String, Vec<(PartyKind, LocalContact)>> = HashMap::new();
    for kind in kinds {
        for local in contacts_where(pool, kind, true).await? {
            if let Some(remote_id) = local.accounting_contact_id.clone() {
                linked.entry(remote_id).or_default().push((kind, local));
            }
        }
    }

    for remote in provider.list_contacts(connection).await? {
        let Some(locals) = linked.get(&remote.id) else {
            summary.skipped += 1;
            continue;
        };

        let mut changed = false;
        for (kind, local) in locals {
            if let Some(fields) = merge_remote(local, &remote) {
                apply_remote(pool, *kind, local.id, &fields, user_id).await?;
                changed = true;
            }
        }
        if changed {
            summary.pulled += 1;
        } else {
            summary.skipped += 1;
        }
    }

    info!(
        "Contact sync: pushed {}, pulled {}, skipped {}",
        summary.pushed, summary.pulled, summary.skipped
    );
    Ok(summary)
}

#[derive(Debug, FromRow)]
struct PendingInvoice {
    id: Uuid,
    invoice_number: String,
    issue_date: chrono::NaiveDate,
    due_date: Option<chrono::NaiveDate>,
    subtotal: Decimal,
    tax_amount: Decimal,
    notes: Option<String>,
    accounting_contact_id: Option<String>,
}

impl PendingInvoice {
    fn payload(&self, contact_id: String) -> InvoicePayload {
        InvoicePayload {
            contact_id,
            number: self.invoice_number.clone(),
            reference: self
                .notes
                .as_deref()
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(|n| n.chars().take(MAX_REFERENCE_LEN).collect()),
            issue_date: self.issue_date,
            due_date: self.due_date,
            subtotal: self.subtotal,
            tax_amount: self.tax_amount,
        }
    }
}

#[derive(Debug, FromRow)]
struct LinkedInvoice {
    id: Uuid,
    invoice_number: String,
    accounting_invoice_id: String,
}

/// Push sent invoices not yet on the platform, then mark pushed invoices
/// paid when the platform reports them paid.
///
/// Invoices whose client has no accounting contact yet are `skipped`;
/// `pulled` counts invoices marked paid.
pub async fn sync_invoices(
    pool: &PgPool,
    provider: &dyn AccountingProvider,
    connection: &AccountingConnection,
    user_id: Uuid,
) -> Result<SyncSummary, AccountingError> {
    let mut summary = SyncSummary::default();

    let pending = sqlx::query_as::<_, PendingInvoice>(
        "SELECT i.id, i.invoice_number, i.issue_date, i.due_date, i.subtotal, i.tax_amount, i.notes,
                c.accounting_contact_id
         FROM client_invoices i
         JOIN clients c ON c.id = i.client_id
         WHERE i.is_active AND i.status = 'sent' AND i.accounting_invoice_id IS NULL
         ORDER BY i.issue_date, i.invoice_number",
    )
    .fetch_all(pool)
    .await?;

    for invoice in pending {
        let Some(contact_id) = invoice.accounting_contact_id.clone() else {
            warn!("Invoice {} skipped: client is not synced", invoice.invoice_number);
            summary.skipped += 1;
            continue;
        };
        let remote_id = provider
            .push_invoice(connection, &invoice.payload(contact_id))
            .await?;

        let mut tx = pool.begin().await?;
        sqlx::query(
            "UPDATE client_invoices SET accounting_invoice_id = $2, updated_at = NOW()
             WHERE id = $1 AND accounting_invoice_id IS NULL",
        )
        .bind(invoice.id)
        .bind(&remote_id)
        .execute(&mut *tx)
        .await?;
        activity::log(
            &mut tx,
            EntityType::ClientInvoice,
            invoice.id,
            "accounting_pushed",
            format!("Pushed to accounting platform as {}", remote_id),
            Some(user_id),
        )
        .await?;
        tx.commit().await?;
        summary.pushed += 1;
    }

    let statuses: Vec<String> = UNPAID_STATUSES.iter().map(|s| s.to_string()).collect();
    let linked = sqlx::query_as::<_, LinkedInvoice>(
        "SELECT id, invoice_number, accounting_invoice_id
         FROM client_invoices
         WHERE is_active AND accounting_invoice_id IS NOT NULL AND status = ANY($1)
         ORDER BY issue_date",
    )
    .bind(&statuses)
    .fetch_all(pool)
    .await?;

    for invoice in linked {
        let remote = provider
            .invoice_status(connection, &invoice.accounting_invoice_id)
            .await?;
        if !remote.is_paid() {
            summary.skipped += 1;
            continue;
        }

        let mut tx = pool.begin().await?;
        sqlx::query(
            "UPDATE client_invoices SET status = 'paid', amount_paid = total, updated_at = NOW()
             WHERE id = $1 AND status <> 'paid'",
        )
        .bind(invoice.id)
        .execute(&mut *tx)
        .await?;
        activity::log(
            &mut tx,
            EntityType::ClientInvoice,
            invoice.id,
            "paid",
            format!("{} marked paid from accounting platform", invoice.invoice_number),
            Some(user_id),
        )
        .await?;
        tx.commit().await?;
        summary.pulled += 1;
    }

    info!(
        "Invoice sync: pushed {}, pulled {}, skipped {}",
        summary.pushed, summary.pulled, summary.skipped
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local() -> LocalContact {
        LocalContact {
            id: Uuid::new_v4(),
            name: "Acme Ltd".into(),
            email: Some("accounts@acme.test".into()),
            phone: Some("9000 1234".into()),
            accounting_contact_id: Some("c-1".into()),
        }
    }

    fn remote(name: &str, email: Option<&str>, phone: Option<&str>) -> RemoteContact {
        RemoteContact {
            id: "c-1".into(),
            name: name.into(),
            email: email.map(String::from),
            phone: phone.map(String::from),
        }
    }

    #[test]
    fn identical_contact_is_unchanged() {
        let r = remote("Acme Ltd", Some("accounts@acme.test"), Some("9000 1234"));
        assert_eq!(merge_remote(&local(), &r), None);
    }

    #[test]
    fn remote_name_and_email_win() {
        let r = remote("Acme Holdings", Some(" Billing@Acme.test "), None);
        let fields = merge_remote(&local(), &r).unwrap();
        assert_eq!(fields.name, "Acme Holdings");
        assert_eq!(fields.email.as_deref(), Some("billing@acme.test"));
        assert_eq!(fields.phone.as_deref(), Some("9000 1234"));
    }

    #[test]
    fn blank_remote_values_keep_local_data() {
        let r = remote("  ", None, None);
        assert_eq!(merge_remote(&local(), &r), None);
    }

    #[test]
    fn payload_flags_follow_party_kind() {
        let mut contact = local();
        contact.accounting_contact_id = None;

        let client = contact_payload(PartyKind::Client, &contact);
        assert!(client.is_customer && !client.is_supplier);
        assert!(client.id.is_none());

        let vendor = contact_payload(PartyKind::Vendor, &contact);
        assert!(vendor.is_supplier && !vendor.is_customer);
    }

    #[test]
    fn invoice_reference_comes_from_notes() {
        let invoice = PendingInvoice {
            id: Uuid::new_v4(),
            invoice_number: "INV-2024-0003".into(),
            issue_date: chrono::NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
            due_date: None,
            subtotal: Decimal::new(5000, 2),
            tax_amount: Decimal::new(500, 2),
            notes: Some("  QT-2024-001: Office fit-out ".into()),
            accounting_contact_id: Some("c-1".into()),
        };
        let payload = invoice.payload("c-1".into());
        assert_eq!(payload.reference.as_deref(), Some("QT-2024-001: Office fit-out"));
        assert_eq!(payload.number, "INV-2024-0003");

        let blank = PendingInvoice { notes: Some("   ".into()), ..invoice };
        assert!(blank.payload("c-1".into()).reference.is_none());
    }
}

/// Shared types used across the codebase

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config;

/// Business record kinds; used for activity logs and soft deletes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    User,
    Client,
    Vendor,
    Project,
    Quotation,
    Tender,
    ClientInvoice,
    VendorInvoice,
    PurchaseOrder,
    Payment,
    ServiceContract,
    ServiceJob,
    Task,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::User => "user",
            EntityType::Client => "client",
            EntityType::Vendor => "vendor",
            EntityType::Project => "project",
            EntityType::Quotation => "quotation",
            EntityType::Tender => "tender",
            EntityType::ClientInvoice => "client_invoice",
            EntityType::VendorInvoice => "vendor_invoice",
            EntityType::PurchaseOrder => "purchase_order",
            EntityType::Payment => "payment",
            EntityType::ServiceContract => "service_contract",
            EntityType::ServiceJob => "service_job",
            EntityType::Task => "task",
        }
    }

    /// Backing table; compile-time identifiers only
    pub fn table(&self) -> &'static str {
        match self {
            EntityType::User => "users",
            EntityType::Client => "clients",
            EntityType::Vendor => "vendors",
            EntityType::Project => "projects",
            EntityType::Quotation => "quotations",
            EntityType::Tender => "tenders",
            EntityType::ClientInvoice => "client_invoices",
            EntityType::VendorInvoice => "vendor_invoices",
            EntityType::PurchaseOrder => "purchase_orders",
            EntityType::Payment => "payments",
            EntityType::ServiceContract => "service_contracts",
            EntityType::ServiceJob => "service_jobs",
            EntityType::Task => "tasks",
        }
    }

    /// Human label for activity summaries
    pub fn label(&self) -> &'static str {
        match self {
            EntityType::User => "User",
            EntityType::Client => "Client",
            EntityType::Vendor => "Vendor",
            EntityType::Project => "Project",
            EntityType::Quotation => "Quotation",
            EntityType::Tender => "Tender",
            EntityType::ClientInvoice => "Invoice",
            EntityType::VendorInvoice => "Vendor invoice",
            EntityType::PurchaseOrder => "Purchase order",
            EntityType::Payment => "Payment",
            EntityType::ServiceContract => "Service contract",
            EntityType::ServiceJob => "Service job",
            EntityType::Task => "Task",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Common list query parameters: `?q=&limit=&offset=&include_inactive=`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListParams {
    pub q: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    #[serde(default)]
    pub include_inactive: bool,
}

impl ListParams {
    /// Limit clamped to `1..=max_page_size`, defaulting to the configured page size
    pub fn limit(&self) -> i64 {
        let api = &config::config().api;
        self.limit.unwrap_or(api.default_page_size).clamp(1, api.max_page_size)
    }

    pub fn offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }

    /// `%term%` for ILIKE, or None when no search was given
    pub fn search_pattern(&self) -> Option<String> {
        self.q
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(|q| {
                let escaped = q.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_");
                format!("%{}%", escaped)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limits_are_clamped() {
        let params = ListParams { limit: Some(100_000), ..Default::default() };
        assert_eq!(params.limit(), config::config().api.max_page_size);

        let params = ListParams { limit: Some(0), offset: Some(-5), ..Default::default() };
        assert_eq!(params.limit(), 1);
        assert_eq!(params.offset(), 0);

        assert_eq!(ListParams::default().limit(), config::config().api.default_page_size);
    }

    #[test]
    fn search_pattern_escapes_wildcards() {
        let params = ListParams { q: Some(" 50%_off ".into()), ..Default::default() };
        assert_eq!(params.search_pattern().as_deref(), Some("%50\\%\\_off%"));

        let blank = ListParams { q: Some("   ".into()), ..Default::default() };
        assert_eq!(blank.search_pattern(), None);
    }
}

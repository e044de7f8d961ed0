// handlers/protected/mod.rs - Protected handlers (session or JWT required)
//
// Every handler here runs after authenticate -> validate_tenant ->
// validate_user, so `CurrentUser` and `TenantPool` are always present.
// Role checks happen per handler against the allow-lists in auth::roles.
pub mod accounting;
pub mod activity;
pub mod auth;
pub mod clients;
pub mod invoices;
pub mod notifications;
pub mod payments;
pub mod projects;
pub mod purchase_orders;
pub mod quotations;
pub mod service_contracts;
pub mod tasks;
pub mod tenders;
pub mod users;
pub mod utils;
pub mod vendors;

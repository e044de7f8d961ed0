pub mod accounting;
pub mod activity;
pub mod invoice;
pub mod party;
pub mod project;
pub mod purchase_order;
pub mod quotation;
pub mod service;
pub mod session;
pub mod task;
pub mod tenant;
pub mod user;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A priced line on a quotation or purchase order
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct LineItem {
    pub id: Uuid,
    pub position: i32,
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub amount: Decimal,
}

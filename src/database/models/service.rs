use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ServiceContract {
    pub id: Uuid,
    pub contract_number: String,
    pub client_id: Uuid,
    pub title: String,
    pub frequency: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub contract_value: Option<Decimal>,
    pub status: String,
    pub is_active: bool,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ServiceJob {
    pub id: Uuid,
    pub job_number: String,
    pub contract_id: Uuid,
    pub scheduled_date: NaiveDate,
    pub status: String,
    pub technician_id: Option<Uuid>,
    pub completed_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServiceContractDetail {
    #[serde(flatten)]
    pub contract: ServiceContract,
    pub jobs: Vec<ServiceJob>,
}

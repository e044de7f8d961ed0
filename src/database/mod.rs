pub mod manager;
pub mod migrate;
pub mod models;
pub mod sequence;

pub use manager::{DatabaseError, DatabaseManager};

pub mod migrate;
pub mod session;
pub mod tenant;
pub mod user;

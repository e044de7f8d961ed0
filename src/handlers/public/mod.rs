// handlers/public/mod.rs - Public handlers (no authentication required)
//
// Login/logout, the health probe and the server-rendered pages.
pub mod auth;
pub mod pages;

pub use auth::{login_post, logout_post};
pub use pages::{app_shell, health_get, login_page, root_get};

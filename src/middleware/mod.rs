pub mod auth;
pub mod page_gate;
pub mod response;
pub mod validate_tenant;
pub mod validate_user;

pub use auth::{authenticate_middleware, AuthSource, AuthUser};
pub use page_gate::page_gate_middleware;
pub use response::{ApiResponse, ApiResult};
pub use validate_tenant::{validate_tenant_middleware, TenantPool, ValidatedTenant};
pub use validate_user::{validate_user_middleware, CurrentUser};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::AuthError;
use crate::error::ApiError;
use crate::middleware::CurrentUser;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Manager,
    Accounts,
    Sales,
    Procurement,
    Technician,
    Staff,
}

impl Role {
    pub const ALL: [Role; 7] = [
        Role::Admin,
        Role::Manager,
        Role::Accounts,
        Role::Sales,
        Role::Procurement,
        Role::Technician,
        Role::Staff,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Manager => "manager",
            Role::Accounts => "accounts",
            Role::Sales => "sales",
            Role::Procurement => "procurement",
            Role::Technician => "technician",
            Role::Staff => "staff",
        }
    }

    /// Admins pass every allow-list
    pub fn is_allowed(&self, allowed: &[Role]) -> bool {
        *self == Role::Admin || allowed.contains(self)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| AuthError::UnknownRole(s.to_string()))
    }
}

/// Allow-lists shared by the resource handlers
pub mod allow {
    use super::Role::{self, *};

    pub const MANAGEMENT: &[Role] = &[Admin, Manager];
    pub const CLIENT_WRITE: &[Role] = &[Admin, Manager, Sales, Accounts];
    pub const VENDOR_WRITE: &[Role] = &[Admin, Manager, Procurement, Accounts];
    pub const SALES_WRITE: &[Role] = &[Admin, Manager, Sales];
    pub const QUOTATION_CONVERT: &[Role] = &[Admin, Manager, Sales, Accounts];
    pub const FINANCE: &[Role] = &[Admin, Manager, Accounts];
    pub const PURCHASING: &[Role] = &[Admin, Manager, Procurement];
    pub const FIELD_SERVICE: &[Role] = &[Admin, Manager, Technician];
    pub const ACCOUNTING_SYNC: &[Role] = &[Admin, Accounts];
    pub const USER_ADMIN: &[Role] = &[Admin];
}

/// 403 unless the caller's role is on the allow-list
pub fn require_role(user: &CurrentUser, allowed: &[Role]) -> Result<(), ApiError> {
    if user.role.is_allowed(allowed) {
        Ok(())
    } else {
        tracing::warn!(
            "Role '{}' of user {} denied; requires one of {:?}",
            user.role, user.email, allowed
        );
        Err(ApiError::forbidden("Your role does not permit this action"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_passes_every_list() {
        assert!(Role::Admin.is_allowed(allow::PURCHASING));
        assert!(Role::Admin.is_allowed(&[]));
    }

    #[test]
    fn allow_lists_deny_other_roles() {
        assert!(Role::Procurement.is_allowed(allow::PURCHASING));
        assert!(!Role::Sales.is_allowed(allow::PURCHASING));
        assert!(!Role::Technician.is_allowed(allow::FINANCE));
        assert!(Role::Technician.is_allowed(allow::FIELD_SERVICE));
        assert!(!Role::Manager.is_allowed(allow::USER_ADMIN));
        assert!(!Role::Manager.is_allowed(allow::ACCOUNTING_SYNC));
    }

    #[test]
    fn parses_known_roles_only() {
        assert_eq!("accounts".parse::<Role>().unwrap(), Role::Accounts);
        assert!(matches!("owner".parse::<Role>(), Err(AuthError::UnknownRole(_))));
    }
}

use serde::Serialize;
use uuid::Uuid;

use crate::auth::Role;
use crate::middleware::CurrentUser;
use crate::types::ListParams;

/// Inactive rows are only listed for administrators who ask for them
pub fn include_inactive(user: &CurrentUser, params: &ListParams) -> bool {
    params.include_inactive && user.role == Role::Admin
}

/// Body returned by DELETE endpoints
#[derive(Debug, Serialize)]
pub struct Deleted {
    pub id: Uuid,
    pub deleted: bool,
}

impl Deleted {
    pub fn new(id: Uuid) -> Self {
        Self { id, deleted: true }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::AuthSource;

    fn user(role: Role) -> CurrentUser {
        CurrentUser {
            id: Uuid::new_v4(),
            email: "ops@acme.test".into(),
            name: "Ops".into(),
            role,
            tenant_id: Uuid::new_v4(),
            tenant: "acme".into(),
            database: "tenant_0123456789abcdef".into(),
            source: AuthSource::Bearer,
        }
    }

    #[test]
    fn only_admins_see_inactive_rows() {
        let params = ListParams {
            include_inactive: true,
            ..ListParams::default()
        };
        assert!(include_inactive(&user(Role::Admin), &params));
        assert!(!include_inactive(&user(Role::Manager), &params));
        assert!(!include_inactive(&user(Role::Admin), &ListParams::default()));
    }
}

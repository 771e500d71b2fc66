use serde::{Deserialize, Serialize};

use crate::{CoreError, CoreResult};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

/// Identity of the caller, as established by the authentication layer
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthUser {
    pub id: i32,
    pub role: Role,
}

impl AuthUser {
    pub fn user(id: i32) -> Self {
        Self { id, role: Role::User }
    }

    pub fn admin(id: i32) -> Self {
        Self { id, role: Role::Admin }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn require_admin(&self) -> CoreResult<()> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(CoreError::Forbidden("only administrators can perform this action".to_string()))
        }
    }

    /// Owner of the resource, or any administrator
    pub fn can_access(&self, owner_id: i32) -> bool {
        self.id == owner_id || self.is_admin()
    }
}

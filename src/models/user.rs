//! Roles and the per-request session identity.
//!
//! The identity provider is an external collaborator: every request carries a
//! trusted `(actor id, role)` pair and the core reasons only over that pair
//! plus identity equality against the quote's assigned parties.

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use uuid::Uuid;

/// Closed set of roles the permission evaluator reasons over.
///
/// Parsing is fail-closed: any string outside this set is rejected, which
/// denies the request before it reaches a handler.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Customer,
    Supplier,
    Quoter,
    Admin,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Customer, Role::Supplier, Role::Quoter, Role::Admin];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Customer => "customer",
            Role::Supplier => "supplier",
            Role::Quoter => "quoter",
            Role::Admin => "admin",
        }
    }

    /// Quoters and admins share most internal-side rights.
    pub fn is_staff(self) -> bool {
        matches!(self, Role::Quoter | Role::Admin)
    }
}

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer" => Ok(Role::Customer),
            "supplier" => Ok(Role::Supplier),
            "quoter" => Ok(Role::Quoter),
            "admin" => Ok(Role::Admin),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown role `{0}`")]
pub struct UnknownRole(pub String);

/// Explicit session context for one request.
///
/// Passed into every service operation and permission check instead of any
/// process-global current-user state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Actor {
    pub id: Uuid,
    pub role: Role,
}

impl Actor {
    pub fn new(id: Uuid, role: Role) -> Self {
        Self { id, role }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_roles() {
        for role in Role::ALL {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
    }

    #[test]
    fn rejects_unknown_roles() {
        assert!("superuser".parse::<Role>().is_err());
        assert!("".parse::<Role>().is_err());
        assert!("Admin".parse::<Role>().is_err());
    }
}

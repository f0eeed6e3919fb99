//! User roles and the permissions they imply.

use serde::{Deserialize, Serialize};

/// Role of an authenticated user.
///
/// Operators run the store day to day; admins additionally hold customer
/// powers (an admin can place orders on behalf of the store).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "user_role", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Customer,
    Operator,
    Admin,
}

impl Role {
    /// Staff roles receive operational dashboards and alerts.
    #[must_use]
    pub const fn is_staff(self) -> bool {
        matches!(self, Self::Operator | Self::Admin)
    }

    /// Roles allowed to place orders and list their own orders.
    #[must_use]
    pub const fn can_place_orders(self) -> bool {
        matches!(self, Self::Customer | Self::Admin)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Customer => write!(f, "customer"),
            Self::Operator => write!(f, "operator"),
            Self::Admin => write!(f, "admin"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer" => Ok(Self::Customer),
            "operator" => Ok(Self::Operator),
            "admin" => Ok(Self::Admin),
            _ => Err(format!("invalid role: {s}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn staff_roles() {
        assert!(!Role::Customer.is_staff());
        assert!(Role::Operator.is_staff());
        assert!(Role::Admin.is_staff());
    }

    #[test]
    fn order_placement_roles() {
        assert!(Role::Customer.can_place_orders());
        assert!(!Role::Operator.can_place_orders());
        assert!(Role::Admin.can_place_orders());
    }

    #[test]
    fn role_parses_from_lowercase() {
        assert_eq!("operator".parse::<Role>(), Ok(Role::Operator));
        assert!("manager".parse::<Role>().is_err());
    }
}

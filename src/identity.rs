use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Account role. Stored as TEXT in Postgres, serialized in SCREAMING_SNAKE_CASE
/// on the wire ("CUSTOMER", "EMPLOYEE", "ADMIN").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Customer,
    Employee,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Customer => "CUSTOMER",
            Role::Employee => "EMPLOYEE",
            Role::Admin => "ADMIN",
        }
    }

    pub fn parse(s: &str) -> Option<Role> {
        match s {
            "CUSTOMER" => Some(Role::Customer),
            "EMPLOYEE" => Some(Role::Employee),
            "ADMIN" => Some(Role::Admin),
            _ => None,
        }
    }

    /// Staff means employee or admin.
    pub fn is_staff(&self) -> bool {
        matches!(self, Role::Employee | Role::Admin)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// The role column is plain TEXT (with a CHECK constraint), so decoding
// delegates to &str rather than a Postgres enum type.
impl sqlx::Type<sqlx::Postgres> for Role {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <&str as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <&str as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Postgres> for Role {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Role::parse(s).ok_or_else(|| format!("unknown role: {}", s).into())
    }
}

/// The caller's resolved identity for one request.
///
/// Resolution never fails: a missing, malformed or expired session token
/// resolves to `Anonymous`, and the guard chain decides whether that is
/// acceptable for the operation being called.
#[derive(Debug, Clone)]
pub enum Identity {
    Anonymous,
    Known {
        account_id: Uuid,
        name: String,
        role: Role,
    },
}

impl Identity {
    pub fn account_id(&self) -> Option<Uuid> {
        match self {
            Identity::Anonymous => None,
            Identity::Known { account_id, .. } => Some(*account_id),
        }
    }

    pub fn role(&self) -> Option<Role> {
        match self {
            Identity::Anonymous => None,
            Identity::Known { role, .. } => Some(*role),
        }
    }

    pub fn is_staff(&self) -> bool {
        self.role().map(|r| r.is_staff()).unwrap_or(false)
    }

    pub fn is_admin(&self) -> bool {
        self.role() == Some(Role::Admin)
    }

    /// Display name used when stamping records ("signed by", "resolved by").
    /// Falls back to the literal "User" when the identity carries no name.
    pub fn display_name(&self) -> &str {
        match self {
            Identity::Known { name, .. } if !name.trim().is_empty() => name,
            _ => "User",
        }
    }
}

use crate::error::ApiError;
use crate::identity::Identity;

/// Required authorization level for an operation.
///
/// Levels form a chain: each level runs every lower level's checks first,
/// so an anonymous caller on a staff operation fails the `authenticated`
/// check (UNAUTHORIZED) before the role check (FORBIDDEN) is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessLevel {
    Public,
    Authenticated,
    Staff,
    Admin,
}

type Check = fn(&Identity) -> Result<(), ApiError>;

fn require_authenticated(identity: &Identity) -> Result<(), ApiError> {
    match identity {
        Identity::Anonymous => Err(ApiError::unauthorized("Sign in to continue")),
        Identity::Known { .. } => Ok(()),
    }
}

fn require_staff(identity: &Identity) -> Result<(), ApiError> {
    if identity.is_staff() {
        Ok(())
    } else {
        Err(ApiError::forbidden("Staff access required"))
    }
}

fn require_admin(identity: &Identity) -> Result<(), ApiError> {
    if identity.is_admin() {
        Ok(())
    } else {
        Err(ApiError::forbidden("Admin access required"))
    }
}

impl AccessLevel {
    /// Ordered guard chain, in increasing strictness.
    fn checks(self) -> &'static [Check] {
        match self {
            AccessLevel::Public => &[],
            AccessLevel::Authenticated => &[require_authenticated],
            AccessLevel::Staff => &[require_authenticated, require_staff],
            AccessLevel::Admin => &[require_authenticated, require_admin],
        }
    }
}

/// Evaluate the guard chain for a level. Runs before input validation and
/// before the handler; a failure short-circuits with no side effects.
pub fn authorize(level: AccessLevel, identity: &Identity) -> Result<(), ApiError> {
    for check in level.checks() {
        check(identity)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Role;
    use uuid::Uuid;

    fn known(role: Role) -> Identity {
        Identity::Known {
            account_id: Uuid::new_v4(),
            name: "Test".to_string(),
            role,
        }
    }

    fn code(result: Result<(), ApiError>) -> Option<&'static str> {
        result.err().map(|e| e.code())
    }

    #[test]
    fn public_always_passes() {
        assert!(authorize(AccessLevel::Public, &Identity::Anonymous).is_ok());
        assert!(authorize(AccessLevel::Public, &known(Role::Customer)).is_ok());
    }

    #[test]
    fn authenticated_rejects_anonymous() {
        assert_eq!(
            code(authorize(AccessLevel::Authenticated, &Identity::Anonymous)),
            Some("UNAUTHORIZED")
        );
        assert!(authorize(AccessLevel::Authenticated, &known(Role::Customer)).is_ok());
    }

    #[test]
    fn staff_fails_unauthorized_before_forbidden() {
        // anonymous hits the authentication check first
        assert_eq!(
            code(authorize(AccessLevel::Staff, &Identity::Anonymous)),
            Some("UNAUTHORIZED")
        );
        // a signed-in customer gets past it and fails the role check
        assert_eq!(
            code(authorize(AccessLevel::Staff, &known(Role::Customer))),
            Some("FORBIDDEN")
        );
        assert!(authorize(AccessLevel::Staff, &known(Role::Employee)).is_ok());
        assert!(authorize(AccessLevel::Staff, &known(Role::Admin)).is_ok());
    }

    #[test]
    fn admin_excludes_employees() {
        assert_eq!(
            code(authorize(AccessLevel::Admin, &known(Role::Employee))),
            Some("FORBIDDEN")
        );
        assert_eq!(
            code(authorize(AccessLevel::Admin, &known(Role::Customer))),
            Some("FORBIDDEN")
        );
        assert!(authorize(AccessLevel::Admin, &known(Role::Admin)).is_ok());
    }
}

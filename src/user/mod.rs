//! Identity root: accounts, roles and the authenticated caller.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Account role.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    Membership,
    Content,
    Finance,
    Developer,
    #[default]
    User,
    Member,
    PaediatricDoctor,
}

/// Roles allowed to review membership applications.
pub const REVIEWER_ROLES: [Role; 2] = [Role::Admin, Role::Membership];

impl Role {
    /// Text representation as saved on database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Membership => "MEMBERSHIP",
            Role::Content => "CONTENT",
            Role::Finance => "FINANCE",
            Role::Developer => "DEVELOPER",
            Role::User => "USER",
            Role::Member => "MEMBER",
            Role::PaediatricDoctor => "PAEDIATRIC_DOCTOR",
        }
    }

    /// Whether this role may review applications.
    pub fn is_reviewer(&self) -> bool {
        REVIEWER_ROLES.contains(self)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Role text did not match any [`Role`].
#[derive(Debug, PartialEq, thiserror::Error)]
#[error("unknown role `{0}`")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ADMIN" => Ok(Role::Admin),
            "MEMBERSHIP" => Ok(Role::Membership),
            "CONTENT" => Ok(Role::Content),
            "FINANCE" => Ok(Role::Finance),
            "DEVELOPER" => Ok(Role::Developer),
            "USER" => Ok(Role::User),
            "MEMBER" => Ok(Role::Member),
            "PAEDIATRIC_DOCTOR" => Ok(Role::PaediatricDoctor),
            _ => Err(UnknownRole(s.to_owned())),
        }
    }
}

/// User as saved on database.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub role: Role,
    pub onboarded: bool,
}

/// Authenticated user on whose behalf an action runs.
#[derive(Clone, Debug, PartialEq)]
pub struct Caller {
    pub id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub role: Role,
}

impl Caller {
    /// Create a [`Caller`] with only an id and a role.
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            name: None,
            email: None,
            phone: None,
            role,
        }
    }

    /// Fail with [`crate::error::ServerError::Forbidden`] unless caller reviews
    /// applications.
    pub fn require_reviewer(&self) -> crate::error::Result<()> {
        if self.role.is_reviewer() {
            Ok(())
        } else {
            tracing::warn!(caller = self.id, role = %self.role, "reviewer role required");
            Err(crate::error::ServerError::Forbidden)
        }
    }

    /// Fail with [`crate::error::ServerError::Forbidden`] unless caller is an
    /// administrator.
    pub fn require_admin(&self) -> crate::error::Result<()> {
        if self.role == Role::Admin {
            Ok(())
        } else {
            tracing::warn!(caller = self.id, role = %self.role, "admin role required");
            Err(crate::error::ServerError::Forbidden)
        }
    }
}

impl From<User> for Caller {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            phone: user.phone,
            role: user.role,
        }
    }
}

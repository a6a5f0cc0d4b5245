//! The authenticated party performing a workflow operation.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::WorkflowError;

/// Platform role of an actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActorRole {
    /// Works for the purchasing company.
    Buyer,
    /// Works for a vendor company.
    Supplier,
    /// Platform administrator; may force any transition.
    Admin,
}

impl ActorRole {
    /// Returns the string representation of the role.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Buyer => "buyer",
            Self::Supplier => "supplier",
            Self::Admin => "admin",
        }
    }

    /// Parses a role from a string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "buyer" => Some(Self::Buyer),
            "supplier" => Some(Self::Supplier),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }
}

impl fmt::Display for ActorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Who is acting: user, their company and their role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    /// Acting user.
    pub user_id: Uuid,
    /// Company the user acts for. Admins may have none.
    pub company_id: Option<Uuid>,
    /// Platform role.
    pub role: ActorRole,
}

impl Actor {
    /// Creates an actor.
    #[must_use]
    pub const fn new(user_id: Uuid, company_id: Option<Uuid>, role: ActorRole) -> Self {
        Self {
            user_id,
            company_id,
            role,
        }
    }

    /// A buyer acting for `company_id`.
    #[must_use]
    pub const fn buyer(user_id: Uuid, company_id: Uuid) -> Self {
        Self::new(user_id, Some(company_id), ActorRole::Buyer)
    }

    /// A supplier acting for `company_id`.
    #[must_use]
    pub const fn supplier(user_id: Uuid, company_id: Uuid) -> Self {
        Self::new(user_id, Some(company_id), ActorRole::Supplier)
    }

    /// A platform admin.
    #[must_use]
    pub const fn admin(user_id: Uuid) -> Self {
        Self::new(user_id, None, ActorRole::Admin)
    }

    /// Returns true for platform admins.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == ActorRole::Admin
    }

    /// Returns true if the actor acts for `company_id`.
    #[must_use]
    pub fn belongs_to(&self, company_id: Uuid) -> bool {
        self.company_id == Some(company_id)
    }

    /// Returns true if the actor has `role` and acts for `company_id`, or is
    /// an admin.
    #[must_use]
    pub fn acts_as(&self, role: ActorRole, company_id: Uuid) -> bool {
        self.is_admin() || (self.role == role && self.belongs_to(company_id))
    }

    /// Returns the actor's company or an authorization error.
    ///
    /// # Errors
    ///
    /// Returns `WorkflowError::Unauthorized` when the actor has no company.
    pub fn require_company(&self) -> Result<Uuid, WorkflowError> {
        self.company_id
            .ok_or_else(|| WorkflowError::unauthorized("actor is not associated with a company"))
    }
}

//! Roles, actors, and the per-operation authorization policy for intake calls.
//!
//! Providers see the submissions filed under their own identifier, reps see the submissions
//! assigned to them, and admins see everything. `Actor::System` stands for an unauthenticated
//! caller on deployments that do not require sessions and is granted the open access the
//! dashboard has always relied on.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::intake::domain::Submission;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Provider,
    Rep,
    Admin,
}

impl Role {
    pub const fn label(self) -> &'static str {
        match self {
            Role::Provider => "provider",
            Role::Rep => "rep",
            Role::Admin => "admin",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "provider" => Some(Role::Provider),
            "rep" => Some(Role::Rep),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }

    /// Admin accounts are provisioned out of band.
    pub const fn self_registrable(self) -> bool {
        matches!(self, Role::Provider | Role::Rep)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Caller identity attached to every intake operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Actor {
    System,
    User { email: String, role: Role },
}

impl Actor {
    pub fn user(email: impl Into<String>, role: Role) -> Self {
        Actor::User {
            email: email.into(),
            role,
        }
    }

    pub fn can_view(&self, submission: &Submission) -> bool {
        match self {
            Actor::System => true,
            Actor::User { role: Role::Admin, .. } => true,
            Actor::User {
                email,
                role: Role::Provider,
            } => submission.provider_npi.eq_ignore_ascii_case(email),
            Actor::User {
                email,
                role: Role::Rep,
            } => submission
                .assigned_rep
                .as_deref()
                .is_some_and(|rep| rep.eq_ignore_ascii_case(email)),
        }
    }

    /// Providers may only file requests under their own identifier; reps do not file requests.
    pub fn authorize_create(&self, provider_npi: &str) -> Result<(), AccessDenied> {
        match self {
            Actor::System | Actor::User { role: Role::Admin, .. } => Ok(()),
            Actor::User {
                email,
                role: Role::Provider,
            } if provider_npi.eq_ignore_ascii_case(email) => Ok(()),
            Actor::User {
                role: Role::Provider,
                ..
            } => Err(AccessDenied::new(
                Action::Create,
                "providers may only submit under their own identifier",
            )),
            Actor::User { role: Role::Rep, .. } => Err(AccessDenied::new(
                Action::Create,
                "reps cannot submit prior authorization requests",
            )),
        }
    }

    pub fn authorize(&self, action: Action, submission: &Submission) -> Result<(), AccessDenied> {
        let role = match self {
            Actor::System => return Ok(()),
            Actor::User { role, .. } => *role,
        };

        if !self.can_view(submission) {
            return Err(AccessDenied::new(action, "submission is outside your queue"));
        }

        let permitted = match action {
            Action::Create => false,
            Action::View | Action::Attach => true,
            Action::UpdateStatus | Action::UpdateEligibility => {
                matches!(role, Role::Rep | Role::Admin)
            }
            Action::Assign => role == Role::Admin,
        };

        if permitted {
            Ok(())
        } else {
            Err(AccessDenied::new(action, "role lacks permission"))
        }
    }
}

/// Operations checked by [`Actor::authorize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Create,
    View,
    Attach,
    UpdateStatus,
    UpdateEligibility,
    Assign,
}

impl Action {
    pub const fn label(self) -> &'static str {
        match self {
            Action::Create => "create",
            Action::View => "view",
            Action::Attach => "attach documents to",
            Action::UpdateStatus => "update the status of",
            Action::UpdateEligibility => "update eligibility on",
            Action::Assign => "assign",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("not allowed to {} this submission: {reason}", .action.label())]
pub struct AccessDenied {
    pub action: Action,
    pub reason: &'static str,
}

impl AccessDenied {
    fn new(action: Action, reason: &'static str) -> Self {
        Self { action, reason }
    }
}

/// Resolves the opaque session token issued at login into an actor.
pub trait SessionResolver: Send + Sync {
    fn resolve(&self, token: &str) -> Option<Actor>;
}

/// Resolver for deployments without account sessions.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoSessions;

impl SessionResolver for NoSessions {
    fn resolve(&self, _token: &str) -> Option<Actor> {
        None
    }
}

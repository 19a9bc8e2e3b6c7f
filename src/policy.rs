// src/policy.rs

use crate::error::AppError;
use crate::models::user::{Actor, User};

/// Action type carried by every permission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    List,
    Retrieve,
    Create,
    Update,
    Delete,
}

impl Action {
    /// Safe actions are read-only.
    pub fn is_safe(self) -> bool {
        matches!(self, Action::List | Action::Retrieve)
    }
}

/// Resource tag carried explicitly alongside each object, so permission
/// logic never inspects runtime types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Category,
    Genre,
    Title,
    Review,
    Comment,
    UserDirectory,
    OwnProfile,
}

/// Ownership evidence for object-level checks.
#[derive(Debug, Clone, Copy)]
pub enum Owner<'a> {
    Author(i64),
    Username(&'a str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rule {
    /// Reads for anyone, writes for admins: catalog resources.
    AdminOrReadOnly,
    /// Reads for anyone, creation for any authenticated user, mutation for
    /// the author, a moderator or an admin: reviews and comments.
    AuthorOrStaffOrReadOnly,
    /// Every action needs the admin capability: the user directory.
    AdminOnly,
    /// The record must belong to the requester: /users/me.
    SelfOnly,
}

fn rule_for(kind: ResourceKind) -> Rule {
    match kind {
        ResourceKind::Category | ResourceKind::Genre | ResourceKind::Title => Rule::AdminOrReadOnly,
        ResourceKind::Review | ResourceKind::Comment => Rule::AuthorOrStaffOrReadOnly,
        ResourceKind::UserDirectory => Rule::AdminOnly,
        ResourceKind::OwnProfile => Rule::SelfOnly,
    }
}

fn denied(actor: &Actor) -> AppError {
    match actor {
        Actor::Anonymous => {
            AppError::Unauthorized("Authentication credentials were not provided.".to_string())
        }
        Actor::User(_) => {
            AppError::Forbidden("You do not have permission to perform this action.".to_string())
        }
    }
}

/// Returns the user snapshot, or the denial appropriate for an anonymous
/// actor.
pub fn require_user(actor: &Actor) -> Result<&User, AppError> {
    actor.user().ok_or_else(|| denied(actor))
}

/// Collection-level check: may this actor attempt this action type on this
/// resource kind at all? Fine-grained denial for reviews and comments
/// happens at object level.
pub fn check(actor: &Actor, action: Action, kind: ResourceKind) -> Result<(), AppError> {
    match rule_for(kind) {
        Rule::AdminOrReadOnly => {
            if action.is_safe() || require_user(actor)?.is_admin() {
                Ok(())
            } else {
                Err(denied(actor))
            }
        }
        Rule::AuthorOrStaffOrReadOnly => {
            if action.is_safe() {
                Ok(())
            } else {
                require_user(actor).map(|_| ())
            }
        }
        Rule::AdminOnly => {
            if require_user(actor)?.is_admin() {
                Ok(())
            } else {
                Err(denied(actor))
            }
        }
        Rule::SelfOnly => require_user(actor).map(|_| ()),
    }
}

/// Object-level check against the concrete resource instance. Grants are a
/// logical OR across the applicable rules: any single grant allows the
/// action.
pub fn check_object(
    actor: &Actor,
    action: Action,
    kind: ResourceKind,
    owner: Owner<'_>,
) -> Result<(), AppError> {
    match rule_for(kind) {
        // Capability rules carry no per-object state; re-apply them.
        Rule::AdminOrReadOnly | Rule::AdminOnly => check(actor, action, kind),
        Rule::AuthorOrStaffOrReadOnly => {
            if action.is_safe() {
                return Ok(());
            }
            let user = require_user(actor)?;
            let is_author = match owner {
                Owner::Author(id) => user.id == id,
                Owner::Username(name) => user.username == name,
            };
            if is_author || user.is_moderator() || user.is_admin() {
                Ok(())
            } else {
                Err(denied(actor))
            }
        }
        Rule::SelfOnly => {
            let user = require_user(actor)?;
            let is_self = match owner {
                Owner::Author(id) => user.id == id,
                Owner::Username(name) => user.username == name,
            };
            if is_self { Ok(()) } else { Err(denied(actor)) }
        }
    }
}

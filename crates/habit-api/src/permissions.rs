//! Owner-or-public read, owner-only write.
//!
//! One policy shared by the habit and user endpoints. Records that are neither
//! owned by the caller nor public are reported as missing, so their existence
//! never leaks.

use uuid::Uuid;

use habit_types::models::{Habit, UserProfile};

use crate::error::ApiError;

pub trait Owned {
    fn owner_id(&self) -> Uuid;
    fn is_public(&self) -> bool;
}

impl Owned for Habit {
    fn owner_id(&self) -> Uuid {
        self.user
    }

    fn is_public(&self) -> bool {
        self.is_public
    }
}

/// Profiles are visible to every authenticated user (with public fields only)
/// and writable by their owner.
impl Owned for UserProfile {
    fn owner_id(&self) -> Uuid {
        self.id
    }

    fn is_public(&self) -> bool {
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Read,
    Write,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Forbidden,
    NotFound,
}

pub fn authorize<R: Owned + ?Sized>(actor: Uuid, record: &R, op: Operation) -> Decision {
    let is_owner = record.owner_id() == actor;
    match (op, is_owner, record.is_public()) {
        (_, true, _) => Decision::Allow,
        (Operation::Read, false, true) => Decision::Allow,
        (Operation::Write, false, true) => Decision::Forbidden,
        (_, false, false) => Decision::NotFound,
    }
}

impl Decision {
    /// Turn a refusal into the matching API error.
    pub fn require(self, forbidden_message: &'static str) -> Result<(), ApiError> {
        match self {
            Decision::Allow => Ok(()),
            Decision::Forbidden => Err(ApiError::Forbidden(forbidden_message)),
            Decision::NotFound => Err(ApiError::NotFound),
        }
    }
}

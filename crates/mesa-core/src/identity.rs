//! Entity identities.
//!
//! A short identity is a bare row id, meaningful only under the active
//! backend. A full identity pairs the id with its backend and is valid across
//! backends. Equality is structural: two full identities are equal iff their
//! backend keys and ids are equal, and a short identity never equals a full
//! one. Use [`Identity::short`] to bring both sides into the same frame
//! before comparing.

use std::fmt;

use crate::backend::{ActiveBackend, BackendRef};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FullIdentity {
    pub backend: BackendRef,
    pub id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Identity {
    Short(i64),
    Full(FullIdentity),
}

impl Identity {
    #[must_use]
    pub const fn full(backend: BackendRef, id: i64) -> Self {
        Self::Full(FullIdentity { backend, id })
    }

    /// The bare row id, whatever the frame.
    #[must_use]
    pub const fn id(&self) -> i64 {
        match self {
            Self::Short(id) => *id,
            Self::Full(full) => full.id,
        }
    }

    /// The backend this identity carries, if it is a full identity.
    #[must_use]
    pub const fn backend(&self) -> Option<&BackendRef> {
        match self {
            Self::Short(_) => None,
            Self::Full(full) => Some(&full.backend),
        }
    }

    /// Reduce to a short identity when the backend is the active one.
    ///
    /// Short identities are assumed to already belong to the active backend
    /// and are returned as-is.
    #[must_use]
    pub fn short(&self, active: &ActiveBackend) -> Self {
        match self {
            Self::Full(full) if active.is_active(&full.backend) => Self::Short(full.id),
            other => other.clone(),
        }
    }
}

impl From<i64> for Identity {
    fn from(id: i64) -> Self {
        Self::Short(id)
    }
}

impl From<(BackendRef, i64)> for Identity {
    fn from((backend, id): (BackendRef, i64)) -> Self {
        Self::full(backend, id)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Short(id) => write!(f, "{id}"),
            Self::Full(full) => write!(f, "{}:{}", full.backend.key(), full.id),
        }
    }
}

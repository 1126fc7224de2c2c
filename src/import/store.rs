//! Student store abstraction used by the import pipeline.

use crate::models::{NewStudent, Student};
use thiserror::Error;

/// Identifier of the teacher account that owns the imported students.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OwnerId(pub i32);

impl std::fmt::Display for OwnerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Classification of a store failure, decided where the failure happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreErrorKind {
    /// A uniqueness rule in the store rejected the write.
    Conflict,
    /// Any other integrity constraint (not-null, check, foreign key).
    Constraint,
    /// The store rejected a value as malformed.
    Validation,
    /// The owner identity or credentials were rejected.
    Unauthorized,
    /// The store could not be reached.
    Unavailable,
    Internal,
}

impl StoreErrorKind {
    /// The owner identity was rejected, so no later row can succeed either.
    pub fn is_fatal(self) -> bool {
        matches!(self, StoreErrorKind::Unauthorized)
    }

    pub fn is_unreachable(self) -> bool {
        matches!(self, StoreErrorKind::Unavailable)
    }
}

/// Error reported by a [`StudentStore`]. Displays as the store's message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct StoreError {
    pub kind: StoreErrorKind,
    pub message: String,
}

impl StoreError {
    pub fn new(kind: StoreErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.kind.is_fatal()
    }

    pub fn is_unreachable(&self) -> bool {
        self.kind.is_unreachable()
    }
}

/// Persistence operations the import pipeline needs.
#[rocket::async_trait]
pub trait StudentStore: Send + Sync {
    /// Find an active student with the given name and major for `owner`.
    async fn find_active(
        &self,
        owner: OwnerId,
        name: &str,
        major: &str,
    ) -> Result<Option<Student>, StoreError>;

    /// Create a student owned by `owner`.
    async fn insert(&self, owner: OwnerId, student: NewStudent) -> Result<Student, StoreError>;
}

#[rocket::async_trait]
impl<S: StudentStore + ?Sized> StudentStore for &S {
    async fn find_active(
        &self,
        owner: OwnerId,
        name: &str,
        major: &str,
    ) -> Result<Option<Student>, StoreError> {
        (**self).find_active(owner, name, major).await
    }

    async fn insert(&self, owner: OwnerId, student: NewStudent) -> Result<Student, StoreError> {
        (**self).insert(owner, student).await
    }
}

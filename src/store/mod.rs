//! # Store collaborator
//!
//! The single logical table of student records lives behind [`StudentStore`].
//! Implementations only move rows; validation, ownership rules and the
//! translation of failures into user-facing errors belong to
//! [`crate::access`].
//!
//! - [`pg::PgStudentStore`]: PostgreSQL through `sqlx`.
//! - [`memory::MemoryStore`]: in-process table with the same unique
//!   constraints, used by tests and when no database is configured.
//!
//! Every query is scoped to the owning user. Uniqueness of `email` and
//! `matricula` is global and enforced by the store, which reports collisions
//! as SQLSTATE `23505` with the constraint name attached.

use async_trait::async_trait;
use serde::Serialize;
use uuid::Uuid;

use crate::models::{NewStudent, Student};
use crate::schema::Field;

pub mod memory;
pub mod pg;

pub const UNIQUE_VIOLATION: &str = "23505";
pub const EMAIL_CONSTRAINT: &str = "alunos_email_key";
pub const REGISTRATION_CONSTRAINT: &str = "alunos_matricula_key";

/// A range query over the table. Blank filters are already removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListQuery {
    pub search: Option<String>,
    pub course: Option<String>,
    pub offset: u64,
    pub limit: u64,
}

/// One page of rows plus the number of rows matching before pagination.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    pub records: Vec<T>,
    pub total: u64,
}

/// A failure as reported by the store, before any interpretation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendError {
    /// SQLSTATE, when the failure came from the database itself.
    pub code: Option<String>,
    pub constraint: Option<String>,
    pub message: String,
}

impl BackendError {
    pub fn other<S: Into<String>>(message: S) -> Self {
        Self {
            code: None,
            constraint: None,
            message: message.into(),
        }
    }

    pub fn unique_violation(constraint: &str) -> Self {
        Self {
            code: Some(UNIQUE_VIOLATION.to_string()),
            constraint: Some(constraint.to_string()),
            message: format!(
                "duplicate key value violates unique constraint \"{}\"",
                constraint
            ),
        }
    }

    pub fn is_unique_violation(&self) -> bool {
        self.code.as_deref() == Some(UNIQUE_VIOLATION)
    }

    /// Which field a unique violation collided on.
    ///
    /// Returns `None` for anything that is not a unique violation, and
    /// `Some(None)` when the violation does not name a known field.
    pub fn duplicate_field(&self) -> Option<Option<Field>> {
        if !self.is_unique_violation() {
            return None;
        }
        match self.constraint.as_deref() {
            Some(EMAIL_CONSTRAINT) => return Some(Some(Field::Email)),
            Some(REGISTRATION_CONSTRAINT) => return Some(Some(Field::Registration)),
            _ => {}
        }
        // Message inspection breaks as soon as the backend rewords its errors.
        let field = if self.message.contains("email") {
            Some(Field::Email)
        } else if self.message.contains("matricula") {
            Some(Field::Registration)
        } else {
            None
        };
        if field.is_some() {
            log::warn!(
                "unique violation without a known constraint, guessed {:?} from message: {}",
                field,
                self.message
            );
        }
        Some(field)
    }
}

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.code {
            Some(code) => write!(f, "[{}] {}", code, self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for BackendError {}

impl From<sqlx::Error> for BackendError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &err {
            let constraint = db
                .try_downcast_ref::<sqlx::postgres::PgDatabaseError>()
                .and_then(|pg| pg.constraint())
                .map(str::to_string);
            return Self {
                code: db.code().map(|code| code.into_owned()),
                constraint,
                message: db.message().to_string(),
            };
        }
        Self::other(err.to_string())
    }
}

#[async_trait]
pub trait StudentStore: Send + Sync {
    /// Rows owned by `owner` matching `query`, newest first.
    async fn select(&self, owner: Uuid, query: &ListQuery) -> Result<Page<Student>, BackendError>;

    async fn insert(&self, owner: Uuid, student: &NewStudent) -> Result<Student, BackendError>;

    /// Rewrites the row if `owner` owns it. `Ok(None)` when it does not exist
    /// or belongs to someone else.
    async fn update(
        &self,
        owner: Uuid,
        id: Uuid,
        student: &NewStudent,
    ) -> Result<Option<Student>, BackendError>;

    /// Number of rows removed.
    async fn delete(&self, owner: Uuid, id: Uuid) -> Result<u64, BackendError>;

    /// Non-empty course values across all of `owner`'s rows, sorted.
    async fn courses(&self, owner: Uuid) -> Result<Vec<String>, BackendError>;
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Refuses every call the way a dropped connection would.
    pub(crate) struct Unreachable;

    #[async_trait]
    impl StudentStore for Unreachable {
        async fn select(&self, _: Uuid, _: &ListQuery) -> Result<Page<Student>, BackendError> {
            Err(BackendError::other("connection refused"))
        }
        async fn insert(&self, _: Uuid, _: &NewStudent) -> Result<Student, BackendError> {
            Err(BackendError::other("connection refused"))
        }
        async fn update(
            &self,
            _: Uuid,
            _: Uuid,
            _: &NewStudent,
        ) -> Result<Option<Student>, BackendError> {
            Err(BackendError::other("connection refused"))
        }
        async fn delete(&self, _: Uuid, _: Uuid) -> Result<u64, BackendError> {
            Err(BackendError::other("connection refused"))
        }
        async fn courses(&self, _: Uuid) -> Result<Vec<String>, BackendError> {
            Err(BackendError::other("connection refused"))
        }
    }

    #[test]
    fn maps_known_constraints() {
        assert_eq!(
            BackendError::unique_violation(EMAIL_CONSTRAINT).duplicate_field(),
            Some(Some(Field::Email))
        );
        assert_eq!(
            BackendError::unique_violation(REGISTRATION_CONSTRAINT).duplicate_field(),
            Some(Some(Field::Registration))
        );
    }

    #[test]
    fn falls_back_to_message() {
        let err = BackendError {
            code: Some(UNIQUE_VIOLATION.into()),
            constraint: None,
            message: "Key (matricula)=(M1) already exists.".into(),
        };
        assert_eq!(err.duplicate_field(), Some(Some(Field::Registration)));
    }

    #[test]
    fn unnamed_unique_violation_is_generic() {
        let err = BackendError {
            code: Some(UNIQUE_VIOLATION.into()),
            constraint: Some("some_other_key".into()),
            message: "duplicate key value".into(),
        };
        assert_eq!(err.duplicate_field(), Some(None));
    }

    #[test]
    fn other_failures_are_not_duplicates() {
        assert_eq!(BackendError::other("connection reset").duplicate_field(), None);
        let fk = BackendError {
            code: Some("23503".into()),
            constraint: Some(EMAIL_CONSTRAINT.into()),
            message: "email".into(),
        };
        assert_eq!(fk.duplicate_field(), None);
    }
}

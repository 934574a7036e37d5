use axum::http::{StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Json;

use serde::Serialize;

use crate::schema::{Field, FieldIssue, ValidationError};

pub async fn handler404(path: Uri) -> (StatusCode, Json<Error>) {
    (
        StatusCode::NOT_FOUND,
        Json(Error::NotFound {
            message: format!("Invalid path: {}", path),
        }),
    )
}

/// Body of every successful response: `"success": true` next to the value.
#[derive(Debug, Clone, Serialize)]
pub struct Success<V> {
    success: bool,
    #[serde(flatten)]
    value: V,
}

impl<V: Serialize> Success<V> {
    pub fn of(value: V) -> Self {
        Self {
            success: true,
            value,
        }
    }
}

/// Every failure a user action can end in.
///
/// The `Display` text of each variant is the message shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "error")]
pub enum Error {
    /// Rejected before touching the network. `message` is the first issue.
    #[error("{message}")]
    Validation {
        message: String,
        issues: Vec<FieldIssue>,
    },
    /// A unique constraint refused the write. `field` is `None` when the
    /// backend did not say which constraint fired.
    #[error("{message}")]
    Duplicate {
        field: Option<Field>,
        message: String,
    },
    #[error("{message}")]
    NotFound { message: String },
    #[error("{message}")]
    Authentication { message: String },
    #[error("{kind}: {message}")]
    Transport { kind: &'static str, message: String },
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

impl Error {
    pub fn duplicate(field: Option<Field>) -> Error {
        let message = match field {
            Some(Field::Email) => "Este email já está cadastrado",
            Some(Field::Registration) => "Esta matrícula já está cadastrada",
            _ => "Este aluno já está cadastrado",
        };
        Error::Duplicate {
            field,
            message: message.to_string(),
        }
    }

    pub fn not_found() -> Error {
        Error::NotFound {
            message: "Aluno não encontrado".to_string(),
        }
    }

    pub fn unauthenticated() -> Error {
        Error::Authentication {
            message: "Usuário não autenticado".to_string(),
        }
    }

    pub fn transport<S: Into<String>>(kind: &'static str, msg: S) -> Error {
        Error::Transport {
            kind,
            message: msg.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Error::Validation { .. } => StatusCode::BAD_REQUEST,
            Error::Duplicate { .. } => StatusCode::CONFLICT,
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::Authentication { .. } => StatusCode::UNAUTHORIZED,
            Error::Transport { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ValidationError> for Error {
    fn from(err: ValidationError) -> Self {
        Self::Validation {
            message: err.first_message().to_string(),
            issues: err.into_issues(),
        }
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        Self::transport("DatabaseError", err.to_string())
    }
}

impl From<pbkdf2::password_hash::Error> for Error {
    fn from(err: pbkdf2::password_hash::Error) -> Self {
        Self::transport("PasswordHashError", err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::StudentInput;
    use crate::schema::validate;

    #[test]
    fn duplicate_messages_name_the_field() {
        assert_eq!(
            Error::duplicate(Some(Field::Email)).to_string(),
            "Este email já está cadastrado"
        );
        assert_eq!(
            Error::duplicate(Some(Field::Registration)).to_string(),
            "Esta matrícula já está cadastrada"
        );
        assert_eq!(
            Error::duplicate(None).to_string(),
            "Este aluno já está cadastrado"
        );
    }

    #[test]
    fn validation_error_surfaces_first_issue() {
        let err: Error = validate(&StudentInput::new("", "nope", ""))
            .unwrap_err()
            .into();
        assert_eq!(err.to_string(), "Nome é obrigatório");
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        match err {
            Error::Validation { issues, .. } => assert_eq!(issues.len(), 3),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn success_flattens_value() {
        #[derive(Serialize)]
        struct Created {
            user_id: u32,
        }
        let json = serde_json::to_value(Success::of(Created { user_id: 7 })).unwrap();
        assert_eq!(json, serde_json::json!({ "success": true, "user_id": 7 }));
    }

    #[test]
    fn errors_serialize_with_a_tag() {
        let json = serde_json::to_value(Error::unauthenticated()).unwrap();
        assert_eq!(json["error"], "Authentication");
        assert_eq!(json["message"], "Usuário não autenticado");
    }
}

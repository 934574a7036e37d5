use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A row of the `alunos` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Student {
    pub id: Uuid,
    #[serde(rename = "nome")]
    #[sqlx(rename = "nome")]
    pub name: String,
    pub email: String,
    #[serde(rename = "matricula")]
    #[sqlx(rename = "matricula")]
    pub registration: String,
    #[serde(rename = "data_nascimento")]
    #[sqlx(rename = "data_nascimento")]
    pub birth_date: Option<NaiveDate>,
    #[serde(rename = "curso")]
    #[sqlx(rename = "curso")]
    pub course: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub user_id: Uuid,
}

/// Raw, unvalidated record fields as typed by the user.
///
/// Optional fields may arrive as `None` or as an empty string; both mean
/// "absent" once validated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentInput {
    #[serde(rename = "nome", default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(rename = "matricula", default)]
    pub registration: String,
    #[serde(rename = "data_nascimento", default)]
    pub birth_date: Option<String>,
    #[serde(rename = "curso", default)]
    pub course: Option<String>,
}

impl StudentInput {
    pub fn new<S: Into<String>>(name: S, email: S, registration: S) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            registration: registration.into(),
            birth_date: None,
            course: None,
        }
    }

    pub fn with_birth_date<S: Into<String>>(mut self, date: S) -> Self {
        self.birth_date = Some(date.into());
        self
    }

    pub fn with_course<S: Into<String>>(mut self, course: S) -> Self {
        self.course = Some(course.into());
        self
    }
}

impl From<&Student> for StudentInput {
    fn from(student: &Student) -> Self {
        Self {
            name: student.name.clone(),
            email: student.email.clone(),
            registration: student.registration.clone(),
            birth_date: student
                .birth_date
                .map(|date| date.format("%Y-%m-%d").to_string()),
            course: student.course.clone(),
        }
    }
}

/// Record fields that passed validation; what actually gets written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewStudent {
    #[serde(rename = "nome")]
    pub name: String,
    pub email: String,
    #[serde(rename = "matricula")]
    pub registration: String,
    #[serde(rename = "data_nascimento")]
    pub birth_date: Option<NaiveDate>,
    #[serde(rename = "curso")]
    pub course: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserData {
    pub uuid: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Session {
    pub ssid: String,
    pub belongs_to: Uuid,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }
}

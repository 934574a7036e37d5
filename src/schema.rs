//! Field rules for a student record.
//!
//! Everything here is synchronous and free of I/O, so a draft can be checked
//! before any request leaves the process.

use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::models::{NewStudent, StudentInput};

pub const NAME_MAX: usize = 100;
pub const EMAIL_MAX: usize = 255;
pub const REGISTRATION_MAX: usize = 50;
pub const COURSE_MAX: usize = 100;
pub const PASSWORD_MIN: usize = 6;

lazy_static! {
    static ref EMAIL: Regex = Regex::new(
        r"^[A-Za-z0-9_'+\-.]*[A-Za-z0-9_+\-]@([A-Za-z0-9][A-Za-z0-9\-]*\.)+[A-Za-z]{2,}$"
    )
    .expect("email pattern compiles");
}

/// Record fields, in the order they are checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Field {
    #[serde(rename = "nome")]
    Name,
    #[serde(rename = "email")]
    Email,
    #[serde(rename = "matricula")]
    Registration,
    #[serde(rename = "data_nascimento")]
    BirthDate,
    #[serde(rename = "curso")]
    Course,
    #[serde(rename = "password")]
    Password,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldIssue {
    pub field: Field,
    pub message: String,
}

/// One or more field rules failed. Issues keep declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    issues: Vec<FieldIssue>,
}

impl ValidationError {
    pub fn issues(&self) -> &[FieldIssue] {
        &self.issues
    }

    pub fn into_issues(self) -> Vec<FieldIssue> {
        self.issues
    }

    /// The message shown to the user.
    pub fn first_message(&self) -> &str {
        self.issues
            .first()
            .map(|issue| issue.message.as_str())
            .unwrap_or_default()
    }

    pub fn first_field(&self) -> Option<Field> {
        self.issues.first().map(|issue| issue.field)
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.first_message())
    }
}

impl std::error::Error for ValidationError {}

#[derive(Default)]
struct Issues(Vec<FieldIssue>);

impl Issues {
    fn push(&mut self, field: Field, message: &str) {
        self.0.push(FieldIssue {
            field,
            message: message.to_string(),
        });
    }

    fn finish<T>(self, value: T) -> Result<T, ValidationError> {
        if self.0.is_empty() {
            Ok(value)
        } else {
            Err(ValidationError { issues: self.0 })
        }
    }
}

fn len(value: &str) -> usize {
    value.chars().count()
}

pub fn is_valid_email(email: &str) -> bool {
    !email.starts_with('.') && !email.contains("..") && EMAIL.is_match(email)
}

fn optional(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Checks a draft and returns the trimmed record to be written.
pub fn validate(input: &StudentInput) -> Result<NewStudent, ValidationError> {
    let mut issues = Issues::default();

    let name = input.name.trim();
    if name.is_empty() {
        issues.push(Field::Name, "Nome é obrigatório");
    }
    if len(name) > NAME_MAX {
        issues.push(Field::Name, "Nome deve ter no máximo 100 caracteres");
    }

    let email = input.email.trim();
    if !is_valid_email(email) {
        issues.push(Field::Email, "Email inválido");
    }
    if len(email) > EMAIL_MAX {
        issues.push(Field::Email, "Email deve ter no máximo 255 caracteres");
    }

    let registration = input.registration.trim();
    if registration.is_empty() {
        issues.push(Field::Registration, "Matrícula é obrigatória");
    }
    if len(registration) > REGISTRATION_MAX {
        issues.push(
            Field::Registration,
            "Matrícula deve ter no máximo 50 caracteres",
        );
    }

    let birth_date = match optional(&input.birth_date) {
        Some(raw) => match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
            Ok(date) => Some(date),
            Err(_) => {
                issues.push(Field::BirthDate, "Data de nascimento inválida");
                None
            }
        },
        None => None,
    };

    let course = optional(&input.course);
    if course.map(len).unwrap_or(0) > COURSE_MAX {
        issues.push(Field::Course, "Curso deve ter no máximo 100 caracteres");
    }

    issues.finish(NewStudent {
        name: name.to_string(),
        email: email.to_string(),
        registration: registration.to_string(),
        birth_date,
        course: course.map(str::to_string),
    })
}

/// Checks sign-up / sign-in input.
pub fn validate_credentials(email: &str, password: &str) -> Result<(), ValidationError> {
    let mut issues = Issues::default();
    if !is_valid_email(email.trim()) {
        issues.push(Field::Email, "Email inválido");
    }
    if len(password) < PASSWORD_MIN {
        issues.push(Field::Password, "Senha deve ter no mínimo 6 caracteres");
    }
    issues.finish(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ana() -> StudentInput {
        StudentInput::new("Ana Silva", "ana@x.com", "M1")
            .with_birth_date("2001-04-09")
            .with_course("Engenharia")
    }

    #[test]
    fn accepts_valid_record_unchanged() {
        let valid = validate(&ana()).unwrap();
        assert_eq!(valid.name, "Ana Silva");
        assert_eq!(valid.email, "ana@x.com");
        assert_eq!(valid.registration, "M1");
        assert_eq!(valid.birth_date, NaiveDate::from_ymd_opt(2001, 4, 9));
        assert_eq!(valid.course.as_deref(), Some("Engenharia"));
    }

    #[test]
    fn trims_and_drops_blank_optionals() {
        let input = StudentInput::new("  Ana  ", " ana@x.com ", " M1 ")
            .with_birth_date("")
            .with_course("   ");
        let valid = validate(&input).unwrap();
        assert_eq!(valid.name, "Ana");
        assert_eq!(valid.email, "ana@x.com");
        assert_eq!(valid.registration, "M1");
        assert_eq!(valid.birth_date, None);
        assert_eq!(valid.course, None);
    }

    #[test]
    fn single_violation_reports_its_field() {
        let cases = vec![
            (StudentInput { name: "   ".into(), ..ana() }, Field::Name),
            (StudentInput { name: "a".repeat(101), ..ana() }, Field::Name),
            (StudentInput { email: "ana@".into(), ..ana() }, Field::Email),
            (
                StudentInput { email: format!("{}@x.com", "a".repeat(250)), ..ana() },
                Field::Email,
            ),
            (StudentInput { registration: "".into(), ..ana() }, Field::Registration),
            (
                StudentInput { registration: "9".repeat(51), ..ana() },
                Field::Registration,
            ),
            (
                StudentInput { birth_date: Some("09/04/2001".into()), ..ana() },
                Field::BirthDate,
            ),
            (StudentInput { course: Some("c".repeat(101)), ..ana() }, Field::Course),
        ];
        for (input, field) in cases {
            let err = validate(&input).unwrap_err();
            assert_eq!(err.issues().len(), 1, "{:?}", input);
            assert_eq!(err.first_field(), Some(field));
        }
    }

    #[test]
    fn first_message_follows_declaration_order() {
        let input = StudentInput {
            name: "".into(),
            email: "bad".into(),
            registration: "".into(),
            birth_date: Some("x".into()),
            course: Some("c".repeat(200)),
        };
        let err = validate(&input).unwrap_err();
        let fields: Vec<Field> = err.issues().iter().map(|i| i.field).collect();
        assert_eq!(
            fields,
            vec![
                Field::Name,
                Field::Email,
                Field::Registration,
                Field::BirthDate,
                Field::Course
            ]
        );
        assert_eq!(err.first_message(), "Nome é obrigatório");
    }

    #[test]
    fn lengths_count_characters() {
        let input = StudentInput { name: "é".repeat(100), ..ana() };
        assert!(validate(&input).is_ok());
    }

    #[test]
    fn email_syntax() {
        assert!(is_valid_email("a.b+c@dominio.com.br"));
        assert!(!is_valid_email("ana"));
        assert!(!is_valid_email(".ana@x.com"));
        assert!(!is_valid_email("ana..b@x.com"));
        assert!(!is_valid_email("ana@x"));
    }

    #[test]
    fn credentials() {
        assert!(validate_credentials("ana@x.com", "segredo").is_ok());
        let err = validate_credentials("ana@x.com", "123").unwrap_err();
        assert_eq!(err.first_field(), Some(Field::Password));
        let err = validate_credentials("ana", "123").unwrap_err();
        assert_eq!(err.first_message(), "Email inválido");
        assert_eq!(err.issues().len(), 2);
    }
}

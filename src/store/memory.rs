use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{
    BackendError, ListQuery, Page, StudentStore, EMAIL_CONSTRAINT, REGISTRATION_CONSTRAINT,
};
use crate::models::{NewStudent, Student};

/// In-process `alunos` table. Rows are kept in insertion order.
#[derive(Debug, Default)]
pub struct MemoryStore {
    rows: Mutex<Vec<Student>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.rows.lock().await.len()
    }
}

/// Timestamps strictly increase so ordering by `created_at` stays total and
/// an update always moves `updated_at` forward.
fn tick(after: Option<DateTime<Utc>>) -> DateTime<Utc> {
    let now = Utc::now();
    match after {
        Some(last) if now <= last => last + Duration::microseconds(1),
        _ => now,
    }
}

fn check_unique(
    rows: &[Student],
    student: &NewStudent,
    except: Option<Uuid>,
) -> Result<(), BackendError> {
    let others = rows.iter().filter(|row| Some(row.id) != except);
    for row in others {
        if row.email == student.email {
            return Err(BackendError::unique_violation(EMAIL_CONSTRAINT));
        }
        if row.registration == student.registration {
            return Err(BackendError::unique_violation(REGISTRATION_CONSTRAINT));
        }
    }
    Ok(())
}

fn matches(row: &Student, owner: Uuid, query: &ListQuery) -> bool {
    if row.user_id != owner {
        return false;
    }
    if let Some(term) = &query.search {
        let term = term.to_lowercase();
        let hit = [&row.name, &row.email, &row.registration]
            .iter()
            .any(|value| value.to_lowercase().contains(&term));
        if !hit {
            return false;
        }
    }
    match &query.course {
        Some(course) => row.course.as_ref() == Some(course),
        None => true,
    }
}

#[async_trait]
impl StudentStore for MemoryStore {
    async fn select(&self, owner: Uuid, query: &ListQuery) -> Result<Page<Student>, BackendError> {
        let rows = self.rows.lock().await;
        let mut hits: Vec<&Student> = rows
            .iter()
            .rev()
            .filter(|row| matches(row, owner, query))
            .collect();
        hits.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let total = hits.len() as u64;
        let records = hits
            .into_iter()
            .skip(query.offset as usize)
            .take(query.limit as usize)
            .cloned()
            .collect();
        Ok(Page { records, total })
    }

    async fn insert(&self, owner: Uuid, student: &NewStudent) -> Result<Student, BackendError> {
        let mut rows = self.rows.lock().await;
        check_unique(&rows, student, None)?;
        let now = tick(rows.iter().map(|row| row.created_at).max());
        let row = Student {
            id: Uuid::new_v4(),
            name: student.name.clone(),
            email: student.email.clone(),
            registration: student.registration.clone(),
            birth_date: student.birth_date,
            course: student.course.clone(),
            created_at: now,
            updated_at: now,
            user_id: owner,
        };
        rows.push(row.clone());
        Ok(row)
    }

    async fn update(
        &self,
        owner: Uuid,
        id: Uuid,
        student: &NewStudent,
    ) -> Result<Option<Student>, BackendError> {
        let mut rows = self.rows.lock().await;
        let index = match rows.iter().position(|row| row.id == id && row.user_id == owner) {
            Some(index) => index,
            None => return Ok(None),
        };
        check_unique(&rows, student, Some(id))?;
        let row = &mut rows[index];
        row.name = student.name.clone();
        row.email = student.email.clone();
        row.registration = student.registration.clone();
        row.birth_date = student.birth_date;
        row.course = student.course.clone();
        row.updated_at = tick(Some(row.updated_at));
        Ok(Some(row.clone()))
    }

    async fn delete(&self, owner: Uuid, id: Uuid) -> Result<u64, BackendError> {
        let mut rows = self.rows.lock().await;
        let before = rows.len();
        rows.retain(|row| !(row.id == id && row.user_id == owner));
        Ok((before - rows.len()) as u64)
    }

    async fn courses(&self, owner: Uuid) -> Result<Vec<String>, BackendError> {
        let rows = self.rows.lock().await;
        let mut courses: Vec<String> = rows
            .iter()
            .filter(|row| row.user_id == owner)
            .filter_map(|row| row.course.clone())
            .filter(|course| !course.is_empty())
            .collect();
        courses.sort();
        courses.dedup();
        Ok(courses)
    }
}

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use uuid::Uuid;

use super::{BackendError, ListQuery, Page, StudentStore};
use crate::models::{NewStudent, Student};

#[derive(Debug, Clone)]
pub struct PgStudentStore {
    pg: PgPool,
}

impl PgStudentStore {
    pub fn new(pg: PgPool) -> Self {
        Self { pg }
    }
}

/// Escapes `%`, `_` and `\` so a search term matches literally under ILIKE.
pub fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, owner: Uuid, query: &ListQuery) {
    qb.push(" WHERE user_id = ").push_bind(owner);
    if let Some(term) = &query.search {
        let pattern = format!("%{}%", escape_like(term));
        qb.push(" AND (nome ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR email ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR matricula ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
    if let Some(course) = &query.course {
        qb.push(" AND curso = ").push_bind(course.clone());
    }
}

#[async_trait]
impl StudentStore for PgStudentStore {
    async fn select(&self, owner: Uuid, query: &ListQuery) -> Result<Page<Student>, BackendError> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM alunos");
        push_filters(&mut count, owner, query);
        let total: i64 = count.build().fetch_one(&self.pg).await?.try_get(0)?;

        let mut rows = QueryBuilder::<Postgres>::new("SELECT * FROM alunos");
        push_filters(&mut rows, owner, query);
        rows.push(" ORDER BY created_at DESC, id DESC LIMIT ")
            .push_bind(query.limit as i64)
            .push(" OFFSET ")
            .push_bind(query.offset as i64);
        let records = rows
            .build_query_as::<Student>()
            .fetch_all(&self.pg)
            .await?;

        Ok(Page {
            records,
            total: total.max(0) as u64,
        })
    }

    async fn insert(&self, owner: Uuid, student: &NewStudent) -> Result<Student, BackendError> {
        let row = sqlx::query_as::<_, Student>(
            "INSERT INTO alunos (nome, email, matricula, data_nascimento, curso, user_id) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING *",
        )
        .bind(&student.name)
        .bind(&student.email)
        .bind(&student.registration)
        .bind(student.birth_date)
        .bind(&student.course)
        .bind(owner)
        .fetch_one(&self.pg)
        .await?;
        Ok(row)
    }

    async fn update(
        &self,
        owner: Uuid,
        id: Uuid,
        student: &NewStudent,
    ) -> Result<Option<Student>, BackendError> {
        let row = sqlx::query_as::<_, Student>(
            "UPDATE alunos SET nome = $1, email = $2, matricula = $3, data_nascimento = $4, \
             curso = $5, user_id = $6, updated_at = now() \
             WHERE id = $7 AND user_id = $6 RETURNING *",
        )
        .bind(&student.name)
        .bind(&student.email)
        .bind(&student.registration)
        .bind(student.birth_date)
        .bind(&student.course)
        .bind(owner)
        .bind(id)
        .fetch_optional(&self.pg)
        .await?;
        Ok(row)
    }

    async fn delete(&self, owner: Uuid, id: Uuid) -> Result<u64, BackendError> {
        let affected = sqlx::query("DELETE FROM alunos WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(owner)
            .execute(&self.pg)
            .await?;
        Ok(affected.rows_affected())
    }

    async fn courses(&self, owner: Uuid) -> Result<Vec<String>, BackendError> {
        let courses = sqlx::query_scalar::<_, String>(
            "SELECT DISTINCT curso FROM alunos \
             WHERE user_id = $1 AND curso IS NOT NULL AND curso <> '' ORDER BY curso",
        )
        .bind(owner)
        .fetch_all(&self.pg)
        .await?;
        Ok(courses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_like_metacharacters() {
        assert_eq!(escape_like("ana"), "ana");
        assert_eq!(escape_like("50%_off"), "50\\%\\_off");
        assert_eq!(escape_like("a\\b"), "a\\\\b");
    }

    #[test]
    fn builds_combined_filter() {
        let query = ListQuery {
            search: Some("ana".into()),
            course: Some("Direito".into()),
            offset: 10,
            limit: 10,
        };
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM alunos");
        push_filters(&mut qb, Uuid::nil(), &query);
        assert_eq!(
            qb.sql(),
            "SELECT COUNT(*) FROM alunos WHERE user_id = $1 AND (nome ILIKE $2 \
             OR email ILIKE $3 OR matricula ILIKE $4) AND curso = $5"
        );
    }

    #[test]
    fn no_filters_only_scope_by_owner() {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT * FROM alunos");
        push_filters(&mut qb, Uuid::nil(), &ListQuery::default());
        assert_eq!(qb.sql(), "SELECT * FROM alunos WHERE user_id = $1");
    }
}

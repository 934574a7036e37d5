//! Data access for student records.
//!
//! [`Students`] turns user intent (a filter, a draft, an id) into store calls
//! for the session it is handed, and turns store failures into [`Error`]s
//! with the message the user should read. Mutations report their outcome
//! through the [`Notifier`]; listing leaves that to the caller.

use std::sync::Arc;

use serde::Deserialize;
use uuid::Uuid;

use crate::err::Error;
use crate::models::{Session, Student, StudentInput};
use crate::notify::Notifier;
use crate::schema::validate;
use crate::store::{BackendError, ListQuery, Page, StudentStore};

pub const ITEMS_PER_PAGE: u32 = 10;

/// What the list is currently asking for.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StudentFilter {
    #[serde(default)]
    pub search: String,
    #[serde(rename = "curso", default)]
    pub course: String,
    #[serde(default = "first_page")]
    pub page: u32,
}

fn first_page() -> u32 {
    1
}

impl Default for StudentFilter {
    fn default() -> Self {
        Self {
            search: String::new(),
            course: String::new(),
            page: first_page(),
        }
    }
}

fn non_blank(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

impl StudentFilter {
    /// Range query for this filter. Blank search or course means "no filter".
    pub fn to_query(&self, page_size: u32) -> ListQuery {
        let page = self.page.max(1) as u64;
        ListQuery {
            search: non_blank(&self.search),
            course: non_blank(&self.course),
            offset: (page - 1) * page_size as u64,
            limit: page_size as u64,
        }
    }
}

fn transport(err: BackendError) -> Error {
    Error::transport("DatabaseError", err.to_string())
}

/// Unique violations become [`Error::Duplicate`], everything else is transport.
fn write_error(err: BackendError) -> Error {
    match err.duplicate_field() {
        Some(field) => Error::duplicate(field),
        None => transport(err),
    }
}

fn ensure_session(session: &Session) -> Result<Uuid, Error> {
    if session.is_expired() {
        return Err(Error::unauthenticated());
    }
    Ok(session.belongs_to)
}

#[derive(Clone)]
pub struct Students {
    store: Arc<dyn StudentStore>,
    notifier: Notifier,
    page_size: u32,
}

impl Students {
    pub fn new(store: Arc<dyn StudentStore>, notifier: Notifier) -> Self {
        Self {
            store,
            notifier,
            page_size: ITEMS_PER_PAGE,
        }
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    pub async fn list(
        &self,
        session: &Session,
        filter: &StudentFilter,
    ) -> Result<Page<Student>, Error> {
        let owner = ensure_session(session)?;
        let query = filter.to_query(self.page_size);
        self.store.select(owner, &query).await.map_err(transport)
    }

    pub async fn create(&self, session: &Session, input: &StudentInput) -> Result<(), Error> {
        let outcome = self.try_create(session, input).await;
        self.report(&outcome, "Aluno cadastrado com sucesso!");
        outcome
    }

    async fn try_create(&self, session: &Session, input: &StudentInput) -> Result<(), Error> {
        let student = validate(input)?;
        let owner = ensure_session(session)?;
        let row = self.store.insert(owner, &student).await.map_err(write_error)?;
        log::debug!("created aluno {} for {}", row.id, owner);
        Ok(())
    }

    pub async fn update(
        &self,
        session: &Session,
        id: Uuid,
        input: &StudentInput,
    ) -> Result<(), Error> {
        let outcome = self.try_update(session, id, input).await;
        self.report(&outcome, "Aluno atualizado com sucesso!");
        outcome
    }

    async fn try_update(
        &self,
        session: &Session,
        id: Uuid,
        input: &StudentInput,
    ) -> Result<(), Error> {
        let student = validate(input)?;
        let owner = ensure_session(session)?;
        match self.store.update(owner, id, &student).await.map_err(write_error)? {
            Some(row) => {
                log::debug!("updated aluno {} at {}", row.id, row.updated_at);
                Ok(())
            }
            None => Err(Error::not_found()),
        }
    }

    /// Removing an id that is already gone is not an error.
    pub async fn delete(&self, session: &Session, id: Uuid) -> Result<(), Error> {
        let owner = match ensure_session(session) {
            Ok(owner) => owner,
            Err(err) => {
                self.notifier.error(err.to_string());
                return Err(err);
            }
        };
        match self.store.delete(owner, id).await {
            Ok(removed) => {
                log::debug!("delete {} removed {} row(s)", id, removed);
                self.notifier.success("Aluno removido com sucesso!");
                Ok(())
            }
            Err(err) => {
                log::error!("Erro ao deletar aluno {}: {}", id, err);
                self.notifier.error("Erro ao remover aluno");
                Err(transport(err))
            }
        }
    }

    /// Distinct course values over every record of the session's user.
    pub async fn all_courses(&self, session: &Session) -> Result<Vec<String>, Error> {
        let owner = ensure_session(session)?;
        self.store.courses(owner).await.map_err(transport)
    }

    fn report(&self, outcome: &Result<(), Error>, success: &str) {
        match outcome {
            Ok(()) => self.notifier.success(success),
            Err(err) => self.notifier.error(err.to_string()),
        }
    }
}

/// Non-empty courses of the given records, first-seen order, no repeats.
///
/// Only reflects the page that was loaded; see [`Students::all_courses`] for
/// the whole table.
pub fn distinct_courses(records: &[Student]) -> Vec<String> {
    let mut courses: Vec<String> = Vec::new();
    for course in records.iter().filter_map(|record| record.course.as_deref()) {
        if !course.is_empty() && !courses.iter().any(|seen| seen == course) {
            courses.push(course.to_string());
        }
    }
    courses
}

//! Client-side state of the student list.
//!
//! Every change to the search term, course filter or page hands back a
//! [`FetchTicket`]. The caller runs it (see [`ListState::run`]) or, when
//! several fetches are in flight at once, sends `ticket.filter` itself and
//! feeds the result to [`ListState::apply`]. Tickets are numbered; a result
//! older than the newest one already applied is dropped.

use serde::Serialize;

use crate::access::{distinct_courses, StudentFilter, Students};
use crate::err::Error;
use crate::models::{Session, Student};
use crate::notify::Notifier;
use crate::store::Page;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    pub seq: u64,
    pub filter: StudentFilter,
}

pub struct ListState {
    filter: StudentFilter,
    page_size: u32,
    records: Vec<Student>,
    total: u64,
    issued: u64,
    applied: u64,
    reset_page_on_filter: bool,
    notifier: Notifier,
}

/// What a renderer needs from the list at one point in time.
#[derive(Debug, Clone, Serialize)]
pub struct ListView {
    #[serde(rename = "alunos")]
    pub records: Vec<Student>,
    pub total: u64,
    pub page: u32,
    pub page_count: u32,
    pub page_size: u32,
    #[serde(rename = "cursos")]
    pub courses: Vec<String>,
    pub loading: bool,
}

impl ListState {
    pub fn new(page_size: u32, notifier: Notifier) -> Self {
        Self {
            filter: StudentFilter::default(),
            page_size: page_size.max(1),
            records: Vec::new(),
            total: 0,
            issued: 0,
            applied: 0,
            reset_page_on_filter: false,
            notifier,
        }
    }

    /// Sized and wired like `students`.
    pub fn for_students(students: &Students) -> Self {
        Self::new(students.page_size(), students.notifier().clone())
    }

    /// Go back to page 1 whenever the search term or course changes.
    pub fn reset_page_on_filter(mut self, reset: bool) -> Self {
        self.reset_page_on_filter = reset;
        self
    }

    /// Starts from `filter` instead of an unfiltered first page. Page 0 is
    /// read as page 1; upper bounds are only known after a fetch.
    pub fn starting_at(mut self, filter: StudentFilter) -> Self {
        self.filter = StudentFilter {
            page: filter.page.max(1),
            ..filter
        };
        self
    }

    pub fn filter(&self) -> &StudentFilter {
        &self.filter
    }

    pub fn records(&self) -> &[Student] {
        &self.records
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn page(&self) -> u32 {
        self.filter.page
    }

    /// True while the newest issued fetch has not come back.
    pub fn loading(&self) -> bool {
        self.issued > self.applied
    }

    pub fn page_count(&self) -> u32 {
        let pages = (self.total + self.page_size as u64 - 1) / self.page_size as u64;
        pages.min(u32::MAX as u64) as u32
    }

    pub fn can_go_back(&self) -> bool {
        self.filter.page > 1
    }

    pub fn can_go_forward(&self) -> bool {
        self.filter.page < self.page_count()
    }

    /// Courses seen on the loaded page.
    pub fn courses(&self) -> Vec<String> {
        distinct_courses(&self.records)
    }

    pub fn view(&self) -> ListView {
        ListView {
            records: self.records.clone(),
            total: self.total,
            page: self.filter.page,
            page_count: self.page_count(),
            page_size: self.page_size,
            courses: self.courses(),
            loading: self.loading(),
        }
    }

    fn ticket(&mut self) -> FetchTicket {
        self.issued += 1;
        FetchTicket {
            seq: self.issued,
            filter: self.filter.clone(),
        }
    }

    /// Fetch the current filter again, e.g. after a mutation.
    pub fn reload(&mut self) -> FetchTicket {
        self.ticket()
    }

    pub fn set_search<S: Into<String>>(&mut self, term: S) -> FetchTicket {
        self.filter.search = term.into();
        if self.reset_page_on_filter {
            self.filter.page = 1;
        }
        self.ticket()
    }

    pub fn set_course<S: Into<String>>(&mut self, course: S) -> FetchTicket {
        self.filter.course = course.into();
        if self.reset_page_on_filter {
            self.filter.page = 1;
        }
        self.ticket()
    }

    /// Moves to `page` if it lies between 1 and the last page. Anything else
    /// is refused and no fetch is issued.
    pub fn set_page(&mut self, page: u32) -> Option<FetchTicket> {
        let last = self.page_count().max(1);
        if page < 1 || page > last {
            log::debug!("refusing page {} outside 1..={}", page, last);
            return None;
        }
        self.filter.page = page;
        Some(self.ticket())
    }

    pub fn next_page(&mut self) -> Option<FetchTicket> {
        if !self.can_go_forward() {
            return None;
        }
        self.set_page(self.filter.page + 1)
    }

    pub fn previous_page(&mut self) -> Option<FetchTicket> {
        if !self.can_go_back() {
            return None;
        }
        self.set_page(self.filter.page - 1)
    }

    /// Applies the outcome of `ticket`. Returns false when the result was
    /// stale and ignored.
    ///
    /// A failure keeps the records already on screen.
    pub fn apply(&mut self, ticket: &FetchTicket, result: Result<Page<Student>, Error>) -> bool {
        if ticket.seq <= self.applied {
            log::debug!(
                "dropping list result #{} (already showing #{})",
                ticket.seq,
                self.applied
            );
            return false;
        }
        self.applied = ticket.seq;
        match result {
            Ok(page) => {
                self.records = page.records;
                self.total = page.total;
            }
            Err(err) => {
                log::error!("Erro ao buscar alunos: {}", err);
                self.notifier.error("Erro ao carregar alunos");
            }
        }
        true
    }

    /// Sends `ticket` through `students` and applies the result.
    pub async fn run(
        &mut self,
        ticket: FetchTicket,
        students: &Students,
        session: &Session,
    ) -> bool {
        let result = students.list(session, &ticket.filter).await;
        self.apply(&ticket, result)
    }
}

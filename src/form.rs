use uuid::Uuid;

use crate::access::Students;
use crate::err::Error;
use crate::list::ListState;
use crate::models::{Session, Student, StudentInput};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormMode {
    /// Empty draft, submits a create.
    Create,
    /// Draft loaded from an existing record, submits an update of that id.
    Edit(Uuid),
}

/// The create/edit dialog for one student record.
#[derive(Debug, Clone)]
pub struct RecordForm {
    open: bool,
    mode: FormMode,
    draft: StudentInput,
    submitting: bool,
}

/// A draft on its way to the store, detached from the form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub mode: FormMode,
    pub draft: StudentInput,
}

impl Submission {
    pub async fn send(&self, students: &Students, session: &Session) -> Result<(), Error> {
        match self.mode {
            FormMode::Create => students.create(session, &self.draft).await,
            FormMode::Edit(id) => students.update(session, id, &self.draft).await,
        }
    }
}

impl Default for RecordForm {
    fn default() -> Self {
        Self {
            open: false,
            mode: FormMode::Create,
            draft: StudentInput::default(),
            submitting: false,
        }
    }
}

impl RecordForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn mode(&self) -> FormMode {
        self.mode
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting
    }

    pub fn draft(&self) -> &StudentInput {
        &self.draft
    }

    /// `None` while a submission is in flight.
    pub fn draft_mut(&mut self) -> Option<&mut StudentInput> {
        if self.submitting {
            None
        } else {
            Some(&mut self.draft)
        }
    }

    /// Opens with `record` loaded for editing, or empty when `None`.
    pub fn open(&mut self, record: Option<&Student>) {
        self.open = true;
        self.load(record);
    }

    /// Replaces the draft with `record`'s fields, or clears it.
    pub fn load(&mut self, record: Option<&Student>) {
        match record {
            Some(student) => {
                self.mode = FormMode::Edit(student.id);
                self.draft = StudentInput::from(student);
            }
            None => {
                self.mode = FormMode::Create;
                self.draft = StudentInput::default();
            }
        }
    }

    pub fn close(&mut self) {
        self.open = false;
        self.submitting = false;
        self.load(None);
    }

    /// Freezes the draft for sending. `None` if a submission is already out.
    pub fn begin_submit(&mut self) -> Option<Submission> {
        if self.submitting {
            return None;
        }
        self.submitting = true;
        Some(Submission {
            mode: self.mode,
            draft: self.draft.clone(),
        })
    }

    /// Success closes the form; failure leaves the draft for another try.
    pub fn finish_submit(&mut self, result: &Result<(), Error>) {
        self.submitting = false;
        if result.is_ok() {
            self.close();
        }
    }

    /// Creates or updates from the draft and reloads `list` on success.
    ///
    /// `None` when a submission was already in flight and nothing was sent.
    /// A failure is already announced by `students`; it is returned so the
    /// caller can keep focus on the form.
    pub async fn submit(
        &mut self,
        students: &Students,
        session: &Session,
        list: &mut ListState,
    ) -> Option<Result<(), Error>> {
        let submission = self.begin_submit()?;
        let result = submission.send(students, session).await;
        self.finish_submit(&result);
        if result.is_ok() {
            let ticket = list.reload();
            list.run(ticket, students, session).await;
        }
        Some(result)
    }
}

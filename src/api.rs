use std::sync::Arc;

use axum::extract::{Path, Query};
use axum::handler::Handler;
use axum::headers::authorization::Bearer;
use axum::headers::Authorization;
use axum::routing::{get, post, put};
use axum::{Extension, Json, Router, TypedHeader};
use serde::Serialize;
use tokio::sync::mpsc::UnboundedReceiver;
use tower::ServiceBuilder;
use uuid::Uuid;

use crate::access::{StudentFilter, Students};
use crate::auth::{AuthGate, CreatedUser, Credentials};
use crate::err::{handler404, Error};
use crate::list::{ListState, ListView};
use crate::models::{Session, StudentInput};
use crate::notify::{drain, Notice, Notifier};
use crate::store::StudentStore;
use crate::{proceeds, Payload};

/// Shared collaborators, handed to every handler as an extension.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn StudentStore>,
    pub auth: Arc<dyn AuthGate>,
    pub page_size: u32,
}

impl AppState {
    fn students(&self) -> (Students, UnboundedReceiver<Notice>) {
        let (notifier, rx) = Notifier::channel();
        let students = Students::new(self.store.clone(), notifier).with_page_size(self.page_size);
        (students, rx)
    }
}

/// A response value plus whatever was announced while producing it.
#[derive(Debug, Clone, Serialize)]
pub struct Notified<V> {
    #[serde(flatten)]
    pub value: V,
    pub notices: Vec<Notice>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Done {}

#[derive(Debug, Clone, Serialize)]
pub struct Courses {
    #[serde(rename = "cursos")]
    pub courses: Vec<String>,
}

type MaybeBearer = Option<TypedHeader<Authorization<Bearer>>>;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/auth/signup", post(sign_up))
        .route("/auth/signin", post(sign_in))
        .route("/auth/signout", post(sign_out))
        .route("/students", get(list_students).post(create_student))
        .route("/students/courses", get(list_courses))
        .route("/students/:id", put(update_student).delete(delete_student))
        .fallback(handler404.into_service())
        .layer(ServiceBuilder::new().layer(Extension(state)))
}

async fn session_of(state: &AppState, bearer: MaybeBearer) -> Result<Session, Error> {
    let TypedHeader(Authorization(bearer)) = bearer.ok_or_else(Error::unauthenticated)?;
    state
        .auth
        .current_user(bearer.token())
        .await?
        .ok_or_else(Error::unauthenticated)
}

async fn sign_up(
    Extension(state): Extension<AppState>,
    Json(credentials): Json<Credentials>,
) -> Payload<Notified<CreatedUser>> {
    let (notifier, mut rx) = Notifier::channel();
    let created = state.auth.sign_up(&credentials).await?;
    notifier.success("Conta criada com sucesso!");
    proceeds(Notified {
        value: created,
        notices: drain(&mut rx),
    })
}

async fn sign_in(
    Extension(state): Extension<AppState>,
    Json(credentials): Json<Credentials>,
) -> Payload<Notified<Session>> {
    let (notifier, mut rx) = Notifier::channel();
    let session = state.auth.sign_in(&credentials).await?;
    notifier.success("Login realizado com sucesso!");
    proceeds(Notified {
        value: session,
        notices: drain(&mut rx),
    })
}

async fn sign_out(
    Extension(state): Extension<AppState>,
    bearer: MaybeBearer,
) -> Payload<Notified<Done>> {
    let (notifier, mut rx) = Notifier::channel();
    let session = session_of(&state, bearer).await?;
    state.auth.sign_out(&session).await?;
    notifier.success("Você saiu do sistema");
    proceeds(Notified {
        value: Done {},
        notices: drain(&mut rx),
    })
}

/// A request has no list on screen to fall back on, so a failed fetch is
/// the response.
fn fetch_failed(err: Error) -> Error {
    match err {
        Error::Transport { .. } => {
            log::error!("Erro ao buscar alunos: {}", err);
            Error::transport("DatabaseError", "Erro ao carregar alunos")
        }
        other => other,
    }
}

async fn list_students(
    Extension(state): Extension<AppState>,
    bearer: MaybeBearer,
    Query(filter): Query<StudentFilter>,
) -> Payload<Notified<ListView>> {
    let session = session_of(&state, bearer).await?;
    let (students, mut rx) = state.students();

    let mut list = ListState::for_students(&students).starting_at(filter);
    let ticket = list.reload();
    let page = students.list(&session, &ticket.filter).await.map_err(fetch_failed)?;
    list.apply(&ticket, Ok(page));
    if list.page() > list.page_count().max(1) {
        // past the last page: show the last one instead
        if let Some(ticket) = list.set_page(list.page_count().max(1)) {
            let page = students.list(&session, &ticket.filter).await.map_err(fetch_failed)?;
            list.apply(&ticket, Ok(page));
        }
    }

    proceeds(Notified {
        value: list.view(),
        notices: drain(&mut rx),
    })
}

async fn list_courses(
    Extension(state): Extension<AppState>,
    bearer: MaybeBearer,
) -> Payload<Courses> {
    let session = session_of(&state, bearer).await?;
    let (students, _rx) = state.students();
    let courses = students.all_courses(&session).await?;
    proceeds(Courses { courses })
}

async fn create_student(
    Extension(state): Extension<AppState>,
    bearer: MaybeBearer,
    Json(input): Json<StudentInput>,
) -> Payload<Notified<Done>> {
    let session = session_of(&state, bearer).await?;
    let (students, mut rx) = state.students();
    students.create(&session, &input).await?;
    proceeds(Notified {
        value: Done {},
        notices: drain(&mut rx),
    })
}

async fn update_student(
    Extension(state): Extension<AppState>,
    bearer: MaybeBearer,
    Path(id): Path<Uuid>,
    Json(input): Json<StudentInput>,
) -> Payload<Notified<Done>> {
    let session = session_of(&state, bearer).await?;
    let (students, mut rx) = state.students();
    students.update(&session, id, &input).await?;
    proceeds(Notified {
        value: Done {},
        notices: drain(&mut rx),
    })
}

async fn delete_student(
    Extension(state): Extension<AppState>,
    bearer: MaybeBearer,
    Path(id): Path<Uuid>,
) -> Payload<Notified<Done>> {
    let session = session_of(&state, bearer).await?;
    let (students, mut rx) = state.students();
    students.delete(&session, id).await?;
    proceeds(Notified {
        value: Done {},
        notices: drain(&mut rx),
    })
}

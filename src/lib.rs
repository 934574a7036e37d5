pub mod access;
pub mod api;
pub mod auth;
pub mod config;
pub mod err;
pub mod form;
pub mod list;
pub mod models;
pub mod notify;
pub mod schema;
pub mod store;

use axum::Json;
use serde::Serialize;

use crate::err::{Error, Success};

pub type Payload<T> = axum::response::Result<Json<Success<T>>, Error>;

pub fn proceeds<V>(value: V) -> Payload<V>
where
    V: Serialize,
{
    Ok(Json(Success::of(value)))
}

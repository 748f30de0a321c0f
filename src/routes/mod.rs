//! HTTP surface. Each submodule owns one resource family and exposes a
//! `router()`; this module merges them and attaches the shared state.
//!
//! Handlers follow one shape: validate, open a transaction for writes,
//! call the model functions and the exercise rules the write triggers,
//! commit. Read-only handlers borrow a pool connection instead.

use axum::Router;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::db::Db;

pub mod card;
pub mod definition;
pub mod example;
pub mod exercise;
pub mod pronunciation;
pub mod term;
pub mod user;

#[derive(Clone)]
pub struct AppState {
    pub db: Db,
    pub config: Config,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(term::router())
        .merge(definition::router())
        .merge(example::router())
        .merge(pronunciation::router())
        .merge(exercise::router())
        .merge(card::router())
        .merge(user::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod highlight;
pub mod language;
pub mod models;
pub mod normalize;
pub mod pagination;
pub mod routes;

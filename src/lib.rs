// Library exports for yatube
// Integration tests build the router and database through these modules.

pub mod auth;
pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod forms;
pub mod media;
pub mod pagination;
pub mod routes;
pub mod state;

//! SpaceForge interior design backend.
//!
//! Room photos are analysed by an AI provider into a furniture layout, which
//! can be rendered asynchronously through an in-process job queue or handed
//! to a procurement agent whose progress streams to the client over SSE.

pub mod app_state;
pub mod config;
pub mod db;
pub mod models;
pub mod routes;
pub mod services;

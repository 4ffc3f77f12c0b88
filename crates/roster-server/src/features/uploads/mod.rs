//! Spreadsheet upload feature slice

pub mod commands;
pub mod queries;
pub mod routes;

pub use routes::uploads_routes;

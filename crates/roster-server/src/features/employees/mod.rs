//! Employee records feature slice

pub mod commands;
pub mod queries;
pub mod routes;

pub use routes::employees_routes;

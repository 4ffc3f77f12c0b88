//! Dashboard feature slice

pub mod queries;
pub mod routes;

pub use routes::dashboard_routes;

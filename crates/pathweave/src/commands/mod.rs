//! Command implementations

pub mod routes;
pub mod serve;
pub mod viewer;

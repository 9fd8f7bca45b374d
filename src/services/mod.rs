//! Business-rule layer between the HTTP handlers and the database.

pub mod orders;
pub mod stats;

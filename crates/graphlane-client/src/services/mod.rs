//! Client services

pub mod api;
pub mod insert;

pub use api::GraphClient;

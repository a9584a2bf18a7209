pub mod api;
pub mod service;

pub use api::ErrorResponse;
pub use service::{Hoppipolla, ServiceError};

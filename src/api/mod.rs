//! API layer for the attested-rewards service

pub mod error;
mod rest;

pub use error::{ApiError, ErrorCode};
pub use rest::{registrar_router, router};

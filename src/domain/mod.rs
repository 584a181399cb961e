//! Core domain types for the attested-rewards service

mod types;

pub use types::*;

//! Shared types and business rules for the Repair Shop Management system
//!
//! This crate contains the domain types and pure rules shared between the
//! backend and the browser client (via WASM).

pub mod models;
pub mod types;
pub mod validation;

pub use models::*;
pub use types::*;
pub use validation::*;

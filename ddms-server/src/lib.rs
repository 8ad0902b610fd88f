//! Web front end for the DDMS document index.
//!
//! All reads go through the store broker's read path; the only mutation
//! exposed here is clearing an item's "recently added" flag. The index is
//! otherwise maintained exclusively by the reconciliation engine.

pub mod errors;
pub mod handlers;
pub mod routes;
pub mod state;

pub use errors::{AppError, AppResult};
pub use state::AppState;

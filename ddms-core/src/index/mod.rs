//! Reconciliation of filesystem observations against the index.

pub mod coalesce;
pub mod engine;
pub mod resolver;
pub mod walker;

//! Hash-chained audit trail for review decisions.

mod chain;

pub use chain::*;

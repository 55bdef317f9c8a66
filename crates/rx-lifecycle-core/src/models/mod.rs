//! Domain models for the prescription lifecycle engine.

mod audit;
mod medicine;
mod prescription;
mod reminder;

pub use audit::*;
pub use medicine::*;
pub use prescription::*;
pub use reminder::*;

//! Terminal output helpers.

pub mod table;

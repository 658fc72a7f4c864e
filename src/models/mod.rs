//! Domain model module declarations.

pub mod decision;
pub mod lead;
pub mod message;

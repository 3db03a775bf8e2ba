//! Deterministic, pure logic shared by the turn loop.
//!
//! Core modules are free of I/O side effects: identical text in, identical
//! structured output out.

pub mod budget;
pub mod command;
pub mod extract;
pub mod history;
pub mod types;

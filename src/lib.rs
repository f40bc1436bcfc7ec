// src/lib.rs — Library root for Foresight

pub mod cli;
pub mod core;
pub mod engine;
pub mod infra;
pub mod memory;
pub mod patterns;
pub mod predict;

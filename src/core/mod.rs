// src/core/mod.rs — Domain types

pub mod types;

// src/core/mod.rs
pub mod proof;
pub mod services;
pub mod session;

// src/services/mod.rs
pub mod game;
pub mod registry;

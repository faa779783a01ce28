// src/models/mod.rs
pub mod game;
pub mod message;

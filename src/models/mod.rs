// src/models/mod.rs

pub mod quiz;
pub mod response;
pub mod user;

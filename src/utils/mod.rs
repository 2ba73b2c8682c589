// src/utils/mod.rs

pub mod cursor;
pub mod hash;
pub mod jwt;

// src/utils/mod.rs

pub mod jwt;
pub mod mail;
pub mod validate;

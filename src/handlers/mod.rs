// src/handlers/mod.rs

pub mod admin;
pub mod auth;
pub mod bugs;
pub mod listings;
pub mod profile;

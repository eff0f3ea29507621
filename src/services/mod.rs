// src/services/mod.rs

pub mod audit;
pub mod credentials;
pub mod invite;
pub mod listings;
pub mod matching;
pub mod ownership;
pub mod sessions;

// src/models/mod.rs

pub mod bug_report;
pub mod listing;
pub mod security_log;
pub mod user;

//! Configuration and the request/result types shared by every layer

pub mod config;
pub mod models;

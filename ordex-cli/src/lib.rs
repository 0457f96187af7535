//! Ordex CLI - client-side leader election and order routing

pub mod client;
pub mod commands;
pub mod config;

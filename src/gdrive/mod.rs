//! Google Drive API module
//!
//! Contains types, authentication, and client for interacting with the Drive and Sheets APIs.

pub mod auth;
pub mod client;
pub mod types;
pub mod utils;

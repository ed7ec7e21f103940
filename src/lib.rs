//! Google Drive MCP Server Library
//!
//! A Model Context Protocol (MCP) server for Google Drive served over HTTP and
//! Server-Sent Events. Exposes Drive files as resources and provides tools for
//! searching, reading, and editing Drive files and Sheets.

pub mod config;
pub mod error;
pub mod gdrive;
pub mod mcp;
pub mod transport;

pub use config::{Config, ServerConfig};
pub use error::{GdriveMcpError, Result};

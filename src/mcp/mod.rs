//! MCP (Model Context Protocol) module
//!
//! Implements the MCP protocol engine, tool registry, and Drive resources.

pub mod registry;
pub mod resources;
pub mod server;
pub mod tools;
pub mod types;

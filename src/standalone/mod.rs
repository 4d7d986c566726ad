//! MCP server surface for `aks-plugins`.

pub mod hot_reload;
pub mod server;

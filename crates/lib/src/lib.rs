//! Tether core library: tool-provider server connections and progressive skill loading,
//! used by the CLI and by any chat front end that embeds it.

pub mod config;
pub mod init;
pub mod mcp;
pub mod skills;
pub mod tools;

//! MCP (Model Context Protocol) client library.
//!
//! This crate runs tool servers as child processes and talks JSON-RPC 2.0 to
//! them over stdio, one message per line. Each server gets a background
//! reader that routes replies to waiting callers by request ID, so many calls
//! can be in flight on one server at once.
//!
//! # Example
//!
//! ```no_run
//! use mcp::{ServerConfig, ToolClient};
//! use std::collections::HashMap;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> mcp::Result<()> {
//! let config = ServerConfig {
//!     name: "filesystem".to_string(),
//!     command: "mcp-filesystem".to_string(),
//!     args: vec!["--root".to_string(), "./workspace".to_string()],
//!     env: HashMap::new(),
//! };
//!
//! let client = ToolClient::start([config]).await;
//! for tool in client.list_tools() {
//!     println!("Tool: {}", tool.name);
//! }
//!
//! let cancel = CancellationToken::new();
//! let result = client
//!     .call_tool(
//!         "read_file",
//!         Some(serde_json::json!({ "path": "./README.md" })),
//!         &cancel,
//!     )
//!     .await?;
//! println!("{result}");
//!
//! client.stop().await;
//! # Ok(())
//! # }
//! ```

mod client;
mod error;
mod protocol;
mod rpc;
mod server;

pub use client::{ServerStatus, ToolClient};
pub use error::{Error, Result};
pub use protocol::{
    CallToolParams, InitializeParams, InitializeResult, JsonRpcError, JsonRpcNotification,
    JsonRpcRequest, JsonRpcResponse, ListToolsResult, PROTOCOL_VERSION, RequestId,
    ServerCapabilities, ServerInfo, Tool,
};
pub use rpc::{MAX_OUTPUT_SIZE, PendingTable, RpcChannel};
pub use server::{HANDSHAKE_TIMEOUT, SHUTDOWN_TIMEOUT, Server, ServerConfig};

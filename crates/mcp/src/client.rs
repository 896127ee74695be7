//! A pool of MCP servers addressed by tool name.

use std::collections::HashSet;

use futures::future::join_all;
use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::error::{Error, Result};
use crate::protocol::Tool;
use crate::server::{Server, ServerConfig};

/// Snapshot of one server's state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerStatus {
    pub name: String,
    pub running: bool,
    pub tools: usize,
    pub pending_requests: usize,
}

/// Client over every configured tool server.
///
/// Servers are kept in configuration order. When two servers expose a tool
/// with the same name, the one configured first owns it.
pub struct ToolClient {
    servers: Vec<Server>,
}

impl ToolClient {
    /// Start all servers concurrently.
    ///
    /// A server that fails to spawn or handshake is logged and left out; the
    /// rest are unaffected.
    pub async fn start(configs: impl IntoIterator<Item = ServerConfig>) -> Self {
        let launches = configs.into_iter().map(|config| async move {
            let name = config.name.clone();
            (name, Server::start(config).await)
        });

        let mut servers = Vec::new();
        for (name, started) in join_all(launches).await {
            match started {
                Ok(server) => servers.push(server),
                Err(e) => error!(server = %name, error = %e, "failed to start tool server"),
            }
        }

        let client = Self::from_servers(servers);
        client.warn_shadowed_tools();
        info!(
            servers = client.servers.len(),
            tools = client.list_tools().len(),
            "tool client ready"
        );
        client
    }

    /// Build a client from already started servers, keeping their order.
    pub fn from_servers(servers: Vec<Server>) -> Self {
        Self { servers }
    }

    pub fn servers(&self) -> &[Server] {
        &self.servers
    }

    /// Every reachable tool, first owner wins on name collisions.
    pub fn list_tools(&self) -> Vec<Tool> {
        let mut seen = HashSet::new();
        self.servers
            .iter()
            .flat_map(Server::tools)
            .filter(|tool| seen.insert(tool.name.as_str()))
            .cloned()
            .collect()
    }

    /// The server that owns `tool`, if any.
    pub fn find_server(&self, tool: &str) -> Option<&Server> {
        self.servers.iter().find(|server| server.exposes(tool))
    }

    /// Invoke a tool on whichever server owns it.
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: Option<Value>,
        cancel: &CancellationToken,
    ) -> Result<Value> {
        let server = self
            .find_server(name)
            .ok_or_else(|| Error::ToolNotFound(name.to_string()))?;
        server.call_tool(name, arguments, cancel).await
    }

    pub async fn status(&self) -> Vec<ServerStatus> {
        let mut statuses = Vec::with_capacity(self.servers.len());
        for server in &self.servers {
            statuses.push(ServerStatus {
                name: server.name().to_string(),
                running: server.is_running().await,
                tools: server.tools().len(),
                pending_requests: server.pending_requests(),
            });
        }
        statuses
    }

    /// Stop every server.
    pub async fn stop(self) {
        join_all(self.servers.into_iter().map(Server::stop)).await;
    }

    fn warn_shadowed_tools(&self) {
        let mut owners: Vec<(&str, &str)> = Vec::new();
        for server in &self.servers {
            for tool in server.tools() {
                match owners.iter().find(|(name, _)| *name == tool.name) {
                    Some((_, owner)) => warn!(
                        tool = %tool.name,
                        owner = %owner,
                        shadowed = %server.name(),
                        "duplicate tool name, keeping first server"
                    ),
                    None => owners.push((tool.name.as_str(), server.name())),
                }
            }
        }
    }
}

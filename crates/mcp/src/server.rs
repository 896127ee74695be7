//! MCP server management (spawn, handshake, lifecycle).

use std::collections::HashMap;
use std::process::Stdio;
use std::time::Duration;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::protocol::{CallToolParams, InitializeParams, InitializeResult, ListToolsResult, Tool};
use crate::rpc::RpcChannel;

/// Upper bound on the `initialize` + `tools/list` exchange.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(15);

/// How long `stop` waits for the process to exit after killing it.
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// After the server's stdio closes mid-handshake, how long to wait for it to
/// be reaped before treating it as still alive.
const EXIT_GRACE: Duration = Duration::from_secs(1);

/// Configuration for an MCP server.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub name: String,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
}

/// Handle to a running, initialized MCP server.
///
/// The tool list is fetched once during [`Server::start`] and never changes.
pub struct Server {
    config: ServerConfig,
    process: Mutex<Child>,
    channel: RpcChannel,
    diagnostics: JoinHandle<()>,
    server_info: InitializeResult,
    tools: Vec<Tool>,
}

impl Server {
    /// Spawn the server process and run the handshake.
    ///
    /// On handshake failure the process is killed and the error returned.
    pub async fn start(config: ServerConfig) -> Result<Self> {
        info!(server = %config.name, command = %config.command, "starting tool server");

        let mut process = Command::new(&config.command)
            .args(&config.args)
            .envs(&config.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(Error::Spawn)?;

        let stdin = process
            .stdin
            .take()
            .ok_or_else(|| Error::Spawn(std::io::Error::other("failed to capture stdin")))?;

        let stdout = process
            .stdout
            .take()
            .ok_or_else(|| Error::Spawn(std::io::Error::other("failed to capture stdout")))?;

        let stderr = process
            .stderr
            .take()
            .ok_or_else(|| Error::Spawn(std::io::Error::other("failed to capture stderr")))?;

        let channel = RpcChannel::new(config.name.clone(), stdin, stdout);
        let diagnostics = tokio::spawn(log_diagnostics(config.name.clone(), stderr));

        let handshake = timeout(HANDSHAKE_TIMEOUT, handshake(&channel))
            .await
            .unwrap_or(Err(Error::Timeout));

        let (server_info, tools) = match handshake {
            Ok(done) => done,
            Err(e) => return Err(abandon_start(&config.name, &mut process, e).await),
        };

        info!(server = %config.name, tools = tools.len(), "tool server ready");

        Ok(Self {
            config,
            process: Mutex::new(process),
            channel,
            diagnostics,
            server_info,
            tools,
        })
    }

    /// Get the server name.
    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Result of the `initialize` request.
    pub fn server_info(&self) -> &InitializeResult {
        &self.server_info
    }

    /// Tools discovered during the handshake.
    pub fn tools(&self) -> &[Tool] {
        &self.tools
    }

    pub fn exposes(&self, tool: &str) -> bool {
        self.tools.iter().any(|t| t.name == tool)
    }

    /// Requests still waiting on a reply.
    pub fn pending_requests(&self) -> usize {
        self.channel.pending()
    }

    /// Call a tool by name.
    ///
    /// Returns the raw `result` of the `tools/call` reply.
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: Option<Value>,
        cancel: &CancellationToken,
    ) -> Result<Value> {
        debug!(server = %self.config.name, tool = %name, "calling tool");

        let params = serde_json::to_value(CallToolParams {
            name: name.to_string(),
            arguments,
        })?;

        self.channel.request("tools/call", Some(params), cancel).await
    }

    /// Check if the server process is still running.
    pub async fn is_running(&self) -> bool {
        let mut process = self.process.lock().await;
        matches!(process.try_wait(), Ok(None))
    }

    /// Close stdin, kill the process and wait for it to exit.
    ///
    /// Every step is best effort; failures are logged, never returned.
    pub async fn stop(self) {
        let name = self.config.name;

        if let Err(e) = self.channel.close().await {
            debug!(server = %name, error = %e, "failed to close stdin");
        }

        let mut process = self.process.into_inner();
        if let Err(e) = process.start_kill() {
            debug!(server = %name, error = %e, "failed to signal process");
        }

        match timeout(SHUTDOWN_TIMEOUT, process.wait()).await {
            Ok(Ok(status)) => info!(server = %name, %status, "tool server stopped"),
            Ok(Err(e)) => warn!(server = %name, error = %e, "failed to reap tool server"),
            Err(_) => warn!(server = %name, "timed out waiting for tool server to exit"),
        }

        self.diagnostics.abort();
    }
}

/// Clean up after a failed handshake and pick the error to report.
///
/// A process that has already exited never started properly, so that is
/// reported as [`Error::Spawn`]. Anything else is killed and the handshake
/// error returned as is.
async fn abandon_start(name: &str, process: &mut Child, error: Error) -> Error {
    if matches!(error, Error::ServerExited | Error::Io(_)) {
        if let Ok(Ok(status)) = timeout(EXIT_GRACE, process.wait()).await {
            return Error::Spawn(std::io::Error::other(format!(
                "server exited during startup ({status})"
            )));
        }
    }

    if let Err(kill_err) = process.kill().await {
        debug!(server = %name, error = %kill_err, "kill after failed handshake");
    }
    error
}

async fn handshake(channel: &RpcChannel) -> Result<(InitializeResult, Vec<Tool>)> {
    let never = CancellationToken::new();

    let params = serde_json::to_value(InitializeParams::default())?;
    let info = channel.request("initialize", Some(params), &never).await?;
    let info: InitializeResult = decode("initialize", info)?;

    channel.notify("notifications/initialized", None).await?;

    let listing = channel.request("tools/list", Some(json!({})), &never).await?;
    let listing: ListToolsResult = decode("tools/list", listing)?;

    Ok((info, listing.tools))
}

fn decode<T: DeserializeOwned>(method: &str, value: Value) -> Result<T> {
    serde_json::from_value(value).map_err(|e| Error::InvalidResponse(format!("{method}: {e}")))
}

/// Forward a server's stderr to the log, one warning per line.
async fn log_diagnostics<R>(name: String, stream: R)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(stream);
    let mut line = Vec::new();

    loop {
        line.clear();
        match reader.read_until(b'\n', &mut line).await {
            Ok(0) => break,
            Ok(_) => {
                let text = String::from_utf8_lossy(&line);
                let text = text.trim_end();
                if !text.is_empty() {
                    warn!(server = %name, "{text}");
                }
            }
            Err(e) => {
                debug!(server = %name, error = %e, "stderr reader stopped");
                break;
            }
        }
    }
}

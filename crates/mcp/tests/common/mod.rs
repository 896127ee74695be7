//! Scripted tool servers for process-level tests.
//!
//! The fake server is a POSIX `sh` loop. It relies on requests being
//! serialized as `{"jsonrpc":"2.0","id":N,...}` with `id` in second place.

use std::collections::HashMap;

use mcp::ServerConfig;

const FAKE_SERVER: &str = r#"
while IFS= read -r line; do
  id=$(printf '%s\n' "$line" | sed -n 's/^{"jsonrpc":"2.0","id":\([0-9][0-9]*\),.*/\1/p')
  case "$line" in
    *'"method":"initialize"'*)
      printf '{"jsonrpc":"2.0","id":%s,"result":{"protocolVersion":"2024-11-05","capabilities":{"tools":{}},"serverInfo":{"name":"%s","version":"1.0"}}}\n' "$id" "$SERVER_LABEL"
      ;;
    *'"method":"tools/list"'*)
      printf '{"jsonrpc":"2.0","id":%s,"result":{"tools":[{"name":"%s","description":"Test tool","inputSchema":{"type":"object"}},{"name":"shared","description":"Exposed by every fake","inputSchema":{"type":"object"}}]}}\n' "$id" "$TOOL_NAME"
      ;;
    *'"method":"tools/call"'*'"name":"fail"'*)
      printf '{"jsonrpc":"2.0","id":%s,"error":{"code":-32000,"message":"tool failed"}}\n' "$id"
      ;;
    *'"method":"tools/call"'*)
      echo "handling call $id" >&2
      printf '{"jsonrpc":"2.0","id":%s,"result":{"content":[{"type":"text","text":"%s"}]}}\n' "$id" "$SERVER_LABEL"
      ;;
  esac
done
"#;

/// A server exposing `tool` and `shared`, answering calls with `label`.
pub fn fake_server(label: &str, tool: &str) -> ServerConfig {
    let mut env = HashMap::new();
    env.insert("SERVER_LABEL".to_string(), label.to_string());
    env.insert("TOOL_NAME".to_string(), tool.to_string());

    ServerConfig {
        name: label.to_string(),
        command: "sh".to_string(),
        args: vec!["-c".to_string(), FAKE_SERVER.to_string()],
        env,
    }
}

/// A server that exits before answering anything.
pub fn dead_server(label: &str) -> ServerConfig {
    ServerConfig {
        name: label.to_string(),
        command: "sh".to_string(),
        args: vec!["-c".to_string(), "echo 'no protocol here' >&2; exit 3".to_string()],
        env: HashMap::new(),
    }
}

/// A server whose binary does not exist.
pub fn missing_server(label: &str) -> ServerConfig {
    ServerConfig {
        name: label.to_string(),
        command: "/nonexistent/switchboard-tool-server".to_string(),
        args: Vec::new(),
        env: HashMap::new(),
    }
}

/// The text payload of a `tools/call` result from the fake server.
pub fn call_text(result: &serde_json::Value) -> &str {
    result["content"][0]["text"].as_str().unwrap_or_default()
}

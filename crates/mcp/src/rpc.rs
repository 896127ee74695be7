//! Request/response correlation over a line-delimited JSON-RPC stream.
//!
//! An [`RpcChannel`] owns the write half of a server's stdio and a background
//! task reading the other half. Each request gets a fresh numeric ID and a
//! one-shot reply slot in the [`PendingTable`]; the reader routes replies by
//! ID, so responses may arrive in any order.

use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{Mutex as AsyncMutex, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::protocol::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, RequestId};

/// Maximum size of a single inbound message (1MB).
/// Sized for large tool outputs (file reads, search results).
pub const MAX_OUTPUT_SIZE: usize = 1024 * 1024;

type Sink = Box<dyn AsyncWrite + Send + Unpin>;

/// What a waiting caller eventually receives.
type Reply = Result<JsonRpcResponse>;

#[derive(Debug, Default)]
struct Slots {
    waiting: HashMap<i64, oneshot::Sender<Reply>>,
    closed: bool,
}

/// Correlation ID → reply slot for one server.
///
/// Every operation holds the lock only for a map access, so whichever of
/// delivery and removal reaches an entry first wins and the other is a no-op.
#[derive(Debug, Default)]
pub struct PendingTable {
    slots: Mutex<Slots>,
}

impl PendingTable {
    fn slots(&self) -> MutexGuard<'_, Slots> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a reply slot for `id`.
    ///
    /// Fails once the reader has closed the table.
    pub fn register(&self, id: i64) -> Result<oneshot::Receiver<Reply>> {
        let mut slots = self.slots();
        if slots.closed {
            return Err(Error::ServerExited);
        }
        let (tx, rx) = oneshot::channel();
        slots.waiting.insert(id, tx);
        Ok(rx)
    }

    /// Hand a response to the caller waiting on `id`.
    ///
    /// Returns false when nobody is waiting anymore.
    pub fn deliver(&self, id: i64, response: JsonRpcResponse) -> bool {
        self.complete(id, Ok(response))
    }

    /// Fail the caller waiting on `id` without a response document.
    pub fn fail(&self, id: i64, error: Error) -> bool {
        self.complete(id, Err(error))
    }

    fn complete(&self, id: i64, reply: Reply) -> bool {
        let Some(tx) = self.slots().waiting.remove(&id) else {
            return false;
        };
        tx.send(reply).is_ok()
    }

    /// Drop the slot for `id`, if still present.
    pub fn remove(&self, id: i64) -> bool {
        self.slots().waiting.remove(&id).is_some()
    }

    /// Fail every waiter and refuse new registrations.
    ///
    /// Returns how many requests were still in flight.
    pub fn close(&self) -> usize {
        let mut slots = self.slots();
        slots.closed = true;
        let in_flight = slots.waiting.len();
        slots.waiting.clear();
        in_flight
    }

    pub fn len(&self) -> usize {
        self.slots().waiting.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Removes a pending entry when the awaiting request finishes or is dropped.
struct SlotGuard<'a> {
    table: &'a PendingTable,
    id: i64,
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        self.table.remove(self.id);
    }
}

/// A JSON-RPC connection to one server.
pub struct RpcChannel {
    name: String,
    sink: AsyncMutex<Option<Sink>>,
    next_id: AtomicI64,
    pending: Arc<PendingTable>,
    reader: JoinHandle<()>,
}

impl RpcChannel {
    /// Wrap a sink/source pair and start the response reader.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new<W, R>(name: impl Into<String>, sink: W, source: R) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
        R: AsyncRead + Send + Unpin + 'static,
    {
        let name = name.into();
        let pending = Arc::new(PendingTable::default());
        let reader = tokio::spawn(read_responses(name.clone(), source, Arc::clone(&pending)));

        Self {
            name,
            sink: AsyncMutex::new(Some(Box::new(sink))),
            next_id: AtomicI64::new(1),
            pending,
            reader,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of requests currently awaiting a reply.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Send a request and wait for its reply or for `cancel` to fire.
    ///
    /// Cancellation only abandons the local wait; the server is not told.
    pub async fn request(
        &self,
        method: &str,
        params: Option<Value>,
        cancel: &CancellationToken,
    ) -> Result<Value> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let reply = self.pending.register(id)?;
        let _slot = SlotGuard {
            table: &self.pending,
            id,
        };

        let request = JsonRpcRequest::new(id, method).with_params(params);
        let line = serde_json::to_string(&request)?;

        self.write_line(line, cancel).await?;
        debug!(server = %self.name, id, method, "sent request");

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(server = %self.name, id, method, "request cancelled");
                Err(Error::Cancelled)
            }
            reply = reply => match reply {
                Ok(Ok(response)) => Ok(response.into_result()?),
                Ok(Err(e)) => Err(e),
                Err(_) => Err(Error::ServerExited),
            },
        }
    }

    /// Send a notification; no reply is expected.
    pub async fn notify(&self, method: &str, params: Option<Value>) -> Result<()> {
        let notification = JsonRpcNotification::new(method, params);
        let line = serde_json::to_string(&notification)?;
        self.write_line(line, &CancellationToken::new()).await
    }

    /// Close the outbound stream. Later writes fail with [`Error::ServerExited`].
    pub async fn close(&self) -> Result<()> {
        let sink = self.sink.lock().await.take();
        if let Some(mut sink) = sink {
            sink.shutdown().await?;
        }
        Ok(())
    }

    /// Write one line, giving up when `cancel` fires.
    ///
    /// Waiting for the sink is abandoned freely. A line abandoned part-way
    /// would corrupt the stream, so the sink is dropped instead and the
    /// channel refuses further writes.
    async fn write_line(&self, line: String, cancel: &CancellationToken) -> Result<()> {
        let mut line = line.into_bytes();
        line.push(b'\n');

        let mut guard = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            guard = self.sink.lock() => guard,
        };

        let mut written = 0;
        while written < line.len() {
            let sink = guard.as_mut().ok_or(Error::ServerExited)?;
            let step = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                n = sink.write(&line[written..]) => Some(n?),
            };

            match step {
                Some(0) => return Err(io::Error::from(io::ErrorKind::WriteZero).into()),
                Some(n) => written += n,
                None => {
                    if written > 0 {
                        warn!(
                            server = %self.name,
                            written,
                            total = line.len(),
                            "write abandoned mid-line, closing stdin"
                        );
                        *guard = None;
                    }
                    return Err(Error::Cancelled);
                }
            }
        }

        let sink = guard.as_mut().ok_or(Error::ServerExited)?;
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Error::Cancelled),
            flushed = sink.flush() => Ok(flushed?),
        }
    }
}

impl Drop for RpcChannel {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

/// One inbound line as seen by the reader.
enum Frame {
    /// The line is in the buffer.
    Line,
    /// The line exceeded [`MAX_OUTPUT_SIZE`] and was not kept.
    Oversized { size: usize, id: Option<i64> },
    Eof,
}

/// Read the next newline-terminated line into `buf`.
///
/// At most [`MAX_OUTPUT_SIZE`] bytes are buffered. Past that the rest of the
/// line is only scanned for its top-level `id`, so the waiting caller can
/// still be told.
async fn read_frame<R>(reader: &mut R, buf: &mut Vec<u8>) -> io::Result<Frame>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    let mut size = 0;
    let mut scanner: Option<IdScanner> = None;

    loop {
        let (used, done) = {
            let available = reader.fill_buf().await?;
            if available.is_empty() {
                if size == 0 {
                    return Ok(Frame::Eof);
                }
                break;
            }

            let (chunk, done) = match available.iter().position(|&b| b == b'\n') {
                Some(i) => (&available[..i], true),
                None => (available, false),
            };
            size += chunk.len();

            match scanner.as_mut() {
                Some(scanner) => scanner.feed(chunk),
                None if size > MAX_OUTPUT_SIZE => {
                    let mut fresh = IdScanner::default();
                    fresh.feed(buf);
                    fresh.feed(chunk);
                    buf.clear();
                    scanner = Some(fresh);
                }
                None => buf.extend_from_slice(chunk),
            }

            (chunk.len() + usize::from(done), done)
        };

        reader.consume(used);
        if done {
            break;
        }
    }

    Ok(match scanner {
        Some(scanner) => Frame::Oversized {
            size,
            id: scanner.id(),
        },
        None => Frame::Line,
    })
}

/// Streaming search for the numeric `id` member of a top-level JSON object.
///
/// Tracks string and nesting state only; nothing else is validated.
#[derive(Debug, Default)]
struct IdScanner {
    depth: usize,
    in_string: bool,
    escaped: bool,
    /// First bytes of the current top-level string; three is enough to tell
    /// `id` from longer keys.
    key: Vec<u8>,
    /// The last top-level token was the string `"id"`.
    after_id_key: bool,
    digits: Option<Vec<u8>>,
    found: Option<i64>,
}

impl IdScanner {
    fn feed(&mut self, bytes: &[u8]) {
        for &b in bytes {
            if self.found.is_some() {
                return;
            }
            self.step(b);
        }
    }

    fn step(&mut self, b: u8) {
        if self.in_string {
            if self.escaped {
                self.escaped = false;
            } else if b == b'\\' {
                self.escaped = true;
            } else if b == b'"' {
                self.in_string = false;
                self.after_id_key = self.depth == 1 && self.key == b"id";
            } else if self.depth == 1 && self.key.len() < 3 {
                self.key.push(b);
            }
            return;
        }

        if let Some(digits) = self.digits.as_mut() {
            if b.is_ascii_digit() || (b == b'-' && digits.is_empty()) {
                digits.push(b);
                return;
            }
            if b.is_ascii_whitespace() && digits.is_empty() {
                return;
            }
            self.found = std::str::from_utf8(digits)
                .ok()
                .and_then(|s| s.parse().ok());
            self.digits = None;
            if self.found.is_some() {
                return;
            }
        }

        match b {
            b'"' => {
                self.in_string = true;
                self.key.clear();
            }
            b'{' | b'[' => {
                self.depth += 1;
                self.after_id_key = false;
            }
            b'}' | b']' => self.depth = self.depth.saturating_sub(1),
            b':' => {
                if self.depth == 1 && self.after_id_key {
                    self.digits = Some(Vec::new());
                }
                self.after_id_key = false;
            }
            b if b.is_ascii_whitespace() => {}
            _ => self.after_id_key = false,
        }
    }

    fn id(&self) -> Option<i64> {
        self.found
    }
}

async fn read_responses<R>(name: String, source: R, pending: Arc<PendingTable>)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(source);
    let mut line = Vec::new();

    loop {
        match read_frame(&mut reader, &mut line).await {
            Ok(Frame::Eof) => {
                debug!(server = %name, "stdout closed");
                break;
            }
            Ok(Frame::Line) => dispatch(&name, &pending, &line),
            Ok(Frame::Oversized { size, id }) => reject_oversized(&name, &pending, size, id),
            Err(e) => {
                warn!(server = %name, error = %e, "failed to read from server");
                break;
            }
        }
    }

    let in_flight = pending.close();
    if in_flight > 0 {
        warn!(server = %name, in_flight, "server stream ended with requests in flight");
    }
}

fn reject_oversized(name: &str, pending: &PendingTable, size: usize, id: Option<i64>) {
    warn!(
        server = %name,
        size,
        max = MAX_OUTPUT_SIZE,
        id = ?id,
        "dropping oversized message"
    );

    if let Some(id) = id {
        let error = Error::OutputTooLarge {
            size,
            max: MAX_OUTPUT_SIZE,
        };
        if !pending.fail(id, error) {
            debug!(server = %name, id, "no pending request for oversized response");
        }
    }
}

fn dispatch(name: &str, pending: &PendingTable, line: &[u8]) {
    let line = line.trim_ascii();
    if line.is_empty() {
        return;
    }

    let response: JsonRpcResponse = match serde_json::from_slice(line) {
        Ok(response) => response,
        Err(e) => {
            warn!(
                server = %name,
                error = %e,
                line = %String::from_utf8_lossy(line),
                "failed to parse JSON-RPC message"
            );
            return;
        }
    };

    if response.is_server_initiated() {
        debug!(server = %name, method = ?response.method, "ignoring server-initiated message");
        return;
    }

    let Some(id) = response.id.as_ref().and_then(RequestId::as_number) else {
        warn!(server = %name, id = ?response.id, "response without a usable id");
        return;
    };

    if !pending.deliver(id, response) {
        warn!(server = %name, id, "no pending request for response, discarding");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use tokio::io::{DuplexStream, Lines, ReadHalf, WriteHalf};

    /// The far end of a channel, playing the server.
    struct FakeServer {
        lines: Lines<BufReader<ReadHalf<DuplexStream>>>,
        writer: WriteHalf<DuplexStream>,
    }

    impl FakeServer {
        async fn next_message(&mut self) -> Value {
            let line = self.lines.next_line().await.unwrap().unwrap();
            serde_json::from_str(&line).unwrap()
        }

        async fn send_raw(&mut self, line: &str) {
            self.writer.write_all(line.as_bytes()).await.unwrap();
            self.writer.write_all(b"\n").await.unwrap();
            self.writer.flush().await.unwrap();
        }

        async fn reply(&mut self, id: &Value, result: Value) {
            let msg = json!({"jsonrpc": "2.0", "id": id, "result": result});
            self.send_raw(&msg.to_string()).await;
        }
    }

    fn connect() -> (Arc<RpcChannel>, FakeServer) {
        connect_with_capacity(64 * 1024)
    }

    fn connect_with_capacity(capacity: usize) -> (Arc<RpcChannel>, FakeServer) {
        let (client_io, server_io) = tokio::io::duplex(capacity);
        let (client_read, client_write) = tokio::io::split(client_io);
        let (server_read, server_write) = tokio::io::split(server_io);
        let channel = RpcChannel::new("fake", client_write, client_read);
        let server = FakeServer {
            lines: BufReader::new(server_read).lines(),
            writer: server_write,
        };
        (Arc::new(channel), server)
    }

    fn spawn_request(
        channel: &Arc<RpcChannel>,
        params: Value,
        token: &CancellationToken,
    ) -> JoinHandle<Result<Value>> {
        let channel = Arc::clone(channel);
        let token = token.clone();
        tokio::spawn(async move { channel.request("tools/call", Some(params), &token).await })
    }

    #[tokio::test]
    async fn replies_in_reverse_order_reach_their_callers() {
        let (channel, mut server) = connect();
        let token = CancellationToken::new();

        let calls: Vec<_> = (0..5)
            .map(|n| spawn_request(&channel, json!({"n": n}), &token))
            .collect();

        let mut requests = Vec::new();
        for _ in 0..5 {
            requests.push(server.next_message().await);
        }
        assert_eq!(channel.pending(), 5);

        for request in requests.iter().rev() {
            let n = request["params"]["n"].clone();
            server.reply(&request["id"], json!({"echo": n})).await;
        }

        for (n, call) in calls.into_iter().enumerate() {
            let result = call.await.unwrap().unwrap();
            assert_eq!(result["echo"], n);
        }
        assert_eq!(channel.pending(), 0);
    }

    #[tokio::test]
    async fn ids_are_unique_and_increasing() {
        let (channel, mut server) = connect();
        let token = CancellationToken::new();

        let first = spawn_request(&channel, json!({}), &token);
        let a = server.next_message().await;
        let second = spawn_request(&channel, json!({}), &token);
        let b = server.next_message().await;

        assert_eq!(a["jsonrpc"], "2.0");
        assert_eq!(a["method"], "tools/call");
        assert!(b["id"].as_i64().unwrap() > a["id"].as_i64().unwrap());

        server.reply(&a["id"], json!(1)).await;
        server.reply(&b["id"], json!(2)).await;
        assert_eq!(first.await.unwrap().unwrap(), json!(1));
        assert_eq!(second.await.unwrap().unwrap(), json!(2));
    }

    #[tokio::test]
    async fn cancelled_call_leaves_no_entry_and_late_reply_is_discarded() {
        let (channel, mut server) = connect();
        let token = CancellationToken::new();

        let call = spawn_request(&channel, json!({}), &token);
        let request = server.next_message().await;
        token.cancel();

        assert!(matches!(call.await.unwrap(), Err(Error::Cancelled)));
        assert_eq!(channel.pending(), 0);

        server.reply(&request["id"], json!("late")).await;

        let fresh = CancellationToken::new();
        let next = spawn_request(&channel, json!({}), &fresh);
        let next_request = server.next_message().await;
        assert_ne!(next_request["id"], request["id"]);
        server.reply(&next_request["id"], json!("fresh")).await;

        assert_eq!(next.await.unwrap().unwrap(), json!("fresh"));
        assert_eq!(channel.pending(), 0);
    }

    #[tokio::test]
    async fn already_cancelled_token_short_circuits() {
        let (channel, _server) = connect();
        let token = CancellationToken::new();
        token.cancel();

        let result = channel.request("tools/call", None, &token).await;
        assert!(matches!(result, Err(Error::Cancelled)));
        assert_eq!(channel.pending(), 0);
    }

    #[tokio::test]
    async fn json_rpc_errors_are_surfaced() {
        let (channel, mut server) = connect();
        let token = CancellationToken::new();

        let call = spawn_request(&channel, json!({}), &token);
        let request = server.next_message().await;
        let reply = json!({
            "jsonrpc": "2.0",
            "id": request["id"],
            "error": {"code": -32602, "message": "Invalid params"}
        });
        server.send_raw(&reply.to_string()).await;

        match call.await.unwrap() {
            Err(Error::JsonRpc(e)) => {
                assert_eq!(e.code, -32602);
                assert_eq!(e.message, "Invalid params");
            }
            other => panic!("expected JSON-RPC error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn reader_survives_garbage() {
        let (channel, mut server) = connect();
        let token = CancellationToken::new();

        let call = spawn_request(&channel, json!({}), &token);
        let request = server.next_message().await;

        server.send_raw("this is not json").await;
        server.send_raw("").await;
        server.send_raw(r#"{"jsonrpc":"2.0","id":"str","result":1}"#).await;
        server.send_raw(r#"{"jsonrpc":"2.0","id":9999,"result":1}"#).await;
        server
            .send_raw(r#"{"jsonrpc":"2.0","method":"notifications/message","params":{}}"#)
            .await;
        server.reply(&request["id"], json!({"ok": true})).await;

        assert_eq!(call.await.unwrap().unwrap(), json!({"ok": true}));
    }

    #[tokio::test]
    async fn server_exit_fails_waiters() {
        let (channel, mut server) = connect();
        let token = CancellationToken::new();

        let call = spawn_request(&channel, json!({}), &token);
        server.next_message().await;
        drop(server);

        assert!(matches!(call.await.unwrap(), Err(Error::ServerExited)));
        assert_eq!(channel.pending(), 0);

        let after = channel.request("tools/call", None, &token).await;
        assert!(matches!(after, Err(Error::ServerExited)));
    }

    #[tokio::test]
    async fn notifications_carry_no_id() {
        let (channel, mut server) = connect();

        channel
            .notify("notifications/initialized", None)
            .await
            .unwrap();

        let message = server.next_message().await;
        assert_eq!(message["method"], "notifications/initialized");
        assert!(message.get("id").is_none());
        assert_eq!(channel.pending(), 0);
    }

    #[tokio::test]
    async fn writes_fail_after_close() {
        let (channel, _server) = connect();
        channel.close().await.unwrap();

        let result = channel.notify("ping", None).await;
        assert!(matches!(result, Err(Error::ServerExited)));
    }

    #[tokio::test]
    async fn oversized_reply_fails_its_caller() {
        let (channel, mut server) = connect();
        let token = CancellationToken::new();

        let call = spawn_request(&channel, json!({}), &token);
        let request = server.next_message().await;

        let padding = "x".repeat(MAX_OUTPUT_SIZE + 10);
        let reply = format!(
            r#"{{"jsonrpc":"2.0","id":{},"result":"{padding}"}}"#,
            request["id"]
        );
        server.send_raw(&reply).await;

        let result = tokio::time::timeout(Duration::from_secs(5), call)
            .await
            .expect("caller was never told")
            .unwrap();
        match result {
            Err(Error::OutputTooLarge { size, max }) => {
                assert_eq!(max, MAX_OUTPUT_SIZE);
                assert_eq!(size, reply.len());
            }
            other => panic!("expected OutputTooLarge, got {other:?}"),
        }
        assert_eq!(channel.pending(), 0);
    }

    #[tokio::test]
    async fn oversized_reply_is_matched_by_trailing_top_level_id() {
        let (channel, mut server) = connect();
        let token = CancellationToken::new();

        let call = spawn_request(&channel, json!({}), &token);
        let request = server.next_message().await;

        // The nested "id" must not be mistaken for the envelope's.
        let padding = "y".repeat(MAX_OUTPUT_SIZE);
        let reply = format!(
            r#"{{"jsonrpc":"2.0","result":{{"id":999,"text":"{padding}"}},"id":{}}}"#,
            request["id"]
        );
        server.send_raw(&reply).await;

        let result = tokio::time::timeout(Duration::from_secs(5), call)
            .await
            .expect("caller was never told")
            .unwrap();
        assert!(matches!(result, Err(Error::OutputTooLarge { .. })));
    }

    #[tokio::test]
    async fn oversized_line_without_id_is_dropped() {
        let (channel, mut server) = connect();
        let token = CancellationToken::new();

        let call = spawn_request(&channel, json!({}), &token);
        let request = server.next_message().await;

        server.send_raw(&"z".repeat(MAX_OUTPUT_SIZE * 2)).await;
        server.reply(&request["id"], json!("fine")).await;

        assert_eq!(call.await.unwrap().unwrap(), json!("fine"));
    }

    #[tokio::test]
    async fn cancel_interrupts_a_blocked_write() {
        // The far end never reads, so the pipe fills after 64 bytes.
        let (channel, _server) = connect_with_capacity(64);
        let token = CancellationToken::new();

        let call = spawn_request(&channel, json!({"blob": "a".repeat(4096)}), &token);
        tokio::time::sleep(Duration::from_millis(100)).await;
        token.cancel();

        let result = tokio::time::timeout(Duration::from_secs(2), call)
            .await
            .expect("cancellation was ignored during the write")
            .unwrap();
        assert!(matches!(result, Err(Error::Cancelled)));
        assert_eq!(channel.pending(), 0);

        // Part of the line went out; the stream is unusable now.
        let after = channel.notify("ping", None).await;
        assert!(matches!(after, Err(Error::ServerExited)));
    }

    #[tokio::test]
    async fn cancel_while_waiting_for_the_sink() {
        let (channel, _server) = connect_with_capacity(64);
        let stuck = CancellationToken::new();
        let _blocked = spawn_request(&channel, json!({"blob": "a".repeat(4096)}), &stuck);
        tokio::time::sleep(Duration::from_millis(50)).await;

        let token = CancellationToken::new();
        let queued = spawn_request(&channel, json!({}), &token);
        tokio::time::sleep(Duration::from_millis(50)).await;
        token.cancel();

        let result = tokio::time::timeout(Duration::from_secs(2), queued)
            .await
            .expect("queued caller ignored cancellation")
            .unwrap();
        assert!(matches!(result, Err(Error::Cancelled)));
    }

    #[test]
    fn scanner_finds_top_level_id_only() {
        let find = |text: &str| {
            let mut scanner = IdScanner::default();
            scanner.feed(text.as_bytes());
            scanner.id()
        };

        assert_eq!(find(r#"{"jsonrpc":"2.0","id":42,"result":"#), Some(42));
        assert_eq!(find(r#"{"result":{"id":7,"a":[{"id":8}]}, "id" : 3}"#), Some(3));
        assert_eq!(find(r#"{"note":"\"id\":5","id":-2}"#), Some(-2));
        assert_eq!(find(r#"{"idx":1,"method":"id","id":"abc"}"#), None);
        assert_eq!(find(r#"{"result":"no envelope id"#), None);
    }

    #[test]
    fn failed_slot_reports_the_error() {
        let table = PendingTable::default();
        let mut rx = table.register(4).unwrap();
        assert!(table.fail(4, Error::Timeout));
        assert!(matches!(rx.try_recv(), Ok(Err(Error::Timeout))));
        assert!(!table.fail(4, Error::Timeout));
    }

    #[test]
    fn table_delivers_once() {
        let table = PendingTable::default();
        let mut rx = table.register(1).unwrap();
        let response: JsonRpcResponse =
            serde_json::from_str(r#"{"jsonrpc":"2.0","id":1,"result":true}"#).unwrap();

        assert!(table.deliver(1, response.clone()));
        assert!(!table.deliver(1, response));
        assert!(table.is_empty());
        assert!(rx.try_recv().is_ok());
    }

    #[test]
    fn closed_table_rejects_registrations() {
        let table = PendingTable::default();
        let _rx = table.register(1).unwrap();
        assert_eq!(table.close(), 1);
        assert!(matches!(table.register(2), Err(Error::ServerExited)));
    }
}

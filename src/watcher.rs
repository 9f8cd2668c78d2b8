//! Readiness detection on the dev server's output streams.

use std::borrow::Cow;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, OnceLock};

use regex::Regex;
use tokio::io::{AsyncRead, AsyncReadExt as _};
use tokio::sync::oneshot;

/// Text the dev server prints once it accepts connections.
pub const READY_TEXT: &str = "Ready on";

const READ_CHUNK_SIZE: usize = 4096;

#[allow(clippy::expect_used)]
fn ansi_regex() -> &'static Regex {
    static ANSI_RE: OnceLock<Regex> = OnceLock::new();
    ANSI_RE.get_or_init(|| {
        Regex::new(r"\x1B[\[(?);]{0,2}(;?\d)*.").expect("ANSI pattern is valid")
    })
}

/// Remove terminal escape sequences from `input`.
pub fn strip_ansi(input: &str) -> Cow<'_, str> {
    ansi_regex().replace_all(input, "")
}

/// Decides whether a line of (ANSI-stripped) output means the server is ready.
pub trait ReadinessPredicate: Send + Sync {
    fn is_ready(&self, line: &str) -> bool;
}

impl<F> ReadinessPredicate for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn is_ready(&self, line: &str) -> bool {
        self(line)
    }
}

/// Matches when the line contains a fixed substring.
#[derive(Debug, Clone)]
pub struct ContainsText(pub String);

impl ContainsText {
    pub fn ready_on() -> Self {
        Self(READY_TEXT.to_string())
    }
}

impl ReadinessPredicate for ContainsText {
    fn is_ready(&self, line: &str) -> bool {
        line.contains(self.0.as_str())
    }
}

/// Reassembles lines from arbitrarily split byte chunks.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    /// Append a chunk and return every line it completed, without the
    /// trailing `\n` or `\r\n`.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);

        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let mut line: Vec<u8> = self.pending.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            lines.push(String::from_utf8_lossy(&line).into_owned());
        }
        lines
    }

    /// The incomplete tail, up to the last complete UTF-8 character.
    pub fn pending_text(&self) -> &str {
        match std::str::from_utf8(&self.pending) {
            Ok(text) => text,
            Err(e) => std::str::from_utf8(&self.pending[..e.valid_up_to()]).unwrap_or_default(),
        }
    }

    /// Drain whatever is left once the stream has ended.
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.pending);
        Some(String::from_utf8_lossy(&rest).into_owned())
    }
}

/// How a start attempt was settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    Ready,
    /// Raw stderr text seen before readiness.
    Failed(String),
    /// Process exited before readiness, with its exit code if any.
    Exited(Option<i32>),
}

/// Single-shot result channel shared by the stream pumps. The first
/// resolution wins; later ones are dropped.
#[derive(Debug, Clone)]
pub struct ReadinessLatch {
    sender: Arc<Mutex<Option<oneshot::Sender<Readiness>>>>,
}

impl ReadinessLatch {
    pub fn new() -> (Self, oneshot::Receiver<Readiness>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                sender: Arc::new(Mutex::new(Some(tx))),
            },
            rx,
        )
    }

    /// Returns `true` if this call settled the latch.
    pub fn resolve(&self, outcome: Readiness) -> bool {
        let sender = self
            .sender
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        match sender {
            Some(tx) => {
                let _ = tx.send(outcome);
                true
            }
            None => false,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.sender
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_none()
    }
}

/// Bounded in-memory log of recent output lines.
#[derive(Debug, Clone)]
pub struct MessageBuffer {
    lines: Arc<Mutex<VecDeque<String>>>,
    capacity: usize,
}

impl MessageBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            lines: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&self, line: impl Into<String>) {
        let mut lines = self.lines.lock().unwrap_or_else(|e| e.into_inner());
        if lines.len() == self.capacity {
            lines.pop_front();
        }
        lines.push_back(line.into());
    }

    pub fn get(&self) -> Vec<String> {
        let lines = self.lines.lock().unwrap_or_else(|e| e.into_inner());
        lines.iter().cloned().collect()
    }

    pub fn clear(&self) {
        self.lines.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }
}

/// Shared state handed to both stream pumps of one start attempt.
#[derive(Clone)]
pub struct StreamContext {
    pub name: String,
    pub verbose: bool,
    pub messages: MessageBuffer,
    pub latch: ReadinessLatch,
}

impl StreamContext {
    fn record(&self, stream: &str, line: &str) {
        if self.verbose {
            log::info!("[{} {}] {}", self.name, stream, line);
        }
        self.messages.push(line);
    }

    fn record_stderr(&self, line: &str) {
        let line = strip_ansi(line);
        if line.trim().is_empty() {
            return;
        }
        if self.verbose {
            log::warn!("[{} stderr] {}", self.name, line);
        }
        self.messages.push(line.into_owned());
    }
}

/// Pump stdout until EOF, settling the latch with `Ready` on the first line
/// the predicate accepts.
pub async fn watch_stdout<R>(
    mut reader: R,
    predicate: Arc<dyn ReadinessPredicate>,
    ctx: StreamContext,
) where
    R: AsyncRead + Unpin,
{
    let mut buffer = LineBuffer::default();
    let mut chunk = [0u8; READ_CHUNK_SIZE];

    loop {
        let n = match reader.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                log::warn!("[{} stdout] read failed: {}", ctx.name, e);
                break;
            }
        };

        for line in buffer.push(&chunk[..n]) {
            let line = strip_ansi(&line);
            ctx.record("stdout", &line);
            if !ctx.latch.is_resolved() && predicate.is_ready(&line) {
                ctx.latch.resolve(Readiness::Ready);
            }
        }

        if !ctx.latch.is_resolved() {
            let tail = strip_ansi(buffer.pending_text());
            if !tail.is_empty() && predicate.is_ready(&tail) {
                ctx.latch.resolve(Readiness::Ready);
            }
        }
    }

    if let Some(rest) = buffer.finish() {
        let rest = strip_ansi(&rest);
        ctx.record("stdout", &rest);
        if predicate.is_ready(&rest) {
            ctx.latch.resolve(Readiness::Ready);
        }
    }
}

/// Pump stderr until EOF. Output before readiness settles the latch with
/// `Failed` carrying the raw chunk; anything later is only logged.
pub async fn watch_stderr<R>(mut reader: R, ctx: StreamContext)
where
    R: AsyncRead + Unpin,
{
    let mut buffer = LineBuffer::default();
    let mut chunk = [0u8; READ_CHUNK_SIZE];

    loop {
        let n = match reader.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                log::warn!("[{} stderr] read failed: {}", ctx.name, e);
                break;
            }
        };

        for line in buffer.push(&chunk[..n]) {
            ctx.record_stderr(&line);
        }

        if !ctx.latch.is_resolved() {
            let text = String::from_utf8_lossy(&chunk[..n]).into_owned();
            if ctx.latch.resolve(Readiness::Failed(text)) {
                log::debug!("[{} stderr] output before readiness", ctx.name);
            }
        }
    }

    if let Some(rest) = buffer.finish() {
        ctx.record_stderr(&rest);
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::AsyncWriteExt as _;

    use super::*;

    fn context(latch: ReadinessLatch) -> StreamContext {
        StreamContext {
            name: "wrangler".to_string(),
            verbose: false,
            messages: MessageBuffer::new(8),
            latch,
        }
    }

    #[test]
    fn strips_color_codes() {
        let colored = "\x1b[32m⎔\x1b[39m Ready on \x1b[1mhttp://localhost:8787\x1b[22m";
        assert_eq!(strip_ansi(colored), "⎔ Ready on http://localhost:8787");
    }

    #[test]
    fn strips_cursor_sequences() {
        assert_eq!(strip_ansi("\x1b[2K\x1b[1GReady on x"), "Ready on x");
        assert_eq!(strip_ansi("plain"), "plain");
    }

    #[test]
    fn line_buffer_joins_split_multibyte_and_escape() {
        let mut buffer = LineBuffer::default();
        let text = "\x1b[32m⎔ Ready on http://x\x1b[0m\n".as_bytes();
        // split inside the escape sequence and inside the 3-byte glyph
        assert!(buffer.push(&text[..3]).is_empty());
        assert!(buffer.push(&text[3..7]).is_empty());
        let lines = buffer.push(&text[7..]);

        assert_eq!(lines.len(), 1);
        assert_eq!(strip_ansi(&lines[0]), "⎔ Ready on http://x");
        assert!(buffer.finish().is_none());
    }

    #[test]
    fn pending_text_stops_before_partial_char() {
        let mut buffer = LineBuffer::default();
        let glyph = "⎔".as_bytes();
        buffer.push(b"Ready on ");
        buffer.push(&glyph[..1]);
        assert_eq!(buffer.pending_text(), "Ready on ");
    }

    #[test]
    fn crlf_is_trimmed() {
        let mut buffer = LineBuffer::default();
        assert_eq!(buffer.push(b"one\r\ntwo\n"), vec!["one", "two"]);
    }

    #[test]
    fn latch_settles_once() {
        let (latch, mut rx) = ReadinessLatch::new();
        assert!(latch.resolve(Readiness::Ready));
        assert!(!latch.resolve(Readiness::Failed("late".to_string())));
        assert!(latch.is_resolved());
        assert_eq!(rx.try_recv().unwrap(), Readiness::Ready);
    }

    #[test]
    fn message_buffer_is_bounded() {
        let messages = MessageBuffer::new(2);
        messages.push("a");
        messages.push("b");
        messages.push("c");
        assert_eq!(messages.get(), vec!["b", "c"]);
        messages.clear();
        assert!(messages.get().is_empty());
    }

    #[test]
    fn closure_predicate() {
        let predicate = |line: &str| line.starts_with("listening");
        assert!(predicate.is_ready("listening on 1"));
        assert!(!ContainsText::ready_on().is_ready("Listening..."));
    }

    #[tokio::test]
    async fn ready_fires_once_across_repeated_matches() {
        let (latch, rx) = ReadinessLatch::new();
        let ctx = context(latch);
        let messages = ctx.messages.clone();
        let (mut writer, reader) = tokio::io::duplex(64);

        let pump = tokio::spawn(watch_stdout(
            reader,
            Arc::new(ContainsText::ready_on()),
            ctx,
        ));
        writer.write_all(b"Ready on http://a\n").await.unwrap();
        writer.write_all(b"Ready on http://b\n").await.unwrap();
        drop(writer);
        pump.await.unwrap();

        assert_eq!(rx.await.unwrap(), Readiness::Ready);
        assert_eq!(messages.get(), vec!["Ready on http://a", "Ready on http://b"]);
    }

    #[tokio::test]
    async fn ready_without_trailing_newline() {
        let (latch, rx) = ReadinessLatch::new();
        let (mut writer, reader) = tokio::io::duplex(64);
        let pump = tokio::spawn(watch_stdout(
            reader,
            Arc::new(ContainsText::ready_on()),
            context(latch),
        ));

        writer
            .write_all(b"\x1b[32mReady on\x1b[0m http://localhost:8787")
            .await
            .unwrap();

        assert_eq!(rx.await.unwrap(), Readiness::Ready);
        drop(writer);
        pump.await.unwrap();
    }

    #[tokio::test]
    async fn stderr_before_ready_fails_with_raw_text() {
        let (latch, rx) = ReadinessLatch::new();
        let (mut writer, reader) = tokio::io::duplex(64);
        let pump = tokio::spawn(watch_stderr(reader, context(latch)));

        writer.write_all(b"Error: EADDRINUSE\n").await.unwrap();
        drop(writer);
        pump.await.unwrap();

        assert_eq!(
            rx.await.unwrap(),
            Readiness::Failed("Error: EADDRINUSE\n".to_string())
        );
    }

    #[tokio::test]
    async fn stderr_lines_split_across_reads_are_joined() {
        let (latch, _rx) = ReadinessLatch::new();
        latch.resolve(Readiness::Ready);
        let ctx = context(latch);
        let messages = ctx.messages.clone();
        let (mut writer, reader) = tokio::io::duplex(64);
        let pump = tokio::spawn(watch_stderr(reader, ctx));

        let text = "warn: ⎔ split\nlast".as_bytes();
        // cut inside the 3-byte glyph
        writer.write_all(&text[..7]).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        writer.write_all(&text[7..]).await.unwrap();
        drop(writer);
        pump.await.unwrap();

        assert_eq!(messages.get(), vec!["warn: ⎔ split", "last"]);
    }

    #[tokio::test]
    async fn stderr_after_ready_is_not_fatal() {
        let (latch, mut rx) = ReadinessLatch::new();
        latch.resolve(Readiness::Ready);
        let (mut writer, reader) = tokio::io::duplex(64);
        let pump = tokio::spawn(watch_stderr(reader, context(latch)));

        writer.write_all(b"warning: something\n").await.unwrap();
        drop(writer);
        pump.await.unwrap();

        assert_eq!(rx.try_recv().unwrap(), Readiness::Ready);
    }
}

//! Incremental decoder for `text/event-stream` bodies.
//!
//! Bytes arrive in arbitrary chunks. Complete events are cut at the first
//! blank line and their `data:` lines joined; everything else (comments,
//! `event:`, `id:`, `retry:`) is dropped because the comms stream only uses
//! the data field.

/// Buffers partial events between chunks.
#[derive(Debug, Default)]
pub struct SseDecoder {
    pending: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return the data payload of every event it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);

        let mut payloads = Vec::new();
        // Splitting on bytes is safe: 0x0A never occurs inside a multi-byte
        // UTF-8 sequence, so a block always holds whole characters.
        while let Some((end, sep_len)) = find_boundary(&self.pending) {
            let block: Vec<u8> = self.pending.drain(..end + sep_len).collect();
            if let Some(data) = parse_block(&String::from_utf8_lossy(&block[..end])) {
                payloads.push(data);
            }
        }
        payloads
    }

    /// Bytes held back waiting for the end of an event.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

fn find_boundary(buf: &[u8]) -> Option<(usize, usize)> {
    let lf = find(buf, b"\n\n").map(|pos| (pos, 2));
    let crlf = find(buf, b"\r\n\r\n").map(|pos| (pos, 4));
    match (lf, crlf) {
        (Some(a), Some(b)) => Some(if b.0 < a.0 { b } else { a }),
        (a, b) => a.or(b),
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

fn parse_block(block: &str) -> Option<String> {
    let mut data: Vec<&str> = Vec::new();
    for line in block.lines() {
        let line = line.trim_end_matches('\r');
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        if field == "data" {
            data.push(value);
        }
    }
    if data.is_empty() {
        None
    } else {
        Some(data.join("\n"))
    }
}

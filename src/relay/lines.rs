//! Line reassembly
//!
//! Upstream bodies arrive in arbitrary chunks. [`LineAssembler`] carries the
//! unterminated tail of each chunk over to the next one so that callers only
//! ever see whole lines. Bytes are held until a newline arrives, so a UTF-8
//! sequence split between two reads is decoded intact.

/// Carry-over buffer for newline-delimited streams
#[derive(Debug, Default)]
pub struct LineAssembler {
    pending: Vec<u8>,
    keep_blank: bool,
}

impl LineAssembler {
    /// Assembler for JSON Lines bodies; blank lines are skipped.
    pub fn new() -> Self {
        Self::default()
    }

    /// Assembler that yields blank lines as `""`, for framings (like SSE)
    /// where an empty line is significant.
    pub fn keeping_blank_lines() -> Self {
        Self {
            keep_blank: true,
            ..Self::default()
        }
    }

    /// Feed one chunk; returns every line it completes, in order.
    ///
    /// Line terminators (`\n`, and a `\r` before it) are stripped.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        let mut rest = chunk;

        while let Some(pos) = rest.iter().position(|&b| b == b'\n') {
            self.pending.extend_from_slice(&rest[..pos]);
            rest = &rest[pos + 1..];

            let raw = std::mem::take(&mut self.pending);
            if let Some(line) = self.decode_line(&raw) {
                lines.push(line);
            }
        }

        self.pending.extend_from_slice(rest);
        lines
    }

    /// Drain whatever is left once the upstream signals completion.
    pub fn finish(&mut self) -> Option<String> {
        let raw = std::mem::take(&mut self.pending);
        if raw.is_empty() {
            return None;
        }
        self.decode_line(&raw)
    }

    /// Bytes waiting for a newline
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    fn decode_line(&self, raw: &[u8]) -> Option<String> {
        let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
        if !self.keep_blank && raw.iter().all(|b| b.is_ascii_whitespace()) {
            return None;
        }
        Some(String::from_utf8_lossy(raw).into_owned())
    }
}

//! JSON-lines framing for values carried inside a box-stream.
//!
//! The codec preserves bytes, not message boundaries: one JSON value per
//! line puts the boundaries back.

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;

/// Serialize `value` as a single JSON line, newline included.
pub fn serialize<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let mut line = serde_json::to_vec(value).context("serializing JSON line")?;
    line.push(b'\n');
    Ok(line)
}

/// Reassembles JSON lines from arbitrarily split chunks.
#[derive(Debug, Default)]
pub struct LineParser {
    pending: Vec<u8>,
}

impl LineParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed decoded bytes, returning every value completed by them.
    ///
    /// Empty lines are skipped.
    pub fn push(&mut self, bytes: &[u8]) -> Result<Vec<Value>> {
        self.pending.extend_from_slice(bytes);

        let mut values = Vec::new();
        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            if let Some(value) = parse_line(&line[..pos])? {
                values.push(value);
            }
        }
        Ok(values)
    }

    /// Parse whatever is left after the stream ended without a final newline.
    pub fn finish(self) -> Result<Option<Value>> {
        parse_line(&self.pending)
    }

    /// Bytes waiting for a newline.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

fn parse_line(line: &[u8]) -> Result<Option<Value>> {
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    if line.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    let value = serde_json::from_slice(line)
        .with_context(|| format!("parsing JSON line: {}", String::from_utf8_lossy(line)))?;
    Ok(Some(value))
}

//! Newline framing for inbound bytes
//!
//! Envelopes travel one per line. A read may deliver part of a line or
//! several lines, so each connection keeps a [`LineBuffer`].

/// Longest line kept before it is flushed as-is
pub const MAX_LINE_LEN: usize = 64 * 1024;

/// Accumulates bytes and yields complete lines
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
    // Set after an oversized flush until that line's newline arrives.
    discarding: bool,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append bytes and return every complete, non-blank line
    ///
    /// A line that grows past `MAX_LINE_LEN` without a newline is returned
    /// once as it stands; the rest of it up to the next newline is dropped.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);

        let mut lines = Vec::new();
        if self.discarding {
            match self.pending.iter().position(|&b| b == b'\n') {
                Some(pos) => {
                    self.pending.drain(..=pos);
                    self.discarding = false;
                }
                None => {
                    self.pending.clear();
                    return lines;
                }
            }
        }

        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.pending.drain(..=pos).collect();
            push_line(&mut lines, &raw[..pos]);
        }

        if self.pending.len() > MAX_LINE_LEN {
            let raw = std::mem::take(&mut self.pending);
            push_line(&mut lines, &raw);
            self.discarding = true;
        }

        lines
    }

    /// Bytes waiting for a newline
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

fn push_line(lines: &mut Vec<String>, raw: &[u8]) {
    let text = String::from_utf8_lossy(raw);
    let text = text.trim_end_matches('\r');
    if !text.trim().is_empty() {
        lines.push(text.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_lines_are_held() {
        let mut buffer = LineBuffer::new();
        assert!(buffer.push(b"{\"type\":").is_empty());
        assert_eq!(buffer.pending_len(), 8);

        let lines = buffer.push(b"1}\n");
        assert_eq!(lines, vec!["{\"type\":1}"]);
        assert_eq!(buffer.pending_len(), 0);
    }

    #[test]
    fn test_several_lines_in_one_chunk() {
        let mut buffer = LineBuffer::new();
        let lines = buffer.push(b"a\r\n\nb\n  \nc");
        assert_eq!(lines, vec!["a", "b"]);
        assert_eq!(buffer.push(b"\n"), vec!["c"]);
    }

    #[test]
    fn test_oversized_line_is_flushed() {
        let mut buffer = LineBuffer::new();
        let blob = vec![b'x'; MAX_LINE_LEN + 1];
        let lines = buffer.push(&blob);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].len(), MAX_LINE_LEN + 1);
        assert_eq!(buffer.pending_len(), 0);
    }

    #[test]
    fn test_oversized_line_tail_is_dropped() {
        let mut buffer = LineBuffer::new();
        let blob = vec![b'x'; MAX_LINE_LEN + 1];
        assert_eq!(buffer.push(&blob).len(), 1);

        // Still the same line: no second frame for it.
        assert!(buffer.push(b"yyyy").is_empty());
        assert_eq!(buffer.pending_len(), 0);

        assert_eq!(buffer.push(b"zz
next
"), vec!["next"]);
        assert_eq!(buffer.push(b"after
"), vec!["after"]);
    }
}

//! Assembly of formatted event lines into one request body.
//!
//! The output is a JSON array of the lines, in input order:
//! ```json
//! [{"timestamp":1,"content":"a"},{"timestamp":2,"content":"b"}]
//! ```
//! When no line qualifies nothing is written at all, not even `[]`, so an
//! empty body means there is nothing to send.

use std::io;

/// Default cap on the UTF-8 size of a single event line (256 KiB).
pub const DEFAULT_EVENT_BODY_LIMIT_BYTES: usize = 256 * 1024;

/// Streams pre-rendered JSON lines into a size-bounded JSON array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchFormatter {
    event_body_limit_bytes: usize,
}

impl Default for BatchFormatter {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BODY_LIMIT_BYTES)
    }
}

impl BatchFormatter {
    /// Lines longer than `event_body_limit_bytes` (UTF-8) are left out of
    /// the batch.
    pub fn new(event_body_limit_bytes: usize) -> Self {
        Self {
            event_body_limit_bytes,
        }
    }

    pub fn event_body_limit_bytes(&self) -> usize {
        self.event_body_limit_bytes
    }

    /// Write the qualifying `lines` to `output` as a JSON array.
    ///
    /// Empty and whitespace-only lines are skipped, as are lines over the
    /// size limit; neither is reported. Each remaining line is written
    /// verbatim. The closing `]` is only written if at least one line was,
    /// so zero qualifying lines leave `output` untouched.
    ///
    /// **Errors**
    /// - only I/O errors from `output`.
    pub fn format<I, W>(&self, lines: I, output: &mut W) -> io::Result<()>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
        W: io::Write + ?Sized,
    {
        let mut any = false;

        for line in lines {
            let line = line.as_ref();
            if line.trim().is_empty() || line.len() > self.event_body_limit_bytes {
                continue;
            }

            output.write_all(if any { b"," } else { b"[" })?;
            output.write_all(line.as_bytes())?;
            any = true;
        }

        if any {
            output.write_all(b"]")?;
        }
        Ok(())
    }

    /// Collect the batch into a byte vector; empty if no line qualified.
    pub fn format_to_vec<I>(&self, lines: I) -> Vec<u8>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let mut body = Vec::new();
        // writes into a Vec cannot fail
        let _ = self.format(lines, &mut body);
        body
    }
}

//! Fixed-size chunking of a response body and progress event cadence.

use std::io::{self, Write};

/// Bytes per chunk written to the destination file.
pub const CHUNK_SIZE: usize = 8 * 1024;

/// A progress event is emitted after this many chunks, plus once at the end.
pub const CHUNKS_PER_EVENT: u64 = 10;

/// Snapshot of one download's progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressEvent {
    /// Size announced by the server, or 0 when it sent no `Content-Length`.
    pub total_bytes: u64,
    pub bytes_transferred: u64,
    /// Rounded percentage, or 0 when the total is unknown.
    pub percent_complete: u32,
}

impl ProgressEvent {
    pub fn new(total_bytes: Option<u64>, bytes_transferred: u64) -> Self {
        match total_bytes {
            Some(total) if total > 0 => Self {
                total_bytes: total,
                bytes_transferred,
                percent_complete: (bytes_transferred as f64 / total as f64 * 100.0).round() as u32,
            },
            Some(_) => Self {
                total_bytes: 0,
                bytes_transferred,
                // Zero-length body that is fully received.
                percent_complete: 100,
            },
            None => Self {
                total_bytes: 0,
                bytes_transferred,
                percent_complete: 0,
            },
        }
    }

    /// True when the server did not announce a size.
    pub fn is_indeterminate(&self) -> bool {
        self.total_bytes == 0 && self.percent_complete == 0
    }
}

/// Regroups arbitrary body slices into [`CHUNK_SIZE`] writes and reports progress.
pub(crate) struct ChunkedSink<W: Write> {
    out: W,
    buf: Vec<u8>,
    total: Option<u64>,
    written: u64,
    chunks: u64,
}

impl<W: Write> ChunkedSink<W> {
    pub(crate) fn new(out: W, total: Option<u64>) -> Self {
        Self {
            out,
            buf: Vec::with_capacity(CHUNK_SIZE),
            total,
            written: 0,
            chunks: 0,
        }
    }

    /// Accept body bytes, writing every full chunk through to the output.
    pub(crate) fn push(
        &mut self,
        mut data: &[u8],
        on_progress: &mut dyn FnMut(ProgressEvent),
    ) -> io::Result<()> {
        while !data.is_empty() {
            let take = (CHUNK_SIZE - self.buf.len()).min(data.len());
            self.buf.extend_from_slice(&data[..take]);
            data = &data[take..];
            if self.buf.len() == CHUNK_SIZE {
                self.write_chunk()?;
                if self.chunks % CHUNKS_PER_EVENT == 0 {
                    on_progress(ProgressEvent::new(self.total, self.written));
                }
            }
        }
        Ok(())
    }

    /// Flush the trailing partial chunk, emit the final event, return bytes written.
    pub(crate) fn finish(mut self, on_progress: &mut dyn FnMut(ProgressEvent)) -> io::Result<u64> {
        if !self.buf.is_empty() {
            self.write_chunk()?;
        }
        self.out.flush()?;
        on_progress(ProgressEvent::new(self.total, self.written));
        Ok(self.written)
    }

    fn write_chunk(&mut self) -> io::Result<()> {
        self.out.write_all(&self.buf)?;
        self.written += self.buf.len() as u64;
        self.chunks += 1;
        self.buf.clear();
        Ok(())
    }
}

//! Gzip body encoding for event streams
//!
//! A stream never ends on its own, so whole-body compression does not work.
//! Each frame is written into one long-lived gzip member and sync-flushed,
//! which lets the client inflate every frame as soon as it arrives.

use std::io::{self, Write};

use flate2::write::GzEncoder;
use flate2::Compression;

/// Gzip magic bytes at the start of every member
pub const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Incremental gzip compressor for a single response body
pub struct GzipFramer {
    encoder: GzEncoder<Vec<u8>>,
}

impl GzipFramer {
    /// Create a framer using fast compression
    pub fn new() -> Self {
        Self {
            encoder: GzEncoder::new(Vec::new(), Compression::fast()),
        }
    }

    /// Compress one frame and return every byte the client can decode so far
    ///
    /// The first call also returns the gzip header.
    pub fn compress(&mut self, frame: &[u8]) -> io::Result<Vec<u8>> {
        self.encoder.write_all(frame)?;
        self.encoder.flush()?;
        Ok(std::mem::take(self.encoder.get_mut()))
    }

    /// End the body, returning the final block and the gzip trailer
    pub fn finish(self) -> io::Result<Vec<u8>> {
        self.encoder.finish()
    }
}

impl Default for GzipFramer {
    fn default() -> Self {
        Self::new()
    }
}

/// Check if data starts with a gzip header
pub fn is_gzip(data: &[u8]) -> bool {
    data.starts_with(&GZIP_MAGIC)
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use flate2::read::GzDecoder;

    use super::*;

    #[test]
    fn test_first_chunk_has_header() {
        let mut framer = GzipFramer::new();
        let chunk = framer.compress(b"data: one\n\n").unwrap();

        assert!(is_gzip(&chunk));
        assert!(!is_gzip(b"data: one\n\n"));
    }

    #[test]
    fn test_frames_decode_before_finish() {
        let mut framer = GzipFramer::new();
        let mut body = framer.compress(b"data: one\n\n").unwrap();
        body.extend(framer.compress(b"data: two\n\n").unwrap());

        // No trailer yet, but both frames are already recoverable
        let mut decoded = [0u8; 22];
        GzDecoder::new(&body[..]).read_exact(&mut decoded).unwrap();
        assert_eq!(&decoded, b"data: one\n\ndata: two\n\n");
    }

    #[test]
    fn test_finished_body_round_trips() {
        let mut framer = GzipFramer::new();
        let mut body = framer.compress(b": ping\n").unwrap();
        body.extend(framer.finish().unwrap());

        let mut decoded = String::new();
        GzDecoder::new(&body[..]).read_to_string(&mut decoded).unwrap();
        assert_eq!(decoded, ": ping\n");
    }
}

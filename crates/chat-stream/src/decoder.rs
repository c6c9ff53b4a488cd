use std::pin::Pin;

use futures::StreamExt as _;
use futures::stream;
use tracing::debug;

use crate::errors::StreamError;
use crate::transport::ByteStream;

const FRAME_DELIMITER: &[u8] = b"\n\n";

/// Lazily decoded frames of one response body.
pub type FrameStream = Pin<Box<dyn futures::Stream<Item = Result<String, StreamError>> + Send>>;

/// Incremental splitter turning raw body chunks into event-stream frames.
///
/// Bytes after the last delimiter are carried over to the next chunk. Frames
/// are cut on the ASCII delimiter before any text decoding, so a multi-byte
/// character split across chunks is decoded only once it is whole.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: Vec<u8>,
    scan_from: usize,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a raw chunk to the carry-over buffer.
    pub fn extend(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Pops the next complete frame, or `None` when the buffer holds no
    /// delimiter. Whitespace-only frames are skipped.
    pub fn next_frame(&mut self) -> Option<String> {
        loop {
            let Some(idx) = find_delimiter(&self.buf, self.scan_from) else {
                // A delimiter may straddle the next chunk boundary.
                self.scan_from = self.buf.len().saturating_sub(FRAME_DELIMITER.len() - 1);
                return None;
            };
            let frame = String::from_utf8_lossy(&self.buf[..idx]).into_owned();
            self.buf.drain(..idx + FRAME_DELIMITER.len());
            self.scan_from = 0;
            if !frame.trim().is_empty() {
                return Some(frame);
            }
        }
    }

    /// Appends a chunk and returns every frame it completes.
    pub fn push_chunk(&mut self, chunk: &[u8]) -> Vec<String> {
        self.extend(chunk);
        std::iter::from_fn(|| self.next_frame()).collect()
    }

    /// Number of buffered bytes not yet part of a complete frame.
    pub fn pending_len(&self) -> usize {
        self.buf.len()
    }

    /// Ends the body: a trailing partial frame is discarded, never flushed.
    ///
    /// Returns the number of discarded bytes.
    pub fn finish(&mut self) -> usize {
        let discarded = self.buf.len();
        if discarded > 0 && !self.buf.iter().all(u8::is_ascii_whitespace) {
            debug!(bytes = discarded, "discarding incomplete trailing frame");
        }
        self.buf.clear();
        self.scan_from = 0;
        discarded
    }
}

fn find_delimiter(buf: &[u8], from: usize) -> Option<usize> {
    buf.get(from..)?
        .windows(FRAME_DELIMITER.len())
        .position(|window| window == FRAME_DELIMITER)
        .map(|pos| pos + from)
}

/// Adapts a body byte stream into a lazy stream of frames.
///
/// A new chunk is read only when no complete frame is buffered, so a consumer
/// that stops after a terminal event never examines the bytes behind it.
pub fn frame_stream(bytes: ByteStream) -> FrameStream {
    struct State {
        bytes: ByteStream,
        decoder: FrameDecoder,
        done: bool,
    }

    Box::pin(stream::try_unfold(
        State {
            bytes,
            decoder: FrameDecoder::new(),
            done: false,
        },
        |mut state| async move {
            loop {
                if let Some(frame) = state.decoder.next_frame() {
                    return Ok(Some((frame, state)));
                }
                if state.done {
                    return Ok(None);
                }
                match state.bytes.next().await {
                    Some(Ok(chunk)) => state.decoder.extend(&chunk),
                    Some(Err(err)) => return Err(err),
                    None => {
                        state.decoder.finish();
                        state.done = true;
                    }
                }
            }
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_in_chunks(body: &[u8], size: usize) -> Vec<String> {
        let mut decoder = FrameDecoder::new();
        let mut frames = Vec::new();
        for chunk in body.chunks(size) {
            frames.extend(decoder.push_chunk(chunk));
        }
        frames
    }

    #[test]
    fn chunk_without_delimiter_is_buffered() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder.push_chunk(b"data: {\"content\":\"Hel").is_empty());
        assert_eq!(decoder.pending_len(), 21);
        let frames = decoder.push_chunk(b"lo\"}\n\n");
        assert_eq!(frames, vec!["data: {\"content\":\"Hello\"}".to_string()]);
        assert_eq!(decoder.pending_len(), 0);
    }

    #[test]
    fn delimiter_split_across_chunks_is_one_boundary() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder.push_chunk(b"data: {\"content\":\"a\"}\n").is_empty());
        let frames = decoder.push_chunk(b"\ndata: {\"content\":\"b\"}\n\n");
        assert_eq!(
            frames,
            vec![
                "data: {\"content\":\"a\"}".to_string(),
                "data: {\"content\":\"b\"}".to_string(),
            ]
        );
    }

    #[test]
    fn frames_are_identical_for_every_chunk_size() {
        let body = "data: {\"content\":\"h\u{e9}llo \u{2713}\"}\n\n\
                    data: {\"content\":\" \u{1f980}\"}\n\n\
                    data: [DONE]\n\n"
            .as_bytes();
        let whole = decode_in_chunks(body, body.len());
        assert_eq!(whole.len(), 3);
        for size in 1..body.len() {
            assert_eq!(decode_in_chunks(body, size), whole, "chunk size {size}");
        }
    }

    #[test]
    fn blank_frames_are_skipped() {
        let mut decoder = FrameDecoder::new();
        let frames = decoder.push_chunk(b"\n\n\n\ndata: x\n\n  \n\n");
        assert_eq!(frames, vec!["data: x".to_string()]);
    }

    #[test]
    fn finish_discards_trailing_partial_frame() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder.push_chunk(b"data: {\"content\":\"cut").is_empty());
        assert_eq!(decoder.finish(), 21);
        assert_eq!(decoder.pending_len(), 0);
        assert!(decoder.next_frame().is_none());
    }

    #[tokio::test]
    async fn frame_stream_yields_frames_then_ends() {
        let chunks: Vec<Result<bytes::Bytes, StreamError>> = vec![
            Ok(bytes::Bytes::from_static(b"data: one\n\nda")),
            Ok(bytes::Bytes::from_static(b"ta: two\n\ndata: partial")),
        ];
        let frames: Vec<_> = frame_stream(Box::pin(stream::iter(chunks))).collect().await;
        assert_eq!(
            frames,
            vec![Ok("data: one".to_string()), Ok("data: two".to_string())]
        );
    }

    #[tokio::test]
    async fn frame_stream_surfaces_transport_errors() {
        let chunks: Vec<Result<bytes::Bytes, StreamError>> = vec![
            Ok(bytes::Bytes::from_static(b"data: one\n\n")),
            Err(StreamError::network("connection reset", None)),
        ];
        let mut frames = frame_stream(Box::pin(stream::iter(chunks)));
        assert_eq!(frames.next().await, Some(Ok("data: one".to_string())));
        assert!(matches!(
            frames.next().await,
            Some(Err(StreamError::Network { .. }))
        ));
    }
}

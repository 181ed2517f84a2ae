//! Length-prefixed frame codec for TCP transport
//!
//! Each frame is a 4-byte big-endian length followed by exactly that many
//! payload bytes. Border frames carry pixel bytes, three per pixel; token
//! frames carry a short literal.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::protocol::constants::{FRAME_HEADER_LEN, MAX_FRAME_SIZE};
use crate::protocol::BorderVector;
use crate::{Error, Result};

const READ_CHUNK: usize = 64 * 1024;

/// One encoded frame, header included
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    bytes: Vec<u8>,
}

impl Frame {
    /// Wrap a payload in a length header
    pub fn from_payload(payload: &[u8]) -> Result<Self> {
        if payload.len() > MAX_FRAME_SIZE {
            return Err(Error::Codec(format!(
                "frame too large: {} bytes (max {})",
                payload.len(),
                MAX_FRAME_SIZE
            )));
        }

        let mut bytes = Vec::with_capacity(FRAME_HEADER_LEN + payload.len());
        bytes.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        bytes.extend_from_slice(payload);
        Ok(Self { bytes })
    }

    pub fn payload(&self) -> &[u8] {
        &self.bytes[FRAME_HEADER_LEN..]
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn payload_len(&self) -> usize {
        self.bytes.len() - FRAME_HEADER_LEN
    }

    pub fn payload_is_empty(&self) -> bool {
        self.payload_len() == 0
    }
}

/// Serialize a border vector into a frame
pub fn encode(vector: &BorderVector) -> Result<Frame> {
    Frame::from_payload(&vector.to_bytes())
}

/// Parse a complete frame back into a border vector.
///
/// Fails if the declared length disagrees with the bytes present or the
/// payload is not a whole number of pixels.
pub fn decode(frame_bytes: &[u8]) -> Result<BorderVector> {
    if frame_bytes.len() < FRAME_HEADER_LEN {
        return Err(Error::Codec(format!(
            "frame of {} bytes is shorter than its header",
            frame_bytes.len()
        )));
    }

    let (header, payload) = frame_bytes.split_at(FRAME_HEADER_LEN);
    let declared = declared_len(header);
    if declared != payload.len() {
        return Err(Error::Codec(format!(
            "declared length {} but payload is {} bytes",
            declared,
            payload.len()
        )));
    }

    BorderVector::from_bytes(payload)
}

/// Write one frame and flush it
pub async fn write_frame<W: AsyncWrite + Unpin>(writer: &mut W, frame: &Frame) -> Result<()> {
    writer.write_all(frame.as_bytes()).await.map_err(stream_error)?;
    writer.flush().await.map_err(stream_error)?;
    Ok(())
}

/// A peer that went away mid-session surfaces as `StreamClosed`
fn stream_error(e: std::io::Error) -> Error {
    use std::io::ErrorKind::*;

    match e.kind() {
        BrokenPipe | ConnectionReset | ConnectionAborted | UnexpectedEof => Error::StreamClosed,
        _ => Error::Io(e),
    }
}

fn declared_len(header: &[u8]) -> usize {
    let mut len_buf = [0u8; FRAME_HEADER_LEN];
    len_buf.copy_from_slice(&header[..FRAME_HEADER_LEN]);
    u32::from_be_bytes(len_buf) as usize
}

/// Recovers whole frames from a byte stream.
///
/// Reads may split a frame anywhere or carry several frames at once; any
/// bytes past the current frame stay buffered for the next call.
pub struct FrameReader<R> {
    inner: R,
    buf: Vec<u8>,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buf: Vec::new(),
        }
    }

    /// Block until one full frame is available.
    ///
    /// Returns `StreamClosed` if the stream ends first, even mid-frame.
    pub async fn read_frame(&mut self) -> Result<Frame> {
        loop {
            if let Some(frame) = self.take_buffered()? {
                return Ok(frame);
            }

            self.buf.reserve(READ_CHUNK);
            let n = self.inner.read_buf(&mut self.buf).await.map_err(stream_error)?;
            if n == 0 {
                if !self.buf.is_empty() {
                    tracing::debug!("stream closed with {} unframed bytes buffered", self.buf.len());
                }
                return Err(Error::StreamClosed);
            }
        }
    }

    /// Bytes received but not yet returned as part of a frame
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    fn take_buffered(&mut self) -> Result<Option<Frame>> {
        if self.buf.len() < FRAME_HEADER_LEN {
            return Ok(None);
        }

        let len = declared_len(&self.buf);
        if len > MAX_FRAME_SIZE {
            return Err(Error::Codec(format!(
                "frame too large: {} bytes (max {})",
                len, MAX_FRAME_SIZE
            )));
        }

        let total = FRAME_HEADER_LEN + len;
        if self.buf.len() < total {
            return Ok(None);
        }

        // The read buffer keeps its capacity across frames.
        let bytes = self.buf[..total].to_vec();
        self.buf.drain(..total);
        Ok(Some(Frame { bytes }))
    }
}

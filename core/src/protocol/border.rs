//! Border column representation

use crate::protocol::constants::BYTES_PER_PIXEL;
use crate::{Error, Result};

/// One RGB pixel
pub type Pixel = [u8; 3];

/// One grid column adjacent to the partition boundary, top to bottom
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BorderVector(Vec<Pixel>);

impl BorderVector {
    pub fn new(pixels: Vec<Pixel>) -> Self {
        Self(pixels)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn pixels(&self) -> &[Pixel] {
        &self.0
    }

    pub fn into_pixels(self) -> Vec<Pixel> {
        self.0
    }

    /// Flatten to channel bytes, three per pixel
    pub fn to_bytes(&self) -> Vec<u8> {
        self.0.iter().flatten().copied().collect()
    }

    /// Rebuild from channel bytes. The length must be a multiple of 3.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() % BYTES_PER_PIXEL != 0 {
            return Err(Error::Codec(format!(
                "payload of {} bytes is not a whole number of pixels",
                bytes.len()
            )));
        }

        let pixels = bytes
            .chunks_exact(BYTES_PER_PIXEL)
            .map(|c| [c[0], c[1], c[2]])
            .collect();

        Ok(Self(pixels))
    }
}

impl From<Vec<Pixel>> for BorderVector {
    fn from(pixels: Vec<Pixel>) -> Self {
        Self(pixels)
    }
}

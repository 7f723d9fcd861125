//! Byte content synthesized for stream reads.

use bytes::Bytes;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Zeroed reads up to this size are served without allocating.
const ZERO_BLOCK_SIZE: usize = 64 * 1024;

static ZERO_BLOCK: [u8; ZERO_BLOCK_SIZE] = [0; ZERO_BLOCK_SIZE];

/// What bytes a synthetic stream produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ContentMode {
    /// Every byte is zero.
    #[default]
    Zeroed,
    /// Seeded ChaCha8 keystream indexed by absolute stream offset.
    Pseudorandom {
        /// Keystream seed
        seed: u64,
    },
}

/// Generator state for one stream.
#[derive(Debug, Clone)]
pub(crate) enum ContentSource {
    Zeroed,
    Pseudorandom(Box<ChaCha8Rng>),
}

impl ContentSource {
    pub(crate) fn new(mode: ContentMode) -> Self {
        match mode {
            ContentMode::Zeroed => ContentSource::Zeroed,
            ContentMode::Pseudorandom { seed } => {
                ContentSource::Pseudorandom(Box::new(ChaCha8Rng::seed_from_u64(seed)))
            }
        }
    }

    /// Fills `buf` with the content found at `offset..offset + buf.len()`.
    pub(crate) fn fill(&mut self, offset: u64, buf: &mut [u8]) {
        match self {
            ContentSource::Zeroed => buf.fill(0),
            ContentSource::Pseudorandom(rng) => {
                // Keystream words are 4 bytes
                rng.set_word_pos(u128::from(offset / 4));
                let skip = (offset % 4) as usize;
                if skip == 0 {
                    rng.fill_bytes(buf);
                    return;
                }

                let mut word = [0u8; 4];
                rng.fill_bytes(&mut word);
                let head = (4 - skip).min(buf.len());
                buf[..head].copy_from_slice(&word[skip..skip + head]);
                rng.fill_bytes(&mut buf[head..]);
            }
        }
    }

    /// Returns `len` bytes of content starting at `offset`.
    pub(crate) fn bytes(&mut self, offset: u64, len: usize) -> Bytes {
        if let ContentSource::Zeroed = self {
            if len <= ZERO_BLOCK_SIZE {
                return Bytes::from_static(&ZERO_BLOCK[..len]);
            }
            return Bytes::from(vec![0u8; len]);
        }

        let mut buf = vec![0u8; len];
        self.fill(offset, &mut buf);
        Bytes::from(buf)
    }
}

//! Shared identifier and audio types

use bytes::Bytes;
use std::fmt;

/// Guild (server) identifier — a Discord snowflake
pub type GuildId = u64;

/// Channel identifier — a Discord snowflake
pub type ChannelId = u64;

/// A finished synthesis result: an opaque, playable audio buffer.
///
/// Clips are cheap to clone (`Bytes` is reference counted) and carry no
/// format metadata — the transport's decoder probes the container itself.
#[derive(Clone, PartialEq)]
pub struct AudioClip {
    /// Encoded audio bytes
    pub data: Bytes,
}

impl AudioClip {
    /// Wrap raw audio bytes in a clip
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { data: data.into() }
    }

    /// Size in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if the clip holds no audio
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl fmt::Debug for AudioClip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioClip").field("len", &self.len()).finish()
    }
}

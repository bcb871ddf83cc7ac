//! Crier core runtime
//!
//! The bot's engine room: one voice session per guild, a serialized playback
//! queue per session, and an asynchronous synthesis pipeline feeding it.
//! The chat platform, the TTS engine and the profile database are
//! collaborators behind traits ([`VoiceGateway`]/[`VoiceConnection`],
//! [`Synthesizer`], [`ProfileStore`]) implemented by the adaptor, provider
//! and storage crates.

#![warn(clippy::all)]

pub mod commands;
pub mod config;
pub mod error;
pub mod manager;
pub mod pipeline;
pub mod preprocess;
pub mod profiles;
pub mod session;
pub mod types;
pub mod voices;

pub use config::CrierConfig;
pub use error::{CrierError, Result};
pub use manager::SessionManager;
pub use pipeline::{SynthesisPipeline, Synthesizer};
pub use profiles::{ProfileCache, ProfileStore, SpeakerIdentity, UserProfile};
pub use session::{PlaybackDone, SessionHandle, VoiceConnection, VoiceGateway};
pub use types::{AudioClip, ChannelId, GuildId};
pub use voices::VoiceLibrary;

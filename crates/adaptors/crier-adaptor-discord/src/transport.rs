//! Songbird-backed voice transport
//!
//! Implements the core's [`VoiceGateway`]/[`VoiceConnection`] seams over a
//! shared songbird instance. Track end and track error both fire the clip's
//! completion notifier; the notifier itself swallows the duplicate when a
//! track reports both.

use std::sync::Arc;

use async_trait::async_trait;
use crier_core::{
    AudioClip, ChannelId, CrierError, GuildId, PlaybackDone, Result, VoiceConnection, VoiceGateway,
};
use serenity::model::id::{ChannelId as DiscordChannelId, GuildId as DiscordGuildId};
use songbird::input::Input;
use songbird::{Call, Event, EventContext, EventHandler as SongbirdEventHandler, Songbird, TrackEvent};
use tokio::sync::Mutex;
use tracing::debug;

/// Connects guild sessions to voice channels through songbird.
pub struct SongbirdGateway {
    songbird: Arc<Songbird>,
}

impl SongbirdGateway {
    pub fn new(songbird: Arc<Songbird>) -> Self {
        Self { songbird }
    }
}

#[async_trait]
impl VoiceGateway for SongbirdGateway {
    async fn connect(&self, guild: GuildId, channel: ChannelId) -> Result<Arc<dyn VoiceConnection>> {
        let call = self
            .songbird
            .join(DiscordGuildId::new(guild), DiscordChannelId::new(channel))
            .await
            .map_err(|e| CrierError::gateway(format!("failed to join voice channel: {e}")))?;
        debug!(guild_id = %guild, channel_id = %channel, "voice transport connected");
        Ok(Arc::new(SongbirdConnection {
            guild,
            call,
            songbird: self.songbird.clone(),
        }))
    }
}

/// One live songbird call, owned by a guild session.
pub struct SongbirdConnection {
    guild: GuildId,
    call: Arc<Mutex<Call>>,
    songbird: Arc<Songbird>,
}

struct TrackDone {
    done: PlaybackDone,
}

#[async_trait]
impl SongbirdEventHandler for TrackDone {
    async fn act(&self, _ctx: &EventContext<'_>) -> Option<Event> {
        self.done.notify();
        None
    }
}

#[async_trait]
impl VoiceConnection for SongbirdConnection {
    async fn play(&self, clip: AudioClip, done: PlaybackDone) -> Result<()> {
        // songbird probes the container itself; clips are whatever the TTS
        // server produced (wav, usually)
        let input = Input::from(clip.data.to_vec());
        let track = self.call.lock().await.play_input(input);
        track
            .add_event(
                Event::Track(TrackEvent::End),
                TrackDone { done: done.clone() },
            )
            .map_err(|e| CrierError::playback(format!("could not watch for track end: {e}")))?;
        track
            .add_event(Event::Track(TrackEvent::Error), TrackDone { done })
            .map_err(|e| CrierError::playback(format!("could not watch for track errors: {e}")))?;
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.songbird
            .remove(DiscordGuildId::new(self.guild))
            .await
            .map_err(|e| CrierError::gateway(format!("failed to leave voice channel: {e}")))?;
        debug!(guild_id = %self.guild, "voice transport disconnected");
        Ok(())
    }
}

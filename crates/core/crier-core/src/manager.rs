//! Registry of active guild voice sessions

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::{CrierError, Result};
use crate::session::{self, SessionHandle, VoiceGateway};
use crate::types::{ChannelId, GuildId};

/// Owns every live guild session. A guild with no entry is not connected.
///
/// The registry lock is only held for map access — connecting, playing and
/// tearing down never block unrelated guilds.
pub struct SessionManager {
    gateway: Arc<dyn VoiceGateway>,
    sessions: RwLock<HashMap<GuildId, SessionHandle>>,
    queue_capacity: usize,
}

impl SessionManager {
    /// Create a manager that connects through `gateway` and bounds each
    /// guild's playback queue at `queue_capacity` clips.
    pub fn new(gateway: Arc<dyn VoiceGateway>, queue_capacity: usize) -> Self {
        Self {
            gateway,
            sessions: RwLock::new(HashMap::new()),
            queue_capacity,
        }
    }

    /// Join the requester's voice channel, replacing any existing session
    /// for the guild. Returns whether a previous session was torn down.
    ///
    /// The old transport is fully disconnected before the new one is
    /// established, so a guild never holds two live connections.
    pub async fn join(&self, guild: GuildId, voice_channel: Option<ChannelId>) -> Result<bool> {
        let channel = voice_channel.ok_or(CrierError::NotInVoiceChannel)?;

        let previous = self.sessions.write().await.remove(&guild);
        let replaced = previous.is_some();
        if let Some(prev) = previous {
            info!(guild_id = %guild, "dropping existing session before rejoining");
            let _ = prev.shutdown().await;
        }

        let transport = self.gateway.connect(guild, channel).await?;
        let handle = session::spawn_session(guild, transport, self.queue_capacity);
        if let Some(racer) = self.sessions.write().await.insert(guild, handle) {
            // A concurrent join for the same guild got registered first;
            // last one in wins, the other is torn down.
            let _ = racer.shutdown().await;
        }

        info!(guild_id = %guild, channel_id = %channel, replaced, "joined voice channel");
        Ok(replaced)
    }

    /// Disconnect and forget the guild's session.
    pub async fn leave(&self, guild: GuildId) -> Result<()> {
        let handle = self
            .sessions
            .write()
            .await
            .remove(&guild)
            .ok_or(CrierError::NoActiveSession(guild))?;
        let _ = handle.shutdown().await;
        info!(guild_id = %guild, "left voice channel");
        Ok(())
    }

    /// Look up the session for a guild, if any. Used by the speech path;
    /// `None` means messages for this guild are ignored.
    pub async fn handle_for(&self, guild: GuildId) -> Option<SessionHandle> {
        self.sessions.read().await.get(&guild).cloned()
    }

    /// Number of connected guilds
    pub async fn active_sessions(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Tear down every session. Called on process shutdown.
    pub async fn shutdown_all(&self) {
        let handles: Vec<_> = self.sessions.write().await.drain().collect();
        for (guild, handle) in handles {
            let _ = handle.shutdown().await;
            debug!(guild_id = %guild, "session shut down");
        }
    }
}

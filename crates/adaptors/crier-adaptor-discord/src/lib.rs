//! Discord gateway glue
//!
//! Routes chat events into the core: command text is parsed and executed
//! here, everything else goes to the synthesis pipeline when the guild has a
//! live voice session. Voice presence is tracked in our own
//! `(guild, user) → channel` map fed by gateway voice-state events, which is
//! more reliable than the cache.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crier_core::{
    commands::{self, Command},
    CrierConfig, CrierError, ProfileCache, ProfileStore, SessionManager, SynthesisPipeline,
    Synthesizer, VoiceLibrary,
};
use serenity::async_trait;
use serenity::builder::CreateMessage;
use serenity::model::channel::Message;
use serenity::model::gateway::{GatewayIntents, Ready};
use serenity::model::guild::Guild;
use serenity::model::voice::VoiceState;
use serenity::prelude::*;
use songbird::serenity::SerenityInit;
use songbird::Songbird;
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};

mod transport;
pub use transport::{SongbirdConnection, SongbirdGateway};

/// Voice presence tracker - maps (guild_id, user_id) -> channel_id
type VoiceStateMap = Arc<RwLock<HashMap<(u64, u64), u64>>>;

/// The running bot: the session registry plus the admin-quit signal.
pub struct CrierBot {
    pub sessions: Arc<SessionManager>,
    pub quit: Arc<Notify>,
}

struct Handler {
    config: Arc<CrierConfig>,
    sessions: Arc<SessionManager>,
    pipeline: Arc<SynthesisPipeline>,
    profiles: Arc<ProfileCache>,
    voices: VoiceLibrary,
    voice_states: VoiceStateMap,
    quit: Arc<Notify>,
}

impl Handler {
    /// Execute a command, returning the reply to send (if any).
    async fn run_command(
        &self,
        guild_id: u64,
        user_id: u64,
        username: &str,
        command: Command,
    ) -> Option<String> {
        match command {
            Command::Join => {
                let channel = {
                    let states = self.voice_states.read().unwrap();
                    states.get(&(guild_id, user_id)).copied()
                };
                match self.sessions.join(guild_id, channel).await {
                    Ok(true) => Some("Dropping existing connection... Joining voice channel...".into()),
                    Ok(false) => Some("Joining voice channel...".into()),
                    Err(CrierError::NotInVoiceChannel) => {
                        Some("You are not in a voice channel".into())
                    }
                    Err(e) => {
                        warn!(guild_id = %guild_id, error = %e, "join failed");
                        Some(format!("Could not join voice: {e}"))
                    }
                }
            }
            Command::Leave => match self.sessions.leave(guild_id).await {
                Ok(()) => Some("Leaving voice channel...".into()),
                Err(CrierError::NoActiveSession(_)) => Some("I am not in a voice channel".into()),
                Err(e) => {
                    warn!(guild_id = %guild_id, error = %e, "leave failed");
                    Some(format!("Could not leave voice: {e}"))
                }
            },
            Command::Help => Some(commands::help_text()),
            Command::Dice => Some(commands::roll_dice()),
            Command::Coin => Some(commands::flip_coin()),
            Command::EightBall => Some(commands::eight_ball()),
            Command::SetVoice(Some(voice)) => Some(self.register_voice(username, &voice).await),
            Command::SetVoice(None) => Some(self.voice_usage(username).await),
            Command::SetNickname(Some(nick)) => {
                match self.profiles.set_nickname(username, &nick).await {
                    Ok(()) => Some(format!("Registered nickname: {username} -> {nick}")),
                    Err(e) => {
                        warn!(username, error = %e, "nickname not persisted");
                        Some(format!(
                            "Registered nickname: {username} -> {nick} (not saved, it will reset on restart)"
                        ))
                    }
                }
            }
            Command::SetNickname(None) => Some("Invalid syntax. Please use !nick <nickname>".into()),
            Command::Quit => {
                if self.config.is_admin(username) {
                    info!(username, "shutdown requested");
                    self.quit.notify_one();
                    Some("Shutting down...".into())
                } else {
                    // silently ignored for everyone else
                    None
                }
            }
            Command::Unknown => None,
        }
    }

    async fn register_voice(&self, username: &str, voice: &str) -> String {
        if !self.voices.contains(voice) {
            return format!(
                "Voice {voice} not found. The following are valid voices: {}",
                self.voices.available().join(", ")
            );
        }
        match self.profiles.set_voice(username, voice).await {
            Ok(()) => format!("Registered voice: {username} -> {voice}"),
            Err(e) => {
                warn!(username, error = %e, "voice choice not persisted");
                format!(
                    "Registered voice: {username} -> {voice} (not saved, it will reset on restart)"
                )
            }
        }
    }

    async fn voice_usage(&self, username: &str) -> String {
        let mut reply = format!(
            "Invalid syntax. Please use !voice <voice>. The following are valid voices: {}",
            self.voices.available().join(", ")
        );
        if let Some(current) = self.profiles.voice_of(username).await {
            reply.push_str(&format!(".\n\nYour current voice is {current}."));
        }
        reply
    }

    /// Deliver a reply to the channel, or to the author's DMs for `?!`
    /// invocations.
    async fn deliver(&self, ctx: &Context, msg: &Message, private: bool, reply: String) {
        if private {
            if let Err(e) = msg
                .author
                .dm(&ctx.http, CreateMessage::new().content(reply))
                .await
            {
                warn!(username = %msg.author.name, error = %format!("{e:?}"), "failed to DM reply");
            }
        } else if let Err(e) = msg.channel_id.say(&ctx.http, reply).await {
            warn!(channel_id = %msg.channel_id.get(), error = %format!("{e:?}"), "failed to send reply");
        }
    }
}

#[async_trait]
impl EventHandler for Handler {
    async fn message(&self, ctx: Context, msg: Message) {
        if msg.author.bot {
            return;
        }
        // guild channels only; nothing to announce in DMs
        let Some(guild_id) = msg.guild_id.map(|g| g.get()) else {
            return;
        };

        match commands::parse(&msg.content) {
            Some(invocation) => {
                debug!(
                    guild_id = %guild_id,
                    username = %msg.author.name,
                    command = ?invocation.command,
                    "command received"
                );
                if let Some(reply) = self
                    .run_command(
                        guild_id,
                        msg.author.id.get(),
                        &msg.author.name,
                        invocation.command,
                    )
                    .await
                {
                    self.deliver(&ctx, &msg, invocation.private, reply).await;
                }
            }
            None => {
                // plain chatter: spoken only while connected in this guild
                if let Some(session) = self.sessions.handle_for(guild_id).await {
                    let _ = self
                        .pipeline
                        .request_speech(session, &msg.author.name, &msg.content);
                }
            }
        }
    }

    /// Seed the voice presence tracker with the states delivered alongside
    /// the guild payload.
    async fn guild_create(&self, _ctx: Context, guild: Guild, _is_new: Option<bool>) {
        let guild_id = guild.id.get();
        let mut states = self.voice_states.write().unwrap();
        for (user_id, voice_state) in guild.voice_states.iter() {
            if let Some(channel_id) = voice_state.channel_id {
                states.insert((guild_id, user_id.get()), channel_id.get());
            }
        }
        debug!(
            guild_id = %guild_id,
            tracked = states.len(),
            "voice states seeded from guild payload"
        );
    }

    async fn ready(&self, _ctx: Context, data_about_bot: Ready) {
        info!(
            user = %data_about_bot.user.name,
            guilds = data_about_bot.guilds.len(),
            "connected to Discord"
        );
    }

    async fn voice_state_update(&self, _ctx: Context, _old: Option<VoiceState>, new: VoiceState) {
        let Some(guild_id) = new.guild_id.map(|g| g.get()) else {
            return;
        };
        let user_id = new.user_id.get();
        let mut states = self.voice_states.write().unwrap();
        match new.channel_id {
            Some(channel_id) => {
                states.insert((guild_id, user_id), channel_id.get());
            }
            None => {
                states.remove(&(guild_id, user_id));
            }
        }
    }
}

/// Build the whole object graph and start the gateway client.
///
/// Returns once the client task is spawned; the caller owns shutdown through
/// [`CrierBot::sessions`] and reacts to [`CrierBot::quit`].
pub async fn start_discord(
    config: Arc<CrierConfig>,
    store: Arc<dyn ProfileStore>,
    engine: Arc<dyn Synthesizer>,
) -> crier_core::Result<CrierBot> {
    let songbird = Songbird::serenity();
    let gateway = Arc::new(SongbirdGateway::new(songbird.clone()));
    let sessions = Arc::new(SessionManager::new(gateway, config.queue_capacity));
    let profiles = Arc::new(ProfileCache::new(store));
    let voices = VoiceLibrary::new(&config.voices_dir, &config.default_voice);
    let pipeline = Arc::new(SynthesisPipeline::new(
        engine,
        profiles.clone(),
        voices.clone(),
        &config.language,
        config.synthesis_timeout,
    ));
    let quit = Arc::new(Notify::new());

    let handler = Handler {
        config: config.clone(),
        sessions: sessions.clone(),
        pipeline,
        profiles,
        voices,
        voice_states: Arc::new(RwLock::new(HashMap::new())),
        quit: quit.clone(),
    };

    let intents = GatewayIntents::GUILDS
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT
        | GatewayIntents::GUILD_VOICE_STATES;

    let mut client = Client::builder(&config.discord_token, intents)
        .event_handler(handler)
        .register_songbird_with(songbird)
        .await
        .map_err(|e| CrierError::gateway(format!("failed to build Discord client: {e}")))?;

    tokio::spawn(async move {
        if let Err(e) = client.start().await {
            error!(error = %format!("{e:?}"), "Discord client error");
        }
    });

    Ok(CrierBot { sessions, quit })
}

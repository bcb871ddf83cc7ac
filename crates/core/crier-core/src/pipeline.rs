//! Asynchronous text-to-speech pipeline
//!
//! Turns "speak this for user X" requests into clips delivered to the
//! guild's session, without ever blocking the event-handling path. Each
//! request runs as its own task; a request whose session disappears while
//! synthesis is in flight simply finds nobody to deliver to.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::Result;
use crate::preprocess;
use crate::profiles::ProfileCache;
use crate::session::SessionHandle;
use crate::types::AudioClip;
use crate::voices::VoiceLibrary;

/// Text-to-speech inference engine.
#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// Render `text` as audio in the voice of `voice_sample`.
    async fn synthesize(&self, text: &str, voice_sample: &Path, language: &str) -> Result<AudioClip>;
}

/// Fans speech requests out to the synthesizer and feeds results back into
/// the owning session's queue.
pub struct SynthesisPipeline {
    synthesizer: Arc<dyn Synthesizer>,
    profiles: Arc<ProfileCache>,
    voices: VoiceLibrary,
    language: String,
    timeout: Duration,
}

impl SynthesisPipeline {
    /// Build a pipeline. `timeout` bounds every synthesis call; an engine
    /// that hangs costs one task, never a stuck queue.
    pub fn new(
        synthesizer: Arc<dyn Synthesizer>,
        profiles: Arc<ProfileCache>,
        voices: VoiceLibrary,
        language: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            synthesizer,
            profiles,
            voices,
            language: language.into(),
            timeout,
        }
    }

    /// Start synthesizing `text` on behalf of `username` and deliver the
    /// result to `session` when done. Returns immediately.
    ///
    /// Failures and timeouts drop the request with a warning; a session
    /// torn down mid-synthesis drops the result silently.
    pub fn request_speech(
        &self,
        session: SessionHandle,
        username: &str,
        text: &str,
    ) -> JoinHandle<()> {
        let synthesizer = self.synthesizer.clone();
        let profiles = self.profiles.clone();
        let voices = self.voices.clone();
        let language = self.language.clone();
        let timeout = self.timeout;
        let username = username.to_string();
        let text = text.to_string();

        tokio::spawn(async move {
            let speaker = profiles.resolve(&username).await;
            let line = preprocess::spoken_line(&speaker.display_name, &text);
            let sample = voices.sample_path(speaker.voice_sample.as_deref());

            match tokio::time::timeout(timeout, synthesizer.synthesize(&line, &sample, &language))
                .await
            {
                Err(_) => warn!(
                    guild_id = %session.guild_id(),
                    username = %username,
                    timeout_secs = timeout.as_secs(),
                    "speech synthesis timed out, dropping request"
                ),
                Ok(Err(e)) => warn!(
                    guild_id = %session.guild_id(),
                    username = %username,
                    error = %e,
                    "speech synthesis failed, dropping request"
                ),
                Ok(Ok(clip)) => {
                    if !session.enqueue(clip) {
                        debug!(
                            guild_id = %session.guild_id(),
                            "session closed while synthesis was in flight, discarding clip"
                        );
                    }
                }
            }
        })
    }
}

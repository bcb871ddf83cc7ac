//! Coqui-style TTS engine client
//!
//! Crier speaks through a locally hosted voice-cloning TTS server (XTTS via
//! `tts-server`, or anything with the same surface): POST the text, a
//! reference speaker sample and a language code, get audio bytes back. The
//! server holds the model; this client only does HTTP.
//!
//! ## Quick Setup
//!
//! ```bash
//! pip install TTS
//! tts-server --model_name tts_models/multilingual/multi-dataset/xtts_v2 --port 5002
//! ```

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, warn};

use crier_core::{AudioClip, CrierError, Result, Synthesizer};

/// Request body for the `/api/tts` endpoint
#[derive(Debug, Serialize)]
struct TtsRequest<'a> {
    text: &'a str,
    speaker_wav: &'a str,
    language: &'a str,
}

/// HTTP client for a Coqui-style TTS server.
///
/// The reference sample is passed as a path; server and bot share the voice
/// library directory.
pub struct CoquiEngine {
    /// HTTP client (reused for connection pooling)
    client: Client,
    /// TTS server endpoint
    endpoint: String,
}

impl CoquiEngine {
    /// Create an engine talking to `endpoint`. `timeout` caps each HTTP
    /// call; the pipeline enforces its own deadline on top.
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(2)
            .build()?;
        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
        })
    }

    /// The configured server endpoint
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Verify the TTS server is reachable.
    pub async fn health_check(&self) -> bool {
        // tts-server has no dedicated health route; any response will do
        let probes = [format!("{}/", self.endpoint), format!("{}/health", self.endpoint)];
        for url in &probes {
            if let Ok(resp) = self.client.get(url).send().await {
                if resp.status().is_success() || resp.status().as_u16() == 404 {
                    return true;
                }
            }
        }
        false
    }

    async fn request(&self, body: &TtsRequest<'_>) -> Result<Bytes> {
        let resp = self
            .client
            .post(format!("{}/api/tts", self.endpoint))
            .json(body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let detail = resp.text().await.unwrap_or_default();
            return Err(CrierError::synthesis(format!(
                "TTS server returned {status}: {}",
                detail.trim()
            )));
        }
        Ok(resp.bytes().await?)
    }
}

#[async_trait]
impl Synthesizer for CoquiEngine {
    async fn synthesize(&self, text: &str, voice_sample: &Path, language: &str) -> Result<AudioClip> {
        let sample = voice_sample.to_str().ok_or_else(|| {
            CrierError::synthesis(format!(
                "voice sample path is not valid UTF-8: {}",
                voice_sample.display()
            ))
        })?;

        let body = TtsRequest {
            text,
            speaker_wav: sample,
            language,
        };
        let audio = self.request(&body).await?;
        if audio.is_empty() {
            warn!(endpoint = %self.endpoint, "TTS server returned an empty body");
            return Err(CrierError::synthesis("TTS server returned no audio"));
        }
        debug!(
            text_len = text.len(),
            audio_bytes = audio.len(),
            speaker = %sample,
            "synthesized speech"
        );
        Ok(AudioClip::new(audio))
    }
}

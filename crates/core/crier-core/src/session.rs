//! Per-guild voice session worker
//!
//! Each connected guild gets exactly one session: a spawned task that owns
//! the voice transport and the playback queue, and consumes an event channel.
//! All queue transitions for a guild happen on that task, so they are
//! serialized without any locking; different guilds run fully in parallel.
//!
//! Playback completion arrives as an explicit [`SessionEvent::PlaybackFinished`]
//! posted by the transport through a [`PlaybackDone`] notifier, never as a
//! callback closure.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn};

use crate::error::Result;
use crate::types::{AudioClip, ChannelId, GuildId};

/// A live connection to one voice channel.
///
/// Owned exclusively by the session worker that created it; no other
/// component may drive playback on it.
#[async_trait]
pub trait VoiceConnection: Send + Sync {
    /// Begin playback of a clip.
    ///
    /// Returns once playback has started. Completion — normal end of the
    /// clip or a mid-clip failure alike — must be reported exactly once
    /// through `done`.
    async fn play(&self, clip: AudioClip, done: PlaybackDone) -> Result<()>;

    /// Tear the connection down.
    async fn disconnect(&self) -> Result<()>;
}

/// Establishes voice connections on behalf of the session manager.
#[async_trait]
pub trait VoiceGateway: Send + Sync {
    /// Connect to a voice channel in a guild.
    async fn connect(&self, guild: GuildId, channel: ChannelId) -> Result<Arc<dyn VoiceConnection>>;
}

pub(crate) enum SessionEvent {
    ClipReady(AudioClip),
    PlaybackFinished,
    Shutdown(oneshot::Sender<()>),
}

/// Fire-once notifier handed to [`VoiceConnection::play`].
///
/// Transports call [`notify`](Self::notify) when the clip ends or errors;
/// repeated calls (e.g. an error event followed by an end event) are
/// swallowed so the queue never advances twice for one clip.
#[derive(Clone)]
pub struct PlaybackDone {
    tx: mpsc::UnboundedSender<SessionEvent>,
    fired: Arc<AtomicBool>,
}

impl PlaybackDone {
    pub(crate) fn new(tx: mpsc::UnboundedSender<SessionEvent>) -> Self {
        Self {
            tx,
            fired: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Report that playback of the clip has finished (or failed).
    pub fn notify(&self) {
        if !self.fired.swap(true, Ordering::SeqCst) {
            let _ = self.tx.send(SessionEvent::PlaybackFinished);
        }
    }
}

/// Bounded FIFO of clips awaiting playback in one guild.
pub(crate) struct PlaybackQueue {
    clips: VecDeque<AudioClip>,
    capacity: usize,
}

impl PlaybackQueue {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            clips: VecDeque::new(),
            capacity,
        }
    }

    /// Append a clip at the tail. Returns false when the queue is full;
    /// already-queued clips are never evicted.
    pub(crate) fn push(&mut self, clip: AudioClip) -> bool {
        if self.clips.len() >= self.capacity {
            return false;
        }
        self.clips.push_back(clip);
        true
    }

    pub(crate) fn pop(&mut self) -> Option<AudioClip> {
        self.clips.pop_front()
    }

    pub(crate) fn len(&self) -> usize {
        self.clips.len()
    }
}

/// Cloneable handle to a session worker.
///
/// A handle outliving its session is harmless: deliveries to a closed
/// session report failure instead of enqueueing into a stale queue, which is
/// how in-flight synthesis results for a torn-down session get discarded.
#[derive(Clone)]
pub struct SessionHandle {
    guild_id: GuildId,
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl SessionHandle {
    /// Guild this session belongs to
    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    /// Deliver a synthesized clip to the session.
    ///
    /// Returns false when the session has been torn down; the caller should
    /// drop the clip.
    pub fn enqueue(&self, clip: AudioClip) -> bool {
        self.tx.send(SessionEvent::ClipReady(clip)).is_ok()
    }

    /// Whether the session worker is still running
    pub fn is_open(&self) -> bool {
        !self.tx.is_closed()
    }

    /// Ask the worker to disconnect and exit; the returned receiver resolves
    /// once the transport is down.
    pub(crate) fn shutdown(&self) -> oneshot::Receiver<()> {
        let (ack, rx) = oneshot::channel();
        let _ = self.tx.send(SessionEvent::Shutdown(ack));
        rx
    }
}

pub(crate) fn spawn_session(
    guild_id: GuildId,
    transport: Arc<dyn VoiceConnection>,
    queue_capacity: usize,
) -> SessionHandle {
    let (tx, rx) = mpsc::unbounded_channel();
    let handle = SessionHandle {
        guild_id,
        tx: tx.clone(),
    };
    let worker = SessionWorker {
        guild_id,
        transport,
        queue: PlaybackQueue::new(queue_capacity),
        playing: false,
        tx,
    };
    tokio::spawn(worker.run(rx));
    handle
}

struct SessionWorker {
    guild_id: GuildId,
    transport: Arc<dyn VoiceConnection>,
    queue: PlaybackQueue,
    playing: bool,
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl SessionWorker {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<SessionEvent>) {
        let mut shutdown_ack = None;
        loop {
            match rx.recv().await {
                Some(SessionEvent::ClipReady(clip)) => {
                    if self.playing {
                        if !self.queue.push(clip) {
                            warn!(
                                guild_id = %self.guild_id,
                                queued = self.queue.len(),
                                "playback queue full, dropping clip"
                            );
                        }
                    } else {
                        // Idle: play straight away, bypassing the queue.
                        self.start_playback(clip).await;
                    }
                }
                Some(SessionEvent::PlaybackFinished) => match self.queue.pop() {
                    Some(next) => self.start_playback(next).await,
                    None => self.playing = false,
                },
                Some(SessionEvent::Shutdown(ack)) => {
                    shutdown_ack = Some(ack);
                    break;
                }
                None => break,
            }
        }
        // Close the channel before acknowledging: anything a late synthesis
        // tries to deliver from here on sees a dead session.
        drop(rx);
        if let Err(e) = self.transport.disconnect().await {
            warn!(guild_id = %self.guild_id, error = %e, "error disconnecting voice transport");
        }
        info!(
            guild_id = %self.guild_id,
            dropped = self.queue.len(),
            "voice session closed"
        );
        if let Some(ack) = shutdown_ack {
            let _ = ack.send(());
        }
    }

    /// Start playing `clip`, falling through to queued clips when a start
    /// attempt fails. A failed clip is skipped, never retried.
    async fn start_playback(&mut self, clip: AudioClip) {
        let mut next = clip;
        loop {
            let done = PlaybackDone::new(self.tx.clone());
            match self.transport.play(next, done).await {
                Ok(()) => {
                    self.playing = true;
                    return;
                }
                Err(e) => {
                    warn!(guild_id = %self.guild_id, error = %e, "failed to start playback, skipping clip");
                    match self.queue.pop() {
                        Some(clip) => next = clip,
                        None => {
                            self.playing = false;
                            return;
                        }
                    }
                }
            }
        }
    }
}

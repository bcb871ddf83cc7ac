//! End-to-end tests for the session/playback engine against trait doubles

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use crier_core::{
    AudioClip, ChannelId, CrierError, GuildId, PlaybackDone, ProfileCache, ProfileStore, Result,
    SessionManager, SynthesisPipeline, Synthesizer, UserProfile, VoiceConnection, VoiceGateway,
    VoiceLibrary,
};

const GUILD: GuildId = 7;
const CHANNEL: ChannelId = 70;

fn clip(tag: &str) -> AudioClip {
    AudioClip::new(tag.as_bytes().to_vec())
}

/// Records play attempts and hands completion control to the test.
#[derive(Default)]
struct FakeConnection {
    played: Mutex<Vec<Vec<u8>>>,
    pending: Mutex<Vec<PlaybackDone>>,
    attempts: AtomicUsize,
    fail_next: AtomicUsize,
    disconnected: AtomicBool,
}

impl FakeConnection {
    fn played(&self) -> Vec<Vec<u8>> {
        self.played.lock().unwrap().clone()
    }

    fn play_count(&self) -> usize {
        self.played.lock().unwrap().len()
    }

    /// Signal completion of the oldest started clip.
    fn finish_oldest(&self) -> PlaybackDone {
        let done = self.pending.lock().unwrap().remove(0);
        done.notify();
        done
    }
}

#[async_trait]
impl VoiceConnection for FakeConnection {
    async fn play(&self, clip: AudioClip, done: PlaybackDone) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail_next.load(Ordering::SeqCst) > 0 {
            self.fail_next.fetch_sub(1, Ordering::SeqCst);
            return Err(CrierError::playback("injected start failure"));
        }
        self.played.lock().unwrap().push(clip.data.to_vec());
        self.pending.lock().unwrap().push(done);
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.disconnected.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Default)]
struct FakeGateway {
    connections: Mutex<Vec<Arc<FakeConnection>>>,
}

impl FakeGateway {
    fn connection(&self, index: usize) -> Arc<FakeConnection> {
        self.connections.lock().unwrap()[index].clone()
    }

    fn connection_count(&self) -> usize {
        self.connections.lock().unwrap().len()
    }
}

#[async_trait]
impl VoiceGateway for FakeGateway {
    async fn connect(
        &self,
        _guild: GuildId,
        _channel: ChannelId,
    ) -> Result<Arc<dyn VoiceConnection>> {
        let connection = Arc::new(FakeConnection::default());
        self.connections.lock().unwrap().push(connection.clone());
        Ok(connection)
    }
}

/// Poll until `condition` holds; the session worker runs on its own task so
/// observable state changes are asynchronous.
async fn wait_until(condition: impl Fn() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached within a second");
}

/// Give the worker a moment, then confirm nothing changed.
async fn settled(condition: impl Fn() -> bool) -> bool {
    tokio::time::sleep(Duration::from_millis(50)).await;
    condition()
}

fn setup(queue_capacity: usize) -> (SessionManager, Arc<FakeGateway>) {
    let gateway = Arc::new(FakeGateway::default());
    let manager = SessionManager::new(gateway.clone(), queue_capacity);
    (manager, gateway)
}

#[tokio::test]
async fn join_requires_voice_presence() {
    let (manager, gateway) = setup(16);
    let err = manager.join(GUILD, None).await.unwrap_err();
    assert!(matches!(err, CrierError::NotInVoiceChannel));
    assert_eq!(gateway.connection_count(), 0);
    assert!(manager.handle_for(GUILD).await.is_none());
}

#[tokio::test]
async fn rejoin_tears_down_previous_transport() {
    let (manager, gateway) = setup(16);
    assert!(!manager.join(GUILD, Some(CHANNEL)).await.unwrap());
    assert!(manager.join(GUILD, Some(CHANNEL + 1)).await.unwrap());

    assert_eq!(gateway.connection_count(), 2);
    assert!(gateway.connection(0).disconnected.load(Ordering::SeqCst));
    assert!(!gateway.connection(1).disconnected.load(Ordering::SeqCst));
    assert_eq!(manager.active_sessions().await, 1);
}

#[tokio::test]
async fn leave_requires_active_session() {
    let (manager, _gateway) = setup(16);
    let err = manager.leave(GUILD).await.unwrap_err();
    assert!(matches!(err, CrierError::NoActiveSession(g) if g == GUILD));
}

#[tokio::test]
async fn leave_disconnects_and_forgets_the_session() {
    let (manager, gateway) = setup(16);
    manager.join(GUILD, Some(CHANNEL)).await.unwrap();
    manager.leave(GUILD).await.unwrap();

    assert!(gateway.connection(0).disconnected.load(Ordering::SeqCst));
    assert!(manager.handle_for(GUILD).await.is_none());
}

#[tokio::test]
async fn idle_bypass_then_fifo_drain() {
    let (manager, gateway) = setup(16);
    manager.join(GUILD, Some(CHANNEL)).await.unwrap();
    let session = manager.handle_for(GUILD).await.unwrap();
    let connection = gateway.connection(0);

    // idle: the first clip starts immediately, bypassing the queue
    assert!(session.enqueue(clip("hello")));
    wait_until(|| connection.play_count() == 1).await;

    // playing: further completions append to the tail, in arrival order
    assert!(session.enqueue(clip("c1")));
    assert!(session.enqueue(clip("c2")));
    assert!(session.enqueue(clip("c3")));
    assert!(settled(|| connection.play_count() == 1).await);

    connection.finish_oldest();
    wait_until(|| connection.play_count() == 2).await;
    connection.finish_oldest();
    wait_until(|| connection.play_count() == 3).await;
    connection.finish_oldest();
    wait_until(|| connection.play_count() == 4).await;
    assert_eq!(
        connection.played(),
        vec![
            b"hello".to_vec(),
            b"c1".to_vec(),
            b"c2".to_vec(),
            b"c3".to_vec()
        ]
    );

    // queue drained: finishing the last clip returns the session to idle,
    // so the next clip again jumps straight to the transport
    connection.finish_oldest();
    assert!(settled(|| connection.play_count() == 4).await);
    assert!(session.enqueue(clip("again")));
    wait_until(|| connection.play_count() == 5).await;
}

#[tokio::test]
async fn full_queue_drops_incoming_clip() {
    let (manager, gateway) = setup(2);
    manager.join(GUILD, Some(CHANNEL)).await.unwrap();
    let session = manager.handle_for(GUILD).await.unwrap();
    let connection = gateway.connection(0);

    session.enqueue(clip("playing"));
    wait_until(|| connection.play_count() == 1).await;
    session.enqueue(clip("q1"));
    session.enqueue(clip("q2"));
    session.enqueue(clip("overflow"));

    connection.finish_oldest();
    wait_until(|| connection.play_count() == 2).await;
    connection.finish_oldest();
    wait_until(|| connection.play_count() == 3).await;
    connection.finish_oldest();
    assert!(settled(|| connection.play_count() == 3).await);
    assert_eq!(
        connection.played(),
        vec![b"playing".to_vec(), b"q1".to_vec(), b"q2".to_vec()]
    );
}

#[tokio::test]
async fn playback_start_failure_skips_to_next_clip() {
    let (manager, gateway) = setup(16);
    manager.join(GUILD, Some(CHANNEL)).await.unwrap();
    let session = manager.handle_for(GUILD).await.unwrap();
    let connection = gateway.connection(0);

    session.enqueue(clip("first"));
    wait_until(|| connection.play_count() == 1).await;
    session.enqueue(clip("doomed"));
    session.enqueue(clip("survivor"));

    connection.fail_next.store(1, Ordering::SeqCst);
    connection.finish_oldest();
    wait_until(|| connection.play_count() == 2).await;

    assert_eq!(connection.attempts.load(Ordering::SeqCst), 3);
    assert_eq!(
        connection.played(),
        vec![b"first".to_vec(), b"survivor".to_vec()]
    );
}

#[tokio::test]
async fn torn_down_session_rejects_late_clips() {
    let (manager, gateway) = setup(16);
    manager.join(GUILD, Some(CHANNEL)).await.unwrap();
    let session = manager.handle_for(GUILD).await.unwrap();
    manager.leave(GUILD).await.unwrap();

    assert!(!session.is_open());
    assert!(!session.enqueue(clip("too late")));
    assert_eq!(gateway.connection(0).play_count(), 0);
}

#[tokio::test]
async fn completions_after_teardown_are_ignored() {
    let (manager, gateway) = setup(16);
    manager.join(GUILD, Some(CHANNEL)).await.unwrap();
    let session = manager.handle_for(GUILD).await.unwrap();
    let connection = gateway.connection(0);

    session.enqueue(clip("playing"));
    wait_until(|| connection.play_count() == 1).await;
    session.enqueue(clip("queued-a"));
    session.enqueue(clip("queued-b"));

    manager.leave(GUILD).await.unwrap();
    assert!(connection.disconnected.load(Ordering::SeqCst));

    // the transport's completion signal arrives after teardown; nothing
    // must advance and nothing must panic
    let done = connection.finish_oldest();
    done.notify();
    assert!(settled(|| connection.play_count() == 1).await);
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

enum SynthMode {
    Echo,
    Fail,
    Hang,
    Slow(Duration),
}

struct FakeSynthesizer {
    mode: SynthMode,
    requests: Mutex<Vec<(String, PathBuf, String)>>,
}

impl FakeSynthesizer {
    fn new(mode: SynthMode) -> Arc<Self> {
        Arc::new(Self {
            mode,
            requests: Mutex::new(Vec::new()),
        })
    }

    fn last_request(&self) -> (String, PathBuf, String) {
        self.requests.lock().unwrap().last().cloned().unwrap()
    }
}

#[async_trait]
impl Synthesizer for FakeSynthesizer {
    async fn synthesize(
        &self,
        text: &str,
        voice_sample: &Path,
        language: &str,
    ) -> Result<AudioClip> {
        self.requests.lock().unwrap().push((
            text.to_string(),
            voice_sample.to_path_buf(),
            language.to_string(),
        ));
        match self.mode {
            SynthMode::Echo => Ok(clip(text)),
            SynthMode::Fail => Err(CrierError::synthesis("injected engine failure")),
            SynthMode::Hang => std::future::pending().await,
            SynthMode::Slow(delay) => {
                tokio::time::sleep(delay).await;
                Ok(clip(text))
            }
        }
    }
}

struct FakeStore {
    profile: Option<UserProfile>,
}

#[async_trait]
impl ProfileStore for FakeStore {
    async fn fetch(&self, _username: &str) -> Result<Option<UserProfile>> {
        Ok(self.profile.clone())
    }

    async fn store_nickname(&self, _username: &str, _nickname: &str) -> Result<()> {
        Ok(())
    }

    async fn store_voice(&self, _username: &str, _voice: &str) -> Result<()> {
        Ok(())
    }
}

fn pipeline_with(
    synthesizer: Arc<FakeSynthesizer>,
    profile: Option<UserProfile>,
    timeout: Duration,
) -> SynthesisPipeline {
    let profiles = Arc::new(ProfileCache::new(Arc::new(FakeStore { profile })));
    let voices = VoiceLibrary::new("voices", "narrator.wav");
    SynthesisPipeline::new(synthesizer, profiles, voices, "en", timeout)
}

#[tokio::test]
async fn pipeline_speaks_with_resolved_profile() {
    let (manager, gateway) = setup(16);
    manager.join(GUILD, Some(CHANNEL)).await.unwrap();
    let session = manager.handle_for(GUILD).await.unwrap();
    let connection = gateway.connection(0);

    let synthesizer = FakeSynthesizer::new(SynthMode::Echo);
    let pipeline = pipeline_with(
        synthesizer.clone(),
        Some(UserProfile {
            username: "highwind".into(),
            nickname: Some("Kain".into()),
            voice_sample: Some("kain.wav".into()),
        }),
        Duration::from_secs(5),
    );

    pipeline
        .request_speech(session, "highwind", "hello <@123> world")
        .await
        .unwrap();
    wait_until(|| connection.play_count() == 1).await;

    let (text, sample, language) = synthesizer.last_request();
    assert_eq!(text, "Kain says hello  world");
    assert_eq!(sample, Path::new("voices").join("kain.wav"));
    assert_eq!(language, "en");
    assert_eq!(connection.played(), vec![text.into_bytes()]);
}

#[tokio::test]
async fn pipeline_falls_back_to_username_and_default_voice() {
    let (manager, gateway) = setup(16);
    manager.join(GUILD, Some(CHANNEL)).await.unwrap();
    let session = manager.handle_for(GUILD).await.unwrap();

    let synthesizer = FakeSynthesizer::new(SynthMode::Echo);
    let pipeline = pipeline_with(synthesizer.clone(), None, Duration::from_secs(5));

    pipeline.request_speech(session, "alice", "hi").await.unwrap();
    wait_until(|| gateway.connection(0).play_count() == 1).await;

    let (text, sample, _) = synthesizer.last_request();
    assert_eq!(text, "alice says hi");
    assert_eq!(sample, Path::new("voices").join("narrator.wav"));
}

#[tokio::test]
async fn pipeline_replaces_links_before_synthesis() {
    let (manager, gateway) = setup(16);
    manager.join(GUILD, Some(CHANNEL)).await.unwrap();
    let session = manager.handle_for(GUILD).await.unwrap();

    let synthesizer = FakeSynthesizer::new(SynthMode::Echo);
    let pipeline = pipeline_with(synthesizer.clone(), None, Duration::from_secs(5));

    pipeline
        .request_speech(session, "alice", "look https://example.com/cat")
        .await
        .unwrap();
    wait_until(|| gateway.connection(0).play_count() == 1).await;

    let (text, _, _) = synthesizer.last_request();
    assert_eq!(text, "alice sent a link");
}

#[tokio::test]
async fn failed_synthesis_is_dropped_without_stalling_the_queue() {
    let (manager, gateway) = setup(16);
    manager.join(GUILD, Some(CHANNEL)).await.unwrap();
    let session = manager.handle_for(GUILD).await.unwrap();
    let connection = gateway.connection(0);

    let failing = FakeSynthesizer::new(SynthMode::Fail);
    let pipeline = pipeline_with(failing, None, Duration::from_secs(5));
    pipeline
        .request_speech(session.clone(), "alice", "doomed")
        .await
        .unwrap();
    assert!(settled(|| connection.play_count() == 0).await);

    // a later request on the same session still plays
    let working = FakeSynthesizer::new(SynthMode::Echo);
    let pipeline = pipeline_with(working, None, Duration::from_secs(5));
    pipeline.request_speech(session, "alice", "fine").await.unwrap();
    wait_until(|| connection.play_count() == 1).await;
}

#[tokio::test]
async fn hung_synthesis_times_out_and_is_dropped() {
    let (manager, gateway) = setup(16);
    manager.join(GUILD, Some(CHANNEL)).await.unwrap();
    let session = manager.handle_for(GUILD).await.unwrap();

    let synthesizer = FakeSynthesizer::new(SynthMode::Hang);
    let pipeline = pipeline_with(synthesizer, None, Duration::from_millis(50));

    // the request task itself must finish despite the engine never returning
    pipeline
        .request_speech(session, "alice", "stuck")
        .await
        .unwrap();
    assert_eq!(gateway.connection(0).play_count(), 0);
}

#[tokio::test]
async fn synthesis_finishing_after_leave_is_discarded() {
    let (manager, gateway) = setup(16);
    manager.join(GUILD, Some(CHANNEL)).await.unwrap();
    let session = manager.handle_for(GUILD).await.unwrap();

    let synthesizer = FakeSynthesizer::new(SynthMode::Slow(Duration::from_millis(100)));
    let pipeline = pipeline_with(synthesizer, None, Duration::from_secs(5));

    let request = pipeline.request_speech(session, "alice", "late");
    manager.leave(GUILD).await.unwrap();
    request.await.unwrap();

    let connection = gateway.connection(0);
    assert!(connection.disconnected.load(Ordering::SeqCst));
    assert_eq!(connection.play_count(), 0);
}

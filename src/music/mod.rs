//! Per-guild music queues on top of songbird.

pub mod player;
pub mod search;

pub use player::{Advance, EnqueueAction, GuildPlayer, PlayerState, QueuedTrack};
pub use search::{resolve, ResolvedTrack};

use poise::serenity_prelude::{async_trait, ChannelId, GuildId};
use songbird::error::JoinError;
use songbird::events::{Event, EventContext, EventHandler as VoiceEventHandler, TrackEvent};
use songbird::input::{Input, YoutubeDl};
use songbird::tracks::{ControlError, Track, TrackHandle};
use songbird::{Call, Songbird};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum MusicError {
    #[error("could not join the voice channel: {0}")]
    Join(#[from] JoinError),
    #[error("could not control the current track: {0}")]
    Control(#[from] ControlError),
    #[error("volume must be between 0 and 100, got {0}")]
    VolumeOutOfRange(i64),
    #[error("the queue was emptied before playback started")]
    NothingQueued,
}

/// Result of a `play`/`queue` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayOutcome {
    Started(QueuedTrack),
    Queued { position: usize },
    Resumed,
}

#[derive(Default)]
struct GuildSession {
    player: GuildPlayer,
    current: Option<TrackHandle>,
}

pub struct MusicManager {
    http: reqwest::Client,
    sessions: Mutex<HashMap<GuildId, GuildSession>>,
}

fn volume_ratio(volume: u8) -> f32 {
    f32::from(volume) / 100.0
}

impl MusicManager {
    pub fn new(http: reqwest::Client) -> Arc<Self> {
        Arc::new(Self {
            http,
            sessions: Mutex::new(HashMap::new()),
        })
    }

    pub async fn resolve(&self, query: &str) -> Option<ResolvedTrack> {
        search::resolve(self.http.clone(), query).await
    }

    pub async fn enqueue(
        self: &Arc<Self>,
        songbird: &Arc<Songbird>,
        guild_id: GuildId,
        track: QueuedTrack,
    ) -> Result<PlayOutcome, MusicError> {
        let (action, position) = {
            let mut sessions = self.sessions.lock().await;
            let session = sessions.entry(guild_id).or_default();
            let action = session.player.enqueue(track);
            if action == EnqueueAction::Resume && session.player.resume() {
                if let Some(handle) = &session.current {
                    handle.play()?;
                }
            }
            (action, session.player.queue_len())
        };

        match action {
            EnqueueAction::Connect(channel_id) => self
                .connect_and_play(songbird, guild_id, channel_id)
                .await
                .map(PlayOutcome::Started),
            EnqueueAction::Resume => Ok(PlayOutcome::Resumed),
            EnqueueAction::Nothing => Ok(PlayOutcome::Queued { position }),
        }
    }

    async fn connect_and_play(
        self: &Arc<Self>,
        songbird: &Arc<Songbird>,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<QueuedTrack, MusicError> {
        // The session lock is not held while waiting on the gateway
        let call = match songbird.join(guild_id, channel_id).await {
            Ok(call) => call,
            Err(e) => {
                warn!("Failed to join {} in guild {}: {}", channel_id, guild_id, e);
                if let Some(session) = self.sessions.lock().await.get_mut(&guild_id) {
                    session.player.connect_failed();
                }
                return Err(e.into());
            }
        };

        let mut sessions = self.sessions.lock().await;
        let session = sessions.entry(guild_id).or_default();
        let (play_id, track) = session.player.connected().ok_or(MusicError::NothingQueued)?;
        let volume = session.player.volume();
        let handle = self
            .start_track(songbird, &call, guild_id, play_id, &track, volume)
            .await;
        session.current = Some(handle);
        Ok(track)
    }

    async fn start_track(
        self: &Arc<Self>,
        songbird: &Arc<Songbird>,
        call: &Arc<Mutex<Call>>,
        guild_id: GuildId,
        play_id: u64,
        track: &QueuedTrack,
        volume: u8,
    ) -> TrackHandle {
        let source = YoutubeDl::new(self.http.clone(), track.source_url.clone());
        let handle = call
            .lock()
            .await
            .play(Track::new(Input::from(source)).volume(volume_ratio(volume)));

        let notifier = TrackEndNotifier {
            manager: Arc::clone(self),
            songbird: Arc::clone(songbird),
            guild_id,
            play_id,
        };
        for event in [TrackEvent::End, TrackEvent::Error] {
            if let Err(e) = handle.add_event(Event::Track(event), notifier.clone()) {
                warn!("Failed to watch track in guild {}: {}", guild_id, e);
            }
        }

        info!("Now playing '{}' in guild {}", track.title, guild_id);
        handle
    }

    async fn advance(self: &Arc<Self>, songbird: &Arc<Songbird>, guild_id: GuildId, play_id: u64) {
        let mut sessions = self.sessions.lock().await;
        let Some(session) = sessions.get_mut(&guild_id) else {
            return;
        };

        match session.player.track_finished(play_id) {
            Advance::Stale => debug!("Ignoring stale end event #{} in guild {}", play_id, guild_id),
            Advance::Drained => {
                session.current = None;
                info!("Queue finished in guild {}", guild_id);
            }
            Advance::Next { play_id, track } => match songbird.get(guild_id) {
                Some(call) => {
                    let volume = session.player.volume();
                    let handle = self
                        .start_track(songbird, &call, guild_id, play_id, &track, volume)
                        .await;
                    session.current = Some(handle);
                }
                None => {
                    warn!("Voice connection gone in guild {}, dropping queue", guild_id);
                    session.player.stop();
                    session.current = None;
                }
            },
        }
    }

    pub async fn pause(&self, guild_id: GuildId) -> Result<bool, MusicError> {
        let mut sessions = self.sessions.lock().await;
        let Some(session) = sessions.get_mut(&guild_id) else {
            return Ok(false);
        };
        if !session.player.pause() {
            return Ok(false);
        }
        if let Some(handle) = &session.current {
            handle.pause()?;
        }
        Ok(true)
    }

    pub async fn resume(&self, guild_id: GuildId) -> Result<bool, MusicError> {
        let mut sessions = self.sessions.lock().await;
        let Some(session) = sessions.get_mut(&guild_id) else {
            return Ok(false);
        };
        if !session.player.resume() {
            return Ok(false);
        }
        if let Some(handle) = &session.current {
            handle.play()?;
        }
        Ok(true)
    }

    /// Stops the current track; its end event starts the next one.
    pub async fn skip(&self, guild_id: GuildId) -> Result<bool, MusicError> {
        let sessions = self.sessions.lock().await;
        let Some(session) = sessions.get(&guild_id) else {
            return Ok(false);
        };
        match (&session.current, session.player.is_active()) {
            (Some(handle), true) => {
                handle.stop()?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Clears the queue, halts playback and leaves the voice channel.
    pub async fn stop(&self, songbird: &Songbird, guild_id: GuildId) -> bool {
        let was_active = {
            let mut sessions = self.sessions.lock().await;
            match sessions.get_mut(&guild_id) {
                Some(session) => {
                    let was_active = session.player.is_active() || session.player.queue_len() > 0;
                    session.player.stop();
                    if let Some(handle) = session.current.take() {
                        // Already-finished tracks refuse control; nothing to do then
                        let _ = handle.stop();
                    }
                    was_active
                }
                None => false,
            }
        };

        if songbird.get(guild_id).is_some() {
            if let Err(e) = songbird.remove(guild_id).await {
                warn!("Failed to leave voice in guild {}: {}", guild_id, e);
            }
        }
        was_active
    }

    /// Forgets all state for a guild the bot has left.
    pub async fn reset(&self, guild_id: GuildId) {
        if let Some(mut session) = self.sessions.lock().await.remove(&guild_id) {
            session.player.stop();
            if let Some(handle) = session.current.take() {
                let _ = handle.stop();
            }
        }
    }

    pub async fn clear_queue(&self, guild_id: GuildId) -> usize {
        self.sessions
            .lock()
            .await
            .get_mut(&guild_id)
            .map(|session| session.player.clear_queue())
            .unwrap_or(0)
    }

    pub async fn set_volume(&self, guild_id: GuildId, volume: i64) -> Result<u8, MusicError> {
        let mut sessions = self.sessions.lock().await;
        let session = sessions.entry(guild_id).or_default();
        let volume = session
            .player
            .set_volume(volume)
            .ok_or(MusicError::VolumeOutOfRange(volume))?;
        if let Some(handle) = &session.current {
            handle.set_volume(volume_ratio(volume))?;
        }
        Ok(volume)
    }

    /// Current title plus the next `limit` queued titles.
    pub async fn snapshot(&self, guild_id: GuildId, limit: usize) -> QueueSnapshot {
        let sessions = self.sessions.lock().await;
        match sessions.get(&guild_id) {
            Some(session) => {
                let (upcoming, more) = session.player.upcoming(limit);
                QueueSnapshot {
                    state: session.player.state(),
                    now_playing: session.player.now_playing().map(|t| t.title.clone()),
                    upcoming: upcoming.into_iter().map(str::to_string).collect(),
                    more,
                    volume: session.player.volume(),
                }
            }
            None => QueueSnapshot::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueSnapshot {
    pub state: PlayerState,
    pub now_playing: Option<String>,
    pub upcoming: Vec<String>,
    pub more: bool,
    pub volume: u8,
}

impl Default for QueueSnapshot {
    fn default() -> Self {
        Self {
            state: PlayerState::Idle,
            now_playing: None,
            upcoming: Vec::new(),
            more: false,
            volume: player::DEFAULT_VOLUME,
        }
    }
}

impl QueueSnapshot {
    /// Numbered list of upcoming titles, with `...` when more are waiting.
    /// Always fits one embed field.
    pub fn render_upcoming(&self) -> String {
        let mut lines: Vec<String> = self
            .upcoming
            .iter()
            .enumerate()
            .map(|(i, title)| format!("{}. {}", i + 1, title))
            .collect();
        if self.more {
            lines.push("...".to_string());
        }
        crate::embeds::clip(&lines.join("\n"))
    }
}

#[derive(Clone)]
struct TrackEndNotifier {
    manager: Arc<MusicManager>,
    songbird: Arc<Songbird>,
    guild_id: GuildId,
    play_id: u64,
}

#[async_trait]
impl VoiceEventHandler for TrackEndNotifier {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        if let EventContext::Track(_) = ctx {
            self.manager
                .advance(&self.songbird, self.guild_id, self.play_id)
                .await;
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queued(title: &str) -> QueuedTrack {
        QueuedTrack {
            source_url: format!("https://example.com/{}", title),
            title: title.to_string(),
            channel_id: ChannelId::new(7),
        }
    }

    #[test]
    fn test_volume_ratio() {
        assert_eq!(volume_ratio(100), 1.0);
        assert_eq!(volume_ratio(0), 0.0);
        assert_eq!(volume_ratio(50), 0.5);
    }

    #[test]
    fn test_render_upcoming() {
        let snapshot = QueueSnapshot {
            upcoming: vec!["a".into(), "b".into()],
            more: true,
            ..Default::default()
        };
        assert_eq!(snapshot.render_upcoming(), "1. a\n2. b\n...");
        assert_eq!(QueueSnapshot::default().render_upcoming(), "");
    }

    #[test]
    fn test_full_queue_fits_embed_field() {
        let snapshot = QueueSnapshot {
            upcoming: (0..10).map(|i| format!("{}", i).repeat(100)).collect(),
            more: true,
            ..Default::default()
        };
        let rendered = snapshot.render_upcoming();
        assert!(rendered.chars().count() <= crate::config::DISCORD_FIELD_LIMIT);
        assert!(rendered.starts_with("1. 000"));
    }

    #[tokio::test]
    async fn test_controls_without_session_are_noops() {
        let manager = MusicManager::new(reqwest::Client::new());
        let guild = GuildId::new(1);

        assert!(!manager.pause(guild).await.unwrap());
        assert!(!manager.resume(guild).await.unwrap());
        assert!(!manager.skip(guild).await.unwrap());
        assert_eq!(manager.clear_queue(guild).await, 0);
        assert_eq!(manager.snapshot(guild, 10).await, QueueSnapshot::default());
    }

    #[tokio::test]
    async fn test_volume_rejected_out_of_range() {
        let manager = MusicManager::new(reqwest::Client::new());
        let guild = GuildId::new(1);

        assert!(matches!(
            manager.set_volume(guild, 150).await,
            Err(MusicError::VolumeOutOfRange(150))
        ));
        assert_eq!(manager.set_volume(guild, 30).await.unwrap(), 30);
        assert_eq!(manager.snapshot(guild, 10).await.volume, 30);
    }

    #[tokio::test]
    async fn test_clear_queue_and_reset() {
        let manager = MusicManager::new(reqwest::Client::new());
        let guild = GuildId::new(1);
        {
            let mut sessions = manager.sessions.lock().await;
            let session = sessions.entry(guild).or_default();
            session.player.enqueue(queued("a"));
            session.player.connected();
            session.player.enqueue(queued("b"));
            session.player.enqueue(queued("c"));
        }

        let snapshot = manager.snapshot(guild, 1).await;
        assert_eq!(snapshot.now_playing.as_deref(), Some("a"));
        assert_eq!(snapshot.upcoming, vec!["b".to_string()]);
        assert!(snapshot.more);

        assert_eq!(manager.clear_queue(guild).await, 2);
        manager.reset(guild).await;
        assert_eq!(manager.snapshot(guild, 10).await.state, PlayerState::Idle);
    }
}

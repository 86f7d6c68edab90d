use poise::serenity_prelude::ChannelId;
use std::collections::VecDeque;

pub const DEFAULT_VOLUME: u8 = 100;
pub const MAX_VOLUME: i64 = 100;

/// A resolved track waiting in (or taken from) the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedTrack {
    pub source_url: String,
    pub title: String,
    pub channel_id: ChannelId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerState {
    Idle,
    Connecting,
    Playing,
    Paused,
}

/// What the caller has to do after a track was enqueued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnqueueAction {
    /// Join this channel, then call [`GuildPlayer::connected`].
    Connect(ChannelId),
    Resume,
    Nothing,
}

/// What happened when a track ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advance {
    /// The end event belongs to a track that is no longer current.
    Stale,
    Drained,
    Next { play_id: u64, track: QueuedTrack },
}

/// Per-guild playback state. Pure bookkeeping; the voice driver acts on
/// the returned instructions.
#[derive(Debug)]
pub struct GuildPlayer {
    state: PlayerState,
    queue: VecDeque<QueuedTrack>,
    now_playing: Option<(u64, QueuedTrack)>,
    next_play_id: u64,
    volume: u8,
}

impl Default for GuildPlayer {
    fn default() -> Self {
        Self::new()
    }
}

impl GuildPlayer {
    pub fn new() -> Self {
        Self {
            state: PlayerState::Idle,
            queue: VecDeque::new(),
            now_playing: None,
            next_play_id: 1,
            volume: DEFAULT_VOLUME,
        }
    }

    pub fn state(&self) -> PlayerState {
        self.state
    }

    pub fn volume(&self) -> u8 {
        self.volume
    }

    pub fn now_playing(&self) -> Option<&QueuedTrack> {
        self.now_playing.as_ref().map(|(_, track)| track)
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn enqueue(&mut self, track: QueuedTrack) -> EnqueueAction {
        self.queue.push_back(track);
        match self.state {
            PlayerState::Idle => self.begin(),
            PlayerState::Paused => EnqueueAction::Resume,
            PlayerState::Playing | PlayerState::Connecting => EnqueueAction::Nothing,
        }
    }

    fn begin(&mut self) -> EnqueueAction {
        match self.queue.front() {
            Some(head) => {
                self.state = PlayerState::Connecting;
                EnqueueAction::Connect(head.channel_id)
            }
            None => EnqueueAction::Nothing,
        }
    }

    /// The voice connection is up: take the head of the queue and play it.
    pub fn connected(&mut self) -> Option<(u64, QueuedTrack)> {
        if self.state != PlayerState::Connecting {
            return None;
        }
        let next = self.take_next();
        if next.is_none() {
            self.state = PlayerState::Idle;
        }
        next
    }

    /// Joining failed. The head entry stays queued for the next attempt.
    pub fn connect_failed(&mut self) {
        if self.state == PlayerState::Connecting {
            self.state = PlayerState::Idle;
        }
    }

    pub fn track_finished(&mut self, play_id: u64) -> Advance {
        match &self.now_playing {
            Some((current, _)) if *current == play_id => {}
            _ => return Advance::Stale,
        }
        self.now_playing = None;

        match self.take_next() {
            Some((play_id, track)) => Advance::Next { play_id, track },
            None => {
                self.state = PlayerState::Idle;
                Advance::Drained
            }
        }
    }

    fn take_next(&mut self) -> Option<(u64, QueuedTrack)> {
        let track = self.queue.pop_front()?;
        let play_id = self.next_play_id;
        self.next_play_id += 1;
        self.now_playing = Some((play_id, track.clone()));
        self.state = PlayerState::Playing;
        Some((play_id, track))
    }

    pub fn pause(&mut self) -> bool {
        if self.state == PlayerState::Playing {
            self.state = PlayerState::Paused;
            true
        } else {
            false
        }
    }

    pub fn resume(&mut self) -> bool {
        if self.state == PlayerState::Paused {
            self.state = PlayerState::Playing;
            true
        } else {
            false
        }
    }

    /// Whether a track is loaded (playing or paused).
    pub fn is_active(&self) -> bool {
        matches!(self.state, PlayerState::Playing | PlayerState::Paused)
    }

    /// Clears everything and returns to idle.
    pub fn stop(&mut self) {
        self.queue.clear();
        self.now_playing = None;
        self.state = PlayerState::Idle;
    }

    /// Drops pending entries but leaves the current track alone.
    pub fn clear_queue(&mut self) -> usize {
        let count = self.queue.len();
        self.queue.clear();
        count
    }

    /// Values outside `0..=100` are rejected rather than clamped.
    pub fn set_volume(&mut self, volume: i64) -> Option<u8> {
        if !(0..=MAX_VOLUME).contains(&volume) {
            return None;
        }
        self.volume = volume as u8;
        Some(self.volume)
    }

    /// Titles of the next `limit` entries and whether more are waiting.
    pub fn upcoming(&self, limit: usize) -> (Vec<&str>, bool) {
        let titles = self
            .queue
            .iter()
            .take(limit)
            .map(|track| track.title.as_str())
            .collect();
        (titles, self.queue.len() > limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(title: &str) -> QueuedTrack {
        QueuedTrack {
            source_url: format!("https://example.com/{}", title),
            title: title.to_string(),
            channel_id: ChannelId::new(42),
        }
    }

    fn start(player: &mut GuildPlayer, first: &str) -> u64 {
        assert_eq!(
            player.enqueue(track(first)),
            EnqueueAction::Connect(ChannelId::new(42))
        );
        assert_eq!(player.state(), PlayerState::Connecting);
        let (play_id, started) = player.connected().unwrap();
        assert_eq!(started.title, first);
        play_id
    }

    #[test]
    fn test_queue_is_fifo() {
        let mut player = GuildPlayer::new();
        let mut play_id = start(&mut player, "a");

        assert_eq!(player.enqueue(track("b")), EnqueueAction::Nothing);
        assert_eq!(player.enqueue(track("c")), EnqueueAction::Nothing);

        let mut played = vec!["a".to_string()];
        loop {
            match player.track_finished(play_id) {
                Advance::Next { play_id: next, track } => {
                    played.push(track.title);
                    play_id = next;
                }
                Advance::Drained => break,
                Advance::Stale => panic!("current track reported stale"),
            }
        }

        assert_eq!(played, vec!["a", "b", "c"]);
        assert_eq!(player.state(), PlayerState::Idle);
        assert!(player.now_playing().is_none());
    }

    #[test]
    fn test_stale_end_events_do_not_advance() {
        let mut player = GuildPlayer::new();
        let first = start(&mut player, "a");
        player.enqueue(track("b"));

        assert_eq!(player.track_finished(first + 100), Advance::Stale);
        assert_eq!(player.now_playing().unwrap().title, "a");

        let Advance::Next { play_id: second, .. } = player.track_finished(first) else {
            panic!("expected next track");
        };
        // The first track's end event arriving twice must not skip "b"
        assert_eq!(player.track_finished(first), Advance::Stale);
        assert_eq!(player.now_playing().unwrap().title, "b");
        assert_eq!(player.track_finished(second), Advance::Drained);
    }

    #[test]
    fn test_enqueue_while_connecting_does_not_reconnect() {
        let mut player = GuildPlayer::new();
        player.enqueue(track("a"));
        assert_eq!(player.enqueue(track("b")), EnqueueAction::Nothing);
        assert_eq!(player.queue_len(), 2);
    }

    #[test]
    fn test_enqueue_while_paused_resumes() {
        let mut player = GuildPlayer::new();
        start(&mut player, "a");
        assert!(player.pause());
        assert!(!player.pause());
        assert_eq!(player.state(), PlayerState::Paused);

        assert_eq!(player.enqueue(track("b")), EnqueueAction::Resume);
        assert!(player.resume());
        assert_eq!(player.state(), PlayerState::Playing);
        assert!(!player.resume());
    }

    #[test]
    fn test_connect_failure_keeps_track_queued() {
        let mut player = GuildPlayer::new();
        player.enqueue(track("a"));
        player.connect_failed();

        assert_eq!(player.state(), PlayerState::Idle);
        assert_eq!(player.queue_len(), 1);

        // The next enqueue retries with the original head
        assert_eq!(
            player.enqueue(track("b")),
            EnqueueAction::Connect(ChannelId::new(42))
        );
        assert_eq!(player.connected().unwrap().1.title, "a");
    }

    #[test]
    fn test_stop_clears_everything() {
        let mut player = GuildPlayer::new();
        let play_id = start(&mut player, "a");
        player.enqueue(track("b"));

        player.stop();
        assert_eq!(player.state(), PlayerState::Idle);
        assert_eq!(player.queue_len(), 0);
        // The stopped track's end event is ignored
        assert_eq!(player.track_finished(play_id), Advance::Stale);
    }

    #[test]
    fn test_clear_queue_keeps_current_track() {
        let mut player = GuildPlayer::new();
        start(&mut player, "a");
        player.enqueue(track("b"));
        player.enqueue(track("c"));

        assert_eq!(player.clear_queue(), 2);
        assert_eq!(player.state(), PlayerState::Playing);
        assert_eq!(player.now_playing().unwrap().title, "a");
    }

    #[test]
    fn test_volume_bounds() {
        let mut player = GuildPlayer::new();
        assert_eq!(player.set_volume(0), Some(0));
        assert_eq!(player.set_volume(100), Some(100));
        assert_eq!(player.set_volume(55), Some(55));
        assert_eq!(player.set_volume(101), None);
        assert_eq!(player.set_volume(-1), None);
        assert_eq!(player.volume(), 55);
    }

    #[test]
    fn test_upcoming() {
        let mut player = GuildPlayer::new();
        for i in 0..12 {
            player.enqueue(track(&format!("t{}", i)));
        }
        let (titles, more) = player.upcoming(10);
        assert_eq!(titles.len(), 10);
        assert_eq!(titles[0], "t0");
        assert!(more);

        let (_, more) = GuildPlayer::new().upcoming(10);
        assert!(!more);
    }
}

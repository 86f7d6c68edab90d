use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Online,
    Offline,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedPlayer {
    pub name: String,
    pub status: Status,
}

/// A change worth telling someone about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresenceEvent {
    CameOnline { uuid: String, name: String },
    WentOffline { uuid: String, name: String },
    /// The player has no Hypixel record and was dropped from the checklist.
    Removed { uuid: String, name: String },
    /// Polling stopped because of an API error.
    Halted { error: String },
}

/// Checklist of players keyed by UUID with their last known status.
#[derive(Debug, Default)]
pub struct PresenceTracker {
    players: BTreeMap<String, TrackedPlayer>,
}

impl PresenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn contains_name(&self, name: &str) -> bool {
        self.players.values().any(|p| p.name == name)
    }

    /// New players start out offline. Returns false if the name is already listed.
    pub fn add(&mut self, uuid: impl Into<String>, name: impl Into<String>) -> bool {
        let name = name.into();
        if self.contains_name(&name) {
            return false;
        }
        self.players.insert(
            uuid.into(),
            TrackedPlayer {
                name,
                status: Status::Offline,
            },
        );
        true
    }

    pub fn remove_by_name(&mut self, name: &str) -> Option<String> {
        let uuid = self
            .players
            .iter()
            .find(|(_, p)| p.name == name)
            .map(|(uuid, _)| uuid.clone())?;
        self.players.remove(&uuid);
        Some(uuid)
    }

    pub fn uuids(&self) -> Vec<String> {
        self.players.keys().cloned().collect()
    }

    /// Records the latest observation and reports a transition edge, if any.
    pub fn observe(&mut self, uuid: &str, online: bool) -> Option<PresenceEvent> {
        let player = self.players.get_mut(uuid)?;
        match (player.status, online) {
            (Status::Offline, true) => {
                player.status = Status::Online;
                Some(PresenceEvent::CameOnline {
                    uuid: uuid.to_string(),
                    name: player.name.clone(),
                })
            }
            (Status::Online, false) => {
                player.status = Status::Offline;
                Some(PresenceEvent::WentOffline {
                    uuid: uuid.to_string(),
                    name: player.name.clone(),
                })
            }
            _ => None,
        }
    }

    pub fn remove_missing(&mut self, uuid: &str) -> Option<PresenceEvent> {
        let player = self.players.remove(uuid)?;
        Some(PresenceEvent::Removed {
            uuid: uuid.to_string(),
            name: player.name,
        })
    }

    /// Names split into (online, offline), in UUID order.
    pub fn split_by_status(&self) -> (Vec<&str>, Vec<&str>) {
        let mut online = Vec::new();
        let mut offline = Vec::new();
        for player in self.players.values() {
            match player.status {
                Status::Online => online.push(player.name.as_str()),
                Status::Offline => offline.push(player.name.as_str()),
            }
        }
        (online, offline)
    }
}

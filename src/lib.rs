pub mod apis;
pub mod cache;
pub mod commands;
pub mod config;
pub mod db;
pub mod embeds;
pub mod events;
pub mod hycheck;
pub mod music;
pub mod relay;
pub mod services;

use std::sync::Arc;

/// Custom data passed to all commands
pub struct Data {
    pub config: config::Config,
    pub db: db::Database,
    pub prefixes: services::prefix::PrefixService,
    /// `None` when the relay listener could not be bound
    pub relay: Option<Arc<relay::ConnectionHandler>>,
    pub music: Arc<music::MusicManager>,
    pub hycheck: Arc<hycheck::HycheckService>,
    pub apis: apis::Apis,
    pub topics: Vec<String>,
}

pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Context<'a> = poise::Context<'a, Data, Error>;

use berbbot::apis::{Apis, HypixelClient};
use berbbot::commands::{self, fun};
use berbbot::hycheck::HycheckService;
use berbbot::music::MusicManager;
use berbbot::relay::ConnectionHandler;
use berbbot::services::prefix::{strip_guild_prefix, PrefixService};
use berbbot::{config::Config, db::Database, events, Data, Error};
use poise::serenity_prelude as serenity;
use songbird::serenity::SerenityInit;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

async fn on_error(error: poise::FrameworkError<'_, Data, Error>) {
    match error {
        poise::FrameworkError::Setup { error, .. } => {
            error!("Failed to start bot: {}", error);
        }
        poise::FrameworkError::Command { error, ctx, .. } => {
            error!("Error in command `{}`: {}", ctx.command().qualified_name, error);
            if let Err(e) = ctx.say(format!("Something went wrong: {}", error)).await {
                warn!("Could not report command error: {}", e);
            }
        }
        poise::FrameworkError::NotAnOwner { ctx, .. } => {
            let _ = ctx.say("Only the bot owner can use this command.").await;
        }
        poise::FrameworkError::MissingUserPermissions {
            missing_permissions,
            ctx,
            ..
        } => {
            let missing = missing_permissions
                .map(|p| p.to_string())
                .unwrap_or_else(|| "the required permissions".to_string());
            let _ = ctx.say(format!("You are missing {} to use this command.", missing)).await;
        }
        poise::FrameworkError::MissingBotPermissions {
            missing_permissions,
            ctx,
            ..
        } => {
            let _ = ctx
                .say(format!("I am missing {} to do that.", missing_permissions))
                .await;
        }
        other => {
            if let Err(e) = poise::builtins::on_error(other).await {
                error!("Error while handling error: {}", e);
            }
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load configuration
    let config = Config::from_env()?;
    info!("Loaded configuration: {:?}", config);
    let discord_token = config.discord_token.clone();

    let mut owners = HashSet::new();
    if let Some(owner_id) = config.owner_id {
        owners.insert(serenity::UserId::new(owner_id));
    }

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: commands::all(),
            prefix_options: poise::PrefixFrameworkOptions {
                stripped_dynamic_prefix: Some(strip_guild_prefix),
                mention_as_prefix: true,
                case_insensitive_commands: true,
                ..Default::default()
            },
            owners,
            on_error: |error| Box::pin(on_error(error)),
            event_handler: |ctx, event, _framework, data| Box::pin(events::handle(ctx, event, data)),
            ..Default::default()
        })
        .setup(|ctx, _ready, framework| {
            Box::pin(async move {
                match config.dev_guild_id {
                    Some(guild_id) => {
                        let guild_id = serenity::GuildId::new(guild_id);
                        poise::builtins::register_in_guild(ctx, &framework.options().commands, guild_id)
                            .await?;
                        info!("Registered slash commands in guild {}", guild_id);
                    }
                    None => {
                        poise::builtins::register_globally(ctx, &framework.options().commands).await?;
                        info!("Registered slash commands globally");
                    }
                }

                let db = Database::new(&config.database_url)?;
                db.execute_init()?;
                let prefixes = PrefixService::new(db.clone(), config.default_prefixes.clone());

                let relay_timeout = Duration::from_secs(config.relay_timeout_secs);
                let relay = match ConnectionHandler::bind(
                    config.relay_bind_addr,
                    config.subbot_ids.iter().copied(),
                    relay_timeout,
                )
                .await
                {
                    Ok(handler) => Some(Arc::new(handler)),
                    Err(e) => {
                        warn!("Subbot relay disabled, could not listen on {}: {}", config.relay_bind_addr, e);
                        None
                    }
                };

                let http_client = reqwest::Client::new();
                let hycheck_source = HypixelClient::new(
                    http_client.clone(),
                    config.hypixel_api_key_hycheck.clone(),
                    None,
                );
                let hycheck = Arc::new(HycheckService::new(
                    Arc::new(hycheck_source),
                    Duration::from_secs(config.hycheck_interval_secs),
                ));

                Ok(Data {
                    topics: fun::load_topics(&config.topic_list_path),
                    apis: Apis::new(http_client.clone(), config.hypixel_api_key.clone()),
                    music: MusicManager::new(http_client),
                    hycheck,
                    relay,
                    prefixes,
                    db,
                    config,
                })
            })
        })
        .build();

    let intents = serenity::GatewayIntents::non_privileged()
        | serenity::GatewayIntents::MESSAGE_CONTENT
        | serenity::GatewayIntents::GUILD_MESSAGES
        | serenity::GatewayIntents::GUILD_MEMBERS
        | serenity::GatewayIntents::GUILD_PRESENCES
        | serenity::GatewayIntents::GUILD_VOICE_STATES;

    let mut client = serenity::ClientBuilder::new(&discord_token, intents)
        .framework(framework)
        .register_songbird()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create client: {}", e))?;

    info!("Starting bot...");
    if let Err(why) = client.start().await {
        error!("Client error: {:?}", why);
    }

    Ok(())
}

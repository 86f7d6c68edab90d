pub mod clear;
pub mod comm;
pub mod fun;
pub mod hycheck;
pub mod minecraft;
pub mod moderation;
pub mod music;
pub mod owner;
pub mod prefix;
pub mod stats;
pub mod voice;

use crate::{Data, Error};

/// Every command the bot registers, grouped by cog.
pub fn all() -> Vec<poise::Command<Data, Error>> {
    vec![
        help(),
        // moderation
        moderation::timeout(),
        moderation::kick(),
        moderation::ban(),
        moderation::unban(),
        clear::clear(),
        prefix::prefix(),
        // voice and music
        voice::vc(),
        music::play(),
        music::queue(),
        music::pause(),
        music::resume(),
        music::skip(),
        music::stop(),
        music::clear_queue(),
        music::display_queue(),
        music::volume(),
        // fun and info
        fun::topic(),
        fun::roll(),
        fun::coinflip(),
        fun::animal(),
        fun::joke(),
        fun::meme(),
        stats::user_stats(),
        stats::server_stats(),
        minecraft::render_skin(),
        minecraft::hypixel(),
        // owner
        hycheck::hycheck(),
        comm::establish_connection(),
        comm::send_subbot_command(),
        comm::subbots(),
        owner::dev(),
        owner::guild(),
        owner::spamuser(),
        owner::spamchannel(),
    ]
}

/// Show the command list, or help for one command
#[poise::command(prefix_command, slash_command)]
pub async fn help(
    ctx: crate::Context<'_>,
    #[description = "Command to explain"] command: Option<String>,
) -> Result<(), Error> {
    poise::builtins::help(
        ctx,
        command.as_deref(),
        poise::builtins::HelpConfiguration {
            extra_text_at_bottom: "Use the prefix of this server or mention me to run a command.",
            ..Default::default()
        },
    )
    .await?;
    Ok(())
}

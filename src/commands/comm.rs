use crate::relay::{Amount, ConnectionHandler, RelayCommand, RelayError};
use crate::{Context, Error};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

fn relay(ctx: Context<'_>) -> Result<Arc<ConnectionHandler>, Error> {
    ctx.data()
        .relay
        .clone()
        .ok_or_else(|| "The subbot relay is not running".into())
}

/// Splits an optional leading amount off a relayed command line.
fn split_amount(input: &str) -> (Amount, &str) {
    let input = input.trim();
    if let Some((first, rest)) = input.split_once(char::is_whitespace) {
        if let Ok(amount) = first.parse::<Amount>() {
            return (amount, rest.trim_start());
        }
    }
    (Amount::Count(1), input)
}

/// Wait for one subbot to connect and authenticate
#[poise::command(prefix_command, slash_command, owners_only, aliases("estconn"))]
pub async fn establish_connection(ctx: Context<'_>) -> Result<(), Error> {
    let relay = relay(ctx)?;
    ctx.defer().await?;

    let wait = Duration::from_secs(ctx.data().config.relay_timeout_secs);
    match relay.establish_connection(wait).await {
        Ok(subbot_id) => {
            info!("Subbot {} connected on request of {}", subbot_id, ctx.author().name);
            ctx.say(format!("connection established (subbot `{}`)", subbot_id))
                .await?;
        }
        Err(RelayError::Timeout) => {
            ctx.say(format!(
                "failed establishing connection: no subbot connected within {}",
                humantime::format_duration(wait)
            ))
            .await?;
        }
        Err(e) => {
            warn!("Subbot connection attempt failed: {}", e);
            ctx.say(format!("failed establishing connection: {}", e)).await?;
        }
    }
    Ok(())
}

/// Relay a command to connected subbots
#[poise::command(prefix_command, slash_command, owners_only, aliases("sendsbcmd"))]
pub async fn send_subbot_command(
    ctx: Context<'_>,
    #[description = "Optional amount (number or `all`, default 1) followed by the command"]
    #[rest]
    input: String,
) -> Result<(), Error> {
    let relay = relay(ctx)?;
    let (amount, command) = split_amount(&input);
    if command.is_empty() {
        ctx.say("Please pass a command to relay.").await?;
        return Ok(());
    }
    ctx.defer().await?;

    let relayed = RelayCommand {
        channel_id: ctx.channel_id().get(),
        author_id: ctx.author().id.get(),
        command: command.to_string(),
    };
    let report = relay.send_amount(amount, &relayed).await;

    let mut reply = format!(
        "The subbot command `{}` has been sent to **`{}`** subbots.",
        command,
        report.delivered.len()
    );
    for (subbot_id, error) in &report.failed {
        reply.push_str(&format!("\nSubbot `{}` dropped: {}", subbot_id, error));
    }
    ctx.say(reply).await?;
    Ok(())
}

/// Show connected and pending subbots
#[poise::command(prefix_command, slash_command, owners_only)]
pub async fn subbots(ctx: Context<'_>) -> Result<(), Error> {
    let relay = relay(ctx)?;
    let connected = relay.connected_ids().await;
    let pending = relay.pending_ids().await;

    let list = |ids: &[u64]| {
        if ids.is_empty() {
            "-".to_string()
        } else {
            ids.iter().map(|id| format!("`{}`", id)).collect::<Vec<_>>().join(", ")
        }
    };
    let embed = crate::embeds::reply(ctx, "Subbots")
        .field("Connected", list(&connected), false)
        .field("Waiting for authentication", list(&pending), false);

    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_amount() {
        assert_eq!(split_amount("3 say hi"), (Amount::Count(3), "say hi"));
        assert_eq!(split_amount("all  dance"), (Amount::All, "dance"));
        assert_eq!(split_amount("say hi"), (Amount::Count(1), "say hi"));
        assert_eq!(split_amount(" dance "), (Amount::Count(1), "dance"));
        // A bare number is the command itself
        assert_eq!(split_amount("42"), (Amount::Count(1), "42"));
        assert_eq!(split_amount(""), (Amount::Count(1), ""));
    }
}

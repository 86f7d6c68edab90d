use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio_util::bytes::Bytes;
use tokio_util::codec::{Framed, LengthDelimitedCodec};

/// Upper bound for a single frame; commands are short chat strings.
pub const MAX_FRAME_LEN: usize = 64 * 1024;

pub const AUTH_SUCCEEDED: &str = "authentication succeeded";
pub const AUTH_FAILED: &str = "authentication failed";

pub type FramedStream = Framed<TcpStream, LengthDelimitedCodec>;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("relay I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed relay frame: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("connection closed by peer")]
    Closed,
    #[error("timed out waiting for the relay peer")]
    Timeout,
    #[error("relay peer stopped reading; frame could not be written in time")]
    Stalled,
    #[error("subbot {0} is not connected")]
    UnknownSubbot(u64),
    #[error("subbot {0} failed authentication")]
    AuthRejected(u64),
    #[error("unexpected frame: expected {expected}, got {got}")]
    UnexpectedFrame {
        expected: &'static str,
        got: &'static str,
    },
}

impl RelayError {
    /// Whether the connection that produced this error is unusable.
    pub fn is_disconnect(&self) -> bool {
        matches!(
            self,
            RelayError::Io(_) | RelayError::Closed | RelayError::Malformed(_) | RelayError::Stalled
        )
    }
}

/// A single message on the wire: a 4-byte big-endian length followed by JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Frame {
    Hello {
        subbot_id: u64,
    },
    AuthResult {
        accepted: bool,
        message: String,
    },
    Command {
        seq: u64,
        channel_id: u64,
        author_id: u64,
        command: String,
    },
    Ack {
        seq: u64,
    },
    Text {
        body: String,
    },
}

impl Frame {
    pub fn command(seq: u64, command: &RelayCommand) -> Self {
        Frame::Command {
            seq,
            channel_id: command.channel_id,
            author_id: command.author_id,
            command: command.command.clone(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Frame::Hello { .. } => "hello",
            Frame::AuthResult { .. } => "auth_result",
            Frame::Command { .. } => "command",
            Frame::Ack { .. } => "ack",
            Frame::Text { .. } => "text",
        }
    }
}

/// A chat command relayed to subbots, tagged with where it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayCommand {
    pub channel_id: u64,
    pub author_id: u64,
    pub command: String,
}

impl fmt::Display for RelayCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.channel_id, self.author_id, self.command)
    }
}

/// How many subbots a broadcast should reach.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Amount {
    All,
    Count(usize),
}

impl Amount {
    /// Number of targets out of `available` connections.
    pub fn resolve(self, available: usize) -> usize {
        match self {
            Amount::All => available,
            Amount::Count(n) => n.min(available),
        }
    }
}

impl FromStr for Amount {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("all") {
            return Ok(Amount::All);
        }
        trimmed
            .parse::<usize>()
            .map(Amount::Count)
            .map_err(|_| format!("`{}` is neither `all` nor a number", trimmed))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Amount::All => write!(f, "all"),
            Amount::Count(n) => write!(f, "{}", n),
        }
    }
}

pub fn framed(stream: TcpStream) -> FramedStream {
    LengthDelimitedCodec::builder()
        .max_frame_length(MAX_FRAME_LEN)
        .new_framed(stream)
}

pub async fn write_frame(stream: &mut FramedStream, frame: &Frame) -> Result<(), RelayError> {
    let payload = serde_json::to_vec(frame)?;
    stream.send(Bytes::from(payload)).await?;
    Ok(())
}

pub async fn read_frame(stream: &mut FramedStream) -> Result<Frame, RelayError> {
    match stream.next().await {
        Some(Ok(bytes)) => Ok(serde_json::from_slice(&bytes)?),
        Some(Err(e)) => Err(RelayError::Io(e)),
        None => Err(RelayError::Closed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amount_parsing() {
        assert_eq!("all".parse::<Amount>(), Ok(Amount::All));
        assert_eq!(" ALL ".parse::<Amount>(), Ok(Amount::All));
        assert_eq!("3".parse::<Amount>(), Ok(Amount::Count(3)));
        assert!("-1".parse::<Amount>().is_err());
        assert!("some".parse::<Amount>().is_err());
    }

    #[test]
    fn test_amount_resolution() {
        assert_eq!(Amount::All.resolve(4), 4);
        assert_eq!(Amount::Count(2).resolve(4), 2);
        // A count at or above the connection count reaches everyone
        assert_eq!(Amount::Count(9).resolve(4), 4);
        assert_eq!(Amount::Count(1).resolve(0), 0);
    }

    #[test]
    fn test_command_frame_layout() {
        let frame = Frame::command(
            7,
            &RelayCommand {
                channel_id: 10,
                author_id: 20,
                command: "say hi".to_string(),
            },
        );
        let json: serde_json::Value = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["kind"], "command");
        assert_eq!(json["seq"], 7);
        assert_eq!(json["channel_id"], 10);
        assert_eq!(json["command"], "say hi");
        assert_eq!(frame.kind(), "command");
    }

    #[test]
    fn test_relay_command_display() {
        let command = RelayCommand {
            channel_id: 1,
            author_id: 2,
            command: "dance".to_string(),
        };
        assert_eq!(command.to_string(), "1 2 dance");
    }
}

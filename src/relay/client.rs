use super::protocol::{framed, read_frame, write_frame, Frame, FramedStream, RelayCommand, RelayError};
use std::net::SocketAddr;
use tokio::net::TcpStream;
use tracing::{debug, info};

/// Satellite side of the relay.
#[derive(Debug)]
pub struct SubbotClient {
    subbot_id: u64,
    stream: FramedStream,
}

/// A command as delivered to a subbot, with the sequence number to ack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedCommand {
    pub seq: u64,
    pub command: RelayCommand,
}

impl SubbotClient {
    /// Connects to the main bot and authenticates as `subbot_id`.
    pub async fn connect(addr: SocketAddr, subbot_id: u64) -> Result<Self, RelayError> {
        let mut stream = framed(TcpStream::connect(addr).await?);
        write_frame(&mut stream, &Frame::Hello { subbot_id }).await?;

        match read_frame(&mut stream).await? {
            Frame::AuthResult { accepted: true, message } => {
                info!("Subbot {}: {}", subbot_id, message);
                Ok(Self { subbot_id, stream })
            }
            Frame::AuthResult { accepted: false, message } => {
                info!("Subbot {}: {}", subbot_id, message);
                Err(RelayError::AuthRejected(subbot_id))
            }
            other => Err(RelayError::UnexpectedFrame {
                expected: "auth_result",
                got: other.kind(),
            }),
        }
    }

    pub fn subbot_id(&self) -> u64 {
        self.subbot_id
    }

    /// Waits for the next relayed command. The caller must `ack` it.
    pub async fn next_command(&mut self) -> Result<ReceivedCommand, RelayError> {
        loop {
            match read_frame(&mut self.stream).await? {
                Frame::Command {
                    seq,
                    channel_id,
                    author_id,
                    command,
                } => {
                    debug!("Subbot {}: received command #{}", self.subbot_id, seq);
                    return Ok(ReceivedCommand {
                        seq,
                        command: RelayCommand {
                            channel_id,
                            author_id,
                            command,
                        },
                    });
                }
                Frame::Text { body } => debug!("Subbot {}: text from main bot: {}", self.subbot_id, body),
                other => {
                    return Err(RelayError::UnexpectedFrame {
                        expected: "command",
                        got: other.kind(),
                    })
                }
            }
        }
    }

    pub async fn ack(&mut self, seq: u64) -> Result<(), RelayError> {
        write_frame(&mut self.stream, &Frame::Ack { seq }).await
    }

    pub async fn send_text(&mut self, body: &str) -> Result<(), RelayError> {
        write_frame(
            &mut self.stream,
            &Frame::Text {
                body: body.to_string(),
            },
        )
        .await
    }
}

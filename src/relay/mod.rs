//! Command relay between the main bot and its subbots over a local socket.

pub mod client;
pub mod handler;
pub mod protocol;

pub use client::{ReceivedCommand, SubbotClient};
pub use handler::{BroadcastReport, ConnectionHandler};
pub use protocol::{Amount, RelayCommand, RelayError};

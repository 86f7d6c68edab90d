use super::protocol::{
    framed, read_frame, write_frame, Amount, Frame, FramedStream, RelayCommand, RelayError,
    AUTH_FAILED, AUTH_SUCCEEDED,
};
use futures::future::join_all;
use futures::SinkExt;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio::time::{timeout, Duration};
use tracing::{debug, info, warn};

/// Accepts subbot connections on a local listener and relays commands to them.
pub struct ConnectionHandler {
    listener: TcpListener,
    /// Expected ids that do not currently hold a session.
    pending_ids: Mutex<BTreeSet<u64>>,
    connections: Mutex<BTreeMap<u64, Arc<SubbotConnection>>>,
    reply_timeout: Duration,
}

/// Outcome of a broadcast.
#[derive(Debug, Default)]
pub struct BroadcastReport {
    pub delivered: Vec<u64>,
    pub failed: Vec<(u64, String)>,
}

struct SubbotConnection {
    peer: SocketAddr,
    channel: Mutex<SubbotChannel>,
}

struct SubbotChannel {
    stream: FramedStream,
    next_seq: u64,
    /// Text frames that arrived while waiting for an ack.
    inbox: VecDeque<String>,
}

impl ConnectionHandler {
    pub async fn bind(
        addr: SocketAddr,
        expected_ids: impl IntoIterator<Item = u64>,
        reply_timeout: Duration,
    ) -> Result<Self, RelayError> {
        let listener = TcpListener::bind(addr).await?;
        info!("Relay: listening for subbots on {}", listener.local_addr()?);

        Ok(Self {
            listener,
            pending_ids: Mutex::new(expected_ids.into_iter().collect()),
            connections: Mutex::new(BTreeMap::new()),
            reply_timeout,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, RelayError> {
        Ok(self.listener.local_addr()?)
    }

    pub async fn connected_ids(&self) -> Vec<u64> {
        self.connections.lock().await.keys().copied().collect()
    }

    pub async fn pending_ids(&self) -> Vec<u64> {
        self.pending_ids.lock().await.iter().copied().collect()
    }

    /// Waits for one subbot to connect and authenticate.
    ///
    /// The hello frame must carry an expected id that holds no live session.
    /// Returns the authenticated id.
    pub async fn establish_connection(&self, wait: Duration) -> Result<u64, RelayError> {
        let (stream, peer) = timeout(wait, self.listener.accept())
            .await
            .map_err(|_| RelayError::Timeout)??;
        info!("Relay: connection accepted from {}", peer);

        let mut stream = framed(stream);
        let hello = timeout(self.reply_timeout, read_frame(&mut stream))
            .await
            .map_err(|_| RelayError::Timeout)??;
        debug!("Relay: authentication message received from {}", peer);

        let subbot_id = match hello {
            Frame::Hello { subbot_id } => subbot_id,
            other => {
                reject(&mut stream).await;
                return Err(RelayError::UnexpectedFrame {
                    expected: "hello",
                    got: other.kind(),
                });
            }
        };

        let claimed = self.pending_ids.lock().await.remove(&subbot_id);
        if !claimed {
            info!("Relay: subbot {} from {} failed authentication", subbot_id, peer);
            reject(&mut stream).await;
            return Err(RelayError::AuthRejected(subbot_id));
        }

        let accepted = Frame::AuthResult {
            accepted: true,
            message: AUTH_SUCCEEDED.to_string(),
        };
        if let Err(e) = write_frame(&mut stream, &accepted).await {
            self.pending_ids.lock().await.insert(subbot_id);
            return Err(e);
        }

        let connection = SubbotConnection {
            peer,
            channel: Mutex::new(SubbotChannel {
                stream,
                next_seq: 1,
                inbox: VecDeque::new(),
            }),
        };
        self.connections
            .lock()
            .await
            .insert(subbot_id, Arc::new(connection));
        info!("Relay: subbot {} authenticated from {}", subbot_id, peer);

        Ok(subbot_id)
    }

    /// Sends a command to one subbot and waits for its acknowledgement.
    pub async fn send_by_id(&self, subbot_id: u64, command: &RelayCommand) -> Result<(), RelayError> {
        let connection = self.connection(subbot_id).await?;
        let result = connection.send_command(command, self.reply_timeout).await;
        self.evict_on_disconnect(subbot_id, &result).await;
        result
    }

    /// Reads the next text message a subbot sent.
    pub async fn receive_by_id(&self, subbot_id: u64) -> Result<String, RelayError> {
        let connection = self.connection(subbot_id).await?;
        let result = connection.receive_text(self.reply_timeout).await;
        self.evict_on_disconnect(subbot_id, &result).await;
        result
    }

    /// Relays a command to `amount` subbots, lowest ids first.
    pub async fn send_amount(&self, amount: Amount, command: &RelayCommand) -> BroadcastReport {
        let targets: Vec<(u64, Arc<SubbotConnection>)> = {
            let connections = self.connections.lock().await;
            let count = amount.resolve(connections.len());
            connections
                .iter()
                .take(count)
                .map(|(id, conn)| (*id, conn.clone()))
                .collect()
        };

        let reply_timeout = self.reply_timeout;
        let results = join_all(targets.into_iter().map(|(id, conn)| async move {
            (id, conn.send_command(command, reply_timeout).await)
        }))
        .await;

        let mut report = BroadcastReport::default();
        for (id, result) in results {
            self.evict_on_disconnect(id, &result).await;
            match result {
                Ok(()) => report.delivered.push(id),
                Err(e) => {
                    warn!("Relay: failed to deliver command to subbot {}: {}", id, e);
                    report.failed.push((id, e.to_string()));
                }
            }
        }
        report
    }

    async fn connection(&self, subbot_id: u64) -> Result<Arc<SubbotConnection>, RelayError> {
        self.connections
            .lock()
            .await
            .get(&subbot_id)
            .cloned()
            .ok_or(RelayError::UnknownSubbot(subbot_id))
    }

    /// Drops a dead connection and lets its id authenticate again.
    async fn evict_on_disconnect<T>(&self, subbot_id: u64, result: &Result<T, RelayError>) {
        let Err(e) = result else {
            return;
        };
        if !e.is_disconnect() {
            return;
        }

        if let Some(conn) = self.connections.lock().await.remove(&subbot_id) {
            warn!(
                "Relay: subbot {} ({}) disconnected: {}",
                subbot_id, conn.peer, e
            );
            self.pending_ids.lock().await.insert(subbot_id);
        }
    }
}

impl SubbotConnection {
    async fn send_command(&self, command: &RelayCommand, wait: Duration) -> Result<(), RelayError> {
        let mut channel = self.channel.lock().await;
        let seq = channel.next_seq;
        channel.next_seq += 1;

        // A half-written frame leaves the stream unusable, so a stalled write ends the session
        timeout(wait, write_frame(&mut channel.stream, &Frame::command(seq, command)))
            .await
            .map_err(|_| RelayError::Stalled)??;

        timeout(wait, async {
            loop {
                match read_frame(&mut channel.stream).await? {
                    Frame::Ack { seq: acked } if acked == seq => return Ok(()),
                    Frame::Ack { seq: stale } => debug!("Relay: ignoring stale ack {}", stale),
                    Frame::Text { body } => channel.inbox.push_back(body),
                    other => {
                        return Err(RelayError::UnexpectedFrame {
                            expected: "ack",
                            got: other.kind(),
                        })
                    }
                }
            }
        })
        .await
        .map_err(|_| RelayError::Timeout)?
    }

    async fn receive_text(&self, wait: Duration) -> Result<String, RelayError> {
        let mut channel = self.channel.lock().await;
        if let Some(body) = channel.inbox.pop_front() {
            return Ok(body);
        }

        timeout(wait, async {
            loop {
                match read_frame(&mut channel.stream).await? {
                    Frame::Text { body } => return Ok(body),
                    Frame::Ack { seq } => debug!("Relay: ignoring late ack {}", seq),
                    other => {
                        return Err(RelayError::UnexpectedFrame {
                            expected: "text",
                            got: other.kind(),
                        })
                    }
                }
            }
        })
        .await
        .map_err(|_| RelayError::Timeout)?
    }
}

async fn reject(stream: &mut FramedStream) {
    let frame = Frame::AuthResult {
        accepted: false,
        message: AUTH_FAILED.to_string(),
    };
    if let Err(e) = write_frame(stream, &frame).await {
        debug!("Relay: could not deliver rejection: {}", e);
    }
    let _ = SinkExt::<tokio_util::bytes::Bytes>::close(stream).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::client::SubbotClient;
    use tokio::sync::mpsc;

    const WAIT: Duration = Duration::from_secs(5);

    async fn handler(ids: &[u64]) -> ConnectionHandler {
        ConnectionHandler::bind("127.0.0.1:0".parse().unwrap(), ids.iter().copied(), WAIT)
            .await
            .unwrap()
    }

    async fn connect(handler: &ConnectionHandler, id: u64) -> Result<SubbotClient, RelayError> {
        let addr = handler.local_addr().unwrap();
        let (server, client) = tokio::join!(
            handler.establish_connection(WAIT),
            SubbotClient::connect(addr, id)
        );
        match server {
            Ok(accepted) => assert_eq!(accepted, id),
            Err(e) => assert!(client.is_err(), "server rejected but client accepted: {}", e),
        }
        client
    }

    /// Acknowledges every command and forwards it to the returned channel.
    fn spawn_echo(mut client: SubbotClient) -> mpsc::UnboundedReceiver<RelayCommand> {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            while let Ok(received) = client.next_command().await {
                if client.ack(received.seq).await.is_err() {
                    break;
                }
                let _ = tx.send(received.command);
            }
        });
        rx
    }

    fn command(text: &str) -> RelayCommand {
        RelayCommand {
            channel_id: 100,
            author_id: 200,
            command: text.to_string(),
        }
    }

    #[tokio::test]
    async fn test_expected_id_authenticates_once() {
        let handler = handler(&[1, 2]).await;

        let _first = connect(&handler, 1).await.unwrap();
        assert_eq!(handler.connected_ids().await, vec![1]);
        assert_eq!(handler.pending_ids().await, vec![2]);

        // Same id again while the session is alive
        let err = connect(&handler, 1).await.unwrap_err();
        assert!(matches!(err, RelayError::AuthRejected(1)));

        // Unknown id
        let err = connect(&handler, 99).await.unwrap_err();
        assert!(matches!(err, RelayError::AuthRejected(99)));

        assert_eq!(handler.connected_ids().await, vec![1]);
    }

    #[tokio::test]
    async fn test_establish_connection_times_out() {
        let handler = handler(&[1]).await;
        let err = handler
            .establish_connection(Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::Timeout));
    }

    #[tokio::test]
    async fn test_send_by_unknown_id_is_an_error() {
        let handler = handler(&[1]).await;
        let err = handler.send_by_id(1, &command("hi")).await.unwrap_err();
        assert!(matches!(err, RelayError::UnknownSubbot(1)));
    }

    #[tokio::test]
    async fn test_send_by_id_waits_for_ack() {
        let handler = handler(&[5]).await;
        let client = connect(&handler, 5).await.unwrap();
        let mut received = spawn_echo(client);

        handler.send_by_id(5, &command("first")).await.unwrap();
        handler.send_by_id(5, &command("second")).await.unwrap();

        assert_eq!(received.recv().await.unwrap().command, "first");
        assert_eq!(received.recv().await.unwrap().command, "second");
    }

    #[tokio::test]
    async fn test_send_amount_targets_lowest_ids() {
        let handler = handler(&[3, 1, 2]).await;
        let mut inboxes = BTreeMap::new();
        for id in [2, 3, 1] {
            let client = connect(&handler, id).await.unwrap();
            inboxes.insert(id, spawn_echo(client));
        }

        let report = handler.send_amount(Amount::Count(2), &command("wave")).await;
        assert_eq!(report.delivered, vec![1, 2]);
        assert!(report.failed.is_empty());
        assert_eq!(inboxes.get_mut(&1).unwrap().recv().await.unwrap().command, "wave");
        assert_eq!(inboxes.get_mut(&2).unwrap().recv().await.unwrap().command, "wave");
        assert!(inboxes.get_mut(&3).unwrap().try_recv().is_err());

        let report = handler.send_amount(Amount::All, &command("bow")).await;
        assert_eq!(report.delivered, vec![1, 2, 3]);

        // A count larger than the pool reaches everyone
        let report = handler.send_amount(Amount::Count(10), &command("sit")).await;
        assert_eq!(report.delivered.len(), 3);
    }

    #[tokio::test]
    async fn test_receive_by_id() {
        let handler = handler(&[4]).await;
        let mut client = connect(&handler, 4).await.unwrap();

        client.send_text("ready").await.unwrap();
        assert_eq!(handler.receive_by_id(4).await.unwrap(), "ready");
    }

    #[tokio::test]
    async fn test_dead_connection_is_evicted_and_can_reconnect() {
        let handler = handler(&[7]).await;
        let client = connect(&handler, 7).await.unwrap();
        drop(client);

        let err = handler.send_by_id(7, &command("anyone?")).await.unwrap_err();
        assert!(err.is_disconnect(), "unexpected error: {}", err);
        assert!(handler.connected_ids().await.is_empty());
        assert_eq!(handler.pending_ids().await, vec![7]);

        let client = connect(&handler, 7).await.unwrap();
        let mut received = spawn_echo(client);
        handler.send_by_id(7, &command("welcome back")).await.unwrap();
        assert_eq!(received.recv().await.unwrap().command, "welcome back");
    }

    #[tokio::test]
    async fn test_broadcast_evicts_dropped_subbot() {
        let handler = handler(&[1, 2, 3]).await;
        let mut inboxes = BTreeMap::new();
        for id in [1, 3] {
            let client = connect(&handler, id).await.unwrap();
            inboxes.insert(id, spawn_echo(client));
        }
        let gone = connect(&handler, 2).await.unwrap();
        drop(gone);

        let report = handler.send_amount(Amount::All, &command("roll call")).await;
        assert_eq!(report.delivered, vec![1, 3]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, 2);
        assert_eq!(handler.connected_ids().await, vec![1, 3]);
        assert_eq!(handler.pending_ids().await, vec![2]);
    }

    #[tokio::test]
    async fn test_subbot_that_stops_reading_is_dropped() {
        let handler = ConnectionHandler::bind(
            "127.0.0.1:0".parse().unwrap(),
            [8],
            Duration::from_millis(50),
        )
        .await
        .unwrap();
        // Authenticates, then never reads again
        let _silent = connect(&handler, 8).await.unwrap();
        let bulky = command(&"x".repeat(48 * 1024));

        let outcome = tokio::time::timeout(Duration::from_secs(60), async {
            loop {
                match handler.send_by_id(8, &bulky).await {
                    Err(RelayError::Timeout) => continue,
                    other => return other,
                }
            }
        })
        .await
        .expect("send_by_id hung on a full socket");

        assert!(matches!(outcome, Err(RelayError::Stalled)));
        assert!(handler.connected_ids().await.is_empty());
        assert_eq!(handler.pending_ids().await, vec![8]);
    }
}

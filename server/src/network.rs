//! TCP front end: accept loop and per-connection reader/writer tasks

use crate::orchestrator::MatchOrchestrator;
use crate::session::PeerId;
use log::{debug, error, info, warn};
use shared::framing::{encode_line, LineDecoder};
use shared::{ClientMessage, ServerMessage};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

const READ_BUFFER_SIZE: usize = 4096;

/// Accepts peers and hands each connection its own task.
pub struct Server {
    listener: TcpListener,
    orchestrator: Arc<MatchOrchestrator>,
}

impl Server {
    pub async fn bind(addr: &str, max_peers: usize) -> Result<Self, Box<dyn std::error::Error>> {
        let listener = TcpListener::bind(addr).await?;
        info!("Server listening on {}", listener.local_addr()?);

        Ok(Server {
            listener,
            orchestrator: Arc::new(MatchOrchestrator::new(max_peers)),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn orchestrator(&self) -> Arc<MatchOrchestrator> {
        Arc::clone(&self.orchestrator)
    }

    /// Runs the accept loop until the listener fails.
    pub async fn run(self) -> Result<(), BoxError> {
        loop {
            let (stream, addr) = self.listener.accept().await?;
            debug!("Accepted connection from {}", addr);

            let orchestrator = Arc::clone(&self.orchestrator);
            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, addr, orchestrator).await {
                    error!("Connection {} failed: {}", addr, e);
                }
            });
        }
    }
}

/// Reads the username line, registers the peer, then relays every decoded
/// message to the orchestrator until the stream closes.
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    orchestrator: Arc<MatchOrchestrator>,
) -> Result<(), BoxError> {
    let (mut reader, writer) = stream.into_split();
    let mut decoder = LineDecoder::new();
    let mut buffer = [0u8; READ_BUFFER_SIZE];

    let username = loop {
        if let Some(line) = decoder.next_line() {
            break line;
        }
        let n = reader.read(&mut buffer).await?;
        if n == 0 {
            info!("{} closed before sending a username", addr);
            return Ok(());
        }
        decoder.extend(&buffer[..n]);
    };

    let (tx, rx) = mpsc::unbounded_channel();
    let writer_task = tokio::spawn(write_loop(writer, rx, addr));

    let id = match orchestrator.connect(addr, &username, tx).await {
        Ok(id) => id,
        Err(_) => {
            // The rejection notice is flushed once the writer sees its
            // channel close.
            let _ = writer_task.await;
            return Ok(());
        }
    };

    let result = read_loop(&mut reader, &mut decoder, id, &orchestrator).await;
    orchestrator.disconnect(id).await;
    result
}

async fn read_loop(
    reader: &mut OwnedReadHalf,
    decoder: &mut LineDecoder,
    id: PeerId,
    orchestrator: &MatchOrchestrator,
) -> Result<(), BoxError> {
    let mut buffer = [0u8; READ_BUFFER_SIZE];
    loop {
        while let Some(message) = decoder.next_message::<ClientMessage>() {
            orchestrator.handle_message(id, message).await;
        }

        let n = reader.read(&mut buffer).await?;
        if n == 0 {
            return Ok(());
        }
        decoder.extend(&buffer[..n]);
    }
}

/// Drains the peer's outbound queue onto the socket. Ends when the queue is
/// dropped or a write fails.
async fn write_loop(
    mut writer: OwnedWriteHalf,
    mut rx: mpsc::UnboundedReceiver<ServerMessage>,
    addr: SocketAddr,
) {
    while let Some(message) = rx.recv().await {
        let bytes = match encode_line(&message) {
            Ok(bytes) => bytes,
            Err(e) => {
                error!("Failed to encode {} for {}: {}", message.kind(), addr, e);
                continue;
            }
        };
        if let Err(e) = writer.write_all(&bytes).await {
            warn!("Write to {} failed: {}", addr, e);
            break;
        }
    }
    let _ = writer.shutdown().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::framing::encode_username;
    use tokio::io::{AsyncBufReadExt, BufReader};
    use tokio::net::tcp::OwnedReadHalf as ClientReadHalf;
    use tokio::time::{timeout, Duration};

    async fn spawn_server() -> SocketAddr {
        let server = Server::bind("127.0.0.1:0", 2).await.unwrap();
        let addr = server.local_addr().unwrap();
        tokio::spawn(server.run());
        addr
    }

    async fn next_message(reader: &mut BufReader<ClientReadHalf>) -> ServerMessage {
        let mut line = String::new();
        timeout(Duration::from_secs(2), reader.read_line(&mut line))
            .await
            .expect("timed out waiting for server")
            .unwrap();
        serde_json::from_str(line.trim_end()).unwrap()
    }

    #[tokio::test]
    async fn test_join_receives_lobby() {
        let addr = spawn_server().await;
        let stream = TcpStream::connect(addr).await.unwrap();
        let (read, mut write) = stream.into_split();
        let mut reader = BufReader::new(read);

        write.write_all(&encode_username("alice")).await.unwrap();

        match next_message(&mut reader).await {
            ServerMessage::Lobby { players } => {
                assert_eq!(players.len(), 1);
                assert_eq!(players[0].name, "alice");
                assert!(!players[0].ready);
            }
            other => panic!("Expected lobby, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_duplicate_username_is_rejected_and_closed() {
        let addr = spawn_server().await;
        let first = TcpStream::connect(addr).await.unwrap();
        let (first_read, mut first_write) = first.into_split();
        let mut first_reader = BufReader::new(first_read);
        first_write.write_all(&encode_username("bob")).await.unwrap();
        next_message(&mut first_reader).await;

        let second = TcpStream::connect(addr).await.unwrap();
        let (second_read, mut second_write) = second.into_split();
        let mut second_reader = BufReader::new(second_read);
        second_write.write_all(&encode_username("bob")).await.unwrap();

        assert_eq!(
            next_message(&mut second_reader).await,
            ServerMessage::system("Username bob is already taken")
        );
        let mut rest = String::new();
        let n = timeout(Duration::from_secs(2), second_reader.read_line(&mut rest))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(n, 0);
    }
}

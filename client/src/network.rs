//! Client connection and main loop
//!
//! A receiver task decodes server lines and pushes them into an mpsc queue.
//! Everything else (draining that queue, player commands, gravity and
//! rendering) runs on the single task that owns the [`ClientGame`].

use crate::game::{ClientGame, ClientPhase};
use crate::input::{ClientCommand, HELP};
use crate::rendering::Renderer;
use crate::store::{record_history, ScoreStore};
use log::{debug, error, info, warn};
use shared::framing::{encode_line, encode_username, LineDecoder};
use shared::{ClientMessage, ServerMessage};
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc::{self, error::TryRecvError};
use tokio::time::{interval, sleep, MissedTickBehavior};

const FRAME_INTERVAL: Duration = Duration::from_millis(16);

pub struct Client {
    writer: OwnedWriteHalf,
    inbound: mpsc::UnboundedReceiver<ServerMessage>,
    game: ClientGame,
    renderer: Box<dyn Renderer>,
    store: Box<dyn ScoreStore>,
    dirty: bool,
}

impl Client {
    /// Connects, announces the username and asks for the lobby.
    pub async fn connect(
        server_addr: &str,
        username: &str,
        renderer: Box<dyn Renderer>,
        store: Box<dyn ScoreStore>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        info!("Connecting to {}...", server_addr);
        let stream = TcpStream::connect(server_addr).await?;
        let (reader, mut writer) = stream.into_split();

        writer.write_all(&encode_username(username)).await?;

        let (tx, inbound) = mpsc::unbounded_channel();
        tokio::spawn(receive_loop(reader, tx));

        let mut client = Client {
            writer,
            inbound,
            game: ClientGame::new(username),
            renderer,
            store,
            dirty: true,
        };
        client.send(&ClientMessage::RequestLobby).await?;
        info!("Connected as {}", client.game.username());
        Ok(client)
    }

    pub fn game(&self) -> &ClientGame {
        &self.game
    }

    async fn send(&mut self, message: &ClientMessage) -> Result<(), Box<dyn std::error::Error>> {
        let bytes = encode_line(message)?;
        self.writer.write_all(&bytes).await?;
        debug!("Sent {}", message.kind());
        Ok(())
    }

    async fn send_all(
        &mut self,
        messages: Vec<ClientMessage>,
    ) -> Result<(), Box<dyn std::error::Error>> {
        for message in &messages {
            self.send(message).await?;
        }
        Ok(())
    }

    /// Saves the history gathered during a match once it is over.
    fn persist_if_finished(&mut self, was_over: bool) {
        if was_over || !self.game.is_game_over() {
            return;
        }
        let entries = self.game.take_history();
        let username = self.game.username().to_string();
        if let Err(e) = record_history(self.store.as_ref(), &username, entries) {
            warn!("Failed to save score history: {}", e);
        }
    }

    /// Applies every queued server message and collects the replies. The
    /// flag turns false once the receiver task has gone away.
    fn drain_inbound(&mut self) -> (bool, Vec<ClientMessage>) {
        let mut replies = Vec::new();
        loop {
            match self.inbound.try_recv() {
                Ok(message) => {
                    let was_over = self.game.is_game_over();
                    replies.extend(self.game.apply_server_message(message));
                    self.persist_if_finished(was_over);
                    self.dirty = true;
                }
                Err(TryRecvError::Empty) => return (true, replies),
                Err(TryRecvError::Disconnected) => return (false, replies),
            }
        }
    }

    async fn handle_command(
        &mut self,
        command: ClientCommand,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let was_over = self.game.is_game_over();
        let outbound = match command {
            ClientCommand::Action(action) => self.game.handle_action(action, Instant::now()),
            ClientCommand::ToggleReady => vec![self.game.toggle_ready()],
            ClientCommand::Chat(text) => self.game.chat(&text).into_iter().collect(),
            ClientCommand::RequestLobby => vec![ClientMessage::RequestLobby],
            ClientCommand::RequestRematch => self.game.request_rematch().into_iter().collect(),
            ClientCommand::AcceptRematch => self.game.accept_rematch().into_iter().collect(),
            ClientCommand::DeclineRematch => {
                self.game.decline_rematch();
                Vec::new()
            }
            ClientCommand::Help => {
                eprintln!("{}", HELP);
                Vec::new()
            }
            ClientCommand::Quit => Vec::new(),
        };
        self.persist_if_finished(was_over);
        self.dirty = true;
        self.send_all(outbound).await
    }

    /// Runs until the server closes the connection or a `Quit` command
    /// arrives.
    pub async fn run(
        &mut self,
        mut commands: mpsc::UnboundedReceiver<ClientCommand>,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let mut frame = interval(FRAME_INTERVAL);
        frame.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let gravity = sleep(self.game.gravity_delay());
        tokio::pin!(gravity);

        loop {
            tokio::select! {
                _ = frame.tick() => {
                    let (connected, replies) = self.drain_inbound();
                    self.send_all(replies).await?;
                    if self.dirty {
                        if let Err(e) = self.renderer.render(&self.game) {
                            error!("Render failed: {}", e);
                        }
                        self.dirty = false;
                    }
                    if !connected {
                        info!("Server closed the connection");
                        return Ok(());
                    }
                }
                command = commands.recv() => {
                    match command {
                        None | Some(ClientCommand::Quit) => {
                            info!("Quitting");
                            return Ok(());
                        }
                        Some(command) => self.handle_command(command).await?,
                    }
                }
                _ = &mut gravity => {
                    let was_over = self.game.is_game_over();
                    self.dirty |= self.game.phase() == ClientPhase::Playing;
                    let outbound = self.game.tick(Instant::now());
                    self.persist_if_finished(was_over);
                    self.send_all(outbound).await?;
                    gravity
                        .as_mut()
                        .reset(tokio::time::Instant::now() + self.game.gravity_delay());
                }
            }
        }
    }
}

/// Decodes server lines into the inbound queue until the stream ends.
async fn receive_loop(mut reader: OwnedReadHalf, tx: mpsc::UnboundedSender<ServerMessage>) {
    let mut decoder = LineDecoder::new();
    let mut buffer = [0u8; 4096];
    loop {
        while let Some(message) = decoder.next_message::<ServerMessage>() {
            if tx.send(message).is_err() {
                return;
            }
        }
        match reader.read(&mut buffer).await {
            Ok(0) => return,
            Ok(n) => decoder.extend(&buffer[..n]),
            Err(e) => {
                error!("Error receiving from server: {}", e);
                return;
            }
        }
    }
}

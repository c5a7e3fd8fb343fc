//! Terminal command parsing and the stdin reader task

use log::{debug, warn};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

/// Moves applied to the local board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerAction {
    MoveLeft,
    MoveRight,
    SoftDrop,
    Rotate,
    HardDrop,
    Hold,
}

impl PlayerAction {
    fn from_key(key: char) -> Option<Self> {
        match key {
            'a' => Some(PlayerAction::MoveLeft),
            'd' => Some(PlayerAction::MoveRight),
            's' => Some(PlayerAction::SoftDrop),
            'w' => Some(PlayerAction::Rotate),
            'x' => Some(PlayerAction::HardDrop),
            'c' => Some(PlayerAction::Hold),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCommand {
    Action(PlayerAction),
    ToggleReady,
    Chat(String),
    RequestLobby,
    RequestRematch,
    AcceptRematch,
    DeclineRematch,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    #[error("Unknown command: {0} (type 'help')")]
    Unknown(String),
    #[error("Nothing to say")]
    EmptyChat,
}

pub const HELP: &str = "keys: a/d move, s soft drop, w rotate, x hard drop, c hold \
(combine e.g. 'aaw'); commands: ready, say <text>, lobby, rematch, accept, decline, quit";

/// Parses one line of terminal input. A line made only of movement keys
/// expands into one action per key, so `aaax` moves left three times and
/// hard drops.
pub fn parse_line(line: &str) -> Result<Vec<ClientCommand>, InputError> {
    let line = line.trim();
    let lower = line.to_lowercase();

    let (word, rest) = line
        .split_once(char::is_whitespace)
        .map_or((line, ""), |(word, rest)| (word, rest.trim()));
    if matches!(word.to_lowercase().as_str(), "say" | "/chat") {
        if rest.is_empty() {
            return Err(InputError::EmptyChat);
        }
        return Ok(vec![ClientCommand::Chat(rest.to_string())]);
    }

    let command = match lower.as_str() {
        "" => return Ok(Vec::new()),
        "left" => ClientCommand::Action(PlayerAction::MoveLeft),
        "right" => ClientCommand::Action(PlayerAction::MoveRight),
        "down" => ClientCommand::Action(PlayerAction::SoftDrop),
        "rotate" | "up" => ClientCommand::Action(PlayerAction::Rotate),
        "drop" => ClientCommand::Action(PlayerAction::HardDrop),
        "hold" => ClientCommand::Action(PlayerAction::Hold),
        "r" | "ready" => ClientCommand::ToggleReady,
        "lobby" => ClientCommand::RequestLobby,
        "rematch" => ClientCommand::RequestRematch,
        "accept" => ClientCommand::AcceptRematch,
        "decline" => ClientCommand::DeclineRematch,
        "help" | "?" => ClientCommand::Help,
        "q" | "quit" | "exit" => ClientCommand::Quit,
        keys => {
            return keys
                .chars()
                .map(|key| PlayerAction::from_key(key).map(ClientCommand::Action))
                .collect::<Option<Vec<_>>>()
                .ok_or_else(|| InputError::Unknown(line.to_string()));
        }
    };
    Ok(vec![command])
}

/// Reads stdin line by line and forwards parsed commands. Ends on EOF or
/// when the receiving side is gone.
pub fn spawn_stdin_reader(tx: mpsc::UnboundedSender<ClientCommand>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => {
                    debug!("stdin closed");
                    let _ = tx.send(ClientCommand::Quit);
                    return;
                }
                Err(e) => {
                    warn!("Failed to read stdin: {}", e);
                    return;
                }
            };

            match parse_line(&line) {
                Ok(commands) => {
                    for command in commands {
                        if tx.send(command).is_err() {
                            return;
                        }
                    }
                }
                Err(e) => eprintln!("{}", e),
            }
        }
    })
}

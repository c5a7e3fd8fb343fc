//! Display side of the client
//!
//! The main loop hands a [`ClientGame`] to a [`Renderer`] once per frame in
//! which something changed. `TextRenderer` draws both boards side by side as
//! plain text; anything richer plugs in behind the same trait.

use crate::game::{ClientGame, ClientPhase, RematchStatus};
use shared::{Board, GameResult, Piece, PieceColor, COLUMNS, ROWS};
use std::io::{self, Write};

/// Chat lines shown under the boards.
const VISIBLE_CHAT_LINES: usize = 5;
const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";

pub trait Renderer {
    fn render(&mut self, game: &ClientGame) -> io::Result<()>;
}

pub struct TextRenderer<W: Write> {
    out: W,
    clear_screen: bool,
}

impl TextRenderer<io::Stdout> {
    pub fn stdout() -> Self {
        Self {
            out: io::stdout(),
            clear_screen: true,
        }
    }
}

impl<W: Write> TextRenderer<W> {
    /// Renderer that writes frames without terminal escape codes.
    pub fn new(out: W) -> Self {
        Self {
            out,
            clear_screen: false,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Renderer for TextRenderer<W> {
    fn render(&mut self, game: &ClientGame) -> io::Result<()> {
        let frame = render_frame(game);
        if self.clear_screen {
            write!(self.out, "{}", CLEAR_SCREEN)?;
        }
        write!(self.out, "{}", frame)?;
        self.out.flush()
    }
}

fn color_char(color: PieceColor) -> char {
    match color {
        PieceColor::Purple => 'P',
        PieceColor::Cyan => 'C',
        PieceColor::Yellow => 'Y',
        PieceColor::Green => 'G',
        PieceColor::Red => 'R',
        PieceColor::Orange => 'O',
    }
}

/// One string per board row; the falling piece is drawn as `@`.
pub fn board_lines(board: &Board, piece: Option<&Piece>) -> Vec<String> {
    let mut grid: Vec<Vec<char>> = board
        .rows()
        .iter()
        .map(|row| {
            row.iter()
                .map(|cell| cell.map_or('.', color_char))
                .collect()
        })
        .collect();

    if let Some(piece) = piece {
        for (x, y) in piece.cells() {
            if x < 0 || y < 0 {
                continue;
            }
            if let Some(slot) = grid.get_mut(y as usize).and_then(|row| row.get_mut(x as usize)) {
                *slot = '@';
            }
        }
    }

    grid.into_iter().map(|row| row.into_iter().collect()).collect()
}

pub fn render_frame(game: &ClientGame) -> String {
    let mut out = String::new();
    let engine = game.engine();

    let status = match game.phase() {
        ClientPhase::Lobby if game.is_ready() => "LOBBY (ready)".to_string(),
        ClientPhase::Lobby => "LOBBY (type 'ready')".to_string(),
        ClientPhase::Playing => "PLAYING".to_string(),
        ClientPhase::GameOver(GameResult::Win) => "YOU WIN!".to_string(),
        ClientPhase::GameOver(GameResult::Lose) => "YOU LOSE!".to_string(),
    };
    out.push_str(&format!("{} | {}\n", game.username(), status));

    if game.phase() == ClientPhase::Lobby {
        for player in game.lobby() {
            let mark = if player.ready { "x" } else { " " };
            out.push_str(&format!("  [{}] {}\n", mark, player.name));
        }
    } else {
        let opponent = game.opponent();
        let own = board_lines(engine.board(), Some(engine.current_piece()));
        let theirs = match &opponent.snapshot {
            Some(snapshot) => board_lines(&snapshot.board, Some(&snapshot.current_piece)),
            None => board_lines(&Board::new(), None),
        };

        out.push_str(&format!(
            "score {:<8} level {:<3}   {} {}\n",
            engine.score(),
            engine.level(),
            opponent.name.as_deref().unwrap_or("opponent"),
            opponent.score
        ));
        for (mine, other) in own.iter().zip(theirs.iter()) {
            out.push_str(&format!("|{}|   |{}|\n", mine, other));
        }

        let next: Vec<String> = engine
            .next_queue()
            .iter()
            .map(|piece| color_char(piece.color).to_string())
            .collect();
        let held = engine
            .held_piece()
            .map_or("-".to_string(), |piece| color_char(piece.color).to_string());
        out.push_str(&format!("next {}  hold {}\n", next.join(" "), held));
    }

    match game.rematch_status() {
        RematchStatus::Idle => {}
        RematchStatus::Requested => out.push_str("Waiting for opponent...\n"),
        RematchStatus::Incoming { from } => {
            out.push_str(&format!("{} wants a rematch! (accept/decline)\n", from))
        }
    }
    if let Some(message) = game.system_message() {
        out.push_str(&format!("SYSTEM: {}\n", message));
    }

    let chat = game.chat_log();
    for line in chat.iter().skip(chat.len().saturating_sub(VISIBLE_CHAT_LINES)) {
        out.push_str(&format!("{}: {}\n", line.from, line.message));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{BoardEngine, LobbyPlayer, ServerMessage, Shape};

    #[test]
    fn test_board_lines_draw_cells_and_piece() {
        let mut board = Board::new();
        board.set(0, ROWS - 1, Some(PieceColor::Red));
        let piece = Piece::new(Shape::from_bits(&[&[1, 1], &[1, 1]]), PieceColor::Yellow);

        let lines = board_lines(&board, Some(&piece));
        assert_eq!(lines.len(), ROWS);
        assert_eq!(lines[0], "....@@....");
        assert_eq!(lines[ROWS - 1], "R.........");
    }

    #[test]
    fn test_piece_below_floor_is_not_drawn() {
        let mut piece = Piece::new(Shape::from_bits(&[&[1]]), PieceColor::Red);
        piece.x = COLUMNS as i32;
        piece.y = ROWS as i32;
        let lines = board_lines(&Board::new(), Some(&piece));
        assert!(lines.iter().all(|line| !line.contains('@')));
    }

    #[test]
    fn test_short_relayed_board_never_reaches_the_view() {
        let line = format!(
            "{{\"type\":\"board\",\"board\":[[{}]],\"current_piece\":\
             {{\"shape\":[[true]],\"color\":\"red\",\"x\":0,\"y\":5}}}}\n",
            vec!["null"; COLUMNS].join(",")
        );
        let mut decoder = shared::LineDecoder::new();
        decoder.extend(line.as_bytes());
        assert_eq!(decoder.next_message::<ServerMessage>(), None);

        let mut game = ClientGame::with_engine("alice", BoardEngine::with_seed(1));
        game.apply_server_message(ServerMessage::Start);
        assert!(game.opponent().snapshot.is_none());
        assert!(render_frame(&game).contains("PLAYING"));
    }

    #[test]
    fn test_lobby_frame_lists_players() {
        let mut game = ClientGame::with_engine("alice", BoardEngine::with_seed(1));
        game.apply_server_message(ServerMessage::Lobby {
            players: vec![
                LobbyPlayer { name: "bob".to_string(), ready: false },
                LobbyPlayer { name: "alice".to_string(), ready: true },
            ],
        });
        let frame = render_frame(&game);
        assert!(frame.starts_with("alice | LOBBY (ready)"));
        assert!(frame.contains("[ ] bob"));
        assert!(frame.contains("[x] alice"));
    }

    #[test]
    fn test_playing_frame_has_two_boards() {
        let mut game = ClientGame::with_engine("alice", BoardEngine::with_seed(1));
        game.apply_server_message(ServerMessage::Start);
        let mut renderer = TextRenderer::new(Vec::new());
        renderer.render(&game).unwrap();

        let text = String::from_utf8(renderer.into_inner()).unwrap();
        let board_rows = text.lines().filter(|l| l.starts_with('|')).count();
        assert_eq!(board_rows, ROWS);
        assert!(text.contains("next "));
    }
}

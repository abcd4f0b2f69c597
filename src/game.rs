//! Authoritative game state and tick logic
//!
//! The server owns one `Game`. Intents from clients and the periodic tick are
//! the only inputs; every state change is pushed out through the injected
//! broadcaster so replicas can follow along.

use crate::board::Grid;
use crate::error::{GameError, ProtocolError};
use crate::piece::FallingPiece;
use crate::player::{PlayerId, PlayerInfo, Players};
use crate::protocol::Message;
use crate::score::{self, DEFAULT_POINTS_PER_LINE};
use crate::tetromino::{RotationDirection, ShapeFactory};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Sends a message to every connected client
pub type Broadcaster = Box<dyn FnMut(Message) + Send>;

/// Called once the game has been reset after a game over
pub type GameOverHook = Box<dyn FnMut() + Send>;

/// The server-side game
pub struct Game {
    /// Placed cells shared by everybody
    grid: Grid,
    /// Connected players and their falling pieces
    players: Players,
    /// Random shape source for spawns
    shapes: ShapeFactory,
    points_per_line: i64,
    broadcast: Broadcaster,
    on_game_over: GameOverHook,
}

impl Game {
    /// Create a game on the given grid
    pub fn new(grid: Grid, broadcast: Broadcaster, on_game_over: GameOverHook) -> Self {
        Self {
            grid,
            players: Players::new(),
            shapes: ShapeFactory::new(),
            points_per_line: DEFAULT_POINTS_PER_LINE,
            broadcast,
            on_game_over,
        }
    }

    /// Use a deterministic shape sequence
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.shapes = ShapeFactory::with_seed(seed);
        self
    }

    pub fn with_points_per_line(mut self, points: i64) -> Self {
        self.points_per_line = points;
        self
    }

    #[cfg(test)]
    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn players(&self) -> &Players {
        &self.players
    }

    /// Falling piece of a player, if both exist
    #[cfg(test)]
    pub fn falling_piece(&self, id: PlayerId) -> Option<&FallingPiece> {
        self.players.piece(id)
    }

    fn send(&mut self, msg: Message) {
        (self.broadcast)(msg);
    }

    /// Messages that bring a fresh connection up to date
    pub fn snapshot_messages(&self) -> Vec<Message> {
        let mut messages = Vec::with_capacity(self.players.len() + 1);
        messages.push(Message::update_grid(&self.grid));
        messages.extend(self.players.iter().map(Message::set_player));
        messages
    }

    /// Current total score of every player
    pub fn total_scores(&self) -> BTreeMap<PlayerId, i64> {
        score::total_scores(&self.players, &self.grid, self.points_per_line)
    }

    /// Register a new player and give them a piece.
    /// Does nothing if the id is already taken.
    pub fn introduce_new_player(&mut self, player: PlayerInfo) -> Result<(), GameError> {
        if self.players.contains(player.id) {
            debug!("Player {} already in game, ignoring join", player.id);
            return Ok(());
        }
        let id = player.id;
        info!("Player {} joined", id);
        self.players.upsert(player);
        self.spawn_piece(id)
    }

    /// Move a player's piece to an absolute column, if it fits there
    pub fn move_shape(&mut self, id: PlayerId, col: i32) {
        let Some(player) = self.players.get_mut(id) else {
            debug!("Player {} does not exist; cannot move", id);
            return;
        };
        let Some(piece) = player.piece.as_mut() else {
            debug!("Player {} has no piece; cannot move", id);
            return;
        };
        if !self.grid.test_shape_at(piece, piece.row, col, piece.rotation) {
            return;
        }
        piece.col = col;
        let msg = Message::set_player(player);
        self.send(msg);
    }

    /// Rotate a player's piece one step, if the new rotation fits
    pub fn rotate_shape(&mut self, id: PlayerId, direction: RotationDirection) {
        let Some(player) = self.players.get_mut(id) else {
            debug!("Player {} does not exist; cannot rotate", id);
            return;
        };
        let Some(piece) = player.piece.as_mut() else {
            debug!("Player {} has no piece; cannot rotate", id);
            return;
        };
        let rotation = direction.apply(piece.rotation);
        if !self.grid.test_shape_at(piece, piece.row, piece.col, rotation) {
            return;
        }
        piece.rotation = rotation;
        let msg = Message::set_player(player);
        self.send(msg);
    }

    /// Drop a player's piece, place it, clear rows and hand out new pieces.
    ///
    /// Besides the slamming player, every other player whose piece now
    /// overlaps the grid gets a replacement in the same call.
    pub fn slam_shape(&mut self, id: PlayerId) -> Result<(), GameError> {
        let Some(player) = self.players.get_mut(id) else {
            debug!("Cannot find player {}; ignoring slam", id);
            return Ok(());
        };
        let Some(piece) = player.piece.as_mut() else {
            debug!("Player {} has no piece; ignoring slam", id);
            return Ok(());
        };

        self.grid.slam_shape(piece)?;
        let cleared = self.grid.clear_full_rows();
        player.cleared_lines += cleared as u32;
        if cleared > 0 {
            debug!("Player {} cleared {} rows", id, cleared);
        }
        let msg = Message::update_grid(&self.grid);
        self.send(msg);

        self.spawn_piece(id)?;

        for other in self.players.ids() {
            if other == id {
                continue;
            }
            let overlaps = self
                .players
                .piece(other)
                .is_some_and(|piece| !self.grid.test_shape(piece));
            if overlaps {
                debug!("Piece of player {} invalidated by slam of {}", other, id);
                self.spawn_piece(other)?;
            }
        }
        Ok(())
    }

    /// Advance one tick: every piece falls one row, grounded pieces land
    pub fn step(&mut self) -> Result<(), GameError> {
        let mut landing = Vec::new();

        for id in self.players.ids() {
            let Some(player) = self.players.get_mut(id) else {
                continue;
            };
            let Some(piece) = player.piece.as_mut() else {
                continue;
            };
            if self.grid.test_shape_at(piece, piece.row + 1, piece.col, piece.rotation) {
                piece.row += 1;
                let msg = Message::set_player(player);
                self.send(msg);
            } else {
                landing.push(piece.clone());
            }
        }

        for piece in landing {
            if self.grid.test_shape(&piece) {
                self.slam_shape(piece.player_id)?;
            } else {
                debug!(
                    "Piece of player {} no longer fits, assuming an earlier slam replaced it",
                    piece.player_id
                );
            }
        }
        Ok(())
    }

    /// Dispatch an intent sent by a player
    pub fn on_message(&mut self, id: PlayerId, msg: Message) -> Result<(), GameError> {
        match msg {
            Message::Rotate(direction) => self.rotate_shape(id, direction),
            Message::Move(col) => self.move_shape(id, col),
            Message::Slam => self.slam_shape(id)?,
            other => return Err(ProtocolError::UnexpectedIntent(other.kind()).into()),
        }
        Ok(())
    }

    /// Remove a player. Their placed cells stay on the grid.
    pub fn quit(&mut self, id: PlayerId) {
        info!("Player {} left", id);
        self.players.remove(id);
        self.send(Message::RemovePlayer(id));
    }

    /// Announce the end of the game and reset everything
    pub fn game_over(&mut self) {
        info!("Game over with {} players, scores {:?}", self.players.len(), self.total_scores());
        self.send(Message::GameOver);
        self.players.clear();
        self.grid.clear();
        (self.on_game_over)();
    }

    /// Give a player a fresh piece at the top centre.
    /// Ends the game if the piece does not fit.
    fn spawn_piece(&mut self, id: PlayerId) -> Result<(), GameError> {
        let col = (self.grid.width() / 2) as i32;
        let piece = FallingPiece::new(self.shapes.next(), id, col, 0, 0);
        let fits = self.grid.test_shape(&piece);

        let player = self.players.get_mut(id).ok_or(GameError::UnknownPlayer(id))?;
        player.piece = Some(piece);
        let msg = Message::set_player(player);
        self.send(msg);

        if !fits {
            info!("Player {} cannot spawn, ending game", id);
            self.game_over();
        }
        Ok(())
    }
}

//! Client-side mirror of the authoritative game
//!
//! The replica enforces no rules. It only applies what the server broadcasts.

use crate::board::Grid;
use crate::error::ProtocolError;
use crate::player::{PlayerId, Players};
use crate::protocol::Message;
use crate::score::{self, DEFAULT_POINTS_PER_LINE, GameOutcome};
use std::collections::BTreeMap;
use tracing::debug;

/// What applying a message changed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplicaEvent {
    /// The server assigned us an id, the replica starts over
    Joined(PlayerId),
    PlayerUpdated(PlayerId),
    PlayerRemoved(PlayerId),
    GridUpdated,
    GameOver(GameOutcome),
    /// Message ignored (intent kinds, or anything after game over)
    Ignored,
}

/// Read-only copy of the players and grid, fed by server messages
#[derive(Debug, Clone)]
pub struct Replica {
    players: Players,
    grid: Grid,
    /// Our own id, once the server told us
    local_id: Option<PlayerId>,
    points_per_line: i64,
    finished: bool,
}

impl Default for Replica {
    fn default() -> Self {
        Self::new()
    }
}

impl Replica {
    /// Empty replica; the grid is replaced by the first grid update
    pub fn new() -> Self {
        Self {
            players: Players::new(),
            grid: Grid::new(0, 0),
            local_id: None,
            points_per_line: DEFAULT_POINTS_PER_LINE,
            finished: false,
        }
    }

    pub fn with_points_per_line(mut self, points: i64) -> Self {
        self.points_per_line = points;
        self
    }

    pub fn players(&self) -> &Players {
        &self.players
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn local_id(&self) -> Option<PlayerId> {
        self.local_id
    }

    /// Whether a game over was received and no new join happened since
    #[cfg(test)]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Scores computed from the local copy, same rule as the server
    pub fn total_scores(&self) -> BTreeMap<PlayerId, i64> {
        score::total_scores(&self.players, &self.grid, self.points_per_line)
    }

    /// Apply one message from the server
    pub fn on_message(&mut self, msg: &Message) -> Result<ReplicaEvent, ProtocolError> {
        if let Message::Join(id) = msg {
            self.players.clear();
            self.grid.clear();
            self.local_id = Some(*id);
            self.finished = false;
            return Ok(ReplicaEvent::Joined(*id));
        }
        if self.finished {
            debug!("Replica finished, ignoring {}", msg.kind());
            return Ok(ReplicaEvent::Ignored);
        }

        let event = match msg {
            Message::SetPlayer(payload) => {
                let player = payload.player()?;
                let id = player.id;
                self.players.upsert(player);
                ReplicaEvent::PlayerUpdated(id)
            }
            Message::RemovePlayer(id) => {
                self.players.remove(*id);
                ReplicaEvent::PlayerRemoved(*id)
            }
            Message::UpdateGrid(payload) => {
                self.grid = payload.grid()?;
                ReplicaEvent::GridUpdated
            }
            Message::GameOver => {
                let outcome = GameOutcome::from_scores(&self.total_scores());
                self.finished = true;
                ReplicaEvent::GameOver(outcome)
            }
            Message::Rotate(_) | Message::Move(_) | Message::Slam | Message::Join(_) => {
                debug!("Replica ignoring {}", msg.kind());
                ReplicaEvent::Ignored
            }
        };
        Ok(event)
    }
}

//! Per-player state and the container holding it

use crate::piece::FallingPiece;
use std::collections::BTreeMap;

pub type PlayerId = u32;

/// State of one connected player
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerInfo {
    pub id: PlayerId,
    /// Current falling piece, if any
    pub piece: Option<FallingPiece>,
    /// Rows this player's slams have cleared
    pub cleared_lines: u32,
}

impl PlayerInfo {
    pub fn new(id: PlayerId) -> Self {
        Self {
            id,
            piece: None,
            cleared_lines: 0,
        }
    }

    pub fn with_piece(id: PlayerId, piece: Option<FallingPiece>, cleared_lines: u32) -> Self {
        Self {
            id,
            piece,
            cleared_lines,
        }
    }
}

/// All players of a game, keyed by id
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Players {
    records: BTreeMap<PlayerId, PlayerInfo>,
}

impl Players {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains(&self, id: PlayerId) -> bool {
        self.records.contains_key(&id)
    }

    pub fn get(&self, id: PlayerId) -> Option<&PlayerInfo> {
        self.records.get(&id)
    }

    pub fn get_mut(&mut self, id: PlayerId) -> Option<&mut PlayerInfo> {
        self.records.get_mut(&id)
    }

    /// Insert or replace a record
    pub fn upsert(&mut self, player: PlayerInfo) {
        self.records.insert(player.id, player);
    }

    pub fn remove(&mut self, id: PlayerId) -> Option<PlayerInfo> {
        self.records.remove(&id)
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Falling piece of a player, if both exist
    pub fn piece(&self, id: PlayerId) -> Option<&FallingPiece> {
        self.get(id)?.piece.as_ref()
    }

    pub fn ids(&self) -> Vec<PlayerId> {
        self.records.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PlayerInfo> {
        self.records.values()
    }
}

//! Scoring: cleared rows earn points, blocks left on the grid cost points

use crate::board::Grid;
use crate::player::{PlayerId, Players};
use std::collections::BTreeMap;

/// Points per cleared row when nothing else is configured
pub const DEFAULT_POINTS_PER_LINE: i64 = 10;

/// Total score of every player who is connected or still owns cells.
///
/// A player's total is `cleared_lines * points_per_line` minus the number of
/// cells they own on the grid. Players who left but still own cells show up
/// with a negative total.
pub fn total_scores(players: &Players, grid: &Grid, points_per_line: i64) -> BTreeMap<PlayerId, i64> {
    let mut scores: BTreeMap<PlayerId, i64> = grid
        .blocks_per_player()
        .into_iter()
        .map(|(id, blocks)| (id, -(blocks as i64)))
        .collect();
    for player in players.iter() {
        *scores.entry(player.id).or_insert(0) += i64::from(player.cleared_lines) * points_per_line;
    }
    scores
}

/// Scores sorted best first, ties broken by lower id
pub fn standings(scores: &BTreeMap<PlayerId, i64>) -> Vec<(PlayerId, i64)> {
    let mut ranked: Vec<_> = scores.iter().map(|(&id, &score)| (id, score)).collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    ranked
}

/// Final result of a game as seen by a client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameOutcome {
    /// Best player and their score, None if nobody was scored
    pub winner: Option<(PlayerId, i64)>,
    pub standings: Vec<(PlayerId, i64)>,
}

impl GameOutcome {
    pub fn from_scores(scores: &BTreeMap<PlayerId, i64>) -> Self {
        let standings = standings(scores);
        Self {
            winner: standings.first().copied(),
            standings,
        }
    }

    /// One line summary for logs
    pub fn summary(&self) -> String {
        match self.winner {
            Some((id, score)) => format!("player {} wins with {} points", id, score),
            None => "game over, nobody scored".to_string(),
        }
    }
}

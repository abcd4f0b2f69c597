//! Minimal client that follows a running game through a [`Replica`]
//!
//! The server seats every connection, so the watcher holds a player slot
//! whose pieces fall under gravity until the game ends.

use crate::error::ProtocolError;
use crate::protocol::decode_message;
use crate::replica::{Replica, ReplicaEvent};
use crate::score::GameOutcome;
use futures::{SinkExt, StreamExt};
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};
use tracing::{debug, info, warn};

/// Follow the game at `url` until it ends or the server hangs up.
/// Returns the outcome if a game over was seen.
///
/// A frame that cannot be decoded or applied ends the watch with an error.
pub async fn watch(url: &str, points_per_line: i64) -> anyhow::Result<Option<GameOutcome>> {
    let (ws_stream, _) = connect_async(url).await?;
    info!("Connected to {}", url);
    let (mut ws_tx, mut ws_rx) = ws_stream.split();
    let mut replica = Replica::new().with_points_per_line(points_per_line);

    while let Some(frame) = ws_rx.next().await {
        let text = match frame? {
            WsMessage::Text(text) => text,
            WsMessage::Close(_) => break,
            _ => continue,
        };
        if let Some(outcome) = apply_frame(&mut replica, &text)? {
            let _ = ws_tx.close().await;
            return Ok(Some(outcome));
        }
    }

    warn!("Server closed the connection before game over");
    Ok(None)
}

/// Decode one frame into the replica, returning the outcome once the game ends
fn apply_frame(replica: &mut Replica, text: &str) -> Result<Option<GameOutcome>, ProtocolError> {
    let msg = decode_message(text)?;
    match replica.on_message(&msg)? {
        ReplicaEvent::Joined(id) => info!("Seated as player {}", id),
        ReplicaEvent::PlayerUpdated(id) => debug!("Player {} updated", id),
        ReplicaEvent::PlayerRemoved(id) => {
            info!("Player {} left, {} remaining", id, replica.players().len());
        }
        ReplicaEvent::GridUpdated => {
            let placed: usize = replica.grid().blocks_per_player().values().sum();
            debug!("Grid updated, {} cells placed, scores {:?}", placed, replica.total_scores());
        }
        ReplicaEvent::GameOver(outcome) => {
            info!("Game over as player {:?}: {}", replica.local_id(), outcome.summary());
            return Ok(Some(outcome));
        }
        ReplicaEvent::Ignored => {}
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{Message, encode_message};

    fn frame(msg: &Message) -> String {
        encode_message(msg).unwrap()
    }

    #[test]
    fn test_game_over_frame_yields_outcome() {
        let mut replica = Replica::new();
        assert_eq!(apply_frame(&mut replica, &frame(&Message::Join(3))).unwrap(), None);
        let outcome = apply_frame(&mut replica, &frame(&Message::GameOver)).unwrap();
        assert_eq!(outcome.map(|o| o.winner), Some(None));
    }

    #[test]
    fn test_undecodable_frame_is_an_error() {
        let mut replica = Replica::new();
        let result = apply_frame(&mut replica, r#"{"type":"NopeMessage"}"#);
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }

    #[test]
    fn test_malformed_payload_is_an_error() {
        let mut replica = Replica::new();
        let text = r#"{"type":"UpdateGridMessage","data":{"width":2,"height":1,"map":[[-1]]}}"#;
        let result = apply_frame(&mut replica, text);
        assert!(matches!(result, Err(ProtocolError::MalformedGrid { width: 2, height: 1 })));
    }
}

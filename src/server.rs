//! WebSocket server driving the authoritative game
//!
//! Flow:
//! 1. Every accepted socket gets a connection task
//! 2. Connection tasks forward frames to the single game task over a channel
//! 3. The game task owns the `Game`, handles events and ticks one at a time
//! 4. Broadcasts are queued by the game and fanned out to every connection
//!
//! On game over the session is reset: all sockets are closed and player ids
//! start again from 1.

use crate::board::Grid;
use crate::error::GameError;
use crate::game::Game;
use crate::player::{PlayerId, PlayerInfo};
use crate::protocol::{Message, decode_message, encode_message};
use crate::settings::Settings;
use futures::{SinkExt, StreamExt};
use std::collections::BTreeMap;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{MissedTickBehavior, interval};
use tokio_tungstenite::{accept_async, tungstenite::Message as WsMessage};
use tracing::{debug, error, info, warn};

/// Identifies one socket for its whole lifetime, never reused
pub type ConnectionId = u64;

/// Events sent from connection tasks to the game task
#[derive(Debug)]
pub enum NetEvent {
    /// A socket finished its handshake
    Connected {
        outbound: mpsc::UnboundedSender<String>,
        reply: oneshot::Sender<ConnectionId>,
    },
    /// A text frame arrived
    Frame { conn: ConnectionId, text: String },
    /// The socket closed
    Disconnected { conn: ConnectionId },
}

/// What the game queued for the transport
#[derive(Debug)]
enum Outbound {
    Broadcast(Message),
    Reset,
}

struct Connection {
    player: PlayerId,
    outbound: mpsc::UnboundedSender<String>,
}

/// Live connections and the player id counter
pub struct Session {
    next_player: PlayerId,
    next_connection: ConnectionId,
    connections: BTreeMap<ConnectionId, Connection>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            next_player: 1,
            next_connection: 1,
            connections: BTreeMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Track a new socket and assign its player id
    pub fn register(&mut self, outbound: mpsc::UnboundedSender<String>) -> (ConnectionId, PlayerId) {
        let conn = self.next_connection;
        let player = self.next_player;
        self.next_connection += 1;
        self.next_player += 1;
        self.connections.insert(conn, Connection { player, outbound });
        (conn, player)
    }

    /// Forget a socket, returning the player it carried
    pub fn unregister(&mut self, conn: ConnectionId) -> Option<PlayerId> {
        self.connections.remove(&conn).map(|c| c.player)
    }

    pub fn player_of(&self, conn: ConnectionId) -> Option<PlayerId> {
        self.connections.get(&conn).map(|c| c.player)
    }

    /// Send to one socket
    pub fn send_to(&self, conn: ConnectionId, msg: &Message) {
        let Some(connection) = self.connections.get(&conn) else {
            return;
        };
        match encode_message(msg) {
            Ok(text) => {
                let _ = connection.outbound.send(text);
            }
            Err(e) => warn!("Dropping {}: {}", msg.kind(), e),
        }
    }

    /// Send to every socket. Delivery is not confirmed.
    pub fn broadcast(&self, msg: &Message) {
        let text = match encode_message(msg) {
            Ok(text) => text,
            Err(e) => {
                warn!("Dropping {}: {}", msg.kind(), e);
                return;
            }
        };
        for connection in self.connections.values() {
            let _ = connection.outbound.send(text.clone());
        }
    }

    /// Close every socket and restart player ids
    pub fn reset(&mut self) {
        info!("Resetting session, closing {} connections", self.connections.len());
        self.connections.clear();
        self.next_player = 1;
    }
}

/// Game plus transport state, owned by the game task
pub struct Arena {
    game: Game,
    session: Session,
    outbound: mpsc::UnboundedReceiver<Outbound>,
}

impl Arena {
    pub fn new(settings: &Settings) -> Self {
        let (tx, outbound) = mpsc::unbounded_channel();
        let reset_tx = tx.clone();
        let game = Game::new(
            Grid::new(settings.game.cols, settings.game.rows),
            Box::new(move |msg: Message| {
                let _ = tx.send(Outbound::Broadcast(msg));
            }),
            Box::new(move || {
                let _ = reset_tx.send(Outbound::Reset);
            }),
        )
        .with_points_per_line(settings.game.points_per_line);
        let game = match settings.game.seed {
            Some(seed) => game.with_seed(seed),
            None => game,
        };
        Self {
            game,
            session: Session::new(),
            outbound,
        }
    }

    #[cfg(test)]
    pub fn game(&self) -> &Game {
        &self.game
    }

    #[cfg(test)]
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// One gravity step
    pub fn tick(&mut self) {
        let result = self.game.step();
        self.settle(result, None);
        self.flush();
    }

    pub fn handle(&mut self, event: NetEvent) {
        match event {
            NetEvent::Connected { outbound, reply } => {
                let (conn, id) = self.session.register(outbound);
                if reply.send(conn).is_err() {
                    self.session.unregister(conn);
                    return;
                }
                info!(
                    "Connection {} is player {} ({} connected, {} playing)",
                    conn,
                    id,
                    self.session.len(),
                    self.game.players().len()
                );
                self.session.send_to(conn, &Message::Join(id));
                for msg in self.game.snapshot_messages() {
                    self.session.send_to(conn, &msg);
                }
                let result = self.game.introduce_new_player(PlayerInfo::new(id));
                self.settle(result, Some(conn));
            }
            NetEvent::Frame { conn, text } => {
                let Some(id) = self.session.player_of(conn) else {
                    debug!("Frame from closed connection {}, ignoring", conn);
                    return;
                };
                let result = decode_message(&text)
                    .map_err(GameError::from)
                    .and_then(|msg| self.game.on_message(id, msg));
                self.settle(result, Some(conn));
            }
            NetEvent::Disconnected { conn } => {
                if let Some(id) = self.session.unregister(conn) {
                    info!("Connection {} closed", conn);
                    self.game.quit(id);
                }
            }
        }
        self.flush();
    }

    /// Protocol violations drop the sender; invariant violations end the game
    fn settle(&mut self, result: Result<(), GameError>, conn: Option<ConnectionId>) {
        match result {
            Ok(()) => {}
            Err(GameError::Protocol(e)) => {
                warn!("Protocol violation on connection {:?}: {}", conn, e);
                if let Some(id) = conn.and_then(|c| self.session.unregister(c)) {
                    self.game.quit(id);
                }
            }
            Err(e) => {
                error!("Invariant violation, ending game: {}", e);
                self.game.game_over();
            }
        }
    }

    /// Deliver everything the game queued, in order
    fn flush(&mut self) {
        while let Ok(out) = self.outbound.try_recv() {
            match out {
                Outbound::Broadcast(msg) => self.session.broadcast(&msg),
                Outbound::Reset => self.session.reset(),
            }
        }
    }
}

/// Bind, accept sockets and run the game until the process stops
pub async fn run(settings: Settings) -> anyhow::Result<()> {
    let addr = settings.server.socket_addr().map_err(anyhow::Error::msg)?;
    let listener = TcpListener::bind(addr).await?;
    info!(
        "Listening on ws://{} ({}x{}, step {}ms)",
        addr, settings.game.cols, settings.game.rows, settings.game.step_interval_ms
    );

    let (event_tx, event_rx) = mpsc::unbounded_channel();
    tokio::spawn(accept_loop(listener, event_tx));
    game_loop(&settings, event_rx).await;
    Ok(())
}

async fn accept_loop(listener: TcpListener, events: mpsc::UnboundedSender<NetEvent>) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                debug!("TCP connection from {}", addr);
                let events = events.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, events).await {
                        warn!("Connection from {} failed: {}", addr, e);
                    }
                });
            }
            Err(e) => warn!("Accept failed: {}", e),
        }
    }
}

/// The single task that touches the game
async fn game_loop(settings: &Settings, mut events: mpsc::UnboundedReceiver<NetEvent>) {
    let mut arena = Arena::new(settings);
    let mut ticker = interval(settings.game.step_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => arena.tick(),
            event = events.recv() => match event {
                Some(event) => arena.handle(event),
                None => break,
            },
        }
    }
    info!("Game loop stopped");
}

async fn handle_connection(stream: TcpStream, events: mpsc::UnboundedSender<NetEvent>) -> anyhow::Result<()> {
    let ws_stream = accept_async(stream).await?;
    let (mut ws_tx, mut ws_rx) = ws_stream.split();

    let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<String>();
    let (reply, reply_rx) = oneshot::channel();
    events
        .send(NetEvent::Connected { outbound, reply })
        .map_err(|_| anyhow::anyhow!("game loop stopped"))?;
    let conn = reply_rx.await?;

    loop {
        tokio::select! {
            out = outbound_rx.recv() => match out {
                Some(text) => ws_tx.send(WsMessage::Text(text)).await?,
                None => {
                    // Session dropped us
                    let _ = ws_tx.send(WsMessage::Close(None)).await;
                    break;
                }
            },
            incoming = ws_rx.next() => match incoming {
                Some(Ok(WsMessage::Text(text))) => {
                    if events.send(NetEvent::Frame { conn, text }).is_err() {
                        break;
                    }
                }
                Some(Ok(WsMessage::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!("Connection {} read error: {}", conn, e);
                    break;
                }
            },
        }
    }

    let _ = events.send(NetEvent::Disconnected { conn });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_settings() -> Settings {
        let mut settings = Settings::default();
        settings.game.cols = 6;
        settings.game.rows = 6;
        settings
    }

    /// Connect a fake socket, returning its id and the frames it receives
    fn connect(arena: &mut Arena) -> (ConnectionId, mpsc::UnboundedReceiver<String>) {
        let (outbound, rx) = mpsc::unbounded_channel();
        let (reply, mut reply_rx) = oneshot::channel();
        arena.handle(NetEvent::Connected { outbound, reply });
        (reply_rx.try_recv().unwrap(), rx)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<String>) -> Vec<Message> {
        let mut messages = Vec::new();
        while let Ok(text) = rx.try_recv() {
            messages.push(decode_message(&text).unwrap());
        }
        messages
    }

    #[test]
    fn test_session_ids_restart_after_reset() {
        let mut session = Session::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let (first, p1) = session.register(tx.clone());
        let (_, p2) = session.register(tx.clone());
        assert_eq!((p1, p2), (1, 2));

        session.reset();
        assert!(session.is_empty());
        assert_eq!(session.unregister(first), None);

        let (conn, p) = session.register(tx);
        assert_eq!(p, 1);
        assert_ne!(conn, first);
    }

    #[test]
    fn test_new_connection_gets_join_then_snapshot() {
        let mut arena = Arena::new(&small_settings());
        let (_, mut first) = connect(&mut arena);
        let kinds: Vec<_> = drain(&mut first).iter().map(Message::kind).collect();
        assert_eq!(kinds, vec!["JoinMessage", "UpdateGridMessage", "SetPlayerMessage"]);

        let (_, mut second) = connect(&mut arena);
        let messages = drain(&mut second);
        assert_eq!(messages[0], Message::Join(2));
        // Grid, the existing player, then its own introduction
        let kinds: Vec<_> = messages[1..].iter().map(Message::kind).collect();
        assert_eq!(kinds, vec!["UpdateGridMessage", "SetPlayerMessage", "SetPlayerMessage"]);
        // The first player hears about the second
        assert_eq!(drain(&mut first).len(), 1);
        assert_eq!(arena.game().players().len(), 2);
    }

    #[test]
    fn test_intents_reach_the_game() {
        let mut arena = Arena::new(&small_settings());
        let (conn, mut rx) = connect(&mut arena);
        drain(&mut rx);

        arena.handle(NetEvent::Frame {
            conn,
            text: r#"{"type":"SlamMessage"}"#.to_string(),
        });
        assert!(!arena.game().grid().is_empty());
        let kinds: Vec<_> = drain(&mut rx).iter().map(Message::kind).collect();
        assert_eq!(kinds, vec!["UpdateGridMessage", "SetPlayerMessage"]);
    }

    #[test]
    fn test_protocol_violation_drops_connection() {
        let mut arena = Arena::new(&small_settings());
        let (conn, mut rx) = connect(&mut arena);
        let (_, mut other) = connect(&mut arena);
        drain(&mut rx);
        drain(&mut other);

        arena.handle(NetEvent::Frame {
            conn,
            text: r#"{"type":"JoinMessage","data":9}"#.to_string(),
        });
        assert_eq!(arena.session().len(), 1);
        assert_eq!(arena.game().players().len(), 1);
        assert_eq!(drain(&mut other), vec![Message::RemovePlayer(1)]);
    }

    #[test]
    fn test_disconnect_removes_player() {
        let mut arena = Arena::new(&small_settings());
        let (conn, _rx) = connect(&mut arena);
        arena.handle(NetEvent::Disconnected { conn });
        assert!(arena.game().players().is_empty());
        assert!(arena.session().is_empty());
    }

    #[test]
    fn test_game_over_resets_session() {
        let mut settings = small_settings();
        settings.game.rows = 2;
        let mut arena = Arena::new(&settings);
        let (_, mut rx) = connect(&mut arena);

        // Pieces pile up until a spawn fails
        for _ in 0..10 {
            arena.tick();
        }
        let messages = drain(&mut rx);
        assert!(messages.contains(&Message::GameOver));
        assert!(arena.session().is_empty());
        assert!(arena.game().players().is_empty());
        assert!(arena.game().grid().is_empty());
    }
}

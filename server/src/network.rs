//! Server network layer: TCP connections, packet dispatch and the turn ticker
//!
//! Every accepted connection gets two tasks. The reader decodes frames and
//! dispatches packets; the writer drains the connection's outbound channel so
//! that nothing holding a lock ever waits on a socket.

use crate::client_manager::ClientManager;
use crate::game::GameStatus;
use crate::game_manager::{GameManager, SharedGame};
use crate::ServerConfig;
use log::{debug, error, info, warn};
use shared::{
    decode_body, encode_frame, frame_len, Catalog, GameId, Packet, PlayerId, ProtocolError, TurnReport,
    FRAME_HEADER_LEN, PROTOCOL_VERSION,
};
use std::io::ErrorKind;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex};
use tokio::time::{interval, MissedTickBehavior};

/// Reads one frame, returning `None` when the peer closed the stream cleanly
pub async fn read_packet<R>(reader: &mut R) -> Result<Option<Packet>, ProtocolError>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; FRAME_HEADER_LEN];
    match reader.read_exact(&mut header).await {
        Ok(_) => {}
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = frame_len(header)?;
    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await?;
    decode_body(&body).map(Some)
}

pub async fn write_packet<W>(writer: &mut W, packet: &Packet) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin,
{
    let frame = encode_frame(packet)?;
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}

/// Main server accepting connections and driving turns
pub struct Server {
    listener: TcpListener,
    clients: Arc<Mutex<ClientManager>>,
    games: Arc<Mutex<GameManager>>,
    turn_duration: Duration,
}

impl Server {
    pub async fn new(config: ServerConfig, catalog: Catalog) -> Result<Self, Box<dyn std::error::Error>> {
        let listener = TcpListener::bind(&config.bind_addr).await?;
        info!("Server listening on {}", listener.local_addr()?);

        Ok(Server {
            listener,
            clients: Arc::new(Mutex::new(ClientManager::new(config.max_clients))),
            games: Arc::new(Mutex::new(GameManager::new(Arc::new(catalog), config.rules))),
            turn_duration: config.turn_duration,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn clients(&self) -> Arc<Mutex<ClientManager>> {
        Arc::clone(&self.clients)
    }

    pub fn games(&self) -> Arc<Mutex<GameManager>> {
        Arc::clone(&self.games)
    }

    /// Accepts connections and resolves turns until the task is dropped
    pub async fn run(self) -> std::io::Result<()> {
        self.spawn_turn_ticker();
        info!("Server started successfully");

        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    let clients = Arc::clone(&self.clients);
                    let games = Arc::clone(&self.games);
                    tokio::spawn(async move {
                        handle_connection(stream, addr, clients, games).await;
                    });
                }
                Err(e) => {
                    error!("Error accepting connection: {}", e);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
            }
        }
    }

    fn spawn_turn_ticker(&self) {
        let clients = Arc::clone(&self.clients);
        let games = Arc::clone(&self.games);
        let turn_duration = self.turn_duration;

        tokio::spawn(async move {
            let mut ticker = interval(turn_duration);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            // The first tick fires immediately
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let resolved = run_turns(&clients, &games).await;
                if !resolved.is_empty() {
                    debug!("Resolved a turn in {} game(s)", resolved.len());
                }
            }
        });
    }
}

async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    clients: Arc<Mutex<ClientManager>>,
    games: Arc<Mutex<GameManager>>,
) {
    if let Err(e) = stream.set_nodelay(true) {
        debug!("Could not disable Nagle for {}: {}", addr, e);
    }
    let (mut reader, mut writer) = stream.into_split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Packet>();

    let client_id = clients.lock().await.add_client(addr, tx);
    let Some(client_id) = client_id else {
        let response = Packet::Disconnected {
            reason: "Server full".to_string(),
        };
        if let Err(e) = write_packet(&mut writer, &response).await {
            debug!("Failed to refuse {}: {}", addr, e);
        }
        return;
    };

    let writer_task = tokio::spawn(async move {
        while let Some(packet) = rx.recv().await {
            let closing = matches!(packet, Packet::Disconnected { .. });
            if let Err(e) = write_packet(&mut writer, &packet).await {
                warn!("Failed to send to client {}: {}", client_id, e);
                break;
            }
            if closing {
                break;
            }
        }
    });

    loop {
        match read_packet(&mut reader).await {
            Ok(Some(packet)) => {
                if !handle_packet(client_id, packet, &clients, &games).await {
                    break;
                }
            }
            Ok(None) => break,
            Err(ProtocolError::Codec(e)) => {
                warn!("Undecodable packet from client {}: {}", client_id, e);
                clients.lock().await.send_to(
                    client_id,
                    Packet::Error {
                        reason: "Invalid packet".to_string(),
                    },
                );
            }
            Err(e) => {
                warn!("Dropping client {}: {}", client_id, e);
                break;
            }
        }
    }

    disconnect_client(client_id, &clients, &games).await;
    if let Err(e) = writer_task.await {
        error!("Writer task for client {} panicked: {}", client_id, e);
    }
}

/// Dispatches one packet from a client
///
/// Returns false when the connection should be closed.
pub async fn handle_packet(
    client_id: PlayerId,
    packet: Packet,
    clients: &Mutex<ClientManager>,
    games: &Mutex<GameManager>,
) -> bool {
    match packet {
        Packet::Connect {
            client_version,
            name,
            race,
        } => {
            info!("Client {} connecting as {} (version: {})", client_id, name, client_version);

            if client_version != PROTOCOL_VERSION {
                reply(
                    clients,
                    client_id,
                    Packet::Disconnected {
                        reason: "Protocol version mismatch".to_string(),
                    },
                )
                .await;
                return false;
            }

            if clients.lock().await.game_of(client_id).is_some() {
                reply(clients, client_id, error_packet("Already in a game")).await;
                return true;
            }

            let joined = games.lock().await.join(client_id, &name, race).await;
            match joined {
                Ok(game_id) => {
                    let mut clients = clients.lock().await;
                    clients.assign_game(client_id, game_id);
                    clients.send_to(
                        client_id,
                        Packet::Connected {
                            player_id: client_id,
                            game_id,
                        },
                    );
                }
                Err(e) => reply(clients, client_id, error_packet(&e.to_string())).await,
            }
            true
        }

        Packet::SubmitOrders { orders } => {
            let Some(game) = game_for(client_id, clients, games).await else {
                reply(clients, client_id, error_packet("Not in a game")).await;
                return true;
            };

            let result = {
                let mut game = game.lock().await;
                game.accept_orders(client_id, orders).map(|_| game.turn())
            };
            let response = match result {
                Ok(turn) => Packet::OrdersAccepted { turn },
                Err(e) => Packet::OrdersRejected { reason: e.to_string() },
            };
            reply(clients, client_id, response).await;
            true
        }

        Packet::StartGame => {
            let Some(game) = game_for(client_id, clients, games).await else {
                reply(clients, client_id, error_packet("Not in a game")).await;
                return true;
            };

            let mut game = game.lock().await;
            match game.start() {
                Ok(()) => {
                    let clients = clients.lock().await;
                    clients.broadcast_to_game(game.id, &Packet::GameStarted { turn: game.turn() });
                    send_player_states(&clients, &game);
                }
                Err(e) => {
                    drop(game);
                    reply(clients, client_id, error_packet(&e.to_string())).await;
                }
            }
            true
        }

        Packet::Disconnect => false,

        _ => {
            warn!("Unexpected packet type from client {}", client_id);
            reply(clients, client_id, error_packet("Unexpected packet")).await;
            true
        }
    }
}

/// Resolves one turn in every running game and delivers the results
///
/// Each participant receives the turn report and their own refreshed state.
/// Games that ended are announced, their clients released, and the games
/// dropped from the registry.
pub async fn run_turns(clients: &Mutex<ClientManager>, games: &Mutex<GameManager>) -> Vec<(GameId, TurnReport)> {
    let handles = games.lock().await.games();
    let mut resolved = Vec::new();
    let mut any_ended = false;

    for (game_id, handle) in handles {
        let mut game = handle.lock().await;
        if game.status() != GameStatus::Running {
            continue;
        }

        let report = match game.next_turn() {
            Ok(report) => report,
            Err(e) => {
                error!("Failed to resolve turn for game {}: {}", game_id, e);
                continue;
            }
        };

        let mut clients = clients.lock().await;
        clients.broadcast_to_game(
            game_id,
            &Packet::TurnResults {
                report: report.clone(),
            },
        );
        send_player_states(&clients, &game);

        if game.status() == GameStatus::Ended {
            clients.broadcast_to_game(game_id, &Packet::GameEnded { winner: report.winner });
            clients.leave_game(game_id);
            any_ended = true;
        }

        resolved.push((game_id, report));
    }

    if any_ended {
        games.lock().await.prune_ended().await;
    }
    resolved
}

fn send_player_states(clients: &ClientManager, game: &crate::game::Game) {
    for player in game.players() {
        clients.send_to(
            player.id,
            Packet::PlayerState {
                turn: game.turn(),
                player: player.clone(),
            },
        );
    }
}

async fn game_for(client_id: PlayerId, clients: &Mutex<ClientManager>, games: &Mutex<GameManager>) -> Option<SharedGame> {
    let game_id = clients.lock().await.game_of(client_id)?;
    games.lock().await.get(game_id).ok()
}

async fn reply(clients: &Mutex<ClientManager>, client_id: PlayerId, packet: Packet) {
    clients.lock().await.send_to(client_id, packet);
}

fn error_packet(reason: &str) -> Packet {
    Packet::Error {
        reason: reason.to_string(),
    }
}

/// Removes a client and, if its game has not started, its seat as well
async fn disconnect_client(client_id: PlayerId, clients: &Mutex<ClientManager>, games: &Mutex<GameManager>) {
    let removed = clients.lock().await.remove_client(client_id);
    let Some(game_id) = removed.and_then(|client| client.game) else {
        return;
    };

    let game = games.lock().await.get(game_id).ok();
    let Some(game) = game else {
        return;
    };

    let mut game = game.lock().await;
    if game.status() == GameStatus::Waiting {
        if let Err(e) = game.remove_player(client_id) {
            warn!("Could not free seat of client {}: {}", client_id, e);
        }
    } else {
        info!("Player {} left running game {}, their empire remains", client_id, game_id);
    }
}

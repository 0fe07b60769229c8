//! Server network layer handling UDP communications and event dispatch

use crate::action_log::{ActionLogger, ActionSink, CsvActionLog, NullActionLog};
use crate::client_manager::ClientManager;
use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::session::{Outbound, Recipient, Session};
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use shared::{ClientEvent, Packet, MAX_PACKET_SIZE, PROTOCOL_VERSION};
use std::net::SocketAddr;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, RwLock};

/// Messages sent from network tasks to main server loop
#[derive(Debug)]
pub enum ServerMessage {
    PacketReceived { packet: Packet, addr: SocketAddr },
    ClientTimeout { client_id: u32 },
    Shutdown,
}

/// Messages sent from the dispatch loop to the sender task
#[derive(Debug)]
pub enum GameMessage {
    SendPacket {
        packet: Packet,
        addr: SocketAddr,
    },
    BroadcastPacket {
        packet: Packet,
        exclude: Option<u32>,
    },
}

/// Wall-clock time in milliseconds since the Unix epoch
pub fn now_millis() -> u64 {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_millis();
    millis.min(u64::MAX as u128) as u64
}

/// Main server owning the session and routing events between clients
///
/// The session lives on the dispatch loop in [`Server::run`] and is only
/// touched there, one packet at a time.
pub struct Server {
    socket: Arc<UdpSocket>,
    clients: Arc<RwLock<ClientManager>>,
    session: Session,
    logger: ActionLogger,

    // Communication channels
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
    game_tx: mpsc::UnboundedSender<GameMessage>,
    game_rx: mpsc::UnboundedReceiver<GameMessage>,
}

impl Server {
    /// Binds the socket and opens the configured action log
    pub async fn new(config: ServerConfig) -> Result<Self, ServerError> {
        let sink: Box<dyn ActionSink> = match &config.action_log {
            Some(path) => {
                info!("Writing action log to {}", path.display());
                Box::new(CsvActionLog::open(path)?)
            }
            None => {
                info!("Action logging disabled");
                Box::new(NullActionLog)
            }
        };
        Self::with_sink(config, sink).await
    }

    pub async fn with_sink(
        config: ServerConfig,
        sink: Box<dyn ActionSink>,
    ) -> Result<Self, ServerError> {
        let socket = Arc::new(UdpSocket::bind(&config.bind_addr).await?);
        info!("Server listening on {}", socket.local_addr()?);

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let (game_tx, game_rx) = mpsc::unbounded_channel();

        Ok(Server {
            socket,
            clients: Arc::new(RwLock::new(ClientManager::new(
                config.max_clients,
                config.client_timeout,
            ))),
            session: Session::new(config.session),
            logger: ActionLogger::with_retry(
                sink,
                config.log_max_attempts,
                config.log_retry_backoff,
            )
            .with_append_timeout(config.log_append_timeout),
            server_tx,
            server_rx,
            game_tx,
            game_rx,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.socket.local_addr()?)
    }

    /// Handle for stopping `run` from another task
    pub fn shutdown_handle(&self) -> mpsc::UnboundedSender<ServerMessage> {
        self.server_tx.clone()
    }

    /// Records dropped by the action log after exhausting retries
    pub fn action_log_failures(&self) -> u64 {
        self.logger.failure_count()
    }

    /// Live dropped-record counter, readable after `run` has taken the server
    pub fn action_log_failure_counter(&self) -> Arc<AtomicU64> {
        self.logger.failure_counter()
    }

    /// Spawns task that continuously listens for incoming packets
    fn spawn_network_receiver(&self) {
        let socket = Arc::clone(&self.socket);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut buffer = vec![0u8; MAX_PACKET_SIZE];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => match deserialize::<Packet>(&buffer[..len]) {
                        Ok(packet) => {
                            if let Err(e) =
                                server_tx.send(ServerMessage::PacketReceived { packet, addr })
                            {
                                error!("Failed to send packet to main loop: {}", e);
                                break;
                            }
                        }
                        Err(e) => warn!("Failed to deserialize packet from {}: {}", addr, e),
                    },
                    Err(e) => {
                        error!("Error receiving packet: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Spawns task that processes outgoing packet queue
    fn spawn_network_sender(&mut self) {
        let socket = Arc::clone(&self.socket);
        let clients = Arc::clone(&self.clients);
        let mut game_rx = std::mem::replace(&mut self.game_rx, mpsc::unbounded_channel().1);

        tokio::spawn(async move {
            while let Some(message) = game_rx.recv().await {
                match message {
                    GameMessage::SendPacket { packet, addr } => {
                        if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                            error!("Failed to send packet to {}: {}", addr, e);
                        }
                    }
                    GameMessage::BroadcastPacket { packet, exclude } => {
                        let client_addrs = {
                            let clients_guard = clients.read().await;
                            clients_guard.get_client_addrs()
                        };

                        for (client_id, addr) in client_addrs {
                            if Some(client_id) == exclude {
                                continue;
                            }

                            if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                                error!("Failed to send to client {}: {}", client_id, e);
                            }
                        }
                    }
                }
            }
        });
    }

    /// Spawns task that monitors client timeouts
    fn spawn_timeout_checker(&self) {
        let clients = Arc::clone(&self.clients);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));

            loop {
                interval.tick().await;

                let timed_out = {
                    let mut clients_guard = clients.write().await;
                    clients_guard.check_timeouts()
                };

                for client_id in timed_out {
                    if server_tx
                        .send(ServerMessage::ClientTimeout { client_id })
                        .is_err()
                    {
                        return;
                    }
                }
            }
        });
    }

    async fn send_packet_impl(
        socket: &UdpSocket,
        packet: &Packet,
        addr: SocketAddr,
    ) -> Result<(), ServerError> {
        let data = serialize(packet)?;
        socket.send_to(&data, addr).await?;
        Ok(())
    }

    fn send_packet(&self, packet: Packet, addr: SocketAddr) {
        if let Err(e) = self.game_tx.send(GameMessage::SendPacket { packet, addr }) {
            error!("Failed to queue packet for sending: {}", e);
        }
    }

    fn broadcast_packet(&self, packet: Packet, exclude: Option<u32>) {
        if let Err(e) = self
            .game_tx
            .send(GameMessage::BroadcastPacket { packet, exclude })
        {
            error!("Failed to queue broadcast packet: {}", e);
        }
    }

    /// Processes one incoming packet
    async fn handle_packet(&mut self, packet: Packet, addr: SocketAddr) {
        match packet {
            Packet::Connect { client_version } => {
                info!(
                    "Client connecting from {} (version: {})",
                    addr, client_version
                );

                if client_version != PROTOCOL_VERSION {
                    self.send_packet(
                        Packet::Disconnected {
                            reason: "Protocol version mismatch".to_string(),
                        },
                        addr,
                    );
                    return;
                }

                let client_id = {
                    let mut clients = self.clients.write().await;
                    // A reconnect from the same address replaces the old connection
                    if let Some(existing_id) = clients.find_client_by_addr(addr) {
                        info!("Removing existing client {} from {}", existing_id, addr);
                        clients.remove_client(&existing_id);
                    }
                    clients.add_client(addr)
                };

                let response = match client_id {
                    Some(client_id) => Packet::Connected { client_id },
                    None => Packet::Disconnected {
                        reason: "Server full".to_string(),
                    },
                };
                self.send_packet(response, addr);
            }

            Packet::Heartbeat => {
                let mut clients = self.clients.write().await;
                if clients.touch_by_addr(addr).is_none() {
                    debug!("Heartbeat from unknown address {}", addr);
                }
            }

            Packet::Event(event) => {
                let client_id = {
                    let mut clients = self.clients.write().await;
                    clients.touch_by_addr(addr)
                };

                match client_id {
                    Some(client_id) => self.dispatch_event(client_id, addr, event).await,
                    None => warn!("Dropping {} from unconnected {}", event.name(), addr),
                }
            }

            Packet::Disconnect => {
                let mut clients = self.clients.write().await;
                if let Some(client_id) = clients.find_client_by_addr(addr) {
                    clients.remove_client(&client_id);
                }
            }

            _ => {
                warn!("Unexpected packet type from client at {}", addr);
            }
        }
    }

    /// Runs an event through the session, logs it, then queues the replies
    ///
    /// Outbound events are only queued once the log append has finished or
    /// given up, so a slow log delays delivery by at most the logger's
    /// retry budget and never reorders it.
    async fn dispatch_event(&mut self, client_id: u32, addr: SocketAddr, event: ClientEvent) {
        let dispatch = self.session.handle(client_id, event, now_millis());

        for record in &dispatch.records {
            self.logger.record(record).await;
        }

        for Outbound { to, event } in dispatch.outbound {
            let packet = Packet::Update(event);
            match to {
                Recipient::All => self.broadcast_packet(packet, None),
                Recipient::Others => self.broadcast_packet(packet, Some(client_id)),
                Recipient::Sender => self.send_packet(packet, addr),
            }
        }
    }

    /// Main server loop
    pub async fn run(&mut self) -> Result<(), ServerError> {
        self.spawn_network_receiver();
        self.spawn_network_sender();
        self.spawn_timeout_checker();

        info!("Server started successfully");

        while let Some(message) = self.server_rx.recv().await {
            match message {
                ServerMessage::PacketReceived { packet, addr } => {
                    self.handle_packet(packet, addr).await;
                }
                ServerMessage::ClientTimeout { client_id } => {
                    info!("Client {} timed out", client_id);
                }
                ServerMessage::Shutdown => break,
            }
        }

        info!(
            "Server shutting down ({} action log records dropped)",
            self.logger.failure_count()
        );
        Ok(())
    }
}

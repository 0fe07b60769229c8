//! Integration tests for the session server
//!
//! These tests run the real server on an ephemeral UDP port and talk to it
//! with plain sockets, the way a browser bridge would.

use bincode::{deserialize, serialize};
use server::action_log::{ActionRecord, ActionSink, MemoryActionLog};
use server::config::ServerConfig;
use server::error::ActionLogError;
use server::network::Server;
use shared::{
    ClientEvent, Packet, PinRequest, PushRejection, ServerEvent, Vec2, MAX_PACKET_SIZE,
    PLAYER_ONE, PLAYER_TWO, PROTOCOL_VERSION,
};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{mpsc, Arc};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::timeout;

const RECV_TIMEOUT: Duration = Duration::from_secs(2);

fn test_config() -> ServerConfig {
    ServerConfig {
        bind_addr: "127.0.0.1:0".to_string(),
        client_timeout: Duration::from_secs(60),
        action_log: None,
        ..ServerConfig::default()
    }
}

/// Starts a server writing to `sink` and returns its dropped-record counter
async fn start_server_with(
    config: ServerConfig,
    sink: Box<dyn ActionSink>,
) -> (SocketAddr, Arc<AtomicU64>) {
    let mut server = Server::with_sink(config, sink)
        .await
        .expect("Failed to start server");
    let addr = server.local_addr().unwrap();
    let failures = server.action_log_failure_counter();

    tokio::spawn(async move {
        let _ = server.run().await;
    });

    (addr, failures)
}

/// Starts a server with an in-memory action log and returns its address
async fn start_server() -> (SocketAddr, MemoryActionLog) {
    let log = MemoryActionLog::new();
    let (addr, _) = start_server_with(test_config(), Box::new(log.clone())).await;
    (addr, log)
}

async fn send(socket: &UdpSocket, server: SocketAddr, packet: &Packet) {
    let data = serialize(packet).unwrap();
    socket.send_to(&data, server).await.unwrap();
}

async fn recv_packet(socket: &UdpSocket) -> Packet {
    let mut buf = vec![0u8; MAX_PACKET_SIZE];
    let (size, _) = timeout(RECV_TIMEOUT, socket.recv_from(&mut buf))
        .await
        .expect("Timed out waiting for server")
        .unwrap();
    deserialize(&buf[..size]).unwrap()
}

async fn recv_update(socket: &UdpSocket) -> ServerEvent {
    match recv_packet(socket).await {
        Packet::Update(event) => event,
        other => panic!("Expected a server event, got {:?}", other),
    }
}

/// Binds a socket and completes the handshake
async fn connect(server: SocketAddr) -> (UdpSocket, u32) {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    send(
        &socket,
        server,
        &Packet::Connect {
            client_version: PROTOCOL_VERSION,
        },
    )
    .await;

    match recv_packet(&socket).await {
        Packet::Connected { client_id } => (socket, client_id),
        other => panic!("Expected Connected, got {:?}", other),
    }
}

async fn send_event(socket: &UdpSocket, server: SocketAddr, event: ClientEvent) {
    send(socket, server, &Packet::Event(event)).await;
}

fn pin(id: &str) -> ClientEvent {
    ClientEvent::DrawPin(PinRequest {
        center: Vec2::new(320.0, 240.0),
        radius: 6.0,
        points: vec![],
        player_id: PLAYER_ONE.to_string(),
        custom_id: id.to_string(),
        current_level: 1,
        target_body_custom_id: None,
        nail_group_number: None,
        nail_category: None,
    })
}

fn push() -> ClientEvent {
    ClientEvent::Push {
        force: Vec2::new(0.03, 0.0),
        player_id: PLAYER_ONE.to_string(),
        current_level: 1,
    }
}

/// CONNECTION HANDSHAKE TESTS
mod connection_tests {
    use super::*;

    #[tokio::test]
    async fn clients_get_distinct_ids() {
        let (server, _) = start_server().await;

        let (_a, id_a) = connect(server).await;
        let (_b, id_b) = connect(server).await;

        assert_ne!(id_a, id_b);
    }

    #[tokio::test]
    async fn protocol_mismatch_is_refused() {
        let (server, _) = start_server().await;
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();

        send(&socket, server, &Packet::Connect { client_version: 99 }).await;

        match recv_packet(&socket).await {
            Packet::Disconnected { reason } => assert!(reason.contains("version")),
            other => panic!("Expected Disconnected, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn garbage_datagrams_are_ignored() {
        let (server, _) = start_server().await;
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();

        socket.send_to(&[0xde, 0xad, 0xbe, 0xef], server).await.unwrap();

        let (a, _) = connect(server).await;
        send_event(&a, server, ClientEvent::GetTurn).await;
        assert_eq!(
            recv_update(&a).await,
            ServerEvent::UpdateTurn {
                current_turn: PLAYER_ONE.to_string()
            }
        );
    }

    #[tokio::test]
    async fn events_from_unconnected_address_are_dropped() {
        let (server, log) = start_server().await;
        let stranger = UdpSocket::bind("127.0.0.1:0").await.unwrap();

        send_event(&stranger, server, pin("ghost")).await;

        // The first pin drawn by a real client still gets the first category.
        let (a, _) = connect(server).await;
        send_event(&a, server, pin("n1")).await;
        match recv_update(&a).await {
            ServerEvent::DrawPin(resolved) => {
                assert_eq!(resolved.custom_id, "n1");
                assert_eq!(resolved.nail_category, 0x0002);
            }
            other => panic!("Unexpected event {:?}", other),
        }
        assert_eq!(log.records().len(), 1);
    }
}

/// SESSION FLOW TESTS
mod session_flow_tests {
    use super::*;

    #[tokio::test]
    async fn draw_pin_reaches_every_client() {
        let (server, log) = start_server().await;
        let (a, _) = connect(server).await;
        let (b, _) = connect(server).await;

        send_event(&a, server, pin("n1")).await;

        for socket in [&a, &b] {
            match recv_update(socket).await {
                ServerEvent::DrawPin(resolved) => {
                    assert_eq!(resolved.custom_id, "n1");
                    assert_eq!(resolved.nail_category, 0x0002);
                    assert_eq!(resolved.nail_group_number, -1);
                }
                other => panic!("Unexpected event {:?}", other),
            }
        }

        let records = log.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].action_type, "drawPin");
        assert_eq!(records[0].player_id, PLAYER_ONE);
    }

    #[tokio::test]
    async fn erase_keeps_category_out_of_pool() {
        let (server, log) = start_server().await;
        let (a, _) = connect(server).await;

        send_event(&a, server, pin("n1")).await;
        assert!(matches!(recv_update(&a).await, ServerEvent::DrawPin(_)));

        send_event(
            &a,
            server,
            ClientEvent::Erase {
                custom_id: "n1".to_string(),
                player_id: PLAYER_ONE.to_string(),
                current_level: 1,
                is_fall: false,
            },
        )
        .await;
        assert!(matches!(recv_update(&a).await, ServerEvent::Erase { .. }));

        send_event(
            &a,
            server,
            ClientEvent::GetNextCategory {
                player_id: PLAYER_ONE.to_string(),
                current_level: 1,
            },
        )
        .await;
        assert_eq!(
            recv_update(&a).await,
            ServerEvent::NextCategoryResponse {
                success: true,
                category: Some(0x0004)
            }
        );

        let types: Vec<&str> = log.records().iter().map(|r| r.action_type).collect();
        assert_eq!(types, vec!["drawPin", "erase"]);
    }

    #[tokio::test]
    async fn mouse_move_only_reaches_others() {
        let (server, _) = start_server().await;
        let (a, _) = connect(server).await;
        let (b, _) = connect(server).await;

        send_event(
            &a,
            server,
            ClientEvent::MouseMove {
                x: 10.0,
                y: 20.0,
                player_id: PLAYER_ONE.to_string(),
            },
        )
        .await;
        assert!(matches!(
            recv_update(&b).await,
            ServerEvent::MouseMove { .. }
        ));

        // The sender's next event is the reply to its own query, not the relay.
        send_event(&a, server, ClientEvent::GetTurn).await;
        assert!(matches!(
            recv_update(&a).await,
            ServerEvent::UpdateTurn { .. }
        ));
    }

    #[tokio::test]
    async fn push_cooldown_rejects_second_push() {
        let (server, _) = start_server().await;
        let (a, _) = connect(server).await;
        let (b, _) = connect(server).await;

        send_event(&a, server, push()).await;
        for socket in [&a, &b] {
            assert!(matches!(recv_update(socket).await, ServerEvent::Push { .. }));
            assert_eq!(
                recv_update(socket).await,
                ServerEvent::UpdateTurn {
                    current_turn: PLAYER_TWO.to_string()
                }
            );
        }

        send_event(&a, server, push()).await;
        match recv_update(&a).await {
            ServerEvent::PushRejected {
                reason: PushRejection::Cooldown { remaining_ms },
            } => assert!(remaining_ms > 0),
            other => panic!("Unexpected event {:?}", other),
        }

        // Nothing was broadcast for the rejected push, and the turn held.
        send_event(&b, server, ClientEvent::GetTurn).await;
        assert_eq!(
            recv_update(&b).await,
            ServerEvent::UpdateTurn {
                current_turn: PLAYER_TWO.to_string()
            }
        );
    }

    #[tokio::test]
    async fn completed_levels_are_shared() {
        let (server, _) = start_server().await;
        let (a, _) = connect(server).await;
        let (b, _) = connect(server).await;

        send_event(
            &a,
            server,
            ClientEvent::CompleteLevel {
                completed_level: 5,
                player_id: PLAYER_ONE.to_string(),
            },
        )
        .await;

        for socket in [&a, &b] {
            assert!(matches!(
                recv_update(socket).await,
                ServerEvent::CompleteLevel {
                    completed_level: 5,
                    ..
                }
            ));
            assert_eq!(
                recv_update(socket).await,
                ServerEvent::CompletedLevelsUpdated { levels: vec![5] }
            );
        }

        send_event(&b, server, ClientEvent::GetCompletedLevels).await;
        assert_eq!(
            recv_update(&b).await,
            ServerEvent::CompletedLevelsResponse { levels: vec![5] }
        );
    }

    #[tokio::test]
    async fn invalid_payload_gets_error_reply() {
        let (server, log) = start_server().await;
        let (a, _) = connect(server).await;

        send_event(
            &a,
            server,
            ClientEvent::ChangeHingePosition {
                level: 3,
                hinge_pos_index: 7,
                player_id: PLAYER_ONE.to_string(),
            },
        )
        .await;

        match recv_update(&a).await {
            ServerEvent::Error { event, message } => {
                assert_eq!(event, "changeHingePosition");
                assert!(message.contains('7'));
            }
            other => panic!("Unexpected event {:?}", other),
        }
        assert!(log.records().is_empty());
    }
}

/// ACTION LOG FAILURE TESTS
mod action_log_failure_tests {
    use super::*;

    /// Rejects every append
    struct BrokenSink;

    impl ActionSink for BrokenSink {
        fn append(&mut self, _record: &ActionRecord) -> Result<(), ActionLogError> {
            Err(ActionLogError::Unavailable("disk offline".to_string()))
        }
    }

    /// Blocks inside `append` until the paired sender is dropped
    struct StalledSink {
        hold: mpsc::Receiver<()>,
    }

    impl ActionSink for StalledSink {
        fn append(&mut self, _record: &ActionRecord) -> Result<(), ActionLogError> {
            let _ = self.hold.recv_timeout(Duration::from_secs(10));
            Ok(())
        }
    }

    async fn expect_pin(socket: &UdpSocket, id: &str, category: u16) {
        match recv_update(socket).await {
            ServerEvent::DrawPin(resolved) => {
                assert_eq!(resolved.custom_id, id);
                assert_eq!(resolved.nail_category, category);
            }
            other => panic!("Unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn failing_log_still_delivers_events() {
        let config = ServerConfig {
            log_retry_backoff: Duration::from_millis(10),
            ..test_config()
        };
        let (server, failures) = start_server_with(config, Box::new(BrokenSink)).await;
        let (a, _) = connect(server).await;
        let (b, _) = connect(server).await;

        send_event(&a, server, pin("n1")).await;
        for socket in [&a, &b] {
            expect_pin(socket, "n1", 0x0002).await;
        }

        assert_eq!(failures.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn stalled_log_does_not_hold_dispatch() {
        let (release, hold) = mpsc::channel();
        let config = ServerConfig {
            log_retry_backoff: Duration::from_millis(10),
            log_append_timeout: Duration::from_millis(100),
            ..test_config()
        };
        let (server, failures) = start_server_with(config, Box::new(StalledSink { hold })).await;
        let (a, _) = connect(server).await;
        let (b, _) = connect(server).await;

        send_event(&a, server, pin("n1")).await;
        for socket in [&a, &b] {
            expect_pin(socket, "n1", 0x0002).await;
        }
        assert_eq!(failures.load(Ordering::Relaxed), 1);

        // The first append is still stuck; later events keep flowing.
        send_event(&b, server, pin("n2")).await;
        for socket in [&a, &b] {
            expect_pin(socket, "n2", 0x0004).await;
        }
        assert_eq!(failures.load(Ordering::Relaxed), 2);

        drop(release);
    }
}

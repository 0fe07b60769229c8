//! Probe client: connects, plays a short scripted exchange and prints every
//! event the server sends back.

use bincode::{deserialize, serialize};
use clap::Parser;
use shared::{ClientEvent, Packet, PinRequest, Vec2, MAX_PACKET_SIZE, PLAYER_ONE, PROTOCOL_VERSION};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::timeout;

#[derive(Parser, Debug)]
#[command(author, version, about = "Sends a scripted session to the server", long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:3001")]
    server: SocketAddr,

    /// Player id to act as
    #[arg(long, default_value = PLAYER_ONE)]
    player: String,

    /// Level to play on
    #[arg(long, default_value_t = 1)]
    level: u32,
}

async fn send(
    socket: &UdpSocket,
    server: SocketAddr,
    packet: &Packet,
) -> Result<(), Box<dyn std::error::Error>> {
    socket.send_to(&serialize(packet)?, server).await?;
    Ok(())
}

/// Prints whatever arrives until the server stays quiet for `quiet`
async fn drain(socket: &UdpSocket, quiet: Duration) {
    let mut buffer = vec![0u8; MAX_PACKET_SIZE];
    while let Ok(Ok((len, _))) = timeout(quiet, socket.recv_from(&mut buffer)).await {
        match deserialize::<Packet>(&buffer[..len]) {
            Ok(Packet::Update(event)) => println!("<- {}: {:?}", event.name(), event),
            Ok(other) => println!("<- {:?}", other),
            Err(e) => println!("<- undecodable packet: {}", e),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    println!("Client socket bound to {}", socket.local_addr()?);

    send(
        &socket,
        args.server,
        &Packet::Connect {
            client_version: PROTOCOL_VERSION,
        },
    )
    .await?;
    drain(&socket, Duration::from_millis(500)).await;

    let script = vec![
        ClientEvent::GetTurn,
        ClientEvent::GetNextCategory {
            player_id: args.player.clone(),
            current_level: args.level,
        },
        ClientEvent::DrawPin(PinRequest {
            center: Vec2::new(400.0, 300.0),
            radius: 8.0,
            points: vec![],
            player_id: args.player.clone(),
            custom_id: format!("probe-nail-{}", std::process::id()),
            current_level: args.level,
            target_body_custom_id: None,
            nail_group_number: None,
            nail_category: None,
        }),
        ClientEvent::Push {
            force: Vec2::new(0.05, 0.0),
            player_id: args.player.clone(),
            current_level: args.level,
        },
        ClientEvent::Push {
            force: Vec2::new(-0.05, 0.0),
            player_id: args.player.clone(),
            current_level: args.level,
        },
        ClientEvent::GetCompletedLevels,
    ];

    for event in script {
        println!("-> {}", event.name());
        send(&socket, args.server, &Packet::Event(event)).await?;
        send(&socket, args.server, &Packet::Heartbeat).await?;
        drain(&socket, Duration::from_millis(200)).await;
    }

    send(&socket, args.server, &Packet::Disconnect).await?;
    println!("Disconnected");

    Ok(())
}

//! Performance benchmarks for the session hot paths

use server::category_pool::CategoryPool;
use server::session::Session;
use shared::{ClientEvent, LevelChange, Packet, PinRequest, Vec2, PLAYER_ONE, PLAYER_TWO};
use std::time::Instant;

fn pin(id: String) -> ClientEvent {
    ClientEvent::DrawPin(PinRequest {
        center: Vec2::new(100.0, 100.0),
        radius: 5.0,
        points: vec![Vec2::new(95.0, 100.0), Vec2::new(105.0, 100.0)],
        player_id: PLAYER_ONE.to_string(),
        custom_id: id,
        current_level: 1,
        target_body_custom_id: None,
        nail_group_number: None,
        nail_category: None,
    })
}

/// Benchmarks category acquire/release cycles
#[test]
fn benchmark_category_pool() {
    let mut pool = CategoryPool::new();
    let iterations = 100_000;
    let start = Instant::now();

    for _ in 0..iterations {
        let category = pool.acquire().unwrap();
        pool.release(category);
    }

    let duration = start.elapsed();
    println!(
        "Category pool: {} cycles in {:?} ({:.2} ns/iter)",
        iterations,
        duration,
        duration.as_nanos() as f64 / iterations as f64
    );

    assert_eq!(pool.available_count(), 15);
    assert!(duration.as_millis() < 1000);
}

/// Benchmarks a level's worth of pins followed by a reset, repeatedly
#[test]
fn benchmark_pin_dispatch() {
    let mut session = Session::default();
    let rounds = 2_000;
    let start = Instant::now();

    for round in 0..rounds {
        for i in 0..15 {
            let dispatch = session.handle(1, pin(format!("r{}-n{}", round, i)), 0);
            assert_eq!(dispatch.outbound.len(), 1);
        }
        session.handle(
            2,
            ClientEvent::ResetLevel(LevelChange {
                level: 1,
                current_level: 1,
                direction: None,
                player_id: PLAYER_TWO.to_string(),
            }),
            0,
        );
    }

    let duration = start.elapsed();
    let events = rounds * 16;
    println!(
        "Pin dispatch: {} events in {:?} ({:.2} μs/event)",
        events,
        duration,
        duration.as_micros() as f64 / events as f64
    );

    assert!(session.nails().is_empty());
    assert!(duration.as_secs() < 5);
}

/// Benchmarks packet encoding of a large shape broadcast
#[test]
fn benchmark_shape_serialization() {
    let points: Vec<Vec2> = (0..500).map(|i| Vec2::new(i as f32, (i * 2) as f32)).collect();
    let packet = Packet::Event(ClientEvent::DrawShape(shared::ShapeStroke {
        points,
        player_id: PLAYER_ONE.to_string(),
        custom_id: "big-shape".to_string(),
        current_level: 1,
    }));

    let iterations = 10_000;
    let start = Instant::now();
    let mut size = 0;

    for _ in 0..iterations {
        let data = bincode::serialize(&packet).unwrap();
        size = data.len();
    }

    let duration = start.elapsed();
    println!(
        "Shape serialization: {} bytes, {} iterations in {:?}",
        size, iterations, duration
    );

    assert!(size < shared::MAX_PACKET_SIZE);
    assert!(duration.as_secs() < 5);
}

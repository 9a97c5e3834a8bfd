//! End-to-end fan-out load tool for Roomcast.
//!
//! Seeds a SQLite database with `N` users in one room, connects them to a
//! running server and has every client publish into the room while counting
//! delivered messages.
//!
//! ```bash
//! ROOMCAST_DATABASE_PATH=/tmp/bench.db ROOMCAST_JWT_SECRET=bench roomcast &
//! e2e_fanout 16 /tmp/bench.db bench
//! ```

use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use jsonwebtoken::{encode, EncodingKey, Header};
use roomcast_bench::BENCH_ROOM;
use roomcast_server::auth::Claims;
use roomcast_server::SqliteStore;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Barrier;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{header::COOKIE, HeaderValue};
use tokio_tungstenite::{connect_async, tungstenite::Message};

const SERVER_URL: &str = "ws://127.0.0.1:8080/ws";
const WARMUP_SECS: u64 = 2;
const BENCH_SECS: u64 = 10;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let args: Vec<String> = std::env::args().collect();
    let num_clients: usize = args.get(1).and_then(|s| s.parse().ok()).unwrap_or(16);
    let db_path = args.get(2).cloned().unwrap_or_else(|| "roomcast.db".to_string());
    let secret = args.get(3).cloned().unwrap_or_else(|| "public_secret".to_string());

    println!("Roomcast end-to-end fan-out benchmark");
    println!("  server:  {}", SERVER_URL);
    println!("  db:      {}", db_path);
    println!("  clients: {}", num_clients);
    println!();

    let store = SqliteStore::open(&db_path)?;
    for i in 0..num_clients {
        store.add_member(BENCH_ROOM, &format!("bench-{}", i))?;
    }

    run_fanout_benchmark(num_clients, Arc::new(secret)).await;
    Ok(())
}

async fn run_fanout_benchmark(num_clients: usize, secret: Arc<String>) {
    let delivered = Arc::new(AtomicU64::new(0));
    let barrier = Arc::new(Barrier::new(num_clients + 1));

    let mut handles = Vec::new();
    for client_id in 0..num_clients {
        let delivered = Arc::clone(&delivered);
        let barrier = Arc::clone(&barrier);
        let secret = Arc::clone(&secret);

        handles.push(tokio::spawn(async move {
            if let Err(e) = run_client(client_id, &secret, delivered, barrier).await {
                eprintln!("Client {} error: {}", client_id, e);
            }
        }));
    }

    barrier.wait().await;
    println!("All {} clients connected", num_clients);

    println!("Warming up for {}s...", WARMUP_SECS);
    tokio::time::sleep(Duration::from_secs(WARMUP_SECS)).await;

    delivered.store(0, Ordering::SeqCst);
    let start = Instant::now();

    println!("Measuring for {}s...", BENCH_SECS);
    tokio::time::sleep(Duration::from_secs(BENCH_SECS)).await;

    let elapsed = start.elapsed();
    let total = delivered.load(Ordering::SeqCst);
    let per_sec = total as f64 / elapsed.as_secs_f64();

    println!();
    println!("Results");
    println!("  duration:    {:>10.2}s", elapsed.as_secs_f64());
    println!("  delivered:   {:>10}", total);
    println!("  throughput:  {:>10.0} msg/s", per_sec);
    println!("  per client:  {:>10.0} msg/s", per_sec / num_clients as f64);

    for handle in handles {
        handle.abort();
    }
}

fn access_token(user: &str, secret: &str) -> Result<String, BoxError> {
    let claims = Claims {
        user_id: user.to_string(),
        exp: Utc::now().timestamp() + 3600,
        iss: None,
        is_refresh: false,
    };
    Ok(encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?)
}

async fn run_client(
    client_id: usize,
    secret: &str,
    delivered: Arc<AtomicU64>,
    barrier: Arc<Barrier>,
) -> Result<(), BoxError> {
    let token = access_token(&format!("bench-{}", client_id), secret)?;
    let mut request = SERVER_URL.into_client_request()?;
    request.headers_mut().insert(
        COOKIE,
        HeaderValue::from_str(&format!("access_token={}", token))?,
    );

    let (ws, _) = connect_async(request).await?;
    let (mut sender, mut receiver) = ws.split();

    barrier.wait().await;

    let frame = serde_json::json!({
        "room": BENCH_ROOM,
        "data": "A".repeat(64),
        "iv": "aXZ2YWx1ZQ==",
    })
    .to_string();

    let recv_task = tokio::spawn(async move {
        while let Some(Ok(message)) = receiver.next().await {
            if let Message::Text(text) = message {
                if text.contains("\"chatId\"") {
                    delivered.fetch_add(1, Ordering::Relaxed);
                }
            }
        }
    });

    loop {
        if sender.send(Message::Text(frame.clone())).await.is_err() {
            break;
        }
        tokio::task::yield_now().await;
    }

    recv_task.abort();
    Ok(())
}

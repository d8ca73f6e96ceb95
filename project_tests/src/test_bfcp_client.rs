//! # BFCP Client End-to-End Test
//!
//! Spins up a loopback floor-control server, connects a `BfcpClient` to it
//! and walks the whole path: handshake, identifier-scoped registration,
//! request, grant routed back to the matching callback, teardown.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

use lib_bfcp::{BfcpClient, ClientConfig, ConnectionState, EventName, OutboundMessage};

fn setup_logging() -> Result<()> {
    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{}[{}][{}] {}",
                chrono::Local::now().format("[%Y-%m-%d %H:%M:%S]"),
                record.target(),
                record.level(),
                message
            ))
        })
        .level(log::LevelFilter::Debug)
        .chain(std::io::stdout())
        .apply()?;
    Ok(())
}

/// Loopback floor-control server: grants floor 530 to the first requester,
/// denies everything else.
async fn run_server(listener: TcpListener) -> Result<()> {
    let (stream, peer) = listener.accept().await?;
    log::info!("Server accepted connection from {}", peer);
    let mut ws = accept_async(stream).await?;

    while let Some(frame) = ws.next().await {
        match frame? {
            Message::Text(text) => {
                let request: serde_json::Value = serde_json::from_str(&text)?;
                let floor = request["data"]["floorId"].clone();
                let reply = if floor == 530 {
                    serde_json::json!({ "name": "floorGranted", "data": { "floor": floor } })
                } else {
                    serde_json::json!({ "name": "floorDenied", "data": { "floor": floor } })
                };
                ws.send(Message::Text(reply.to_string().into())).await?;
            }
            Message::Close(_) => break,
            _ => {}
        }
    }
    log::info!("Server connection finished");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_logging()?;

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let server = tokio::spawn(run_server(listener));

    println!("[*] Loopback floor-control server on {}", addr);

    let client = BfcpClient::new(ClientConfig {
        connect_timeout_ms: Some(5_000),
        user_agent: Some("test_bfcp_client".to_string()),
    });

    let granted = Arc::new(AtomicUsize::new(0));
    let denied = Arc::new(AtomicUsize::new(0));

    let granted_sink = Arc::clone(&granted);
    client.register_callback(EventName::FloorGranted, "530", move |payload| {
        println!("[*] floorGranted for our floor: {}", payload);
        granted_sink.fetch_add(1, Ordering::SeqCst);
    });

    let denied_sink = Arc::clone(&denied);
    client.register_callback(EventName::FloorDenied, "777", move |payload| {
        println!("[*] floorDenied for our floor: {}", payload);
        denied_sink.fetch_add(1, Ordering::SeqCst);
    });

    client.on(EventName::Close, |_| println!("[*] Connection closed"));

    println!("[*] Connecting...");
    client.connect(&format!("ws://{}", addr)).await;
    if client.state() != ConnectionState::Open {
        eprintln!("\n[ERROR] Client failed to reach OPEN; state is {:?}", client.state());
        std::process::exit(1);
    }
    println!("[*] Connection open");

    client.send(&OutboundMessage::FloorRequest {
        conference_id: 1,
        user_id: 99,
        floor_id: 530,
    })?;
    client.send(&OutboundMessage::FloorRequest {
        conference_id: 1,
        user_id: 99,
        floor_id: 777,
    })?;

    for _ in 0..100 {
        if granted.load(Ordering::SeqCst) == 1 && denied.load(Ordering::SeqCst) == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    client.close();
    let _ = server.await?;

    if granted.load(Ordering::SeqCst) == 1 && denied.load(Ordering::SeqCst) == 1 {
        println!("\n[SUCCESS] Both identifier-scoped callbacks fired exactly once.");
        Ok(())
    } else {
        eprintln!(
            "\n[ERROR] Callback counts off: granted={}, denied={}",
            granted.load(Ordering::SeqCst),
            denied.load(Ordering::SeqCst)
        );
        std::process::exit(1);
    }
}

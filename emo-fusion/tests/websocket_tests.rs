//! Real-time WebSocket end-to-end tests
//!
//! Serve the full router on an ephemeral port and talk to `/ws/realtime`
//! with a real WebSocket client.

mod helpers;

use emo_common::config::TomlConfig;
use emo_common::Modality;
use emo_fusion::analyzer::AnalyzerError;
use emo_fusion::config::FusionSettings;
use emo_fusion::{build_router, AppState};
use futures::{SinkExt, StreamExt};
use helpers::{text, ScriptedAnalyzer};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn spawn_server(analyzer: ScriptedAnalyzer) -> (SocketAddr, AppState) {
    let settings = FusionSettings::from_toml(&TomlConfig::default()).unwrap();
    let state = AppState::new(Arc::new(analyzer), &settings);
    let app = build_router(state.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, state)
}

async fn connect(addr: SocketAddr) -> Client {
    let (client, _) = connect_async(format!("ws://{}/ws/realtime", addr))
        .await
        .unwrap();
    client
}

async fn next_json(client: &mut Client) -> Value {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(2), client.next())
            .await
            .expect("no frame received")
            .expect("connection closed")
            .unwrap();
        if let Message::Text(text) = frame {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

async fn send_json(client: &mut Client, value: Value) {
    client.send(Message::Text(value.to_string())).await.unwrap();
}

#[tokio::test]
async fn test_realtime_session_round_trip() {
    let analyzer = ScriptedAnalyzer::new()
        .succeed(text("joy", 0.85, &[("joy", 0.85), ("sadness", 0.15)]))
        .fail(Modality::Voice, AnalyzerError::Unavailable("model not loaded".into()));
    let (addr, state) = spawn_server(analyzer).await;
    let mut client = connect(addr).await;

    let welcome = next_json(&mut client).await;
    assert_eq!(welcome["type"], "connected");
    assert!(welcome["timestamp"].is_string());
    assert_eq!(state.registry.len().await, 1);

    send_json(&mut client, json!({"type": "ping"})).await;
    assert_eq!(next_json(&mut client).await["type"], "pong");

    send_json(
        &mut client,
        json!({"type": "analyze_text", "text": "I love this song so much", "language": "en"}),
    )
    .await;
    let result = next_json(&mut client).await;
    assert_eq!(result["type"], "analysis_result");
    assert_eq!(result["modality"], "text");
    assert_eq!(result["result"]["emotion"], "joy");
    assert_eq!(result["result"]["all_emotions"]["sadness"], 0.15);

    send_json(&mut client, json!({"type": "analyze_audio", "audio": "GkXfow=="})).await;
    let error = next_json(&mut client).await;
    assert_eq!(error["type"], "error");
    assert_eq!(error["modality"], "voice");
    assert!(error["message"].as_str().unwrap().contains("model not loaded"));
}

#[tokio::test]
async fn test_session_unregistered_after_close() {
    let (addr, state) = spawn_server(ScriptedAnalyzer::new()).await;
    let mut client = connect(addr).await;
    assert_eq!(next_json(&mut client).await["type"], "connected");
    assert_eq!(state.registry.len().await, 1);

    client.close(None).await.unwrap();

    let mut remaining = state.registry.len().await;
    for _ in 0..40 {
        if remaining == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
        remaining = state.registry.len().await;
    }
    assert_eq!(remaining, 0);
}

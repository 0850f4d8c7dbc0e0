//! WebSocket channel for the dashboard
//!
//! Pushes every `DetectionEvent` to the client and accepts short text
//! commands. Detection commands run as independent tasks so several can be
//! in flight at once; their replies arrive in completion order.

use crate::engine::{DetectionEngine, DetectionEvent, Modality};
use actix_web::{web, HttpRequest, HttpResponse};
use actix_ws::{Message, Session};
use futures::StreamExt;
use serde_json::{json, Value};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

/// Upgrade to a WebSocket session
pub async fn ws_handler(
    req: HttpRequest,
    stream: web::Payload,
    engine: web::Data<DetectionEngine>,
) -> Result<HttpResponse, actix_web::Error> {
    let (response, session, msg_stream) = actix_ws::handle(&req, stream)?;

    let engine = engine.get_ref().clone();
    actix_web::rt::spawn(handle_session(session, msg_stream, engine));

    Ok(response)
}

async fn handle_session(mut session: Session, mut msg_stream: actix_ws::MessageStream, engine: DetectionEngine) {
    let mut events = engine.events();

    let welcome = json!({
        "type": "welcome",
        "message": format!("Vigil dashboard v{}", env!("CARGO_PKG_VERSION")),
        "commands": COMMANDS.iter().map(|(name, _)| *name).collect::<Vec<_>>(),
        "state": engine.snapshot(),
    });
    if session.text(welcome.to_string()).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            msg = msg_stream.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(reply) = process_command(&text, &engine, &session) {
                            if session.text(reply.to_string()).await.is_err() {
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Ping(bytes))) => {
                        if session.pong(&bytes).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(reason))) => {
                        let _ = session.close(reason).await;
                        return;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!("WebSocket protocol error: {}", e);
                        break;
                    }
                    None => break,
                }
            }
            event = events.recv() => {
                match event {
                    Ok(event) => {
                        if session.text(event_frame(&event)).await.is_err() {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        debug!("WebSocket client lagged, skipped {} events", skipped);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }
    }

    let _ = session.close(None).await;
}

const COMMANDS: [(&str, &str); 8] = [
    ("help", "Show this help message"),
    ("state", "Show the current risk state"),
    ("start", "Start frame capture"),
    ("weapon", "Run weapon detection on the latest frame"),
    ("violence", "Run violence detection on the latest frame"),
    ("text <body>", "Replace the text buffer"),
    ("analyze", "Run text analysis on the text buffer"),
    ("clear", "Clear terminal"),
];

fn event_frame(event: &DetectionEvent) -> String {
    json!({ "type": "event", "event": event }).to_string()
}

fn error_frame(kind: &str, message: impl std::fmt::Display) -> Value {
    json!({ "type": "error", "kind": kind, "message": message.to_string() })
}

/// Handle one command line. Returns the immediate reply, if any; detection
/// commands reply later from their own task.
fn process_command(command: &str, engine: &DetectionEngine, session: &Session) -> Option<Value> {
    let command = command.trim();
    let (cmd, rest) = command.split_once(char::is_whitespace).unwrap_or((command, ""));
    let cmd = cmd.to_lowercase();

    match cmd.as_str() {
        "help" => {
            let commands: serde_json::Map<String, Value> = COMMANDS
                .iter()
                .map(|(name, help)| (name.to_string(), Value::from(*help)))
                .collect();
            Some(json!({ "type": "help", "commands": commands }))
        }
        "state" => Some(json!({ "type": "state", "data": engine.snapshot() })),
        "start" => match engine.start_capture() {
            Ok(()) => Some(json!({ "type": "start", "message": "Capture started" })),
            Err(e) => Some(error_frame("capture_unavailable", e)),
        },
        "text" => {
            engine.set_text(rest.trim());
            Some(json!({ "type": "text", "message": "Text buffer updated" }))
        }
        "analyze" => {
            spawn_detection(Modality::TextAnalysis, engine, session);
            None
        }
        "weapon" | "violence" => {
            let modality = cmd.parse::<Modality>().ok()?;
            spawn_detection(modality, engine, session);
            None
        }
        "clear" => Some(json!({ "type": "clear" })),
        "" => None,
        _ => Some(error_frame("unknown_command", format!("Unknown command: {}", cmd))),
    }
}

fn spawn_detection(modality: Modality, engine: &DetectionEngine, session: &Session) {
    let engine = engine.clone();
    let mut session = session.clone();

    actix_web::rt::spawn(async move {
        let reply = match engine.run_detection(modality).await {
            Ok(outcome) => json!({ "type": "detection", "outcome": outcome }),
            Err(e) => error_frame(e.kind(), &e),
        };
        let _ = session.text(reply.to_string()).await;
    });
}

use crate::model::{ClientCommand, MotionSample};
use crate::server::AppState;
use actix_web::{web, HttpRequest, Responder};
use actix_ws::Message;
use futures_util::StreamExt;
use tokio::sync::broadcast::error::RecvError;

/// What a text frame from a client turned out to be.
#[derive(Debug, PartialEq)]
pub enum Inbound {
    Command(Command),
    Sample(MotionSample),
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    CancelAlert,
    TestAlert,
    ResetSystem,
}

pub fn parse_frame(text: &str) -> Inbound {
    // Commands first: a sample never carries an `action` field.
    if let Ok(cmd) = serde_json::from_str::<ClientCommand>(text) {
        return match cmd.action.as_str() {
            "CANCEL_ALERT" => Inbound::Command(Command::CancelAlert),
            "TEST_ALERT" => Inbound::Command(Command::TestAlert),
            "RESET_SYSTEM" => Inbound::Command(Command::ResetSystem),
            _ => Inbound::Unknown,
        };
    }
    match serde_json::from_str::<MotionSample>(text) {
        Ok(sample) => Inbound::Sample(sample),
        Err(_) => Inbound::Unknown,
    }
}

pub async fn ws_handler(
    req: HttpRequest,
    stream: web::Payload,
    data: web::Data<AppState>,
) -> Result<impl Responder, actix_web::Error> {
    let (res, mut session, mut msg_stream) = actix_ws::handle(&req, stream)?;
    let mut rx = data.monitor.subscribe();

    actix_rt::spawn(async move {
        loop {
            tokio::select! {
                val = msg_stream.next() => {
                    match val {
                        Some(Ok(Message::Text(text))) => match parse_frame(&text) {
                            Inbound::Command(Command::CancelAlert) => data.monitor.cancel_alert(),
                            Inbound::Command(Command::TestAlert) => {
                                let _ = data.monitor.trigger_test_alert();
                            }
                            Inbound::Command(Command::ResetSystem) => data.monitor.reset(),
                            Inbound::Sample(sample) => {
                                if !data.feed.push(sample) {
                                    tracing::warn!("Fall monitor is not running, sample dropped");
                                }
                            }
                            Inbound::Unknown => {
                                tracing::debug!(frame = %text, "⚠️ Received unknown format");
                            }
                        },
                        Some(Ok(Message::Ping(bytes))) => {
                            if session.pong(&bytes).await.is_err() {
                                break;
                            }
                        }
                        Some(Ok(Message::Close(_))) => break,
                        Some(Err(e)) => {
                            tracing::warn!(error = %e, "WebSocket protocol error");
                            break;
                        }
                        None => break,
                        _ => {}
                    }
                }
                val = rx.recv() => {
                    match val {
                        Ok(event) => {
                            let Ok(json) = serde_json::to_string(&event) else { continue };
                            if session.text(json).await.is_err() {
                                break;
                            }
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            tracing::warn!(skipped, "Client lagging behind monitor events");
                        }
                        Err(RecvError::Closed) => break,
                    }
                }
            }
        }
        let _ = session.close(None).await;
    });

    Ok(res)
}

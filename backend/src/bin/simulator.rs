use futures_util::{SinkExt, StreamExt};
use rand::Rng;
use serde_json::json;
use std::env;
use tokio::time::{sleep, Duration};
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};
use url::Url;

const SAMPLE_INTERVAL_MS: u64 = 100;

/// Replays a fall against a running gateway.
///
/// `simulator [--cancel] [--no-rotation]`
/// - `--cancel`: press "I'm OK" two seconds into the countdown.
/// - `--no-rotation`: keep the gyroscope quiet so the episode times out.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_target(false).init();

    let args: Vec<String> = env::args().skip(1).collect();
    let cancel = args.iter().any(|a| a == "--cancel");
    let rotate = !args.iter().any(|a| a == "--no-rotation");

    let url = Url::parse(
        &env::var("SENTINEL_WS_URL").unwrap_or_else(|_| "ws://127.0.0.1:8080/ws".to_string()),
    )?;

    tracing::info!(%url, "🔌 Connecting to gateway...");

    // 1. Connect
    let (ws_stream, _) = connect_async(url.to_string()).await?;
    let (mut write, mut read) = ws_stream.split();

    // Print whatever the monitor pushes back
    tokio::spawn(async move {
        while let Some(Ok(msg)) = read.next().await {
            if let Message::Text(text) = msg {
                tracing::info!(event = %text, "⬅️");
            }
        }
    });

    tracing::info!("✅ Connected! Starting data stream...");
    let mut rng = rand::thread_rng();
    let mut t = chrono::Utc::now().timestamp_millis();
    let mut tick = || {
        t += SAMPLE_INTERVAL_MS as i64;
        t
    };

    // 2. Phone at rest in a pocket
    for _ in 0..10 {
        let z = 9.8 + rng.gen_range(-0.3..0.3);
        write.send(sample("accelerometer", 0.1, 0.2, z, tick())).await?;
        sleep(Duration::from_millis(SAMPLE_INTERVAL_MS)).await;
    }

    // 3. Impact, then the body rolls over
    tracing::info!("⚠️ SIMULATING FALL EVENT!");
    write.send(sample("accelerometer", 14.0, 6.5, 6.0, tick())).await?;
    let rotation = if rotate { 2.0 } else { 0.4 };
    write.send(sample("gyroscope", rotation, 0.3, 0.1, tick())).await?;

    // 4. Lying still on the floor for three seconds
    for _ in 0..30 {
        let z = 9.8 + rng.gen_range(-0.2..0.2);
        write.send(sample("accelerometer", 0.05, 0.1, z, tick())).await?;
        sleep(Duration::from_millis(SAMPLE_INTERVAL_MS)).await;
    }

    if cancel {
        sleep(Duration::from_secs(2)).await;
        tracing::info!("🛡️ Sending CANCEL_ALERT");
        write
            .send(Message::Text(json!({ "action": "CANCEL_ALERT" }).to_string().into()))
            .await?;
    }

    // Let the countdown play out on screen
    sleep(Duration::from_secs(7)).await;
    tracing::info!("🛑 Simulation finished.");
    Ok(())
}

fn sample(sensor: &str, x: f64, y: f64, z: f64, t: i64) -> Message {
    let packet = json!({ "sensor": sensor, "x": x, "y": y, "z": z, "t": t });
    Message::Text(packet.to_string().into())
}

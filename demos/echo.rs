//! Two-endpoint loopback demo: exchanges a handful of reliable and
//! unreliable messages and prints the resulting metrics of each side.
//!
//! ```bash
//! RUST_LOG=debug cargo run --bin echo
//! ```

use std::time::Duration;

use netchan::Endpoint;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let alice = Endpoint::bind("127.0.0.1:0".parse().unwrap(), "127.0.0.1:0".parse().unwrap()).await?;
    let alice_addr = alice.local_addr()?;

    let bob = Endpoint::bind("127.0.0.1:0".parse().unwrap(), alice_addr).await?;
    let bob_addr = bob.local_addr()?;
    alice.close().await;
    let alice = Endpoint::bind("127.0.0.1:0".parse().unwrap(), bob_addr).await?;

    for i in 0..5 {
        alice.send(format!("reliable chat message {i}"), true).await?;
        alice.send(format!("unreliable position update {i}"), false).await?;
    }

    tokio::time::sleep(Duration::from_millis(300)).await;

    let mut received = 0;
    while let Some(frame) = bob.try_receive() {
        tracing::info!(payload = %frame.payload, channel = ?frame.channel, "received");
        received += 1;
    }
    tracing::info!(received, "echo demo finished receiving");

    let alice_metrics = alice.metrics();
    let bob_metrics = bob.metrics();
    tracing::info!(?alice_metrics, "alice metrics");
    tracing::info!(?bob_metrics, "bob metrics");

    alice.close().await;
    bob.close().await;
    Ok(())
}

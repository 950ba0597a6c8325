//! Demo driver for the in-process broker.
//!
//! Loads configuration, initializes logging, registers a pair of logging
//! subscribers and publishes a periodic stream of timestamped messages.
//! On ctrl-c the broker is closed with the configured drain deadline.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};

use fanout::broker::{Broker, Message};
use fanout::config::load_config;
use fanout::utils::logging;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return;
        }
    };
    logging::init(&config.log.level);

    let broker: Arc<Broker<Message>> = Arc::new(Broker::new());

    let mut subscriptions = Vec::new();
    for name in ["alpha", "beta"] {
        let sub = broker.subscribe("ticks", move |msg: Message| {
            info!("[{name}] received {} (published at {})", msg.payload, msg.timestamp);
        });
        match sub {
            Ok(sub) => subscriptions.push(sub),
            Err(e) => {
                error!("Subscribe failed: {e}");
                return;
            }
        }
    }

    let publisher = {
        let broker = Arc::clone(&broker);
        async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(1));
            let mut seq: u64 = 0;
            loop {
                ticker.tick().await;
                seq += 1;
                let payload = serde_json::json!({ "seq": seq }).to_string();
                if let Err(e) = broker.publish("ticks", Message::new(payload)) {
                    error!("Publish failed: {e}");
                    break;
                }
            }
        }
    };

    tokio::select! {
        _ = publisher => {
            error!("Publisher exited unexpectedly.");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received. Draining subscribers.");
        }
    }

    let deadline = Duration::from_secs(config.broker.drain_timeout_secs);
    match broker.close(Some(deadline)).await {
        Ok(()) => info!("All subscribers drained. Exiting gracefully."),
        Err(e) => error!("Shutdown incomplete: {e}"),
    }
}

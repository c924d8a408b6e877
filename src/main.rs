use std::error::Error;

use tokio::sync::mpsc;
use tracing::{error, info};

use topicbus::config::load_config;
use topicbus::utils::logging;
use topicbus::{MessageClient, TopicChannel};

const CHANNEL_CAPACITY: usize = 64;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenvy::dotenv().ok();

    let settings = load_config()?;
    logging::init(&settings.log.level);

    let config = settings.message_bus_config()?;
    info!(broker = %config.broker.url(), bus_type = %config.bus_type, "starting message client");
    let client = MessageClient::new(config)?;
    client.connect().await?;

    let (messages_tx, mut messages_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let (errors_tx, mut errors_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let topics = settings
        .subscribe
        .topics
        .iter()
        .map(|topic| TopicChannel::new(topic.as_str(), messages_tx.clone()))
        .collect();
    drop(messages_tx);

    client.subscribe(topics, errors_tx).await?;
    info!(topics = ?settings.subscribe.topics, "subscribed, waiting for messages");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            Some(message) = messages_rx.recv() => {
                info!(
                    topic = %message.received_topic,
                    correlation_id = %message.correlation_id,
                    content_type = %message.content_type,
                    bytes = message.payload.len(),
                    "message received"
                );
            }
            Some(err) = errors_rx.recv() => {
                error!(error = %err, "subscription error");
            }
        }
    }

    info!("shutting down");
    client.unsubscribe(settings.subscribe.topics.as_slice()).await?;
    client.disconnect().await?;
    Ok(())
}

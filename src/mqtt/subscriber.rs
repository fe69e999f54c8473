//! Feeds inbound MQTT messages into the rule dispatcher

use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::response::RuleDispatcher;

use super::client::IncomingMessage;

/// Run the subscriber task
///
/// Hands every received message to the dispatcher until the channel closes.
pub async fn run_subscriber(
    dispatcher: Arc<RuleDispatcher>,
    mut message_rx: mpsc::Receiver<IncomingMessage>,
) {
    info!("Subscriber ready");

    while let Some(msg) = message_rx.recv().await {
        let scheduled = dispatcher.on_inbound_message(&msg.topic, &msg.payload, &msg.sender_id);
        if scheduled > 0 {
            debug!("Scheduled {} response(s) for {}", scheduled, msg.topic);
        }
    }

    warn!("Subscriber message channel closed");
}

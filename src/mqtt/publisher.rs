//! Response publishing over MQTT
//!
//! Bridges the broker-agnostic [`MessagePublisher`] to rumqttc.

use std::time::Duration;

use async_trait::async_trait;
use rumqttc::v5::mqttbytes::v5::PublishProperties;
use rumqttc::v5::mqttbytes::QoS as WireQoS;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::error::MqttError;
use crate::publisher::{MessagePublisher, QoS};

use super::client::{MqttClient, CLIENT_ID_PROPERTY};

fn wire_qos(qos: QoS) -> WireQoS {
    match qos {
        QoS::AtMostOnce => WireQoS::AtMostOnce,
        QoS::AtLeastOnce => WireQoS::AtLeastOnce,
        QoS::ExactlyOnce => WireQoS::ExactlyOnce,
    }
}

fn publish_properties(client_id: &str) -> PublishProperties {
    PublishProperties {
        user_properties: vec![(CLIENT_ID_PROPERTY.to_string(), client_id.to_string())],
        ..Default::default()
    }
}

/// Await a publish, giving up after `limit`
///
/// Keeps a stalled client channel (e.g. during a broker outage) from
/// blocking response tasks forever.
async fn bounded<F>(topic: &str, limit: Duration, publish: F) -> Result<(), MqttError>
where
    F: std::future::Future<Output = Result<(), MqttError>>,
{
    match timeout(limit, publish).await {
        Ok(result) => result,
        Err(_) => {
            warn!(
                "Publish timeout for {} after {}s - MQTT client may be stalled",
                topic,
                limit.as_secs()
            );
            Err(MqttError::Timeout(limit.as_secs()))
        }
    }
}

#[async_trait]
impl MessagePublisher for MqttClient {
    async fn publish(
        &self,
        topic: &str,
        payload: &str,
        qos: QoS,
        retain: bool,
    ) -> Result<(), MqttError> {
        debug!("Publishing to {}: {}", topic, payload);
        let send = async {
            self.client
                .publish_with_properties(
                    topic,
                    wire_qos(qos),
                    retain,
                    payload.as_bytes().to_vec(),
                    publish_properties(&self.client_id),
                )
                .await
                .map_err(|e| MqttError::PublishFailed(e.to_string()))
        };
        bounded(topic, self.publish_timeout, send).await
    }
}

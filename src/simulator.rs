//! Simulated devices
//!
//! Each enabled device publishes its rendered payload template on a fixed
//! interval, giving subscribers realistic background traffic.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::publisher::MessagePublisher;
use crate::response::PublishOptions;
use crate::sequence::SequenceStore;
use crate::template::{RenderContext, TemplateEngine};

/// A device that publishes on its own schedule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulatedDevice {
    pub id: String,
    /// Topic template, rendered each tick
    pub topic: String,
    pub payload_template: String,
    #[serde(rename = "intervalMs", with = "crate::response::duration_ms")]
    pub interval: Duration,
    /// Base seed; tick `n` renders with `seed + n`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    #[serde(default = "enabled")]
    pub enabled: bool,
}

fn enabled() -> bool {
    true
}

/// Shared collaborators for every device loop
#[derive(Clone)]
pub struct Simulator {
    engine: TemplateEngine,
    sequences: Arc<SequenceStore>,
    publisher: Arc<dyn MessagePublisher>,
    options: PublishOptions,
    connected: Arc<AtomicBool>,
}

impl Simulator {
    pub fn new(
        engine: TemplateEngine,
        sequences: Arc<SequenceStore>,
        publisher: Arc<dyn MessagePublisher>,
        options: PublishOptions,
        connected: Arc<AtomicBool>,
    ) -> Self {
        Self {
            engine,
            sequences,
            publisher,
            options,
            connected,
        }
    }

    /// Start a loop for every enabled device
    pub fn spawn_all(&self, devices: Vec<SimulatedDevice>) -> Vec<JoinHandle<()>> {
        devices
            .into_iter()
            .filter(|device| {
                if !device.enabled {
                    debug!("Device {} disabled, not simulating", device.id);
                }
                device.enabled
            })
            .map(|device| tokio::spawn(self.clone().run_device(device)))
            .collect()
    }

    /// Render one tick's topic and payload
    pub fn render(&self, device: &SimulatedDevice, tick: u64) -> (String, String) {
        let mut ctx = RenderContext::new(device.topic.as_str())
            .with_client_id(device.id.as_str())
            .with_device_id(device.id.as_str())
            .with_sequences(Arc::clone(&self.sequences));
        if let Some(seed) = device.seed {
            ctx = ctx.with_seed(seed.wrapping_add(tick));
        }
        (
            self.engine.render(&device.topic, &ctx),
            self.engine.render(&device.payload_template, &ctx),
        )
    }

    /// Run a device's publish loop until the task is dropped
    pub async fn run_device(self, device: SimulatedDevice) {
        if device.interval.is_zero() {
            warn!("Device {} has a zero interval, not simulating", device.id);
            return;
        }
        info!(
            "Simulating device {} on {} every {}ms",
            device.id,
            device.topic,
            device.interval.as_millis()
        );

        let mut ticker = interval(device.interval);
        // A stalled broker must not cause a burst of catch-up publishes
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut was_disconnected = false;
        let mut tick: u64 = 0;

        loop {
            ticker.tick().await;

            if !self.connected.load(Ordering::Relaxed) {
                if !was_disconnected {
                    warn!("MQTT broker disconnected, pausing device {}", device.id);
                    was_disconnected = true;
                }
                continue;
            }
            if was_disconnected {
                info!("MQTT broker reconnected, resuming device {}", device.id);
                was_disconnected = false;
            }

            let (topic, payload) = self.render(&device, tick);
            tick = tick.wrapping_add(1);
            if topic.is_empty() {
                warn!("Device {} rendered an empty topic, skipping", device.id);
                continue;
            }

            debug!("Device {} publishing to {}: {}", device.id, topic, payload);
            if let Err(e) = self
                .publisher
                .publish(&topic, &payload, self.options.qos, self.options.retain)
                .await
            {
                error!("Device {} failed to publish to {}: {}", device.id, topic, e);
            }
        }
    }
}

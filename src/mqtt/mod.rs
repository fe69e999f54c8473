//! MQTT module - client, publisher, and subscriber

mod client;
mod publisher;
mod subscriber;

pub use client::{run_event_loop, IncomingMessage, MqttClient};
pub use subscriber::run_subscriber;

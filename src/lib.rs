//! mqtt-mockd - rule-driven mock responses for MQTT
//!
//! Watches topics on a broker and answers matching messages with
//! templated payloads:
//! - MQTT topic filter matching with wildcard capture
//! - JSONPath conditions evaluated against inbound payloads
//! - Payload templates with faker data, sequences and seeded randomness
//! - Prioritized rules with delays and loop prevention
//! - Simulated devices publishing on an interval

pub mod condition;
pub mod config;
pub mod error;
pub mod loop_guard;
pub mod mqtt;
pub mod publisher;
pub mod response;
pub mod sequence;
pub mod simulator;
pub mod template;
pub mod topic;

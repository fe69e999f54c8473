//! mqtt-mockd - mock MQTT device daemon
//!
//! Loads response definitions, mock responses and simulated devices from
//! the responses file and serves them against a broker.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use mqtt_mockd::config::{Config, ResponsesFile};
use mqtt_mockd::error::Result;
use mqtt_mockd::mqtt::{run_event_loop, run_subscriber, MqttClient};
use mqtt_mockd::response::{PublishOptions, RuleDispatcher};
use mqtt_mockd::sequence::SequenceStore;
use mqtt_mockd::simulator::Simulator;
use mqtt_mockd::template::TemplateEngine;

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if std::env::var("DEBUG")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false)
        {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    if let Err(e) = run().await {
        error!("Fatal error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let config = Config::from_env()?;

    if config.debug {
        info!("Debug mode enabled");
    }

    let responses = ResponsesFile::load(&config.responses_file)?;
    info!(
        "Loaded {} definitions, {} mock responses, {} devices from {}",
        responses.responses.len(),
        responses.mock_responses.len(),
        responses.devices.len(),
        config.responses_file.display()
    );

    let client_id = config.client_id();
    let (mqtt_client, eventloop) = MqttClient::new(&config.mqtt, &client_id)?;
    let async_client = mqtt_client.clone_client();
    let mqtt_client = Arc::new(mqtt_client);
    let connected = Arc::new(AtomicBool::new(false));

    let options = PublishOptions {
        qos: config.response_qos,
        retain: config.response_retain,
    };
    // Responses and simulated devices share one set of sequence counters
    let engine = TemplateEngine::new();
    let sequences = Arc::new(SequenceStore::new());
    let dispatcher = Arc::new(
        RuleDispatcher::new(mqtt_client.clone())
            .with_engine(engine.clone())
            .with_sequences(Arc::clone(&sequences))
            .with_publish_options(options),
    );
    let rejected = dispatcher.load(responses.responses, responses.mock_responses);
    if !rejected.is_empty() {
        warn!("{} invalid entries in the responses file were skipped", rejected.len());
    }

    let (message_tx, message_rx) = mpsc::channel(100);
    let eventloop_handle = tokio::spawn(run_event_loop(
        eventloop,
        async_client,
        config.subscribe_topics.clone(),
        message_tx,
        Arc::clone(&connected),
    ));

    let subscriber_handle = tokio::spawn(run_subscriber(Arc::clone(&dispatcher), message_rx));

    let simulator = Simulator::new(
        engine,
        sequences,
        mqtt_client,
        options,
        connected,
    );
    let device_handles = simulator.spawn_all(responses.devices);

    info!(
        "mqtt-mockd started as {}, listening on {}",
        client_id,
        config.subscribe_topics.join(", ")
    );

    tokio::select! {
        _ = eventloop_handle => {
            error!("MQTT event loop exited unexpectedly");
        }
        _ = subscriber_handle => {
            error!("Subscriber exited unexpectedly");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
    }

    for handle in device_handles {
        handle.abort();
    }

    Ok(())
}

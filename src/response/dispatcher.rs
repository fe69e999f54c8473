//! Conditional response dispatch
//!
//! For every inbound message each enabled definition whose trigger matches
//! picks at most one outcome: the first rule (by priority) whose condition
//! holds, otherwise its enabled default. Standalone mocks fire alongside.
//! The chosen responses are rendered and published on detached tasks so
//! the caller never waits on delays, templates or the broker.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde_json::Value;
use tokio::sync::broadcast;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::condition::{evaluate_value, ConditionEvaluator};
use crate::error::{ConditionError, ValidationError};
use crate::loop_guard::LoopGuard;
use crate::publisher::{MessagePublisher, QoS};
use crate::sequence::SequenceStore;
use crate::template::{RenderContext, TemplateEngine};
use crate::topic;

use super::model::{MockResponse, ResponseDefinition, Rule};
use super::validate::{validate_definition, validate_mock};

/// Capacity of the response event channel
const EVENT_CAPACITY: usize = 256;

/// What produced a response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseSource {
    Rule {
        definition_id: String,
        rule_id: String,
    },
    Default {
        definition_id: String,
    },
    Mock {
        mock_id: String,
    },
}

/// Broadcast after a generated response was published
#[derive(Debug, Clone)]
pub struct ResponseEvent {
    pub source: ResponseSource,
    pub trigger_topic: String,
    pub topic: String,
    pub payload: String,
    pub published_at: DateTime<Utc>,
}

/// QoS and retain flag used for every generated response
#[derive(Debug, Clone, Copy, Default)]
pub struct PublishOptions {
    pub qos: QoS,
    pub retain: bool,
}

/// Owns the response definitions and turns inbound messages into responses
pub struct RuleDispatcher {
    definitions: RwLock<Vec<ResponseDefinition>>,
    mocks: RwLock<Vec<MockResponse>>,
    evaluator: Arc<ConditionEvaluator>,
    engine: TemplateEngine,
    sequences: Arc<SequenceStore>,
    loop_guard: Arc<LoopGuard>,
    publisher: Arc<dyn MessagePublisher>,
    options: PublishOptions,
    tasks: TaskTracker,
    events: broadcast::Sender<ResponseEvent>,
}

impl RuleDispatcher {
    pub fn new(publisher: Arc<dyn MessagePublisher>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            definitions: RwLock::new(Vec::new()),
            mocks: RwLock::new(Vec::new()),
            evaluator: Arc::new(ConditionEvaluator::new()),
            engine: TemplateEngine::new(),
            sequences: Arc::new(SequenceStore::new()),
            loop_guard: Arc::new(LoopGuard::new()),
            publisher,
            options: PublishOptions::default(),
            tasks: TaskTracker::new(),
            events,
        }
    }

    pub fn with_engine(mut self, engine: TemplateEngine) -> Self {
        self.engine = engine;
        self
    }

    pub fn with_sequences(mut self, sequences: Arc<SequenceStore>) -> Self {
        self.sequences = sequences;
        self
    }

    pub fn with_publish_options(mut self, options: PublishOptions) -> Self {
        self.options = options;
        self
    }

    pub fn loop_guard(&self) -> &Arc<LoopGuard> {
        &self.loop_guard
    }

    /// Observe every response published from now on
    pub fn subscribe(&self) -> broadcast::Receiver<ResponseEvent> {
        self.events.subscribe()
    }

    /// Select and schedule responses for an inbound message
    ///
    /// Returns how many responses were scheduled. Never waits for them.
    pub fn on_inbound_message(&self, topic: &str, payload: &str, sender_id: &str) -> usize {
        if self.loop_guard.is_active(topic) {
            debug!("Ignoring message on {} - response in flight there", topic);
            return 0;
        }

        let definitions = self.list_definitions();
        let mocks = self.list_mocks();
        let doc: Result<Value, ConditionError> = serde_json::from_str(payload)
            .map_err(|e| ConditionError::InvalidPayload(e.to_string()));

        let mut scheduled = 0;
        for definition in definitions
            .iter()
            .filter(|d| d.enabled && topic::matches(&d.trigger_pattern, topic))
        {
            if let Some(pending) = self.select_outcome(definition, &doc) {
                self.spawn(pending, topic, payload, sender_id);
                scheduled += 1;
            } else {
                debug!("Definition {} matched {} but produced no response", definition.id, topic);
            }
        }

        for mock in mocks
            .iter()
            .filter(|m| m.enabled && topic::matches(&m.trigger_pattern, topic))
        {
            let pending = PendingResponse::from_mock(
                ResponseSource::Mock {
                    mock_id: mock.id.clone(),
                },
                &mock.trigger_pattern,
                mock,
            );
            self.spawn(pending, topic, payload, sender_id);
            scheduled += 1;
        }

        scheduled
    }

    fn select_outcome(
        &self,
        definition: &ResponseDefinition,
        doc: &Result<Value, ConditionError>,
    ) -> Option<PendingResponse> {
        for rule in definition.rules_by_priority() {
            if !rule.enabled {
                continue;
            }
            match self.rule_matches(rule, doc) {
                Ok(true) => {
                    debug!("Rule {} of {} matched", rule.id, definition.id);
                    return Some(PendingResponse::from_rule(definition, rule));
                }
                Ok(false) => {}
                Err(e) => warn!("Skipping rule {} of {}: {}", rule.id, definition.id, e),
            }
        }

        definition
            .default_response
            .as_ref()
            .filter(|response| response.enabled)
            .map(|response| {
                PendingResponse::from_mock(
                    ResponseSource::Default {
                        definition_id: definition.id.clone(),
                    },
                    &definition.trigger_pattern,
                    response,
                )
            })
    }

    fn rule_matches(
        &self,
        rule: &Rule,
        doc: &Result<Value, ConditionError>,
    ) -> Result<bool, ConditionError> {
        let parsed = self.evaluator.parse(&rule.condition)?;
        match doc {
            Ok(doc) => evaluate_value(&parsed, doc),
            Err(e) => Err(e.clone()),
        }
    }

    fn spawn(&self, pending: PendingResponse, topic: &str, payload: &str, sender_id: &str) {
        let job = ResponseJob {
            pending,
            trigger_topic: topic.to_string(),
            trigger_payload: payload.to_string(),
            sender_id: sender_id.to_string(),
            engine: self.engine.clone(),
            sequences: Arc::clone(&self.sequences),
            loop_guard: Arc::clone(&self.loop_guard),
            publisher: Arc::clone(&self.publisher),
            options: self.options,
            events: self.events.clone(),
        };
        self.tasks.spawn(job.run());
    }

    /// Wait until every response scheduled so far has finished
    pub async fn drain(&self) {
        self.tasks.close();
        self.tasks.wait().await;
        self.tasks.reopen();
    }

    /// Number of response tasks still running
    pub fn in_flight(&self) -> usize {
        self.tasks.len()
    }

    pub fn add_definition(&self, definition: ResponseDefinition) {
        self.definitions.write().push(definition);
    }

    /// Replace the definition with the same id; `false` if there is none
    pub fn update_definition(&self, mut definition: ResponseDefinition) -> bool {
        let mut definitions = self.definitions.write();
        match definitions.iter_mut().find(|d| d.id == definition.id) {
            Some(existing) => {
                definition.created_at = existing.created_at;
                definition.updated_at = Utc::now();
                *existing = definition;
                true
            }
            None => false,
        }
    }

    pub fn remove_definition(&self, id: &str) -> bool {
        let mut definitions = self.definitions.write();
        match definitions.iter().position(|d| d.id == id) {
            Some(idx) => {
                definitions.remove(idx);
                true
            }
            None => false,
        }
    }

    pub fn get_definition(&self, id: &str) -> Option<ResponseDefinition> {
        self.definitions.read().iter().find(|d| d.id == id).cloned()
    }

    pub fn list_definitions(&self) -> Vec<ResponseDefinition> {
        self.definitions.read().clone()
    }

    pub fn add_mock(&self, mock: MockResponse) {
        self.mocks.write().push(mock);
    }

    pub fn remove_mock(&self, id: &str) -> bool {
        let mut mocks = self.mocks.write();
        let before = mocks.len();
        mocks.retain(|m| m.id != id);
        mocks.len() != before
    }

    pub fn list_mocks(&self) -> Vec<MockResponse> {
        self.mocks.read().clone()
    }

    /// Validate and install definitions and mocks, skipping invalid ones
    ///
    /// Returns the problems found, one entry per rejected item.
    pub fn load(
        &self,
        definitions: Vec<ResponseDefinition>,
        mocks: Vec<MockResponse>,
    ) -> Vec<ValidationError> {
        let mut rejected = Vec::new();

        for definition in definitions {
            match validate_definition(&definition, &self.evaluator) {
                Ok(()) => {
                    info!(
                        "Loaded response definition {} ({} rules) on {}",
                        definition.id,
                        definition.rules.len(),
                        definition.trigger_pattern
                    );
                    self.add_definition(definition);
                }
                Err(e) => {
                    warn!("Rejected response definition {}: {}", definition.id, e);
                    rejected.push(e);
                }
            }
        }

        for mock in mocks {
            match validate_mock(&mock) {
                Ok(()) => self.add_mock(mock),
                Err(e) => {
                    warn!("Rejected mock response {}: {}", mock.id, e);
                    rejected.push(e);
                }
            }
        }

        rejected
    }
}

/// A selected outcome, owned so it can move into a task
#[derive(Debug, Clone)]
struct PendingResponse {
    source: ResponseSource,
    trigger_pattern: String,
    topic_template: String,
    payload_template: String,
    delay: Duration,
}

impl PendingResponse {
    fn from_rule(definition: &ResponseDefinition, rule: &Rule) -> Self {
        Self {
            source: ResponseSource::Rule {
                definition_id: definition.id.clone(),
                rule_id: rule.id.clone(),
            },
            trigger_pattern: definition.trigger_pattern.clone(),
            topic_template: rule.response_topic_template.clone(),
            payload_template: rule.payload_template.clone(),
            delay: rule.delay,
        }
    }

    fn from_mock(source: ResponseSource, trigger_pattern: &str, mock: &MockResponse) -> Self {
        Self {
            source,
            trigger_pattern: trigger_pattern.to_string(),
            topic_template: mock.response_topic_template.clone(),
            payload_template: mock.payload_template.clone(),
            delay: mock.delay,
        }
    }
}

/// Everything one detached response needs
struct ResponseJob {
    pending: PendingResponse,
    trigger_topic: String,
    trigger_payload: String,
    sender_id: String,
    engine: TemplateEngine,
    sequences: Arc<SequenceStore>,
    loop_guard: Arc<LoopGuard>,
    publisher: Arc<dyn MessagePublisher>,
    options: PublishOptions,
    events: broadcast::Sender<ResponseEvent>,
}

impl ResponseJob {
    async fn run(self) {
        let pending = &self.pending;
        if !pending.delay.is_zero() {
            tokio::time::sleep(pending.delay).await;
        }

        let wildcards = topic::extract_wildcards(&pending.trigger_pattern, &self.trigger_topic);
        let device_id = wildcards
            .first()
            .cloned()
            .unwrap_or_else(|| self.sender_id.clone());
        let ctx = RenderContext::new(self.trigger_topic.as_str())
            .with_client_id(self.sender_id.as_str())
            .with_device_id(device_id)
            .with_wildcards(wildcards)
            .with_payload(&self.trigger_payload)
            .with_sequences(Arc::clone(&self.sequences));

        let topic = self.engine.render_topic(&pending.topic_template, &ctx);
        if topic.is_empty() {
            warn!("Response topic rendered empty for {:?}, dropping", pending.source);
            return;
        }
        let payload = self.engine.render(&pending.payload_template, &ctx);

        let Some(_active) = self.loop_guard.enter(&topic) else {
            warn!("Response loop detected on {}, dropping response", topic);
            return;
        };

        debug!("Publishing response to {}: {}", topic, payload);
        match self
            .publisher
            .publish(&topic, &payload, self.options.qos, self.options.retain)
            .await
        {
            Ok(()) => {
                info!("Published response to {} (trigger {})", topic, self.trigger_topic);
                // Nobody listening is fine
                let _ = self.events.send(ResponseEvent {
                    source: pending.source.clone(),
                    trigger_topic: self.trigger_topic.clone(),
                    topic: topic.clone(),
                    payload,
                    published_at: Utc::now(),
                });
            }
            Err(e) => error!("Failed to publish response to {}: {}", topic, e),
        }
    }
}

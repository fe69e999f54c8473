//! Response definitions, rules and mock responses
//!
//! Field names on the wire are camelCase; delays travel as `delayMs`.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A prioritized condition plus the response it produces
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    #[serde(default = "new_id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Lower runs first
    #[serde(default)]
    pub priority: i64,
    pub condition: String,
    #[serde(rename = "responseTopic")]
    pub response_topic_template: String,
    #[serde(default)]
    pub payload_template: String,
    #[serde(rename = "delayMs", default, with = "duration_ms")]
    pub delay: Duration,
    #[serde(default = "enabled")]
    pub enabled: bool,
}

/// An unconditional response
///
/// Standalone mocks fire on every matching message. As a definition's
/// default, `trigger_pattern` is unused.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MockResponse {
    #[serde(default = "new_id")]
    pub id: String,
    #[serde(default)]
    pub trigger_pattern: String,
    #[serde(rename = "responseTopic")]
    pub response_topic_template: String,
    #[serde(default)]
    pub payload_template: String,
    #[serde(rename = "delayMs", default, with = "duration_ms")]
    pub delay: Duration,
    #[serde(default = "enabled")]
    pub enabled: bool,
}

/// A trigger pattern with its rules and optional fallback
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseDefinition {
    #[serde(default = "new_id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub trigger_pattern: String,
    #[serde(default)]
    pub rules: Vec<Rule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_response: Option<MockResponse>,
    #[serde(default = "enabled")]
    pub enabled: bool,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl ResponseDefinition {
    pub fn new(name: impl Into<String>, trigger_pattern: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: new_id(),
            name: name.into(),
            trigger_pattern: trigger_pattern.into(),
            rules: Vec::new(),
            default_response: None,
            enabled: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn with_default(mut self, response: MockResponse) -> Self {
        self.default_response = Some(response);
        self
    }

    /// Rules in evaluation order; ties keep their declared order
    pub fn rules_by_priority(&self) -> Vec<&Rule> {
        let mut rules: Vec<&Rule> = self.rules.iter().collect();
        rules.sort_by_key(|rule| rule.priority);
        rules
    }
}

impl Rule {
    pub fn new(
        priority: i64,
        condition: impl Into<String>,
        response_topic: impl Into<String>,
        payload_template: impl Into<String>,
    ) -> Self {
        Self {
            id: new_id(),
            name: String::new(),
            priority,
            condition: condition.into(),
            response_topic_template: response_topic.into(),
            payload_template: payload_template.into(),
            delay: Duration::ZERO,
            enabled: true,
        }
    }
}

impl MockResponse {
    pub fn new(
        trigger_pattern: impl Into<String>,
        response_topic: impl Into<String>,
        payload_template: impl Into<String>,
    ) -> Self {
        Self {
            id: new_id(),
            trigger_pattern: trigger_pattern.into(),
            response_topic_template: response_topic.into(),
            payload_template: payload_template.into(),
            delay: Duration::ZERO,
            enabled: true,
        }
    }
}

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn enabled() -> bool {
    true
}

pub(crate) mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(delay: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(delay.as_millis().try_into().unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_definition_from_json() {
        let json = r#"{
            "id": "thermostat",
            "name": "Thermostat",
            "triggerPattern": "sensors/+/temperature",
            "rules": [
                {
                    "id": "hot",
                    "priority": 1,
                    "condition": "$.temperature > 30",
                    "responseTopic": "commands/{1}/fan",
                    "payloadTemplate": "{\"fan\": \"on\"}",
                    "delayMs": 250
                }
            ],
            "defaultResponse": {
                "responseTopic": "commands/{1}/fan",
                "payloadTemplate": "{\"fan\": \"off\"}",
                "enabled": false
            }
        }"#;
        let def: ResponseDefinition = serde_json::from_str(json).unwrap();
        assert_eq!(def.id, "thermostat");
        assert!(def.enabled);
        assert_eq!(def.rules[0].delay, Duration::from_millis(250));
        assert!(def.rules[0].enabled);
        assert_eq!(def.rules[0].response_topic_template, "commands/{1}/fan");
        let default = def.default_response.unwrap();
        assert!(!default.enabled);
        assert!(!default.id.is_empty());
        assert_eq!(default.delay, Duration::ZERO);
    }

    #[test]
    fn test_rule_serializes_delay_as_millis() {
        let mut rule = Rule::new(5, "$.a == 1", "out", "x");
        rule.delay = Duration::from_millis(1500);
        let value = serde_json::to_value(&rule).unwrap();
        assert_eq!(value["delayMs"], 1500);
        assert_eq!(value["responseTopic"], "out");
        assert_eq!(value["payloadTemplate"], "x");
    }

    #[test]
    fn test_rules_by_priority_is_stable() {
        let mut def = ResponseDefinition::new("d", "t");
        for (priority, name) in [(100, "a"), (1, "b"), (50, "c"), (1, "d")] {
            let mut rule = Rule::new(priority, "$.x == 1", "out", "p");
            rule.name = name.to_string();
            def.rules.push(rule);
        }
        let names: Vec<&str> = def
            .rules_by_priority()
            .iter()
            .map(|r| r.name.as_str())
            .collect();
        assert_eq!(names, vec!["b", "d", "c", "a"]);
    }
}

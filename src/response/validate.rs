//! Load-time checks for rules, definitions and standalone mocks
//!
//! Every problem found is reported; nothing stops at the first one.

use crate::condition::ConditionEvaluator;
use crate::error::ValidationError;

use super::model::{MockResponse, ResponseDefinition, Rule};

pub fn validate_rule(rule: &Rule, evaluator: &ConditionEvaluator) -> Result<(), ValidationError> {
    into_result(rule_problems(rule, evaluator))
}

pub fn validate_definition(
    definition: &ResponseDefinition,
    evaluator: &ConditionEvaluator,
) -> Result<(), ValidationError> {
    let mut problems = Vec::new();
    let id = &definition.id;

    if definition.trigger_pattern.trim().is_empty() {
        problems.push(format!("definition {id}: trigger pattern is empty"));
    }
    if definition.rules.is_empty() && definition.default_response.is_none() {
        problems.push(format!(
            "definition {id}: needs at least one rule or a default response"
        ));
    }
    for rule in &definition.rules {
        problems.extend(
            rule_problems(rule, evaluator)
                .into_iter()
                .map(|p| format!("definition {id}: {p}")),
        );
    }

    into_result(problems)
}

pub fn validate_mock(mock: &MockResponse) -> Result<(), ValidationError> {
    let mut problems = Vec::new();
    if mock.trigger_pattern.trim().is_empty() {
        problems.push(format!("mock {}: trigger pattern is empty", mock.id));
    }
    if mock.response_topic_template.trim().is_empty() {
        problems.push(format!("mock {}: response topic is empty", mock.id));
    }
    into_result(problems)
}

fn rule_problems(rule: &Rule, evaluator: &ConditionEvaluator) -> Vec<String> {
    let mut problems = Vec::new();
    let id = &rule.id;

    if rule.condition.trim().is_empty() {
        problems.push(format!("rule {id}: condition is empty"));
    } else if let Err(e) = evaluator.parse(&rule.condition) {
        problems.push(format!("rule {id}: {e}"));
    }
    if rule.payload_template.is_empty() {
        problems.push(format!("rule {id}: payload template is empty"));
    }

    problems
}

fn into_result(problems: Vec<String>) -> Result<(), ValidationError> {
    if problems.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::new(problems))
    }
}

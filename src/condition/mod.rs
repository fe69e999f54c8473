//! Rule conditions: `<path> <operator> <literal>` predicates over JSON payloads
//!
//! Parsed conditions and paths are cached by their exact source text, so a
//! condition validated at load time is never re-parsed at dispatch time.

mod path;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;
use tracing::debug;

use crate::error::ConditionError;

pub use path::{JsonPath, Segment};

/// Comparison operator of a condition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
    Contains,
}

impl Operator {
    fn parse(token: &str) -> Option<Self> {
        Some(match token {
            "==" => Self::Eq,
            "!=" => Self::Ne,
            ">" => Self::Gt,
            "<" => Self::Lt,
            ">=" => Self::Ge,
            "<=" => Self::Le,
            "contains" => Self::Contains,
            _ => return None,
        })
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Gt => ">",
            Self::Lt => "<",
            Self::Ge => ">=",
            Self::Le => "<=",
            Self::Contains => "contains",
        };
        f.write_str(s)
    }
}

/// Right-hand side of a condition
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    String(String),
    Bool(bool),
    Null,
    Int(i64),
    Float(f64),
}

impl Literal {
    /// Parse a literal: quoted string, boolean, null, integer, float, bareword
    pub fn parse(raw: &str) -> Result<Self, ConditionError> {
        let raw = raw.trim();
        if let Some(first @ ('\'' | '"')) = raw.chars().next() {
            return raw[1..]
                .strip_suffix(first)
                .map(|s| Self::String(s.to_string()))
                .ok_or_else(|| ConditionError::InvalidLiteral(format!("unterminated string {raw}")));
        }

        Ok(match raw {
            "true" => Self::Bool(true),
            "false" => Self::Bool(false),
            "null" => Self::Null,
            _ => {
                if let Ok(n) = raw.parse::<i64>() {
                    Self::Int(n)
                } else if let Ok(f) = raw.parse::<f64>() {
                    Self::Float(f)
                } else {
                    Self::String(raw.to_string())
                }
            }
        })
    }

    fn as_number(&self) -> Option<f64> {
        match self {
            Self::Int(n) => Some(*n as f64),
            Self::Float(f) => Some(*f),
            Self::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    fn is_numeric(&self) -> bool {
        matches!(self, Self::Int(_) | Self::Float(_))
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => f.write_str(s),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Null => f.write_str("null"),
            Self::Int(n) => write!(f, "{n}"),
            Self::Float(x) => write!(f, "{x}"),
        }
    }
}

/// A condition split into its three parts
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedCondition {
    pub path: Arc<JsonPath>,
    pub operator: Operator,
    pub literal: Literal,
}

/// Parses and evaluates conditions, caching both conditions and paths
#[derive(Debug, Default)]
pub struct ConditionEvaluator {
    conditions: RwLock<HashMap<String, Arc<ParsedCondition>>>,
    paths: RwLock<HashMap<String, Arc<JsonPath>>>,
}

impl ConditionEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a condition string, serving repeats from the cache
    pub fn parse(&self, condition: &str) -> Result<Arc<ParsedCondition>, ConditionError> {
        if let Some(parsed) = read_cache(&self.conditions, condition) {
            return Ok(parsed);
        }

        let (path, rest) = split_path(condition.trim());
        let (operator, literal_src) = rest
            .trim_start()
            .split_once(char::is_whitespace)
            .unwrap_or((rest.trim_start(), ""));
        if path.is_empty() || operator.is_empty() {
            return Err(ConditionError::InvalidFormat(condition.to_string()));
        }
        let operator = Operator::parse(operator).ok_or_else(|| {
            ConditionError::InvalidFormat(format!("unknown operator {operator:?} in {condition}"))
        })?;

        // The literal is everything after the operator, spaces included
        let literal_src = literal_src.trim();
        if literal_src.is_empty() {
            return Err(ConditionError::InvalidFormat(format!(
                "missing literal in {condition}"
            )));
        }

        let parsed = Arc::new(ParsedCondition {
            path: self.parse_path(path)?,
            operator,
            literal: Literal::parse(literal_src)?,
        });

        write_cache(&self.conditions, condition, Arc::clone(&parsed));
        Ok(parsed)
    }

    fn parse_path(&self, raw: &str) -> Result<Arc<JsonPath>, ConditionError> {
        if let Some(path) = read_cache(&self.paths, raw) {
            return Ok(path);
        }
        let path = Arc::new(JsonPath::parse(raw)?);
        write_cache(&self.paths, raw, Arc::clone(&path));
        Ok(path)
    }

    /// Evaluate a parsed condition against a raw JSON payload
    pub fn evaluate(&self, parsed: &ParsedCondition, payload: &str) -> Result<bool, ConditionError> {
        let doc: Value = serde_json::from_str(payload)
            .map_err(|e| ConditionError::InvalidPayload(e.to_string()))?;
        evaluate_value(parsed, &doc)
    }

    /// Parse (cached) and evaluate in one step
    #[cfg(test)]
    pub(crate) fn check(&self, condition: &str, payload: &str) -> Result<bool, ConditionError> {
        let parsed = self.parse(condition)?;
        self.evaluate(&parsed, payload)
    }

    /// Number of cached conditions
    #[cfg(test)]
    pub(crate) fn cached_conditions(&self) -> usize {
        self.conditions.read().len()
    }
}

/// Evaluate a condition against an already decoded document
pub fn evaluate_value(parsed: &ParsedCondition, doc: &Value) -> Result<bool, ConditionError> {
    let literal = &parsed.literal;

    let Some(actual) = parsed.path.resolve(doc) else {
        debug!("Path {} not found, using null semantics", parsed.path.as_str());
        return Ok(match parsed.operator {
            Operator::Eq => *literal == Literal::Null,
            Operator::Ne => *literal != Literal::Null,
            _ => false,
        });
    };

    match parsed.operator {
        Operator::Eq => Ok(values_equal(&actual, literal)),
        Operator::Ne => Ok(!values_equal(&actual, literal)),
        Operator::Gt | Operator::Lt | Operator::Ge | Operator::Le => {
            let (Some(a), Some(b)) = (value_as_number(&actual), literal.as_number()) else {
                return Err(ConditionError::NonNumericComparison {
                    operator: parsed.operator.to_string(),
                    actual: actual.to_string(),
                });
            };
            Ok(match parsed.operator {
                Operator::Gt => a > b,
                Operator::Lt => a < b,
                Operator::Ge => a >= b,
                _ => a <= b,
            })
        }
        Operator::Contains => match &actual {
            Value::String(s) => Ok(s.contains(&literal.to_string())),
            Value::Array(items) => Ok(items.iter().any(|item| values_equal(item, literal))),
            other => Err(ConditionError::UnsupportedType(type_name(other).to_string())),
        },
    }
}

fn values_equal(actual: &Value, literal: &Literal) -> bool {
    if literal.is_numeric() {
        if let (Some(a), Some(b)) = (actual.as_f64(), literal.as_number()) {
            return a == b;
        }
    }
    value_string(actual) == literal.to_string()
}

fn value_as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn value_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Split off the path token: it ends at the first whitespace outside
/// brackets and quotes
fn split_path(condition: &str) -> (&str, &str) {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    for (idx, ch) in condition.char_indices() {
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') if depth > 0 => quote = Some(ch),
            (None, '[') => depth += 1,
            (None, ']') => depth = depth.saturating_sub(1),
            (None, c) if c.is_whitespace() && depth == 0 => {
                return (&condition[..idx], &condition[idx..]);
            }
            _ => {}
        }
    }
    (condition, "")
}

fn read_cache<T>(cache: &RwLock<HashMap<String, Arc<T>>>, key: &str) -> Option<Arc<T>> {
    cache.read().get(key).cloned()
}

fn write_cache<T>(cache: &RwLock<HashMap<String, Arc<T>>>, key: &str, value: Arc<T>) {
    cache.write().entry(key.to_string()).or_insert(value);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(condition: &str, payload: &str) -> Result<bool, ConditionError> {
        ConditionEvaluator::new().check(condition, payload)
    }

    #[test]
    fn test_parse_parts() {
        let evaluator = ConditionEvaluator::new();
        let parsed = evaluator.parse("$.status == 'online'").unwrap();
        assert_eq!(parsed.path.as_str(), "$.status");
        assert_eq!(parsed.operator, Operator::Eq);
        assert_eq!(parsed.literal, Literal::String("online".into()));
    }

    #[test]
    fn test_parse_is_cached() {
        let evaluator = ConditionEvaluator::new();
        let first = evaluator.parse("$.temperature > 30").unwrap();
        let second = evaluator.parse("$.temperature > 30").unwrap();
        assert_eq!(first, second);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(evaluator.cached_conditions(), 1);
    }

    #[test]
    fn test_parse_literal_precedence() {
        assert_eq!(Literal::parse("\"42\"").unwrap(), Literal::String("42".into()));
        assert_eq!(Literal::parse("true").unwrap(), Literal::Bool(true));
        assert_eq!(Literal::parse("null").unwrap(), Literal::Null);
        assert_eq!(Literal::parse("-7").unwrap(), Literal::Int(-7));
        assert_eq!(Literal::parse("2.5").unwrap(), Literal::Float(2.5));
        assert_eq!(Literal::parse("online").unwrap(), Literal::String("online".into()));
        assert_eq!(
            Literal::parse("'hello world'").unwrap(),
            Literal::String("hello world".into())
        );
    }

    #[test]
    fn test_parse_errors() {
        let evaluator = ConditionEvaluator::new();
        assert!(matches!(
            evaluator.parse("$.a"),
            Err(ConditionError::InvalidFormat(_))
        ));
        assert!(matches!(
            evaluator.parse("$.a ~= 3"),
            Err(ConditionError::InvalidFormat(_))
        ));
        assert!(matches!(
            evaluator.parse("a == 3"),
            Err(ConditionError::InvalidPath(_))
        ));
        assert!(matches!(
            evaluator.parse("$.a == 'open"),
            Err(ConditionError::InvalidLiteral(_))
        ));
        assert_eq!(evaluator.cached_conditions(), 0);
    }

    #[test]
    fn test_numeric_comparisons() {
        assert_eq!(eval("$.temperature > 30", r#"{"temperature": 35}"#), Ok(true));
        assert_eq!(eval("$.temperature > 30", r#"{"temperature": 25}"#), Ok(false));
        assert_eq!(eval("$.temperature >= 25", r#"{"temperature": 25}"#), Ok(true));
        assert_eq!(eval("$.temperature <= 24.9", r#"{"temperature": 25}"#), Ok(false));
        assert_eq!(eval("$.temperature < 30", r#"{"temperature": "12.5"}"#), Ok(true));
    }

    #[test]
    fn test_invalid_payload() {
        assert!(matches!(
            eval("$.temperature > 30", "not valid json"),
            Err(ConditionError::InvalidPayload(_))
        ));
    }

    #[test]
    fn test_non_numeric_comparison() {
        assert!(matches!(
            eval("$.status > 3", r#"{"status": "on"}"#),
            Err(ConditionError::NonNumericComparison { .. })
        ));
        assert!(matches!(
            eval("$.n > abc", r#"{"n": 5}"#),
            Err(ConditionError::NonNumericComparison { .. })
        ));
    }

    #[test]
    fn test_equality() {
        assert_eq!(eval("$.n == 5", r#"{"n": 5.0}"#), Ok(true));
        assert_eq!(eval("$.n == 5.0", r#"{"n": 5}"#), Ok(true));
        assert_eq!(eval("$.n != 5", r#"{"n": 6}"#), Ok(true));
        assert_eq!(eval("$.status == 'on'", r#"{"status": "on"}"#), Ok(true));
        assert_eq!(eval("$.status == on", r#"{"status": "on"}"#), Ok(true));
        assert_eq!(eval("$.ok == true", r#"{"ok": true}"#), Ok(true));
        assert_eq!(eval("$.ok == false", r#"{"ok": true}"#), Ok(false));
        assert_eq!(eval("$.n == '5'", r#"{"n": 5}"#), Ok(true));
        assert_eq!(eval("$.v == null", r#"{"v": null}"#), Ok(true));
    }

    #[test]
    fn test_missing_field_null_semantics() {
        let payload = r#"{"other":"value"}"#;
        assert_eq!(eval("$.missing == null", payload), Ok(true));
        assert_eq!(eval("$.missing != 'x'", payload), Ok(true));
        assert_eq!(eval("$.missing != null", payload), Ok(false));
        assert_eq!(eval("$.missing == 'x'", payload), Ok(false));
        assert_eq!(eval("$.missing > 3", payload), Ok(false));
        assert_eq!(eval("$.missing contains 'x'", payload), Ok(false));
    }

    #[test]
    fn test_contains() {
        assert_eq!(eval("$.msg contains 'err'", r#"{"msg": "an error"}"#), Ok(true));
        assert_eq!(eval("$.msg contains 'ok'", r#"{"msg": "an error"}"#), Ok(false));
        assert_eq!(eval("$.tags contains 'hot'", r#"{"tags": ["cold", "hot"]}"#), Ok(true));
        assert_eq!(eval("$.codes contains 3", r#"{"codes": [1, 3.0]}"#), Ok(true));
        assert!(matches!(
            eval("$.n contains 3", r#"{"n": 3}"#),
            Err(ConditionError::UnsupportedType(_))
        ));
    }

    #[test]
    fn test_nested_and_wildcard_paths() {
        assert_eq!(
            eval("$.sensor.readings[0] >= 10", r#"{"sensor": {"readings": [12, 3]}}"#),
            Ok(true)
        );
        assert_eq!(
            eval("$.items[*].id contains 2", r#"{"items": [{"id": 1}, {"id": 2}]}"#),
            Ok(true)
        );
    }

    #[test]
    fn test_bracket_keys_with_spaces() {
        assert_eq!(eval("$['unit name'] == 1", r#"{"unit name": 1}"#), Ok(true));
        assert_eq!(
            eval(r#"$["room 2"].temp > 20"#, r#"{"room 2": {"temp": 21.5}}"#),
            Ok(true)
        );
        let parsed = ConditionEvaluator::new()
            .parse("$['a b'] != 'x y'")
            .unwrap();
        assert_eq!(parsed.path.as_str(), "$['a b']");
        assert_eq!(parsed.operator, Operator::Ne);
        assert_eq!(parsed.literal, Literal::String("x y".into()));
    }
}

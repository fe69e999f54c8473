//! Minimal JSON path subset used by rule conditions
//!
//! Supported: `$`, `.name`, `['name']`, `["name"]`, `[N]`, `[*]` and `.*`.

use serde_json::Value;

use crate::error::ConditionError;

/// One navigation step of a path
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    Key(String),
    Index(usize),
    Wildcard,
}

/// A parsed path rooted at `$`
#[derive(Debug, Clone, PartialEq)]
pub struct JsonPath {
    raw: String,
    segments: Vec<Segment>,
}

impl JsonPath {
    pub fn parse(raw: &str) -> Result<Self, ConditionError> {
        let invalid = |reason: &str| ConditionError::InvalidPath(format!("{raw}: {reason}"));

        let rest = raw
            .strip_prefix('$')
            .ok_or_else(|| invalid("must start with '$'"))?;
        let chars: Vec<char> = rest.chars().collect();
        let mut segments = Vec::new();
        let mut i = 0;

        while i < chars.len() {
            match chars[i] {
                '.' => {
                    i += 1;
                    let start = i;
                    while i < chars.len() && chars[i] != '.' && chars[i] != '[' {
                        i += 1;
                    }
                    let name: String = chars[start..i].iter().collect();
                    match name.as_str() {
                        "" => return Err(invalid("empty field name")),
                        "*" => segments.push(Segment::Wildcard),
                        _ => segments.push(Segment::Key(name)),
                    }
                }
                '[' => {
                    let close = chars[i..]
                        .iter()
                        .position(|c| *c == ']')
                        .map(|offset| i + offset)
                        .ok_or_else(|| invalid("unclosed '['"))?;
                    let inner: String = chars[i + 1..close].iter().collect();
                    let inner = inner.trim();
                    segments.push(parse_bracket(inner).ok_or_else(|| invalid("bad index"))?);
                    i = close + 1;
                }
                _ => return Err(invalid("expected '.' or '['")),
            }
        }

        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    #[cfg(test)]
    pub(crate) fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Collect every value the path addresses in `doc`
    pub fn select<'a>(&self, doc: &'a Value) -> Vec<&'a Value> {
        let mut current = vec![doc];
        for segment in &self.segments {
            let mut next = Vec::new();
            for value in current {
                match (segment, value) {
                    (Segment::Key(key), Value::Object(map)) => next.extend(map.get(key)),
                    (Segment::Index(idx), Value::Array(items)) => next.extend(items.get(*idx)),
                    (Segment::Wildcard, Value::Array(items)) => next.extend(items.iter()),
                    (Segment::Wildcard, Value::Object(map)) => next.extend(map.values()),
                    _ => {}
                }
            }
            current = next;
        }
        current
    }

    fn has_wildcard(&self) -> bool {
        self.segments.contains(&Segment::Wildcard)
    }

    /// Resolve the path to a single value
    ///
    /// Wildcard paths yield their hits gathered into an array, so an empty
    /// wildcard match still counts as "found".
    pub fn resolve(&self, doc: &Value) -> Option<Value> {
        let hits = self.select(doc);
        if self.has_wildcard() {
            return Some(Value::Array(hits.into_iter().cloned().collect()));
        }
        hits.into_iter().next().cloned()
    }
}

fn parse_bracket(inner: &str) -> Option<Segment> {
    if inner == "*" {
        return Some(Segment::Wildcard);
    }
    for quote in ['\'', '"'] {
        if let Some(name) = inner
            .strip_prefix(quote)
            .and_then(|s| s.strip_suffix(quote))
        {
            return Some(Segment::Key(name.to_string()));
        }
    }
    inner.parse().ok().map(Segment::Index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_dotted() {
        let path = JsonPath::parse("$.sensor.temperature").unwrap();
        assert_eq!(
            path.segments(),
            &[
                Segment::Key("sensor".into()),
                Segment::Key("temperature".into())
            ]
        );
    }

    #[test]
    fn test_parse_brackets() {
        let path = JsonPath::parse("$.readings[2]['unit name']").unwrap();
        assert_eq!(
            path.segments(),
            &[
                Segment::Key("readings".into()),
                Segment::Index(2),
                Segment::Key("unit name".into())
            ]
        );
    }

    #[test]
    fn test_parse_rejects_bad_paths() {
        assert!(matches!(
            JsonPath::parse("temperature"),
            Err(ConditionError::InvalidPath(_))
        ));
        assert!(JsonPath::parse("$.a[1").is_err());
        assert!(JsonPath::parse("$..a").is_err());
        assert!(JsonPath::parse("$.a[x]").is_err());
    }

    #[test]
    fn test_root_path_selects_document() {
        let doc = json!({"a": 1});
        assert_eq!(JsonPath::parse("$").unwrap().resolve(&doc), Some(doc.clone()));
    }

    #[test]
    fn test_resolve_nested_and_missing() {
        let doc = json!({"a": {"b": [10, 20]}});
        assert_eq!(
            JsonPath::parse("$.a.b[1]").unwrap().resolve(&doc),
            Some(json!(20))
        );
        assert_eq!(JsonPath::parse("$.a.c").unwrap().resolve(&doc), None);
        assert_eq!(JsonPath::parse("$.a.b[5]").unwrap().resolve(&doc), None);
    }

    #[test]
    fn test_wildcard_gathers_hits() {
        let doc = json!({"items": [{"id": 1}, {"id": 2}]});
        assert_eq!(
            JsonPath::parse("$.items[*].id").unwrap().resolve(&doc),
            Some(json!([1, 2]))
        );
    }
}

//! MQTT topic pattern matching
//!
//! Shared by response triggering and anything else that needs to test a
//! topic against a `+`/`#` wildcard pattern.

/// Single-level wildcard token
pub const SINGLE_LEVEL: &str = "+";

/// Multi-level wildcard token
pub const MULTI_LEVEL: &str = "#";

/// Check whether `topic` matches the wildcard `pattern`
///
/// Patterns are not validated: a `#` anywhere ends the comparison with a
/// match, whatever follows it.
pub fn matches(pattern: &str, topic: &str) -> bool {
    walk(pattern, topic, |_| {})
}

/// Collect the topic segments captured by the wildcards in `pattern`
///
/// Each `+` contributes its single segment. A `#` contributes one entry
/// holding the `/`-joined remainder of the topic. Returns an empty list
/// when the topic does not match.
pub fn extract_wildcards(pattern: &str, topic: &str) -> Vec<String> {
    let mut captures = Vec::new();
    if walk(pattern, topic, |capture| captures.push(capture)) {
        captures
    } else {
        Vec::new()
    }
}

/// Substitute `{N}` placeholders (1-based, single digit) with captures
///
/// Placeholders referring past the end of `captures` are left as they are.
pub fn render_topic_template(template: &str, captures: &[String]) -> String {
    let bytes = template.as_bytes();
    let mut out = String::with_capacity(template.len());
    let mut i = 0;

    while i < bytes.len() {
        if let Some(index) = capture_index_at(bytes, i) {
            if let Some(value) = index.checked_sub(1).and_then(|idx| captures.get(idx)) {
                out.push_str(value);
                i += 3;
                continue;
            }
        }
        let ch = template[i..].chars().next().unwrap_or_default();
        out.push(ch);
        i += ch.len_utf8().max(1);
    }

    out
}

/// Returns the digit of a `{N}` marker starting at `pos`, if there is one
pub(crate) fn capture_index_at(bytes: &[u8], pos: usize) -> Option<usize> {
    match bytes.get(pos..pos + 3) {
        Some([b'{', digit, b'}']) if digit.is_ascii_digit() => Some((digit - b'0') as usize),
        _ => None,
    }
}

fn walk(pattern: &str, topic: &str, mut capture: impl FnMut(String)) -> bool {
    let pattern_parts: Vec<&str> = pattern.split('/').collect();
    let topic_parts: Vec<&str> = topic.split('/').collect();

    for (idx, part) in pattern_parts.iter().enumerate() {
        if *part == MULTI_LEVEL {
            capture(topic_parts.get(idx..).unwrap_or_default().join("/"));
            return true;
        }

        let Some(segment) = topic_parts.get(idx) else {
            return false;
        };

        if *part == SINGLE_LEVEL {
            capture((*segment).to_string());
        } else if part != segment {
            return false;
        }
    }

    pattern_parts.len() == topic_parts.len()
}

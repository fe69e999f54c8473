//! `{{ expr }}` template rendering for response topics and payloads
//!
//! Rendering is total: unknown bare identifiers are echoed back as
//! `{{ name }}`, anything else malformed renders as an empty string.
//! Every random draw made during one render comes from a single rng built
//! from [`RenderContext::seed`], so seeded renders are byte-identical.

mod expr;
pub mod faker;

use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use rand::distributions::Alphanumeric;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::Value;

use crate::sequence::SequenceStore;
use crate::topic::{self, capture_index_at};

pub use expr::{parse_call, Builtin, Call, Expr, ExternalScope, Transform};

/// Resolves `request.*` and `mtls.*` expressions
///
/// Implemented by whatever owns HTTP request or client-certificate data;
/// the engine itself knows nothing about either.
pub trait ContextResolver: Send + Sync {
    fn resolve(&self, scope: ExternalScope, path: &str) -> Option<String>;
}

/// Everything a single render may read
#[derive(Debug, Clone, Default)]
pub struct RenderContext {
    pub topic: String,
    pub client_id: String,
    pub device_id: String,
    /// Wildcard captures, in pattern order
    pub wildcards: Vec<String>,
    pub payload: Option<Value>,
    /// Seed for every random expression; `None` draws from entropy
    pub seed: Option<u64>,
    pub sequences: Option<Arc<SequenceStore>>,
}

impl RenderContext {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            ..Self::default()
        }
    }

    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = client_id.into();
        self
    }

    pub fn with_device_id(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = device_id.into();
        self
    }

    pub fn with_wildcards(mut self, wildcards: Vec<String>) -> Self {
        self.wildcards = wildcards;
        self
    }

    /// Attach a raw payload; anything that is not JSON is ignored
    pub fn with_payload(mut self, payload: &str) -> Self {
        self.payload = serde_json::from_str(payload).ok();
        self
    }

    pub fn with_payload_value(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_sequences(mut self, sequences: Arc<SequenceStore>) -> Self {
        self.sequences = Some(sequences);
        self
    }
}

/// Renders templates; cheap to clone and share
#[derive(Clone, Default)]
pub struct TemplateEngine {
    resolver: Option<Arc<dyn ContextResolver>>,
}

impl std::fmt::Debug for TemplateEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateEngine")
            .field("resolver", &self.resolver.is_some())
            .finish()
    }
}

impl TemplateEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_resolver(resolver: Arc<dyn ContextResolver>) -> Self {
        Self {
            resolver: Some(resolver),
        }
    }

    /// Render `template` against `ctx`
    pub fn render(&self, template: &str, ctx: &RenderContext) -> String {
        self.render_with(template, ctx, true)
    }

    /// Render a response topic
    ///
    /// `{{ }}` expressions are evaluated first; bare `{N}` markers are then
    /// filled from the wildcards, and markers without a capture stay intact.
    pub fn render_topic(&self, template: &str, ctx: &RenderContext) -> String {
        let rendered = self.render_with(template, ctx, false);
        topic::render_topic_template(&rendered, &ctx.wildcards)
    }

    fn render_with(&self, template: &str, ctx: &RenderContext, bare_captures: bool) -> String {
        let mut rng = match ctx.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let bytes = template.as_bytes();
        let mut out = String::with_capacity(template.len());
        let mut i = 0;

        while i < bytes.len() {
            if template[i..].starts_with("{{") {
                let Some(len) = template[i + 2..].find("}}") else {
                    out.push_str(&template[i..]);
                    break;
                };
                let end = i + 2 + len + 2;
                let inner = &template[i + 2..end - 2];
                match Expr::parse(inner) {
                    Expr::Unknown(_) => out.push_str(&template[i..end]),
                    expr => out.push_str(&self.evaluate(&expr, ctx, &mut rng)),
                }
                i = end;
                continue;
            }

            if bare_captures {
                if let Some(index) = capture_index_at(bytes, i) {
                    out.push_str(capture(ctx, index));
                    i += 3;
                    continue;
                }
            }

            let ch = template[i..].chars().next().unwrap_or_default();
            out.push(ch);
            i += ch.len_utf8();
        }

        out
    }

    fn evaluate(&self, expr: &Expr, ctx: &RenderContext, rng: &mut StdRng) -> String {
        match expr {
            Expr::Builtin(builtin) => builtin_value(*builtin, ctx, rng),
            Expr::RandomInt { min, max } => rng.gen_range(*min..=*max).to_string(),
            Expr::RandomFloat {
                min,
                max,
                precision,
            } => {
                let value = rng.gen_range(*min..=*max);
                match precision {
                    Some(p) => format!("{:.*}", *p, value),
                    None => value.to_string(),
                }
            }
            Expr::RandomString { len } => (0..*len)
                .map(|_| char::from(rng.sample(Alphanumeric)))
                .collect(),
            Expr::Sequence { name, start } => ctx
                .sequences
                .as_ref()
                .map(|store| store.next(name, *start).to_string())
                .unwrap_or_default(),
            Expr::Capture(index) => capture(ctx, *index).to_string(),
            Expr::Payload(path) => ctx
                .payload
                .as_ref()
                .and_then(|payload| lookup(payload, path))
                .map(stringify)
                .unwrap_or_default(),
            Expr::Faker { kind, args } => faker::generate(kind, args, rng).unwrap_or_default(),
            Expr::Transform {
                op,
                value,
                fallback,
            } => {
                let value = self.operand(value, ctx, rng);
                match op {
                    Transform::Upper => value.to_uppercase(),
                    Transform::Lower => value.to_lowercase(),
                    Transform::Default if value.is_empty() => fallback.clone(),
                    Transform::Default => value,
                }
            }
            Expr::External { scope, path } => self
                .resolver
                .as_ref()
                .and_then(|resolver| resolver.resolve(*scope, path))
                .unwrap_or_default(),
            Expr::Unknown(_) | Expr::Invalid => String::new(),
        }
    }

    /// Resolve a transform argument: known expressions are evaluated,
    /// anything else is a literal with its quotes stripped
    fn operand(&self, raw: &str, ctx: &RenderContext, rng: &mut StdRng) -> String {
        if !expr::is_quoted(raw) {
            let expr = Expr::parse(raw);
            if expr.is_resolvable() {
                return self.evaluate(&expr, ctx, rng);
            }
        }
        expr::unquote(raw).to_string()
    }
}

fn capture(ctx: &RenderContext, index: usize) -> &str {
    index
        .checked_sub(1)
        .and_then(|idx| ctx.wildcards.get(idx))
        .map(String::as_str)
        .unwrap_or_default()
}

fn builtin_value(builtin: Builtin, ctx: &RenderContext, rng: &mut StdRng) -> String {
    match builtin {
        Builtin::Now | Builtin::TimestampIso => {
            Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
        }
        Builtin::TimestampUnix => Utc::now().timestamp().to_string(),
        Builtin::TimestampMs => Utc::now().timestamp_millis().to_string(),
        Builtin::Uuid => random_uuid(rng),
        Builtin::UuidShort => random_uuid(rng)[..8].to_string(),
        Builtin::Random => format!("{:016x}", rng.gen::<u64>()),
        Builtin::RandomBool => rng.gen::<bool>().to_string(),
        Builtin::Topic => ctx.topic.clone(),
        Builtin::ClientId => ctx.client_id.clone(),
        Builtin::DeviceId => ctx.device_id.clone(),
    }
}

fn random_uuid(rng: &mut StdRng) -> String {
    uuid::Builder::from_random_bytes(rng.gen())
        .into_uuid()
        .to_string()
}

/// Walk nested objects by key; arrays and scalars stop the walk
fn lookup<'a>(payload: &'a Value, path: &[String]) -> Option<&'a Value> {
    path.iter()
        .try_fold(payload, |value, key| value.as_object()?.get(key))
}

/// Template form of a JSON value
pub fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i.to_string()
            } else if let Some(u) = n.as_u64() {
                u.to_string()
            } else {
                // f64 Display drops trailing zeros
                n.as_f64().map(|f| f.to_string()).unwrap_or_default()
            }
        }
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn render(template: &str, ctx: &RenderContext) -> String {
        TemplateEngine::new().render(template, ctx)
    }

    #[test]
    fn test_plain_text_passes_through() {
        let ctx = RenderContext::default();
        assert_eq!(render("no placeholders here", &ctx), "no placeholders here");
        assert_eq!(render(r#"{"a": 1}"#, &ctx), r#"{"a": 1}"#);
        assert_eq!(render("open {{ uuid", &ctx), "open {{ uuid");
    }

    #[test]
    fn test_context_builtins() {
        let ctx = RenderContext::new("sensors/d1/temp")
            .with_client_id("client-7")
            .with_device_id("d1");
        assert_eq!(
            render("{{topic}}|{{ clientId }}|{{device_id}}", &ctx),
            "sensors/d1/temp|client-7|d1"
        );
        assert_eq!(render("[{{ clientId }}]", &RenderContext::default()), "[]");
    }

    #[test]
    fn test_unknown_identifier_is_echoed() {
        let ctx = RenderContext::default();
        assert_eq!(render("x {{ mystery }} y", &ctx), "x {{ mystery }} y");
        assert_eq!(render("x {{ mystery(1) }} y", &ctx), "x  y");
    }

    #[test]
    fn test_capture_substitution() {
        let ctx = RenderContext::new("t").with_wildcards(vec!["device1".into(), "temp".into()]);
        assert_eq!(render("commands/{1}/response", &ctx), "commands/device1/response");
        assert_eq!(render("{{ {2} }}/{3}", &ctx), "temp/");
        assert_eq!(render("commands/{1}", &RenderContext::default()), "commands/");
    }

    #[test]
    fn test_payload_access() {
        let ctx = RenderContext::new("t").with_payload_value(json!({
            "sensor": {"value": 21.50, "count": 3, "ok": true, "name": "kitchen"},
            "list": [1, 2]
        }));
        assert_eq!(render("{{ payload.sensor.value }}", &ctx), "21.5");
        assert_eq!(render("{{ payload.sensor.count }}", &ctx), "3");
        assert_eq!(render("{{ payload.sensor.ok }}", &ctx), "true");
        assert_eq!(render("{{ payload.sensor.name }}", &ctx), "kitchen");
        assert_eq!(render("[{{ payload.sensor.missing }}]", &ctx), "[]");
        assert_eq!(render("[{{ payload.list.0 }}]", &ctx), "[]");
        assert_eq!(render("[{{ payload.sensor.name.deeper }}]", &ctx), "[]");
    }

    #[test]
    fn test_payload_float_without_trailing_zeros() {
        let ctx = RenderContext::new("t").with_payload(r#"{"v": 20.0, "w": 0.25}"#);
        assert_eq!(render("{{ payload.v }} {{ payload.w }}", &ctx), "20 0.25");
    }

    #[test]
    fn test_transforms() {
        let ctx = RenderContext::new("Home/Hall").with_payload(r#"{"name": "Kitchen"}"#);
        assert_eq!(render("{{ upper(payload.name) }}", &ctx), "KITCHEN");
        assert_eq!(render("{{ lower topic }}", &ctx), "home/hall");
        assert_eq!(render("{{ upper('payload.name') }}", &ctx), "PAYLOAD.NAME");
        assert_eq!(render("{{ upper(hello) }}", &ctx), "HELLO");
        assert_eq!(render("{{ default(payload.missing, \"n/a\") }}", &ctx), "n/a");
        assert_eq!(render("{{ default payload.name 'n/a' }}", &ctx), "Kitchen");
    }

    #[test]
    fn test_random_ranges() {
        let ctx = RenderContext::default();
        for _ in 0..50 {
            let n: i64 = render("{{ random.int(3, 5) }}", &ctx).parse().unwrap();
            assert!((3..=5).contains(&n));
            let d: i64 = render("{{ random.int }}", &ctx).parse().unwrap();
            assert!((0..=100).contains(&d));
            let f: f64 = render("{{ random.float 1.0 2.0 }}", &ctx).parse().unwrap();
            assert!((1.0..=2.0).contains(&f));
        }
        let fixed = render("{{ random.float(1, 2, 3) }}", &ctx);
        assert_eq!(fixed.split('.').nth(1).map(str::len), Some(3));
        assert_eq!(render("{{ random.string(12) }}", &ctx).len(), 12);
        assert_eq!(render("{{ random.string }}", &ctx).len(), 10);
        assert_eq!(render("{{ random }}", &ctx).len(), 16);
    }

    #[test]
    fn test_topic_keeps_unmatched_captures() {
        let ctx = RenderContext::new("sensors/device1/temperature")
            .with_wildcards(vec!["device1".to_string()]);
        let engine = TemplateEngine::new();
        assert_eq!(
            engine.render_topic("commands/{1}/{2}", &ctx),
            "commands/device1/{2}"
        );
        assert_eq!(
            engine.render_topic("replies/{{ topic }}/{3}", &ctx),
            "replies/sensors/device1/temperature/{3}"
        );
        assert_eq!(engine.render("commands/{1}/{2}", &ctx), "commands/device1/");
    }

    #[test]
    fn test_unsampleable_ranges_render_empty() {
        let ctx = RenderContext::default().with_seed(1);
        assert_eq!(render("{{ random.float(-1e308, 1e308) }}", &ctx), "");
        assert_eq!(render("[{{ faker.amount(1, inf) }}]", &ctx), "[]");
        assert_eq!(render("{{ faker.price(-1e308, 1e308) }}", &ctx), "");
        assert_eq!(render("{{ random.string(99999999) }}", &ctx), "");
        assert_eq!(render("{{ random.float(0, 1, 4000) }}", &ctx), "");
    }

    #[test]
    fn test_uuid_forms() {
        let ctx = RenderContext::default();
        let id = render("{{ uuid }}", &ctx);
        assert!(uuid::Uuid::parse_str(&id).is_ok());
        assert_eq!(render("{{ uuid.short }}", &ctx).len(), 8);
    }

    #[test]
    fn test_timestamps() {
        let ctx = RenderContext::default();
        let unix: i64 = render("{{ timestamp }}", &ctx).parse().unwrap();
        assert!(unix > 1_600_000_000);
        let iso = render("{{ timestamp.iso }}", &ctx);
        assert!(chrono::DateTime::parse_from_rfc3339(&iso).is_ok());
        assert!(chrono::DateTime::parse_from_rfc3339(&render("{{ now }}", &ctx)).is_ok());
    }

    #[test]
    fn test_sequence_uses_context_store() {
        let store = Arc::new(SequenceStore::new());
        let ctx = RenderContext::default().with_sequences(Arc::clone(&store));
        assert_eq!(render("{{ sequence(\"orders\", 5) }}", &ctx), "5");
        assert_eq!(render("{{ sequence orders 5 }}", &ctx), "6");
        assert_eq!(render("{{ sequence(\"other\") }}", &ctx), "1");
        assert_eq!(render("[{{ sequence(\"x\") }}]", &RenderContext::default()), "[]");
    }

    #[test]
    fn test_both_call_styles_agree() {
        let ctx = RenderContext::default().with_seed(99);
        let pairs = [
            ("{{ random.int(1, 1000) }}", "{{ random.int 1 1000 }}"),
            ("{{ faker.words(4) }}", "{{ faker.words 4 }}"),
            ("{{ random.float(0, 5, 2) }}", "{{ random.float 0 5 2 }}"),
        ];
        for (paren, legacy) in pairs {
            assert_eq!(render(paren, &ctx), render(legacy, &ctx));
        }
    }

    #[test]
    fn test_seeded_renders_are_identical() {
        let template = "{{ uuid }} {{ uuid.short }} {{ random }} {{ random.int }} \
            {{ random.float(0, 10, 4) }} {{ random.string(16) }} {{ random.bool }} \
            {{ faker.name }} {{ faker.email }} {{ faker.credit_card }} {{ faker.ipv4 }} \
            {{ faker.mac_address }} {{ faker.coordinates }} {{ faker.sentence(6) }}";
        let a = render(template, &RenderContext::default().with_seed(42));
        let b = render(template, &RenderContext::default().with_seed(42));
        let c = render(template, &RenderContext::default().with_seed(43));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_unseeded_renders_differ() {
        let ctx = RenderContext::default();
        assert_ne!(render("{{ uuid }}", &ctx), render("{{ uuid }}", &ctx));
    }

    #[test]
    fn test_unknown_faker_is_empty() {
        assert_eq!(render("[{{ faker.spaceship }}]", &RenderContext::default()), "[]");
    }

    struct StaticResolver;

    impl ContextResolver for StaticResolver {
        fn resolve(&self, scope: ExternalScope, path: &str) -> Option<String> {
            match (scope, path) {
                (ExternalScope::Request, "method") => Some("POST".into()),
                (ExternalScope::Mtls, "subject.cn") => Some("device-01".into()),
                _ => None,
            }
        }
    }

    #[test]
    fn test_external_scopes_use_resolver() {
        let engine = TemplateEngine::with_resolver(Arc::new(StaticResolver));
        let ctx = RenderContext::default();
        assert_eq!(
            engine.render("{{ request.method }} {{ mtls.subject.cn }} [{{ request.path }}]", &ctx),
            "POST device-01 []"
        );
        assert_eq!(render("[{{ request.method }}]", &ctx), "[]");
        assert_eq!(engine.render("{{ lower(mtls.subject.cn) }}", &ctx), "device-01");
    }
}

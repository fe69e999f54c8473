//! Template expression parsing
//!
//! Two surface syntaxes are accepted, `func(a, b)` and the legacy
//! `func a b`. Both are lexed into the same [`Call`], which is then
//! classified into an [`Expr`] variant. Evaluation only ever sees `Expr`.

/// Longest string `random.string(len)` may produce
const MAX_STRING_LEN: usize = 4096;
/// Most decimal places `random.float` may format
const MAX_PRECISION: usize = 17;

/// Canonical form of an expression: a dotted name plus raw arguments
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub name: String,
    pub args: Vec<String>,
}

/// Source of data resolved outside the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExternalScope {
    Request,
    Mtls,
}

/// Argument-free built-in values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Now,
    Uuid,
    UuidShort,
    TimestampUnix,
    TimestampIso,
    TimestampMs,
    Random,
    RandomBool,
    Topic,
    ClientId,
    DeviceId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transform {
    Upper,
    Lower,
    Default,
}

/// A classified template expression
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Builtin(Builtin),
    RandomInt {
        min: i64,
        max: i64,
    },
    RandomFloat {
        min: f64,
        max: f64,
        precision: Option<usize>,
    },
    RandomString {
        len: usize,
    },
    Sequence {
        name: String,
        start: i64,
    },
    /// 1-based wildcard capture
    Capture(usize),
    Payload(Vec<String>),
    Faker {
        kind: String,
        args: Vec<String>,
    },
    Transform {
        op: Transform,
        value: String,
        fallback: String,
    },
    External {
        scope: ExternalScope,
        path: String,
    },
    /// A lone identifier nothing recognises; the placeholder is kept as is
    Unknown(String),
    /// Anything malformed; renders as an empty string
    Invalid,
}

impl Expr {
    /// Parse and classify a raw expression (the text between `{{` and `}}`)
    pub fn parse(src: &str) -> Self {
        match parse_call(src) {
            Some(call) => classify(call),
            None => Self::Invalid,
        }
    }

    /// Whether this expression names something the engine can resolve
    pub fn is_resolvable(&self) -> bool {
        !matches!(self, Self::Unknown(_) | Self::Invalid)
    }
}

/// Lex an expression into its canonical call form
pub fn parse_call(src: &str) -> Option<Call> {
    let src = src.trim();
    if src.is_empty() {
        return None;
    }

    if let Some(open) = src.find('(') {
        let name = src[..open].trim();
        if is_name(name) {
            let inner = src[open + 1..].strip_suffix(')')?;
            let args = if inner.trim().is_empty() {
                Vec::new()
            } else {
                split_args(inner, |c| c == ',')?
            };
            return Some(Call {
                name: name.to_string(),
                args,
            });
        }
    }

    let mut tokens = split_args(src, char::is_whitespace)?.into_iter();
    let name = tokens.next()?;
    if !is_name(&name) && capture_index(&name).is_none() {
        return None;
    }
    Some(Call {
        name,
        args: tokens.collect(),
    })
}

/// Split on `sep` outside quotes and parentheses, trimming each piece
///
/// Empty pieces are dropped when splitting on whitespace; `None` means an
/// unbalanced quote or parenthesis.
fn split_args(src: &str, sep: impl Fn(char) -> bool) -> Option<Vec<String>> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut depth = 0usize;
    let whitespace_sep = sep(' ');

    for c in src.chars() {
        match quote {
            Some(q) => {
                current.push(c);
                if c == q {
                    quote = None;
                }
            }
            None if c == '"' || c == '\'' => {
                quote = Some(c);
                current.push(c);
            }
            None if c == '(' => {
                depth += 1;
                current.push(c);
            }
            None if c == ')' => {
                depth = depth.checked_sub(1)?;
                current.push(c);
            }
            None if depth == 0 && sep(c) => {
                args.push(std::mem::take(&mut current));
            }
            None => current.push(c),
        }
    }
    if quote.is_some() || depth != 0 {
        return None;
    }
    args.push(current);

    let args = args.into_iter().map(|a| a.trim().to_string());
    Some(if whitespace_sep {
        args.filter(|a| !a.is_empty()).collect()
    } else {
        args.collect()
    })
}

fn is_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '-')
}

fn capture_index(token: &str) -> Option<usize> {
    let digit = token.strip_prefix('{')?.strip_suffix('}')?;
    if digit.len() == 1 {
        digit.parse().ok()
    } else {
        None
    }
}

/// Remove one layer of matching single or double quotes
pub fn unquote(raw: &str) -> &str {
    let raw = raw.trim();
    for q in ['"', '\''] {
        if let Some(inner) = raw.strip_prefix(q).and_then(|s| s.strip_suffix(q)) {
            return inner;
        }
    }
    raw
}

pub fn is_quoted(raw: &str) -> bool {
    unquote(raw).len() != raw.trim().len()
}

fn num_arg<T: std::str::FromStr>(args: &[String], idx: usize, default: T) -> Option<T> {
    match args.get(idx) {
        Some(raw) => unquote(raw).trim().parse().ok(),
        None => Some(default),
    }
}

fn classify(call: Call) -> Expr {
    let Call { name, args } = call;

    if let Some(idx) = capture_index(&name) {
        return if args.is_empty() {
            Expr::Capture(idx)
        } else {
            Expr::Invalid
        };
    }

    let generator = match name.as_str() {
        "random.int" => Some(random_int(&args)),
        "random.float" => Some(random_float(&args)),
        "random.string" => Some(random_string(&args)),
        "sequence" => Some(sequence(&args)),
        "upper" => Some(transform(Transform::Upper, &args)),
        "lower" => Some(transform(Transform::Lower, &args)),
        "default" => Some(transform(Transform::Default, &args)),
        _ => None,
    };
    if let Some(expr) = generator {
        return expr.unwrap_or(Expr::Invalid);
    }

    if let Some(kind) = name.strip_prefix("faker.") {
        return Expr::Faker {
            kind: kind.to_string(),
            args,
        };
    }

    if !args.is_empty() {
        return Expr::Invalid;
    }

    if let Some(path) = name.strip_prefix("payload.") {
        return Expr::Payload(path.split('.').map(str::to_string).collect());
    }
    if let Some(path) = name.strip_prefix("request.") {
        return Expr::External {
            scope: ExternalScope::Request,
            path: path.to_string(),
        };
    }
    if let Some(path) = name.strip_prefix("mtls.") {
        return Expr::External {
            scope: ExternalScope::Mtls,
            path: path.to_string(),
        };
    }

    let builtin = match name.as_str() {
        "now" => Builtin::Now,
        "uuid" => Builtin::Uuid,
        "uuid.short" => Builtin::UuidShort,
        "timestamp" | "timestamp.unix" => Builtin::TimestampUnix,
        "timestamp.iso" => Builtin::TimestampIso,
        "timestamp.ms" => Builtin::TimestampMs,
        "random" => Builtin::Random,
        "random.bool" => Builtin::RandomBool,
        "topic" => Builtin::Topic,
        "clientId" => Builtin::ClientId,
        "device_id" => Builtin::DeviceId,
        _ => return Expr::Unknown(name),
    };
    Expr::Builtin(builtin)
}

fn random_int(args: &[String]) -> Option<Expr> {
    let min = num_arg(args, 0, 0i64)?;
    let max = num_arg(args, 1, if args.is_empty() { 100 } else { min })?;
    Some(Expr::RandomInt {
        min: min.min(max),
        max: min.max(max),
    })
}

fn random_float(args: &[String]) -> Option<Expr> {
    let min = num_arg(args, 0, 0.0f64)?;
    let max = num_arg(args, 1, if args.is_empty() { 1.0 } else { min })?;
    let precision = match args.get(2) {
        Some(_) => Some(num_arg(args, 2, 0usize).filter(|p| *p <= MAX_PRECISION)?),
        None => None,
    };
    // Also rejects infinities, NaN and spans too wide to sample
    if !(max - min).is_finite() {
        return None;
    }
    Some(Expr::RandomFloat {
        min: min.min(max),
        max: min.max(max),
        precision,
    })
}

fn random_string(args: &[String]) -> Option<Expr> {
    let len = num_arg(args, 0, 10usize)?;
    (len <= MAX_STRING_LEN).then_some(Expr::RandomString { len })
}

fn sequence(args: &[String]) -> Option<Expr> {
    let name = unquote(args.first()?);
    if name.is_empty() {
        return None;
    }
    Some(Expr::Sequence {
        name: name.to_string(),
        start: num_arg(args, 1, 1i64)?,
    })
}

fn transform(op: Transform, args: &[String]) -> Option<Expr> {
    Some(Expr::Transform {
        op,
        value: args.first()?.clone(),
        fallback: args.get(1).map(|f| unquote(f).to_string()).unwrap_or_default(),
    })
}

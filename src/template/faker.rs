//! Realistic sample value generators behind `faker.<type>`
//!
//! Every generator draws from the caller's rng, so seeded renders stay
//! reproducible.

use rand::rngs::StdRng;
use rand::Rng;

/// Upper bound on `words`, `sentence`, `slug` and `paragraph` counts
const MAX_COUNT: usize = 1000;

const FIRST_NAMES: &[&str] = &[
    "James", "Mary", "Robert", "Patricia", "John", "Jennifer", "Michael", "Linda", "David",
    "Elizabeth", "William", "Barbara", "Sofia", "Lukas", "Emma", "Noah", "Mia", "Elias", "Hannah",
    "Yuki", "Amara", "Mateo", "Priya", "Oskar",
];

const LAST_NAMES: &[&str] = &[
    "Smith", "Johnson", "Williams", "Brown", "Jones", "Garcia", "Miller", "Davis", "Martinez",
    "Wilson", "Anderson", "Taylor", "Schneider", "Fischer", "Weber", "Novak", "Silva", "Tanaka",
    "Okafor", "Larsen",
];

const COMPANY_SUFFIXES: &[&str] = &["Inc", "LLC", "GmbH", "Group", "Systems", "Labs", "Industries"];

const JOB_TITLES: &[&str] = &[
    "Field Technician", "Site Engineer", "Operations Manager", "Data Analyst",
    "Facility Coordinator", "Maintenance Planner", "Energy Consultant", "Software Engineer",
];

const STREETS: &[&str] = &[
    "Main", "Oak", "Pine", "Maple", "Cedar", "Elm", "Lake", "Hill", "Station", "Mill", "River",
];

const STREET_SUFFIXES: &[&str] = &["Street", "Avenue", "Road", "Lane", "Way", "Boulevard"];

const CITIES: &[&str] = &[
    "Springfield", "Riverside", "Hamburg", "Lyon", "Osaka", "Porto", "Denver", "Toronto",
    "Melbourne", "Gothenburg", "Austin", "Utrecht",
];

const COUNTRIES: &[(&str, &str)] = &[
    ("United States", "US"),
    ("Germany", "DE"),
    ("France", "FR"),
    ("Japan", "JP"),
    ("Portugal", "PT"),
    ("Canada", "CA"),
    ("Australia", "AU"),
    ("Sweden", "SE"),
    ("Netherlands", "NL"),
    ("Brazil", "BR"),
];

const TLDS: &[&str] = &["com", "net", "org", "io", "dev", "example"];

const CURRENCIES: &[&str] = &["USD", "EUR", "GBP", "JPY", "CHF", "CAD", "AUD", "SEK"];

const COLORS: &[&str] = &[
    "red", "green", "blue", "orange", "purple", "teal", "black", "white", "silver", "amber",
];

const DEPARTMENTS: &[&str] = &[
    "Electronics", "Garden", "Tools", "Home", "Automotive", "Sports", "Toys", "Grocery",
];

const PRODUCT_ADJECTIVES: &[&str] = &["Smart", "Compact", "Rugged", "Wireless", "Ergonomic", "Solar"];

const PRODUCT_MATERIALS: &[&str] = &["Steel", "Aluminum", "Plastic", "Wooden", "Carbon", "Glass"];

const PRODUCT_NOUNS: &[&str] = &["Sensor", "Thermostat", "Plug", "Camera", "Hub", "Lamp", "Valve"];

const WORDS: &[&str] = &[
    "lorem", "ipsum", "dolor", "sit", "amet", "consectetur", "adipiscing", "elit", "sed", "do",
    "eiusmod", "tempor", "incididunt", "ut", "labore", "et", "dolore", "magna", "aliqua", "enim",
    "minim", "veniam", "quis", "nostrud",
];

/// Issuer prefix and total length: Visa, Mastercard, Amex
const CARD_PREFIXES: &[(&[u8], usize)] = &[
    (&[4], 16),
    (&[5, 1], 16),
    (&[5, 5], 16),
    (&[3, 4], 15),
    (&[3, 7], 15),
];

const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_4) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64; rv:125.0) Gecko/20100101 Firefox/125.0",
    "curl/8.7.1",
    "esp-idf/5.2 esp32",
];

/// Generate a value for `faker.<name>`; `None` for unknown names or bad args
pub fn generate(name: &str, args: &[String], rng: &mut StdRng) -> Option<String> {
    let value = match name {
        // identity
        "first_name" | "firstName" => pick(rng, FIRST_NAMES).to_string(),
        "last_name" | "lastName" => pick(rng, LAST_NAMES).to_string(),
        "name" => format!("{} {}", pick(rng, FIRST_NAMES), pick(rng, LAST_NAMES)),
        "username" => username(rng),
        "email" => email(rng),
        "phone" => format!(
            "+1-555-{:03}-{:04}",
            rng.gen_range(100..1000),
            rng.gen_range(0..10000)
        ),
        "company" => format!("{} {}", pick(rng, LAST_NAMES), pick(rng, COMPANY_SUFFIXES)),
        "job_title" | "jobTitle" => pick(rng, JOB_TITLES).to_string(),

        // finance
        "credit_card" | "creditCard" => credit_card(rng),
        "iban" => iban(rng),
        "currency_code" | "currency" => pick(rng, CURRENCIES).to_string(),
        "amount" => money(rng, args)?,

        // geo
        "latitude" => format!("{:.6}", rng.gen_range(-90.0..=90.0)),
        "longitude" => format!("{:.6}", rng.gen_range(-180.0..=180.0)),
        "coordinates" => format!(
            "{:.6},{:.6}",
            rng.gen_range(-90.0..=90.0),
            rng.gen_range(-180.0..=180.0)
        ),
        "city" => pick(rng, CITIES).to_string(),
        "country" => pick(rng, COUNTRIES).0.to_string(),
        "country_code" | "countryCode" => pick(rng, COUNTRIES).1.to_string(),
        "street_address" | "streetAddress" => street_address(rng),
        "zip_code" | "zipCode" | "zip" => format!("{:05}", rng.gen_range(1000..100000)),
        "address" => format!(
            "{}, {} {:05}",
            street_address(rng),
            pick(rng, CITIES),
            rng.gen_range(1000..100000)
        ),

        // internet
        "ipv4" | "ip" => format!(
            "{}.{}.{}.{}",
            rng.gen_range(1..=223),
            rng.gen_range(0..=255),
            rng.gen_range(0..=255),
            rng.gen_range(1..=254)
        ),
        "ipv6" => (0..8)
            .map(|_| format!("{:04x}", rng.gen::<u16>()))
            .collect::<Vec<_>>()
            .join(":"),
        "mac_address" | "macAddress" | "mac" => (0..6)
            .map(|_| format!("{:02x}", rng.gen::<u8>()))
            .collect::<Vec<_>>()
            .join(":"),
        "domain" => domain(rng),
        "hostname" => format!("{}-{:02}.{}", pick(rng, WORDS), rng.gen_range(1..100), domain(rng)),
        "url" => format!("https://{}/{}", domain(rng), slug(rng, 2)),
        "slug" => slug(rng, count(args, 3)?),
        "user_agent" | "userAgent" => pick(rng, USER_AGENTS).to_string(),

        // commerce
        "product_name" | "productName" | "product" => format!(
            "{} {} {}",
            pick(rng, PRODUCT_ADJECTIVES),
            pick(rng, PRODUCT_MATERIALS),
            pick(rng, PRODUCT_NOUNS)
        ),
        "color" => pick(rng, COLORS).to_string(),
        "department" => pick(rng, DEPARTMENTS).to_string(),
        "sku" => format!(
            "SKU-{}",
            (0..8)
                .map(|_| *pick(rng, b"ABCDEFGHJKLMNPQRSTUVWXYZ0123456789") as char)
                .collect::<String>()
        ),
        "price" => money(rng, args)?,

        // text
        "word" => pick(rng, WORDS).to_string(),
        "words" => words(rng, count(args, 3)?),
        "sentence" => sentence(rng, count(args, 8)?),
        "paragraph" => {
            (0..count(args, 3)?.max(1))
                .map(|_| {
                    let len = rng.gen_range(5..12);
                    sentence(rng, len)
                })
                .collect::<Vec<_>>()
                .join(" ")
        }

        // misc
        "uuid" => uuid::Builder::from_random_bytes(rng.gen())
            .into_uuid()
            .to_string(),
        "boolean" | "bool" => rng.gen::<bool>().to_string(),
        "number" => {
            let min: i64 = arg(args, 0).unwrap_or(Ok(0)).ok()?;
            let max: i64 = arg(args, 1).unwrap_or(Ok(1000)).ok()?;
            rng.gen_range(min.min(max)..=min.max(max)).to_string()
        }

        _ => return None,
    };
    Some(value)
}

/// Luhn check digit for the given digits (check digit not included)
pub fn luhn_check_digit(digits: &[u8]) -> u8 {
    let sum: u32 = digits
        .iter()
        .rev()
        .enumerate()
        .map(|(i, d)| {
            let d = u32::from(*d);
            if i % 2 == 0 {
                let doubled = d * 2;
                if doubled > 9 {
                    doubled - 9
                } else {
                    doubled
                }
            } else {
                d
            }
        })
        .sum();
    ((10 - sum % 10) % 10) as u8
}

fn pick<'a, T>(rng: &mut StdRng, items: &'a [T]) -> &'a T {
    &items[rng.gen_range(0..items.len())]
}

fn count(args: &[String], default: usize) -> Option<usize> {
    let count: usize = arg(args, 0).unwrap_or(Ok(default)).ok()?;
    (count <= MAX_COUNT).then_some(count)
}

fn arg<T: std::str::FromStr>(args: &[String], idx: usize) -> Option<Result<T, ()>> {
    args.get(idx)
        .map(|raw| raw.trim().trim_matches(['"', '\'']).parse().map_err(|_| ()))
}

fn username(rng: &mut StdRng) -> String {
    format!(
        "{}{}",
        pick(rng, FIRST_NAMES).to_lowercase(),
        rng.gen_range(1..1000)
    )
}

fn email(rng: &mut StdRng) -> String {
    format!(
        "{}.{}{}@{}",
        pick(rng, FIRST_NAMES).to_lowercase(),
        pick(rng, LAST_NAMES).to_lowercase(),
        rng.gen_range(1..100),
        domain(rng)
    )
}

fn domain(rng: &mut StdRng) -> String {
    format!("{}.{}", pick(rng, WORDS), pick(rng, TLDS))
}

fn slug(rng: &mut StdRng, count: usize) -> String {
    (0..count.max(1))
        .map(|_| *pick(rng, WORDS))
        .collect::<Vec<_>>()
        .join("-")
}

fn words(rng: &mut StdRng, count: usize) -> String {
    (0..count.max(1))
        .map(|_| *pick(rng, WORDS))
        .collect::<Vec<_>>()
        .join(" ")
}

fn sentence(rng: &mut StdRng, count: usize) -> String {
    let text = words(rng, count);
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => format!("{}{}.", first.to_uppercase(), chars.as_str()),
        None => String::new(),
    }
}

fn street_address(rng: &mut StdRng) -> String {
    format!(
        "{} {} {}",
        rng.gen_range(1..10000),
        pick(rng, STREETS),
        pick(rng, STREET_SUFFIXES)
    )
}

fn money(rng: &mut StdRng, args: &[String]) -> Option<String> {
    let min: f64 = arg(args, 0).unwrap_or(Ok(1.0)).ok()?;
    let max: f64 = arg(args, 1).unwrap_or(Ok(1000.0)).ok()?;
    if !(max - min).is_finite() {
        return None;
    }
    Some(format!("{:.2}", rng.gen_range(min.min(max)..=min.max(max))))
}

fn credit_card(rng: &mut StdRng) -> String {
    let (prefix, len) = *pick(rng, CARD_PREFIXES);
    let mut digits = prefix.to_vec();
    while digits.len() < len - 1 {
        digits.push(rng.gen_range(0..10));
    }
    digits.push(luhn_check_digit(&digits));
    digits.iter().map(|d| char::from(b'0' + d)).collect()
}

/// German-format IBAN with valid mod-97 check digits
fn iban(rng: &mut StdRng) -> String {
    let bban: String = (0..18).map(|_| char::from(b'0' + rng.gen_range(0..10u8))).collect();
    // "DE" becomes 13 14, followed by placeholder check digits 00
    let rearranged = format!("{bban}131400");
    let remainder = rearranged
        .bytes()
        .fold(0u32, |acc, b| (acc * 10 + u32::from(b - b'0')) % 97);
    format!("DE{:02}{}", 98 - remainder, bban)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    fn luhn_valid(number: &str) -> bool {
        let digits: Option<Vec<u8>> = number
            .chars()
            .map(|c| c.to_digit(10).map(|d| d as u8))
            .collect();
        match digits.as_deref() {
            Some([body @ .., check]) if !body.is_empty() => luhn_check_digit(body) == *check,
            _ => false,
        }
    }

    #[test]
    fn test_luhn() {
        assert_eq!(luhn_check_digit(&[7, 9, 9, 2, 7, 3, 9, 8, 7, 1]), 3);
        assert!(luhn_valid("79927398713"));
        assert!(!luhn_valid("79927398714"));
        assert!(!luhn_valid("4"));
        assert!(!luhn_valid("4x11"));
    }

    #[test]
    fn test_credit_cards_pass_luhn() {
        let mut rng = rng();
        for _ in 0..50 {
            let card = generate("credit_card", &[], &mut rng).unwrap();
            assert!(card.len() == 15 || card.len() == 16, "{card}");
            assert!(luhn_valid(&card), "{card}");
        }
    }

    #[test]
    fn test_iban_checksum() {
        let mut rng = rng();
        let iban = generate("iban", &[], &mut rng).unwrap();
        assert_eq!(iban.len(), 22);
        assert!(iban.starts_with("DE"));
        let rem = format!("{}1314{}", &iban[4..], &iban[2..4])
            .bytes()
            .fold(0u32, |acc, b| (acc * 10 + u32::from(b - b'0')) % 97);
        assert_eq!(rem, 1);
    }

    #[test]
    fn test_network_formats() {
        let mut rng = rng();
        let ip = generate("ipv4", &[], &mut rng).unwrap();
        assert!(ip.parse::<std::net::Ipv4Addr>().is_ok(), "{ip}");
        let ip6 = generate("ipv6", &[], &mut rng).unwrap();
        assert!(ip6.parse::<std::net::Ipv6Addr>().is_ok(), "{ip6}");
        let mac = generate("mac_address", &[], &mut rng).unwrap();
        assert_eq!(mac.split(':').count(), 6);
    }

    #[test]
    fn test_coordinates_in_range() {
        let mut rng = rng();
        for _ in 0..20 {
            let lat: f64 = generate("latitude", &[], &mut rng).unwrap().parse().unwrap();
            let lon: f64 = generate("longitude", &[], &mut rng).unwrap().parse().unwrap();
            assert!((-90.0..=90.0).contains(&lat));
            assert!((-180.0..=180.0).contains(&lon));
        }
    }

    #[test]
    fn test_parameterized_generators() {
        let mut rng = rng();
        let words = generate("words", &["4".into()], &mut rng).unwrap();
        assert_eq!(words.split(' ').count(), 4);
        let slug = generate("slug", &["2".into()], &mut rng).unwrap();
        assert_eq!(slug.split('-').count(), 2);
        let n: i64 = generate("number", &["5".into(), "6".into()], &mut rng)
            .unwrap()
            .parse()
            .unwrap();
        assert!((5..=6).contains(&n));
        let price: f64 = generate("price", &["10".into(), "20".into()], &mut rng)
            .unwrap()
            .parse()
            .unwrap();
        assert!((10.0..=20.0).contains(&price));
        assert!(generate("words", &["many".into()], &mut rng).is_none());
    }

    #[test]
    fn test_unbounded_money_range_is_rejected() {
        let mut rng = rng();
        assert!(generate("amount", &["1".into(), "inf".into()], &mut rng).is_none());
        assert!(generate("price", &["-1e308".into(), "1e308".into()], &mut rng).is_none());
        assert!(generate("price", &["NaN".into(), "5".into()], &mut rng).is_none());
    }

    #[test]
    fn test_counts_are_capped() {
        let mut rng = rng();
        assert!(generate("words", &["1000".into()], &mut rng).is_some());
        assert!(generate("words", &["1001".into()], &mut rng).is_none());
        assert!(generate("paragraph", &["99999999999".into()], &mut rng).is_none());
        assert!(generate("slug", &["5000".into()], &mut rng).is_none());
    }

    #[test]
    fn test_unknown_generator() {
        assert!(generate("spaceship", &[], &mut rng()).is_none());
    }

    #[test]
    fn test_same_seed_same_values() {
        let names = ["name", "email", "address", "credit_card", "uuid", "sentence"];
        for name in names {
            assert_eq!(
                generate(name, &[], &mut rng()),
                generate(name, &[], &mut rng()),
                "{name}"
            );
        }
    }
}

//! Strategy evaluation against a parsed page

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use std::cell::OnceCell;
use std::collections::HashMap;
use std::sync::LazyLock;
use tracing::warn;

use super::jsonld;
use super::rules::{RESTAURANT_RULES, Slot, Strategy, Transform};
use super::text::non_empty;

/// Body-text patterns of the rule table, compiled once
static BODY_PATTERNS: LazyLock<HashMap<&'static str, Regex>> = LazyLock::new(|| {
    RESTAURANT_RULES
        .iter()
        .flat_map(|rule| rule.strategies)
        .filter_map(|strategy| match *strategy {
            Strategy::BodyRegex(pattern) => match Regex::new(pattern) {
                Ok(re) => Some((pattern, re)),
                Err(e) => {
                    warn!("Invalid body pattern {:?}: {}", pattern, e);
                    None
                }
            },
            _ => None,
        })
        .collect()
});

static FIRST_NUMBER: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\d+(?:\.\d+)?").ok());

/// Parsed document plus lazily derived views of it
pub struct PageContext<'a> {
    pub document: &'a Html,
    pub jsonld: Option<&'a Value>,
    body_text: OnceCell<String>,
}

impl<'a> PageContext<'a> {
    pub fn new(document: &'a Html, jsonld: Option<&'a Value>) -> Self {
        Self {
            document,
            jsonld,
            body_text: OnceCell::new(),
        }
    }

    /// First strategy of the slot's rule that yields a non-empty value
    pub fn resolve(&self, slot: Slot) -> Option<String> {
        let rule = RESTAURANT_RULES.iter().find(|r| r.slot == slot)?;
        rule.strategies
            .iter()
            .find_map(|strategy| self.apply(strategy, rule.transform))
    }

    fn apply(&self, strategy: &Strategy, transform: Transform) -> Option<String> {
        let root = self.document.root_element();
        match *strategy {
            Strategy::Text(css) => first_text(root, css).and_then(|v| transform.apply(&v)),
            Strategy::AllText(css) => {
                let parts: Vec<String> = all_text(root, css)
                    .iter()
                    .filter_map(|v| transform.apply(v))
                    .collect();
                (!parts.is_empty()).then(|| parts.join(", "))
            }
            Strategy::Attr(css, attr) => {
                let selector = selector(css)?;
                let value = root.select(&selector).find_map(|el| el.value().attr(attr))?;
                non_empty(value).and_then(|v| transform.apply(&v))
            }
            Strategy::JsonLd(path) => {
                let value = jsonld::lookup(self.jsonld?, path)?;
                non_empty(&value).and_then(|v| transform.apply(&v))
            }
            Strategy::JsonLdJoin(paths) => {
                let value = self.jsonld?;
                let parts: Vec<String> = paths
                    .iter()
                    .filter_map(|path| jsonld::lookup(value, path))
                    .filter_map(|part| non_empty(&part))
                    .collect();
                (!parts.is_empty())
                    .then(|| parts.join(", "))
                    .and_then(|v| transform.apply(&v))
            }
            Strategy::BodyRegex(pattern) => {
                let caps = BODY_PATTERNS.get(pattern)?.captures(self.body_text())?;
                let hit = caps.get(1).or_else(|| caps.get(0))?;
                non_empty(hit.as_str()).and_then(|v| transform.apply(&v))
            }
        }
    }

    /// Visible text of the document, scripts and styles excluded
    pub fn body_text(&self) -> &str {
        self.body_text.get_or_init(|| visible_text(self.document.root_element()))
    }
}

impl Transform {
    fn apply(self, value: &str) -> Option<String> {
        match self {
            Transform::None => non_empty(value),
            Transform::FirstNumber => FIRST_NUMBER
                .as_ref()?
                .find(value)
                .map(|m| m.as_str().to_string()),
            Transform::Digits => {
                let digits: String = value.chars().filter(char::is_ascii_digit).collect();
                (!digits.is_empty()).then_some(digits)
            }
            Transform::StripPrefix(prefix) => {
                let trimmed = value.trim_start();
                let rest = match trimmed.get(..prefix.len()) {
                    Some(head) if head.eq_ignore_ascii_case(prefix) => &trimmed[prefix.len()..],
                    _ => trimmed,
                };
                non_empty(rest)
            }
            Transform::TelLink => non_empty(value.strip_prefix("tel:").unwrap_or(value)),
        }
    }
}

/// Compile a selector from the rule tables
///
/// Table selectors are covered by tests; a bad one is logged and treated as
/// a miss rather than failing the page.
pub fn selector(css: &str) -> Option<Selector> {
    match Selector::parse(css) {
        Ok(selector) => Some(selector),
        Err(e) => {
            warn!("Invalid selector {:?}: {:?}", css, e);
            None
        }
    }
}

/// Normalized text of an element, text nodes separated by spaces
pub fn element_text(el: ElementRef<'_>) -> String {
    let raw = el.text().collect::<Vec<_>>().join(" ");
    non_empty(&raw).unwrap_or_default()
}

/// Text of the first match under `scope` that has any
pub fn first_text(scope: ElementRef<'_>, css: &str) -> Option<String> {
    let selector = selector(css)?;
    scope
        .select(&selector)
        .map(element_text)
        .find(|text| !text.is_empty())
}

/// First selector in `candidates` with a non-empty match
pub fn first_text_of(scope: ElementRef<'_>, candidates: &[&str]) -> Option<String> {
    candidates.iter().find_map(|css| first_text(scope, css))
}

pub fn all_text(scope: ElementRef<'_>, css: &str) -> Vec<String> {
    let Some(selector) = selector(css) else {
        return Vec::new();
    };
    scope
        .select(&selector)
        .map(element_text)
        .filter(|text| !text.is_empty())
        .collect()
}

fn visible_text(root: ElementRef<'_>) -> String {
    let mut out = String::new();
    for node in root.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node
            .parent()
            .and_then(|p| p.value().as_element().map(|e| e.name()))
            .is_some_and(|name| matches!(name, "script" | "style" | "noscript" | "template"));
        if !hidden {
            out.push_str(text);
            out.push(' ');
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(body: &str) -> Html {
        Html::parse_document(&format!("<html><body>{body}</body></html>"))
    }

    #[test]
    fn every_body_pattern_is_compiled_once() {
        let patterns: std::collections::HashSet<&str> = RESTAURANT_RULES
            .iter()
            .flat_map(|rule| rule.strategies)
            .filter_map(|strategy| match *strategy {
                Strategy::BodyRegex(pattern) => Some(pattern),
                _ => None,
            })
            .collect();
        assert!(!patterns.is_empty());
        assert_eq!(BODY_PATTERNS.len(), patterns.len());
        assert!(FIRST_NUMBER.is_some());
    }

    #[test]
    fn falls_back_to_later_strategy() {
        let html = doc("<h1>Plain Header</h1>");
        let ld = json!({"@type": "Restaurant", "name": "From Metadata"});
        let ctx = PageContext::new(&html, Some(&ld));
        assert_eq!(ctx.resolve(Slot::Name).as_deref(), Some("From Metadata"));

        let ctx = PageContext::new(&html, None);
        assert_eq!(ctx.resolve(Slot::Name).as_deref(), Some("Plain Header"));
    }

    #[test]
    fn empty_match_is_skipped() {
        let html = doc(r#"<h1 data-testid="restaurant-name">  </h1><h1>Taqueria</h1>"#);
        let ctx = PageContext::new(&html, None);
        assert_eq!(ctx.resolve(Slot::Name).as_deref(), Some("Taqueria"));
    }

    #[test]
    fn rating_keeps_first_number() {
        let html = doc(r#"<span data-testid="restaurant-rating">4.7 stars</span>"#);
        let ctx = PageContext::new(&html, None);
        assert_eq!(ctx.resolve(Slot::Rating).as_deref(), Some("4.7"));
    }

    #[test]
    fn review_count_from_body_text() {
        let html = doc("<div><span>4.5</span> <span>1,204 ratings</span></div><script>var x = '9 reviews';</script>");
        let ctx = PageContext::new(&html, None);
        assert_eq!(ctx.resolve(Slot::ReviewCount).as_deref(), Some("1204"));
    }

    #[test]
    fn phone_from_tel_link() {
        let html = doc(r#"<a href="tel:+13125550100">Call</a>"#);
        let ctx = PageContext::new(&html, None);
        assert_eq!(ctx.resolve(Slot::Phone).as_deref(), Some("+13125550100"));
    }

    #[test]
    fn hours_prefix_stripped() {
        let html = doc(
            r#"<p data-testid="pickupHours-0">Pickup: 11:00am - 9:00pm</p>
               <p data-testid="deliveryHours-0">DELIVERY: 11:30am - 8:30pm</p>"#,
        );
        let ctx = PageContext::new(&html, None);
        assert_eq!(ctx.resolve(Slot::PickupHours).as_deref(), Some("11:00am - 9:00pm"));
        assert_eq!(ctx.resolve(Slot::DeliveryHours).as_deref(), Some("11:30am - 8:30pm"));
    }

    #[test]
    fn address_joined_from_metadata() {
        let html = doc("");
        let ld = json!({
            "address": {
                "streetAddress": "1 Main St",
                "addressLocality": "Springfield",
                "addressRegion": "IL",
                "postalCode": "62701"
            }
        });
        let ctx = PageContext::new(&html, Some(&ld));
        assert_eq!(
            ctx.resolve(Slot::Address).as_deref(),
            Some("1 Main St, Springfield, IL, 62701")
        );
        assert_eq!(ctx.resolve(Slot::Zip).as_deref(), Some("62701"));
    }

    #[test]
    fn delivery_fee_and_time_from_body() {
        let html = doc("<div>$2.99 delivery fee</div><div>25-35 min</div>");
        let ctx = PageContext::new(&html, None);
        assert_eq!(ctx.resolve(Slot::DeliveryFee).as_deref(), Some("$2.99"));
        assert_eq!(ctx.resolve(Slot::DeliveryTime).as_deref(), Some("25-35 min"));
    }

    #[test]
    fn element_text_separates_nodes() {
        let html = doc("<p><b>Open</b><i>late</i></p>");
        let p = html.select(&Selector::parse("p").unwrap()).next().unwrap();
        assert_eq!(element_text(p), "Open late");
    }
}

//! Embedded schema.org metadata

use scraper::{Html, Selector};
use serde_json::Value;
use tracing::debug;

const LD_JSON_SELECTOR: &str = "script[type='application/ld+json']";

/// First `Restaurant` object among the page's JSON-LD blocks
///
/// Blocks may hold a single object, an array of objects, or an `@graph`.
/// Unparseable blocks are skipped.
pub fn find_restaurant(document: &Html) -> Option<Value> {
    let selector = Selector::parse(LD_JSON_SELECTOR).ok()?;
    document
        .select(&selector)
        .filter_map(|script| {
            let raw: String = script.text().collect();
            match serde_json::from_str::<Value>(raw.trim()) {
                Ok(value) => Some(value),
                Err(e) => {
                    debug!("Skipping malformed JSON-LD block: {}", e);
                    None
                }
            }
        })
        .find_map(restaurant_in)
}

fn restaurant_in(value: Value) -> Option<Value> {
    match value {
        Value::Array(items) => items.into_iter().find_map(restaurant_in),
        Value::Object(mut map) => {
            if map.get("@type").is_some_and(is_restaurant_type) {
                return Some(Value::Object(map));
            }
            map.remove("@graph").and_then(restaurant_in)
        }
        _ => None,
    }
}

fn is_restaurant_type(ty: &Value) -> bool {
    match ty {
        Value::String(s) => s == "Restaurant",
        Value::Array(types) => types.iter().any(|t| t.as_str() == Some("Restaurant")),
        _ => false,
    }
}

/// Scalar at `path` rendered as text; arrays yield their first element
pub fn lookup(value: &Value, path: &[&str]) -> Option<String> {
    let mut node = value;
    for key in path {
        node = first(node).get(key)?;
    }
    scalar(first(node))
}

/// Every string under `key`, whether it holds one string or a list
pub fn strings(value: &Value, key: &str) -> Vec<String> {
    match value.get(key) {
        Some(Value::String(s)) => vec![s.clone()],
        Some(Value::Array(items)) => items.iter().filter_map(scalar).collect(),
        _ => Vec::new(),
    }
}

pub fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn first(value: &Value) -> &Value {
    match value {
        Value::Array(items) => items.first().unwrap_or(value),
        _ => value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn page(blocks: &[&str]) -> Html {
        let scripts: String = blocks
            .iter()
            .map(|b| format!("<script type=\"application/ld+json\">{b}</script>"))
            .collect();
        Html::parse_document(&format!("<html><head>{scripts}</head><body></body></html>"))
    }

    #[test]
    fn finds_restaurant_among_blocks() {
        let doc = page(&[
            "not json {",
            r#"{"@type":"BreadcrumbList"}"#,
            r#"{"@graph":[{"@type":"WebPage"},{"@type":"Restaurant","name":"Luigi's"}]}"#,
        ]);
        let restaurant = find_restaurant(&doc).unwrap();
        assert_eq!(restaurant["name"], "Luigi's");
    }

    #[test]
    fn no_restaurant_block() {
        let doc = page(&[r#"{"@type":"Organization"}"#]);
        assert!(find_restaurant(&doc).is_none());
    }

    #[test]
    fn lookup_renders_numbers_and_walks_arrays() {
        let value = json!({
            "aggregateRating": {"ratingValue": 4.5, "reviewCount": 120},
            "address": [{"addressLocality": "Chicago"}]
        });
        assert_eq!(lookup(&value, &["aggregateRating", "ratingValue"]).as_deref(), Some("4.5"));
        assert_eq!(lookup(&value, &["address", "addressLocality"]).as_deref(), Some("Chicago"));
        assert_eq!(lookup(&value, &["telephone"]), None);
    }

    #[test]
    fn strings_accepts_single_or_list() {
        assert_eq!(strings(&json!({"c": "Thai"}), "c"), vec!["Thai"]);
        assert_eq!(strings(&json!({"c": ["Thai", "Lao"]}), "c"), vec!["Thai", "Lao"]);
        assert!(strings(&json!({}), "c").is_empty());
    }
}

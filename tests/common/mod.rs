#![allow(dead_code)]

use chrono::{TimeZone, Utc};
use rust_decimal::Decimal;
use std::str::FromStr;

use menu_scraper::error::ErrorKind;
use menu_scraper::model::{Hours, StructuredAddress};
use menu_scraper::{MenuCategory, MenuItem, Outcome, RestaurantRecord, ScrapeResult, ScrapeTarget};

pub fn target(id: usize) -> ScrapeTarget {
    ScrapeTarget {
        id,
        url: format!("https://www.grubhub.com/restaurant/spot-{id}/{}", 1000 + id),
        slug: format!("spot-{id}"),
        timeout_secs: None,
    }
}

pub fn item(name: &str, price: Option<&str>) -> MenuItem {
    MenuItem {
        name: name.to_string(),
        price: price.map(|p| Decimal::from_str(p).unwrap()),
        price_text: price.map(|p| format!("${p}")),
        description: None,
        image_url: None,
        source_id: None,
    }
}

pub fn record(name: &str, menu: Vec<MenuCategory>) -> RestaurantRecord {
    RestaurantRecord {
        name: name.to_string(),
        url: format!("https://www.grubhub.com/restaurant/{}/1", name.to_lowercase()),
        address: Some("1 Main St, Springfield, IL 62701".to_string()),
        phone: Some("(217) 555-0100".to_string()),
        rating: Some("4.5".to_string()),
        review_count: Some("120".to_string()),
        price_range: Some("$$".to_string()),
        cuisines: vec!["Pizza".to_string()],
        hours: Hours {
            pickup: Some("11am - 10pm".to_string()),
            delivery: None,
        },
        structured_address: StructuredAddress {
            street: Some("1 Main St".to_string()),
            city: Some("Springfield".to_string()),
            state: Some("IL".to_string()),
            zip: Some("62701".to_string()),
        },
        delivery: Default::default(),
        reviews: Vec::new(),
        menu,
        scraped_at: Utc.with_ymd_and_hms(2024, 6, 1, 18, 30, 0).unwrap(),
    }
}

pub fn success(id: usize, record: RestaurantRecord) -> ScrapeResult {
    ScrapeResult {
        target: target(id),
        outcome: Outcome::Success {
            record,
            missing: Vec::new(),
        },
        elapsed_ms: 1200,
    }
}

pub fn failure(id: usize, kind: ErrorKind, message: &str) -> ScrapeResult {
    ScrapeResult::failure(target(id), kind, message)
}

/// Minimal restaurant page the extractor accepts
pub fn restaurant_html(name: &str, items: &[(&str, &str)]) -> String {
    let items: String = items
        .iter()
        .map(|(item, price)| {
            format!(
                r#"<article data-testid="restaurant-menu-item"><h6 data-testid="menu-item-name">{item}</h6>
                   <span data-testid="menu-item-price">{price}</span></article>"#
            )
        })
        .collect();
    format!(
        r#"<html><body><h1 data-testid="restaurant-name">{name}</h1>
           <h3 data-testid="menuSection-title">Menu</h3>{items}</body></html>"#
    )
}

//! Ordered fallback strategies per field
//!
//! The marketplace reshuffles its markup often. Adding or reordering a
//! selector is a change to these tables only.

/// Where a field value may come from
#[derive(Debug, Clone, Copy)]
pub enum Strategy {
    /// Text of the first element matching a CSS selector
    Text(&'static str),
    /// Text of every matching element, joined with `", "`
    AllText(&'static str),
    /// Attribute of the first matching element
    Attr(&'static str, &'static str),
    /// Scalar at a path inside the page's `Restaurant` JSON-LD object
    JsonLd(&'static [&'static str]),
    /// Non-empty scalars at several JSON-LD paths, joined with `", "`
    JsonLdJoin(&'static [&'static [&'static str]]),
    /// First capture group of a regex over the visible page text
    BodyRegex(&'static str),
}

/// Post-processing applied to whichever strategy hit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transform {
    None,
    /// Keep the first decimal number ("4.5 stars" -> "4.5")
    FirstNumber,
    /// Keep the digits only ("1,204 ratings" -> "1204")
    Digits,
    /// Drop a label prefix such as `"Pickup:"`, case-insensitively
    StripPrefix(&'static str),
    /// Drop a `tel:` scheme
    TelLink,
}

/// Scalar slots filled from [`RESTAURANT_RULES`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    Name,
    Address,
    Phone,
    Rating,
    ReviewCount,
    PriceRange,
    PickupHours,
    DeliveryHours,
    Street,
    City,
    State,
    Zip,
    DeliveryFee,
    DeliveryTime,
}

#[derive(Debug)]
pub struct FieldRule {
    pub slot: Slot,
    pub strategies: &'static [Strategy],
    pub transform: Transform,
}

use Strategy::*;

pub const RESTAURANT_RULES: &[FieldRule] = &[
    FieldRule {
        slot: Slot::Name,
        strategies: &[
            Text("h1[data-testid='restaurant-name']"),
            Text("[data-testid='restaurant-name']"),
            JsonLd(&["name"]),
            Text("h1"),
        ],
        transform: Transform::None,
    },
    FieldRule {
        slot: Slot::Address,
        strategies: &[
            Text("[data-testid='restaurant-address']"),
            Text("[data-testid='restaurant-header-address']"),
            JsonLdJoin(&[
                &["address", "streetAddress"],
                &["address", "addressLocality"],
                &["address", "addressRegion"],
                &["address", "postalCode"],
            ]),
        ],
        transform: Transform::None,
    },
    FieldRule {
        slot: Slot::Phone,
        strategies: &[
            Text("button[data-testid='restaurant-phone']"),
            Text("[data-testid='restaurant-phone']"),
            Attr("a[href^='tel:']", "href"),
            JsonLd(&["telephone"]),
        ],
        transform: Transform::TelLink,
    },
    FieldRule {
        slot: Slot::Rating,
        strategies: &[
            Text("[data-testid='restaurant-rating']"),
            Text("[data-testid*='star-rating']"),
            Attr("[data-testid*='star-rating']", "aria-label"),
            JsonLd(&["aggregateRating", "ratingValue"]),
        ],
        transform: Transform::FirstNumber,
    },
    FieldRule {
        slot: Slot::ReviewCount,
        strategies: &[
            Text("[data-testid='restaurant-rating-count']"),
            JsonLd(&["aggregateRating", "reviewCount"]),
            JsonLd(&["aggregateRating", "ratingCount"]),
            BodyRegex(r"(?i)(\d[\d,]*)\s+(?:ratings|reviews)\b"),
        ],
        transform: Transform::Digits,
    },
    FieldRule {
        slot: Slot::PriceRange,
        strategies: &[
            Text("[data-testid='restaurant-price-rating']"),
            JsonLd(&["priceRange"]),
        ],
        transform: Transform::None,
    },
    FieldRule {
        slot: Slot::PickupHours,
        strategies: &[AllText("[data-testid^='pickupHours']")],
        transform: Transform::StripPrefix("Pickup:"),
    },
    FieldRule {
        slot: Slot::DeliveryHours,
        strategies: &[AllText("[data-testid^='deliveryHours']")],
        transform: Transform::StripPrefix("Delivery:"),
    },
    FieldRule {
        slot: Slot::Street,
        strategies: &[JsonLd(&["address", "streetAddress"])],
        transform: Transform::None,
    },
    FieldRule {
        slot: Slot::City,
        strategies: &[JsonLd(&["address", "addressLocality"])],
        transform: Transform::None,
    },
    FieldRule {
        slot: Slot::State,
        strategies: &[JsonLd(&["address", "addressRegion"])],
        transform: Transform::None,
    },
    FieldRule {
        slot: Slot::Zip,
        strategies: &[JsonLd(&["address", "postalCode"])],
        transform: Transform::None,
    },
    FieldRule {
        slot: Slot::DeliveryFee,
        strategies: &[
            Text("[data-testid='delivery-fee']"),
            BodyRegex(r"(?i)(\$\d+(?:\.\d{2})?)\s+delivery\s+fee"),
        ],
        transform: Transform::None,
    },
    FieldRule {
        slot: Slot::DeliveryTime,
        strategies: &[
            Text("[data-testid='delivery-time']"),
            BodyRegex(r"(?i)(\d+\s*[-–]\s*\d+\s*min)"),
        ],
        transform: Transform::None,
    },
];

/// Cuisine tags: every match of the first selector that yields any
pub const CUISINE_SELECTORS: &[&str] = &[
    "[data-testid='cuisines'] a",
    "[data-testid='restaurant-cuisines'] span",
    "a[href*='/cuisine/']",
];

/// Combined selector so headers and items come back in document order
pub const MENU_WALK_SELECTOR: &str =
    "h3[data-testid='menuSection-title'], article[data-testid='restaurant-menu-item']";

pub const MENU_SECTION_TITLE: &str = "h3[data-testid='menuSection-title']";

/// Placeholder rows rendered while data loads
pub const STENCIL_CLASS_MARKER: &str = "stencil";

pub const ITEM_NAME: &[&str] = &["h6[data-testid]", "h6", "[data-testid='menu-item-name']"];

pub const ITEM_PRICE: &[&str] = &["[data-testid='menu-item-price']", "span[itemprop='price']"];

pub const ITEM_DESCRIPTION: &[&str] = &[
    "[data-testid='menu-item-description']",
    "span[class*='description']",
    "span[class*='Description']",
];

pub const ITEM_IMAGE: &str = "img[alt]";

/// Price text anywhere in an item card
pub const ITEM_PRICE_PATTERN: &str = r"\$\d[\d,]*(?:\.\d{1,2})?\+?";

/// Container id carrying the marketplace item id
pub const ITEM_ID_PATTERN: &str = r"^Item\d+$";

pub const REVIEW_ITEM: &str = "[data-testid='restaurant-review-item']";
pub const REVIEW_AUTHOR: &[&str] = &[
    "[data-testid='review-reviewer-name']",
    "[data-testid='reviewer-name']",
];
pub const REVIEW_TEXT: &[&str] = &["[data-testid='review-content']", "p"];
pub const REVIEW_DATE: &str = "span, time";
pub const REVIEW_DATE_PATTERN: &str =
    r"(?i)^(?:\d{1,2}/\d{1,2}/\d{2,4}|(?:jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)[a-z]*\.? \d{1,2},? \d{4})$";

/// Opening-hours text that sometimes lands in review containers
pub const HOURS_TEXT_PATTERN: &str = r"(?i)\b(?:pickup|delivery):|\d{1,2}:\d{2}\s*[ap]m";

pub const MAX_REVIEWS: usize = 10;

#[cfg(test)]
mod tests {
    use super::*;
    use regex::Regex;
    use scraper::Selector;

    fn css_of(strategy: &Strategy) -> Option<&'static str> {
        match strategy {
            Text(css) | AllText(css) | Attr(css, _) => Some(*css),
            _ => None,
        }
    }

    #[test]
    fn every_css_selector_parses() {
        let from_rules = RESTAURANT_RULES
            .iter()
            .flat_map(|r| r.strategies.iter())
            .filter_map(css_of);
        let fixed = CUISINE_SELECTORS
            .iter()
            .chain(ITEM_NAME)
            .chain(ITEM_PRICE)
            .chain(ITEM_DESCRIPTION)
            .chain(REVIEW_AUTHOR)
            .chain(REVIEW_TEXT)
            .copied()
            .chain([
                MENU_WALK_SELECTOR,
                MENU_SECTION_TITLE,
                ITEM_IMAGE,
                REVIEW_ITEM,
                REVIEW_DATE,
            ]);

        for css in from_rules.chain(fixed) {
            assert!(Selector::parse(css).is_ok(), "bad selector: {css}");
        }
    }

    #[test]
    fn every_pattern_compiles() {
        let from_rules = RESTAURANT_RULES
            .iter()
            .flat_map(|r| r.strategies.iter())
            .filter_map(|s| match s {
                BodyRegex(p) => Some(*p),
                _ => None,
            });
        for pattern in from_rules.chain([
            ITEM_PRICE_PATTERN,
            ITEM_ID_PATTERN,
            REVIEW_DATE_PATTERN,
            HOURS_TEXT_PATTERN,
        ]) {
            assert!(Regex::new(pattern).is_ok(), "bad pattern: {pattern}");
        }
    }

    #[test]
    fn each_slot_has_one_rule() {
        for rule in RESTAURANT_RULES {
            let count = RESTAURANT_RULES.iter().filter(|r| r.slot == rule.slot).count();
            assert_eq!(count, 1, "{:?}", rule.slot);
        }
    }
}

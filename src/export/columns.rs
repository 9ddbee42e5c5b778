//! Destination column tables
//!
//! Column names and order are a contract with the downstream import tool.
//! Changing either means bumping the schema version.

use crate::extractor::normalize_text;
use crate::model::{MenuCategory, MenuItem, RestaurantRecord};

/// Version of the menu item table below
pub const ITEMS_SCHEMA_VERSION: &str = "menu-items/v1";

/// Version of the restaurant table below
pub const RESTAURANTS_SCHEMA_VERSION: &str = "restaurants/v1";

pub const POST_STATUS: &str = "publish";
pub const RESTAURANT_POST_TYPE: &str = "restaurant";
pub const ITEM_POST_TYPE: &str = "menu_item";

const MAX_GALLERY_IMAGES: usize = 10;
const MAX_EXPORTED_REVIEWS: usize = 5;
const DESCRIPTION_CATEGORIES: usize = 3;

/// Where a destination cell gets its value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Const(&'static str),
    /// Destination column with no counterpart; always empty
    Unmapped,
    RestaurantName,
    RestaurantAddress,
    RestaurantPhone,
    RestaurantRating,
    RestaurantReviewCount,
    RestaurantPriceRange,
    RestaurantCuisines,
    RestaurantHours,
    RestaurantReviews,
    RestaurantUrl,
    RestaurantDescription,
    City,
    State,
    Zip,
    DeliveryFee,
    DeliveryTime,
    CategoryCount,
    ItemCount,
    MenuJson,
    Gallery,
    CategoryName,
    ItemName,
    ItemPrice,
    ItemDescription,
    ItemImage,
    ItemId,
}

#[derive(Debug, Clone, Copy)]
pub struct Column {
    pub name: &'static str,
    pub source: Source,
}

const fn col(name: &'static str, source: Source) -> Column {
    Column { name, source }
}

/// `menu_items_import.csv`, one row per item
pub const ITEM_COLUMNS: &[Column] = &[
    col("post_title", Source::ItemName),
    col("post_content", Source::ItemDescription),
    col("post_status", Source::Const(POST_STATUS)),
    col("post_type", Source::Const(ITEM_POST_TYPE)),
    col("parent_restaurant", Source::RestaurantName),
    col("item_price", Source::ItemPrice),
    col("item_category", Source::CategoryName),
    col("item_description", Source::ItemDescription),
    col("item_image", Source::ItemImage),
    col("item_id", Source::ItemId),
    col("restaurant_name", Source::RestaurantName),
    col("restaurant_address", Source::RestaurantAddress),
    col("restaurant_phone", Source::RestaurantPhone),
    col("restaurant_rating", Source::RestaurantRating),
    col("restaurant_price_range", Source::RestaurantPriceRange),
    col("restaurant_cuisines", Source::RestaurantCuisines),
    col("restaurant_url", Source::RestaurantUrl),
    col("city", Source::City),
    col("state", Source::State),
    col("zip_code", Source::Zip),
    col("featured_image", Source::Unmapped),
];

/// `restaurants_import.csv`, one row per restaurant
pub const RESTAURANT_COLUMNS: &[Column] = &[
    col("post_title", Source::RestaurantName),
    col("post_content", Source::RestaurantDescription),
    col("post_status", Source::Const(POST_STATUS)),
    col("post_type", Source::Const(RESTAURANT_POST_TYPE)),
    col("restaurant_address", Source::RestaurantAddress),
    col("restaurant_phone", Source::RestaurantPhone),
    col("restaurant_rating", Source::RestaurantRating),
    col("restaurant_review_count", Source::RestaurantReviewCount),
    col("restaurant_hours", Source::RestaurantHours),
    col("restaurant_cuisines", Source::RestaurantCuisines),
    col("restaurant_price_range", Source::RestaurantPriceRange),
    col("restaurant_reviews", Source::RestaurantReviews),
    col("restaurant_url", Source::RestaurantUrl),
    col("menu_categories", Source::CategoryCount),
    col("menu_items_total", Source::ItemCount),
    col("menu_data", Source::MenuJson),
    col("featured_image", Source::Unmapped),
    col("gallery_images", Source::Gallery),
    col("latitude", Source::Unmapped),
    col("longitude", Source::Unmapped),
    col("city", Source::City),
    col("state", Source::State),
    col("zip_code", Source::Zip),
    col("delivery_fee", Source::DeliveryFee),
    col("delivery_time", Source::DeliveryTime),
];

pub fn header(columns: &[Column]) -> Vec<&'static str> {
    columns.iter().map(|c| c.name).collect()
}

/// Restaurant plus, for item rows, the item and its category
pub struct RowContext<'a> {
    pub record: &'a RestaurantRecord,
    pub entry: Option<(&'a MenuCategory, &'a MenuItem)>,
}

impl Source {
    /// Cell text; absent values are empty strings
    pub fn cell(self, ctx: &RowContext<'_>) -> String {
        let record = ctx.record;
        let category = ctx.entry.map(|(c, _)| c);
        let item = ctx.entry.map(|(_, i)| i);

        match self {
            Source::Const(value) => value.to_string(),
            Source::Unmapped => String::new(),
            Source::RestaurantName => clean(&record.name),
            Source::RestaurantAddress => clean_opt(&record.address),
            Source::RestaurantPhone => clean_opt(&record.phone),
            Source::RestaurantRating => clean_opt(&record.rating),
            Source::RestaurantReviewCount => clean_opt(&record.review_count),
            Source::RestaurantPriceRange => clean_opt(&record.price_range),
            Source::RestaurantCuisines => clean(&record.cuisines.join(", ")),
            Source::RestaurantHours => clean(&format_hours(record)),
            Source::RestaurantReviews => clean(&format_reviews(record)),
            Source::RestaurantUrl => record.url.clone(),
            Source::RestaurantDescription => clean(&describe(record)),
            Source::City => clean_opt(&record.structured_address.city),
            Source::State => clean_opt(&record.structured_address.state),
            Source::Zip => clean_opt(&record.structured_address.zip),
            Source::DeliveryFee => clean_opt(&record.delivery.fee),
            Source::DeliveryTime => clean_opt(&record.delivery.time),
            Source::CategoryCount => record.menu.len().to_string(),
            Source::ItemCount => record.item_count().to_string(),
            // Serializing plain structs cannot fail
            Source::MenuJson => serde_json::to_string(&record.menu).unwrap_or_default(),
            Source::Gallery => gallery(record),
            Source::CategoryName => category.map(|c| clean(&c.name)).unwrap_or_default(),
            Source::ItemName => item.map(|i| clean(&i.name)).unwrap_or_default(),
            Source::ItemPrice => item
                .and_then(|i| i.price)
                .map(|p| p.to_string())
                .unwrap_or_default(),
            Source::ItemDescription => item
                .and_then(|i| i.description.as_deref())
                .map(clean)
                .unwrap_or_default(),
            Source::ItemImage => item
                .and_then(|i| i.image_url.clone())
                .unwrap_or_default(),
            Source::ItemId => item.and_then(|i| i.source_id.clone()).unwrap_or_default(),
        }
    }
}

impl Source {
    /// Record field a column is filled from, as shown in the mapping guide
    pub fn describe(self) -> String {
        let text = match self {
            Source::Const(value) => return format!("constant `{value}`"),
            Source::Unmapped => "not scraped, left empty",
            Source::RestaurantName => "restaurant name",
            Source::RestaurantAddress => "street address",
            Source::RestaurantPhone => "phone number",
            Source::RestaurantRating => "star rating",
            Source::RestaurantReviewCount => "number of ratings",
            Source::RestaurantPriceRange => "price range (`$` to `$$$$`)",
            Source::RestaurantCuisines => "cuisines, comma separated",
            Source::RestaurantHours => "pickup and delivery hours",
            Source::RestaurantReviews => "first reviews, `|` separated",
            Source::RestaurantUrl => "restaurant page URL",
            Source::RestaurantDescription => "generated summary of cuisines and menu highlights",
            Source::City => "city",
            Source::State => "state",
            Source::Zip => "ZIP code",
            Source::DeliveryFee => "delivery fee",
            Source::DeliveryTime => "delivery time estimate",
            Source::CategoryCount => "number of menu categories",
            Source::ItemCount => "number of menu items",
            Source::MenuJson => "full menu as JSON",
            Source::Gallery => "item image URLs, `|` separated",
            Source::CategoryName => "menu category",
            Source::ItemName => "item name",
            Source::ItemPrice => "item price as a plain decimal",
            Source::ItemDescription => "item description",
            Source::ItemImage => "item image URL",
            Source::ItemId => "source-site item id",
        };
        text.to_string()
    }
}

/// Markdown guide listing every destination column and its source
pub fn mapping_guide() -> String {
    let mut guide = String::from("# Field mapping\n");
    let tables = [
        (super::ITEMS_CSV, ITEMS_SCHEMA_VERSION, ITEM_COLUMNS),
        (super::RESTAURANTS_CSV, RESTAURANTS_SCHEMA_VERSION, RESTAURANT_COLUMNS),
    ];
    for (file, version, columns) in tables {
        guide.push_str(&format!("\n## `{file}` ({version})\n\n"));
        guide.push_str("| Column | Source |\n| --- | --- |\n");
        for column in columns {
            guide.push_str(&format!("| `{}` | {} |\n", column.name, column.source.describe()));
        }
    }
    guide.push_str(&format!(
        "\nPost type for restaurants is `{RESTAURANT_POST_TYPE}`, for items `{ITEM_POST_TYPE}`. \
         Items link to their restaurant through `parent_restaurant`.\n"
    ));
    guide
}

/// Single-line text: mojibake repaired, newlines and runs of spaces collapsed
fn clean(text: &str) -> String {
    normalize_text(text)
}

fn clean_opt(text: &Option<String>) -> String {
    text.as_deref().map(clean).unwrap_or_default()
}

fn format_hours(record: &RestaurantRecord) -> String {
    let mut parts = Vec::new();
    if let Some(pickup) = &record.hours.pickup {
        parts.push(format!("Pickup: {pickup}"));
    }
    if let Some(delivery) = &record.hours.delivery {
        parts.push(format!("Delivery: {delivery}"));
    }
    parts.join(" | ")
}

fn format_reviews(record: &RestaurantRecord) -> String {
    record
        .reviews
        .iter()
        .take(MAX_EXPORTED_REVIEWS)
        .map(|r| match &r.date {
            Some(date) => format!("{} ({date}): {}", r.reviewer, r.text),
            None => format!("{}: {}", r.reviewer, r.text),
        })
        .collect::<Vec<_>>()
        .join(" | ")
}

/// "Serving Thai, Lao. Popular items include Noodles: Khao Soi."
fn describe(record: &RestaurantRecord) -> String {
    let mut parts = Vec::new();
    if !record.cuisines.is_empty() {
        parts.push(format!("Serving {}", record.cuisines.join(", ")));
    }

    let highlights: Vec<String> = record
        .menu
        .iter()
        .take(DESCRIPTION_CATEGORIES)
        .filter_map(|c| c.items.first().map(|i| format!("{}: {}", c.name, i.name)))
        .collect();
    if !highlights.is_empty() {
        parts.push(format!("Popular items include {}", highlights.join(", ")));
    }

    if parts.is_empty() {
        String::new()
    } else {
        format!("{}.", parts.join(". "))
    }
}

fn gallery(record: &RestaurantRecord) -> String {
    record
        .menu
        .iter()
        .flat_map(|c| c.items.iter())
        .filter_map(|i| i.image_url.as_deref())
        .take(MAX_GALLERY_IMAGES)
        .collect::<Vec<_>>()
        .join("|")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Hours, Review};
    use chrono::{TimeZone, Utc};

    fn record() -> RestaurantRecord {
        RestaurantRecord {
            name: "Thai Spot".into(),
            url: "https://www.grubhub.com/restaurant/thai-spot/9".into(),
            address: None,
            phone: None,
            rating: None,
            review_count: None,
            price_range: None,
            cuisines: vec!["Thai".into(), "Lao".into()],
            hours: Hours {
                pickup: Some("11am - 9pm".into()),
                delivery: Some("12pm - 8pm".into()),
            },
            structured_address: Default::default(),
            delivery: Default::default(),
            reviews: vec![Review {
                reviewer: "Kim".into(),
                date: None,
                text: "Spicy!".into(),
            }],
            menu: vec![MenuCategory {
                name: "Noodles".into(),
                items: vec![MenuItem {
                    name: "Khao Soi".into(),
                    price: None,
                    price_text: None,
                    description: None,
                    image_url: Some("https://img.example/ks.jpg".into()),
                    source_id: None,
                }],
            }],
            scraped_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        }
    }

    #[test]
    fn column_names_are_unique() {
        for table in [ITEM_COLUMNS, RESTAURANT_COLUMNS] {
            let mut names = header(table);
            names.sort_unstable();
            names.dedup();
            assert_eq!(names.len(), table.len());
        }
    }

    #[test]
    fn derived_restaurant_cells() {
        let record = record();
        let ctx = RowContext {
            record: &record,
            entry: None,
        };
        assert_eq!(
            Source::RestaurantDescription.cell(&ctx),
            "Serving Thai, Lao. Popular items include Noodles: Khao Soi."
        );
        assert_eq!(
            Source::RestaurantHours.cell(&ctx),
            "Pickup: 11am - 9pm | Delivery: 12pm - 8pm"
        );
        assert_eq!(Source::RestaurantReviews.cell(&ctx), "Kim: Spicy!");
        assert_eq!(Source::Gallery.cell(&ctx), "https://img.example/ks.jpg");
        assert_eq!(Source::ItemCount.cell(&ctx), "1");
        assert_eq!(Source::ItemName.cell(&ctx), "");
    }

    #[test]
    fn mapping_guide_lists_every_column() {
        let guide = mapping_guide();
        assert!(guide.contains(ITEMS_SCHEMA_VERSION));
        assert!(guide.contains(RESTAURANTS_SCHEMA_VERSION));
        let rows = guide.lines().filter(|l| l.starts_with("| `")).count();
        assert_eq!(rows, ITEM_COLUMNS.len() + RESTAURANT_COLUMNS.len());
        assert!(guide.contains("| `post_status` | constant `publish` |"));
        assert!(guide.contains("| `latitude` | not scraped, left empty |"));
    }

    #[test]
    fn cells_are_single_line() {
        let mut record = record();
        record.menu[0].items[0].description = Some("Curry broth,\r\negg noodles".into());
        let (category, item) = (&record.menu[0], &record.menu[0].items[0]);
        let ctx = RowContext {
            record: &record,
            entry: Some((category, item)),
        };
        assert_eq!(Source::ItemDescription.cell(&ctx), "Curry broth, egg noodles");
    }
}

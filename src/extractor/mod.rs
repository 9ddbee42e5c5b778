//! Field Extractor: rendered page to `RestaurantRecord`
//!
//! Works on the HTML captured by the fetcher, so it needs no browser and is
//! exercised offline against fixtures. Every scalar field is resolved through
//! the ordered strategies in [`rules`]; only the restaurant name is required.

mod business;
mod fields;
mod jsonld;
mod menu;
mod price;
pub mod rules;
mod text;

use chrono::Utc;
use scraper::Html;
use tracing::{debug, warn};

use crate::error::ExtractError;
use crate::model::{DeliveryInfo, Field, Hours, RenderedPage, RestaurantRecord, StructuredAddress};
use fields::PageContext;
use rules::Slot;

pub use menu::DEFAULT_CATEGORY;
pub use price::parse_price;
pub use text::normalize_text;

/// A record plus the optional fields no strategy could fill
#[derive(Debug, Clone)]
pub struct Extraction {
    pub record: RestaurantRecord,
    pub missing: Vec<Field>,
}

/// Extract one restaurant from a rendered page
///
/// Fails only when no name is found; any other absent field is recorded in
/// [`Extraction::missing`].
pub fn extract(page: &RenderedPage) -> Result<Extraction, ExtractError> {
    let document = Html::parse_document(&page.html);
    let restaurant = jsonld::find_restaurant(&document);
    let ctx = PageContext::new(&document, restaurant.as_ref());

    let url = if page.final_url.is_empty() {
        page.requested_url.clone()
    } else {
        page.final_url.clone()
    };

    let Some(name) = ctx.resolve(Slot::Name) else {
        warn!(url = %url, "No restaurant name found");
        return Err(ExtractError::MissingName { url });
    };

    let record = RestaurantRecord {
        name,
        url,
        address: ctx.resolve(Slot::Address),
        phone: ctx.resolve(Slot::Phone),
        rating: ctx.resolve(Slot::Rating),
        review_count: ctx.resolve(Slot::ReviewCount),
        price_range: ctx.resolve(Slot::PriceRange),
        cuisines: business::cuisines(&ctx),
        hours: Hours {
            pickup: ctx.resolve(Slot::PickupHours),
            delivery: ctx.resolve(Slot::DeliveryHours),
        },
        structured_address: StructuredAddress {
            street: ctx.resolve(Slot::Street),
            city: ctx.resolve(Slot::City),
            state: ctx.resolve(Slot::State),
            zip: ctx.resolve(Slot::Zip),
        },
        delivery: DeliveryInfo {
            fee: ctx.resolve(Slot::DeliveryFee),
            time: ctx.resolve(Slot::DeliveryTime),
        },
        reviews: business::reviews(&ctx),
        menu: menu::extract_menu(page, &document, restaurant.as_ref()),
        scraped_at: Utc::now(),
    };

    let missing = missing_fields(&record);
    debug!(
        name = %record.name,
        categories = record.menu.len(),
        items = record.item_count(),
        missing = missing.len(),
        "Extracted restaurant"
    );

    Ok(Extraction { record, missing })
}

fn missing_fields(record: &RestaurantRecord) -> Vec<Field> {
    [
        (Field::Address, record.address.is_none()),
        (Field::Phone, record.phone.is_none()),
        (Field::Rating, record.rating.is_none()),
        (Field::ReviewCount, record.review_count.is_none()),
        (Field::PriceRange, record.price_range.is_none()),
        (Field::Cuisines, record.cuisines.is_empty()),
        (Field::Hours, record.hours.is_empty()),
        (Field::Menu, record.menu.is_empty()),
    ]
    .into_iter()
    .filter_map(|(field, absent)| absent.then_some(field))
    .collect()
}

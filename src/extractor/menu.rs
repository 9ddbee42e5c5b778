//! Menu categories and items
//!
//! Sources in precedence order:
//!
//! 1. The menu container snapshots captured while scrolling. The list is
//!    virtualized, so each snapshot holds a window of rows; they are walked
//!    in capture order and merged.
//! 2. Menu sections found in the page's JavaScript state.
//! 3. The `hasMenu` tree of the page's JSON-LD.
//! 4. The final document.

use regex::Regex;
use scraper::{ElementRef, Html};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use super::fields::{element_text, first_text_of, selector};
use super::jsonld;
use super::price::parse_price;
use super::rules::{
    ITEM_DESCRIPTION, ITEM_ID_PATTERN, ITEM_IMAGE, ITEM_NAME, ITEM_PRICE, ITEM_PRICE_PATTERN,
    MENU_SECTION_TITLE, MENU_WALK_SELECTOR, STENCIL_CLASS_MARKER,
};
use super::text::non_empty;
use crate::model::{MenuCategory, MenuItem, RenderedPage};

/// Category for items rendered before any section header
pub const DEFAULT_CATEGORY: &str = "Menu";

static ITEM_ID: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(ITEM_ID_PATTERN).ok());
static PRICE_TEXT: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(ITEM_PRICE_PATTERN).ok());

pub fn extract_menu(
    page: &RenderedPage,
    document: &Html,
    restaurant: Option<&Value>,
) -> Vec<MenuCategory> {
    let mut builder = MenuBuilder::default();
    for snapshot in &page.menu_snapshots {
        let fragment = Html::parse_fragment(snapshot);
        builder.walk(fragment.root_element());
    }
    let from_snapshots = builder.finish();
    if !from_snapshots.is_empty() {
        return from_snapshots;
    }

    if let Some(from_state) = page.page_state.as_ref().map(menu_from_page_state)
        && !from_state.is_empty()
    {
        return from_state;
    }

    if let Some(from_metadata) = restaurant.map(menu_from_jsonld)
        && !from_metadata.is_empty()
    {
        return from_metadata;
    }

    let mut builder = MenuBuilder::default();
    builder.walk(document.root_element());
    builder.finish()
}

/// Accumulates categories in first-seen order, deduplicating items
#[derive(Default)]
struct MenuBuilder {
    categories: Vec<MenuCategory>,
    index: HashMap<String, usize>,
    seen: Vec<HashSet<String>>,
    /// Every key recorded in any category
    known: HashSet<String>,
    /// Category open at the end of the previous walk
    current: Option<String>,
}

impl MenuBuilder {
    fn walk(&mut self, root: ElementRef<'_>) {
        let (Some(walk), Some(title)) = (selector(MENU_WALK_SELECTOR), selector(MENU_SECTION_TITLE))
        else {
            return;
        };

        let mut header_seen = false;
        // A row above the first header that belongs to the open category
        let mut anchored = false;
        for el in root.select(&walk) {
            if title.matches(&el) {
                if let Some(name) = non_empty(&element_text(el)) {
                    self.category(&name);
                    self.current = Some(name);
                    header_seen = true;
                }
                continue;
            }

            if is_stencil(el) {
                continue;
            }
            let Some(item) = parse_item(el) else {
                continue;
            };

            let category = self
                .current
                .clone()
                .unwrap_or_else(|| DEFAULT_CATEGORY.to_string());

            // Rows above the first header of a window continue the category
            // left open by the previous window. Until one of them is placed
            // there, rows recorded elsewhere are overlap from earlier sections.
            if !header_seen {
                let key = item_key(&item);
                if self.contains(&category, &key) {
                    anchored = true;
                    continue;
                }
                if !anchored && self.known.contains(&key) {
                    continue;
                }
                anchored = true;
            }

            self.push(&category, item);
        }
    }

    fn contains(&self, category: &str, key: &str) -> bool {
        self.index
            .get(category)
            .is_some_and(|&idx| self.seen[idx].contains(key))
    }

    fn category(&mut self, name: &str) -> usize {
        if let Some(&idx) = self.index.get(name) {
            return idx;
        }
        let idx = self.categories.len();
        self.categories.push(MenuCategory {
            name: name.to_string(),
            items: Vec::new(),
        });
        self.seen.push(HashSet::new());
        self.index.insert(name.to_string(), idx);
        idx
    }

    fn push(&mut self, category: &str, item: MenuItem) {
        let idx = self.category(category);
        let key = item_key(&item);
        if self.seen[idx].insert(key.clone()) {
            self.known.insert(key);
            self.categories[idx].items.push(item);
        }
    }

    /// Categories without items are dropped
    fn finish(self) -> Vec<MenuCategory> {
        self.categories
            .into_iter()
            .filter(|c| !c.items.is_empty())
            .collect()
    }
}

fn item_key(item: &MenuItem) -> String {
    item.source_id.clone().unwrap_or_else(|| item.name.clone())
}

fn is_stencil(el: ElementRef<'_>) -> bool {
    el.value()
        .attr("class")
        .is_some_and(|class| class.contains(STENCIL_CLASS_MARKER))
}

fn parse_item(el: ElementRef<'_>) -> Option<MenuItem> {
    let name = first_text_of(el, ITEM_NAME)?;

    let price_text = first_text_of(el, ITEM_PRICE)
        .or_else(|| {
            let re = PRICE_TEXT.as_ref()?;
            el.text().find_map(|t| re.find(t).map(|m| m.as_str().to_string()))
        })
        .map(|text| match PRICE_TEXT.as_ref().and_then(|re| re.find(&text)) {
            Some(m) if !text.starts_with('$') => m.as_str().to_string(),
            _ => text,
        });
    let price = price_text.as_deref().and_then(parse_price);

    Some(MenuItem {
        name,
        price,
        price_text,
        description: first_text_of(el, ITEM_DESCRIPTION),
        image_url: item_image(el),
        source_id: item_source_id(el),
    })
}

fn item_image(el: ElementRef<'_>) -> Option<String> {
    let selector = selector(ITEM_IMAGE)?;
    el.select(&selector)
        .filter_map(|img| img.value().attr("src"))
        .find(|src| !src.starts_with("data:image") && !src.contains("lazy") && !src.is_empty())
        .map(str::to_string)
}

/// Id of the nearest ancestor container named like `Item123`
fn item_source_id(el: ElementRef<'_>) -> Option<String> {
    let re = ITEM_ID.as_ref()?;
    el.ancestors()
        .filter_map(ElementRef::wrap)
        .filter_map(|ancestor| ancestor.value().id())
        .find(|id| re.is_match(id))
        .map(str::to_string)
}

/// `{sections: [{name, items: [{name, price, description, id}]}]}`, or the
/// section list itself
fn menu_from_page_state(state: &Value) -> Vec<MenuCategory> {
    let sections = state.get("sections").unwrap_or(state);
    let mut builder = MenuBuilder::default();
    for section in as_list(Some(sections)) {
        let Some(name) = section.get("name").and_then(jsonld::scalar).and_then(|n| non_empty(&n))
        else {
            continue;
        };
        for item in as_list(section.get("items")) {
            let field = |key: &str| item.get(key).and_then(jsonld::scalar).and_then(|v| non_empty(&v));
            let Some(item_name) = field("name") else {
                continue;
            };
            let price_text = field("price");
            builder.push(
                &name,
                MenuItem {
                    name: item_name,
                    price: price_text.as_deref().and_then(parse_price),
                    price_text,
                    description: field("description"),
                    image_url: None,
                    source_id: field("id"),
                },
            );
        }
    }
    builder.finish()
}

fn menu_from_jsonld(restaurant: &Value) -> Vec<MenuCategory> {
    let Some(menu) = restaurant.get("hasMenu").or_else(|| restaurant.get("menu")) else {
        return Vec::new();
    };

    let mut builder = MenuBuilder::default();
    for section in sections(menu) {
        let name = section
            .get("name")
            .and_then(jsonld::scalar)
            .and_then(|n| non_empty(&n))
            .unwrap_or_else(|| DEFAULT_CATEGORY.to_string());
        for item in as_list(section.get("hasMenuItem")) {
            if let Some(item) = item_from_jsonld(item) {
                builder.push(&name, item);
            }
        }
    }
    builder.finish()
}

/// `hasMenuSection` entries; a menu may also be a list of menus or a URL
fn sections(menu: &Value) -> Vec<&Value> {
    match menu {
        Value::Array(menus) => menus.iter().flat_map(sections).collect(),
        Value::Object(_) => {
            let nested = as_list(menu.get("hasMenuSection"));
            if nested.is_empty() && menu.get("hasMenuItem").is_some() {
                vec![menu]
            } else {
                nested.into_iter().flat_map(sections_or_self).collect()
            }
        }
        _ => Vec::new(),
    }
}

fn sections_or_self(section: &Value) -> Vec<&Value> {
    let nested = as_list(section.get("hasMenuSection"));
    if nested.is_empty() {
        vec![section]
    } else {
        std::iter::once(section)
            .chain(nested.into_iter().flat_map(sections_or_self))
            .collect()
    }
}

fn as_list(value: Option<&Value>) -> Vec<&Value> {
    match value {
        Some(Value::Array(items)) => items.iter().collect(),
        Some(v @ Value::Object(_)) => vec![v],
        _ => Vec::new(),
    }
}

fn item_from_jsonld(item: &Value) -> Option<MenuItem> {
    let name = item.get("name").and_then(jsonld::scalar).and_then(|n| non_empty(&n))?;
    let price_text = jsonld::lookup(item, &["offers", "price"]).and_then(|p| non_empty(&p));
    let image_url = match item.get("image") {
        Some(Value::String(src)) => Some(src.clone()),
        Some(other) => jsonld::lookup(other, &["url"]),
        None => None,
    };

    Some(MenuItem {
        name,
        price: price_text.as_deref().and_then(parse_price),
        price_text,
        description: item
            .get("description")
            .and_then(jsonld::scalar)
            .and_then(|d| non_empty(&d)),
        image_url,
        source_id: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use serde_json::json;
    use std::str::FromStr;

    fn item(id: u32, name: &str, price: &str) -> String {
        format!(
            r#"<div id="Item{id}"><article data-testid="restaurant-menu-item">
                 <h6 data-testid="menu-item-name">{name}</h6>
                 <span data-testid="menu-item-price">{price}</span>
               </article></div>"#
        )
    }

    fn header(name: &str) -> String {
        format!(r#"<h3 data-testid="menuSection-title">{name}</h3>"#)
    }

    fn page(snapshots: Vec<String>) -> RenderedPage {
        RenderedPage {
            menu_snapshots: snapshots,
            ..RenderedPage::default()
        }
    }

    fn names(menu: &[MenuCategory]) -> Vec<(String, Vec<String>)> {
        menu.iter()
            .map(|c| (c.name.clone(), c.items.iter().map(|i| i.name.clone()).collect()))
            .collect()
    }

    #[test]
    fn groups_items_under_preceding_header() {
        let snapshot = [
            header("Starters"),
            item(1, "Samosa", "$4.99"),
            item(2, "Pakora", "$5.50"),
            header("Mains"),
            item(3, "Korma", "$13.00"),
        ]
        .concat();
        let menu = extract_menu(&page(vec![snapshot]), &Html::new_document(), None);

        assert_eq!(
            names(&menu),
            vec![
                ("Starters".into(), vec!["Samosa".into(), "Pakora".into()]),
                ("Mains".into(), vec!["Korma".into()]),
            ]
        );
        assert_eq!(menu[0].items[0].price, Some(Decimal::from_str("4.99").unwrap()));
        assert_eq!(menu[0].items[0].source_id.as_deref(), Some("Item1"));
    }

    #[test]
    fn merges_overlapping_snapshots() {
        let first = [header("Starters"), item(1, "Samosa", "$4.99"), item(2, "Pakora", "$5.50")].concat();
        // Header scrolled out; rows 2 and 3 remain mounted
        let second = [item(2, "Pakora", "$5.50"), item(3, "Bhaji", "$4.00"), header("Mains")].concat();
        let third = [item(3, "Bhaji", "$4.00"), header("Mains"), item(4, "Korma", "$13.00")].concat();

        let menu = extract_menu(&page(vec![first, second, third]), &Html::new_document(), None);
        assert_eq!(
            names(&menu),
            vec![
                ("Starters".into(), vec!["Samosa".into(), "Pakora".into(), "Bhaji".into()]),
                ("Mains".into(), vec!["Korma".into()]),
            ]
        );
    }

    #[test]
    fn popular_item_kept_in_its_own_section_across_windows() {
        let first = [
            header("Popular Items"),
            item(1, "Samosa", "$4.99"),
            header("Entrees"),
            item(2, "Korma", "$13.00"),
        ]
        .concat();
        // Entrees header scrolled out; Samosa repeats inside the section
        let second = [item(2, "Korma", "$13.00"), item(1, "Samosa", "$4.99"), item(3, "Dal", "$9.00")].concat();

        let menu = extract_menu(&page(vec![first, second]), &Html::new_document(), None);
        assert_eq!(
            names(&menu),
            vec![
                ("Popular Items".into(), vec!["Samosa".into()]),
                ("Entrees".into(), vec!["Korma".into(), "Samosa".into(), "Dal".into()]),
            ]
        );
    }

    #[test]
    fn overlap_from_earlier_section_is_not_moved() {
        let first = [
            header("Starters"),
            item(1, "Samosa", "$4.99"),
            header("Mains"),
            item(2, "Korma", "$13.00"),
        ]
        .concat();
        // Window bounced up: Samosa re-mounts above the Mains header
        let second = [item(1, "Samosa", "$4.99"), header("Mains"), item(2, "Korma", "$13.00")].concat();

        let menu = extract_menu(&page(vec![first, second]), &Html::new_document(), None);
        assert_eq!(
            names(&menu),
            vec![
                ("Starters".into(), vec!["Samosa".into()]),
                ("Mains".into(), vec!["Korma".into()]),
            ]
        );
    }

    #[test]
    fn items_before_any_header_use_default_category() {
        let snapshot = [item(1, "Water", "$1.00"), header("Empty")].concat();
        let menu = extract_menu(&page(vec![snapshot]), &Html::new_document(), None);
        assert_eq!(names(&menu), vec![(DEFAULT_CATEGORY.into(), vec!["Water".into()])]);
    }

    #[test]
    fn skips_stencils_and_nameless_items() {
        let snapshot = format!(
            r#"{}<article data-testid="restaurant-menu-item" class="menuItem stencil-loading"><h6>Loading</h6></article>
               <article data-testid="restaurant-menu-item"><span>$3.00</span></article>{}"#,
            header("Drinks"),
            item(9, "Lassi", "$3.50"),
        );
        let menu = extract_menu(&page(vec![snapshot]), &Html::new_document(), None);
        assert_eq!(names(&menu), vec![("Drinks".into(), vec!["Lassi".into()])]);
    }

    #[test]
    fn price_found_in_card_text_and_market_price_kept() {
        let snapshot = format!(
            r#"{}<article data-testid="restaurant-menu-item"><h6>Lobster</h6><span>Market Price</span></article>
               <article data-testid="restaurant-menu-item"><h6>Crab Cake</h6><div>from $12.50+</div>
                 <img alt="Crab Cake" src="data:image/gif;base64,AAA"><img alt="Crab Cake" src="https://img.example/crab.jpg"></article>"#,
            header("Seafood"),
        );
        let menu = extract_menu(&page(vec![snapshot]), &Html::new_document(), None);
        let items = &menu[0].items;
        assert_eq!(items[0].price, None);
        assert_eq!(items[1].price_text.as_deref(), Some("$12.50+"));
        assert_eq!(items[1].price, Some(Decimal::from_str("12.50").unwrap()));
        assert_eq!(items[1].image_url.as_deref(), Some("https://img.example/crab.jpg"));
    }

    #[test]
    fn falls_back_to_jsonld_menu() {
        let restaurant = json!({
            "@type": "Restaurant",
            "hasMenu": {
                "hasMenuSection": [
                    {"name": "Pizza", "hasMenuItem": [
                        {"name": "Margherita", "description": "Tomato, basil", "offers": {"price": "14.00"}},
                        {"name": "Marinara", "offers": [{"price": 11}]}
                    ]},
                    {"name": "Empty", "hasMenuItem": []}
                ]
            }
        });
        let menu = extract_menu(&page(Vec::new()), &Html::new_document(), Some(&restaurant));
        assert_eq!(
            names(&menu),
            vec![("Pizza".into(), vec!["Margherita".into(), "Marinara".into()])]
        );
        assert_eq!(menu[0].items[0].description.as_deref(), Some("Tomato, basil"));
        assert_eq!(menu[0].items[1].price, Some(Decimal::from(11)));
    }

    #[test]
    fn page_state_preferred_over_jsonld() {
        let state = json!({"sections": [
            {"name": "Curries", "items": [
                {"name": "Korma", "price": "$13.00", "description": null, "id": "881"},
                {"name": "Vindaloo", "price": "14", "description": "Very hot", "id": null}
            ]},
            {"name": "Empty", "items": []}
        ]});
        let restaurant = json!({"hasMenu": {"hasMenuSection": [
            {"name": "Pizza", "hasMenuItem": [{"name": "Margherita"}]}
        ]}});
        let page = RenderedPage {
            page_state: Some(state),
            ..RenderedPage::default()
        };

        let menu = extract_menu(&page, &Html::new_document(), Some(&restaurant));
        assert_eq!(
            names(&menu),
            vec![("Curries".into(), vec!["Korma".into(), "Vindaloo".into()])]
        );
        assert_eq!(menu[0].items[0].price, Some(Decimal::from_str("13.00").unwrap()));
        assert_eq!(menu[0].items[0].source_id.as_deref(), Some("881"));
        assert_eq!(menu[0].items[1].description.as_deref(), Some("Very hot"));
    }

    #[test]
    fn empty_page_state_falls_through() {
        let page = RenderedPage {
            page_state: Some(json!({"sections": []})),
            ..RenderedPage::default()
        };
        let restaurant = json!({"hasMenu": {"hasMenuSection": [
            {"name": "Pizza", "hasMenuItem": [{"name": "Margherita"}]}
        ]}});
        let menu = extract_menu(&page, &Html::new_document(), Some(&restaurant));
        assert_eq!(names(&menu), vec![("Pizza".into(), vec!["Margherita".into()])]);
    }

    #[test]
    fn falls_back_to_final_document() {
        let html = Html::parse_document(&format!(
            "<html><body>{}{}</body></html>",
            header("Sides"),
            item(5, "Fries", "$3.25")
        ));
        let menu = extract_menu(&page(Vec::new()), &html, None);
        assert_eq!(names(&menu), vec![("Sides".into(), vec!["Fries".into()])]);
    }

    #[test]
    fn no_menu_anywhere_is_empty() {
        let menu = extract_menu(&page(Vec::new()), &Html::new_document(), Some(&json!({})));
        assert!(menu.is_empty());
    }
}

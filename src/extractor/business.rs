//! Restaurant-level fields that are lists rather than scalars

use regex::Regex;
use std::collections::HashSet;

use super::fields::{PageContext, all_text, element_text, first_text, first_text_of, selector};
use super::jsonld;
use super::rules::{
    CUISINE_SELECTORS, HOURS_TEXT_PATTERN, MAX_REVIEWS, REVIEW_AUTHOR, REVIEW_DATE,
    REVIEW_DATE_PATTERN, REVIEW_ITEM, REVIEW_TEXT,
};
use super::text::non_empty;
use crate::model::Review;

/// Cuisine tags, deduplicated in display order
///
/// Comma-joined tags ("Thai, Lao") are split.
pub fn cuisines(ctx: &PageContext<'_>) -> Vec<String> {
    let root = ctx.document.root_element();
    let raw = CUISINE_SELECTORS
        .iter()
        .map(|css| all_text(root, css))
        .find(|tags| !tags.is_empty())
        .or_else(|| ctx.jsonld.map(|ld| jsonld::strings(ld, "servesCuisine")))
        .unwrap_or_default();

    let mut seen = HashSet::new();
    raw.iter()
        .flat_map(|tag| tag.split(','))
        .filter_map(non_empty)
        .filter(|tag| seen.insert(tag.to_lowercase()))
        .collect()
}

/// Up to `MAX_REVIEWS` reviews with both an author and a body
///
/// Bodies that are really opening-hours text are discarded.
pub fn reviews(ctx: &PageContext<'_>) -> Vec<Review> {
    let (Some(container), Some(date_sel), Ok(date_re), Ok(hours_re)) = (
        selector(REVIEW_ITEM),
        selector(REVIEW_DATE),
        Regex::new(REVIEW_DATE_PATTERN),
        Regex::new(HOURS_TEXT_PATTERN),
    ) else {
        return Vec::new();
    };

    ctx.document
        .select(&container)
        .filter_map(|review| {
            let reviewer = first_text_of(review, REVIEW_AUTHOR)?;
            let text = REVIEW_TEXT
                .iter()
                .filter_map(|css| first_text(review, css))
                .find(|body| body != &reviewer && !hours_re.is_match(body))?;
            let date = review
                .select(&date_sel)
                .map(element_text)
                .find(|candidate| date_re.is_match(candidate));
            Some(Review {
                reviewer,
                date,
                text,
            })
        })
        .take(MAX_REVIEWS)
        .collect()
}

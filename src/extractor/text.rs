//! Text normalization for extracted fields

/// UTF-8 sequences that were decoded as Windows-1252 somewhere upstream,
/// longest first so multi-byte prefixes are not split
const MOJIBAKE: &[(&str, &str)] = &[
    ("â€¢", "•"),
    ("â€™", "’"),
    ("â€˜", "‘"),
    ("â€œ", "“"),
    ("â€\u{9d}", "”"),
    ("â€“", "–"),
    ("â€”", "—"),
    ("â€¦", "…"),
    ("â„¢", "™"),
    ("Â®", "®"),
    ("Â©", "©"),
    ("Â°", "°"),
    ("Â\u{a0}", " "),
    ("Ã¡", "á"),
    ("Ã©", "é"),
    ("Ã\u{ad}", "í"),
    ("Ã³", "ó"),
    ("Ãº", "ú"),
    ("Ã±", "ñ"),
    ("Ã¼", "ü"),
    ("Ã¶", "ö"),
    ("Ã¤", "ä"),
    ("Ã§", "ç"),
    ("Ã—", "×"),
    ("Ã·", "÷"),
];

/// Repair mojibake, collapse whitespace and drop a leading bullet
///
/// Genuine non-ASCII text (accents, currency symbols, emoji) passes through
/// untouched.
pub fn normalize_text(raw: &str) -> String {
    let repaired = repair_mojibake(raw);
    let collapsed = repaired.split_whitespace().collect::<Vec<_>>().join(" ");
    match collapsed.strip_prefix('•') {
        Some(rest) => rest.trim_start().to_string(),
        None => collapsed,
    }
}

/// `normalize_text`, with empty results mapped to `None`
pub fn non_empty(raw: &str) -> Option<String> {
    let text = normalize_text(raw);
    (!text.is_empty()).then_some(text)
}

fn repair_mojibake(raw: &str) -> String {
    if !raw.contains(['â', 'Â', 'Ã']) {
        return raw.to_string();
    }
    MOJIBAKE
        .iter()
        .fold(raw.to_string(), |text, (bad, good)| text.replace(bad, good))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_whitespace_and_newlines() {
        assert_eq!(normalize_text("  Chicken\r\n  Tikka \t Masala "), "Chicken Tikka Masala");
    }

    #[test]
    fn strips_leading_bullet() {
        assert_eq!(normalize_text("• 123 Main St"), "123 Main St");
    }

    #[test]
    fn repairs_mojibake() {
        assert_eq!(normalize_text("JalapeÃ±o Poppers"), "Jalapeño Poppers");
        assert_eq!(normalize_text("Chef’s choice"), "Chef’s choice");
        assert_eq!(normalize_text("Chefâ€™s choice"), "Chef’s choice");
        assert_eq!(normalize_text("CafÃ© au lait"), "Café au lait");
    }

    #[test]
    fn keeps_real_non_ascii() {
        let text = "Pâté de campagne — 12 € 🍕";
        assert_eq!(normalize_text(text), text);
    }

    #[test]
    fn empty_becomes_none() {
        assert_eq!(non_empty("  \n "), None);
        assert_eq!(non_empty(" x "), Some("x".to_string()));
    }
}

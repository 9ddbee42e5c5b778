//! Price text to decimal

use regex::{Captures, Regex};
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::LazyLock;

/// Integer part (optionally grouped in thousands) with an optional 1-2 digit
/// fraction after either separator, or a bare fraction like `.99`
const NUMBER: &str = r"(?:(?P<int>\d{1,3}(?:[,.]\d{3})+|\d+)(?:[.,](?P<frac>\d{1,2}))?|[.,](?P<bare>\d{1,2}))";

const CURRENCY: &str = r"[$€£]";

/// `$12.50`, `$ .99`
static AFTER_SYMBOL: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(&format!(r"{CURRENCY}\s*{NUMBER}(?:\D|$)")).ok());

/// `12,50 €`
static BEFORE_SYMBOL: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(&format!(r"(?:^|[^\d.,]){NUMBER}\s*{CURRENCY}")).ok());

static PLAIN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(&format!(r"(?:^|[^\d.,]){NUMBER}(?:\D|$)")).ok());

/// Parse displayed price text into a decimal
///
/// The amount next to a currency symbol wins over other numbers in the text
/// ("2 for $10" is 10). Thousands separators and suffixes like `+` are
/// ignored. Text without a number ("Market Price") yields `None`.
pub fn parse_price(text: &str) -> Option<Decimal> {
    [&AFTER_SYMBOL, &BEFORE_SYMBOL, &PLAIN]
        .into_iter()
        .filter_map(|re| re.as_ref())
        .find_map(|re| re.captures(text))
        .and_then(|caps| amount(&caps))
}

fn amount(caps: &Captures<'_>) -> Option<Decimal> {
    let literal = match (caps.name("int"), caps.name("frac"), caps.name("bare")) {
        (Some(int), frac, _) => {
            let integer: String = int.as_str().chars().filter(char::is_ascii_digit).collect();
            match frac {
                Some(frac) => format!("{integer}.{}", frac.as_str()),
                None => integer,
            }
        }
        (None, _, Some(bare)) => format!("0.{}", bare.as_str()),
        (None, _, None) => return None,
    };
    Decimal::from_str(&literal).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn parses_dollar_amounts() {
        assert_eq!(parse_price("$12.50"), Some(dec("12.50")));
        assert_eq!(parse_price("$8.99+"), Some(dec("8.99")));
        assert_eq!(parse_price("$7"), Some(dec("7")));
    }

    #[test]
    fn strips_thousands_separators() {
        assert_eq!(parse_price("$1,299.00"), Some(dec("1299.00")));
        assert_eq!(parse_price("1.299,00 €"), Some(dec("1299.00")));
        assert_eq!(parse_price("$1,000"), Some(dec("1000")));
    }

    #[test]
    fn handles_decimal_comma() {
        assert_eq!(parse_price("12,50 €"), Some(dec("12.50")));
    }

    #[test]
    fn bare_fraction_is_cents() {
        assert_eq!(parse_price("$.99"), Some(dec("0.99")));
        assert_eq!(parse_price(".50"), Some(dec("0.50")));
    }

    #[test]
    fn amount_next_to_currency_symbol_wins() {
        assert_eq!(parse_price("2 for $10"), Some(dec("10")));
        assert_eq!(parse_price("Serves 4 - 18,50 €"), Some(dec("18.50")));
        assert_eq!(parse_price("12 pcs"), Some(dec("12")));
    }

    #[test]
    fn non_numeric_is_none() {
        assert_eq!(parse_price("Market Price"), None);
        assert_eq!(parse_price(""), None);
    }

    #[test]
    fn keeps_scale() {
        assert_eq!(parse_price("$12.50").map(|d| d.to_string()), Some("12.50".to_string()));
    }
}

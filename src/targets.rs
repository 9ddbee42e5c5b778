//! Target list parsing
//!
//! One restaurant URL per line, optionally followed by `timeout=<secs>`.
//! Blank lines and `#` comments are ignored. Any malformed line rejects the
//! whole list before a browser is started.

use regex::Regex;
use std::sync::LazyLock;
use url::Url;

use crate::error::ValidationError;
use crate::model::ScrapeTarget;
use crate::utils::validate_target_timeout;

const RESTAURANT_HOSTS: &[&str] = &["grubhub.com", "www.grubhub.com"];

/// `/restaurant/<slug>/<numeric id>`, trailing slash allowed
static RESTAURANT_PATH: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^/restaurant/([A-Za-z0-9][A-Za-z0-9_-]*)/(\d+)/?$").ok());

/// Parse a newline-delimited target list
pub fn parse_targets(text: &str) -> Result<Vec<ScrapeTarget>, ValidationError> {
    let mut targets = Vec::new();

    for (idx, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line_no = idx + 1;

        let mut tokens = line.split_whitespace();
        let url = tokens.next().unwrap_or_default();
        let mut timeout_secs = None;

        for token in tokens {
            let Some(value) = token.strip_prefix("timeout=") else {
                return Err(malformed(line_no, line, format!("unexpected token '{token}'")));
            };
            let secs: u64 = value
                .parse()
                .map_err(|_| malformed(line_no, line, format!("timeout '{value}' is not a number")))?;
            validate_target_timeout(secs).map_err(|e| malformed(line_no, line, e.to_string()))?;
            timeout_secs = Some(secs);
        }

        let (url, slug) = check_url(url).map_err(|reason| malformed(line_no, line, reason))?;
        targets.push(ScrapeTarget {
            id: targets.len(),
            url,
            slug,
            timeout_secs,
        });
    }

    if targets.is_empty() {
        return Err(ValidationError::NoTargets);
    }
    Ok(targets)
}

/// Canonical URL and restaurant slug, or why the URL is rejected
fn check_url(input: &str) -> Result<(String, String), String> {
    let url = Url::parse(input).map_err(|e| format!("not a URL: {e}"))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(format!("unsupported scheme '{}'", url.scheme()));
    }
    let host = url.host_str().unwrap_or_default();
    if !RESTAURANT_HOSTS.contains(&host) {
        return Err(format!("host '{host}' is not a restaurant page host"));
    }

    let path = RESTAURANT_PATH
        .as_ref()
        .ok_or_else(|| "restaurant path pattern unavailable".to_string())?;
    let caps = path
        .captures(url.path())
        .ok_or_else(|| "expected /restaurant/<slug>/<id>".to_string())?;
    let slug = caps
        .get(1)
        .map(|m| m.as_str().to_lowercase())
        .unwrap_or_default();

    Ok((url.to_string(), slug))
}

fn malformed(line: usize, input: &str, reason: String) -> ValidationError {
    ValidationError::MalformedTarget {
        line,
        input: input.to_string(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_list_with_comments_and_overrides() {
        let text = "\
# Chicago
https://www.grubhub.com/restaurant/bombay-spice-grill/2099012

https://grubhub.com/restaurant/luigis_pizza/42/ timeout=60
";
        let targets = parse_targets(text).unwrap();
        assert_eq!(targets.len(), 2);

        assert_eq!(targets[0].id, 0);
        assert_eq!(targets[0].slug, "bombay-spice-grill");
        assert_eq!(targets[0].timeout_secs, None);

        assert_eq!(targets[1].id, 1);
        assert_eq!(targets[1].slug, "luigis_pizza");
        assert_eq!(targets[1].timeout_secs, Some(60));
    }

    #[test]
    fn query_string_is_kept() {
        let targets =
            parse_targets("https://www.grubhub.com/restaurant/x/1?classicAffiliateId=abc").unwrap();
        assert!(targets[0].url.ends_with("?classicAffiliateId=abc"));
    }

    #[test]
    fn rejects_other_hosts_and_paths() {
        for bad in [
            "https://www.example.com/restaurant/x/1",
            "https://www.grubhub.com/search?q=pizza",
            "https://www.grubhub.com/restaurant/x/abc",
            "ftp://www.grubhub.com/restaurant/x/1",
            "grubhub.com/restaurant/x/1",
        ] {
            assert!(
                matches!(parse_targets(bad), Err(ValidationError::MalformedTarget { .. })),
                "accepted {bad}"
            );
        }
    }

    #[test]
    fn reports_offending_line() {
        let text = "https://www.grubhub.com/restaurant/a/1\nnot a url\n";
        match parse_targets(text) {
            Err(ValidationError::MalformedTarget { line, input, .. }) => {
                assert_eq!(line, 2);
                assert_eq!(input, "not a url");
            }
            other => panic!("expected malformed target, got {other:?}"),
        }
    }

    #[test]
    fn rejects_bad_timeout_override() {
        for bad in ["timeout=5", "timeout=500", "timeout=soon", "retries=3"] {
            let text = format!("https://www.grubhub.com/restaurant/a/1 {bad}");
            assert!(matches!(
                parse_targets(&text),
                Err(ValidationError::MalformedTarget { .. })
            ));
        }
    }

    #[test]
    fn empty_list_is_rejected() {
        assert_eq!(parse_targets("\n# nothing\n"), Err(ValidationError::NoTargets));
    }
}

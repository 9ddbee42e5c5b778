//! Timeout validation for page loads

use std::time::Duration;

use crate::error::ValidationError;

/// Shortest accepted per-target timeout; the site's React bundle alone takes
/// several seconds to hydrate
pub const MIN_TARGET_TIMEOUT_SECS: u64 = 10;

/// Longest accepted per-target timeout (2 minutes)
pub const MAX_TARGET_TIMEOUT_SECS: u64 = 120;

/// Reserved at the end of a target's budget for content capture and
/// extraction after scrolling stops
pub const CAPTURE_MARGIN: Duration = Duration::from_secs(2);

/// Validate a per-target timeout in seconds
///
/// # Example
/// ```rust
/// let timeout = menu_scraper::validate_target_timeout(45).unwrap();
/// assert_eq!(timeout.as_secs(), 45);
/// ```
pub fn validate_target_timeout(secs: u64) -> Result<Duration, ValidationError> {
    if !(MIN_TARGET_TIMEOUT_SECS..=MAX_TARGET_TIMEOUT_SECS).contains(&secs) {
        return Err(ValidationError::Timeout {
            got: secs,
            min: MIN_TARGET_TIMEOUT_SECS,
            max: MAX_TARGET_TIMEOUT_SECS,
        });
    }

    Ok(Duration::from_secs(secs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_bounds() {
        assert!(validate_target_timeout(10).is_ok());
        assert!(validate_target_timeout(120).is_ok());
    }

    #[test]
    fn rejects_out_of_range() {
        assert_eq!(
            validate_target_timeout(9),
            Err(ValidationError::Timeout { got: 9, min: 10, max: 120 })
        );
        assert!(validate_target_timeout(121).is_err());
    }
}

pub mod constants;
mod timeout;
mod wait_for_element;

pub use timeout::{
    CAPTURE_MARGIN, MAX_TARGET_TIMEOUT_SECS, MIN_TARGET_TIMEOUT_SECS, validate_target_timeout,
};
pub use wait_for_element::wait_for_any;

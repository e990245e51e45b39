//! Field-level checks shared by the library and the auth endpoints.

use regex::Regex;
use std::sync::OnceLock;

use crate::ports::{PortError, PortResult};

pub const MAX_COLLECTION_NAME_CHARS: usize = 255;
pub const MIN_MAX_CARDS: i32 = 1;
pub const MAX_MAX_CARDS: i32 = 1000;
pub const DEFAULT_MAX_CARDS: i32 = 10;
pub const MAX_FRONT_CHARS: usize = 1000;
pub const MAX_BACK_CHARS: usize = 5000;
pub const MIN_PASSWORD_CHARS: usize = 8;

fn video_url_patterns() -> &'static [Regex; 2] {
    static PATTERNS: OnceLock<[Regex; 2]> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            Regex::new(r"^(https?://)?(www\.)?(youtube\.com|youtu\.be)/.+$")
                .expect("youtube pattern is valid"),
            Regex::new(r"^(https?://)?(www\.)?vimeo\.com/.+$").expect("vimeo pattern is valid"),
        ]
    })
}

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
            .expect("email pattern is valid")
    })
}

/// Checks that `value` has between 1 and `max` characters once trimmed.
fn bounded_text(field: &str, value: &str, max: usize) -> PortResult<()> {
    if value.trim().is_empty() {
        return Err(PortError::InvalidInput(format!("{} must not be empty", field)));
    }
    if value.chars().count() > max {
        return Err(PortError::InvalidInput(format!(
            "{} must be at most {} characters",
            field, max
        )));
    }
    Ok(())
}

pub fn collection_name(name: &str) -> PortResult<()> {
    bounded_text("name", name, MAX_COLLECTION_NAME_CHARS)
}

pub fn max_cards(value: i32) -> PortResult<()> {
    if !(MIN_MAX_CARDS..=MAX_MAX_CARDS).contains(&value) {
        return Err(PortError::InvalidInput(format!(
            "max_cards must be between {} and {}",
            MIN_MAX_CARDS, MAX_MAX_CARDS
        )));
    }
    Ok(())
}

pub fn front(value: &str) -> PortResult<()> {
    bounded_text("front", value, MAX_FRONT_CHARS)
}

pub fn back(value: &str) -> PortResult<()> {
    bounded_text("back", value, MAX_BACK_CHARS)
}

/// Only YouTube and Vimeo links are accepted.
pub fn video_url(url: &str) -> PortResult<()> {
    if video_url_patterns().iter().any(|re| re.is_match(url)) {
        Ok(())
    } else {
        Err(PortError::InvalidInput(
            "video_url must be a YouTube or Vimeo link".to_string(),
        ))
    }
}

pub fn email(value: &str) -> PortResult<()> {
    if email_pattern().is_match(value) {
        Ok(())
    } else {
        Err(PortError::InvalidInput("email is not a valid address".to_string()))
    }
}

pub fn password(value: &str) -> PortResult<()> {
    if value.chars().count() < MIN_PASSWORD_CHARS {
        return Err(PortError::InvalidInput(format!(
            "password must be at least {} characters",
            MIN_PASSWORD_CHARS
        )));
    }
    Ok(())
}

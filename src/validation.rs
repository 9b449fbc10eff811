use std::sync::LazyLock;

use regex::Regex;

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern compiles")
});

pub const MAX_AGE: i64 = 150;

/// `local@domain.tld`, no whitespace and exactly one `@`.
pub fn is_valid_email(value: &str) -> bool {
    EMAIL.is_match(value)
}

/// Advisory check used while editing a row. Only `age` and `email` are
/// constrained; an age must be a number strictly between 0 and 150.
pub fn validate_field(field: &str, value: &str) -> bool {
    match field {
        "age" => {
            let trimmed = value.trim();
            let number = if trimmed.is_empty() {
                Some(0.0)
            } else {
                trimmed.parse::<f64>().ok()
            };
            number.is_some_and(|n| n > 0.0 && n < MAX_AGE as f64)
        }
        "email" => is_valid_email(value),
        _ => true,
    }
}

/// Reads the integer at the start of `value` after leading whitespace, so
/// `"42 years"` is 42 and `"3.7"` is 3.
pub fn parse_leading_int(value: &str) -> Option<i64> {
    let trimmed = value.trim_start();
    let digits_start = usize::from(trimmed.starts_with(['+', '-']));
    let digits_len = trimmed[digits_start..]
        .bytes()
        .take_while(u8::is_ascii_digit)
        .count();
    if digits_len == 0 {
        return None;
    }
    trimmed[..digits_start + digits_len].parse().ok()
}

/// Ages accepted on import, inclusive bounds.
pub fn is_valid_import_age(age: i64) -> bool {
    (0..=MAX_AGE).contains(&age)
}

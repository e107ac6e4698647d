//! Filament color normalization
//!
//! Slicers write colors as `#RRGGBB`, `#RRGGBBAA`, `#RGB`, bare hex, quoted
//! strings, or one-element arrays. Everything funnels into `#RRGGBB`
//! uppercase; anything unrecognized becomes the empty string ("unknown").

use serde_json::Value;

/// Normalize a single color string to `#RRGGBB` (uppercase), or `""`
pub fn normalize_color(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches(|c| c == '"' || c == '\'').trim();
    if trimmed.is_empty() {
        return String::new();
    }

    let (has_hash, digits) = match trimmed.strip_prefix('#') {
        Some(rest) => (true, rest),
        None => (false, trimmed),
    };
    if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return String::new();
    }

    match (has_hash, digits.len()) {
        (_, 6) => format!("#{}", digits.to_ascii_uppercase()),
        (true, 8) => format!("#{}", digits[..6].to_ascii_uppercase()),
        (true, 3) => {
            let expanded: String = digits
                .chars()
                .flat_map(|c| [c, c])
                .collect::<String>()
                .to_ascii_uppercase();
            format!("#{expanded}")
        }
        _ => String::new(),
    }
}

/// Normalize a JSON value: strings directly, arrays by their first element
pub fn normalize_value(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => normalize_color(s),
        Some(Value::Array(items)) => normalize_value(items.first()),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn is_canonical(color: &str) -> bool {
        color.len() == 7
            && color.starts_with('#')
            && color[1..]
                .chars()
                .all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c))
    }

    #[test]
    fn test_six_digit_uppercased() {
        assert_eq!(normalize_color("#00ff00"), "#00FF00");
        assert_eq!(normalize_color("#ABCDEF"), "#ABCDEF");
    }

    #[test]
    fn test_alpha_pair_dropped() {
        assert_eq!(normalize_color("#ff8800cc"), "#FF8800");
    }

    #[test]
    fn test_short_form_expanded() {
        assert_eq!(normalize_color("#f0a"), "#FF00AA");
    }

    #[test]
    fn test_bare_hex_prefixed() {
        assert_eq!(normalize_color("1234ab"), "#1234AB");
        assert_eq!(normalize_color("  \"1234ab\" "), "#1234AB");
    }

    #[test]
    fn test_invalid_forms_are_empty() {
        for raw in ["", "   ", "red", "#12", "#12345", "#GGGGGG", "12345678", "abc", "#1234567890"] {
            assert_eq!(normalize_color(raw), "", "input {raw:?}");
        }
    }

    #[test]
    fn test_list_wrapped_uses_first_element() {
        assert_eq!(normalize_value(Some(&json!(["#ff0000", "#00ff00"]))), "#FF0000");
        assert_eq!(normalize_value(Some(&json!([]))), "");
        assert_eq!(normalize_value(Some(&json!(42))), "");
        assert_eq!(normalize_value(None), "");
    }

    #[test]
    fn test_normalization_is_idempotent() {
        for raw in ["#abc", "#aabbcc", "#aabbccdd", "aabbcc", "nope", "'#123'"] {
            let once = normalize_color(raw);
            assert_eq!(normalize_color(&once), once, "input {raw:?}");
            assert!(once.is_empty() || is_canonical(&once));
        }
    }
}

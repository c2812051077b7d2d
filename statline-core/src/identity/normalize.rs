//! Attribute normalization for identity resolution.
//!
//! All name-like fields funnel through here before key construction or
//! similarity scoring: lowercase, punctuation stripped, whitespace
//! collapsed, common suffixes and institution spellings canonicalized.

/// Lowercase, replace punctuation with spaces, collapse whitespace.
pub fn normalize_text(raw: &str) -> String {
    raw.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Normalize a person name: `normalize_text` plus generational suffix
/// removal ("Jon Smith Jr." and "Jon Smith" are the same identity).
pub fn normalize_person_name(raw: &str) -> String {
    let text = normalize_text(raw);
    let tokens: Vec<&str> = text
        .split(' ')
        .filter(|t| !matches!(*t, "jr" | "sr" | "ii" | "iii" | "iv" | "v"))
        .collect();
    tokens.join(" ")
}

/// Normalize a school name. "Lincoln High", "Lincoln HS", and
/// "Lincoln High School" all canonicalize to "lincoln high".
pub fn normalize_school(raw: &str) -> String {
    let text = normalize_text(raw);
    let mut tokens: Vec<String> = text
        .split(' ')
        .map(|t| match t {
            "hs" => "high".to_string(),
            "acad" => "academy".to_string(),
            "prep" => "preparatory".to_string(),
            other => other.to_string(),
        })
        .collect();
    // "high school" -> "high"
    if tokens.len() >= 2
        && tokens[tokens.len() - 1] == "school"
        && tokens[tokens.len() - 2] == "high"
    {
        tokens.pop();
    }
    tokens.join(" ")
}

/// Normalize a graduation year: "2025", "'25", "c/o 25" all become 2025.
/// Two-digit years pivot on 50 (below it is 20xx).
pub fn normalize_grad_year(raw: &str) -> Option<u16> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    match digits.len() {
        4 => digits.parse().ok(),
        2 => {
            let short: u16 = digits.parse().ok()?;
            Some(if short < 50 { 2000 + short } else { 1900 + short })
        }
        _ => None,
    }
}

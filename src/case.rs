//! Case conversion for JSON:API member names and resource types.
//! Attribute names are exposed kebab-case; resource types are pluralized kebab-case of the global id.

/// Convert a single identifier from camelCase to snake_case.
/// e.g. "userId" -> "user_id", "createdAt" -> "created_at"
pub fn to_snake_case(s: &str) -> String {
    to_kebab_case(s).replace('-', "_")
}

/// Convert camelCase, PascalCase or snake_case to kebab-case.
/// e.g. "createdAt" -> "created-at", "MediaOutlet" -> "media-outlet", "HTTPServer" -> "http-server"
pub fn to_kebab_case(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut out = String::with_capacity(s.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if c == '_' || c == '-' || c.is_whitespace() {
            if !out.is_empty() && !out.ends_with('-') {
                out.push('-');
            }
            continue;
        }
        if c.is_uppercase() {
            let prev = if i > 0 { Some(chars[i - 1]) } else { None };
            let next = chars.get(i + 1).copied();
            let boundary = match prev {
                Some(p) if p.is_lowercase() || p.is_ascii_digit() => true,
                Some(p) if p.is_uppercase() => next.map(char::is_lowercase).unwrap_or(false),
                _ => false,
            };
            if boundary && !out.is_empty() && !out.ends_with('-') {
                out.push('-');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    while out.ends_with('-') {
        out.pop();
    }
    out
}

/// Lower the first character: "MediaOutlet" -> "mediaOutlet".
pub fn lower_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Upper the first character: "mediaOutlet" -> "MediaOutlet".
pub fn upper_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// English plural of the last word of an identifier. Keeps the casing of the stem.
pub fn pluralize(word: &str) -> String {
    let lower = word.to_lowercase();
    if ["s", "x", "z", "ch", "sh"].iter().any(|end| lower.ends_with(end)) {
        return format!("{}es", word);
    }
    if lower.ends_with('y') {
        let before = lower.chars().rev().nth(1);
        if before.map(|c| !"aeiou".contains(c)).unwrap_or(false) {
            return format!("{}ies", &word[..word.len() - 1]);
        }
    }
    format!("{}s", word)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kebab_case_handles_common_shapes() {
        assert_eq!(to_kebab_case("createdAt"), "created-at");
        assert_eq!(to_kebab_case("MediaOutlet"), "media-outlet");
        assert_eq!(to_kebab_case("created_at"), "created-at");
        assert_eq!(to_kebab_case("HTTPServer"), "http-server");
        assert_eq!(to_kebab_case("title"), "title");
    }

    #[test]
    fn snake_and_first_letter_helpers() {
        assert_eq!(to_snake_case("createdAt"), "created_at");
        assert_eq!(lower_first("MediaOutlet"), "mediaOutlet");
        assert_eq!(upper_first("article"), "Article");
    }

    #[test]
    fn pluralize_follows_english_suffix_rules() {
        assert_eq!(pluralize("article"), "articles");
        assert_eq!(pluralize("mediaOutlet"), "mediaOutlets");
        assert_eq!(pluralize("box"), "boxes");
        assert_eq!(pluralize("category"), "categories");
        assert_eq!(pluralize("day"), "days");
    }
}

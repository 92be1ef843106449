//! Mechanical name conversions shared by models and the gateway registry.
//!
//! Field names are snake_case; their accessor names are `get` / `set`
//! followed by the PascalCase form. Capitalization is naive: the first
//! character after each underscore is upper-cased and nothing else changes,
//! so runs of capitals are kept as written.

/// `card_number` -> `CardNumber`.
pub fn pascal_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper_next = true;
    for c in name.chars() {
        if c == '_' {
            upper_next = true;
            continue;
        }
        if upper_next {
            out.extend(c.to_uppercase());
            upper_next = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// Accessor name paired with a field: `card_number` -> `getCardNumber`.
pub fn accessor_name(field: &str) -> String {
    format!("get{}", pascal_case(field))
}

/// Mutator name paired with a field: `card_number` -> `setCardNumber`.
pub fn mutator_name(field: &str) -> String {
    format!("set{}", pascal_case(field))
}

/// `Card_Number` -> `cardNumber`; strings already in camelCase are kept.
///
/// Underscored names are lower-cased segment by segment first. Only an
/// underscore followed by a lowercase ASCII letter is collapsed.
pub fn camel_case(name: &str) -> String {
    let lowered = if name.contains('_') {
        name.to_lowercase()
    } else {
        name.to_string()
    };

    let mut out = String::with_capacity(lowered.len());
    let mut chars = lowered.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '_' {
            if let Some(next) = chars.peek().copied().filter(char::is_ascii_lowercase) {
                out.push(next.to_ascii_uppercase());
                chars.next();
                continue;
            }
        }
        out.push(c);
    }
    out
}

/// Normalize a fully qualified gateway path.
///
/// Accepts `::` or `\` separators and an optional leading separator:
/// `\acme\tokenizer\TestGateway` -> `acme::tokenizer::TestGateway`.
pub fn qualified_name(name: &str) -> String {
    let normalized = name.replace('\\', "::");
    normalized.trim_start_matches("::").to_string()
}

/// Whether `name` names a path rather than a short alias.
pub fn is_qualified(name: &str) -> bool {
    name.contains("::") || name.contains('\\')
}

/// Short alias for a gateway type name.
///
/// The crate segment is dropped, a trailing `Gateway` suffix is removed and
/// the remaining segments are joined with `_`:
/// `acme::tokenizer::TestGateway` -> `tokenizer_Test`,
/// `acme::Tokenizer::Gateway` -> `Tokenizer`.
pub fn gateway_alias(type_name: &str) -> String {
    let qualified = qualified_name(type_name);
    let path = qualified.split('<').next().unwrap_or_default();
    let mut segments: Vec<&str> = path.split("::").filter(|s| !s.is_empty()).collect();
    if segments.len() > 1 {
        segments.remove(0);
    }
    if let Some(last) = segments.pop() {
        let stripped = last.strip_suffix("Gateway").unwrap_or(last);
        if !stripped.is_empty() {
            segments.push(stripped);
        }
    }
    segments.join("_")
}

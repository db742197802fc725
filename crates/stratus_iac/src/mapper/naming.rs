//! Identifier and file-name normalization.

/// Turn a resource's name (or its id when the name is blank) into a
/// Terraform identifier matching `^[a-z_][a-z0-9_]*$`.
pub fn sanitize_resource_name(name: &str, id: &str) -> String {
    let source = if name.trim().is_empty() { id } else { name };

    let mut sanitized = String::with_capacity(source.len());
    for c in source.chars() {
        let c = if c.is_ascii_alphanumeric() {
            c.to_ascii_lowercase()
        } else {
            '_'
        };
        if c == '_' && sanitized.ends_with('_') {
            continue;
        }
        sanitized.push(c);
    }

    let sanitized = sanitized.trim_matches('_');
    if sanitized.is_empty() {
        return "resource".to_string();
    }

    if sanitized.starts_with(|c: char| c.is_ascii_digit()) {
        format!("r_{}", sanitized)
    } else {
        sanitized.to_string()
    }
}

/// True when `value` already is a sanitized identifier.
pub fn is_valid_identifier(value: &str) -> bool {
    let mut chars = value.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

/// File stem for an organization group: lower-cased with `.`, path
/// separators and whitespace replaced by `_`.
pub fn normalize_file_stem(value: &str) -> String {
    value
        .trim()
        .chars()
        .map(|c| match c {
            '.' | '/' | '\\' => '_',
            c if c.is_whitespace() => '_',
            c => c.to_ascii_lowercase(),
        })
        .collect()
}

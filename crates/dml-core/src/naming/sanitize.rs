//! Linux-safe path component sanitization.

/// Replacement for components that sanitize to nothing or to a reserved name.
const EMPTY_COMPONENT: &str = "_";

/// Linux NAME_MAX.
const NAME_MAX: usize = 255;

fn truncate_name(name: &str) -> &str {
    if name.len() <= NAME_MAX {
        return name;
    }
    let mut take = NAME_MAX;
    while take > 0 && !name.is_char_boundary(take) {
        take -= 1;
    }
    &name[..take]
}

/// Final check on a rendered segment whose values are already sanitized: only
/// empty, `.` and `..` are replaced, and the length is capped. Literal template
/// text is otherwise kept as written.
pub fn guard_component(segment: &str) -> String {
    let limited = truncate_name(segment);
    match limited {
        "" | "." | ".." => EMPTY_COMPONENT.to_string(),
        _ => limited.to_string(),
    }
}

/// Sanitizes one substituted value so it can only ever be a single path component.
///
/// - Replaces NUL, `/`, `\`, and control characters with `_`
/// - Trims leading/trailing spaces and dots (so `..` cannot survive)
/// - Collapses consecutive underscores
/// - Limits length to 255 bytes (Linux NAME_MAX)
/// - Empty results become `_`
pub fn sanitize_component(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut prev_underscore = false;

    for c in name.chars() {
        let replacement = if c == '\0' || c == '/' || c == '\\' || c.is_control() {
            '_'
        } else {
            c
        };

        if replacement == '_' {
            if !prev_underscore {
                out.push('_');
            }
            prev_underscore = true;
        } else {
            out.push(replacement);
            prev_underscore = false;
        }
    }

    let trimmed = out.trim_matches(|c| c == ' ' || c == '\t' || c == '.');

    let limited = truncate_name(trimmed);

    if limited.is_empty() {
        EMPTY_COMPONENT.to_string()
    } else {
        limited.to_string()
    }
}

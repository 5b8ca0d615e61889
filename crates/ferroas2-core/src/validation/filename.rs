//! Safe file names for values that come off the wire (Message-IDs, partner-supplied
//! Content-Disposition filenames).

/// True for empty or whitespace-only strings.
pub fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

fn is_allowed(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_' | '@' | '#' | ' ')
}

/// Keep only the last path component of `name` and strip every character outside
/// `[A-Za-z0-9-._@# ]`.
pub fn make_file_name(name: &str) -> String {
    let last = name
        .rsplit(['/', '\\'])
        .find(|segment| !segment.is_empty() && *segment != "." && *segment != "..")
        .unwrap_or("");
    last.chars()
        .filter(|c| is_allowed(*c))
        .collect::<String>()
        .trim()
        .to_string()
}

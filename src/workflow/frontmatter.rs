//! YAML frontmatter handling for planning markdown files.

/// Fence line that opens and closes a frontmatter block.
const FENCE: &str = "---";

/// Split a document into its frontmatter YAML and the body that follows.
///
/// Returns `None` when the document doesn't open with a `---` fence or the
/// fence is never closed.
pub fn split(content: &str) -> Option<(&str, &str)> {
    let rest = content.strip_prefix('\u{feff}').unwrap_or(content);
    let first_line_end = rest.find('\n')?;
    if rest[..first_line_end].trim_end() != FENCE {
        return None;
    }

    let yaml_start = first_line_end + 1;
    let mut offset = yaml_start;
    for line in rest[yaml_start..].split_inclusive('\n') {
        if line.trim_end() == FENCE {
            let yaml = &rest[yaml_start..offset];
            let body = &rest[offset + line.len()..];
            return Some((yaml, body));
        }
        offset += line.len();
    }

    None
}

/// Read a top-level scalar field (`key: value`) from a document.
///
/// The frontmatter block is searched first; documents without one fall back
/// to the first matching line anywhere in the text.
pub fn scalar_field(content: &str, key: &str) -> Option<String> {
    let haystack = split(content).map_or(content, |(yaml, _)| yaml);
    find_field(haystack, key).or_else(|| find_field(content, key))
}

fn find_field(text: &str, key: &str) -> Option<String> {
    text.lines().find_map(|line| {
        let value = line.strip_prefix(key)?.strip_prefix(':')?.trim();
        let value = value.trim_matches(|c| c == '"' || c == '\'');
        (!value.is_empty()).then(|| value.to_string())
    })
}

//! Heading-delimited sections and `Label: value` fields in markdown documents.
//!
//! A section runs from its `## ` heading to the next `## ` heading or the end
//! of the document. Deeper headings (`### `) belong to the enclosing section.

const SECTION_PREFIX: &str = "## ";

fn is_section_heading(line: &str) -> bool {
    line.starts_with(SECTION_PREFIX)
}

fn matches_heading(line: &str, heading: &str) -> bool {
    line.strip_prefix(SECTION_PREFIX).is_some_and(|h| h.contains(heading))
}

/// Lines between a section's heading and the next section, `None` if absent.
pub fn extract_section<'a>(content: &'a str, heading: &str) -> Option<Vec<&'a str>> {
    let mut lines = content.lines();
    lines.by_ref().find(|line| matches_heading(line, heading))?;
    Some(lines.take_while(|line| !is_section_heading(line)).collect())
}

/// Replace a section's body, appending the section if it doesn't exist.
///
/// The rewritten section is the heading, a blank line, the body, and a single
/// blank line before the next heading, so applying the same body twice
/// yields the same document.
pub fn replace_section(content: &str, heading: &str, body: &str) -> String {
    let mut out: Vec<&str> = Vec::new();
    let mut in_section = false;
    let mut found = false;

    for line in content.split('\n') {
        if in_section {
            if is_section_heading(line) {
                in_section = false;
                out.push("");
                out.push(line);
            }
            continue;
        }

        if !found && matches_heading(line, heading) {
            found = true;
            in_section = true;
            out.push(line);
            out.push("");
            out.extend(body.lines());
            continue;
        }

        out.push(line);
    }

    if in_section && content.ends_with('\n') {
        out.push("");
    }

    if found {
        return out.join("\n");
    }

    if out.last().is_some_and(|l| l.is_empty()) {
        out.pop();
    }
    let mut appended = out.join("\n");
    if !appended.is_empty() {
        appended.push_str("\n\n");
    }
    appended.push_str(&format!("{SECTION_PREFIX}{heading}\n\n"));
    for line in body.lines() {
        appended.push_str(line);
        appended.push('\n');
    }
    appended
}

/// Value of the first `Field: value` line, matching the label case-insensitively.
pub fn extract_field(lines: &[&str], field: &str) -> Option<String> {
    lines.iter().find_map(|line| {
        let label = line.get(..field.len())?;
        if !label.eq_ignore_ascii_case(field) {
            return None;
        }
        let value = line[field.len()..].strip_prefix(':')?.trim();
        (!value.is_empty()).then(|| value.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = "# Project State\n\n## Current Position\n\nPhase: 1 of 3 (Setup)\nStatus: Ready\n\n## Accumulated Context\n\n### Decisions\n\n- Roadmap: three phases\n";

    #[test]
    fn test_extract_section() {
        let lines = extract_section(DOC, "Current Position").unwrap();
        assert_eq!(lines, vec!["", "Phase: 1 of 3 (Setup)", "Status: Ready", ""]);

        let context = extract_section(DOC, "Accumulated Context").unwrap();
        assert!(context.contains(&"### Decisions"));
        assert!(extract_section(DOC, "Missing").is_none());
    }

    #[test]
    fn test_replace_section_keeps_other_sections() {
        let updated = replace_section(DOC, "Current Position", "Phase: 2 of 3 (Core)\nStatus: Busy");
        assert_eq!(
            updated,
            "# Project State\n\n## Current Position\n\nPhase: 2 of 3 (Core)\nStatus: Busy\n\n## Accumulated Context\n\n### Decisions\n\n- Roadmap: three phases\n"
        );
    }

    #[test]
    fn test_replace_section_is_idempotent() {
        let once = replace_section(DOC, "Current Position", "Status: Busy");
        let twice = replace_section(&once, "Current Position", "Status: Busy");
        assert_eq!(once, twice);

        let last_once = replace_section(DOC, "Accumulated Context", "- nothing");
        let last_twice = replace_section(&last_once, "Accumulated Context", "- nothing");
        assert_eq!(last_once, last_twice);
        assert!(last_once.ends_with("## Accumulated Context\n\n- nothing\n"));
    }

    #[test]
    fn test_replace_section_appends_missing() {
        let once = replace_section(DOC, "Session Continuity", "Last session: today");
        assert!(once.ends_with("- Roadmap: three phases\n\n## Session Continuity\n\nLast session: today\n"));
        assert_eq!(replace_section(&once, "Session Continuity", "Last session: today"), once);
    }

    #[test]
    fn test_extract_field() {
        let lines = ["Phase: 3 of 8 (Core)", "last activity: yesterday", "Status:", "Stash ref: None"];
        assert_eq!(extract_field(&lines, "Phase").as_deref(), Some("3 of 8 (Core)"));
        assert_eq!(extract_field(&lines, "Last activity").as_deref(), Some("yesterday"));
        assert_eq!(extract_field(&lines, "Status"), None);
        assert_eq!(extract_field(&lines, "Plan"), None);
        assert_eq!(extract_field(&lines, "Stash ref").as_deref(), Some("None"));
    }
}

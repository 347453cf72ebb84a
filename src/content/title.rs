use once_cell::sync::Lazy;
use regex::Regex;

use crate::constants::DEFAULT_TITLE;

static H1: Lazy<Regex> = Lazy::new(|| Regex::new(r"^#\s+(.+)$").expect("Invalid h1 regex"));
static H2: Lazy<Regex> = Lazy::new(|| Regex::new(r"^##\s+(.+)$").expect("Invalid h2 regex"));
static H1_OR_H2: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#{1,2}\s+(.+)$").expect("Invalid heading regex"));

/// Take the title from the first H1 (else the first H2) and remove that line.
///
/// Falls back to [`DEFAULT_TITLE`] and leaves the body untouched when the
/// document has no such heading.
#[must_use]
pub fn extract_title(body: &str) -> (String, String) {
    let lines: Vec<&str> = body.split('\n').collect();

    let found = find_heading(&lines, &H1).or_else(|| find_heading(&lines, &H2));
    match found {
        Some((index, title)) => (title, remove_line(&lines, index)),
        None => (DEFAULT_TITLE.to_string(), body.to_string()),
    }
}

/// Remove the first H1/H2 whose text equals `title` (the title already
/// came from front matter, so the heading would repeat it).
#[must_use]
pub fn remove_heading_matching_title(body: &str, title: &str) -> String {
    let title = title.trim();
    if title.is_empty() {
        return body.to_string();
    }

    let lines: Vec<&str> = body.split('\n').collect();
    let matching = lines.iter().position(|line| {
        H1_OR_H2
            .captures(line.trim())
            .and_then(|caps| caps.get(1))
            .is_some_and(|m| m.as_str().trim() == title)
    });

    match matching {
        Some(index) => remove_line(&lines, index),
        None => body.to_string(),
    }
}

fn find_heading(lines: &[&str], pattern: &Regex) -> Option<(usize, String)> {
    lines.iter().enumerate().find_map(|(index, line)| {
        pattern
            .captures(line.trim())
            .and_then(|caps| caps.get(1))
            .map(|m| (index, m.as_str().trim().to_string()))
            .filter(|(_, title)| !title.is_empty())
    })
}

/// Drop one line, then any blank lines left at the top.
fn remove_line(lines: &[&str], index: usize) -> String {
    let remaining: Vec<&str> = lines
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != index)
        .map(|(_, line)| *line)
        .skip_while(|line| line.trim().is_empty())
        .collect();
    remaining.join("\n")
}

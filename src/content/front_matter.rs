use once_cell::sync::Lazy;
use regex::Regex;
use serde_yaml::Value;
use tracing::debug;

/// Leading `---` block, closed by a `---` line.
static FRONT_MATTER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)\A---[ \t]*\r?\n(.*?)\r?\n---[ \t]*(?:\r?\n|\z)")
        .expect("Invalid front matter regex")
});

/// Post metadata carried in a front-matter block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrontMatter {
    pub title: Option<String>,
    pub categories: Vec<String>,
    pub tags: Vec<String>,
    pub slug: Option<String>,
    pub excerpt: Option<String>,
    pub date: Option<String>,
    pub status: Option<String>,
}

impl FrontMatter {
    fn from_yaml(value: &Value) -> Self {
        Self {
            title: scalar_field(value, "title"),
            categories: list_field(value, "categories"),
            tags: list_field(value, "tags"),
            slug: scalar_field(value, "slug"),
            excerpt: scalar_field(value, "excerpt"),
            date: scalar_field(value, "date"),
            status: scalar_field(value, "status"),
        }
    }
}

/// Split a document into front matter and body.
///
/// Without a front-matter block the metadata is empty and the body is the
/// whole document (minus a byte order mark).
#[must_use]
pub fn parse_front_matter(raw: &str) -> (FrontMatter, String) {
    let content = raw.strip_prefix('\u{feff}').unwrap_or(raw);
    let trimmed = content.trim_start();

    let Some(caps) = FRONT_MATTER.captures(trimmed) else {
        return (FrontMatter::default(), content.to_string());
    };
    let yaml = caps.get(1).map_or("", |m| m.as_str());
    let body = trimmed[caps.get(0).map_or(0, |m| m.end())..].to_string();

    let value = match serde_yaml::from_str::<Value>(yaml) {
        Ok(value @ Value::Mapping(_)) => value,
        Ok(_) => Value::Mapping(serde_yaml::Mapping::new()),
        Err(e) => {
            debug!(error = %e, "Front matter is not valid YAML, using line parser");
            parse_simple_yaml(yaml)
        }
    };

    (FrontMatter::from_yaml(&value), body)
}

/// Lenient `key: value` / `- item` parser for front matter that YAML rejects.
fn parse_simple_yaml(yaml: &str) -> Value {
    let mut map = serde_yaml::Mapping::new();
    let mut current_key: Option<String> = None;

    for line in yaml.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(item) = line.strip_prefix("- ") {
            if let Some(key) = &current_key {
                let item = Value::String(item.trim().to_string());
                match map.get_mut(key.as_str()) {
                    Some(Value::Sequence(items)) => items.push(item),
                    _ => {
                        map.insert(Value::String(key.clone()), Value::Sequence(vec![item]));
                    }
                }
            }
            continue;
        }

        if let Some((key, value)) = line.split_once(':') {
            let key = key.trim();
            if key.is_empty() {
                continue;
            }
            current_key = Some(key.to_string());
            let value = unquote(value.trim());
            if !value.is_empty() {
                map.insert(Value::String(key.to_string()), Value::String(value.to_string()));
            }
        }
    }

    Value::Mapping(map)
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = value
            .strip_prefix(quote)
            .and_then(|v| v.strip_suffix(quote))
        {
            return inner;
        }
    }
    value
}

fn scalar_to_string(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Tagged(tagged) => return scalar_to_string(&tagged.value),
        Value::Null | Value::Sequence(_) | Value::Mapping(_) => return None,
    };
    Some(text).filter(|s| !s.is_empty())
}

fn scalar_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(scalar_to_string)
}

/// Accepts a YAML list, a comma separated string or a single scalar.
fn list_field(value: &Value, key: &str) -> Vec<String> {
    match value.get(key) {
        Some(Value::Sequence(items)) => items.iter().filter_map(scalar_to_string).collect(),
        Some(Value::String(s)) => s
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect(),
        Some(other) => scalar_to_string(other).into_iter().collect(),
        None => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_yaml_front_matter() {
        let raw = "---\ntitle: \"Hello: World\"\ntags: [rust, wasm]\ncategories: Tech, News\ndate: 2024-05-01 09:30\nslug: hello-world\n---\n# Body\n\ntext\n";
        let (meta, body) = parse_front_matter(raw);
        assert_eq!(meta.title.as_deref(), Some("Hello: World"));
        assert_eq!(meta.tags, vec!["rust", "wasm"]);
        assert_eq!(meta.categories, vec!["Tech", "News"]);
        assert_eq!(meta.date.as_deref(), Some("2024-05-01 09:30"));
        assert_eq!(meta.slug.as_deref(), Some("hello-world"));
        assert_eq!(body, "# Body\n\ntext\n");
    }

    #[test]
    fn test_block_list_and_bom() {
        let raw = "\u{feff}---\ntitle: Post\ntags:\n  - one\n  - two\n---\nbody";
        let (meta, body) = parse_front_matter(raw);
        assert_eq!(meta.title.as_deref(), Some("Post"));
        assert_eq!(meta.tags, vec!["one", "two"]);
        assert_eq!(body, "body");
    }

    #[test]
    fn test_invalid_yaml_falls_back_to_line_parser() {
        let raw = "---\ntitle: Broken: [yaml\ntags:\n- a\n- b\n---\nbody";
        let (meta, _) = parse_front_matter(raw);
        assert_eq!(meta.title.as_deref(), Some("Broken: [yaml"));
        assert_eq!(meta.tags, vec!["a", "b"]);
    }

    #[test]
    fn test_no_front_matter() {
        let raw = "# Title\n\nNo metadata here.";
        let (meta, body) = parse_front_matter(raw);
        assert_eq!(meta, FrontMatter::default());
        assert_eq!(body, raw);
    }

    #[test]
    fn test_numeric_scalars_become_strings() {
        let raw = "---\ntitle: 2024\ntags: 42\n---\n";
        let (meta, body) = parse_front_matter(raw);
        assert_eq!(meta.title.as_deref(), Some("2024"));
        assert_eq!(meta.tags, vec!["42"]);
        assert_eq!(body, "");
    }
}

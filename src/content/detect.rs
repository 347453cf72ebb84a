//! Locating blog drafts inside chat transcripts.
//!
//! Chat front-ends change their markup often, so the selectors live in
//! [`LocatorRule`]s that can be replaced per platform without touching the
//! detection heuristic itself.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

/// Shortest text considered a draft when it has no front matter.
const MIN_DRAFT_CHARS: usize = 200;

static FRONT_MATTER_START: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\A---\s*\n.*?\n---").expect("Invalid front matter regex"));
static H1_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^#\s+.+$").expect("Invalid h1 regex"));
static H2_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^##\s+.+$").expect("Invalid h2 regex"));
static MARKDOWN_SYNTAX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)(\*\*|__|\[.+\]\(.+\)|```|^\s*[-*+]\s|\|.+\|)")
        .expect("Invalid markdown syntax regex")
});
static RULE_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_]*$").expect("Invalid rule name regex"));

/// Whether a block of text looks like a markdown blog draft.
///
/// Front matter is enough on its own; otherwise the text needs an H1 or H2
/// heading, some other markdown syntax, and more than 200 characters.
#[must_use]
pub fn is_markdown_content(text: &str) -> bool {
    let trimmed = text.trim();
    if FRONT_MATTER_START.is_match(trimmed) {
        return true;
    }

    let has_heading = H1_LINE.is_match(trimmed) || H2_LINE.is_match(trimmed);
    has_heading
        && MARKDOWN_SYNTAX.is_match(trimmed)
        && trimmed.chars().count() > MIN_DRAFT_CHARS
}

/// Chat front-end a page belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    ChatGpt,
    Claude,
    Gemini,
}

impl Platform {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ChatGpt => "chatgpt",
            Self::Claude => "claude",
            Self::Gemini => "gemini",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "chatgpt" | "openai" => Some(Self::ChatGpt),
            "claude" => Some(Self::Claude),
            "gemini" => Some(Self::Gemini),
            _ => None,
        }
    }

    /// Identify the platform from a page host name.
    #[must_use]
    pub fn from_host(host: &str) -> Option<Self> {
        let host = host.trim_end_matches('.').to_ascii_lowercase();
        let matches = |domain: &str| host == domain || host.ends_with(&format!(".{domain}"));
        if matches("chatgpt.com") || matches("chat.openai.com") {
            Some(Self::ChatGpt)
        } else if matches("claude.ai") {
            Some(Self::Claude)
        } else if matches("gemini.google.com") {
            Some(Self::Gemini)
        } else {
            None
        }
    }
}

/// A piece of page text that looks like a draft.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextRegion {
    /// Name of the rule that found it.
    pub rule: String,
    pub text: String,
}

/// Capability to find draft text in a page snapshot.
pub trait ContentLocator: Send + Sync {
    fn platform(&self) -> Platform;

    /// Return draft-like regions in document order, without duplicates.
    fn locate(&self, page_html: &str) -> Vec<TextRegion>;
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleError {
    #[error("rule name '{0}' must start with a letter or underscore and use only [A-Za-z0-9_]")]
    InvalidName(String),
    #[error("invalid selector '{selector}': {message}")]
    InvalidSelector { selector: String, message: String },
}

/// One selector rule. The fallback is used only when the primary selector
/// matches nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatorRule {
    pub name: String,
    pub selector: String,
    pub fallback: Option<String>,
    pub priority: i32,
    pub enabled: bool,
}

impl LocatorRule {
    #[must_use]
    pub fn new(name: &str, selector: &str, fallback: Option<&str>, priority: i32) -> Self {
        Self {
            name: name.to_string(),
            selector: selector.to_string(),
            fallback: fallback.map(String::from),
            priority,
            enabled: true,
        }
    }

    /// Check the rule name and that both selectors parse.
    ///
    /// # Errors
    ///
    /// Returns the first problem found.
    pub fn validate(&self) -> Result<(), RuleError> {
        if !RULE_NAME.is_match(&self.name) {
            return Err(RuleError::InvalidName(self.name.clone()));
        }
        parse_selector(&self.selector)?;
        if let Some(fallback) = &self.fallback {
            parse_selector(fallback)?;
        }
        Ok(())
    }
}

fn parse_selector(selector: &str) -> Result<Selector, RuleError> {
    Selector::parse(selector).map_err(|e| RuleError::InvalidSelector {
        selector: selector.to_string(),
        message: e.to_string(),
    })
}

/// Default rules: rendered code blocks first, then the platform's own
/// assistant-message container.
#[must_use]
pub fn default_rules(platform: Platform) -> Vec<LocatorRule> {
    let response_rule = match platform {
        Platform::ChatGpt => LocatorRule::new(
            "assistantMessage",
            r#"div[data-message-author-role="assistant"]"#,
            Some("div.markdown"),
            100,
        ),
        Platform::Claude => LocatorRule::new(
            "responseText",
            "div.font-claude-message",
            Some("div.message-content"),
            100,
        ),
        Platform::Gemini => LocatorRule::new(
            "assistantResponse",
            r#"div[data-message-role="assistant"]"#,
            Some("div.response-text"),
            100,
        ),
    };
    vec![
        LocatorRule::new("codeBlocks", "pre code, pre", None, 200),
        response_rule,
    ]
}

/// [`ContentLocator`] driven by CSS selector rules.
#[derive(Debug, Clone)]
pub struct SelectorLocator {
    platform: Platform,
    rules: Vec<LocatorRule>,
}

impl SelectorLocator {
    #[must_use]
    pub fn for_platform(platform: Platform) -> Self {
        Self {
            platform,
            rules: default_rules(platform),
        }
    }

    /// Use custom rules.
    ///
    /// # Errors
    ///
    /// Returns an error if any rule is invalid.
    pub fn with_rules(platform: Platform, mut rules: Vec<LocatorRule>) -> Result<Self, RuleError> {
        for rule in &rules {
            rule.validate()?;
        }
        rules.sort_by(|a, b| b.priority.cmp(&a.priority));
        Ok(Self { platform, rules })
    }
}

impl ContentLocator for SelectorLocator {
    fn platform(&self) -> Platform {
        self.platform
    }

    fn locate(&self, page_html: &str) -> Vec<TextRegion> {
        let document = Html::parse_document(page_html);
        let mut seen = HashSet::new();
        let mut regions = Vec::new();

        let mut rules: Vec<&LocatorRule> = self.rules.iter().filter(|r| r.enabled).collect();
        rules.sort_by(|a, b| b.priority.cmp(&a.priority));

        for rule in rules {
            let selectors = std::iter::once(rule.selector.as_str()).chain(rule.fallback.as_deref());
            for raw in selectors {
                let selector = match parse_selector(raw) {
                    Ok(selector) => selector,
                    Err(e) => {
                        warn!(rule = %rule.name, error = %e, "Skipping invalid selector");
                        continue;
                    }
                };

                let mut matched = false;
                for element in document.select(&selector) {
                    matched = true;
                    let text: String = element.text().collect();
                    let text = text.trim().to_string();
                    if is_markdown_content(&text) && seen.insert(text.clone()) {
                        regions.push(TextRegion {
                            rule: rule.name.clone(),
                            text,
                        });
                    }
                }
                if matched {
                    break;
                }
                debug!(rule = %rule.name, selector = %raw, "Selector matched nothing");
            }
        }

        regions
    }
}

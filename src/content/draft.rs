use super::front_matter::{parse_front_matter, FrontMatter};
use super::markdown::markdown_to_html;
use super::title::{extract_title, remove_heading_matching_title};
use crate::messages::CreatePostRequest;
use crate::wordpress::PostStatus;

/// A chat response prepared for publishing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Draft {
    pub title: String,
    /// Markdown body with front matter and the title heading removed.
    pub markdown: String,
    pub html: String,
    pub status: PostStatus,
    pub meta: FrontMatter,
}

impl Draft {
    /// Build a draft from raw chat output.
    ///
    /// A front-matter `title` wins over headings (and the heading repeating
    /// it is dropped); an unparseable front-matter `status` falls back to
    /// `default_status`.
    #[must_use]
    pub fn from_chat_text(raw: &str, default_status: PostStatus) -> Self {
        let (meta, body) = parse_front_matter(raw);

        let (title, markdown) = match meta.title.as_deref() {
            Some(title) => (title.to_string(), remove_heading_matching_title(&body, title)),
            None => extract_title(&body),
        };
        let status = meta
            .status
            .as_deref()
            .and_then(PostStatus::parse)
            .unwrap_or(default_status);
        let html = markdown_to_html(&markdown);

        Self {
            title,
            markdown,
            html,
            status,
            meta,
        }
    }

    #[must_use]
    pub fn into_request(self) -> CreatePostRequest {
        CreatePostRequest {
            title: self.title,
            content: self.html,
            status: self.status,
            categories: self.meta.categories,
            tags: self.meta.tags,
            slug: self.meta.slug,
            date: self.meta.date,
            excerpt: self.meta.excerpt,
        }
    }
}

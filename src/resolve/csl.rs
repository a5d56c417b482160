//! CSL-JSON parsing
//!
//! Registries return CSL-JSON with a lot of variation: titles as strings or
//! arrays, numbers as strings or numbers, authors as name parts or a single
//! literal. Everything is validated here and turned into [`RawMetadata`];
//! nothing past this point looks at JSON.

use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;

use super::error::ResolveError;
use crate::domain::{Author, Doi, RawMetadata, WorkKind};

#[derive(Debug, Deserialize)]
struct CslItem {
    #[serde(rename = "type")]
    kind: Option<String>,
    title: Option<OneOrMany>,
    author: Option<Vec<CslName>>,
    editor: Option<Vec<CslName>>,
    issued: Option<CslDate>,
    #[serde(rename = "published-print")]
    published_print: Option<CslDate>,
    #[serde(rename = "published-online")]
    published_online: Option<CslDate>,
    created: Option<CslDate>,
    #[serde(rename = "container-title")]
    container_title: Option<OneOrMany>,
    #[serde(rename = "container-title-short")]
    container_title_short: Option<OneOrMany>,
    volume: Option<Scalar>,
    issue: Option<Scalar>,
    page: Option<Scalar>,
    publisher: Option<String>,
    #[serde(rename = "URL")]
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    fn first(self) -> Option<String> {
        match self {
            OneOrMany::One(s) => Some(s),
            OneOrMany::Many(v) => v.into_iter().next(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Scalar {
    Text(String),
    Number(serde_json::Number),
}

impl Scalar {
    fn into_text(self) -> String {
        match self {
            Scalar::Text(s) => s,
            Scalar::Number(n) => n.to_string(),
        }
    }

    fn as_year(&self) -> Option<i32> {
        match self {
            Scalar::Text(s) => s.trim().parse().ok(),
            Scalar::Number(n) => n.as_i64().and_then(|y| i32::try_from(y).ok()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CslName {
    given: Option<String>,
    family: Option<String>,
    literal: Option<String>,
}

impl CslName {
    fn into_author(self) -> Option<Author> {
        let family = self
            .family
            .or(self.literal)
            .map(|f| clean_text(&f))
            .filter(|f| !f.is_empty())?;
        let given = self.given.map(|g| clean_text(&g)).filter(|g| !g.is_empty());
        Some(Author { given, family })
    }
}

#[derive(Debug, Deserialize)]
struct CslDate {
    #[serde(rename = "date-parts")]
    date_parts: Option<Vec<Vec<Option<Scalar>>>>,
}

impl CslDate {
    fn year(&self) -> Option<i32> {
        self.date_parts
            .as_ref()?
            .first()?
            .first()?
            .as_ref()?
            .as_year()
    }
}

/// Parses a CSL-JSON body into metadata for `doi`
pub fn parse(doi: &Doi, body: &str) -> Result<RawMetadata, ResolveError> {
    let item: CslItem = serde_json::from_str(body)
        .map_err(|e| ResolveError::unexpected(doi, format!("invalid CSL-JSON: {}", e)))?;
    Ok(into_metadata(doi, item))
}

fn into_metadata(doi: &Doi, item: CslItem) -> RawMetadata {
    let kind = item
        .kind
        .as_deref()
        .map(WorkKind::from_type_name)
        .unwrap_or_default();

    let mut meta = RawMetadata::new(doi.clone(), kind);

    let names = match item.author {
        Some(authors) if !authors.is_empty() => authors,
        _ => item.editor.unwrap_or_default(),
    };
    meta.authors = names.into_iter().filter_map(CslName::into_author).collect();

    meta.title = non_empty(item.title.and_then(OneOrMany::first));
    meta.year = [
        &item.issued,
        &item.published_print,
        &item.published_online,
        &item.created,
    ]
    .into_iter()
    .flatten()
    .find_map(CslDate::year);

    meta.container = non_empty(item.container_title.and_then(OneOrMany::first));
    meta.container_short = non_empty(item.container_title_short.and_then(OneOrMany::first));
    meta.volume = non_empty(item.volume.map(Scalar::into_text));
    meta.issue = non_empty(item.issue.map(Scalar::into_text));
    meta.pages = non_empty(item.page.map(Scalar::into_text));
    meta.publisher = non_empty(item.publisher);
    meta.url = item.url.map(|u| u.trim().to_string()).filter(|u| !u.is_empty());
    meta
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| clean_text(&v)).filter(|v| !v.is_empty())
}

/// Opening, closing or self-closing HTML/JATS tags such as `<i>`,
/// `</jats:italic>` or `<br/>`; a bare `<` or `>` is left alone
static MARKUP_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"</?[A-Za-z][A-Za-z0-9:_.-]*(?:\s+[^<>]*?)?\s*/?>"#)
        .expect("markup pattern is valid")
});

/// Drops HTML/JATS tags, decodes the common entities and collapses whitespace
fn clean_text(text: &str) -> String {
    let stripped = MARKUP_TAG.replace_all(text, "");

    let decoded = stripped
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&");

    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}

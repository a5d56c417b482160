//! Citation formatting
//!
//! Turns [`RawMetadata`] into a [`CitationRecord`]: derives the citation key
//! against the current library and renders the text for the requested format.
//! Pure apart from reading the library for collision checks.

use thiserror::Error;

use super::doi::Doi;
use super::format::Format;
use super::key::CitationKey;
use super::library::Library;
use super::metadata::{Author, RawMetadata, WorkKind};
use super::record::CitationRecord;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FormatError {
    #[error("Insufficient metadata for {0}: neither authors nor a title are known")]
    InsufficientMetadata(Doi),
}

/// Renders citations and assigns keys
#[derive(Debug, Clone, Default)]
pub struct Formatter {
    /// Use full container titles in markdown instead of abbreviations
    pub full_container_titles: bool,
}

impl Formatter {
    pub fn new(full_container_titles: bool) -> Self {
        Self {
            full_container_titles,
        }
    }

    /// Builds a record for `meta` in `format`, keyed uniquely within `library`
    pub fn format(
        &self,
        meta: &RawMetadata,
        format: Format,
        library: &Library,
    ) -> Result<CitationRecord, FormatError> {
        let key = assign_key(meta, format, library);
        let text = self.render(meta, format, &key)?;
        Ok(CitationRecord::new(key, format, text, meta.clone()))
    }

    /// Renders `meta` as text without touching any library
    pub fn render(
        &self,
        meta: &RawMetadata,
        format: Format,
        key: &CitationKey,
    ) -> Result<String, FormatError> {
        if meta.is_anonymous_and_untitled() {
            return Err(FormatError::InsufficientMetadata(meta.doi.clone()));
        }

        Ok(match format {
            Format::Bib => render_bib(meta, key),
            Format::Md => self.render_markdown(meta, false),
            Format::MdLong => self.render_markdown(meta, true),
            Format::Doi => meta.doi.to_string(),
        })
    }

    fn render_markdown(&self, meta: &RawMetadata, long: bool) -> String {
        let mut parts: Vec<String> = Vec::new();

        let authors = acs_authors(&meta.authors);
        if !authors.is_empty() {
            parts.push(with_period(&authors));
        }

        if long {
            if let Some(title) = meta.title() {
                parts.push(with_period(title));
            }
        }

        if let Some(container) = meta.container(!self.full_container_titles) {
            parts.push(format!("*{}*", container));
        }

        if let Some(year) = meta.year {
            parts.push(format!("**{},**", year));
        }

        if let Some(volume) = non_empty(&meta.volume) {
            let mut v = format!("*{}*", volume);
            if let Some(issue) = non_empty(&meta.issue) {
                v.push_str(&format!(" ({})", issue));
            }
            v.push(',');
            parts.push(v);
        }

        if let Some(pages) = non_empty(&meta.pages) {
            parts.push(page_range(pages, "\u{2013}"));
        }

        let mut text = parts.join(" ");
        if let Some(stripped) = text.strip_suffix(",**") {
            text = format!("{}**", stripped);
        } else if text.ends_with(',') {
            text.pop();
        }
        if !text.ends_with('.') {
            text.push('.');
        }

        if long {
            text.push_str(&format!(" DOI: [{}]({}).", meta.doi, meta.doi.url()));
        }

        text
    }
}

/// Reuses the key of a stored record for the same work, otherwise takes the
/// first free candidate among base, base+a, base+b, ...
fn assign_key(meta: &RawMetadata, format: Format, library: &Library) -> CitationKey {
    if let Some(existing) = library.find_work(&meta.doi, format) {
        return existing.key.clone();
    }

    let base = CitationKey::base_for(meta);
    let mut candidates = base.candidates();
    loop {
        match candidates.next() {
            Some(candidate) if !library.contains_key(&candidate) => return candidate,
            Some(_) => continue,
            None => return base.clone(),
        }
    }
}

fn non_empty(field: &Option<String>) -> Option<&str> {
    field.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn with_period(text: &str) -> String {
    let text = text.trim();
    if text.ends_with(['.', '?', '!']) {
        text.to_string()
    } else {
        format!("{}.", text)
    }
}

/// "1-10" / "1–10" -> "1{dash}10"
fn page_range(pages: &str, dash: &str) -> String {
    let parts: Vec<&str> = pages
        .split(['-', '\u{2013}', '\u{2014}'])
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();

    match parts.as_slice() {
        [first, last] => format!("{}{}{}", first, dash, last),
        _ => pages.trim().to_string(),
    }
}

fn acs_authors(authors: &[Author]) -> String {
    authors
        .iter()
        .filter(|a| !a.family.trim().is_empty())
        .map(|a| match a.initials() {
            Some(initials) => format!("{}, {}", a.family, initials),
            None => a.family.clone(),
        })
        .collect::<Vec<_>>()
        .join("; ")
}

fn bib_entry_type(kind: WorkKind) -> &'static str {
    match kind {
        WorkKind::JournalArticle => "article",
        WorkKind::ProceedingsArticle => "inproceedings",
        WorkKind::Book => "book",
        WorkKind::BookChapter => "incollection",
        WorkKind::Preprint => "online",
        WorkKind::Dataset => "dataset",
        WorkKind::Report => "report",
        WorkKind::Thesis => "thesis",
        WorkKind::Other => "misc",
    }
}

fn bib_container_field(kind: WorkKind) -> Option<&'static str> {
    match kind {
        WorkKind::JournalArticle => Some("journaltitle"),
        WorkKind::ProceedingsArticle | WorkKind::BookChapter => Some("booktitle"),
        WorkKind::Preprint | WorkKind::Dataset | WorkKind::Other => Some("howpublished"),
        WorkKind::Book | WorkKind::Report | WorkKind::Thesis => None,
    }
}

fn bib_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' | '%' | '$' | '#' | '_' | '{' | '}' => {
                out.push('\\');
                out.push(c);
            }
            '~' => out.push_str("\\textasciitilde{}"),
            '^' => out.push_str("\\textasciicircum{}"),
            '\\' => out.push_str("\\textbackslash{}"),
            _ => out.push(c),
        }
    }
    out
}

fn render_bib(meta: &RawMetadata, key: &CitationKey) -> String {
    let mut fields: Vec<(&str, String)> = Vec::new();

    let authors: Vec<String> = meta
        .authors
        .iter()
        .filter(|a| !a.family.trim().is_empty())
        .map(|a| bib_escape(&a.inverted()))
        .collect();
    if !authors.is_empty() {
        fields.push(("author", authors.join(" and ")));
    }

    if let Some(title) = meta.title() {
        fields.push(("title", format!("{{{}}}", bib_escape(title))));
    }

    if let (Some(field), Some(container)) = (bib_container_field(meta.kind), meta.container(false)) {
        fields.push((field, bib_escape(container)));
    }

    if let Some(year) = meta.year {
        fields.push(("year", year.to_string()));
    }
    if let Some(volume) = non_empty(&meta.volume) {
        fields.push(("volume", bib_escape(volume)));
    }
    if let Some(issue) = non_empty(&meta.issue) {
        fields.push(("number", bib_escape(issue)));
    }
    if let Some(pages) = non_empty(&meta.pages) {
        fields.push(("pages", page_range(pages, "--")));
    }
    if let Some(publisher) = non_empty(&meta.publisher) {
        fields.push(("publisher", bib_escape(publisher)));
    }
    fields.push(("doi", meta.doi.to_string()));
    if matches!(meta.kind, WorkKind::Preprint | WorkKind::Dataset) {
        if let Some(url) = non_empty(&meta.url) {
            fields.push(("url", url.to_string()));
        }
    }

    let mut out = format!("@{}{{{},\n", bib_entry_type(meta.kind), key);
    for (name, value) in fields {
        out.push_str(&format!("  {} = {{{}}},\n", name, value));
    }
    out.push('}');
    out
}

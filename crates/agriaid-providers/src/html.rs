//! Small HTML helpers shared by the scraping providers.

use scraper::{ElementRef, Html, Selector};

use crate::ProviderError;

pub(crate) fn selector(css: &'static str) -> Result<Selector, ProviderError> {
    Selector::parse(css).map_err(|e| ProviderError::Parse {
        what: "css selector",
        message: format!("{css}: {e:?}"),
    })
}

/// Visible text of an element with whitespace runs collapsed.
///
/// Text nodes are concatenated as-is, so inline markup inside a word or
/// before punctuation adds no spaces.
pub fn element_text(element: &ElementRef<'_>) -> String {
    collapse_whitespace(&element.text().collect::<String>())
}

/// Plain text of an HTML fragment (feed summaries often carry markup).
pub fn fragment_text(fragment: &str) -> String {
    if !fragment.contains('<') {
        return collapse_whitespace(fragment);
    }
    let doc = Html::parse_fragment(fragment);
    collapse_whitespace(&doc.root_element().text().collect::<String>())
}

pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

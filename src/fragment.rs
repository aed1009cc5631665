//! Extraction of the live element from a rendered document.

use scraper::{ElementRef, Html};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FragmentError {
    #[error("no element found with an id of {0} in the template")]
    ElementNotFound(String),
}

/// Parse `document` and serialize the first element (pre-order, document
/// order) whose `id` equals `element_id`, including the element itself and
/// all of its descendants.
pub fn extract(document: &str, element_id: &str) -> Result<String, FragmentError> {
    let html = Html::parse_document(document);
    find(&html, element_id)
        .map(|el| el.html())
        .ok_or_else(|| FragmentError::ElementNotFound(element_id.to_string()))
}

/// Number of elements in `document` carrying `id="element_id"`.
pub fn count_matches(document: &str, element_id: &str) -> usize {
    let html = Html::parse_document(document);
    elements(&html)
        .filter(|el| el.value().id() == Some(element_id))
        .count()
}

fn find<'a>(html: &'a Html, element_id: &str) -> Option<ElementRef<'a>> {
    elements(html).find(|el| el.value().id() == Some(element_id))
}

fn elements(html: &Html) -> impl Iterator<Item = ElementRef<'_>> {
    html.tree.root().descendants().filter_map(ElementRef::wrap)
}

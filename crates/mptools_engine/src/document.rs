use scraper::Selector;

use crate::dom::ElementId;

/// What the automation loop needs from a page: structural queries, text, and
/// the element's primary activation (a click).
pub trait Document: Send + Sync {
    /// Elements matching `selector`, in document order.
    fn query_all(&self, selector: &Selector) -> Vec<ElementId>;

    fn text_content(&self, element: ElementId) -> Option<String>;

    /// Activates the element. Returns false if it is no longer in the page.
    fn activate(&self, element: ElementId) -> bool;

    /// First element in document order whose trimmed text equals `text`
    /// exactly.
    fn first_with_text(&self, selector: &Selector, text: &str) -> Option<ElementId> {
        self.query_all(selector).into_iter().find(|element| {
            self.text_content(*element)
                .is_some_and(|content| content.trim() == text)
        })
    }
}

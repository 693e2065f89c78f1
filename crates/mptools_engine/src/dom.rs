use ego_tree::{NodeId, NodeMut, NodeRef};
use html5ever::tendril::StrTendril;
use html5ever::{Attribute, LocalName, Namespace, QualName};
use scraper::node::{Element, Text};
use scraper::{CaseSensitivity, ElementRef, Html, Node, Selector};
use thiserror::Error;

const HTML_NAMESPACE: &str = "http://www.w3.org/1999/xhtml";

/// A selector that failed to parse. `scraper`'s own error borrows the
/// source text, so only its message is kept.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid selector {selector:?}: {message}")]
pub struct SelectorError {
    pub selector: String,
    pub message: String,
}

/// Parses a CSS selector group for use against a [`DomTree`].
pub fn parse_selector(source: &str) -> Result<Selector, SelectorError> {
    Selector::parse(source).map_err(|err| SelectorError {
        selector: source.to_string(),
        message: err.to_string(),
    })
}

/// Handle to a node of a [`DomTree`].
///
/// Handles carry the generation of the tree they were taken from, so a
/// handle kept across a page replacement resolves to nothing instead of an
/// unrelated node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementId {
    node: NodeId,
    generation: u64,
}

/// An element to be inserted by a tool (status badge, style override).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementData {
    tag: String,
    attrs: Vec<(String, String)>,
}

impl ElementData {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            attrs: Vec::new(),
        }
    }

    pub fn with_attr(mut self, name: &str, value: impl Into<String>) -> Self {
        let name = name.to_ascii_lowercase();
        self.attrs.retain(|(existing, _)| *existing != name);
        self.attrs.push((name, value.into()));
        self
    }

    fn into_node(self) -> Node {
        let attrs = self
            .attrs
            .into_iter()
            .map(|(name, value)| Attribute {
                name: attr_name(&name),
                value: StrTendril::from(value),
            })
            .collect();
        let name = QualName::new(
            None,
            Namespace::from(HTML_NAMESPACE),
            LocalName::from(self.tag.as_str()),
        );
        Node::Element(Element::new(name, attrs))
    }
}

/// Read access to one element of the page.
#[derive(Debug, Clone, Copy)]
pub struct ElementView<'a> {
    element: &'a Element,
}

impl<'a> ElementView<'a> {
    pub fn tag(&self) -> &'a str {
        self.element.name()
    }

    pub fn attr(&self, name: &str) -> Option<&'a str> {
        self.element.attr(name)
    }

    pub fn classes(&self) -> impl Iterator<Item = &'a str> {
        self.element.classes()
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.element.has_class(class, CaseSensitivity::CaseSensitive)
    }
}

/// Mutable document tree backing a live page.
///
/// The parsed `scraper::Html` is kept and edited in place, so queries run
/// through `scraper`'s selector engine against the current state.
#[derive(Debug, Clone)]
pub struct DomTree {
    page: Html,
    generation: u64,
}

impl Default for DomTree {
    fn default() -> Self {
        Self::parse_document("")
    }
}

impl DomTree {
    pub fn parse_document(html: &str) -> Self {
        Self {
            page: Html::parse_document(html),
            generation: 0,
        }
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn set_generation(&mut self, generation: u64) {
        self.generation = generation;
    }

    fn handle(&self, node: NodeId) -> ElementId {
        ElementId {
            node,
            generation: self.generation,
        }
    }

    fn node(&self, id: ElementId) -> Option<NodeRef<'_, Node>> {
        if id.generation != self.generation {
            return None;
        }
        self.page.tree.get(id.node)
    }

    fn node_mut(&mut self, id: ElementId) -> Option<NodeMut<'_, Node>> {
        if id.generation != self.generation {
            return None;
        }
        self.page.tree.get_mut(id.node)
    }

    pub fn root(&self) -> ElementId {
        self.handle(self.page.tree.root().id())
    }

    pub fn children(&self, id: ElementId) -> Vec<ElementId> {
        self.node(id)
            .map(|node| node.children().map(|c| self.handle(c.id())).collect())
            .unwrap_or_default()
    }

    pub fn parent(&self, id: ElementId) -> Option<ElementId> {
        self.node(id)?.parent().map(|p| self.handle(p.id()))
    }

    pub fn element(&self, id: ElementId) -> Option<ElementView<'_>> {
        self.node(id)?
            .value()
            .as_element()
            .map(|element| ElementView { element })
    }

    /// All elements matching `selector`, in document order.
    pub fn select(&self, selector: &Selector) -> Vec<ElementId> {
        self.matching(self.page.tree.root(), selector)
    }

    /// Matches among `scope` and its descendants, in document order.
    pub fn select_within(&self, scope: ElementId, selector: &Selector) -> Vec<ElementId> {
        match self.node(scope) {
            Some(scope) => self.matching(scope, selector),
            None => Vec::new(),
        }
    }

    // Walks from `scope` rather than using `Html::select`, which also visits
    // detached nodes still held by the arena.
    fn matching(&self, scope: NodeRef<'_, Node>, selector: &Selector) -> Vec<ElementId> {
        scope
            .descendants()
            .filter_map(ElementRef::wrap)
            .filter(|element| selector.matches(element))
            .map(|element| self.handle(element.id()))
            .collect()
    }

    pub fn find_by_id(&self, id: &str) -> Option<ElementId> {
        self.page
            .tree
            .root()
            .descendants()
            .find(|node| node.value().as_element().and_then(Element::id) == Some(id))
            .map(|node| self.handle(node.id()))
    }

    pub fn first_by_tag(&self, tag: &str) -> Option<ElementId> {
        self.page
            .tree
            .root()
            .descendants()
            .find(|node| node.value().as_element().is_some_and(|e| e.name() == tag))
            .map(|node| self.handle(node.id()))
    }

    pub fn body(&self) -> Option<ElementId> {
        self.first_by_tag("body")
    }

    pub fn head(&self) -> Option<ElementId> {
        self.first_by_tag("head")
    }

    /// Concatenated text of the node and its descendants, untrimmed.
    pub fn text_content(&self, id: ElementId) -> Option<String> {
        let node = self.node(id)?;
        Some(
            node.descendants()
                .filter_map(|n| n.value().as_text().map(|text| &**text))
                .collect(),
        )
    }

    /// True while the node is reachable from the document root.
    pub fn is_attached(&self, id: ElementId) -> bool {
        let Some(node) = self.node(id) else {
            return false;
        };
        let top = node.ancestors().last().unwrap_or(node);
        top.id() == self.page.tree.root().id()
    }

    /// Replaces the element's attribute list when `edit` reports a change.
    ///
    /// `scraper` caches id and classes inside the element, so edits build a
    /// fresh element instead of touching `attrs` in place.
    fn edit_attrs(
        &mut self,
        id: ElementId,
        edit: impl FnOnce(&mut Vec<Attribute>) -> bool,
    ) -> bool {
        let Some(mut node) = self.node_mut(id) else {
            return false;
        };
        let value = node.value();
        let Some(element) = value.as_element() else {
            return false;
        };
        let name = element.name.clone();
        let mut attrs = element
            .attrs
            .iter()
            .map(|(name, value)| Attribute {
                name: name.clone(),
                value: StrTendril::from(&**value),
            })
            .collect::<Vec<_>>();
        if !edit(&mut attrs) {
            return false;
        }
        *value = Node::Element(Element::new(name, attrs));
        true
    }

    pub(crate) fn set_attribute(&mut self, id: ElementId, name: &str, value: &str) -> bool {
        let name = name.to_ascii_lowercase();
        self.edit_attrs(id, |attrs| {
            match attrs.iter_mut().find(|attr| &*attr.name.local == name.as_str()) {
                Some(attr) if &*attr.value == value => false,
                Some(attr) => {
                    attr.value = StrTendril::from(value);
                    true
                }
                None => {
                    attrs.push(Attribute {
                        name: attr_name(&name),
                        value: StrTendril::from(value),
                    });
                    true
                }
            }
        })
    }

    pub(crate) fn remove_class(&mut self, id: ElementId, class: &str) -> bool {
        self.edit_attrs(id, |attrs| {
            let Some(attr) = class_attr(attrs) else {
                return false;
            };
            if !attr.value.split_ascii_whitespace().any(|c| c == class) {
                return false;
            }
            let remaining = attr
                .value
                .split_ascii_whitespace()
                .filter(|c| *c != class)
                .collect::<Vec<_>>()
                .join(" ");
            attr.value = StrTendril::from(remaining);
            true
        })
    }

    pub(crate) fn add_class(&mut self, id: ElementId, class: &str) -> bool {
        self.edit_attrs(id, |attrs| match class_attr(attrs) {
            Some(attr) if attr.value.split_ascii_whitespace().any(|c| c == class) => false,
            Some(attr) => {
                let mut classes = attr.value.split_ascii_whitespace().collect::<Vec<_>>();
                classes.push(class);
                let joined = classes.join(" ");
                attr.value = StrTendril::from(joined);
                true
            }
            None => {
                attrs.push(Attribute {
                    name: attr_name("class"),
                    value: StrTendril::from(class),
                });
                true
            }
        })
    }

    /// Detaches the node from its parent. The root cannot be detached.
    pub(crate) fn detach(&mut self, id: ElementId) -> bool {
        if id == self.root() || !self.is_attached(id) {
            return false;
        }
        match self.node_mut(id) {
            Some(mut node) => {
                node.detach();
                true
            }
            None => false,
        }
    }

    pub(crate) fn append_element(
        &mut self,
        parent: ElementId,
        data: ElementData,
        text: Option<&str>,
    ) -> Option<ElementId> {
        let generation = self.generation;
        let mut parent = self.node_mut(parent)?;
        let mut element = parent.append(data.into_node());
        if let Some(text) = text {
            element.append(Node::Text(Text {
                text: scraper::StrTendril::from(text),
            }));
        }
        Some(ElementId {
            node: element.id(),
            generation,
        })
    }

    /// Parses `html` as a fragment and appends its top-level nodes to `parent`.
    pub(crate) fn append_html(&mut self, parent: ElementId, html: &str) -> Vec<ElementId> {
        let generation = self.generation;
        let Some(mut parent) = self.node_mut(parent) else {
            return Vec::new();
        };
        let fragment = Html::parse_fragment(html);
        let root = fragment.root_element();
        copy_children(*root, &mut parent)
            .into_iter()
            .map(|node| ElementId { node, generation })
            .collect()
    }
}

fn attr_name(name: &str) -> QualName {
    QualName::new(None, Namespace::from(""), LocalName::from(name))
}

fn class_attr(attrs: &mut [Attribute]) -> Option<&mut Attribute> {
    attrs.iter_mut().find(|attr| &*attr.name.local == "class")
}

/// Copies the children of a parsed fragment node under `target`, returning
/// the ids of the nodes appended directly to it.
fn copy_children(source: NodeRef<'_, Node>, target: &mut NodeMut<'_, Node>) -> Vec<NodeId> {
    let mut appended = Vec::new();
    for child in source.children() {
        match child.value() {
            Node::Element(_) => {
                let mut node = target.append(child.value().clone());
                appended.push(node.id());
                copy_children(child, &mut node);
            }
            Node::Text(_) | Node::Comment(_) => {
                let node = target.append(child.value().clone());
                appended.push(node.id());
            }
            Node::Document | Node::Fragment => {
                appended.extend(copy_children(child, target));
            }
            _ => {}
        }
    }
    appended
}

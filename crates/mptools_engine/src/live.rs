use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use scraper::Selector;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

use crate::document::Document;
use crate::dom::{DomTree, ElementData, ElementId};

/// A change made to the live document, delivered to observers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    Attribute {
        target: ElementId,
        name: String,
    },
    ChildList {
        target: ElementId,
        added: Vec<ElementId>,
        removed: Vec<ElementId>,
    },
}

/// Page events whose default action a page may try to suppress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageEvent {
    ContextMenu,
    SelectStart,
    DragStart,
}

type ActivationHook = Box<dyn FnMut(&mut Mutator<'_>, ElementId) + Send>;

struct LiveState {
    tree: DomTree,
    observers: Vec<UnboundedSender<Mutation>>,
    activation_hooks: Vec<ActivationHook>,
    activations: Vec<ElementId>,
    blocked_events: HashSet<PageEvent>,
    guarded_events: HashSet<PageEvent>,
}

impl LiveState {
    fn notify(&mut self, records: Vec<Mutation>) {
        if records.is_empty() {
            return;
        }
        self.observers.retain(|tx| {
            records
                .iter()
                .all(|record| tx.send(record.clone()).is_ok())
        });
    }
}

/// Edits the tree and records a [`Mutation`] for every effective change.
pub struct Mutator<'a> {
    tree: &'a mut DomTree,
    records: &'a mut Vec<Mutation>,
}

impl Mutator<'_> {
    pub fn tree(&self) -> &DomTree {
        self.tree
    }

    pub fn select(&self, selector: &Selector) -> Vec<ElementId> {
        self.tree.select(selector)
    }

    pub fn set_attribute(&mut self, id: ElementId, name: &str, value: &str) -> bool {
        let changed = self.tree.set_attribute(id, name, value);
        if changed {
            self.records.push(Mutation::Attribute {
                target: id,
                name: name.to_ascii_lowercase(),
            });
        }
        changed
    }

    pub fn add_class(&mut self, id: ElementId, class: &str) -> bool {
        let changed = self.tree.add_class(id, class);
        if changed {
            self.record_class_change(id);
        }
        changed
    }

    pub fn remove_class(&mut self, id: ElementId, class: &str) -> bool {
        let changed = self.tree.remove_class(id, class);
        if changed {
            self.record_class_change(id);
        }
        changed
    }

    fn record_class_change(&mut self, id: ElementId) {
        self.records.push(Mutation::Attribute {
            target: id,
            name: "class".to_string(),
        });
    }

    pub fn remove(&mut self, id: ElementId) -> bool {
        let parent = self.tree.parent(id);
        if !self.tree.detach(id) {
            return false;
        }
        if let Some(parent) = parent {
            self.records.push(Mutation::ChildList {
                target: parent,
                added: Vec::new(),
                removed: vec![id],
            });
        }
        true
    }

    pub fn append_element(
        &mut self,
        parent: ElementId,
        data: ElementData,
        text: Option<&str>,
    ) -> Option<ElementId> {
        let id = self.tree.append_element(parent, data, text)?;
        self.records.push(Mutation::ChildList {
            target: parent,
            added: vec![id],
            removed: Vec::new(),
        });
        Some(id)
    }

    pub fn append_html(&mut self, parent: ElementId, html: &str) -> Vec<ElementId> {
        let added = self.tree.append_html(parent, html);
        if !added.is_empty() {
            self.records.push(Mutation::ChildList {
                target: parent,
                added: added.clone(),
                removed: Vec::new(),
            });
        }
        added
    }
}

/// Shared, mutable page document.
///
/// Clones share the same page. Mutations made through [`LiveDocument::mutate`]
/// are delivered to every observer; [`LiveDocument::mutate_unobserved`] edits
/// the tree without notifying anyone, the way changes slip past an observer
/// that was attached to a replaced subtree.
#[derive(Clone)]
pub struct LiveDocument {
    inner: Arc<Mutex<LiveState>>,
}

impl Default for LiveDocument {
    fn default() -> Self {
        Self::new(DomTree::default())
    }
}

impl LiveDocument {
    pub fn new(tree: DomTree) -> Self {
        Self {
            inner: Arc::new(Mutex::new(LiveState {
                tree,
                observers: Vec::new(),
                activation_hooks: Vec::new(),
                activations: Vec::new(),
                blocked_events: HashSet::new(),
                guarded_events: HashSet::new(),
            })),
        }
    }

    pub fn parse(html: &str) -> Self {
        Self::new(DomTree::parse_document(html))
    }

    fn lock(&self) -> MutexGuard<'_, LiveState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn read<R>(&self, f: impl FnOnce(&DomTree) -> R) -> R {
        f(&self.lock().tree)
    }

    pub fn mutate<R>(&self, f: impl FnOnce(&mut Mutator<'_>) -> R) -> R {
        let mut state = self.lock();
        let mut records = Vec::new();
        let result = f(&mut Mutator {
            tree: &mut state.tree,
            records: &mut records,
        });
        state.notify(records);
        result
    }

    pub fn mutate_unobserved<R>(&self, f: impl FnOnce(&mut Mutator<'_>) -> R) -> R {
        let mut state = self.lock();
        let mut records = Vec::new();
        f(&mut Mutator {
            tree: &mut state.tree,
            records: &mut records,
        })
    }

    /// Swaps in a freshly loaded page. Handles into the previous page stop
    /// resolving; observers see the new top-level nodes as insertions.
    pub fn replace(&self, mut tree: DomTree) {
        let mut state = self.lock();
        tree.set_generation(state.tree.generation() + 1);
        state.tree = tree;
        state.activations.clear();
        let root = state.tree.root();
        let added = state.tree.children(root);
        state.notify(vec![Mutation::ChildList {
            target: root,
            added,
            removed: Vec::new(),
        }]);
    }

    /// Registers a mutation observer. Dropping the receiver disconnects it.
    pub fn observe(&self) -> UnboundedReceiver<Mutation> {
        let (tx, rx) = unbounded_channel();
        self.lock().observers.push(tx);
        rx
    }

    /// Registers page behaviour that runs whenever an element is activated.
    pub fn on_activate(&self, hook: impl FnMut(&mut Mutator<'_>, ElementId) + Send + 'static) {
        self.lock().activation_hooks.push(Box::new(hook));
    }

    /// Elements activated so far on the current page, oldest first.
    pub fn activations(&self) -> Vec<ElementId> {
        self.lock().activations.clone()
    }

    pub fn select(&self, selector: &Selector) -> Vec<ElementId> {
        self.lock().tree.select(selector)
    }

    pub fn find_by_id(&self, id: &str) -> Option<ElementId> {
        self.lock().tree.find_by_id(id)
    }

    /// The page suppresses the default action of `event`.
    pub fn block_event(&self, event: PageEvent) {
        self.lock().blocked_events.insert(event);
    }

    /// Installs a capture-phase guard that keeps page handlers from
    /// suppressing `event`.
    pub fn guard_event(&self, event: PageEvent) -> bool {
        self.lock().guarded_events.insert(event)
    }

    pub fn unguard_event(&self, event: PageEvent) -> bool {
        self.lock().guarded_events.remove(&event)
    }

    /// Dispatches `event`; returns whether its default action runs.
    pub fn dispatch(&self, event: PageEvent) -> bool {
        let state = self.lock();
        state.guarded_events.contains(&event) || !state.blocked_events.contains(&event)
    }
}

impl Document for LiveDocument {
    fn query_all(&self, selector: &Selector) -> Vec<ElementId> {
        self.select(selector)
    }

    fn text_content(&self, element: ElementId) -> Option<String> {
        self.lock().tree.text_content(element)
    }

    fn activate(&self, element: ElementId) -> bool {
        let mut state = self.lock();
        if !state.tree.is_attached(element) {
            return false;
        }
        state.activations.push(element);

        let mut hooks = std::mem::take(&mut state.activation_hooks);
        let mut records = Vec::new();
        for hook in hooks.iter_mut() {
            hook(
                &mut Mutator {
                    tree: &mut state.tree,
                    records: &mut records,
                },
                element,
            );
        }
        state.activation_hooks = hooks;
        state.notify(records);
        true
    }

    fn first_with_text(&self, selector: &Selector, text: &str) -> Option<ElementId> {
        let state = self.lock();
        state.tree.select(selector).into_iter().find(|element| {
            state
                .tree
                .text_content(*element)
                .is_some_and(|content| content.trim() == text)
        })
    }
}

use engine_logging::{engine_debug, engine_info};
use scraper::Selector;

use crate::dom::{ElementData, ElementId};
use crate::live::{LiveDocument, PageEvent};

pub const SELECTION_STYLE_ID: &str = "mp-tools-selection-style";

const GUARDED_EVENTS: [PageEvent; 3] = [
    PageEvent::ContextMenu,
    PageEvent::SelectStart,
    PageEvent::DragStart,
];

const USER_SELECT_PROPERTIES: [&str; 4] = [
    "user-select",
    "-webkit-user-select",
    "-moz-user-select",
    "-ms-user-select",
];

const OVERRIDE_CSS: &str = "* { user-select: auto !important; -webkit-user-select: auto !important; \
-moz-user-select: auto !important; -ms-user-select: auto !important; }";

/// Re-enables the context menu and text selection on pages that block them.
#[derive(Debug, Default)]
pub struct SelectionUnlock {
    enabled: bool,
    style_element: Option<ElementId>,
}

impl SelectionUnlock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Returns false if already enabled.
    pub fn enable(&mut self, document: &LiveDocument) -> bool {
        if self.enabled {
            engine_debug!("Selection unlock already enabled");
            return false;
        }
        for event in GUARDED_EVENTS {
            document.guard_event(event);
        }

        let rewritten = document.mutate(|m| {
            let all = Selector::parse("[style]").map(|s| m.select(&s)).unwrap_or_default();
            let mut rewritten = 0;
            for element in all {
                let Some(style) = m.tree().element(element).and_then(|e| e.attr("style")) else {
                    continue;
                };
                if let Some(unlocked) = unlock_inline_style(style) {
                    m.set_attribute(element, "style", &unlocked);
                    rewritten += 1;
                }
            }
            rewritten
        });

        self.style_element = document.mutate(|m| {
            let parent = m.tree().head().unwrap_or_else(|| m.tree().root());
            m.append_element(
                parent,
                ElementData::new("style").with_attr("id", SELECTION_STYLE_ID),
                Some(OVERRIDE_CSS),
            )
        });

        self.enabled = true;
        engine_info!(
            "Selection unlock enabled ({} inline styles rewritten)",
            rewritten
        );
        true
    }

    /// Removes the guards and the override style. Inline styles rewritten by
    /// [`SelectionUnlock::enable`] stay as they are. Returns false if already
    /// disabled.
    pub fn disable(&mut self, document: &LiveDocument) -> bool {
        if !self.enabled {
            engine_debug!("Selection unlock already disabled");
            return false;
        }
        for event in GUARDED_EVENTS {
            document.unguard_event(event);
        }
        if let Some(style) = self.style_element.take() {
            document.mutate(|m| m.remove(style));
        }
        self.enabled = false;
        engine_info!("Selection unlock disabled");
        true
    }
}

/// Rewrites an inline style whose `user-select` (any vendor prefix) is
/// `none`, setting every variant to `auto`. Returns `None` when the style
/// does not block selection.
pub fn unlock_inline_style(style: &str) -> Option<String> {
    let declarations: Vec<(String, String)> = style
        .split(';')
        .filter_map(|decl| {
            let (name, value) = decl.split_once(':')?;
            Some((name.trim().to_ascii_lowercase(), value.trim().to_string()))
        })
        .filter(|(name, _)| !name.is_empty())
        .collect();

    let blocks = declarations.iter().any(|(name, value)| {
        USER_SELECT_PROPERTIES.contains(&name.as_str()) && value.eq_ignore_ascii_case("none")
    });
    if !blocks {
        return None;
    }

    let mut kept: Vec<String> = declarations
        .into_iter()
        .filter(|(name, _)| !USER_SELECT_PROPERTIES.contains(&name.as_str()))
        .map(|(name, value)| format!("{name}: {value}"))
        .collect();
    kept.extend(
        USER_SELECT_PROPERTIES
            .iter()
            .map(|property| format!("{property}: auto")),
    );
    Some(kept.join("; "))
}

#[cfg(test)]
mod tests {
    use super::unlock_inline_style;

    #[test]
    fn non_blocking_styles_are_left_alone() {
        assert_eq!(unlock_inline_style("color: red"), None);
        assert_eq!(unlock_inline_style("user-select: text"), None);
    }

    #[test]
    fn blocking_style_is_rewritten_to_auto() {
        let rewritten = unlock_inline_style("color: red; -webkit-user-select: NONE;").unwrap();
        assert_eq!(
            rewritten,
            "color: red; user-select: auto; -webkit-user-select: auto; \
             -moz-user-select: auto; -ms-user-select: auto"
        );
    }
}

//! On-page status notices and the floating calculator panel.

use std::time::Duration;

use engine_logging::engine_debug;

use crate::dom::{ElementData, ElementId};
use crate::live::LiveDocument;

pub const STATUS_ELEMENT_ID: &str = "mp-tools-status";
pub const STATUS_LIFETIME: Duration = Duration::from_secs(2);

pub const CALCULATOR_PANEL_ID: &str = "mp-desmos-panel";
pub const CALCULATOR_BODY_ID: &str = "mp-desmos-body";
pub const CALCULATOR_MOUNT_ID: &str = "mp-desmos-body-calc";

/// Topmost z-index a page can use; the panel sits one above it when raised.
const TOP_LAYER: u64 = 2_147_483_647;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusTone {
    Info,
    On,
    Off,
}

impl StatusTone {
    pub fn color(self) -> &'static str {
        match self {
            StatusTone::Info => "#3b82f6",
            StatusTone::On => "#10b981",
            StatusTone::Off => "#ef4444",
        }
    }
}

/// Shows `message` in the status badge, replacing any badge already shown.
///
/// The badge removes itself after [`STATUS_LIFETIME`]. Must be called from
/// within a Tokio runtime. Returns `None` if the page has no body.
pub fn show_status(document: &LiveDocument, message: &str, tone: StatusTone) -> Option<ElementId> {
    let badge = document.mutate(|m| {
        if let Some(existing) = m.tree().find_by_id(STATUS_ELEMENT_ID) {
            m.remove(existing);
        }
        let body = m.tree().body()?;
        let style = format!(
            "position: fixed; top: 8px; left: 8px; color: {color}; border: 1px solid {color}; \
             z-index: {TOP_LAYER}; pointer-events: none",
            color = tone.color()
        );
        m.append_element(
            body,
            ElementData::new("div")
                .with_attr("id", STATUS_ELEMENT_ID)
                .with_attr("style", style),
            Some(message),
        )
    })?;

    let document = document.clone();
    tokio::spawn(async move {
        tokio::time::sleep(STATUS_LIFETIME).await;
        // A newer badge may have replaced this one already.
        if document.mutate(|m| m.remove(badge)) {
            engine_debug!("Status badge expired");
        }
    });
    Some(badge)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelState {
    Opened(ElementId),
    Raised(ElementId),
}

/// Opens the calculator panel, or raises it if already open. Returns `None`
/// if the page has no body.
pub fn open_calculator(document: &LiveDocument) -> Option<PanelState> {
    document.mutate(|m| {
        if let Some(panel) = m.tree().find_by_id(CALCULATOR_PANEL_ID) {
            let raised = format!("{PANEL_STYLE}; display: block; z-index: {}", TOP_LAYER + 1);
            m.set_attribute(panel, "style", &raised);
            return Some(PanelState::Raised(panel));
        }

        let body = m.tree().body()?;
        let panel = m.append_element(
            body,
            ElementData::new("div")
                .with_attr("id", CALCULATOR_PANEL_ID)
                .with_attr("style", format!("{PANEL_STYLE}; z-index: {}", TOP_LAYER + 1)),
            None,
        )?;
        m.append_html(
            panel,
            &format!(
                r#"<div class="mp-desmos-header"><span>Calculator</span></div><div id="{CALCULATOR_BODY_ID}"><div id="{CALCULATOR_MOUNT_ID}"></div></div>"#
            ),
        );
        Some(PanelState::Opened(panel))
    })
}

const PANEL_STYLE: &str =
    "position: fixed; left: 12px; top: 12px; width: 320px; height: 440px; overflow: hidden";

/// Removes the calculator panel. Returns false if it was not open.
pub fn close_calculator(document: &LiveDocument) -> bool {
    document.mutate(|m| match m.tree().find_by_id(CALCULATOR_PANEL_ID) {
        Some(panel) => m.remove(panel),
        None => false,
    })
}

pub fn is_calculator_open(document: &LiveDocument) -> bool {
    document.find_by_id(CALCULATOR_PANEL_ID).is_some()
}

//! Keeps blur classes and blocking overlays out of a live page.

use std::sync::Arc;
use std::time::Duration;

use engine_logging::{engine_debug, engine_info};
use scraper::Selector;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::dom::{parse_selector, ElementId, SelectorError};
use crate::live::{LiveDocument, Mutation, Mutator};

pub const DEFAULT_FALLBACK_INTERVAL: Duration = Duration::from_millis(300);

/// Strip `class` from every element matching `selector`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassRule {
    pub selector: String,
    pub class: String,
}

impl ClassRule {
    pub fn new(selector: &str, class: &str) -> Self {
        Self {
            selector: selector.to_string(),
            class: class.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanitizeRules {
    pub strip_classes: Vec<ClassRule>,
    /// Elements matching any of these are removed from the page.
    pub remove: Vec<String>,
    pub fallback_interval: Duration,
}

impl Default for SanitizeRules {
    fn default() -> Self {
        Self {
            strip_classes: vec![
                ClassRule::new(".question-blur", "question-blur"),
                ClassRule::new("div.red-stuff", "red-stuff"),
            ],
            remove: vec![".cdk-overlay-container".to_string()],
            fallback_interval: DEFAULT_FALLBACK_INTERVAL,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid sanitizer rule: {0}")]
pub struct RuleError(#[from] pub SelectorError);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepStats {
    pub classes_stripped: usize,
    pub elements_removed: usize,
}

impl SweepStats {
    pub fn is_empty(&self) -> bool {
        self.classes_stripped == 0 && self.elements_removed == 0
    }
}

#[derive(Debug)]
struct CompiledRules {
    strip: Vec<(Selector, String)>,
    remove: Vec<Selector>,
}

impl CompiledRules {
    fn compile(rules: &SanitizeRules) -> Result<Self, RuleError> {
        let parse = |selector: &str| parse_selector(selector).map_err(RuleError);
        let strip = rules
            .strip_classes
            .iter()
            .map(|rule| Ok((parse(&rule.selector)?, rule.class.clone())))
            .collect::<Result<Vec<_>, RuleError>>()?;
        let remove = rules
            .remove
            .iter()
            .map(|selector| parse(selector))
            .collect::<Result<Vec<_>, RuleError>>()?;
        Ok(Self { strip, remove })
    }

    /// Applies every rule to `scope` and its descendants, or to the whole
    /// page when `scope` is `None`.
    fn apply(&self, m: &mut Mutator<'_>, scope: Option<ElementId>) -> SweepStats {
        let mut stats = SweepStats::default();
        let scope = scope.unwrap_or_else(|| m.tree().root());
        if !m.tree().is_attached(scope) {
            return stats;
        }

        for selector in &self.remove {
            for element in m.tree().select_within(scope, selector) {
                // An earlier removal may already have taken this one out.
                if m.remove(element) {
                    stats.elements_removed += 1;
                }
            }
        }
        if !m.tree().is_attached(scope) {
            return stats;
        }
        for (selector, class) in &self.strip {
            for element in m.tree().select_within(scope, selector) {
                if m.remove_class(element, class) {
                    stats.classes_stripped += 1;
                }
            }
        }
        stats
    }
}

struct ActiveSanitizer {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Sweeps once on enable, then follows the page through its mutation
/// observer with a periodic full sweep as a safety net.
pub struct Sanitizer {
    rules: Arc<CompiledRules>,
    fallback_interval: Duration,
    active: Option<ActiveSanitizer>,
}

impl Sanitizer {
    pub fn new(rules: &SanitizeRules) -> Result<Self, RuleError> {
        Ok(Self {
            rules: Arc::new(CompiledRules::compile(rules)?),
            fallback_interval: rules.fallback_interval,
            active: None,
        })
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Runs one full sweep without enabling anything.
    pub fn sweep(&self, document: &LiveDocument) -> SweepStats {
        document.mutate(|m| self.rules.apply(m, None))
    }

    /// Must be called from within a Tokio runtime. Returns false if already
    /// enabled.
    pub fn enable(&mut self, document: &LiveDocument) -> bool {
        if self.active.is_some() {
            engine_debug!("Sanitizer already enabled");
            return false;
        }

        let mut mutations = document.observe();
        let initial = self.sweep(document);
        engine_info!(
            "Sanitizer enabled: stripped {} classes, removed {} overlays",
            initial.classes_stripped,
            initial.elements_removed
        );

        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let rules = self.rules.clone();
        let period = self.fallback_interval;
        let document = document.clone();
        let task = tokio::spawn(async move {
            let mut fallback = interval_at(Instant::now() + period, period);
            fallback.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    Some(mutation) = mutations.recv() => {
                        let stats = document.mutate(|m| apply_mutation(&rules, m, &mutation));
                        if !stats.is_empty() {
                            engine_debug!("Sanitizer observer pass: {:?}", stats);
                        }
                    }
                    _ = fallback.tick() => {
                        let stats = document.mutate(|m| rules.apply(m, None));
                        if !stats.is_empty() {
                            engine_debug!("Sanitizer fallback sweep: {:?}", stats);
                        }
                    }
                }
            }
        });

        self.active = Some(ActiveSanitizer { cancel, task });
        true
    }

    /// Tears down the observer and the fallback timer. Returns false if
    /// already disabled.
    pub fn disable(&mut self) -> bool {
        match self.active.take() {
            Some(active) => {
                active.cancel.cancel();
                active.task.abort();
                engine_info!("Sanitizer disabled");
                true
            }
            None => {
                engine_debug!("Sanitizer already disabled");
                false
            }
        }
    }
}

impl Drop for Sanitizer {
    fn drop(&mut self) {
        if let Some(active) = self.active.take() {
            active.cancel.cancel();
            active.task.abort();
        }
    }
}

fn apply_mutation(rules: &CompiledRules, m: &mut Mutator<'_>, mutation: &Mutation) -> SweepStats {
    match mutation {
        Mutation::Attribute { target, name } if name == "class" => rules.apply(m, Some(*target)),
        Mutation::Attribute { .. } => SweepStats::default(),
        Mutation::ChildList { added, .. } => {
            let mut total = SweepStats::default();
            for node in added {
                let stats = rules.apply(m, Some(*node));
                total.classes_stripped += stats.classes_stripped;
                total.elements_removed += stats.elements_removed;
            }
            total
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ClassRule, SanitizeRules, Sanitizer};
    use crate::live::LiveDocument;

    #[test]
    fn sweep_strips_classes_and_removes_overlays() {
        let doc = LiveDocument::parse(
            r#"
            <div id="q" class="card question-blur">Question</div>
            <span id="s" class="red-stuff">kept</span>
            <div id="r" class="red-stuff wide">Red</div>
            <div class="cdk-overlay-container"><div class="question-blur">inner</div></div>
            "#,
        );
        let sanitizer = Sanitizer::new(&SanitizeRules::default()).unwrap();

        let stats = sanitizer.sweep(&doc);
        assert_eq!(stats.elements_removed, 1);
        assert_eq!(stats.classes_stripped, 2);

        doc.read(|tree| {
            let q = tree.find_by_id("q").unwrap();
            assert_eq!(tree.element(q).unwrap().attr("class"), Some("card"));
            let s = tree.find_by_id("s").unwrap();
            assert!(tree.element(s).unwrap().has_class("red-stuff"));
            let r = tree.find_by_id("r").unwrap();
            assert_eq!(tree.element(r).unwrap().attr("class"), Some("wide"));
        });
        assert!(sanitizer.sweep(&doc).is_empty());
    }

    #[test]
    fn invalid_rule_selector_is_reported() {
        let rules = SanitizeRules {
            strip_classes: vec![ClassRule::new("div >", "x")],
            ..SanitizeRules::default()
        };
        let err = Sanitizer::new(&rules).err().unwrap();
        assert_eq!(err.0.selector, "div >");
    }
}

use crate::{FeatureFlags, PageStatus};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AppViewModel {
    pub features: FeatureFlags,
    pub calculator_open: bool,
    pub page: PageStatus,
    pub last_status: Option<String>,
    pub quitting: bool,
    pub dirty: bool,
}

impl AppViewModel {
    /// One-line summary for the shell, e.g. `[1:on 2:off 3:off 4:off]`.
    pub fn summary(&self) -> String {
        let flag = |on: bool| if on { "on" } else { "off" };
        format!(
            "[1:{} 2:{} 3:{} 4:{}]",
            flag(self.features.auto_advance),
            flag(self.features.sanitizer),
            flag(self.features.selection_unlock),
            flag(self.calculator_open)
        )
    }
}

use std::path::{Path, PathBuf};

use engine_logging::{engine_error, engine_info, engine_warn};
use mptools_core::FeatureFlags;
use mptools_engine::{read_optional, AtomicFileWriter};
use serde::{Deserialize, Serialize};

pub(crate) const STATE_FILENAME: &str = ".mptools_state.ron";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
#[serde(default)]
struct PersistedFeatures {
    auto_advance: bool,
    sanitizer: bool,
    selection_unlock: bool,
}

/// Saved feature flags; anything unreadable counts as all off.
pub(crate) fn load_features(state_dir: &Path) -> FeatureFlags {
    let content = match read_optional(state_dir, STATE_FILENAME) {
        Ok(Some(text)) => text,
        Ok(None) => return FeatureFlags::default(),
        Err(err) => {
            engine_warn!(
                "Failed to read feature state from {:?}: {}",
                state_dir,
                err
            );
            return FeatureFlags::default();
        }
    };

    let saved: PersistedFeatures = match ron::from_str(&content) {
        Ok(saved) => saved,
        Err(err) => {
            engine_warn!("Failed to parse feature state in {:?}: {}", state_dir, err);
            return FeatureFlags::default();
        }
    };

    engine_info!("Loaded feature state from {:?}", state_dir);
    FeatureFlags {
        auto_advance: saved.auto_advance,
        sanitizer: saved.sanitizer,
        selection_unlock: saved.selection_unlock,
    }
}

pub(crate) fn save_features(state_dir: &Path, features: FeatureFlags) {
    let saved = PersistedFeatures {
        auto_advance: features.auto_advance,
        sanitizer: features.sanitizer,
        selection_unlock: features.selection_unlock,
    };

    let pretty = ron::ser::PrettyConfig::new();
    let content = match ron::ser::to_string_pretty(&saved, pretty) {
        Ok(text) => text,
        Err(err) => {
            engine_error!("Failed to serialize feature state: {}", err);
            return;
        }
    };

    let writer = AtomicFileWriter::new(PathBuf::from(state_dir));
    if let Err(err) = writer.write(STATE_FILENAME, &content) {
        engine_error!(
            "Failed to write feature state to {:?}: {}",
            state_dir,
            err
        );
    }
}

#[cfg(test)]
mod tests {
    use super::{load_features, save_features, STATE_FILENAME};
    use mptools_core::FeatureFlags;
    use tempfile::TempDir;

    #[test]
    fn flags_survive_a_restart() {
        let temp = TempDir::new().unwrap();
        let flags = FeatureFlags {
            auto_advance: true,
            sanitizer: false,
            selection_unlock: true,
        };
        save_features(temp.path(), flags);
        assert_eq!(load_features(temp.path()), flags);
    }

    #[test]
    fn missing_or_garbled_state_means_all_off() {
        let temp = TempDir::new().unwrap();
        assert_eq!(load_features(temp.path()), FeatureFlags::default());

        std::fs::write(temp.path().join(STATE_FILENAME), "not ron at all {").unwrap();
        assert_eq!(load_features(temp.path()), FeatureFlags::default());
    }

    #[test]
    fn missing_fields_default_to_off() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join(STATE_FILENAME), "(sanitizer: true)").unwrap();
        assert_eq!(
            load_features(temp.path()),
            FeatureFlags {
                sanitizer: true,
                ..FeatureFlags::default()
            }
        );
    }
}

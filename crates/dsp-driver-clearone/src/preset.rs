//! Stored configuration recall (`MCCF <id>`).

use crate::config::PresetConfig;
use std::collections::BTreeMap;

pub fn recall_command(preset_id: &str) -> String {
    format!("MCCF {}", preset_id)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preset {
    pub key: String,
    pub label: String,
    /// Device preset identifier
    pub preset: String,
}

/// Presets in key order; index 1 is the first key.
#[derive(Debug, Clone, Default)]
pub struct PresetList {
    presets: Vec<Preset>,
}

impl PresetList {
    pub fn from_config(config: &BTreeMap<String, PresetConfig>) -> Self {
        Self {
            presets: config
                .iter()
                .map(|(key, p)| Preset {
                    key: key.clone(),
                    label: if p.label.is_empty() {
                        key.clone()
                    } else {
                        p.label.clone()
                    },
                    preset: p.preset.trim().to_string(),
                })
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.presets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.presets.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Preset> {
        self.presets.iter()
    }

    /// 1-based lookup.
    pub fn by_index(&self, index: u16) -> Option<&Preset> {
        usize::from(index)
            .checked_sub(1)
            .and_then(|i| self.presets.get(i))
    }

    /// Match by key first, then case-insensitively by label.
    pub fn by_name(&self, name: &str) -> Option<&Preset> {
        self.presets
            .iter()
            .find(|p| p.key == name)
            .or_else(|| {
                self.presets
                    .iter()
                    .find(|p| p.label.eq_ignore_ascii_case(name))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn presets() -> PresetList {
        let config: BTreeMap<String, PresetConfig> = toml::from_str(
            r#"
            [a_day]
            label = "Day Mode"
            preset = "1"

            [b_night]
            label = "Night Mode"
            preset = " NIGHT "
            "#,
        )
        .unwrap();
        PresetList::from_config(&config)
    }

    #[test]
    fn test_index_is_one_based() {
        let list = presets();
        assert_eq!(list.len(), 2);
        assert!(list.by_index(0).is_none());
        assert_eq!(list.by_index(1).unwrap().key, "a_day");
        assert_eq!(list.by_index(2).unwrap().preset, "NIGHT");
        assert!(list.by_index(3).is_none());
    }

    #[test]
    fn test_name_lookup() {
        let list = presets();
        assert_eq!(list.by_name("b_night").unwrap().preset, "NIGHT");
        assert_eq!(list.by_name("day mode").unwrap().key, "a_day");
        assert!(list.by_name("evening").is_none());
    }

    #[test]
    fn test_recall_command() {
        assert_eq!(recall_command("3"), "MCCF 3");
    }
}

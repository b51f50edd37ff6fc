use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use tracing::info;

/// Hard cap on the resolved accessory list, bonus included.
pub const MAX_ACCESSORIES: usize = 4;

/// Form value meaning "the user declined a bonus accessory".
const BONUS_NONE_SENTINEL: &str = "none";

#[derive(Debug, Clone, Deserialize)]
struct AccessoryTablesFile {
    roles: AccessoryMapFile,
    personalities: AccessoryMapFile,
    pain_points: AccessoryMapFile,
}

#[derive(Debug, Clone, Deserialize)]
struct AccessoryMapFile {
    #[serde(default)]
    entries: Vec<AccessoryEntryFile>,
    default: String,
}

#[derive(Debug, Clone, Deserialize)]
struct AccessoryEntryFile {
    key: String,
    accessory: String,
}

/// One categorical lookup table. Keys are normalized (trimmed, lowercased) so that
/// form values match regardless of capitalization; unknown keys resolve to the
/// table's default accessory.
#[derive(Debug, Clone)]
pub struct AccessoryMap {
    entries: HashMap<String, String>,
    default_accessory: String,
}

fn normalize_key(key: &str) -> String {
    key.trim().to_lowercase()
}

impl AccessoryMap {
    fn from_pairs(pairs: &[(&str, &str)], default_accessory: &str) -> Self {
        let entries = pairs
            .iter()
            .map(|(key, accessory)| (normalize_key(key), accessory.to_string()))
            .collect();
        AccessoryMap {
            entries,
            default_accessory: default_accessory.to_string(),
        }
    }

    fn from_file(map: AccessoryMapFile) -> Self {
        let mut entries = HashMap::new();
        for entry in map.entries {
            let key = normalize_key(&entry.key);
            let accessory = entry.accessory.trim().to_string();
            if key.is_empty() || accessory.is_empty() {
                continue;
            }
            entries.insert(key, accessory);
        }
        AccessoryMap {
            entries,
            default_accessory: map.default.trim().to_string(),
        }
    }

    pub fn lookup(&self, key: &str) -> &str {
        self.entries
            .get(&normalize_key(key))
            .map(String::as_str)
            .unwrap_or(&self.default_accessory)
    }
}

/// The three independent mappings used to build the accessory list, in precedence
/// order: role, personality, pain point.
#[derive(Debug, Clone)]
pub struct AccessoryTables {
    pub roles: AccessoryMap,
    pub personalities: AccessoryMap,
    pub pain_points: AccessoryMap,
}

fn contains_ignore_case(list: &[String], candidate: &str) -> bool {
    let candidate = candidate.to_lowercase();
    list.iter().any(|entry| entry.to_lowercase() == candidate)
}

fn push_unique(list: &mut Vec<String>, candidate: &str) {
    let candidate = candidate.trim();
    if candidate.is_empty() || contains_ignore_case(list, candidate) {
        return;
    }
    list.push(candidate.to_string());
}

impl AccessoryTables {
    /// Loads the tables from a JSON file when present, otherwise falls back to the
    /// built-in tables. A broken file is reported and ignored rather than failing
    /// startup.
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            info!(
                "Accessory table config not found at {}; using built-in tables",
                path.display()
            );
            return Self::builtin();
        }

        let raw = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                info!(
                    "Failed to read accessory table config at {}: {}",
                    path.display(),
                    err
                );
                return Self::builtin();
            }
        };

        match Self::parse(&raw) {
            Ok(tables) => {
                info!("Loaded accessory tables from {}", path.display());
                tables
            }
            Err(err) => {
                info!(
                    "Failed to parse accessory table config at {}: {}",
                    path.display(),
                    err
                );
                Self::builtin()
            }
        }
    }

    fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        let parsed: AccessoryTablesFile = serde_json::from_str(raw)?;
        Ok(AccessoryTables {
            roles: AccessoryMap::from_file(parsed.roles),
            personalities: AccessoryMap::from_file(parsed.personalities),
            pain_points: AccessoryMap::from_file(parsed.pain_points),
        })
    }

    pub fn builtin() -> Self {
        AccessoryTables {
            roles: AccessoryMap::from_pairs(
                &[
                    ("Grant Writer", "stack of grant applications"),
                    ("Development Director", "donor pipeline whiteboard"),
                    ("Volunteer Coordinator", "clipboard of sign-up sheets"),
                    ("Database Admin", "tangle of ethernet cables"),
                    ("Executive Director", "overflowing briefcase"),
                    ("Marketing Manager", "megaphone"),
                ],
                "well-worn laptop",
            ),
            personalities: AccessoryMap::from_pairs(
                &[
                    ("Micromanager", "magnifying glass"),
                    ("Spreadsheet Wizard", "enchanted pivot table"),
                    ("People Person", "rolodex of business cards"),
                    ("Data Skeptic", "bundle of red flags"),
                    ("Process Optimizer", "flowchart scroll"),
                ],
                "coffee mug",
            ),
            pain_points: AccessoryMap::from_pairs(
                &[
                    ("Data entry takes forever", "keyboard with tired hands"),
                    ("Duplicate records everywhere", "pair of identical contact cards"),
                    ("Reports never match", "two dashboards with different numbers"),
                    ("Emails go to spam", "envelope with warning label"),
                    ("Donors keep lapsing", "calendar with missed reminders"),
                ],
                "overflowing inbox tray",
            ),
        }
    }

    /// Builds the ordered accessory list for one submission. Pure: the same inputs
    /// always produce the same output. Lookups never fail (unknown categories map to
    /// each table's default), duplicates are dropped case-insensitively, and the bonus
    /// accessory is only kept when it is non-empty, not the "none" sentinel, and not
    /// already present.
    pub fn resolve(
        &self,
        role: &str,
        personality: &str,
        pain_point: &str,
        bonus_accessory: &str,
    ) -> Vec<String> {
        let mut accessories = Vec::with_capacity(MAX_ACCESSORIES);
        push_unique(&mut accessories, self.roles.lookup(role));
        push_unique(&mut accessories, self.personalities.lookup(personality));
        push_unique(&mut accessories, self.pain_points.lookup(pain_point));

        let bonus = bonus_accessory.trim();
        if !bonus.is_empty() && !bonus.eq_ignore_ascii_case(BONUS_NONE_SENTINEL) {
            push_unique(&mut accessories, bonus);
        }

        accessories.truncate(MAX_ACCESSORIES);
        accessories
    }
}

/// Joins accessories for prompt text: "a, b and c".
pub fn format_accessory_list(accessories: &[String]) -> String {
    match accessories {
        [] => String::new(),
        [only] => only.clone(),
        [head @ .., last] => format!("{} and {}", head.join(", "), last),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_known_categories_in_precedence_order() {
        let tables = AccessoryTables::builtin();
        let accessories = tables.resolve(
            "Grant Writer",
            "Micromanager",
            "Data entry takes forever",
            "",
        );
        assert_eq!(
            accessories,
            vec![
                "stack of grant applications",
                "magnifying glass",
                "keyboard with tired hands",
            ]
        );
    }

    #[test]
    fn unknown_categories_fall_back_to_table_defaults() {
        let tables = AccessoryTables::builtin();
        let accessories = tables.resolve("Astronaut", "Chaotic", "Gravity is broken", "");
        assert_eq!(
            accessories,
            vec!["well-worn laptop", "coffee mug", "overflowing inbox tray"]
        );
    }

    #[test]
    fn lookup_is_case_insensitive_and_trimmed() {
        let tables = AccessoryTables::builtin();
        assert_eq!(
            tables.roles.lookup("  grant writer "),
            "stack of grant applications"
        );
    }

    #[test]
    fn bonus_accessory_is_appended_as_fourth_entry() {
        let tables = AccessoryTables::builtin();
        let accessories = tables.resolve(
            "Grant Writer",
            "Micromanager",
            "Reports never match",
            "rubber duck",
        );
        assert_eq!(accessories.len(), 4);
        assert_eq!(accessories[3], "rubber duck");
    }

    #[test]
    fn bonus_none_sentinel_and_empty_are_excluded() {
        let tables = AccessoryTables::builtin();
        for bonus in ["", "   ", "none", "None", "NONE "] {
            let accessories =
                tables.resolve("Grant Writer", "Micromanager", "Reports never match", bonus);
            assert_eq!(accessories.len(), 3, "bonus {bonus:?} should be excluded");
        }
    }

    #[test]
    fn duplicate_bonus_is_dropped_case_insensitively() {
        let tables = AccessoryTables::builtin();
        let accessories = tables.resolve(
            "Grant Writer",
            "Micromanager",
            "Reports never match",
            "  Magnifying Glass ",
        );
        assert_eq!(accessories.len(), 3);
        assert!(!accessories
            .iter()
            .any(|a| a.eq_ignore_ascii_case("magnifying glass") && a != "magnifying glass"));
    }

    #[test]
    fn shared_default_collapses_to_a_shorter_list() {
        // All three tables share one accessory, so later duplicates are dropped and
        // the list can be shorter than four even with a bonus present.
        let raw = r#"{
            "roles": { "entries": [], "default": "laptop" },
            "personalities": { "entries": [], "default": "Laptop" },
            "pain_points": { "entries": [], "default": "laptop" }
        }"#;
        let tables = AccessoryTables::parse(raw).expect("valid accessory config");
        let accessories = tables.resolve("x", "y", "z", "laptop");
        assert_eq!(accessories, vec!["laptop"]);
    }

    #[test]
    fn resolve_is_idempotent() {
        let tables = AccessoryTables::builtin();
        let first = tables.resolve("Grant Writer", "People Person", "Emails go to spam", "cape");
        let second = tables.resolve("Grant Writer", "People Person", "Emails go to spam", "cape");
        assert_eq!(first, second);
    }

    #[test]
    fn never_returns_more_than_four_entries() {
        let tables = AccessoryTables::builtin();
        for role in ["Grant Writer", "Database Admin", "Other"] {
            for personality in ["Micromanager", "Data Skeptic", "Other"] {
                for pain_point in ["Reports never match", "Donors keep lapsing", "Other"] {
                    let accessories = tables.resolve(role, personality, pain_point, "extra item");
                    assert!(accessories.len() <= MAX_ACCESSORIES);
                    for (index, entry) in accessories.iter().enumerate() {
                        assert!(
                            !contains_ignore_case(&accessories[..index], entry),
                            "duplicate entry {entry:?}"
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn file_tables_override_builtin_entries() {
        let raw = r#"{
            "roles": {
                "entries": [{ "key": "Grant Writer", "accessory": "fountain pen" }],
                "default": "laptop"
            },
            "personalities": { "entries": [], "default": "coffee mug" },
            "pain_points": { "entries": [], "default": "inbox tray" }
        }"#;
        let tables = AccessoryTables::parse(raw).expect("valid accessory config");
        assert_eq!(tables.roles.lookup("grant writer"), "fountain pen");
        assert_eq!(tables.roles.lookup("Unknown Role"), "laptop");
    }

    #[test]
    fn formats_accessory_list_for_prompts() {
        let accessories = vec![
            "magnifying glass".to_string(),
            "coffee mug".to_string(),
            "rubber duck".to_string(),
        ];
        assert_eq!(
            format_accessory_list(&accessories),
            "magnifying glass, coffee mug and rubber duck"
        );
        assert_eq!(format_accessory_list(&accessories[..1]), "magnifying glass");
        assert_eq!(format_accessory_list(&[]), "");
    }
}

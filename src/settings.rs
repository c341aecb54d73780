//! Feature toggles persisted in the `SETTINGS` section.
//!
//! Defaults are seeded with explanatory comments on first run; afterwards the
//! values are consumed as opaque branch inputs.

use crate::store::{MappingStore, SECTION_SETTINGS, SECTION_VERSION};

/// Boolean toggles read once per load pass.
#[derive(Debug, Clone, Copy)]
pub struct Settings {
    /// Zero out charge time on scrolls derived from concentration spells.
    pub mod_charge_time: bool,
    /// Re-associate dataset-supplied scrolls with generated ones.
    pub integrate_external: bool,
    /// Raise external scrolls' effect stats to at least the source spell's.
    pub apply_mismatch_fix: bool,
    /// Record 10x bulk crafting recipes alongside the single ones.
    pub bulk_recipes: bool,
}

impl Settings {
    /// Seed missing keys with defaults and comments, then read the lot.
    /// Seeding is idempotent: present keys are left untouched.
    pub fn verify_and_load(store: &mut MappingStore) -> Self {
        tracing::info!("validating configuration");

        if !store.has(SECTION_VERSION, "Version") {
            store.set_long(SECTION_VERSION, "Version", 0, None);
        }

        let defaults: [(&str, bool, &str); 4] = [
            (
                "ModChargeTime",
                true,
                "# If true, scrolls derived from concentration spells charge instantly.",
            ),
            (
                "IntegrateExternalScrolls",
                true,
                "# If true, scrolls supplied by datasets supersede generated ones.",
            ),
            (
                "ApplyMismatchFix",
                true,
                "# If true, external scroll effects are raised to match their source spell.",
            ),
            (
                "GenerateBulkRecipes",
                false,
                "# If true, records recipes crafting 10 scrolls at a time.",
            ),
        ];
        for (key, value, comment) in defaults {
            if !store.has(SECTION_SETTINGS, key) {
                store.set_bool(SECTION_SETTINGS, key, value, Some(comment));
            }
        }

        Self {
            mod_charge_time: store.get_bool(SECTION_SETTINGS, "ModChargeTime"),
            integrate_external: store.get_bool(SECTION_SETTINGS, "IntegrateExternalScrolls"),
            apply_mismatch_fix: store.get_bool(SECTION_SETTINGS, "ApplyMismatchFix"),
            bulk_recipes: store.get_bool(SECTION_SETTINGS, "GenerateBulkRecipes"),
        }
    }
}

impl Default for Settings {
    /// Matches the values seeded on first run.
    fn default() -> Self {
        Self {
            mod_charge_time: true,
            integrate_external: true,
            apply_mismatch_fix: true,
            bulk_recipes: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeds_defaults_once() {
        let mut store = MappingStore::new();
        let settings = Settings::verify_and_load(&mut store);
        assert!(settings.mod_charge_time);
        assert!(settings.integrate_external);
        assert!(settings.apply_mismatch_fix);
        assert!(!settings.bulk_recipes);
        assert!(store.has(SECTION_VERSION, "Version"));
    }

    #[test]
    fn respects_user_overrides() {
        let mut store = MappingStore::new();
        store.set_bool(SECTION_SETTINGS, "IntegrateExternalScrolls", false, None);
        let settings = Settings::verify_and_load(&mut store);
        assert!(!settings.integrate_external);
        // Other keys still seeded.
        assert!(settings.mod_charge_time);
    }

    #[test]
    fn seeding_is_idempotent() {
        let mut store = MappingStore::new();
        Settings::verify_and_load(&mut store);
        let first = store.render();
        Settings::verify_and_load(&mut store);
        assert_eq!(store.render(), first);
    }
}

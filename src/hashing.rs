//! Content hashing: re-associating derived entities with their sources.
//!
//! When a dataset supplies its own scroll for a spell this engine previously
//! generated one for, the only link between them is content: the display name
//! or the effect set. The [`ContentHashIndex`] maps a name hash and an
//! effect-signature hash to the source spell so the integration pass can find
//! the match without any persisted identifier.

use std::collections::BTreeMap;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::LazyLock;

use regex::Regex;

use crate::world::{Effect, EntityId};

/// Prefix given to every generated scroll's display name.
pub const SCROLL_NAME_PREFIX: &str = "Scroll of ";

/// Suffix appended to names of scrolls derived from concentration spells.
pub const CONCENTRATION_SUFFIX: &str = " - Concentration";

static RE_SCROLL_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bScroll\s+of\s+([^()\-]+)").unwrap()
});

/// Hash of a display name.
pub fn name_hash(name: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    name.hash(&mut hasher);
    hasher.finish()
}

/// Order-insensitive signature over a capability's effect set, folded from
/// the base-effect identities.
pub fn effect_signature_hash(effects: &[Effect]) -> u64 {
    let mut signature = 0u64;
    for effect in effects {
        let mut hasher = DefaultHasher::new();
        effect.base_id.hash(&mut hasher);
        signature ^= hasher.finish() << 1;
    }
    signature
}

/// Extract the base spell name from a scroll display name: the text after
/// "Scroll of " up to an open parenthesis or dash. `None` when the name does
/// not follow the generated pattern.
pub fn extract_spell_name(name: &str) -> Option<String> {
    RE_SCROLL_NAME
        .captures(name)
        .map(|caps| caps[1].trim().to_string())
}

/// Hash → source spell index. First insertion wins: an alias between two
/// sources sharing a name or effect set resolves to whichever registered
/// first, and registration order is deterministic per load.
#[derive(Debug, Clone, Default)]
pub struct ContentHashIndex {
    by_hash: BTreeMap<u64, EntityId>,
}

impl ContentHashIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a spell under both its name hash and its effect-signature
    /// hash.
    pub fn register(&mut self, spell: EntityId, name: &str, effects: &[Effect]) {
        self.by_hash.entry(name_hash(name)).or_insert(spell);
        self.by_hash
            .entry(effect_signature_hash(effects))
            .or_insert(spell);
    }

    /// Look up a source spell by raw hash.
    pub fn get(&self, hash: u64) -> Option<EntityId> {
        self.by_hash.get(&hash).copied()
    }

    /// Find the source spell for an external scroll: by name hash when the
    /// display name follows the generated pattern, falling back to the
    /// effect signature either way. Scrolls with free-form names still bind
    /// through their effect set.
    pub fn match_scroll(&self, scroll_name: &str, effects: &[Effect]) -> Option<EntityId> {
        extract_spell_name(scroll_name)
            .and_then(|base_name| self.get(name_hash(&base_name)))
            .or_else(|| self.get(effect_signature_hash(effects)))
    }

    pub fn len(&self) -> usize {
        self.by_hash.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_hash.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn effect(base_id: u32) -> Effect {
        Effect {
            base_id,
            cost: 10.0,
            magnitude: 1.0,
            area: 0,
            duration: 0,
            min_skill: 0,
            hostile: false,
            keywords: Vec::new(),
        }
    }

    #[test]
    fn extract_plain_name() {
        assert_eq!(
            extract_spell_name("Scroll of Firebolt").as_deref(),
            Some("Firebolt")
        );
    }

    #[test]
    fn extract_stops_at_parenthesis_and_dash() {
        assert_eq!(
            extract_spell_name("Scroll of Firebolt (improved)").as_deref(),
            Some("Firebolt")
        );
        assert_eq!(
            extract_spell_name("Scroll of Firebolt - Concentration").as_deref(),
            Some("Firebolt")
        );
    }

    #[test]
    fn extract_rejects_foreign_names() {
        assert_eq!(extract_spell_name("Tome of Fire"), None);
    }

    #[test]
    fn effect_signature_is_order_insensitive() {
        let a = [effect(1), effect(2)];
        let b = [effect(2), effect(1)];
        assert_eq!(effect_signature_hash(&a), effect_signature_hash(&b));
        assert_ne!(effect_signature_hash(&a), effect_signature_hash(&[effect(3)]));
    }

    #[test]
    fn first_insertion_wins_on_alias() {
        let mut index = ContentHashIndex::new();
        let shared = [effect(7)];
        index.register(EntityId(1), "Firebolt", &shared);
        index.register(EntityId(2), "Flames", &shared);

        // Both names resolve to their own spell...
        assert_eq!(index.get(name_hash("Firebolt")), Some(EntityId(1)));
        assert_eq!(index.get(name_hash("Flames")), Some(EntityId(2)));
        // ...but the shared effect signature stays with the first.
        assert_eq!(index.get(effect_signature_hash(&shared)), Some(EntityId(1)));
    }

    #[test]
    fn match_scroll_prefers_name_over_signature() {
        let mut index = ContentHashIndex::new();
        index.register(EntityId(1), "Firebolt", &[effect(1)]);
        index.register(EntityId(2), "Frostbite", &[effect(2)]);

        assert_eq!(
            index.match_scroll("Scroll of Frostbite", &[effect(1)]),
            Some(EntityId(2))
        );
        // Unknown name falls back to the effect signature.
        assert_eq!(
            index.match_scroll("Scroll of Renamed Frost", &[effect(2)]),
            Some(EntityId(2))
        );
        // Neither matches.
        assert_eq!(index.match_scroll("Scroll of Unknown", &[effect(9)]), None);
    }

    #[test]
    fn match_scroll_falls_back_when_name_pattern_misses() {
        let mut index = ContentHashIndex::new();
        let effects = [effect(0x1CEA0)];
        index.register(EntityId(1), "Firebolt", &effects);

        // The name extracts nothing, so only the effect signature can bind.
        assert_eq!(
            index.match_scroll("Ancient Flame Parchment", &effects),
            Some(EntityId(1))
        );
        assert_eq!(index.match_scroll("Ancient Flame Parchment", &[effect(9)]), None);
    }
}

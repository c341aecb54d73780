//! Export types for serializing a completed load session.
//!
//! These types provide human-readable, name-resolved representations of the
//! derivation mappings, fusion results, and relocations suitable for JSON
//! export.

use serde::{Deserialize, Serialize};

use crate::session::{LoadSession, LoadStats, Recipe};
use crate::world::ContentWorld;

/// Exported book→spell→scroll derivation with resolved names.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DerivationExport {
    /// Source book handle.
    pub book_id: u32,
    /// Book display name.
    pub book_name: String,
    /// Taught spell handle.
    pub spell_id: u32,
    /// Spell display name.
    pub spell_name: String,
    /// Derived scroll handle.
    pub scroll_id: u32,
    /// Scroll display name.
    pub scroll_name: String,
    /// Persisted stable identifier, hex-formatted.
    pub stable_id: String,
    /// Monetary value of the scroll.
    pub value: u32,
    /// Tags on the scroll, debug-formatted.
    pub tags: Vec<String>,
}

/// Exported fusion result with resolved names.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FusionExport {
    /// Left operand handle.
    pub left_id: u32,
    /// Right operand handle.
    pub right_id: u32,
    /// Result scroll handle.
    pub result_id: u32,
    /// Result display name.
    pub result_name: String,
    /// Persisted stable identifier of the result, hex-formatted.
    pub stable_id: String,
}

/// Exported identifier relocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelocationExport {
    /// Superseded identifier, hex-formatted.
    pub from: String,
    /// Replacement identifier, hex-formatted.
    pub to: String,
}

/// Complete session export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionExport {
    pub derivations: Vec<DerivationExport>,
    pub fusions: Vec<FusionExport>,
    pub relocations: Vec<RelocationExport>,
    pub recipes: Vec<Recipe>,
    pub stats: LoadStats,
}

impl SessionExport {
    /// Snapshot a session against the world it was built over. Deterministic
    /// for a deterministic world: iteration follows the ordered caches.
    pub fn collect(session: &LoadSession, world: &impl ContentWorld) -> Self {
        let name_of = |id| {
            world
                .entity(id)
                .map(|e| e.name.clone())
                .unwrap_or_default()
        };

        let derivations = session
            .book_spell
            .iter()
            .filter_map(|(book, spell)| {
                let scroll = *session.spell_scroll.get_value_opt(spell)?;
                let entity = world.entity(scroll)?;
                Some(DerivationExport {
                    book_id: book.0,
                    book_name: name_of(*book),
                    spell_id: spell.0,
                    spell_name: name_of(*spell),
                    scroll_id: scroll.0,
                    scroll_name: entity.name.clone(),
                    stable_id: entity.stable_id.to_string(),
                    value: entity.value,
                    tags: entity.tags.iter().map(|t| format!("{t:?}")).collect(),
                })
            })
            .collect();

        let fusions = session
            .fusion
            .iter()
            .filter_map(|(pair, result)| {
                let entity = world.entity(*result)?;
                Some(FusionExport {
                    left_id: pair.0 .0,
                    right_id: pair.1 .0,
                    result_id: result.0,
                    result_name: entity.name.clone(),
                    stable_id: entity.stable_id.to_string(),
                })
            })
            .collect();

        let relocations = session
            .relocation
            .iter()
            .map(|(from, to)| RelocationExport {
                from: from.to_string(),
                to: to.to_string(),
            })
            .collect();

        Self {
            derivations,
            fusions,
            relocations,
            recipes: session.recipes.clone(),
            stats: session.stats,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::StableId;
    use crate::world::{Entity, EntityKind, MemoryWorld};

    #[test]
    fn collect_resolves_names_and_serializes() {
        let mut world = MemoryWorld::new();
        let mut session = LoadSession::new();

        let mut book = Entity::blank(EntityKind::Book);
        book.name = "Tome of Firebolt".into();
        let book = world.seed("core.esm", 0xA1, book);
        let spell = world.create(EntityKind::Spell).unwrap();
        world.entity_mut(spell).unwrap().name = "Firebolt".into();
        let scroll = world.create(EntityKind::Scroll).unwrap();
        {
            let entity = world.entity_mut(scroll).unwrap();
            entity.name = "Scroll of Firebolt".into();
            entity.value = 36;
        }
        world.set_stable(scroll, StableId(0xFF07_0001));

        session.book_spell.insert(book, spell);
        session.spell_scroll.insert(spell, scroll);
        session
            .relocation
            .insert(StableId(0xFF07_0002), StableId(0x0200_0001));

        let export = SessionExport::collect(&session, &world);
        assert_eq!(export.derivations.len(), 1);
        assert_eq!(export.derivations[0].book_name, "Tome of Firebolt");
        assert_eq!(export.derivations[0].stable_id, "0xFF070001");
        assert_eq!(export.relocations[0].from, "0xFF070002");

        let json = serde_json::to_string_pretty(&export).unwrap();
        assert!(json.contains("Scroll of Firebolt"));
    }
}

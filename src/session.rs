//! Per-load session context.
//!
//! [`LoadSession`] owns every cache the engine builds during one content load:
//! the bidirectional indexes, the content hash index, the identity allocator,
//! and the load statistics. A fresh session is constructed at the start of
//! each load and passed by reference through the pipeline, so no process-wide
//! mutable state exists. The persisted [`MappingStore`] is the only thing
//! that outlives the pass.

use std::collections::BTreeMap;

use crate::bimap::BiMap;
use crate::error::ForgeResult;
use crate::fusion;
use crate::hashing::ContentHashIndex;
use crate::ids::{IdAllocator, StableId};
use crate::integrate;
use crate::migrate;
use crate::pipeline;
use crate::settings::Settings;
use crate::store::MappingStore;
use crate::world::{ContentWorld, EntityId};

/// A recorded forward-construction recipe for a generated scroll.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Recipe {
    pub scroll: EntityId,
    pub spell: EntityId,
    /// Material cost of one crafting.
    pub base_cost: i32,
    /// Cost with the crafting discount applied.
    pub discounted_cost: i32,
    /// Number of scrolls produced per crafting.
    pub batch: u32,
}

/// Counters reported at the end of a load pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct LoadStats {
    /// Books processed into scrolls.
    pub generated: usize,
    /// Books skipped as ineligible.
    pub skipped: usize,
    /// External scrolls integrated over generated ones.
    pub integrated: usize,
    /// Fusion records restored from the store.
    pub fusions_restored: usize,
    /// Fusion records resolved only on the retry pass.
    pub fusions_deferred: usize,
    /// Persisted entries purged as unresolvable or invalid.
    pub purged: usize,
    /// Stale `SCROLLS` entries removed by cleanup.
    pub cleaned: usize,
}

/// All caches for one load pass. Rebuilt per load, single-threaded,
/// run-to-completion.
#[derive(Debug)]
pub struct LoadSession {
    /// Source book ↔ the spell it teaches.
    pub book_spell: BiMap<EntityId, EntityId>,
    /// Spell ↔ its derived scroll. The 1:1 source↔derived mapping.
    pub spell_scroll: BiMap<EntityId, EntityId>,
    /// Old stable identifier ↔ its replacement after external integration.
    /// Lookups are one hop only; no chains are ever formed.
    pub relocation: BiMap<StableId, StableId>,
    /// Ordered operand pair ↔ fusion result. Callers probe both orders.
    pub fusion: BiMap<(EntityId, EntityId), EntityId>,
    /// Name/effect-signature hashes → source spells.
    pub hash_index: ContentHashIndex,
    /// Effect keyword → spells carrying it; feeds upgrade candidates.
    pub keyword_spells: BTreeMap<String, Vec<EntityId>>,
    /// Memoized zero-cost spell copies.
    pub zero_cost: BTreeMap<EntityId, EntityId>,
    pub allocator: IdAllocator,
    pub settings: Settings,
    /// Forward-construction recipes recorded during generation.
    pub recipes: Vec<Recipe>,
    pub stats: LoadStats,
}

impl LoadSession {
    /// A fresh, empty session. Allocator and settings are placeholders until
    /// [`run_load_pass`](Self::run_load_pass) initializes them from the store.
    pub fn new() -> Self {
        Self {
            book_spell: BiMap::new(),
            spell_scroll: BiMap::new(),
            relocation: BiMap::new(),
            fusion: BiMap::new(),
            hash_index: ContentHashIndex::new(),
            keyword_spells: BTreeMap::new(),
            zero_cost: BTreeMap::new(),
            allocator: IdAllocator::disabled(),
            settings: Settings::default(),
            recipes: Vec::new(),
            stats: LoadStats::default(),
        }
    }

    /// Resolve an identifier through the relocation table, one hop deep.
    /// Every call site must pass identifiers through here before use.
    pub fn relocated(&self, id: StableId) -> StableId {
        self.relocation.get_value_opt(&id).copied().unwrap_or(id)
    }

    /// The original operand pair of a fused scroll, if `scroll` came out of
    /// the fusion engine this load.
    pub fn fusion_components(&self, scroll: EntityId) -> Option<(EntityId, EntityId)> {
        self.fusion.get_key_opt(&scroll).copied()
    }

    /// Run the whole load pass, in the fixed order the persisted state
    /// assumes: offset detection, settings, migrations, stale-entry cleanup,
    /// generation, external integration, fusion restoration.
    ///
    /// Offset detection precedes migration because the v3 migration step is
    /// gated on whether offset allocation is active.
    pub fn run_load_pass(
        &mut self,
        world: &mut impl ContentWorld,
        store: &mut MappingStore,
    ) -> ForgeResult<()> {
        self.allocator = IdAllocator::detect(store);
        self.settings = Settings::verify_and_load(store);
        migrate::run_migrations(self, world, store);
        migrate::clean_stale_entries(self, world, store);
        pipeline::generate_scrolls(self, world, store)?;
        if self.settings.integrate_external {
            integrate::integrate_external_scrolls(self, world);
        }
        fusion::restore_fusions(self, world, store);

        tracing::info!(
            generated = self.stats.generated,
            integrated = self.stats.integrated,
            fusions = self.stats.fusions_restored,
            purged = self.stats.purged,
            "load pass complete"
        );
        Ok(())
    }
}

impl Default for LoadSession {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relocation_is_single_hop() {
        let mut session = LoadSession::new();
        session
            .relocation
            .insert(StableId(0xFF07_0001), StableId(0x0200_0001));
        // Even if a second record forms a would-be chain, lookup stays one hop.
        session
            .relocation
            .insert(StableId(0x0200_0001), StableId(0x0300_0001));

        assert_eq!(session.relocated(StableId(0xFF07_0001)), StableId(0x0200_0001));
        assert_eq!(session.relocated(StableId(0x0400_0000)), StableId(0x0400_0000));
    }

    #[test]
    fn fusion_components_reverse_lookup() {
        let mut session = LoadSession::new();
        session
            .fusion
            .insert((EntityId(1), EntityId(2)), EntityId(9));
        assert_eq!(
            session.fusion_components(EntityId(9)),
            Some((EntityId(1), EntityId(2)))
        );
        assert_eq!(session.fusion_components(EntityId(1)), None);
    }
}

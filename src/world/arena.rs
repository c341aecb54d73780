//! In-memory content world.
//!
//! [`MemoryWorld`] is an arena-backed implementation of [`ContentWorld`] used
//! by the CLI demo and the test suite. Datasets are seeded up front; each gets
//! a load ordinal whose byte forms the high bits of its entities' stable
//! identifiers, so seeded identifiers land in the dataset-relative range and
//! runtime allocations stay above [`StableId::RUNTIME_BASE`].

use std::collections::BTreeMap;

use crate::error::FactoryError;
use crate::ids::StableId;
use crate::world::{ContentWorld, DatasetRef, Entity, EntityId, EntityKind};

/// Arena of entity records plus the indexes the engine contract requires.
#[derive(Debug)]
pub struct MemoryWorld {
    entities: Vec<Entity>,
    stable_index: BTreeMap<StableId, EntityId>,
    dataset_index: BTreeMap<(String, u32), EntityId>,
    datasets: Vec<String>,
    published: Vec<EntityId>,
    /// Next provisional identifier the factory hands out, counting down from
    /// just below the allocator's offset range.
    next_provisional: u32,
    /// Kinds the factory refuses to produce; a test knob for the
    /// factory-unavailable path.
    refuse_kinds: Vec<EntityKind>,
}

impl Default for MemoryWorld {
    fn default() -> Self {
        Self {
            entities: Vec::new(),
            stable_index: BTreeMap::new(),
            dataset_index: BTreeMap::new(),
            datasets: Vec::new(),
            published: Vec::new(),
            next_provisional: 0xFF06_FFFF,
            refuse_kinds: Vec::new(),
        }
    }
}

impl MemoryWorld {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a dataset and return its ordinal. Idempotent per name.
    pub fn add_dataset(&mut self, name: &str) -> u32 {
        if let Some(pos) = self.datasets.iter().position(|d| d == name) {
            return pos as u32;
        }
        self.datasets.push(name.to_string());
        (self.datasets.len() - 1) as u32
    }

    /// Seed a dataset-originated entity. Its stable identifier is the dataset
    /// ordinal (plus one) in the high byte combined with the local ordinal,
    /// which keeps it below [`StableId::RUNTIME_BASE`]. The entity is
    /// published immediately, as dataset content is visible from the start.
    pub fn seed(&mut self, dataset: &str, local_id: u32, mut entity: Entity) -> EntityId {
        let ordinal = self.add_dataset(dataset);
        let stable = StableId(((ordinal + 1) << 24) | (local_id & 0x00FF_FFFF));
        entity.stable_id = stable;
        entity.origin = Some(DatasetRef {
            dataset: dataset.to_string(),
            local_id,
        });

        let id = EntityId(self.entities.len() as u32);
        self.entities.push(entity);
        self.stable_index.insert(stable, id);
        self.dataset_index
            .insert((dataset.to_string(), local_id), id);
        self.published.push(id);
        id
    }

    /// Make the factory refuse a kind (test knob).
    pub fn refuse(&mut self, kind: EntityKind) {
        if !self.refuse_kinds.contains(&kind) {
            self.refuse_kinds.push(kind);
        }
    }

    /// Total number of entity slots, published or not.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

impl ContentWorld for MemoryWorld {
    fn create(&mut self, kind: EntityKind) -> Result<EntityId, FactoryError> {
        if self.refuse_kinds.contains(&kind) {
            return Err(FactoryError::Unavailable {
                kind: kind.to_string(),
            });
        }
        let id = EntityId(self.entities.len() as u32);
        let mut entity = Entity::blank(kind);
        // Every live entity carries an identifier so collision handling can
        // always swap instead of orphaning the displaced party.
        entity.stable_id = StableId(self.next_provisional);
        self.stable_index.insert(entity.stable_id, id);
        self.next_provisional -= 1;
        self.entities.push(entity);
        Ok(id)
    }

    fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(id.0 as usize)
    }

    fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(id.0 as usize)
    }

    fn by_stable(&self, stable: StableId) -> Option<EntityId> {
        if stable.is_null() {
            return None;
        }
        self.stable_index.get(&stable).copied()
    }

    fn set_stable(&mut self, id: EntityId, stable: StableId) {
        let Some(entity) = self.entities.get_mut(id.0 as usize) else {
            return;
        };
        let old = entity.stable_id;
        entity.stable_id = stable;
        if !old.is_null() {
            self.stable_index.remove(&old);
        }
        if !stable.is_null() {
            self.stable_index.insert(stable, id);
        }
    }

    fn swap_stable(&mut self, a: EntityId, b: EntityId) {
        let (Some(ea), Some(eb)) = (
            self.entities.get(a.0 as usize),
            self.entities.get(b.0 as usize),
        ) else {
            return;
        };
        let (sa, sb) = (ea.stable_id, eb.stable_id);
        self.set_stable(a, StableId::NULL);
        self.set_stable(b, sa);
        self.set_stable(a, sb);
    }

    fn resolve(&self, dataset: &str, local_id: u32) -> Option<EntityId> {
        self.dataset_index
            .get(&(dataset.to_string(), local_id))
            .copied()
    }

    fn locate(&self, id: EntityId) -> Option<DatasetRef> {
        self.entity(id)?.origin.clone()
    }

    fn has_dataset(&self, dataset: &str) -> bool {
        self.datasets.iter().any(|d| d == dataset)
    }

    fn books(&self) -> Vec<EntityId> {
        self.published
            .iter()
            .copied()
            .filter(|id| {
                self.entity(*id)
                    .is_some_and(|e| e.kind == EntityKind::Book)
            })
            .collect()
    }

    fn scrolls(&self) -> Vec<EntityId> {
        self.published
            .iter()
            .copied()
            .filter(|id| {
                self.entity(*id)
                    .is_some_and(|e| e.kind == EntityKind::Scroll)
            })
            .collect()
    }

    fn publish(&mut self, ids: &[EntityId]) {
        for id in ids {
            if !self.published.contains(id) {
                self.published.push(*id);
            }
        }
    }
}

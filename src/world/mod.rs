//! Entity model and the content-world collaborator contract.
//!
//! Entities are never owned by the engine — they live in a content world (the
//! game's dataset arena) and are referenced through [`EntityId`] handles.
//! Equality and hashing go through the handle, not through object addresses,
//! so cache keys stay valid regardless of where entity records move.
//!
//! [`ContentWorld`] is the seam to the host: it combines the content factory
//! (`create`), the stable-identifier index, and the dataset locator resolver.
//! [`MemoryWorld`](arena::MemoryWorld) is a first-class in-memory
//! implementation used by the CLI demo and the test suite.

pub mod arena;

use serde::{Deserialize, Serialize};

use crate::error::FactoryError;
use crate::ids::StableId;

pub use arena::MemoryWorld;

/// Opaque, comparable, hashable handle to an entity slot in the content world.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[repr(transparent)]
pub struct EntityId(pub u32);

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ent:{}", self.0)
    }
}

/// Kinds of entity this engine touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityKind {
    /// A source entity that teaches a spell.
    Book,
    /// A capability definition: effects, casting kind, delivery, cost.
    Spell,
    /// A derived entity generated from a spell (or fused from two scrolls).
    Scroll,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityKind::Book => write!(f, "Book"),
            EntityKind::Spell => write!(f, "Spell"),
            EntityKind::Scroll => write!(f, "Scroll"),
        }
    }
}

/// How a capability is cast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CastingKind {
    FireAndForget,
    /// Sustained casting; doubles generation cost and marks fused names.
    Concentration,
    /// Always-on; never eligible for derivation.
    ConstantEffect,
}

/// How a capability reaches its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Delivery {
    SelfCast,
    Touch,
    Aimed,
    TargetActor,
    TargetLocation,
}

/// Magic school, used only as an opaque tag on derived scrolls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum School {
    Alteration,
    Conjuration,
    Destruction,
    Illusion,
    Restoration,
}

/// Difficulty tier derived from the approximate spell level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Tier {
    Novice,
    Apprentice,
    Adept,
    Expert,
    Master,
    /// Rank could not be determined from the source spell.
    Strange,
}

/// Opaque keyword tags carried by entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Tag {
    /// Scroll supplied by a dataset (vendor item).
    Vendor,
    /// Scroll generated by this engine.
    Generated,
    /// Result of one fusion.
    Fused,
    /// Result of fusing two already-fused scrolls. Hard cap.
    DoubleFused,
    /// Derived from a concentration-cast spell.
    Concentration,
    School(School),
    Tier(Tier),
}

/// One effect of a capability's effect set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Effect {
    /// Identity of the base effect archetype; drives the signature hash.
    pub base_id: u32,
    /// Base casting cost contribution.
    pub cost: f32,
    pub magnitude: f32,
    pub area: u32,
    pub duration: u32,
    /// Minimum skill level of the base effect.
    pub min_skill: u32,
    pub hostile: bool,
    /// Keywords on the base effect; the first two participate in
    /// upgrade-candidate matching.
    pub keywords: Vec<String>,
}

/// Where an entity came from: its dataset name and local ordinal. Stable
/// across sessions even when the in-memory identifier is renumbered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetRef {
    pub dataset: String,
    pub local_id: u32,
}

/// An entity record. Field access goes through [`ContentWorld`]; the engine
/// mutates only identifiers, names, weights, values, effects, and tags.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub kind: EntityKind,
    pub name: String,
    pub stable_id: StableId,
    /// `None` for entities created at runtime.
    pub origin: Option<DatasetRef>,
    pub weight: f32,
    pub value: u32,
    pub effects: Vec<Effect>,
    pub tags: Vec<Tag>,
    pub casting: CastingKind,
    pub delivery: Delivery,
    /// Fixed casting cost; derivation requires it to be non-trivial (> 5).
    pub cost_override: i32,
    /// Rank 1–5 of the teaching perk chain; 0 when unknown.
    pub rank: u8,
    /// Seconds of charge-up before release.
    pub charge_time: f32,
    /// For books: the spell this book teaches.
    pub teaches: Option<EntityId>,
    /// For spells: the school used for tagging derived scrolls.
    pub school: Option<School>,
}

impl Entity {
    /// A blank entity of the given kind, as the factory produces it.
    pub fn blank(kind: EntityKind) -> Self {
        Self {
            kind,
            name: String::new(),
            stable_id: StableId::NULL,
            origin: None,
            weight: 0.0,
            value: 0,
            effects: Vec::new(),
            tags: Vec::new(),
            casting: CastingKind::FireAndForget,
            delivery: Delivery::Aimed,
            cost_override: 0,
            rank: 0,
            charge_time: 0.0,
            teaches: None,
            school: None,
        }
    }

    pub fn has_tag(&self, tag: Tag) -> bool {
        self.tags.contains(&tag)
    }

    /// Add a tag if not already present.
    pub fn add_tag(&mut self, tag: Tag) {
        if !self.tags.contains(&tag) {
            self.tags.push(tag);
        }
    }
}

/// The collaborator contract the engine requires from its host: content
/// factory, entity access, stable-identifier index, and dataset resolver.
pub trait ContentWorld {
    /// Manufacture a blank entity of `kind`. The factory may refuse a kind;
    /// the engine logs and skips, registering nothing partial.
    fn create(&mut self, kind: EntityKind) -> Result<EntityId, FactoryError>;

    fn entity(&self, id: EntityId) -> Option<&Entity>;
    fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity>;

    /// Look up the live entity currently holding `stable`.
    fn by_stable(&self, stable: StableId) -> Option<EntityId>;

    /// Assign a stable identifier, keeping the reverse index coherent.
    fn set_stable(&mut self, id: EntityId, stable: StableId);

    /// Exchange the stable identifiers of two live entities. Transactional:
    /// afterwards the two identifiers are exactly interchanged and no third
    /// entity is affected.
    fn swap_stable(&mut self, a: EntityId, b: EntityId);

    /// Resolve a dataset locator to a live entity, if that dataset is loaded
    /// and defines the ordinal.
    fn resolve(&self, dataset: &str, local_id: u32) -> Option<EntityId>;

    /// The inverse of [`resolve`](Self::resolve) for dataset-originated
    /// entities; `None` for runtime-created ones.
    fn locate(&self, id: EntityId) -> Option<DatasetRef>;

    /// Whether a dataset of this name is present in the current load.
    fn has_dataset(&self, dataset: &str) -> bool;

    /// All spell-teaching books visible this load, in dataset order.
    fn books(&self) -> Vec<EntityId>;

    /// All published scrolls visible this load, in dataset order.
    fn scrolls(&self) -> Vec<EntityId>;

    /// Bulk-insert freshly created entities into the surrounding content
    /// collection, making them visible to later passes.
    fn publish(&mut self, ids: &[EntityId]);
}

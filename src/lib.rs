//! # scrollforge
//!
//! An identity and derivation cache engine: derives scroll entities from
//! spell-teaching books at load time, persists a stable mapping between
//! sources and derived entities across runs, fuses pairs of derived scrolls
//! into further scrolls, and migrates its persisted mapping format between
//! schema versions.
//!
//! ## Architecture
//!
//! - **Caches** (`bimap`, `session`): strict 1:1 bidirectional maps plus the
//!   per-load [`session::LoadSession`] that owns every index
//! - **Identity** (`ids`): stable 32-bit identifiers, portable locators, and
//!   the offset-based allocator seeded from persisted data
//! - **Persistence** (`store`): the ordered, comment-preserving mapping file
//! - **Derivation** (`pipeline`, `fusion`, `integrate`): generation from
//!   books, memoized fusion with two-pass restoration, external-scroll
//!   integration with identifier relocation
//! - **Migration** (`migrate`): version-gated fixups of the persisted format
//! - **Host seam** (`world`): the [`world::ContentWorld`] collaborator
//!   contract, with [`world::MemoryWorld`] for the CLI and tests
//!
//! ## Library usage
//!
//! ```no_run
//! use scrollforge::session::LoadSession;
//! use scrollforge::store::MappingStore;
//! use scrollforge::world::{Entity, EntityKind, MemoryWorld};
//!
//! let mut world = MemoryWorld::new();
//! let spell = world.seed("core.esm", 0x100, Entity::blank(EntityKind::Spell));
//! let mut book = Entity::blank(EntityKind::Book);
//! book.teaches = Some(spell);
//! world.seed("core.esm", 0x200, book);
//!
//! let mut store = MappingStore::load("scrollforge.ini").unwrap();
//! let mut session = LoadSession::new();
//! session.run_load_pass(&mut world, &mut store).unwrap();
//! store.save().unwrap();
//! ```

pub mod bimap;
pub mod error;
pub mod export;
pub mod fusion;
pub mod hashing;
pub mod ids;
pub mod integrate;
pub mod migrate;
pub mod pipeline;
pub mod query;
pub mod session;
pub mod settings;
pub mod store;
pub mod world;

pub use error::{ForgeError, ForgeResult};
pub use ids::StableId;
pub use session::LoadSession;
pub use store::MappingStore;
pub use world::{ContentWorld, EntityId, MemoryWorld};

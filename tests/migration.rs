//! Migration tests: legacy mapping files upgrading across sessions.

use scrollforge::session::LoadSession;
use scrollforge::store::MappingStore;
use scrollforge::world::{
    CastingKind, ContentWorld, Delivery, Effect, Entity, EntityKind, MemoryWorld, School,
};
use scrollforge::StableId;

fn fire_effect() -> Effect {
    Effect {
        base_id: 0x1CEA0,
        cost: 120.0,
        magnitude: 60.0,
        area: 0,
        duration: 0,
        min_skill: 25,
        hostile: true,
        keywords: vec!["MagicDamageFire".to_string()],
    }
}

/// One tome in one dataset; enough for the key-rewrite path.
fn small_world() -> MemoryWorld {
    let mut world = MemoryWorld::new();
    let mut spell = Entity::blank(EntityKind::Spell);
    spell.name = "Firebolt".into();
    spell.rank = 2;
    spell.cost_override = 41;
    spell.casting = CastingKind::FireAndForget;
    spell.delivery = Delivery::Aimed;
    spell.school = Some(School::Destruction);
    spell.effects = vec![fire_effect()];
    let spell_id = world.seed("grimoire.esm", 0x100, spell);

    let mut book = Entity::blank(EntityKind::Book);
    book.name = "Tome: Firebolt".into();
    book.teaches = Some(spell_id);
    world.seed("grimoire.esm", 0x200, book);
    world
}

fn run_session(path: &std::path::Path) -> (MemoryWorld, LoadSession, MappingStore) {
    let mut world = small_world();
    let mut store = MappingStore::load(path).unwrap();
    let mut session = LoadSession::new();
    session.run_load_pass(&mut world, &mut store).unwrap();
    (world, session, store)
}

fn write_legacy_store(path: &std::path::Path) {
    let mut store = MappingStore::load(path).unwrap();
    store.set("LOADORDER", "0", "grimoire.esm", None);
    // Pre-v1 format: bare in-memory identifier as the key.
    store.set("SCROLLS", "0x01000200", "0x0E000005", None);
    store.set("SCROLLS", "0x7F000001", "0x0E000006", None);
    store.save().unwrap();
}

#[test]
fn legacy_store_migrates_to_composite_keys() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("mapping.ini");
    write_legacy_store(&path);

    let (world, session, store) = run_session(&path);

    // LOADORDER is gone, the resolvable key was rewritten, the dead one
    // dropped.
    assert!(!store.has_section("LOADORDER"));
    assert_eq!(
        store.get("SCROLLS", "grimoire.esm~0x00000200"),
        Some("0x0E000005")
    );
    assert!(!store.has("SCROLLS", "0x01000200"));
    assert!(!store.has("SCROLLS", "0x7F000001"));

    // Legacy identifier ranges disable offset allocation; the version stops
    // short of 3.
    assert!(!session.allocator.use_offset());
    assert_eq!(store.get_long("VERSION", "Version"), 1);

    // The derived scroll keeps its pre-migration identifier.
    let scroll = world.by_stable(StableId(0x0E00_0005)).unwrap();
    assert_eq!(world.entity(scroll).unwrap().name, "Scroll of Firebolt");
}

#[test]
fn legacy_migration_is_stable_across_sessions() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("mapping.ini");
    write_legacy_store(&path);

    let first = {
        let (_world, _session, store) = run_session(&path);
        store.save().unwrap();
        std::fs::read_to_string(&path).unwrap()
    };

    let (_world, session, store) = run_session(&path);
    store.save().unwrap();
    assert_eq!(std::fs::read_to_string(&path).unwrap(), first);
    // Still on the legacy allocator, still version 1. Nothing re-enables
    // offset mode until the data itself is upgraded.
    assert!(!session.allocator.use_offset());
    assert_eq!(store.get_long("VERSION", "Version"), 1);
}

#[test]
fn offset_range_data_floors_version_to_three() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("mapping.ini");
    {
        let mut store = MappingStore::load(&path).unwrap();
        store.set_long("VERSION", "Version", 1, None);
        store.set("SCROLLS", "grimoire.esm~0x00000200", "0xFF070001", None);
        store.save().unwrap();
    }

    let (world, session, store) = run_session(&path);
    assert!(session.allocator.use_offset());
    assert_eq!(store.get_long("VERSION", "Version"), 3);
    assert!(world.by_stable(StableId(0xFF07_0001)).is_some());
}

#[test]
fn fresh_store_starts_at_version_three() {
    let dir = tempfile::TempDir::new().unwrap();
    let (_world, session, store) = run_session(&dir.path().join("mapping.ini"));
    assert!(session.allocator.use_offset());
    assert_eq!(store.get_long("VERSION", "Version"), 3);
}

#[test]
fn future_schema_version_skips_migrations_but_loads() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("mapping.ini");
    {
        let mut store = MappingStore::load(&path).unwrap();
        store.set_long("VERSION", "Version", 9, None);
        store.save().unwrap();
    }

    let (world, session, store) = run_session(&path);

    // The version is left for the newer build that wrote it, and the rest of
    // the pass still runs.
    assert_eq!(store.get_long("VERSION", "Version"), 9);
    assert_eq!(session.stats.generated, 1);
    // An empty SCROLLS section still means offset allocation; the scroll got
    // the first runtime identifier.
    let scroll = world.by_stable(StableId(0xFF07_0001)).unwrap();
    assert_eq!(world.entity(scroll).unwrap().name, "Scroll of Firebolt");
}

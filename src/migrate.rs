//! Version-gated migration of the persisted mapping, plus stale-entry
//! cleanup.
//!
//! Each migration step runs at most once and bumps the stored version, so the
//! sequence is idempotent across loads. The step to version 3 is gated on
//! offset allocation being active: legacy stores that disabled it stay on
//! their old version until their data is upgraded out-of-band.

use std::collections::BTreeMap;

use crate::ids::StableId;
use crate::session::LoadSession;
use crate::store::{MappingStore, SECTION_SCROLLS, SECTION_VERSION};
use crate::world::ContentWorld;

/// Current schema version of the persisted mapping.
pub const SCHEMA_VERSION: i64 = 3;

/// Section dropped by the v1 migration; load-order tracking moved into the
/// composite keys themselves.
const SECTION_LOADORDER: &str = "LOADORDER";

/// Rewrite pre-v1 `SCROLLS` keys from bare identifiers to composite dataset
/// locators. Entries whose identifier no longer resolves to a live entity are
/// deleted; they cannot be carried forward.
fn rewrite_legacy_keys(
    session: &mut LoadSession,
    world: &mut impl ContentWorld,
    store: &mut MappingStore,
) {
    tracing::info!("migrating legacy identifier keys");

    for (key, value) in store.all_pairs(SECTION_SCROLLS) {
        if key.contains('~') {
            continue;
        }

        let resolved = StableId::parse_hex(&key)
            .ok()
            .filter(|id| !id.is_null())
            .and_then(|id| world.by_stable(id));
        let Some(book) = resolved else {
            tracing::info!(key, "unresolvable legacy entry; deleting");
            store.delete(SECTION_SCROLLS, &key);
            session.stats.purged += 1;
            continue;
        };
        let Some(origin) = world.locate(book) else {
            tracing::info!(key, "legacy entry has no dataset origin; deleting");
            store.delete(SECTION_SCROLLS, &key);
            session.stats.purged += 1;
            continue;
        };

        let new_key = format!("{}~0x{:08X}", origin.dataset, origin.local_id);
        tracing::info!(from = key, to = new_key, "rewriting key");
        store.delete(SECTION_SCROLLS, &key);
        let name = world
            .entity(book)
            .map(|e| e.name.clone())
            .unwrap_or_default();
        store.set(SECTION_SCROLLS, &new_key, &value, Some(&format!("# {name}")));
    }
}

/// Run all pending migration steps. A store written by a newer schema has no
/// applicable steps; it is left untouched and the rest of the pass proceeds.
pub fn run_migrations(
    session: &mut LoadSession,
    world: &mut impl ContentWorld,
    store: &mut MappingStore,
) {
    let mut version = store.get_long(SECTION_VERSION, "Version");
    if version == SCHEMA_VERSION {
        return;
    }
    if version > SCHEMA_VERSION {
        tracing::warn!(
            found = version,
            supported = SCHEMA_VERSION,
            "mapping store written by a newer schema; skipping migrations"
        );
        return;
    }

    tracing::info!(from = version, to = SCHEMA_VERSION, "updating mapping store");

    if version < 1 {
        if store.has_section(SECTION_LOADORDER) {
            store.delete_section(SECTION_LOADORDER);
        }
        rewrite_legacy_keys(session, world, store);
        version += 1;
    }

    if version < 3 {
        if session.allocator.use_offset() {
            version += 1;
        } else {
            tracing::info!("cannot auto-migrate identifiers to v3");
        }
    }

    store.set_long(SECTION_VERSION, "Version", version, None);
}

/// Remove `SCROLLS` entries that can no longer resolve: keys without the
/// composite format and keys naming a dataset absent from this load.
pub fn clean_stale_entries(
    session: &mut LoadSession,
    world: &mut impl ContentWorld,
    store: &mut MappingStore,
) {
    tracing::info!("sanitizing persisted entries");
    let mut known: BTreeMap<String, bool> = BTreeMap::new();

    for (key, _value) in store.all_pairs(SECTION_SCROLLS) {
        match key.split_once('~') {
            Some((dataset, _)) => {
                let present = *known
                    .entry(dataset.to_string())
                    .or_insert_with(|| world.has_dataset(dataset));
                if present {
                    continue;
                }
                tracing::info!(key, "dataset missing; removing entry");
            }
            None => {
                tracing::info!(key, "invalid key format; removing entry");
            }
        }
        store.delete(SECTION_SCROLLS, &key);
        session.stats.cleaned += 1;
    }
}

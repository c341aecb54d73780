//! Fusion engine: combining two derived scrolls into a third.
//!
//! Fusion is memoized and order-independent. Results persist in the `FUSION`
//! section keyed by the result identifier, with each operand written as a
//! portable locator. Restoration is a two-pass affair: records whose operands
//! cannot be resolved yet are deferred and retried exactly once, which is
//! sufficient because a fusion result can itself be fused again but never
//! appears as its own transitive input.

use crate::hashing::{extract_spell_name, CONCENTRATION_SUFFIX};
use crate::ids::{Locator, StableId};
use crate::pipeline::force_assign_stable;
use crate::session::LoadSession;
use crate::store::{MappingStore, SECTION_FUSION};
use crate::world::{CastingKind, ContentWorld, EntityId, EntityKind, Tag};

/// Display-name prefix of fused scrolls.
pub const FUSED_NAME_PREFIX: &str = "Fused Scroll of ";

/// Whether two scrolls may be fused.
///
/// Denies: absent operands, mismatched casting or delivery, a first-level
/// fuse when either operand is already fused, a double fuse unless both
/// operands are already fused, anything already double-fused, and fusions
/// whose memoized component sets share a member (an entity fused with a
/// derivative of itself).
pub fn can_fuse(
    session: &LoadSession,
    world: &impl ContentWorld,
    one: EntityId,
    two: EntityId,
    allow_double: bool,
) -> bool {
    if let (Some((a1, a2)), Some((b1, b2))) = (
        session.fusion_components(one),
        session.fusion_components(two),
    ) {
        if a1 == b1 || a1 == b2 || a2 == b1 || a2 == b2 {
            tracing::info!(%one, %two, "fusion denied: shared component");
            return false;
        }
    }

    let (Some(left), Some(right)) = (world.entity(one), world.entity(two)) else {
        return false;
    };
    if left.casting != right.casting || left.delivery != right.delivery {
        return false;
    }
    let left_fused = left.has_tag(Tag::Fused);
    let right_fused = right.has_tag(Tag::Fused);
    if !allow_double && (left_fused || right_fused) {
        return false;
    }
    if allow_double && left_fused != right_fused {
        return false;
    }
    if left.has_tag(Tag::DoubleFused) || right.has_tag(Tag::DoubleFused) {
        return false;
    }
    true
}

/// Memoized fusion constructor. Returns the cached result for either operand
/// order; on a miss, manufactures the merged scroll. Does not touch the
/// allocator or the store.
pub(crate) fn create_fused(
    session: &mut LoadSession,
    world: &mut impl ContentWorld,
    one: EntityId,
    two: EntityId,
) -> Option<EntityId> {
    {
        let (left, right) = (world.entity(one)?, world.entity(two)?);
        if left.casting != right.casting || left.delivery != right.delivery {
            return None;
        }
    }

    if let Some(cached) = session.fusion.get_value_opt(&(one, two)) {
        return Some(*cached);
    }
    if let Some(cached) = session.fusion.get_value_opt(&(two, one)) {
        return Some(*cached);
    }

    let left = world.entity(one)?.clone();
    let right = world.entity(two)?.clone();
    tracing::info!(left = %left.name, right = %right.name, "fusing");

    let result = match world.create(EntityKind::Scroll) {
        Ok(id) => id,
        Err(err) => {
            tracing::error!(error = %err, "factory refused fused scroll");
            return None;
        }
    };

    let mut name = format!(
        "{FUSED_NAME_PREFIX}{} & {}",
        extract_spell_name(&left.name).unwrap_or_else(|| left.name.clone()),
        extract_spell_name(&right.name).unwrap_or_else(|| right.name.clone()),
    );

    {
        let scroll = world
            .entity_mut(result)
            .expect("freshly created entity exists");
        scroll.effects.extend(left.effects.iter().cloned());
        scroll.effects.extend(right.effects.iter().cloned());
        for tag in left.tags.iter().chain(right.tags.iter()) {
            scroll.add_tag(*tag);
        }
        if scroll.has_tag(Tag::Fused) {
            scroll.add_tag(Tag::DoubleFused);
        } else {
            scroll.add_tag(Tag::Fused);
        }
        scroll.weight = left.weight + right.weight;
        scroll.value = left.value + right.value;
        scroll.casting = left.casting;
        scroll.delivery = left.delivery;
        scroll.cost_override = left.cost_override;
        scroll.charge_time = left.charge_time;
    }

    session.fusion.insert((one, two), result);

    let concentration_source = [one, two].iter().any(|operand| {
        session
            .spell_scroll
            .get_key_opt(operand)
            .and_then(|spell| world.entity(*spell))
            .is_some_and(|spell| spell.casting == CastingKind::Concentration)
    });
    if concentration_source {
        name.push_str(CONCENTRATION_SUFFIX);
        generate_companion_spell(session, world, result);
    }

    if let Some(scroll) = world.entity_mut(result) {
        scroll.name = name;
    }
    Some(result)
}

/// Manufacture the companion capability mirroring a fused scroll's effects.
/// A no-op if one is already registered for this scroll.
fn generate_companion_spell(
    session: &mut LoadSession,
    world: &mut impl ContentWorld,
    scroll_id: EntityId,
) {
    if session.spell_scroll.contains_value(&scroll_id) {
        return;
    }
    let Some(scroll) = world.entity(scroll_id).cloned() else {
        return;
    };
    let spell_id = match world.create(EntityKind::Spell) {
        Ok(id) => id,
        Err(err) => {
            tracing::error!(error = %err, "factory refused companion capability");
            return;
        }
    };
    if let Some(spell) = world.entity_mut(spell_id) {
        spell.name = scroll.name.clone();
        spell.effects = scroll.effects.clone();
        spell.casting = scroll.casting;
        spell.delivery = scroll.delivery;
        spell.cost_override = scroll.cost_override;
        spell.charge_time = scroll.charge_time;
    }
    world.publish(&[spell_id]);
    session.spell_scroll.insert(spell_id, scroll_id);
    tracing::info!(spell = %spell_id, scroll = %scroll_id, "created companion capability");
}

/// Portable locator for a fusion operand: the bare identifier when it lives in
/// the runtime range, the dataset composite otherwise. Relocations are
/// followed first so the record survives external integration.
fn operand_locator(
    session: &LoadSession,
    world: &impl ContentWorld,
    id: EntityId,
) -> Option<String> {
    let entity = world.entity(id)?;
    let stable = session.relocated(entity.stable_id);
    if stable.is_dataset_relative() {
        if let Some(origin) = world.locate(id) {
            return Some(
                Locator::Dataset {
                    dataset: origin.dataset,
                    local_id: origin.local_id,
                }
                .to_string(),
            );
        }
    }
    Some(Locator::Stable(stable).to_string())
}

/// Fuse two scrolls on request: memoized construction, allocator assignment,
/// persistence of the fusion record, and publication. `None` means "fusion
/// unavailable this call".
pub fn fuse(
    session: &mut LoadSession,
    world: &mut impl ContentWorld,
    store: &mut MappingStore,
    one: EntityId,
    two: EntityId,
) -> Option<EntityId> {
    let result = create_fused(session, world, one, two)?;

    if session.allocator.use_offset() {
        let next = session.allocator.next();
        world.set_stable(result, next);
    }

    let left = operand_locator(session, world, one)?;
    let right = operand_locator(session, world, two)?;
    let (stable, name) = {
        let entity = world.entity(result)?;
        (entity.stable_id, entity.name.clone())
    };
    store.set(
        SECTION_FUSION,
        &stable.to_string(),
        &format!("{left}+{right}"),
        Some(&format!("# {name}")),
    );

    world.publish(&[result]);
    Some(result)
}

struct PendingFusion {
    key: String,
    result: StableId,
    left: Locator,
    right: Locator,
}

/// Resolve a persisted operand locator to a live entity, consulting the
/// relocation table when the direct lookup misses.
fn resolve_operand(
    session: &LoadSession,
    world: &impl ContentWorld,
    locator: &Locator,
) -> Option<EntityId> {
    let (direct, raw) = match locator {
        Locator::Dataset { dataset, local_id } => {
            (world.resolve(dataset, *local_id), StableId(*local_id))
        }
        Locator::Stable(id) => (world.by_stable(*id), *id),
    };
    direct.or_else(|| {
        let relocated = session.relocation.get_value_opt(&raw)?;
        tracing::info!(from = %raw, to = %relocated, "found relocation");
        world.by_stable(*relocated)
    })
}

fn restore_one(
    session: &mut LoadSession,
    world: &mut impl ContentWorld,
    pending: &PendingFusion,
) -> Option<bool> {
    let left = resolve_operand(session, world, &pending.left);
    let right = resolve_operand(session, world, &pending.right);
    let (Some(left), Some(right)) = (left, right) else {
        return None;
    };

    match create_fused(session, world, left, right) {
        Some(result) => {
            tracing::info!(id = %pending.result, "forcing persisted identifier");
            force_assign_stable(world, result, pending.result);
            world.publish(&[result]);
            Some(true)
        }
        // Operands present but no longer fusable; the record is dead.
        None => Some(false),
    }
}

/// Restore persisted fusion records. First pass fuses whatever resolves and
/// defers the rest; the deferred list is retried exactly once, then leftovers
/// are purged from the store.
pub fn restore_fusions(
    session: &mut LoadSession,
    world: &mut impl ContentWorld,
    store: &mut MappingStore,
) {
    tracing::info!("restoring fusions");
    let records = store.all_pairs(SECTION_FUSION);
    let mut deferred: Vec<PendingFusion> = Vec::new();

    for (key, value) in records {
        let parsed = StableId::parse_hex(&key).ok().and_then(|result| {
            let (left, right) = value.split_once('+')?;
            Some(PendingFusion {
                key: key.clone(),
                result,
                left: Locator::parse(left).ok()?,
                right: Locator::parse(right).ok()?,
            })
        });
        let Some(pending) = parsed else {
            tracing::warn!(key, value, "invalid fusion record; purging");
            store.delete(SECTION_FUSION, &key);
            session.stats.purged += 1;
            continue;
        };

        match restore_one(session, world, &pending) {
            Some(true) => session.stats.fusions_restored += 1,
            Some(false) => {
                store.delete(SECTION_FUSION, &pending.key);
                session.stats.purged += 1;
            }
            None => {
                tracing::info!(key = %pending.key, "components not loaded yet; deferring");
                deferred.push(pending);
            }
        }
    }

    for pending in deferred {
        tracing::info!(key = %pending.key, "retrying deferred fusion");
        match restore_one(session, world, &pending) {
            Some(true) => {
                session.stats.fusions_restored += 1;
                session.stats.fusions_deferred += 1;
            }
            _ => {
                tracing::info!(key = %pending.key, "unresolvable after retry; purging");
                store.delete(SECTION_FUSION, &pending.key);
                session.stats.purged += 1;
            }
        }
    }
}

//! Script-facing lookups over a completed load session.

use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;

use crate::session::LoadSession;
use crate::world::{ContentWorld, EntityId, EntityKind};

/// The derived scroll for a spell-teaching book, if one was generated.
pub fn scroll_for_book(session: &LoadSession, book: EntityId) -> Option<EntityId> {
    let spell = session.book_spell.get_value_opt(&book)?;
    session.spell_scroll.get_value_opt(spell).copied()
}

/// The source spell behind a derived scroll.
pub fn spell_from_scroll(session: &LoadSession, scroll: EntityId) -> Option<EntityId> {
    session.spell_scroll.get_key_opt(&scroll).copied()
}

/// The derived scroll for a source spell.
pub fn scroll_from_spell(session: &LoadSession, spell: EntityId) -> Option<EntityId> {
    session.spell_scroll.get_value_opt(&spell).copied()
}

/// A copy of `spell` with its casting cost overridden to zero. Memoized per
/// session; tags of the mapped scroll, if any, carry onto the copy.
pub fn zero_cost_copy(
    session: &mut LoadSession,
    world: &mut impl ContentWorld,
    spell_id: EntityId,
) -> Option<EntityId> {
    if let Some(copy) = session.zero_cost.get(&spell_id) {
        return Some(*copy);
    }

    let spell = world.entity(spell_id)?.clone();
    let scroll_tags = session
        .spell_scroll
        .get_value_opt(&spell_id)
        .and_then(|scroll| world.entity(*scroll))
        .map(|scroll| scroll.tags.clone())
        .unwrap_or_default();

    let copy_id = match world.create(EntityKind::Spell) {
        Ok(id) => id,
        Err(err) => {
            tracing::error!(error = %err, "factory refused zero-cost copy");
            return None;
        }
    };
    if let Some(copy) = world.entity_mut(copy_id) {
        copy.name = spell.name.clone();
        copy.effects = spell.effects.clone();
        copy.casting = spell.casting;
        copy.delivery = spell.delivery;
        copy.charge_time = spell.charge_time;
        copy.cost_override = 0;
        for tag in scroll_tags {
            copy.add_tag(tag);
        }
    }

    session.zero_cost.insert(spell_id, copy_id);
    Some(copy_id)
}

/// Monetary value of the scroll derived from `spell`, zero when unmapped.
fn spell_scroll_value(
    session: &LoadSession,
    world: &impl ContentWorld,
    spell: EntityId,
) -> u32 {
    session
        .spell_scroll
        .get_value_opt(&spell)
        .and_then(|scroll| world.entity(*scroll))
        .map(|scroll| scroll.value)
        .unwrap_or(0)
}

/// Pick a stronger spell sharing an effect keyword and delivery with `spell`.
///
/// Candidates come from the keyword index, restricted to the first two
/// keywords of each effect, and must back a strictly more valuable scroll.
/// The pick is weighted toward the weakest upgrades: weights start at 10000
/// and decay by x0.8 per step up the value ordering, floored at 1000.
pub fn upgraded_spell<R: Rng>(
    session: &LoadSession,
    world: &impl ContentWorld,
    spell_id: EntityId,
    rng: &mut R,
) -> Option<EntityId> {
    let spell = world.entity(spell_id)?;
    if !session.spell_scroll.contains_key(&spell_id) {
        return None;
    }
    let own_value = spell_scroll_value(session, world, spell_id);

    let mut candidates: Vec<EntityId> = Vec::new();
    for effect in &spell.effects {
        for keyword in effect.keywords.iter().take(2) {
            let Some(spells) = session.keyword_spells.get(keyword) else {
                continue;
            };
            for candidate in spells {
                if *candidate == spell_id {
                    continue;
                }
                if !session.spell_scroll.contains_key(candidate) {
                    continue;
                }
                let Some(entity) = world.entity(*candidate) else {
                    continue;
                };
                if entity.delivery != spell.delivery {
                    continue;
                }
                if spell_scroll_value(session, world, *candidate) > own_value {
                    candidates.push(*candidate);
                }
            }
        }
    }
    candidates.sort_unstable();
    candidates.dedup();
    candidates
        .sort_by_key(|candidate| spell_scroll_value(session, world, *candidate));

    if candidates.is_empty() {
        tracing::info!(spell = %spell.name, "no upgrade candidates");
        return None;
    }

    let mut weights = Vec::with_capacity(candidates.len());
    let mut w: i64 = 10_000;
    for _ in &candidates {
        weights.push(w);
        w = ((w * 8) / 10).max(1_000);
    }
    let dist = WeightedIndex::new(&weights).ok()?;
    let picked = candidates[dist.sample(rng)];
    tracing::info!(
        spell = %spell.name,
        candidates = candidates.len(),
        "picked upgrade"
    );
    Some(picked)
}

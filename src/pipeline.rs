//! Generation pipeline: derive one scroll per spell-teaching book.
//!
//! Each eligible book produces a scroll through the content factory, registers
//! the source spell in the hash and keyword indexes, computes crafting costs,
//! and reconciles the scroll's stable identifier against the persisted
//! `SCROLLS` entry so repeated loads re-derive the same identity.

use crate::error::ForgeResult;
use crate::hashing::{CONCENTRATION_SUFFIX, SCROLL_NAME_PREFIX};
use crate::ids::StableId;
use crate::session::{LoadSession, Recipe};
use crate::store::{MappingStore, SECTION_SCROLLS};
use crate::world::{
    CastingKind, ContentWorld, Delivery, Effect, Entity, EntityId, EntityKind, Tag, Tier,
};

/// Base-effect identity of the disintegrate rider appended to hostile
/// fire-and-forget scrolls.
pub const DISINTEGRATE_EFFECT_ID: u32 = 0x0000_0849;

/// Minimum cost override a spell must exceed to be derivable.
const TRIVIAL_COST: i32 = 5;

/// Approximate level of a spell: the rank-derived floor capped by the first
/// effect's minimum skill requirement.
pub(crate) fn level_approx(spell: &Entity) -> i32 {
    match spell.effects.first() {
        Some(effect) => {
            (i32::from(spell.rank) * 25 - 25).min(effect.min_skill as i32)
        }
        None => 0,
    }
}

/// Tier tag for a spell level.
pub(crate) fn tier_for_level(level: i32) -> Tier {
    match level {
        ..25 => Tier::Novice,
        25..50 => Tier::Apprentice,
        50..75 => Tier::Adept,
        75..100 => Tier::Expert,
        _ => Tier::Master,
    }
}

/// Material costs for crafting a scroll of `spell`: the base cost and the
/// discounted cost, both floored at 5. Concentration casting doubles the base.
pub(crate) fn compute_costs(spell: &Entity) -> (i32, i32) {
    let costliest = spell
        .effects
        .iter()
        .map(|e| e.cost)
        .fold(0.0f32, f32::max);

    let mut base = i32::from(spell.rank) * 5;
    base = base.max(level_approx(spell));
    base += costliest.min(500.0).max(spell.cost_override as f32) as i32;
    base = (base / 4).max(TRIVIAL_COST);
    if spell.casting == CastingKind::Concentration {
        base *= 2;
    }
    let discounted = (base * 66 / 100).max(TRIVIAL_COST);
    (base, discounted)
}

/// Apply school and tier tags derived from the source spell.
pub(crate) fn apply_school_and_tier_tags(scroll: &mut Entity, spell: &Entity) {
    if let Some(school) = spell.school {
        scroll.add_tag(Tag::School(school));
    }
    scroll.add_tag(Tag::Tier(tier_for_level(level_approx(spell))));
    if spell.rank == 0 {
        scroll.add_tag(Tag::Tier(Tier::Strange));
    }
}

fn disintegrate_rider() -> Effect {
    Effect {
        base_id: DISINTEGRATE_EFFECT_ID,
        cost: 0.0,
        magnitude: 0.0,
        area: 0,
        duration: 0,
        min_skill: 0,
        hostile: false,
        keywords: Vec::new(),
    }
}

/// Append the disintegrate rider to hostile, fire-and-forget, targeted
/// scrolls. A no-op if the rider is already present.
pub(crate) fn add_disintegrate_rider(scroll: &mut Entity, source_casting: CastingKind) {
    if scroll
        .effects
        .iter()
        .any(|e| e.base_id == DISINTEGRATE_EFFECT_ID)
    {
        return;
    }
    let hostile = scroll.effects.iter().any(|e| e.hostile);
    let casting = if source_casting == CastingKind::Concentration {
        source_casting
    } else {
        scroll.casting
    };
    let targeted = matches!(
        scroll.delivery,
        Delivery::TargetActor | Delivery::Aimed | Delivery::Touch
    );
    if hostile && casting == CastingKind::FireAndForget && targeted {
        scroll.effects.push(disintegrate_rider());
    }
}

/// Assign `target` to `entity`, swapping with whichever live entity currently
/// holds it. The swap is transactional: the two identifiers end up exactly
/// interchanged and no third entity is affected.
pub(crate) fn force_assign_stable(
    world: &mut impl ContentWorld,
    entity: EntityId,
    target: StableId,
) {
    match world.by_stable(target) {
        Some(holder) if holder != entity => {
            let own = world
                .entity(entity)
                .map(|e| e.stable_id)
                .unwrap_or(StableId::NULL);
            tracing::warn!(
                target = %target,
                displaced = %own,
                "identifier in use by a live entity; swapping"
            );
            world.swap_stable(entity, holder);
        }
        Some(_) => {}
        None => world.set_stable(entity, target),
    }
}

/// Run the generation pipeline over every spell-teaching book.
pub fn generate_scrolls(
    session: &mut LoadSession,
    world: &mut impl ContentWorld,
    store: &mut MappingStore,
) -> ForgeResult<()> {
    tracing::info!("processing spell tomes");
    let mut batch = Vec::new();

    for book_id in world.books() {
        let Some(book) = world.entity(book_id) else {
            continue;
        };
        let book_name = book.name.clone();
        let book_origin = book.origin.clone();
        let Some(spell_id) = book.teaches else {
            tracing::debug!(book = %book_name, "does not teach a spell");
            session.stats.skipped += 1;
            continue;
        };
        let Some(spell) = world.entity(spell_id).cloned() else {
            session.stats.skipped += 1;
            continue;
        };

        if spell.casting == CastingKind::ConstantEffect
            || spell.cost_override <= TRIVIAL_COST
        {
            tracing::debug!(
                book = %book_name,
                "ineligible casting kind or trivial cost"
            );
            session.stats.skipped += 1;
            continue;
        }
        if spell.effects.is_empty() {
            tracing::debug!(spell = %spell.name, "skipped spell with no effect data");
            session.stats.skipped += 1;
            continue;
        }

        for effect in &spell.effects {
            for keyword in &effect.keywords {
                session
                    .keyword_spells
                    .entry(keyword.clone())
                    .or_default()
                    .push(spell_id);
            }
        }
        session
            .hash_index
            .register(spell_id, &spell.name, &spell.effects);

        let scroll_id = match world.create(EntityKind::Scroll) {
            Ok(id) => id,
            Err(err) => {
                tracing::warn!(book = %book_name, error = %err, "factory refused scroll");
                session.stats.skipped += 1;
                continue;
            }
        };

        let concentration = spell.casting == CastingKind::Concentration;
        let (base_cost, discounted_cost) = compute_costs(&spell);

        {
            let scroll = world
                .entity_mut(scroll_id)
                .expect("freshly created entity exists");
            scroll.name = format!("{SCROLL_NAME_PREFIX}{}", spell.name);
            scroll.weight = 0.1;
            scroll.value = base_cost as u32;
            scroll.effects = spell.effects.clone();
            scroll.casting = spell.casting;
            scroll.delivery = spell.delivery;
            scroll.cost_override = spell.cost_override;
            scroll.charge_time = spell.charge_time;
            scroll.add_tag(Tag::Vendor);
            scroll.add_tag(Tag::Generated);
            if concentration {
                scroll.name.push_str(CONCENTRATION_SUFFIX);
                scroll.add_tag(Tag::Concentration);
                if session.settings.mod_charge_time {
                    scroll.charge_time = 0.0;
                }
            }
            apply_school_and_tier_tags(scroll, &spell);
            add_disintegrate_rider(scroll, spell.casting);
        }

        // Identifier reconciliation against the persisted mapping. The
        // composite key survives cross-session renumbering of the book itself.
        match &book_origin {
            Some(origin) => {
                let key = format!("{}~0x{:08X}", origin.dataset, origin.local_id);
                if let Some(value) = store.get(SECTION_SCROLLS, &key).map(str::to_string) {
                    match StableId::parse_hex(&value) {
                        Ok(target) => {
                            let current = world
                                .entity(scroll_id)
                                .map(|e| e.stable_id)
                                .unwrap_or(StableId::NULL);
                            if current != target {
                                force_assign_stable(world, scroll_id, target);
                            }
                        }
                        Err(_) => {
                            tracing::warn!(key, value, "invalid persisted identifier; purging");
                            store.delete(SECTION_SCROLLS, &key);
                            session.stats.purged += 1;
                            if session.allocator.use_offset() {
                                let next = session.allocator.next();
                                world.set_stable(scroll_id, next);
                            }
                        }
                    }
                } else if session.allocator.use_offset() {
                    let next = session.allocator.next();
                    world.set_stable(scroll_id, next);
                }

                let assigned = world
                    .entity(scroll_id)
                    .map(|e| e.stable_id)
                    .unwrap_or(StableId::NULL);
                store.set(
                    SECTION_SCROLLS,
                    &key,
                    &assigned.to_string(),
                    Some(&format!("# {book_name}")),
                );
            }
            None => {
                tracing::warn!(book = %book_name, "book has no dataset origin; not persisted");
            }
        }

        session.book_spell.insert(book_id, spell_id);
        session.spell_scroll.insert(spell_id, scroll_id);

        session.recipes.push(Recipe {
            scroll: scroll_id,
            spell: spell_id,
            base_cost,
            discounted_cost,
            batch: 1,
        });
        if session.settings.bulk_recipes {
            session.recipes.push(Recipe {
                scroll: scroll_id,
                spell: spell_id,
                base_cost: base_cost * 10,
                discounted_cost: discounted_cost * 10,
                batch: 10,
            });
        }

        batch.push(scroll_id);
        session.stats.generated += 1;
    }

    world.publish(&batch);
    tracing::info!(count = session.stats.generated, "spell tomes processed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::School;

    fn effect(base_id: u32, cost: f32, min_skill: u32, hostile: bool) -> Effect {
        Effect {
            base_id,
            cost,
            magnitude: 10.0,
            area: 0,
            duration: 0,
            min_skill,
            hostile,
            keywords: vec!["MagicDamageFire".into()],
        }
    }

    fn firebolt_spell() -> Entity {
        let mut spell = Entity::blank(EntityKind::Spell);
        spell.name = "Firebolt".into();
        spell.rank = 2;
        spell.cost_override = 41;
        spell.casting = CastingKind::FireAndForget;
        spell.delivery = Delivery::Aimed;
        spell.school = Some(School::Destruction);
        spell.effects = vec![effect(0x1CEA0, 120.0, 25, true)];
        spell
    }

    #[test]
    fn firebolt_cost_scenario() {
        let spell = firebolt_spell();
        // max(rank*5, level 25) + clamp(120 into ..500, over 41) = 145; /4 = 36.
        let (base, discounted) = compute_costs(&spell);
        assert_eq!(base, 36);
        assert_eq!(discounted, 36 * 66 / 100);
    }

    #[test]
    fn concentration_doubles_base_cost() {
        let mut spell = firebolt_spell();
        spell.casting = CastingKind::Concentration;
        let (base, _) = compute_costs(&spell);
        assert_eq!(base, 72);
    }

    #[test]
    fn cost_floors_at_five() {
        let mut spell = Entity::blank(EntityKind::Spell);
        spell.rank = 1;
        spell.cost_override = 6;
        spell.effects = vec![effect(1, 6.0, 0, false)];
        let (base, discounted) = compute_costs(&spell);
        assert_eq!(base, 5);
        assert_eq!(discounted, 5);
    }

    #[test]
    fn level_approx_caps_at_first_effect_skill() {
        let mut spell = firebolt_spell();
        assert_eq!(level_approx(&spell), 25);
        spell.effects[0].min_skill = 10;
        assert_eq!(level_approx(&spell), 10);
        spell.effects.clear();
        assert_eq!(level_approx(&spell), 0);
    }

    #[test]
    fn tier_boundaries() {
        assert_eq!(tier_for_level(0), Tier::Novice);
        assert_eq!(tier_for_level(25), Tier::Apprentice);
        assert_eq!(tier_for_level(74), Tier::Adept);
        assert_eq!(tier_for_level(99), Tier::Expert);
        assert_eq!(tier_for_level(100), Tier::Master);
    }

    #[test]
    fn disintegrate_rider_only_on_hostile_targeted_ff() {
        let spell = firebolt_spell();
        let mut scroll = Entity::blank(EntityKind::Scroll);
        scroll.effects = spell.effects.clone();
        scroll.casting = CastingKind::FireAndForget;
        scroll.delivery = Delivery::Aimed;

        add_disintegrate_rider(&mut scroll, CastingKind::FireAndForget);
        assert!(scroll
            .effects
            .iter()
            .any(|e| e.base_id == DISINTEGRATE_EFFECT_ID));
        let count = scroll.effects.len();

        // Idempotent.
        add_disintegrate_rider(&mut scroll, CastingKind::FireAndForget);
        assert_eq!(scroll.effects.len(), count);

        // Concentration source suppresses the rider.
        let mut conc = Entity::blank(EntityKind::Scroll);
        conc.effects = spell.effects.clone();
        conc.delivery = Delivery::Aimed;
        add_disintegrate_rider(&mut conc, CastingKind::Concentration);
        assert!(!conc
            .effects
            .iter()
            .any(|e| e.base_id == DISINTEGRATE_EFFECT_ID));

        // Self-delivery is not targeted.
        let mut selfcast = Entity::blank(EntityKind::Scroll);
        selfcast.effects = spell.effects.clone();
        selfcast.delivery = Delivery::SelfCast;
        add_disintegrate_rider(&mut selfcast, CastingKind::FireAndForget);
        assert!(!selfcast
            .effects
            .iter()
            .any(|e| e.base_id == DISINTEGRATE_EFFECT_ID));
    }
}

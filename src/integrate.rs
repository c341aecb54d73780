//! External-scroll integration.
//!
//! Datasets may ship their own scroll for a spell this engine also derived
//! one for. When enabled, the external scroll supersedes the generated one:
//! it takes over the spell↔scroll mapping and the generated scroll's weight
//! and value, and a relocation record is kept so persisted references to the
//! superseded identifier keep resolving this load.

use crate::pipeline::{add_disintegrate_rider, apply_school_and_tier_tags};
use crate::session::LoadSession;
use crate::world::{ContentWorld, EntityId, Tag};

/// Raise the external scroll's effect stats to at least the source spell's,
/// matched per base effect. Never lowers anything.
fn fix_effect_mismatch(world: &mut impl ContentWorld, scroll_id: EntityId, spell_id: EntityId) {
    let Some(spell_effects) = world.entity(spell_id).map(|e| e.effects.clone()) else {
        return;
    };
    let Some(scroll) = world.entity_mut(scroll_id) else {
        return;
    };
    for scroll_eff in &mut scroll.effects {
        for spell_eff in spell_effects.iter().filter(|e| e.base_id == scroll_eff.base_id) {
            if scroll_eff.area < spell_eff.area {
                tracing::info!(
                    base = scroll_eff.base_id,
                    from = scroll_eff.area,
                    to = spell_eff.area,
                    "mismatched area"
                );
                scroll_eff.area = spell_eff.area;
            }
            if scroll_eff.duration < spell_eff.duration {
                tracing::info!(
                    base = scroll_eff.base_id,
                    from = scroll_eff.duration,
                    to = spell_eff.duration,
                    "mismatched duration"
                );
                scroll_eff.duration = spell_eff.duration;
            }
            if scroll_eff.magnitude < spell_eff.magnitude {
                tracing::info!(
                    base = scroll_eff.base_id,
                    from = scroll_eff.magnitude,
                    to = spell_eff.magnitude,
                    "mismatched magnitude"
                );
                scroll_eff.magnitude = spell_eff.magnitude;
            }
        }
    }
}

/// Re-associate dataset-supplied scrolls with the spells this engine derived
/// scrolls for, superseding the generated ones.
pub fn integrate_external_scrolls(session: &mut LoadSession, world: &mut impl ContentWorld) {
    tracing::info!("integrating external scrolls");
    let mut total = 0usize;
    let mut missed: Vec<EntityId> = Vec::new();

    for scroll_id in world.scrolls() {
        let Some(replacer) = world.entity(scroll_id) else {
            continue;
        };
        if replacer.effects.is_empty() {
            tracing::info!(scroll = %replacer.name, "skipped scroll with no effect data");
            continue;
        }
        // Engine-produced scrolls are not candidates; external ones must be
        // vendor-tagged and carry a display name.
        if replacer.has_tag(Tag::Generated)
            || !replacer.has_tag(Tag::Vendor)
            || replacer.name.is_empty()
        {
            continue;
        }
        total += 1;

        let matched = session
            .hash_index
            .match_scroll(&replacer.name, &replacer.effects)
            .filter(|spell| session.spell_scroll.contains_key(spell));
        let Some(spell_id) = matched else {
            missed.push(scroll_id);
            continue;
        };

        let old_scroll = *session
            .spell_scroll
            .get_value_opt(&spell_id)
            .expect("checked by contains_key");
        let (old_stable, old_weight, old_value) = match world.entity(old_scroll) {
            Some(e) => (e.stable_id, e.weight, e.value),
            None => continue,
        };
        let new_stable = world
            .entity(scroll_id)
            .map(|e| e.stable_id)
            .unwrap_or_default();

        session.spell_scroll.erase_key(&spell_id);
        session.spell_scroll.insert(spell_id, scroll_id);
        session.relocation.insert(old_stable, new_stable);
        tracing::info!(
            scroll = %world.entity(scroll_id).map(|e| e.name.as_str()).unwrap_or(""),
            from = %old_stable,
            to = %new_stable,
            "integrated external scroll"
        );

        // Recipes recorded during generation now craft the replacement.
        for recipe in session.recipes.iter_mut().filter(|r| r.spell == spell_id) {
            recipe.scroll = scroll_id;
        }

        let spell_casting = world.entity(spell_id).map(|e| e.casting);
        let spell_snapshot = world.entity(spell_id).cloned();
        if let Some(scroll) = world.entity_mut(scroll_id) {
            scroll.weight = old_weight;
            scroll.value = old_value;
            scroll.add_tag(Tag::Generated);
        }
        if let Some(casting) = spell_casting {
            if let Some(scroll) = world.entity_mut(scroll_id) {
                add_disintegrate_rider(scroll, casting);
            }
        }
        if let Some(spell) = &spell_snapshot {
            if let Some(scroll) = world.entity_mut(scroll_id) {
                apply_school_and_tier_tags(scroll, spell);
            }
        }
        if session.settings.apply_mismatch_fix {
            fix_effect_mismatch(world, scroll_id, spell_id);
        }

        session.stats.integrated += 1;
    }

    for id in &missed {
        if let Some(entity) = world.entity(*id) {
            tracing::info!(scroll = %entity.name, "no matching source spell");
        }
    }
    tracing::info!(
        candidates = total,
        integrated = session.stats.integrated,
        "external scroll pass complete"
    );
}

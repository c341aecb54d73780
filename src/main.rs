//! scrollforge CLI: identity & derivation cache engine.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};

use scrollforge::export::SessionExport;
use scrollforge::fusion;
use scrollforge::query;
use scrollforge::session::LoadSession;
use scrollforge::store::MappingStore;
use scrollforge::world::{
    CastingKind, Delivery, Effect, Entity, EntityKind, MemoryWorld, School, Tag,
};
use scrollforge::ContentWorld;

#[derive(Parser)]
#[command(name = "scrollforge", version, about = "Identity & derivation cache engine")]
struct Cli {
    /// Path to the persisted mapping file.
    #[arg(long, global = true, default_value = "scrollforge.ini")]
    mapping: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a load pass over the built-in demo datasets and save the mapping.
    Run {
        /// Also fuse the first two compatible generated scrolls.
        #[arg(long)]
        fuse: bool,
    },

    /// Print the persisted mapping file as parsed.
    Inspect,

    /// Run a load pass and export the session as JSON.
    Export {
        /// Write to this file instead of stdout.
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

fn effect(base_id: u32, cost: f32, min_skill: u32, hostile: bool, keyword: &str) -> Effect {
    Effect {
        base_id,
        cost,
        magnitude: cost / 2.0,
        area: 0,
        duration: 0,
        min_skill,
        hostile,
        keywords: vec![keyword.to_string()],
    }
}

fn spell(
    name: &str,
    rank: u8,
    cost_override: i32,
    casting: CastingKind,
    school: School,
    eff: Effect,
) -> Entity {
    let mut entity = Entity::blank(EntityKind::Spell);
    entity.name = name.into();
    entity.rank = rank;
    entity.cost_override = cost_override;
    entity.casting = casting;
    entity.delivery = Delivery::Aimed;
    entity.school = Some(school);
    entity.charge_time = 0.5;
    entity.effects = vec![eff];
    entity
}

/// Two datasets: one with spell tomes, one shipping its own Firebolt scroll.
fn demo_world() -> MemoryWorld {
    let mut world = MemoryWorld::new();

    let spells = [
        spell(
            "Firebolt",
            2,
            41,
            CastingKind::FireAndForget,
            School::Destruction,
            effect(0x1CEA0, 120.0, 25, true, "MagicDamageFire"),
        ),
        spell(
            "Fireball",
            3,
            133,
            CastingKind::FireAndForget,
            School::Destruction,
            effect(0x1CEA1, 300.0, 50, true, "MagicDamageFire"),
        ),
        spell(
            "Frostbite",
            1,
            16,
            CastingKind::Concentration,
            School::Destruction,
            effect(0x1CEA2, 30.0, 0, true, "MagicDamageFrost"),
        ),
        spell(
            "Healing",
            1,
            12,
            CastingKind::Concentration,
            School::Restoration,
            effect(0x1CEA3, 25.0, 0, false, "MagicRestoreHealth"),
        ),
    ];

    for (slot, entity) in spells.into_iter().enumerate() {
        let name = entity.name.clone();
        let spell_id = world.seed("grimoire.esm", 0x100 + slot as u32, entity);
        let mut book = Entity::blank(EntityKind::Book);
        book.name = format!("Tome: {name}");
        book.teaches = Some(spell_id);
        world.seed("grimoire.esm", 0x200 + slot as u32, book);
    }

    let mut external = Entity::blank(EntityKind::Scroll);
    external.name = "Scroll of Firebolt".into();
    external.weight = 0.3;
    external.value = 50;
    external.delivery = Delivery::Aimed;
    external.effects = vec![effect(0x1CEA0, 120.0, 25, true, "MagicDamageFire")];
    external.tags = vec![Tag::Vendor];
    world.seed("scrolls.esp", 0x10, external);

    world
}

fn load_pass(mapping: &PathBuf) -> Result<(MemoryWorld, LoadSession, MappingStore)> {
    let mut world = demo_world();
    let mut store = MappingStore::load(mapping)?;
    let mut session = LoadSession::new();
    session.run_load_pass(&mut world, &mut store)?;
    Ok((world, session, store))
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set (e.g., in tests)

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { fuse } => {
            let (mut world, mut session, mut store) = load_pass(&cli.mapping)?;

            if fuse {
                let scrolls: Vec<_> = world
                    .scrolls()
                    .into_iter()
                    .filter(|id| {
                        world
                            .entity(*id)
                            .is_some_and(|e| e.has_tag(Tag::Generated))
                    })
                    .collect();
                let pair = scrolls.iter().enumerate().find_map(|(i, a)| {
                    scrolls[i + 1..]
                        .iter()
                        .find(|b| fusion::can_fuse(&session, &world, *a, **b, false))
                        .map(|b| (*a, *b))
                });
                match pair {
                    Some((a, b)) => {
                        if let Some(result) =
                            fusion::fuse(&mut session, &mut world, &mut store, a, b)
                        {
                            let entity = world.entity(result).expect("fused scroll exists");
                            println!("Fused: {} ({})", entity.name, entity.stable_id);
                        }
                    }
                    None => println!("No fusable pair among generated scrolls."),
                }
            }

            store.save()?;

            println!(
                "Generated {} scrolls ({} skipped, {} integrated, {} fusions restored).",
                session.stats.generated,
                session.stats.skipped,
                session.stats.integrated,
                session.stats.fusions_restored,
            );
            for book in world.books() {
                if let Some(scroll) = query::scroll_for_book(&session, book) {
                    let book_name = world.entity(book).map(|e| e.name.as_str()).unwrap_or("");
                    if let Some(entity) = world.entity(scroll) {
                        println!(
                            "  {book_name} -> {} ({}, value {})",
                            entity.name, entity.stable_id, entity.value
                        );
                    }
                }
            }
            println!("Mapping saved to {}", cli.mapping.display());
        }

        Commands::Inspect => {
            let store = MappingStore::load(&cli.mapping)?;
            print!("{}", store.render());
        }

        Commands::Export { out } => {
            let (world, session, _store) = load_pass(&cli.mapping)?;
            let export = SessionExport::collect(&session, &world);
            let json = serde_json::to_string_pretty(&export).into_diagnostic()?;
            match out {
                Some(path) => {
                    std::fs::write(&path, json).into_diagnostic()?;
                    println!("Exported to {}", path.display());
                }
                None => println!("{json}"),
            }
        }
    }

    Ok(())
}

use clap::Parser;
use log::{error, info, LevelFilter};
use rand::Rng;
use std::path::PathBuf;
use std::process::Command;

use ptcg_randomiser_core::{run, RandomiserSettings};

const MAX_RANDOM_SEED: u64 = 999_999;

#[derive(Debug, Parser)]
#[command(name = "ptcg-randomiser", version, about = "Pokémon TCG disassembly randomiser")]
struct Args {
    /// Seed to randomise with. A random one in 0..=999999 is used when
    /// neither this nor a config file gives one.
    seed: Option<u64>,

    /// Project root containing `templates/` and `data/`.
    #[arg(long, default_value = ".")]
    project: PathBuf,

    /// JSON settings file. Flags given on the command line override it.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Card corpus to parse instead of `templates/cards.asm`.
    #[arg(long)]
    cards: Option<PathBuf>,

    /// Write the `src/` tree here instead of into the project.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Verbose logging and a spoiler log next to the output.
    #[arg(long)]
    debug: bool,

    /// Run `make` in the project after randomising.
    #[arg(long)]
    build: bool,

    /// Draw card sets per card instead of per evolution line.
    #[arg(long)]
    no_group_by_evolution: bool,

    #[arg(long)]
    randomize_prize: bool,

    #[arg(long)]
    prize_full_random: bool,

    #[arg(long)]
    prize_range: Option<i64>,

    #[arg(long)]
    prize_min: Option<i64>,

    #[arg(long)]
    prize_max: Option<i64>,

    #[arg(long)]
    exclude_decks: bool,

    #[arg(long)]
    exclude_music: bool,

    #[arg(long)]
    exclude_boosters: bool,

    #[arg(long)]
    exclude_npcs: bool,

    /// Draw how many boosters each NPC gives instead of keeping the
    /// original amount.
    #[arg(long)]
    random_booster_amount: bool,

    #[arg(long)]
    booster_min: Option<u32>,

    #[arg(long)]
    booster_max: Option<u32>,

    #[arg(long)]
    min_pokemon: Option<u32>,

    #[arg(long)]
    max_pokemon: Option<u32>,

    #[arg(long)]
    min_trainer: Option<u32>,

    #[arg(long)]
    max_trainer: Option<u32>,

    #[arg(long)]
    starter_color_min: Option<u32>,

    #[arg(long)]
    starter_color_max: Option<u32>,
}

fn log_level(debug: bool) -> LevelFilter {
    if debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    }
}

fn setup_logger(level: LevelFilter) -> Result<(), fern::InitError> {
    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{} {} {}] {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.target(),
                message
            ))
        })
        .level(level)
        .chain(std::io::stderr())
        .apply()?;
    Ok(())
}

fn build_settings(args: &Args) -> ptcg_randomiser_core::Result<RandomiserSettings> {
    let (mut settings, config_seed) = match &args.config {
        Some(path) => RandomiserSettings::load(path)?,
        None => (RandomiserSettings::default(), None),
    };

    settings.seed = args
        .seed
        .or(config_seed)
        .unwrap_or_else(|| rand::thread_rng().gen_range(0..=MAX_RANDOM_SEED));
    settings.project_path = args.project.clone();
    if args.cards.is_some() {
        settings.cards_path = args.cards.clone();
    }
    if args.output.is_some() {
        settings.output_path = args.output.clone();
    }
    settings.debug |= args.debug;

    if args.no_group_by_evolution {
        settings.group_by_evolution = false;
    }
    if args.randomize_prize {
        settings.exclude_prize = false;
    }
    settings.prize_full_random |= args.prize_full_random;
    settings.exclude_decks |= args.exclude_decks;
    settings.exclude_music |= args.exclude_music;
    settings.exclude_boosters |= args.exclude_boosters;
    settings.exclude_npcs |= args.exclude_npcs;
    if args.random_booster_amount {
        settings.booster_original_amount = false;
    }

    let overrides_i64 = [
        (args.prize_range, &mut settings.prize_range),
        (args.prize_min, &mut settings.prize_min),
        (args.prize_max, &mut settings.prize_max),
    ];
    for (value, field) in overrides_i64 {
        if let Some(value) = value {
            *field = value;
        }
    }
    let overrides_u32 = [
        (args.booster_min, &mut settings.booster_min),
        (args.booster_max, &mut settings.booster_max),
        (args.min_pokemon, &mut settings.min_pokemon),
        (args.max_pokemon, &mut settings.max_pokemon),
        (args.min_trainer, &mut settings.min_trainer),
        (args.max_trainer, &mut settings.max_trainer),
        (args.starter_color_min, &mut settings.starter_color_min),
        (args.starter_color_max, &mut settings.starter_color_max),
    ];
    for (value, field) in overrides_u32 {
        if let Some(value) = value {
            *field = value;
        }
    }

    Ok(settings)
}

fn main() {
    let args = Args::parse();
    let settings = build_settings(&args);

    let debug = settings.as_ref().map_or(args.debug, |s| s.debug);
    if let Err(err) = setup_logger(log_level(debug)) {
        eprintln!("Failed to set up logging: {err}");
    }

    let settings = match settings {
        Ok(settings) => settings,
        Err(err) => {
            error!("{err}");
            std::process::exit(1);
        }
    };
    let seed = settings.seed;
    let project = settings.project_path.clone();

    if let Err(err) = run(settings) {
        error!("{err}");
        std::process::exit(1);
    }
    println!("Successfully randomised with seed: {:06}", seed);

    if args.build {
        info!("Running make in {}", project.display());
        match Command::new("make").current_dir(&project).status() {
            Ok(status) if status.success() => {
                println!("Successfully compiled with seed: {:06}", seed);
            }
            Ok(status) => {
                error!("make failed with {status}");
                std::process::exit(status.code().unwrap_or(1));
            }
            Err(err) => {
                error!("Failed to run make: {err}");
                std::process::exit(1);
            }
        }
    }
}

//! Binary entrypoint for the tame batch driver.
//!
//! Commands:
//! - `init` - write a starter `config.toml`
//! - `inspect <module>` - print a module's header, digest and element counts
//! - `compile <module.json> <out>` - validate a JSON module and write it as bincode
//! - `run <module> [--script <file>] [--load <slot>] [--save <slot>]` - play
//!   a module from a command script (or stdin), printing the cues produced
//!
//! See the library crate docs for module-level details: `tame::`.
use std::io::{BufRead, Write};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;

use tame::config::Config;
use tame::context::{ModuleContext, SaveStore};
use tame::module::{loader, ElementKind};
use tame::runtime::{coalesce, handle_init, handle_request, Cue, CueKind};

#[derive(Parser)]
#[command(name = "tame")]
#[command(about = "Runtime engine for text adventure modules")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (can be used before or after subcommand)
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: String,

    /// Verbose logging (-v, -vv for more; may appear before or after subcommand)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Init,
    /// Show a module's header, digest and element counts
    Inspect {
        /// Module file (.json or bincode)
        module: String,
    },
    /// Validate a JSON module and write its bincode form
    Compile {
        /// JSON module source
        input: String,
        /// Output path
        output: String,
    },
    /// Play a module, one command per input line
    Run {
        /// Module file (.json or bincode)
        module: String,
        /// Command script; stdin when absent
        #[arg(short, long)]
        script: Option<String>,
        /// Restore this save slot instead of starting a new game
        #[arg(short, long)]
        load: Option<String>,
        /// Save to this slot when the script ends
        #[arg(long)]
        save: Option<String>,
        /// Emit TRACE cues
        #[arg(long)]
        trace: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match cli.command {
        Commands::Init => None,
        _ => Some(Config::load_or_default(&cli.config).await?),
    };
    init_logging(&config, cli.verbose);

    match cli.command {
        Commands::Init => {
            Config::create_default(&cli.config).await?;
            info!("Configuration file created at {}", cli.config);
        }
        Commands::Inspect { module } => {
            let module = loader::load(&module)?;
            println!("title:    {}", module.title());
            println!("digest:   {}", module.digest_hex());
            for (key, value) in module.header() {
                println!("header:   {} = {}", key, value);
            }
            for kind in [
                ElementKind::World,
                ElementKind::Player,
                ElementKind::Room,
                ElementKind::Object,
                ElementKind::Container,
                ElementKind::Action,
            ] {
                let all = module.elements_of_kind(kind).count();
                let archetypes = module
                    .elements_of_kind(kind)
                    .filter(|e| e.is_archetype())
                    .count();
                println!("{:<10}{} ({} archetype)", format!("{}:", kind), all, archetypes);
            }
        }
        Commands::Compile { input, output } => {
            let module = loader::from_json_file(&input)?;
            loader::write_bincode_file(&module.definition(), &output)?;
            info!("Compiled {} to {} (digest {})", input, output, module.digest_hex());
        }
        Commands::Run {
            module,
            script,
            load,
            save,
            trace,
        } => {
            let mut config = config.unwrap_or_default();
            config.engine.trace |= trace;
            let module = Arc::new(loader::load(&module)?);
            let mut ctx = ModuleContext::with_config(module, config.engine.clone());
            let store = SaveStore::open(&config.storage.save_dir)?;

            let finished = match &load {
                Some(slot) => {
                    let meta = store
                        .load(slot, &mut ctx)
                        .with_context(|| format!("loading save slot '{}'", slot))?;
                    info!("Restored '{}' saved at {}", meta.slot, meta.created_at);
                    false
                }
                None => print_cues(handle_init(&mut ctx).cues())?,
            };

            if !finished {
                let input: Box<dyn BufRead> = match &script {
                    Some(path) => Box::new(std::io::BufReader::new(
                        std::fs::File::open(path).with_context(|| format!("opening {}", path))?,
                    )),
                    None => Box::new(std::io::stdin().lock()),
                };
                for line in input.lines() {
                    let line = line?;
                    if line.trim().is_empty() {
                        continue;
                    }
                    println!("> {}", line.trim());
                    let response = handle_request(&mut ctx, &line);
                    if print_cues(response.cues())? {
                        break;
                    }
                }
            }

            if let Some(slot) = save {
                let meta = store.save(&slot, &ctx)?;
                info!("Saved slot '{}' ({} bytes)", meta.slot, meta.size_bytes);
            }
        }
    }

    Ok(())
}

/// Print cues the way a console front end would. Returns true once the game
/// has ended.
fn print_cues(cues: &[Cue]) -> Result<bool> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for cue in coalesce(cues) {
        match cue.kind() {
            CueKind::Text | CueKind::TextF => write!(out, "{}", cue.content())?,
            CueKind::Pause => writeln!(out, "\n(more)")?,
            CueKind::Wait => {}
            CueKind::Tip => writeln!(out, "TIP: {}", cue.content())?,
            CueKind::Info => writeln!(out, "INFO: {}", cue.content())?,
            CueKind::Trace => writeln!(out, "[trace] {}", cue.content())?,
            CueKind::Error => writeln!(out, "!! {}", cue.content())?,
            CueKind::Fatal => {
                writeln!(out, "FATAL: {}", cue.content())?;
                return Ok(true);
            }
            CueKind::Quit => {
                writeln!(out, "\n*** The End ***")?;
                return Ok(true);
            }
        }
    }
    out.flush()?;
    Ok(false)
}

fn init_logging(config: &Option<Config>, verbosity: u8) {
    let mut builder = env_logger::Builder::new();
    // CLI verbosity overrides the configured level
    let configured = config
        .as_ref()
        .and_then(|c| c.logging.level.parse::<log::LevelFilter>().ok())
        .unwrap_or(log::LevelFilter::Info);
    let level = match verbosity {
        0 => configured,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    builder.filter_level(level);

    let log_file = config
        .as_ref()
        .and_then(|c| c.logging.file.as_ref())
        .and_then(|path| {
            std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .ok()
        });

    match log_file {
        Some(file) => {
            let file = std::sync::Mutex::new(file);
            // Mirror to the console only when someone is watching it
            let is_tty = atty::is(atty::Stream::Stderr);
            builder.format(move |fmt, record| {
                let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
                let line = format!("{} [{}] {}", ts, record.level(), record.args());
                if let Ok(mut guard) = file.lock() {
                    let _ = writeln!(guard, "{}", line);
                }
                if is_tty {
                    writeln!(fmt, "{}", line)
                } else {
                    Ok(())
                }
            });
        }
        None => {
            builder.format(|fmt, record| {
                let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
                writeln!(fmt, "{} [{}] {}", ts, record.level(), record.args())
            });
        }
    }
    let _ = builder.try_init();
}

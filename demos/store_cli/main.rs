//! Development aid wiring a `StoreConfig` loaded from a TOML file to the
//! public `Store` verbs from a shell. Not part of the library's contract —
//! analogous to the teacher's `[[example]]` demo binaries.

use std::path::PathBuf;

use artifact_store::{Store, StoreConfig};
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "store_cli")]
struct Cli {
    /// Path to a TOML file describing the store (states, factory, sizing).
    #[arg(long, default_value = "store.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Creates an empty (possibly sparse) entry in the named state.
    Create { name: String, state: String, #[arg(default_value_t = 0)] size: u64 },
    /// Moves an entry between states.
    Move { name: String, state: String },
    /// Deletes an entry and its sidecars.
    Delete { name: String },
    /// Prints an entry's current state and size.
    Stat { name: String },
}

fn main() {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let text = std::fs::read_to_string(&cli.config)
        .unwrap_or_else(|e| panic!("reading {}: {e}", cli.config.display()));
    let config = StoreConfig::from_toml(&text).unwrap_or_else(|e| panic!("parsing config: {e}"));
    let store = Store::from_config(&config).unwrap_or_else(|e| panic!("building store: {e}"));

    let result = match cli.command {
        Command::Create { name, state, size } => {
            let target = resolve_state(&store, &state);
            store.new_file_op().create_file(&name, target, size)
        }
        Command::Move { name, state } => {
            let target = resolve_state(&store, &state);
            store.new_file_op().move_file(&name, target)
        }
        Command::Delete { name } => store.new_file_op().delete_file(&name),
        Command::Stat { name } => store.new_file_op().get_file_stat(&name).map(|stat| {
            println!("state={:?} size={}", stat.state, stat.size);
        }),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn resolve_state(store: &Store, name: &str) -> artifact_store::StateId {
    store.state_id(name).unwrap_or_else(|| panic!("unknown state {name:?}"))
}

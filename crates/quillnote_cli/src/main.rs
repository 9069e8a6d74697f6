//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `quillnote_core` linkage and print a short note listing.

use clap::{Parser, Subcommand};
use quillnote_core::{
    init_logging_from_config, AppContext, CoreConfig, NoteDraft, NoteSummary,
};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "quillnote")]
#[command(version)]
#[command(about = "Inspect and edit the local QuillNote collection", long_about = None)]
struct Cli {
    /// TOML configuration file; defaults apply when it is missing
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Commands {
    /// List notes, most recently updated first
    #[command(alias = "ls")]
    List,

    /// Create a note with empty content
    Add {
        /// Title words, joined with spaces
        #[arg(num_args = 0..)]
        title: Vec<String>,
    },

    /// Find notes whose title or preview contains the query
    Search {
        /// Query words, joined with spaces
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,
    },
}

fn print_summaries(summaries: &[NoteSummary]) {
    for summary in summaries {
        println!(
            "{}  {}  {}",
            summary.updated_at.format("%Y-%m-%d %H:%M"),
            summary.id,
            summary.title
        );
    }
}

fn run(cli: Cli) -> Result<(), String> {
    let config = match &cli.config {
        Some(path) => CoreConfig::load_or_default(path),
        None => Ok(CoreConfig::default()),
    }
    .map_err(|err| err.to_string())?;

    if let Err(err) = init_logging_from_config(&config) {
        eprintln!("logging disabled: {err}");
    }

    let mut context = AppContext::open(config).map_err(|err| err.to_string())?;
    match cli.command.unwrap_or(Commands::List) {
        Commands::List => {
            println!("notes={}", context.notes().len());
            print_summaries(&context.notes().summaries());
        }
        Commands::Add { title } => {
            let note = context
                .notes_mut()
                .add_note(NoteDraft::new(title.join(" "), ""))
                .map_err(|err| err.to_string())?;
            println!("added {}", note.id);
        }
        Commands::Search { query } => {
            print_summaries(&context.notes().search(&query.join(" ")))
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    println!("quillnote_core ping={}", quillnote_core::ping());
    println!("quillnote_core version={}", quillnote_core::core_version());

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Cli, Commands};
    use clap::{CommandFactory, Parser};
    use std::path::PathBuf;

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn no_subcommand_means_list() {
        let cli = Cli::try_parse_from(["quillnote"]).unwrap();
        assert!(cli.command.is_none());
        assert!(cli.config.is_none());
    }

    #[test]
    fn config_flag_is_accepted_after_the_subcommand() {
        let cli =
            Cli::try_parse_from(["quillnote", "add", "Weekly", "plan", "--config", "/tmp/q.toml"])
                .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/q.toml")));
        assert_eq!(
            cli.command,
            Some(Commands::Add {
                title: vec!["Weekly".to_string(), "plan".to_string()]
            })
        );
    }

    #[test]
    fn search_requires_a_query_and_unknown_commands_fail() {
        assert!(Cli::try_parse_from(["quillnote", "search"]).is_err());
        assert!(Cli::try_parse_from(["quillnote", "sync"]).is_err());
    }
}

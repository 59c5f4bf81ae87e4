use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use crate::entry::EntryId;

#[derive(Debug, Parser)]
#[command(
    name = "faqdex",
    about = "A full-text question/answer knowledge base with tag browsing"
)]
pub struct Cli {
    /// Override the XDG data directory
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Increase log verbosity (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Replace the whole knowledge base from a CSV file
    Import(ImportArgs),
    /// Find entries matching free text
    Search(SearchArgs),
    /// Show one entry by id
    Get(GetArgs),
    /// List the tag vocabulary
    Tags(TagsArgs),
    /// List the questions carrying a tag
    Browse(BrowseArgs),
    /// Rebuild the full-text index from stored entries
    Rebuild,
    /// Show store and index statistics
    Status(StatusArgs),
    /// Manage persisted settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
    /// Generate shell completions
    #[command(hide = true)]
    Completions(CompletionsArgs),
}

// -- Import --

#[derive(Debug, Parser)]
pub struct ImportArgs {
    /// CSV file with question, answer and tags columns
    pub path: PathBuf,

    /// Output the load report as JSON
    #[arg(long)]
    pub json: bool,
}

// -- Search --

#[derive(Debug, Parser)]
pub struct SearchArgs {
    /// The question to look up
    pub query: String,

    /// Number of results to return (default: search_limit setting)
    #[arg(short = 'n', long)]
    pub count: Option<usize>,

    /// Output results as JSON
    #[arg(long)]
    pub json: bool,
}

// -- Get --

#[derive(Debug, Parser)]
pub struct GetArgs {
    /// Entry id, with or without a leading '#'
    pub id: EntryId,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

// -- Tags --

#[derive(Debug, Parser)]
pub struct TagsArgs {
    /// Page of the tag list, starting at 1
    #[arg(long, default_value = "1")]
    pub page: usize,

    /// Output the full tag list as JSON
    #[arg(long)]
    pub json: bool,
}

// -- Browse --

#[derive(Debug, Parser)]
pub struct BrowseArgs {
    /// Tag to browse
    pub tag: String,

    /// Page of results, starting at 1
    #[arg(long, default_value = "1")]
    pub page: usize,

    /// Questions per page (default: page_size setting)
    #[arg(long)]
    pub page_size: Option<usize>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

// -- Status --

#[derive(Debug, Parser)]
pub struct StatusArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

// -- Settings --

#[derive(Debug, Subcommand)]
pub enum SettingsAction {
    /// Show effective settings
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Persist a setting in the store
    Set {
        /// Setting name
        key: String,
        /// New value
        value: String,
    },
    /// Clear a stored setting (revert to default)
    Clear {
        /// Setting name
        key: String,
    },
}

// -- Completions --

#[derive(Debug, Parser)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

impl CompletionsArgs {
    /// Generate shell completions and print to stdout.
    pub fn generate(&self) {
        let mut cmd = Cli::command();
        clap_complete::generate(
            self.shell,
            &mut cmd,
            "faqdex",
            &mut std::io::stdout(),
        );
    }
}

//! CLI argument definitions using clap

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand, ValueHint};

/// Build, inspect, and validate hierarchical form field trees
#[derive(Parser, Debug)]
#[command(name = "formtree")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase logging verbosity (-d, -dd, -ddd)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub debug: u8,

    /// Registry namespace for unqualified field types
    #[arg(short, long, global = true)]
    pub namespace: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Render the field tree of a schema
    Tree {
        /// Schema file, .toml or .json (default: configured schema_path)
        #[arg(value_hint = ValueHint::FilePath)]
        schema: Option<PathBuf>,

        /// Load input data into the tree before rendering
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        input: Option<PathBuf>,
    },

    /// List fields in render order
    Fields {
        /// Schema file, .toml or .json (default: configured schema_path)
        #[arg(value_hint = ValueHint::FilePath)]
        schema: Option<PathBuf>,
    },

    /// List registered field types
    Types,

    /// Flatten nested JSON to dotted key/value pairs
    Flatten {
        /// Nested JSON file (default: stdin)
        #[arg(value_hint = ValueHint::FilePath)]
        input: Option<PathBuf>,
    },

    /// Rebuild nested JSON from dotted key/value pairs
    Unflatten {
        /// Flat JSON object file (default: stdin)
        #[arg(value_hint = ValueHint::FilePath)]
        input: Option<PathBuf>,
    },

    /// Validate input data against a schema
    Check {
        /// Schema file, .toml or .json (default: configured schema_path)
        #[arg(value_hint = ValueHint::FilePath)]
        schema: Option<PathBuf>,

        /// Input data file (default: stdin)
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        input: Option<PathBuf>,

        /// Print validated values as nested JSON on success
        #[arg(long)]
        values: bool,
    },

    /// Manage settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Generate shell completions
    Completion {
        /// Shell type
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show merged config
    Show,

    /// Create config template
    Init,

    /// Show config path
    Path,
}

//! CLI definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::config::SettingsOverrides;
use crate::sync::MarkerPolicy;

pub mod commands;

/// MemoryLane - recall tagged lines from your notes, year after year
#[derive(Parser, Debug)]
#[command(name = "mlane", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Database path (default: ~/.memorylane/data/memorylane.db)
    #[arg(long, global = true, env = "MLANE_DB")]
    pub db: Option<PathBuf>,

    /// Vault directory holding the notes (overrides the stored setting)
    #[arg(long, global = true, env = "MLANE_VAULT")]
    pub vault: Option<PathBuf>,

    /// Folder inside the vault to index ("/" = top level only)
    #[arg(long, global = true, env = "MLANE_FOLDER")]
    pub folder: Option<String>,

    /// Tag marker that selects lines (e.g. "#memory")
    #[arg(long, global = true, env = "MLANE_TAG")]
    pub tag: Option<String>,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Increase logging verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (no output except errors)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

impl Cli {
    /// Settings given on the command line for this invocation.
    #[must_use]
    pub fn settings_overrides(&self) -> SettingsOverrides {
        SettingsOverrides {
            vault: self.vault.clone(),
            folder_path: self.folder.clone(),
            tag: self.tag.clone(),
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the index database
    Init {
        /// Replace an existing database
        #[arg(long)]
        force: bool,
    },

    /// Reconcile the index with the vault folder
    Sync {
        /// Scan every document, ignoring the sync marker
        #[arg(long)]
        full: bool,

        /// When the sync marker is advanced
        #[arg(long, value_enum, default_value_t)]
        marker_policy: MarkerPolicyArg,
    },

    /// Sync, then list every indexed row (newest first)
    List {
        /// Oldest first
        #[arg(long)]
        asc: bool,

        /// Render a year-grouped markdown timeline
        #[arg(long)]
        markdown: bool,
    },

    /// Search indexed rows (case-insensitive substring)
    Search {
        /// Text to look for
        text: String,
    },

    /// Rows from past years on this month and day
    Today {
        /// Day to look up: YYYY-MM-DD, today, yesterday or tomorrow
        #[arg(long)]
        date: Option<String>,
    },

    /// Show or change stored settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Show index status
    Status,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },

    /// Print version information
    Version,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show effective settings
    Show,

    /// Change a stored setting (vault, folder_path, tag, date_format)
    Set {
        /// Setting name
        key: String,

        /// New value
        value: String,
    },
}

/// Marker refresh policy.
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MarkerPolicyArg {
    /// Advance the marker after every pass
    #[default]
    Refresh,
    /// Write the marker on the first pass only
    WriteOnce,
}

impl From<MarkerPolicyArg> for MarkerPolicy {
    fn from(arg: MarkerPolicyArg) -> Self {
        match arg {
            MarkerPolicyArg::Refresh => Self::RefreshEveryPass,
            MarkerPolicyArg::WriteOnce => Self::WriteOnce,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Debug)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_sync_flags_parse() {
        let cli = Cli::parse_from(["mlane", "sync", "--full", "--marker-policy", "write-once"]);
        match cli.command {
            Commands::Sync { full, marker_policy } => {
                assert!(full);
                assert_eq!(MarkerPolicy::from(marker_policy), MarkerPolicy::WriteOnce);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_global_overrides_after_subcommand() {
        let cli = Cli::parse_from(["mlane", "list", "--folder", "journal", "--tag", "#recall"]);
        let overrides = cli.settings_overrides();
        assert_eq!(overrides.folder_path.as_deref(), Some("journal"));
        assert_eq!(overrides.tag.as_deref(), Some("#recall"));
    }
}

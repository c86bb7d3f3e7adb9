//! CLI argument parsing using clap.

use clap::{
    Parser, Subcommand,
    builder::styling::{AnsiColor, Effects, Styles},
};
use std::path::PathBuf;

use flexpreset::ValueType;

fn clap_cargo_style() -> Styles {
    Styles::styled()
        .header(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::Green.on_default())
}

#[derive(Parser)]
#[command(name = "flexpreset")]
#[command(version, about = "Typed, ordered, file-backed presets")]
#[command(styles = clap_cargo_style())]
pub struct Cli {
    /// Storage directory (overrides storage.dir)
    #[arg(long, global = true, env = "FLEXPRESET_STORAGE")]
    pub storage: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create .flexpreset/settings.toml and a starter collection
    Init {
        /// Overwrite an existing settings file
        #[arg(short, long)]
        force: bool,
    },

    /// Display active settings
    Config,

    /// List collections, or the presets of one collection
    List { collection: Option<String> },

    /// Show the values of a preset in order
    Show { collection: String, title: String },

    /// Show the typed outputs of a preset
    Outputs { collection: String, title: String },

    /// Set a value, creating the preset if needed
    Set {
        collection: String,
        title: String,
        key: String,
        #[arg(value_parser = parse_type)]
        value_type: ValueType,
        value: String,
    },

    /// Change the type of a value
    SetType {
        collection: String,
        title: String,
        key: String,
        #[arg(value_parser = parse_type)]
        value_type: ValueType,
    },

    /// Rename a key, keeping its position
    RenameKey {
        collection: String,
        title: String,
        old_key: String,
        new_key: String,
    },

    /// Delete a key
    DeleteKey {
        collection: String,
        title: String,
        key: String,
    },

    /// Reorder the keys of a preset
    Reorder {
        collection: String,
        title: String,
        #[arg(required = true)]
        keys: Vec<String>,
    },

    /// Create an empty preset
    CreateTitle { collection: String, title: String },

    /// Rename a preset, keeping its position
    RenameTitle {
        collection: String,
        old_title: String,
        new_title: String,
    },

    /// Delete a preset
    DeleteTitle { collection: String, title: String },

    /// Watch the storage directory and print notifications as JSON lines
    Watch {
        /// Only receive pushes for this preset (`collection::title`)
        #[arg(long)]
        scope: Option<String>,
    },
}

fn parse_type(s: &str) -> Result<ValueType, String> {
    s.parse()
}

mod cli;

use anyhow::anyhow;
use clap::Parser;

use cli::commands::{init, presets, watch};
use cli::{Cli, Commands};
use flexpreset::{PresetStore, Settings, logging};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut settings = Settings::load().map_err(|e| anyhow!("Configuration error: {e}"))?;
    if let Some(dir) = cli.storage {
        settings.storage.dir = dir;
    }
    logging::init_with_config(&settings.logging);

    let store = PresetStore::from_settings(&settings);

    match cli.command {
        Commands::Init { force } => init::run_init(&settings, force),
        Commands::Config => init::run_config(&settings),
        Commands::List { collection } => presets::run_list(&store, collection.as_deref()),
        Commands::Show { collection, title } => presets::run_show(&store, &collection, &title),
        Commands::Outputs { collection, title } => presets::run_outputs(&store, &collection, &title),
        Commands::Set {
            collection,
            title,
            key,
            value_type,
            value,
        } => presets::run_set(&store, &collection, &title, &key, value_type, &value),
        Commands::SetType {
            collection,
            title,
            key,
            value_type,
        } => {
            let version = store.set_type(&collection, &title, &key, value_type)?;
            presets::report(&collection, &title, version);
            Ok(())
        }
        Commands::RenameKey {
            collection,
            title,
            old_key,
            new_key,
        } => {
            let version = store.rename_key(&collection, &title, &old_key, &new_key)?;
            presets::report(&collection, &title, version);
            Ok(())
        }
        Commands::DeleteKey { collection, title, key } => {
            let version = store.delete_key(&collection, &title, &key)?;
            presets::report(&collection, &title, version);
            Ok(())
        }
        Commands::Reorder {
            collection,
            title,
            keys,
        } => {
            let version = store.reorder(&collection, &title, &keys)?;
            presets::report(&collection, &title, version);
            Ok(())
        }
        Commands::CreateTitle { collection, title } => {
            let version = store.create_title(&collection, &title)?;
            presets::report(&collection, &title, version);
            Ok(())
        }
        Commands::RenameTitle {
            collection,
            old_title,
            new_title,
        } => {
            let version = store.rename_title(&collection, &old_title, &new_title)?;
            presets::report(&collection, &new_title, version);
            Ok(())
        }
        Commands::DeleteTitle { collection, title } => {
            store.delete_title(&collection, &title)?;
            println!("Deleted {collection}::{title}");
            Ok(())
        }
        Commands::Watch { scope } => watch::run_watch(&settings, scope.as_deref()).await,
    }
}

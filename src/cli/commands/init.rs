//! Init and Config commands.

use anyhow::anyhow;

use flexpreset::{PresetStore, Settings};

/// Create the settings file and seed the starter collection.
pub fn run_init(settings: &Settings, force: bool) -> anyhow::Result<()> {
    let path = Settings::init_config_file(force).map_err(|e| anyhow!("{e}"))?;
    println!("Created configuration file at: {}", path.display());

    let store = PresetStore::from_settings(settings);
    if store.seed_default()? {
        println!(
            "Created starter collection at: {}",
            store.collection_path("default").display()
        );
    }
    Ok(())
}

/// Display the active configuration.
pub fn run_config(settings: &Settings) -> anyhow::Result<()> {
    println!("Current Configuration:");
    println!("{}", "=".repeat(50));
    println!("{}", toml::to_string_pretty(settings)?);
    Ok(())
}

//! Read and edit commands over the preset store.

use flexpreset::{PresetStore, ValueType};

/// List collections with their preset counts, or the titles of one
/// collection.
pub fn run_list(store: &PresetStore, collection: Option<&str>) -> anyhow::Result<()> {
    match collection {
        Some(collection) => {
            for title in store.list_presets(collection)? {
                println!("{title}");
            }
        }
        None => {
            let collections = store.list_collections();
            if collections.is_empty() {
                eprintln!("No collections in {}", store.dir().display());
            }
            for name in collections {
                match store.list_presets(&name) {
                    Ok(titles) => println!("{name} ({} presets)", titles.len()),
                    Err(e) => println!("{name} (unreadable: {e})"),
                }
            }
        }
    }
    Ok(())
}

pub fn run_show(store: &PresetStore, collection: &str, title: &str) -> anyhow::Result<()> {
    let values = store.get_preset(collection, title)?;
    let version = store.version(collection, title)?;
    println!("{collection}::{title} (v{version})");
    for value in values {
        println!("  {} [{}] = {:?}", value.key, value.value_type, value.value);
    }
    Ok(())
}

pub fn run_outputs(store: &PresetStore, collection: &str, title: &str) -> anyhow::Result<()> {
    for output in store.resolve_outputs(collection, title)? {
        println!(
            "{} {} = {}",
            output.name,
            output.kind,
            serde_json::to_string(&output.value)?
        );
    }
    Ok(())
}

pub fn run_set(
    store: &PresetStore,
    collection: &str,
    title: &str,
    key: &str,
    value_type: ValueType,
    value: &str,
) -> anyhow::Result<()> {
    let outcome = store.set_value(collection, title, key, value_type, value)?;
    if let Some(warning) = &outcome.warning {
        eprintln!("Warning: {warning}");
    }
    report(collection, title, outcome.version);
    Ok(())
}

/// Print the version a mutation left a preset at.
pub fn report(collection: &str, title: &str, version: u64) {
    println!("{collection}::{title} v{version}");
}

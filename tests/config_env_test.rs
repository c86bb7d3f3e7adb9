use flexpreset::Settings;
use std::env;
use std::fs;
use tempfile::TempDir;

// Single test: it changes the working directory and the environment, which
// are process-wide.
#[test]
fn test_layered_config() {
    let temp_dir = TempDir::new().unwrap();
    let original_dir = env::current_dir().unwrap();

    let config_dir = temp_dir.path().join(".flexpreset");
    fs::create_dir_all(&config_dir).unwrap();
    fs::write(
        config_dir.join("settings.toml"),
        r#"
[storage]
dir = "shared/presets"

[watch]
debounce_ms = 120
tick_ms = 40
"#,
    )
    .unwrap();

    // Discovered from a nested directory
    let nested = temp_dir.path().join("a").join("b");
    fs::create_dir_all(&nested).unwrap();
    env::set_current_dir(&nested).unwrap();

    unsafe {
        env::set_var("FLEXPRESET_WATCH__DEBOUNCE_MS", "250");
        env::set_var("FLEXPRESET_STORAGE__QUARANTINE_CORRUPT", "true");
        env::set_var("FLEXPRESET_LOGGING__DEFAULT", "debug");
        // The CLI's storage override must not clash with the [storage] section
        env::set_var("FLEXPRESET_STORAGE", "/elsewhere");
    }

    let settings = Settings::load();

    unsafe {
        env::remove_var("FLEXPRESET_WATCH__DEBOUNCE_MS");
        env::remove_var("FLEXPRESET_STORAGE__QUARANTINE_CORRUPT");
        env::remove_var("FLEXPRESET_LOGGING__DEFAULT");
        env::remove_var("FLEXPRESET_STORAGE");
    }
    env::set_current_dir(original_dir).unwrap();

    let settings = settings.unwrap();
    // Environment beats the file
    assert_eq!(settings.watch.debounce_ms, 250);
    assert!(settings.storage.quarantine_corrupt);
    assert_eq!(settings.logging.default, "debug");
    // File beats the defaults
    assert_eq!(settings.watch.tick_ms, 40);
    // Relative storage dir resolves against the workspace root
    assert!(settings.storage.dir.is_absolute());
    assert!(settings.storage.dir.ends_with("shared/presets"));
    // Defaults fill the rest
    assert!(settings.broadcast.enabled);
}

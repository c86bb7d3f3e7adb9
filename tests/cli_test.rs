use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

fn flexpreset(cwd: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_flexpreset"))
        .current_dir(cwd)
        .env_remove("FLEXPRESET_STORAGE")
        .args(args)
        .output()
        .expect("Failed to run flexpreset")
}

fn stdout(output: &Output) -> String {
    String::from_utf8(output.stdout.clone()).unwrap()
}

#[test]
fn test_init_seeds_default_collection() {
    let temp_dir = TempDir::new().unwrap();

    let output = flexpreset(temp_dir.path(), &["init"]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert!(temp_dir.path().join(".flexpreset/settings.toml").exists());
    assert!(temp_dir.path().join(".flexpreset/presets/default.toml").exists());

    let output = flexpreset(temp_dir.path(), &["show", "default", "example"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("sample_key"));

    // Second init without --force refuses
    assert!(!flexpreset(temp_dir.path(), &["init"]).status.success());

    let output = flexpreset(temp_dir.path(), &["config"]);
    assert!(stdout(&output).contains("debounce_ms = 300"));
}

#[test]
fn test_edit_commands() {
    let temp_dir = TempDir::new().unwrap();
    let storage = temp_dir.path().join("store");
    let storage = storage.to_str().unwrap();
    let run = |args: &[&str]| {
        let mut full = vec!["--storage", storage];
        full.extend_from_slice(args);
        flexpreset(temp_dir.path(), &full)
    };

    assert!(run(&["set", "styles", "sunset", "steps", "int", "20"]).status.success());
    assert!(run(&["set", "styles", "sunset", "cfg", "float", "4.55"]).status.success());
    assert!(run(&["reorder", "styles", "sunset", "cfg", "steps"]).status.success());

    let shown = stdout(&run(&["show", "styles", "sunset"]));
    let cfg = shown.find("cfg").unwrap();
    let steps = shown.find("steps").unwrap();
    assert!(cfg < steps, "{shown}");

    let outputs = stdout(&run(&["outputs", "styles", "sunset"]));
    assert!(outputs.contains("cfg_float FLOAT = 4.55"), "{outputs}");
    assert!(outputs.contains("steps_int INT = 20"), "{outputs}");

    // Coerced with a warning, still succeeds
    let output = run(&["set", "styles", "sunset", "steps", "int", "many"]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Warning"));

    assert!(run(&["rename-title", "styles", "sunset", "dusk"]).status.success());
    assert_eq!(stdout(&run(&["list", "styles"])).trim(), "dusk");
    assert!(stdout(&run(&["list"])).contains("styles (1 presets)"));

    // Unknown type and missing preset fail
    assert!(!run(&["set", "styles", "dusk", "x", "bool", "1"]).status.success());
    assert!(!run(&["show", "styles", "sunset"]).status.success());
}

#[test]
fn test_storage_from_environment() {
    let temp_dir = TempDir::new().unwrap();
    let storage = temp_dir.path().join("from_env");
    let run = |args: &[&str]| {
        Command::new(env!("CARGO_BIN_EXE_flexpreset"))
            .current_dir(temp_dir.path())
            .env("FLEXPRESET_STORAGE", &storage)
            .args(args)
            .output()
            .expect("Failed to run flexpreset")
    };

    let output = run(&["set", "styles", "sunset", "steps", "int", "20"]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert!(storage.join("styles.toml").exists());

    let output = run(&["list"]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert!(stdout(&output).contains("styles (1 presets)"));
}

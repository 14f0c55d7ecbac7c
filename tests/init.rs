use std::process::Command;

#[test]
fn init_creates_valid_toml() {
    let dir = tempfile::tempdir().unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_pacminer"))
        .arg("init")
        .current_dir(dir.path())
        .output()
        .unwrap();

    assert!(
        output.status.success(),
        "pacminer init failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let config_path = dir.path().join(".pacminer.toml");
    assert!(config_path.exists(), ".pacminer.toml should exist");

    let content = std::fs::read_to_string(&config_path).unwrap();
    assert!(content.contains("[collect]"));
    assert!(content.contains("[mining]"));

    let config: pacminer_core::PacConfig = toml::from_str(&content).unwrap();
    assert!(config.collect.parallel);
    assert_eq!(config.mining.top_rules, 20);
    assert_eq!(
        config.aggregate.output,
        std::path::PathBuf::from("outputs/aggregated_results.json")
    );
}

#[test]
fn init_refuses_if_exists() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join(".pacminer.toml"), "# existing").unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_pacminer"))
        .arg("init")
        .current_dir(dir.path())
        .output()
        .unwrap();

    assert!(!output.status.success());
    let content = std::fs::read_to_string(dir.path().join(".pacminer.toml")).unwrap();
    assert_eq!(content, "# existing");
}

//! Configuration loading and precedence tests

use jsbridge_config::{ConfigError, ConfigLoader, EngineConfig, CONFIG_FILE_NAME};
use pretty_assertions::assert_eq;
use rstest::rstest;
use serial_test::serial;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn create_config_file(dir: &Path, content: &str) -> PathBuf {
    let config_path = dir.join(CONFIG_FILE_NAME);
    fs::write(&config_path, content).unwrap();
    config_path
}

fn loader_without_global(dir: &TempDir) -> ConfigLoader {
    ConfigLoader::with_global_config(dir.path().join("absent-global.toml"))
}

// ============================================================================
// Config Loading Tests
// ============================================================================

#[test]
#[serial]
fn test_load_project_config_basic() {
    let temp_dir = TempDir::new().unwrap();
    create_config_file(
        temp_dir.path(),
        r#"
[limits]
max_stack_size = 524288
memory_limit = 33554432
"#,
    );

    let config = loader_without_global(&temp_dir)
        .load_from_directory(temp_dir.path())
        .unwrap();

    assert!(config.is_project());
    assert_eq!(config.engine.max_stack_size(), Some(512 * 1024));
    assert_eq!(config.engine.memory_limit(), Some(32 * 1024 * 1024));
    assert_eq!(config.engine.gc_threshold(), None);
}

#[test]
#[serial]
fn test_load_when_no_config_exists() {
    let temp_dir = TempDir::new().unwrap();

    let config = loader_without_global(&temp_dir)
        .load_from_directory(temp_dir.path())
        .unwrap();

    assert!(!config.is_project());
    assert_eq!(config.engine, EngineConfig::default());
}

#[test]
#[serial]
fn test_load_from_nested_subdirectory() {
    let temp_dir = TempDir::new().unwrap();
    create_config_file(temp_dir.path(), "[eval]\nstrict = true\n");

    let nested = temp_dir.path().join("a").join("b");
    fs::create_dir_all(&nested).unwrap();

    let config = loader_without_global(&temp_dir)
        .load_from_directory(&nested)
        .unwrap();

    assert!(config.engine.strict());
    assert_eq!(config.project_root(), Some(temp_dir.path()));
}

#[test]
#[serial]
fn test_load_from_specific_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("custom.toml");
    fs::write(&path, "[eval]\ndefault_label = \"custom.js\"\n").unwrap();

    let config = loader_without_global(&temp_dir)
        .load_from_file(&path)
        .unwrap();

    assert_eq!(config.engine.default_label(), "custom.js");
    assert_eq!(config.project_root(), Some(temp_dir.path()));
}

#[test]
#[serial]
fn test_missing_specific_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("nope.toml");

    let result = loader_without_global(&temp_dir).load_from_file(&path);

    assert!(matches!(result, Err(ConfigError::NotFound(p)) if p == path));
}

// ============================================================================
// Validation Tests
// ============================================================================

#[test]
#[serial]
fn test_invalid_toml_syntax() {
    let temp_dir = TempDir::new().unwrap();
    create_config_file(temp_dir.path(), "[limits\nmax_stack_size = ");

    let result = loader_without_global(&temp_dir).load_from_directory(temp_dir.path());

    assert!(matches!(result, Err(ConfigError::TomlParseError { .. })));
}

#[test]
#[serial]
fn test_unknown_field_rejected() {
    let temp_dir = TempDir::new().unwrap();
    create_config_file(temp_dir.path(), "[limits]\nheap = 12\n");

    let result = loader_without_global(&temp_dir).load_from_directory(temp_dir.path());

    assert!(matches!(result, Err(ConfigError::TomlParseError { .. })));
}

#[rstest]
#[case("[limits]\nmax_stack_size = 100\n", "limits.max_stack_size")]
#[case("[limits]\nmemory_limit = 0\n", "limits.memory_limit")]
#[case("[limits]\ngc_threshold = 0\n", "limits.gc_threshold")]
#[case("[eval]\ndefault_label = \"\"\n", "eval.default_label")]
#[serial]
fn test_invalid_values(#[case] content: &str, #[case] expected_field: &str) {
    let temp_dir = TempDir::new().unwrap();
    create_config_file(temp_dir.path(), content);

    let result = loader_without_global(&temp_dir).load_from_directory(temp_dir.path());

    match result {
        Err(ConfigError::InvalidValue { field, .. }) => assert_eq!(field, expected_field),
        other => panic!("expected InvalidValue, got {:?}", other),
    }
}

// ============================================================================
// Precedence Tests
// ============================================================================

#[test]
#[serial]
fn test_project_overrides_global_field_by_field() {
    let temp_dir = TempDir::new().unwrap();
    let global = temp_dir.path().join("global.toml");
    fs::write(
        &global,
        r#"
[limits]
max_stack_size = 65536
gc_threshold = 4096

[eval]
default_label = "global.js"
"#,
    )
    .unwrap();

    let project = temp_dir.path().join("project");
    fs::create_dir(&project).unwrap();
    create_config_file(&project, "[limits]\nmax_stack_size = 131072\n");

    let config = ConfigLoader::with_global_config(&global)
        .load_from_directory(&project)
        .unwrap();

    assert_eq!(config.engine.max_stack_size(), Some(131_072));
    assert_eq!(config.engine.gc_threshold(), Some(4096));
    assert_eq!(config.engine.default_label(), "global.js");
}

#[test]
#[serial]
fn test_invalid_global_config_is_reported() {
    let temp_dir = TempDir::new().unwrap();
    let global = temp_dir.path().join("global.toml");
    fs::write(&global, "not toml at all = = =").unwrap();

    let result = ConfigLoader::with_global_config(&global).load_from_directory(temp_dir.path());

    assert!(matches!(result, Err(ConfigError::TomlParseError { .. })));
}

#[rstest]
#[case("true", true)]
#[case("1", true)]
#[case("YES", true)]
#[case("false", false)]
#[case("0", false)]
#[serial]
fn test_env_override_strict(#[case] raw: &str, #[case] expected: bool) {
    let temp_dir = TempDir::new().unwrap();
    create_config_file(temp_dir.path(), "[eval]\nstrict = false\n");

    env::set_var("JSBRIDGE_STRICT", raw);
    let result = loader_without_global(&temp_dir).load_from_directory(temp_dir.path());
    env::remove_var("JSBRIDGE_STRICT");

    assert_eq!(result.unwrap().engine.strict(), expected);
}

#[test]
#[serial]
fn test_env_override_limits() {
    let temp_dir = TempDir::new().unwrap();

    env::set_var("JSBRIDGE_MEMORY_LIMIT", "1048576");
    env::set_var("JSBRIDGE_GC_THRESHOLD", " 2048 ");
    let result = loader_without_global(&temp_dir).load_from_directory(temp_dir.path());
    env::remove_var("JSBRIDGE_MEMORY_LIMIT");
    env::remove_var("JSBRIDGE_GC_THRESHOLD");

    let config = result.unwrap();
    assert_eq!(config.engine.memory_limit(), Some(1024 * 1024));
    assert_eq!(config.engine.gc_threshold(), Some(2048));
}

#[test]
#[serial]
fn test_env_override_is_validated() {
    let temp_dir = TempDir::new().unwrap();

    env::set_var("JSBRIDGE_MAX_STACK_SIZE", "16");
    let result = loader_without_global(&temp_dir).load_from_directory(temp_dir.path());
    env::remove_var("JSBRIDGE_MAX_STACK_SIZE");

    assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
}

#[test]
#[serial]
fn test_env_override_unparseable_number() {
    let temp_dir = TempDir::new().unwrap();

    env::set_var("JSBRIDGE_MEMORY_LIMIT", "lots");
    let result = loader_without_global(&temp_dir).load_from_directory(temp_dir.path());
    env::remove_var("JSBRIDGE_MEMORY_LIMIT");

    match result {
        Err(ConfigError::InvalidValue { field, .. }) => assert_eq!(field, "JSBRIDGE_MEMORY_LIMIT"),
        other => panic!("expected InvalidValue, got {:?}", other),
    }
}

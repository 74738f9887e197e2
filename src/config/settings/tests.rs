use super::*;

#[test]
fn default_config_is_valid() {
    let config = Config::default();
    config.validate().expect("defaults should validate");

    assert_eq!(config.retrieval.top_k, 3);
    assert_eq!(config.memory.window, 8);
    assert_eq!(config.embedding.backend, EmbeddingBackendKind::Ollama);
    assert_eq!(config.generation.backend, GenerationBackendKind::OpenAi);
}

#[test]
fn load_missing_file_returns_defaults() {
    let dir = tempfile::tempdir().expect("tempdir");

    let config = Config::load(dir.path()).expect("load should succeed");

    assert_eq!(config.embedding.model, "nomic-embed-text:latest");
    assert_eq!(config.base_dir, dir.path());
}

#[test]
fn save_load_round_trip() {
    let dir = tempfile::tempdir().expect("tempdir");

    let mut config = Config {
        base_dir: dir.path().to_path_buf(),
        ..Config::default()
    };
    config.retrieval.top_k = 5;
    config.memory.window = 12;
    config.generation.model = "gpt-4o".to_string();
    config.content.base_url = "https://www.example.com".to_string();
    config.save().expect("save should succeed");

    let loaded = Config::load(dir.path()).expect("load should succeed");

    assert_eq!(loaded.retrieval.top_k, 5);
    assert_eq!(loaded.memory.window, 12);
    assert_eq!(loaded.generation.model, "gpt-4o");
    assert_eq!(loaded.content.base_url, "https://www.example.com");
}

#[test]
fn rejects_zero_top_k() {
    let mut config = Config::default();
    config.retrieval.top_k = 0;

    let err = config.validate().expect_err("top_k = 0 should fail");
    assert!(matches!(err, ConfigError::InvalidTopK(0)));
}

#[test]
fn rejects_oversized_memory_window() {
    let mut config = Config::default();
    config.memory.window = 500;

    let err = config.validate().expect_err("window = 500 should fail");
    assert!(matches!(err, ConfigError::InvalidMemoryWindow(500)));
}

#[test]
fn rejects_bad_protocol() {
    let mut config = Config::default();
    config.embedding.protocol = "ftp".to_string();

    let err = config.validate().expect_err("ftp should fail");
    assert!(matches!(err, ConfigError::InvalidProtocol(_)));
}

#[test]
fn rejects_empty_model() {
    let mut config = Config::default();
    config.generation.model = "  ".to_string();

    let err = config.validate().expect_err("blank model should fail");
    assert!(matches!(err, ConfigError::InvalidModel(_)));
}

#[test]
fn rejects_out_of_range_temperature() {
    let mut config = Config::default();
    config.generation.temperature = 3.5;

    let err = config.validate().expect_err("temperature 3.5 should fail");
    assert!(matches!(err, ConfigError::InvalidTemperature(_)));
}

#[test]
fn rejects_bad_base_url() {
    let mut config = Config::default();
    config.content.base_url = "not a url".to_string();

    let err = config.validate().expect_err("bad base_url should fail");
    assert!(matches!(err, ConfigError::InvalidUrl(_)));
}

#[test]
fn rejects_invalid_toml_on_load() {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::write(dir.path().join("config.toml"), "not [valid toml").expect("write");

    assert!(Config::load(dir.path()).is_err());
}

#[test]
fn load_rejects_out_of_range_values() {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::write(
        dir.path().join("config.toml"),
        "[retrieval]\ntop_k = 9999\n",
    )
    .expect("write");

    assert!(Config::load(dir.path()).is_err());
}

#[test]
fn index_path_lives_under_base_dir() {
    let config = Config {
        base_dir: std::path::PathBuf::from("/tmp/ragchat-test"),
        ..Config::default()
    };

    assert_eq!(
        config.index_path(),
        std::path::PathBuf::from("/tmp/ragchat-test/index.bin")
    );
}

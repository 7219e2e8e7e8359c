use ocr_core::config::ConfigLoader;
use serde_yaml::Value;
use std::io::Write;

fn write_temp(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn layers_merge_base_engine_preset_and_overrides() {
    let base = write_temp(
        r#"
engine_profile:
  engine: parseq
  device: cpu
  ensemble:
    reranker:
      confidence: 0.5
      pattern_match: 0.2
      keyword_match: 0.15
      contextual: 0.15
      short_text_penalty: 0.3
      symbol_penalty: 0.2
      space_penalty: 0.15
"#,
    );
    let engine = write_temp(
        r#"
engine_profile:
  engine: parseq_enhanced
"#,
    );
    let overrides: Value = serde_yaml::from_str("engine_profile:\n  model_name: tiny\n").unwrap();

    let config = ConfigLoader::new()
        .with_base_file(base.path())
        .unwrap()
        .with_engine_file(engine.path())
        .unwrap()
        .with_overrides(overrides)
        .load()
        .unwrap();

    assert_eq!(config.engine_profile.model_name.as_deref(), Some("tiny"));
}

#[test]
fn unknown_engine_kind_is_rejected() {
    let base = write_temp(
        r#"
engine_profile:
  engine: not_a_real_engine
"#,
    );
    let err = ConfigLoader::new().with_base_file(base.path()).unwrap().load();
    assert!(err.is_err());
}

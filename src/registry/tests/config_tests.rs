//! Unit tests for the registry configuration document.

use crate::registry::config::RegistryConfig;
use crate::registry::domain::RegistryError;
use camino::Utf8PathBuf;
use rstest::rstest;

#[rstest]
fn bundled_configuration_parses() {
    let config = RegistryConfig::bundled().expect("bundled configuration parses");

    assert_eq!(config.default_workflow, "delivery");
    assert_eq!(config.workflows.len(), 1);
    let delivery = config.workflows.first().expect("delivery workflow");
    assert_eq!(delivery.initial_state, "DRAFT");
    assert_eq!(delivery.gates.len(), 9);
    assert_eq!(delivery.merge_gate.name, "branch.merge");
}

#[rstest]
fn required_inputs_default_to_empty() {
    let document = r#"
        version = "1"
        default_workflow = "mini"
        unblock_template = "supply {{ key }}"

        [[workflows]]
        name = "mini"
        initial_state = "DRAFT"

        [workflows.merge_gate]
        name = "mini.merge"

        [[workflows.gates]]
        name = "mini.start"
        from = "DRAFT"
        to = "DONE"
    "#;

    let config = RegistryConfig::from_toml_str(document).expect("minimal document parses");
    let gate = config
        .workflows
        .first()
        .and_then(|workflow| workflow.gates.first())
        .expect("one gate");
    assert!(gate.required_inputs.is_empty());
    assert!(config.personas.is_empty());
}

#[rstest]
#[case("version = ")]
#[case("version = \"1\"\ndefault_workflow = 3")]
fn malformed_documents_are_parse_errors(#[case] document: &str) {
    assert!(matches!(
        RegistryConfig::from_toml_str(document),
        Err(RegistryError::Parse(_))
    ));
}

#[rstest]
fn configuration_loads_from_a_file() {
    let dir = tempfile::tempdir().expect("temporary directory");
    let path = Utf8PathBuf::from_path_buf(dir.path().join("registry.toml"))
        .expect("utf-8 temporary path");
    std::fs::write(&path, include_str!("../default_registry.toml")).expect("write registry");

    let config = RegistryConfig::load(&path).expect("configuration loads");
    assert_eq!(config.version, "2026.10.0");
}

#[rstest]
fn loading_a_missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().expect("temporary directory");
    let path = Utf8PathBuf::from_path_buf(dir.path().join("absent.toml"))
        .expect("utf-8 temporary path");

    assert!(matches!(
        RegistryConfig::load(&path),
        Err(RegistryError::Io(_))
    ));
}

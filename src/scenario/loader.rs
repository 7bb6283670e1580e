//! Leitura de documentos de cenário do disco.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use super::Scenario;

pub fn load_scenario_from_file<P: AsRef<Path>>(path: P) -> Result<Scenario> {
    let path_ref = path.as_ref();

    let content = fs::read_to_string(path_ref)
        .with_context(|| format!("Failed to read scenario file {:?}", path_ref))?;

    parse_scenario(&content).with_context(|| format!("Failed to parse scenario {:?}", path_ref))
}

pub fn parse_scenario(content: &str) -> Result<Scenario> {
    Ok(serde_json::from_str(content)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "name": "from disk", "steps": [{{ "action": "set_suspended", "params": {{ "suspended": true }} }}] }}"#
        )
        .unwrap();

        let scenario = load_scenario_from_file(file.path()).unwrap();

        assert_eq!(scenario.name, "from disk");
        assert_eq!(scenario.steps.len(), 1);
    }

    #[test]
    fn test_missing_file_names_the_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.json");

        let err = load_scenario_from_file(&path).unwrap_err();

        assert!(err.to_string().contains("Failed to read scenario file"));
        assert!(err.to_string().contains("absent.json"));
    }

    #[test]
    fn test_unknown_action_is_a_parse_error() {
        let err = parse_scenario(
            r#"{ "name": "bad", "steps": [{ "action": "launch_rocket", "params": {} }] }"#,
        )
        .unwrap_err();

        assert!(err.to_string().contains("launch_rocket"));
    }
}

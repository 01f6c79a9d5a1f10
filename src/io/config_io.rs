use std::fs;
use std::path::Path;

use crate::io::project_io::ProjectError;
use crate::model::config::ProjectConfig;
use crate::ops::sort::SortKey;

/// Read config.toml, returning both the parsed config and the raw
/// toml_edit document for format-preserving edits.
pub fn read_config(tasks_dir: &Path) -> Result<(ProjectConfig, toml_edit::DocumentMut), ProjectError> {
    let config_path = tasks_dir.join("config.toml");
    let config_text = fs::read_to_string(&config_path).map_err(|e| ProjectError::ReadError {
        path: config_path.clone(),
        source: e,
    })?;
    let config: ProjectConfig = toml::from_str(&config_text)?;
    let doc: toml_edit::DocumentMut = config_text.parse()?;
    Ok((config, doc))
}

/// Write the config document back to disk, preserving formatting.
pub fn write_config(tasks_dir: &Path, doc: &toml_edit::DocumentMut) -> Result<(), ProjectError> {
    let config_path = tasks_dir.join("config.toml");
    fs::write(&config_path, doc.to_string()).map_err(|e| ProjectError::ReadError {
        path: config_path,
        source: e,
    })?;
    Ok(())
}

/// Set `[view] sort` in the config document
pub fn set_sort(doc: &mut toml_edit::DocumentMut, key: SortKey) {
    if !doc.contains_key("view") {
        doc["view"] = toml_edit::Item::Table(toml_edit::Table::new());
    }
    doc["view"]["sort"] = toml_edit::value(key.as_str());
}

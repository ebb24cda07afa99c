use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use std::{
    env, fs,
    path::{Path, PathBuf},
};

const FIXTURE_ENV: &str = "FACEBLUR_FIXTURE_ROOT";

/// Resolve the directory holding test fixtures.
///
/// `FACEBLUR_FIXTURE_ROOT` takes precedence; otherwise the first `fixtures` directory found
/// walking up from this crate's manifest is used.
pub fn fixtures_dir() -> Result<PathBuf> {
    if let Ok(value) = env::var(FIXTURE_ENV) {
        return Ok(PathBuf::from(value));
    }

    let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    manifest_dir
        .ancestors()
        .map(|ancestor| ancestor.join("fixtures"))
        .find(|candidate| candidate.is_dir())
        .with_context(|| {
            format!(
                "fixtures directory not found starting from {}",
                manifest_dir.display()
            )
        })
}

/// Resolve a path inside the fixture folder, failing if it does not exist.
pub fn fixture_path<P: AsRef<Path>>(relative: P) -> Result<PathBuf> {
    let relative = relative.as_ref();
    let root = fixtures_dir()?;
    let full = root.join(relative);
    anyhow::ensure!(
        full.exists(),
        "fixture {} does not exist under {}",
        relative.display(),
        root.display()
    );
    Ok(full)
}

/// Load fixture contents as bytes.
pub fn load_fixture_bytes<P: AsRef<Path>>(relative: P) -> Result<Vec<u8>> {
    let path = fixture_path(relative)?;
    fs::read(&path).with_context(|| format!("failed to read fixture {}", path.display()))
}

/// Load fixture JSON into a strongly-typed structure.
pub fn load_fixture_json<P, T>(relative: P) -> Result<T>
where
    P: AsRef<Path>,
    T: DeserializeOwned,
{
    let path = fixture_path(relative)?;
    let contents = fs::read_to_string(&path)
        .with_context(|| format!("failed to read JSON fixture {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("failed to parse JSON fixture {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn fixture_path_resolves_existing_file() {
        let path = fixture_path("anchors_rfb640.json").expect("anchor fixture should exist");
        assert!(path.ends_with("anchors_rfb640.json"));
    }

    #[test]
    fn fixture_path_missing_file_errors() {
        assert!(fixture_path("missing.json").is_err());
    }

    #[test]
    fn load_fixture_json_parses_values() {
        let value: Value = load_fixture_json("anchors_rfb640.json").expect("load fixture");
        assert_eq!(value["count"], 17640);
    }

    #[test]
    fn load_fixture_bytes_reads_contents() {
        let bytes = load_fixture_bytes("anchors_rfb640.json").expect("read fixture");
        assert!(bytes.starts_with(b"{"));
    }
}

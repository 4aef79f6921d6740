//! JSON record codec
//!
//! Records are read whole and rewritten whole. A write goes to a temporary
//! file in the destination directory which is then renamed over the target,
//! so readers observe either the old or the new document, never a torn one.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::ser::PrettyFormatter;

use crate::constants::RECORD_FILE_MODE;
use crate::error::{AppError, AppResult, IoContext};

/// Read and deserialize a JSON record.
///
/// Parse and shape errors are reported as [`AppError::Corrupt`].
pub fn read_json<T: DeserializeOwned>(path: &Path) -> AppResult<T> {
    let bytes = fs::read(path).io_context(|| format!("read {}", path.display()))?;
    serde_json::from_slice(&bytes).map_err(|e| AppError::corrupt(path, e.to_string()))
}

/// Serialize `value` and atomically replace the file at `path`
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> AppResult<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let tmp = tempfile::NamedTempFile::new_in(dir)
        .io_context(|| format!("create temp file in {}", dir.display()))?;

    {
        let mut writer = BufWriter::new(tmp.as_file());
        let mut ser =
            serde_json::Serializer::with_formatter(&mut writer, PrettyFormatter::with_indent(b"    "));
        value.serialize(&mut ser)?;
        writer
            .write_all(b"\n")
            .and_then(|()| writer.flush())
            .io_context(|| format!("write {}", path.display()))?;
    }
    tmp.as_file()
        .sync_all()
        .io_context(|| format!("sync {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tmp.as_file()
            .set_permissions(fs::Permissions::from_mode(RECORD_FILE_MODE))
            .io_context(|| format!("chmod {}", path.display()))?;
    }

    tmp.persist(path)
        .map_err(|e| AppError::io(format!("replace {}", path.display()), e.error))?;

    tracing::debug!(path = %path.display(), "record written");
    Ok(())
}

/// True when the file is absent or has zero length
pub fn is_missing_or_empty(path: &Path) -> bool {
    fs::metadata(path).map(|m| m.len() == 0).unwrap_or(true)
}

/// Copy `src` over `dest` unless `dest` already has content
pub fn seed_from_template(dest: &Path, template: &Path) -> AppResult<bool> {
    if !is_missing_or_empty(dest) {
        return Ok(false);
    }
    let doc: serde_json::Value = read_json(template)?;
    write_json(dest, &doc)?;
    tracing::info!(
        path = %dest.display(),
        template = %template.display(),
        "seeded record from template"
    );
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Doc {
        name: String,
        count: Option<u32>,
    }

    #[test]
    fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.json");
        let doc = Doc {
            name: "a".to_string(),
            count: None,
        };

        write_json(&path, &doc).unwrap();
        let back: Doc = read_json(&path).unwrap();
        assert_eq!(back, doc);

        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text, "{\n    \"name\": \"a\",\n    \"count\": null\n}\n");
    }

    #[test]
    fn test_write_replaces_existing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.json");
        fs::write(&path, "garbage that is much longer than the new document").unwrap();

        write_json(&path, &serde_json::json!([])).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "[]\n");

        // no temp files left behind
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o644);
        }
    }

    #[test]
    fn test_read_invalid_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.json");
        fs::write(&path, "{\"name\": 3}").unwrap();

        let err = read_json::<Doc>(&path).unwrap_err();
        assert!(matches!(err, AppError::Corrupt { .. }));
    }

    #[test]
    fn test_read_missing_is_io() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_json::<Doc>(&dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, AppError::Io { .. }));
    }

    #[test]
    fn test_seed_only_when_missing_or_empty() {
        let dir = tempfile::tempdir().unwrap();
        let template = dir.path().join("init.json");
        let live = dir.path().join("live.json");
        write_json(&template, &serde_json::json!({"seed": true})).unwrap();

        fs::write(&live, "").unwrap();
        assert!(seed_from_template(&live, &template).unwrap());
        assert!(!seed_from_template(&live, &template).unwrap());

        let value: serde_json::Value = read_json(&live).unwrap();
        assert_eq!(value["seed"], true);
    }
}

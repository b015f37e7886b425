//! Pluggable sidecar metadata: typed descriptors serialized next to the
//! main file they describe.

use std::path::{Path, PathBuf};

/// A user-supplied sidecar descriptor.
///
/// `kind` is a stable identifier used as the sidecar filename suffix; it
/// must match `[a-z0-9_]+` so sidecar names stay unambiguous with respect
/// to the main file's name. `movable` controls whether the sidecar follows
/// the main file across [`crate::store::Store::move_file`].
pub trait MetadataDescriptor {
    /// Stable identifier used as the sidecar filename suffix.
    fn kind(&self) -> &str;

    /// Whether this sidecar should follow the main file during state
    /// transitions.
    fn movable(&self) -> bool {
        true
    }

    /// Serializes the descriptor's current value to bytes.
    fn to_bytes(&self) -> Vec<u8>;

    /// Populates the descriptor from previously-serialized bytes.
    fn from_bytes(&mut self, bytes: &[u8]);
}

/// In-place byte-range update contract used by `SetFileMetadataAt`.
pub trait ByteRangeUpdate: MetadataDescriptor {
    /// Bytes to write at `offset()` in the existing sidecar.
    fn patch(&self) -> &[u8];

    /// Offset, in bytes, at which `patch()` should be written.
    fn offset(&self) -> u64;
}

/// Computes the sidecar path for `main_path` and a metadata `kind`.
///
/// Template: `<parent>/<basename>_<kind>`, stable across restarts and
/// unambiguous with respect to the main file as long as `kind` avoids the
/// separator byte (enforced by convention, not validated here — a
/// misbehaving `kind` is a programmer error, same class as `InvalidName`).
pub fn sidecar_path(main_path: &Path, kind: &str) -> PathBuf {
    let parent = main_path.parent().unwrap_or_else(|| Path::new(""));
    let basename = main_path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
    parent.join(format!("{basename}_{kind}"))
}

/// Lists the metadata kinds actually present on disk next to `main_path`,
/// by reversing [`sidecar_path`]'s `<basename>_<kind>` template against the
/// parent directory's listing.
///
/// Used instead of trusting a `FileEntry`'s in-memory metadata cache for
/// operations (`delete`, `move_to`) that must account for every sidecar
/// regardless of whether this process instance ever loaded it.
pub fn list_sidecar_kinds(main_path: &Path) -> std::io::Result<Vec<String>> {
    let parent = main_path.parent().unwrap_or_else(|| Path::new(""));
    let basename = main_path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
    let prefix = format!("{basename}_");

    let entries = match std::fs::read_dir(parent) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let mut kinds = Vec::new();
    for entry in entries {
        let entry = entry?;
        if let Some(file_name) = entry.file_name().to_str() {
            if let Some(kind) = file_name.strip_prefix(&prefix) {
                kinds.push(kind.to_owned());
            }
        }
    }
    Ok(kinds)
}

#[cfg(test)]
mod list_sidecar_kinds_tests {
    use super::*;

    #[test]
    fn finds_sidecars_regardless_of_cache() {
        let dir = tempfile::TempDir::new().unwrap();
        let main = dir.path().join("a.txt");
        std::fs::write(&main, b"main").unwrap();
        std::fs::write(sidecar_path(&main, "checksum"), b"c").unwrap();
        std::fs::write(sidecar_path(&main, "owner"), b"o").unwrap();

        let mut kinds = list_sidecar_kinds(&main).unwrap();
        kinds.sort();
        assert_eq!(kinds, vec!["checksum".to_owned(), "owner".to_owned()]);
    }

    #[test]
    fn missing_parent_yields_empty_list() {
        let missing = Path::new("/no/such/parent/a.txt");
        assert_eq!(list_sidecar_kinds(missing).unwrap(), Vec::<String>::new());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sidecar_path_is_sibling_of_main_file() {
        let main = Path::new("/repo/state/ab/cd/abcdef0123");
        assert_eq!(
            sidecar_path(main, "checksum"),
            PathBuf::from("/repo/state/ab/cd/abcdef0123_checksum")
        );
    }
}

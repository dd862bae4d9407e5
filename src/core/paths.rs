//! Bundle directory layout and shared path manipulation utilities.
//!
//! ```text
//! <bundle_dir>/
//!   uploads/        raw uploads awaiting conversion
//!   dbs/<id>.lsif.db converted dumps, one per id
//! ```

use std::env;
use std::path::{Component, Path, PathBuf};

/// Subdirectory holding uploads awaiting conversion.
pub const UPLOADS_DIR: &str = "uploads";

/// Subdirectory holding converted dumps.
pub const DBS_DIR: &str = "dbs";

/// Extension appended to a dump id to form its filename.
pub const DB_EXTENSION: &str = "lsif.db";

/// Directory of uploads awaiting conversion.
#[must_use]
pub fn uploads_dir(bundle_dir: &Path) -> PathBuf {
    bundle_dir.join(UPLOADS_DIR)
}

/// Directory of converted dumps.
#[must_use]
pub fn dbs_dir(bundle_dir: &Path) -> PathBuf {
    bundle_dir.join(DBS_DIR)
}

/// On-disk location of the dump with the given id.
#[must_use]
pub fn db_filename(bundle_dir: &Path, id: i64) -> PathBuf {
    dbs_dir(bundle_dir).join(format!("{id}.{DB_EXTENSION}"))
}

/// Parse the dump id encoded as the leading token (before the first `.`)
/// of a dump filename.
///
/// Returns `None` for names whose leading token is not an integer.
#[must_use]
pub fn parse_dump_id(file_name: &str) -> Option<i64> {
    let token = file_name.split('.').next()?;
    token.parse::<i64>().ok()
}

/// Resolve a path to an absolute, normalized path.
///
/// If `fs::canonicalize` succeeds (path exists), it is used to resolve symlinks
/// and normalize components.
///
/// If it fails (e.g. path does not exist), the path is made absolute relative
/// to CWD and `..`/`.` components are resolved syntactically.
pub fn resolve_absolute_path(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        env::current_dir().map_or_else(|_| path.to_path_buf(), |cwd| cwd.join(path))
    };

    if let Ok(canonical) = std::fs::canonicalize(&absolute) {
        return canonical;
    }

    normalize_syntactic(&absolute)
}

fn normalize_syntactic(path: &Path) -> PathBuf {
    let mut components = Vec::new();
    for component in path.components() {
        match component {
            Component::Prefix(..) | Component::RootDir | Component::Normal(_) => {
                components.push(component);
            }
            Component::CurDir => {}
            Component::ParentDir => {
                if let Some(Component::Normal(_)) = components.last() {
                    components.pop();
                }
            }
        }
    }
    components.into_iter().collect()
}

//! Resolution of referenced names against the indexed corpus.
//!
//! Maps the path-as-written (or bare basename) of a raw reference to a
//! concrete file already registered in the store. Resolution is purely
//! lexical: no filesystem access, so results are deterministic for a given
//! corpus regardless of the machine the scan runs on.
//!
//! The corpus is supplied through lookup closures, keeping this module free
//! of store plumbing and directly testable.

use std::path::{Component, Path, PathBuf};

/// Outcome of resolving one raw reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Exactly one target; its row id
    Resolved(i64),
    /// Nothing in the corpus matches
    Unresolved,
    /// Several files share the basename; row ids ordered by path
    Ambiguous(Vec<i64>),
}

/// Resolve a script reference.
///
/// Algorithm, in order:
/// 1. an absolute written path is looked up verbatim; a miss is recorded
///    `Unresolved` (a path outside the corpus is a fact worth surfacing,
///    not something to paper over with a basename guess);
/// 2. a relative written path containing a separator is normalized
///    lexically against the referring script's directory and looked up;
/// 3. otherwise the basename is looked up corpus-wide: one hit resolves,
///    zero is `Unresolved`, several are `Ambiguous` with all candidates.
pub fn resolve_script<P, B>(
    written: &str,
    basename: &str,
    referring_dir: &Path,
    by_path: P,
    by_basename: B,
) -> Resolution
where
    P: Fn(&Path) -> Option<i64>,
    B: Fn(&str) -> Vec<i64>,
{
    if written.starts_with('/') {
        return match by_path(Path::new(written)) {
            Some(id) => Resolution::Resolved(id),
            None => Resolution::Unresolved,
        };
    }

    if written.contains('/') && !written.contains('$') {
        let normalized = normalize_lexically(referring_dir, written);
        if let Some(id) = by_path(&normalized) {
            return Resolution::Resolved(id);
        }
    }

    resolve_by_basename(basename, by_basename)
}

/// Resolve a name by corpus-wide basename lookup only.
///
/// Used for control-file references, whose written paths are relative to the
/// loader's working directory rather than to the referring script.
pub fn resolve_by_basename<B>(basename: &str, by_basename: B) -> Resolution
where
    B: Fn(&str) -> Vec<i64>,
{
    let mut candidates = by_basename(basename);
    match candidates.len() {
        0 => Resolution::Unresolved,
        1 => Resolution::Resolved(candidates.remove(0)),
        _ => Resolution::Ambiguous(candidates),
    }
}

/// Normalize `written` against `base_dir` without touching the filesystem.
///
/// `.` components are dropped and `..` pops the trailing component of the
/// accumulated path. A `..` that would climb above the root is retained
/// unresolved (the later path lookup simply misses).
#[must_use]
pub fn normalize_lexically(base_dir: &Path, written: &str) -> PathBuf {
    let mut result: Vec<Component> = base_dir.components().collect();

    for component in Path::new(written).components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                match result.last() {
                    Some(Component::Normal(_)) => {
                        result.pop();
                    }
                    _ => result.push(Component::ParentDir),
                }
            }
            other => result.push(other),
        }
    }

    result.iter().collect()
}

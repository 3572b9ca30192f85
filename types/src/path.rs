//! Path canonicalization at the filesystem boundary (design note, §9). All
//! internal file keys are relative, forward-slash normalized
//! `Utf8PathBuf`s; conversion to/from absolute paths happens only here,
//! against a caller-supplied game root.

use std::sync::LazyLock;

use camino::{Utf8Path, Utf8PathBuf};
use regex::Regex;
use thiserror::Error;

pub type PathResult<T> = Result<T, PathError>;

#[derive(Debug, Error, Eq, PartialEq)]
pub enum PathError {
    #[error("expected a relative path, got an absolute one: \"{0}\"")]
    NotRelative(Utf8PathBuf),

    #[error("path \"{0}\" is not inside the game root \"{1}\"")]
    OutsideGameRoot(Utf8PathBuf, Utf8PathBuf),
}

/// Normalize `\` to `/` and collapse the path to its components; does not
/// touch the filesystem.
pub fn normalize_separators(p: &Utf8Path) -> Utf8PathBuf {
    Utf8PathBuf::from(p.as_str().replace('\\', "/"))
}

/// Convert an absolute path into one relative to `game_root`, normalizing
/// separators along the way.
pub fn relativize(absolute: &Utf8Path, game_root: &Utf8Path) -> PathResult<Utf8PathBuf> {
    let absolute = normalize_separators(absolute);
    let game_root = normalize_separators(game_root);

    absolute
        .strip_prefix(&game_root)
        .map(Utf8PathBuf::from)
        .map_err(|_| PathError::OutsideGameRoot(absolute.clone(), game_root))
}

/// Reject a path the caller claims is already relative; used at entry
/// points like `Registry::file_owner` that must not silently relativize.
pub fn require_relative(p: &Utf8Path) -> PathResult<()> {
    if p.is_absolute() {
        return Err(PathError::NotRelative(p.to_path_buf()));
    }

    Ok(())
}

/// `^GameData/(.*/)?([^.]+).*\.dll$`, case-insensitive, per §6.2.
static LOOSE_BINARY_SHORT_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^GameData/(?:.*/)?([^.]+).*\.dll$").expect("static regex is valid")
});

/// Derive the short name the registry indexes a loose binary under.
/// Returns `None` when `relative_path` doesn't match the expected shape,
/// in which case the caller must not index it (§6.2).
pub fn loose_binary_short_name(relative_path: &Utf8Path) -> Option<String> {
    let normalized = normalize_separators(relative_path);
    LOOSE_BINARY_SHORT_NAME
        .captures(normalized.as_str())
        .map(|caps| caps[1].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relativize_strips_game_root() {
        let root = Utf8PathBuf::from("/home/user/game");
        let abs = Utf8PathBuf::from("/home/user/game/GameData/Foo/foo.dll");
        assert_eq!(
            relativize(&abs, &root).unwrap(),
            Utf8PathBuf::from("GameData/Foo/foo.dll")
        );
    }

    #[test]
    fn relativize_rejects_paths_outside_root() {
        let root = Utf8PathBuf::from("/home/user/game");
        let abs = Utf8PathBuf::from("/somewhere/else/foo.dll");
        assert!(matches!(
            relativize(&abs, &root),
            Err(PathError::OutsideGameRoot(_, _))
        ));
    }

    #[test]
    fn require_relative_rejects_absolute() {
        assert!(require_relative(Utf8Path::new("/abs/path")).is_err());
        assert!(require_relative(Utf8Path::new("rel/path")).is_ok());
    }

    #[test]
    fn short_name_matches_nested_plugin() {
        assert_eq!(
            loose_binary_short_name(Utf8Path::new("GameData/Foo/Plugins/FooPlugin.v2.dll")),
            Some("FooPlugin".to_string())
        );
    }

    #[test]
    fn short_name_matches_top_level_plugin() {
        assert_eq!(
            loose_binary_short_name(Utf8Path::new("GameData/Bar.dll")),
            Some("Bar".to_string())
        );
    }

    #[test]
    fn short_name_is_case_insensitive_on_gamedata() {
        assert_eq!(
            loose_binary_short_name(Utf8Path::new("gamedata/Bar.dll")),
            Some("Bar".to_string())
        );
    }

    #[test]
    fn short_name_none_when_not_under_gamedata() {
        assert_eq!(
            loose_binary_short_name(Utf8Path::new("Other/Bar.dll")),
            None
        );
    }

    #[test]
    fn short_name_none_when_not_dll() {
        assert_eq!(
            loose_binary_short_name(Utf8Path::new("GameData/Bar.cfg")),
            None
        );
    }
}

use std::fs;
use std::path::Path;

use glob::Pattern;

use crate::error::{Error, Result};

pub fn ensure_dir(p: &Path) -> Result<()> {
    fs::create_dir_all(p)
        .map_err(|e| Error::io(format!("failed to create dir {}: {e}", p.display())))
}

pub fn write_text(p: &Path, s: &str) -> Result<()> {
    if let Some(parent) = p.parent() {
        ensure_dir(parent)?;
    }
    fs::write(p, s).map_err(|e| Error::io(format!("failed to write {}: {e}", p.display())))
}

pub fn compile_patterns(raw: &[&str]) -> Result<Vec<Pattern>> {
    raw.iter()
        .map(|p| {
            Pattern::new(p).map_err(|e| Error::msg(format!("invalid ignore pattern '{p}': {e}")))
        })
        .collect()
}

fn is_ignored(name: &std::ffi::OsStr, ignore: &[Pattern]) -> bool {
    let name = name.to_string_lossy();
    ignore.iter().any(|p| p.matches(&name))
}

/// Copy `src` into `dst`, merging with whatever is already there.
///
/// Entries whose file name matches one of `ignore` are skipped (directories with
/// their whole subtree). Symlinks are followed so the copy carries their content
/// and stays valid on other hosts.
pub fn copy_tree(src: &Path, dst: &Path, ignore: &[Pattern]) -> Result<usize> {
    if !src.is_dir() {
        return Err(Error::io(format!(
            "source is not a directory: {}",
            src.display()
        )));
    }
    ensure_dir(dst)?;

    let mut copied = 0usize;
    let walker = walkdir::WalkDir::new(src)
        .min_depth(1)
        .follow_links(true)
        .into_iter()
        .filter_entry(|e| !is_ignored(e.file_name(), ignore));
    for entry in walker {
        let entry = entry.map_err(|e| Error::io(format!("walkdir error: {e}")))?;
        let p = entry.path();
        let rel = p
            .strip_prefix(src)
            .map_err(|e| Error::msg(format!("strip_prefix failed: {e}")))?;
        let out = dst.join(rel);
        if entry.file_type().is_dir() {
            if fs::symlink_metadata(&out).is_ok_and(|m| m.file_type().is_symlink()) {
                remove_existing(&out)?;
            }
            ensure_dir(&out)?;
        } else {
            if let Some(parent) = out.parent() {
                ensure_dir(parent)?;
            }
            // A link left by an earlier copy would make fs::copy write through it.
            remove_existing(&out)?;
            fs::copy(p, &out).map_err(|e| {
                Error::io(format!(
                    "failed to copy {} -> {}: {e}",
                    p.display(),
                    out.display()
                ))
            })?;
            copied += 1;
        }
    }
    Ok(copied)
}

/// Remove `path` if anything (including a dangling symlink) is there.
pub fn remove_existing(path: &Path) -> Result<()> {
    let meta = match fs::symlink_metadata(path) {
        Ok(meta) => meta,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => {
            return Err(Error::io(format!("failed to inspect {}: {e}", path.display())));
        }
    };
    let res = if meta.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    res.map_err(|e| Error::io(format!("failed to remove {}: {e}", path.display())))
}

#[cfg(unix)]
pub fn symlink(target: &Path, link: &Path) -> Result<()> {
    std::os::unix::fs::symlink(target, link).map_err(|e| {
        Error::io(format!(
            "failed to symlink {} -> {}: {e}",
            link.display(),
            target.display()
        ))
    })
}

#[cfg(not(unix))]
pub fn symlink(target: &Path, link: &Path) -> Result<()> {
    let _ = (target, link);
    Err(Error::msg("symlinks are only supported on unix hosts"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copy_tree_skips_ignored_names_and_merges() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let src = tmp.path().join("src");
        let dst = tmp.path().join("dst");
        fs::create_dir_all(src.join("lib/obj")).expect("mkdir");
        fs::write(src.join("lib/libicuuc.a"), "a").expect("write");
        fs::write(src.join("lib/libicuuc.so.72"), "so").expect("write");
        fs::write(src.join("lib/obj/x.o"), "o").expect("write");
        fs::write(src.join("Makefile"), "all:").expect("write");
        fs::create_dir_all(&dst).expect("mkdir dst");
        fs::write(dst.join("keep.txt"), "k").expect("write");

        let ignore = compile_patterns(&["*.so.*", "*.o", "Makefile"]).expect("patterns");
        let copied = copy_tree(&src, &dst, &ignore).expect("copy");

        assert_eq!(copied, 1);
        assert!(dst.join("lib/libicuuc.a").is_file());
        assert!(!dst.join("lib/libicuuc.so.72").exists());
        assert!(!dst.join("lib/obj/x.o").exists());
        assert!(!dst.join("Makefile").exists());
        assert!(dst.join("keep.txt").is_file());
    }

    #[test]
    fn copy_tree_requires_directory() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let err = copy_tree(&tmp.path().join("missing"), tmp.path(), &[]).unwrap_err();
        assert!(err.to_string().contains("not a directory"));
    }

    #[cfg(unix)]
    #[test]
    fn copy_tree_follows_links() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let src = tmp.path().join("src");
        let shared = tmp.path().join("shared");
        let dst = tmp.path().join("dst");
        fs::create_dir_all(&src).expect("mkdir src");
        fs::create_dir_all(shared.join("fonts")).expect("mkdir shared");
        fs::write(shared.join("logo.png"), "png").expect("write");
        fs::write(shared.join("fonts/mono.ttf"), "ttf").expect("write");
        symlink(&shared.join("logo.png"), &src.join("logo.png")).expect("file link");
        symlink(&shared.join("fonts"), &src.join("fonts")).expect("dir link");

        let copied = copy_tree(&src, &dst, &[]).expect("copy");

        assert_eq!(copied, 2);
        for rel in ["logo.png", "fonts", "fonts/mono.ttf"] {
            let meta = fs::symlink_metadata(dst.join(rel)).expect("metadata");
            assert!(!meta.file_type().is_symlink(), "{rel} is still a link");
        }
        assert_eq!(fs::read_to_string(dst.join("logo.png")).expect("read"), "png");
    }

    #[cfg(unix)]
    #[test]
    fn copy_tree_replaces_stale_links_in_destination() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let src = tmp.path().join("src");
        let dst = tmp.path().join("dst");
        let outside = tmp.path().join("outside.txt");
        fs::create_dir_all(&src).expect("mkdir src");
        fs::create_dir_all(&dst).expect("mkdir dst");
        fs::write(src.join("a.txt"), "new").expect("write");
        fs::write(&outside, "old").expect("write");
        symlink(&outside, &dst.join("a.txt")).expect("stale link");

        copy_tree(&src, &dst, &[]).expect("copy");

        assert!(!fs::symlink_metadata(dst.join("a.txt")).expect("meta").file_type().is_symlink());
        assert_eq!(fs::read_to_string(&outside).expect("read"), "old");
    }

    #[test]
    fn remove_existing_ignores_missing_paths() {
        let tmp = tempfile::tempdir().expect("tempdir");
        remove_existing(&tmp.path().join("absent")).expect("missing is fine");
    }

    #[cfg(unix)]
    #[test]
    fn remove_existing_reports_inspection_errors() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let file = tmp.path().join("plain");
        fs::write(&file, "x").expect("write");

        // A path below a regular file fails with ENOTDIR, not NotFound.
        let err = remove_existing(&file.join("child")).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Io);
        assert!(err.to_string().contains("failed to inspect"));
    }

    #[cfg(unix)]
    #[test]
    fn remove_existing_handles_dangling_links() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let link = tmp.path().join("klepto");
        symlink(Path::new("nowhere"), &link).expect("symlink");
        assert!(!link.exists());

        remove_existing(&link).expect("remove");
        assert!(fs::symlink_metadata(&link).is_err());
    }
}

//! Zip archive creation for a staged build directory.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::{PackagingError, PackagingResult};

const COMPRESSION_LEVEL: i64 = 9;

/// Zip every file and directory under `src` into `dest`, skipping `dest`
/// itself. Entries are written in sorted path order.
pub(crate) fn zip_directory(src: &Path, dest: &Path) -> PackagingResult<u64> {
    let mut paths = walkdir(src)?;
    paths.sort();

    let file = File::create(dest).map_err(|e| PackagingError::io(dest, e))?;
    let mut writer = ZipWriter::new(file);
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(COMPRESSION_LEVEL));

    let mut entries = 0u64;
    for path in paths {
        if path == dest {
            continue;
        }
        let name = entry_name(src, &path)?;
        if path.is_dir() {
            writer.add_directory(name, options)?;
        } else {
            writer.start_file(name, options)?;
            let contents = std::fs::read(&path).map_err(|e| PackagingError::io(&path, e))?;
            writer
                .write_all(&contents)
                .map_err(|e| PackagingError::io(dest, e))?;
            entries += 1;
        }
    }
    writer.finish()?;

    debug!(files = entries, archive = %dest.display(), "created package archive");
    Ok(entries)
}

/// Archive entry name of `path`: relative to `root`, `/`-separated.
fn entry_name(root: &Path, path: &Path) -> PackagingResult<String> {
    let relative = path.strip_prefix(root).map_err(|e| {
        PackagingError::io(
            path,
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()),
        )
    })?;
    let parts: Vec<_> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect();
    Ok(parts.join("/"))
}

pub(crate) fn walkdir(path: &Path) -> PackagingResult<Vec<PathBuf>> {
    let entries = std::fs::read_dir(path).map_err(|e| PackagingError::io(path, e))?;
    let mut paths = Vec::new();

    for entry in entries {
        let entry = entry.map_err(|e| PackagingError::io(path, e))?;
        let path = entry.path();
        paths.push(path.clone());

        if path.is_dir() {
            paths.extend(walkdir(&path)?);
        }
    }

    Ok(paths)
}

/// Recursively copy `src` to `dest`, creating `dest`.
pub(crate) fn copy_tree(src: &Path, dest: &Path) -> PackagingResult<()> {
    std::fs::create_dir_all(dest).map_err(|e| PackagingError::io(dest, e))?;
    for path in walkdir(src)? {
        let target = dest.join(path.strip_prefix(src).unwrap_or(&path));
        if path.is_dir() {
            std::fs::create_dir_all(&target).map_err(|e| PackagingError::io(&target, e))?;
        } else {
            std::fs::copy(&path, &target).map_err(|e| PackagingError::io(&path, e))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn archive_contains_nested_files_but_not_itself() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("package.json"), "{}").unwrap();
        std::fs::create_dir_all(dir.path().join("src/lib")).unwrap();
        std::fs::write(dir.path().join("src/lib/index.js"), "export {}").unwrap();
        let dest = dir.path().join("package.zip");

        let count = zip_directory(dir.path(), &dest).unwrap();
        assert_eq!(count, 2);

        let mut archive = zip::ZipArchive::new(File::open(&dest).unwrap()).unwrap();
        let mut names: Vec<_> = archive.file_names().map(str::to_owned).collect();
        names.sort();
        assert_eq!(names, ["package.json", "src/", "src/lib/", "src/lib/index.js"]);

        let mut index = String::new();
        std::io::Read::read_to_string(&mut archive.by_name("src/lib/index.js").unwrap(), &mut index)
            .unwrap();
        assert_eq!(index, "export {}");
    }

    #[test]
    fn copy_tree_replicates_structure() {
        let src = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        std::fs::create_dir(src.path().join("handlers")).unwrap();
        std::fs::write(src.path().join("handlers/update.js"), "run()").unwrap();
        std::fs::write(src.path().join("main.js"), "main()").unwrap();

        let target = dest.path().join("src");
        copy_tree(src.path(), &target).unwrap();

        assert_eq!(
            std::fs::read_to_string(target.join("handlers/update.js")).unwrap(),
            "run()"
        );
        assert_eq!(std::fs::read_to_string(target.join("main.js")).unwrap(), "main()");
    }
}

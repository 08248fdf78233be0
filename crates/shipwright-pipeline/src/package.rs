//! Zip packaging of the application directory.

use std::fs::{self, File};
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};

use shipwright_state::ContentDigest;
use tracing::{debug, info};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::{PipelineError, Result};

/// What ended up in the archive.
#[derive(Debug, Clone)]
pub struct PackageReport {
    /// Archive path.
    pub output: PathBuf,
    /// Number of files stored.
    pub files: usize,
    /// Archive size in bytes.
    pub bytes: u64,
    /// SHA-256 of the archive bytes.
    pub digest: ContentDigest,
}

/// Zip every regular file below `source` into `output`.
///
/// Entry names are `/`-separated paths relative to `source`, written in
/// sorted order with fixed timestamps so identical trees produce identical
/// archives. Symlinks are not followed. If `output` lives inside `source`
/// it is left out of the archive.
pub fn package_directory(source: &Path, output: &Path) -> Result<PackageReport> {
    if !source.is_dir() {
        return Err(PipelineError::PackageSource(source.display().to_string()));
    }

    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut files = Vec::new();
    collect_files(source, &mut files)?;

    let excluded = fs::canonicalize(output).ok();
    let writer = BufWriter::new(File::create(output)?);
    let mut zip = ZipWriter::new(writer);
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut stored = 0usize;
    for path in &files {
        if excluded.is_some() && fs::canonicalize(path).ok() == excluded {
            debug!(path = %path.display(), "skipping archive inside its own source");
            continue;
        }
        let name = entry_name(source, path)?;
        zip.start_file(name, options)?;
        let mut file = File::open(path)?;
        io::copy(&mut file, &mut zip)?;
        stored += 1;
    }

    let mut writer = zip.finish()?;
    io::Write::flush(&mut writer)?;
    drop(writer);

    let bytes = fs::read(output)?;
    let report = PackageReport {
        output: output.to_path_buf(),
        files: stored,
        bytes: bytes.len() as u64,
        digest: ContentDigest::from_bytes(&bytes),
    };
    info!(
        output = %output.display(),
        files = report.files,
        bytes = report.bytes,
        digest = %report.digest.short(),
        "packaged application"
    );
    Ok(report)
}

/// Recursively collect regular files in sorted order.
fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    let mut entries: Vec<_> = fs::read_dir(dir)?.collect::<io::Result<Vec<_>>>()?;
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let path = entry.path();
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            collect_files(&path, out)?;
        } else if file_type.is_file() {
            out.push(path);
        } else {
            debug!(path = %path.display(), "skipping non-regular file");
        }
    }
    Ok(())
}

fn entry_name(root: &Path, path: &Path) -> Result<String> {
    let relative = path
        .strip_prefix(root)
        .map_err(|_| PipelineError::PackageSource(path.display().to_string()))?;
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Ok(parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn sample_app() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("main.py"), b"print('hi')\n").unwrap();
        fs::create_dir_all(dir.path().join("utils")).unwrap();
        fs::write(dir.path().join("utils").join("calc.py"), b"def add(a, b): return a + b\n")
            .unwrap();
        fs::write(dir.path().join("requirements.txt"), b"flask\n").unwrap();
        dir
    }

    fn entry_names(archive: &Path) -> Vec<String> {
        let mut zip = zip::ZipArchive::new(File::open(archive).unwrap()).unwrap();
        (0..zip.len())
            .map(|i| zip.by_index(i).unwrap().name().to_string())
            .collect()
    }

    #[test]
    fn packages_nested_files_with_relative_names() {
        let app = sample_app();
        let out = tempfile::tempdir().unwrap();
        let archive = out.path().join("app.zip");

        let report = package_directory(app.path(), &archive).unwrap();
        assert_eq!(report.files, 3);
        assert!(report.bytes > 0);
        assert_eq!(
            entry_names(&archive),
            vec!["main.py", "requirements.txt", "utils/calc.py"]
        );
    }

    #[test]
    fn archive_content_round_trips() {
        let app = sample_app();
        let out = tempfile::tempdir().unwrap();
        let archive = out.path().join("app.zip");
        package_directory(app.path(), &archive).unwrap();

        let mut zip = zip::ZipArchive::new(File::open(&archive).unwrap()).unwrap();
        let mut content = String::new();
        zip.by_name("utils/calc.py")
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, "def add(a, b): return a + b\n");
    }

    #[test]
    fn identical_trees_produce_identical_digests() {
        let app = sample_app();
        let out = tempfile::tempdir().unwrap();

        let first = package_directory(app.path(), &out.path().join("a.zip")).unwrap();
        let second = package_directory(app.path(), &out.path().join("b.zip")).unwrap();
        assert_eq!(first.digest, second.digest);
    }

    #[test]
    fn output_inside_source_is_not_packaged() {
        let app = sample_app();
        let archive = app.path().join("app.zip");

        package_directory(app.path(), &archive).unwrap();
        // second run sees the first archive on disk
        let report = package_directory(app.path(), &archive).unwrap();
        assert_eq!(report.files, 3);
        assert!(!entry_names(&archive).contains(&"app.zip".to_string()));
    }

    #[test]
    fn creates_missing_output_directory() {
        let app = sample_app();
        let out = tempfile::tempdir().unwrap();
        let archive = out.path().join("dist").join("nested").join("app.zip");

        package_directory(app.path(), &archive).unwrap();
        assert!(archive.exists());
    }

    #[test]
    fn missing_source_is_an_error() {
        let out = tempfile::tempdir().unwrap();
        let err = package_directory(&out.path().join("nope"), &out.path().join("x.zip"))
            .unwrap_err();
        assert!(matches!(err, PipelineError::PackageSource(_)));
    }

    #[test]
    fn empty_directory_yields_empty_archive() {
        let app = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let report = package_directory(app.path(), &out.path().join("empty.zip")).unwrap();
        assert_eq!(report.files, 0);
    }
}

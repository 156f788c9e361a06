//! Per-submission scratch space
//!
//! Each submission gets its own temporary directory, named after its
//! submission id, holding the materialised source tree and any intermediate
//! archives. Uploads may be a zip or gzip-compressed tar archive, a single
//! file, or a directory. Dropping the [`Workspace`] removes everything, including on
//! early return from a failed phase.

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::Serialize;
use std::fmt;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use thiserror::Error;
use tracing::{debug, info};
use walkdir::WalkDir;

pub const SOURCE_DIR: &str = "source";
pub const REDACTED_ARCHIVE: &str = "source.redacted.tar.gz";

#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("Upload not found: {}", .0.display())]
    UploadNotFound(PathBuf),

    #[error("Unsupported archive format: {}", .0.display())]
    UnsupportedArchive(PathBuf),

    #[error("Failed to create workspace: {0}")]
    Create(#[source] io::Error),

    #[error("Failed to extract archive {}: {source}", .path.display())]
    Extract {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to copy upload {}: {source}", .path.display())]
    Copy {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to package source tree: {0}")]
    Package(#[source] io::Error),
}

/// Opaque unique token identifying one submission
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct SubmissionId(String);

impl SubmissionId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SubmissionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for SubmissionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Extensions of archive formats that are not unpacked. Copying them in
/// verbatim would carry their contents past redaction.
const UNSUPPORTED_ARCHIVES: &[&str] = &[
    ".tar", ".tar.bz2", ".tbz2", ".tar.xz", ".txz", ".tar.zst", ".gz", ".bz2", ".xz", ".zst",
    ".7z", ".rar", ".jar", ".whl", ".egg",
];

/// Shape of an upload handed over by intake
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    TarGz,
    Zip,
    SingleFile,
    Directory,
}

impl UploadKind {
    /// Classifies an upload by type and file name. Archive formats other than
    /// zip and gzip-compressed tar are rejected.
    pub fn detect(path: &Path) -> Result<Self, WorkspaceError> {
        if path.is_dir() {
            return Ok(UploadKind::Directory);
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Ok(UploadKind::TarGz)
        } else if name.ends_with(".zip") {
            Ok(UploadKind::Zip)
        } else if UNSUPPORTED_ARCHIVES.iter().any(|ext| name.ends_with(ext)) {
            Err(WorkspaceError::UnsupportedArchive(path.to_path_buf()))
        } else {
            Ok(UploadKind::SingleFile)
        }
    }
}

pub struct Workspace {
    submission_id: SubmissionId,
    dir: TempDir,
    source_root: PathBuf,
}

impl Workspace {
    /// Creates an empty workspace under `work_root`.
    pub fn create(work_root: &Path, submission_id: SubmissionId) -> Result<Self, WorkspaceError> {
        std::fs::create_dir_all(work_root).map_err(WorkspaceError::Create)?;

        let dir = tempfile::Builder::new()
            .prefix(&format!("retrofit-{}-", submission_id))
            .tempdir_in(work_root)
            .map_err(WorkspaceError::Create)?;

        let source_root = dir.path().join(SOURCE_DIR);
        std::fs::create_dir(&source_root).map_err(WorkspaceError::Create)?;

        debug!(submission_id = %submission_id, "Created workspace at {}", dir.path().display());

        Ok(Self {
            submission_id,
            dir,
            source_root,
        })
    }

    pub fn submission_id(&self) -> &SubmissionId {
        &self.submission_id
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn source_root(&self) -> &Path {
        &self.source_root
    }

    /// Materialises an upload into the source tree.
    pub fn materialize(&self, upload: &Path) -> Result<UploadKind, WorkspaceError> {
        if !upload.exists() {
            return Err(WorkspaceError::UploadNotFound(upload.to_path_buf()));
        }

        let kind = UploadKind::detect(upload)?;
        match kind {
            UploadKind::TarGz => self.extract_archive(upload)?,
            UploadKind::Zip => self.extract_zip(upload)?,
            UploadKind::SingleFile => self.copy_file(upload)?,
            UploadKind::Directory => self.copy_tree(upload)?,
        }

        info!(
            submission_id = %self.submission_id,
            "Materialized {:?} upload {}", kind, upload.display()
        );
        Ok(kind)
    }

    fn extract_archive(&self, archive_path: &Path) -> Result<(), WorkspaceError> {
        let extract_err = |source| WorkspaceError::Extract {
            path: archive_path.to_path_buf(),
            source,
        };
        let file = File::open(archive_path).map_err(extract_err)?;
        let mut archive = tar::Archive::new(GzDecoder::new(file));
        archive.set_preserve_permissions(false);
        archive.unpack(&self.source_root).map_err(extract_err)
    }

    fn extract_zip(&self, archive_path: &Path) -> Result<(), WorkspaceError> {
        let extract_err = |source| WorkspaceError::Extract {
            path: archive_path.to_path_buf(),
            source,
        };
        let file = File::open(archive_path).map_err(extract_err)?;
        let mut archive = zip::ZipArchive::new(file).map_err(|e| extract_err(io::Error::other(e)))?;
        // Entries whose names escape the target directory are rejected by the
        // zip crate.
        archive
            .extract(&self.source_root)
            .map_err(|e| extract_err(io::Error::other(e)))
    }

    fn copy_file(&self, file: &Path) -> Result<(), WorkspaceError> {
        let copy_err = |source| WorkspaceError::Copy {
            path: file.to_path_buf(),
            source,
        };
        let name = file
            .file_name()
            .ok_or_else(|| copy_err(io::Error::new(io::ErrorKind::InvalidInput, "no file name")))?;
        std::fs::copy(file, self.source_root.join(name)).map_err(copy_err)?;
        Ok(())
    }

    fn copy_tree(&self, root: &Path) -> Result<(), WorkspaceError> {
        let copy_err = |source| WorkspaceError::Copy {
            path: root.to_path_buf(),
            source,
        };

        for entry in WalkDir::new(root).min_depth(1).follow_links(false) {
            let entry = entry.map_err(|e| copy_err(io::Error::other(e)))?;
            let relative = entry
                .path()
                .strip_prefix(root)
                .map_err(|e| copy_err(io::Error::other(e)))?;
            let target = self.source_root.join(relative);

            if entry.file_type().is_dir() {
                std::fs::create_dir_all(&target).map_err(copy_err)?;
            } else if entry.file_type().is_file() {
                std::fs::copy(entry.path(), &target).map_err(copy_err)?;
            }
        }
        Ok(())
    }

    /// Packs the (sanitized) source tree into a gzip-compressed tar inside
    /// the workspace and returns its path.
    pub fn package(&self) -> Result<PathBuf, WorkspaceError> {
        let archive_path = self.dir.path().join(REDACTED_ARCHIVE);
        let file = File::create(&archive_path).map_err(WorkspaceError::Package)?;

        let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));
        builder.follow_symlinks(false);
        builder
            .append_dir_all(".", &self.source_root)
            .map_err(WorkspaceError::Package)?;
        builder
            .into_inner()
            .and_then(|encoder| encoder.finish())
            .map_err(WorkspaceError::Package)?;

        debug!("Packaged source tree into {}", archive_path.display());
        Ok(archive_path)
    }

    /// Packs the source tree with `overlay` files layered on top into
    /// `{name}` inside the workspace. Overlay paths are relative to the
    /// source root; an overlay entry replaces the tree's file on extraction.
    pub fn package_with_overlay(
        &self,
        name: &str,
        overlay: &[(&Path, &[u8])],
    ) -> Result<PathBuf, WorkspaceError> {
        let archive_path = self.dir.path().join(name);
        let file = File::create(&archive_path).map_err(WorkspaceError::Package)?;

        let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));
        builder.follow_symlinks(false);
        builder
            .append_dir_all(".", &self.source_root)
            .map_err(WorkspaceError::Package)?;

        for (path, contents) in overlay {
            let mut header = tar::Header::new_gnu();
            header.set_size(contents.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder
                .append_data(&mut header, path, *contents)
                .map_err(WorkspaceError::Package)?;
        }

        builder
            .into_inner()
            .and_then(|encoder| encoder.finish())
            .map_err(WorkspaceError::Package)?;

        debug!(
            "Packaged source tree with {} overlay file(s) into {}",
            overlay.len(),
            archive_path.display()
        );
        Ok(archive_path)
    }
}

impl fmt::Debug for Workspace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Workspace")
            .field("submission_id", &self.submission_id)
            .field("path", &self.dir.path())
            .finish()
    }
}

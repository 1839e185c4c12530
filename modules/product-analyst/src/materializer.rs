use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::descriptor::Descriptor;
use crate::error::WorkflowError;
use crate::types::{ResultRecord, RunId};

/// One written descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptorFile {
    pub index: usize,
    pub path: PathBuf,
}

/// Ordered descriptor paths, in the order the records were returned.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    files: Vec<DescriptorFile>,
}

impl Manifest {
    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn files(&self) -> &[DescriptorFile] {
        &self.files
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.files.iter().map(|f| f.path.as_path())
    }

    /// Paths joined with `", "`, the form the analysis prompts embed.
    pub fn joined(&self) -> String {
        self.paths()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Directory holding one run's descriptors: `<root>/<run_id>`.
pub fn run_dir(root: &Path, run_id: RunId) -> PathBuf {
    root.join(run_id.to_string())
}

/// File name for the record at `index`: a zero-padded position followed by
/// a slug of the record id. The position alone keeps names unique.
pub fn descriptor_file_name(index: usize, record: &ResultRecord) -> String {
    let slug = record
        .id
        .as_deref()
        .map(slugify)
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "record".to_string());
    format!("{index:04}-{slug}.txt")
}

fn slugify(id: &str) -> String {
    let slug: String = id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .take(64)
        .collect();
    slug.trim_matches('_').to_string()
}

/// Write one descriptor per record under `<root>/<run_id>/`.
///
/// Either every file is written and the full manifest is returned, or the
/// run directory is removed and the first I/O error is returned.
pub fn materialize(
    root: &Path,
    run_id: RunId,
    records: &[ResultRecord],
) -> Result<Manifest, WorkflowError> {
    materialize_with(root, run_id, records, |path, body| fs::write(path, body))
}

/// [`materialize`] with the per-file write supplied by the caller.
pub(crate) fn materialize_with<W>(
    root: &Path,
    run_id: RunId,
    records: &[ResultRecord],
    write: W,
) -> Result<Manifest, WorkflowError>
where
    W: FnMut(&Path, &str) -> io::Result<()>,
{
    let dir = run_dir(root, run_id);

    match write_all(&dir, records, write) {
        Ok(manifest) => {
            info!(count = manifest.len(), dir = %dir.display(), "Materialized descriptors");
            Ok(manifest)
        }
        Err(err) => {
            warn!(dir = %dir.display(), error = %err, "Materialization failed, removing run directory");
            if let Err(cleanup) = fs::remove_dir_all(&dir) {
                if cleanup.kind() != io::ErrorKind::NotFound {
                    warn!(dir = %dir.display(), error = %cleanup, "Failed to remove partial run directory");
                }
            }
            Err(err)
        }
    }
}

fn write_all<W>(dir: &Path, records: &[ResultRecord], mut write: W) -> Result<Manifest, WorkflowError>
where
    W: FnMut(&Path, &str) -> io::Result<()>,
{
    if dir.exists() {
        fs::remove_dir_all(dir).map_err(|source| WorkflowError::Materialize {
            path: dir.to_path_buf(),
            source,
        })?;
    }
    fs::create_dir_all(dir).map_err(|source| WorkflowError::Materialize {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut files = Vec::with_capacity(records.len());
    for (index, record) in records.iter().enumerate() {
        let path = dir.join(descriptor_file_name(index, record));
        let body = Descriptor::from_record(record).render();
        write(&path, &body).map_err(|source| WorkflowError::Materialize {
            path: path.clone(),
            source,
        })?;
        debug!(index, path = %path.display(), "Wrote descriptor");
        files.push(DescriptorFile { index, path });
    }

    Ok(Manifest { files })
}

/// Remove all but the `keep` most recently modified run directories under
/// `root`, never touching `current`. Only directories named by a [`RunId`]
/// are considered; anything else under `root` is left alone. Returns how
/// many were removed.
pub fn prune_stale_runs(root: &Path, keep: usize, current: RunId) -> io::Result<usize> {
    let mut runs = Vec::new();
    for entry in fs::read_dir(root)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let name = entry.file_name();
        match name.to_str().and_then(RunId::parse) {
            Some(id) if id != current => {}
            _ => continue,
        }
        let modified = entry.metadata()?.modified()?;
        runs.push((modified, entry.path()));
    }

    // Newest first; the current run counts toward `keep`.
    runs.sort_by(|a, b| b.0.cmp(&a.0));
    let mut removed = 0;
    for (_, path) in runs.into_iter().skip(keep.saturating_sub(1)) {
        fs::remove_dir_all(&path)?;
        debug!(path = %path.display(), "Pruned stale run directory");
        removed += 1;
    }
    Ok(removed)
}

//! End-to-end extraction: envelope stage, unload stage, member output,
//! and the intermediate-file lifecycle between them.
//!
//! The unload stream produced by stage 1 is materialized on disk: either
//! at the path the user asked to keep (`--unload`) or as a temporary file
//! that is removed once extraction finishes.  The boundary between the
//! stages is a clean close-then-reopen so every buffered byte is flushed
//! before stage 2 starts seeking.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{info, warn};

use crate::codepage::Codepage;
use crate::envelope;
use crate::error::{XmitError, io_context};
use crate::unload;

pub struct ExtractOptions {
    pub input: PathBuf,
    pub target: PathBuf,
    pub extension: String,
    pub unload: Option<PathBuf>,
    pub codepage: Codepage,
}

pub struct ExtractReport {
    pub members_written: usize,
    /// The temporary unload file could not be removed. Non-fatal, but
    /// surfaced through exit code 2.
    pub cleanup_failed: bool,
}

/// Where the intermediate unload stream lives.
enum UnloadStore {
    /// User-supplied path, kept after the run.
    Kept(PathBuf),
    /// Temporary file, removed on completion.
    Temp(NamedTempFile),
}

impl UnloadStore {
    fn create(requested: Option<&Path>) -> Result<Self, XmitError> {
        match requested {
            Some(path) => Ok(UnloadStore::Kept(path.to_path_buf())),
            None => tempfile::Builder::new()
                .prefix("unxmit-")
                .suffix(".unload")
                .tempfile()
                .map(UnloadStore::Temp)
                .map_err(io_context("creating temporary unload file")),
        }
    }

    fn path(&self) -> &Path {
        match self {
            UnloadStore::Kept(path) => path,
            UnloadStore::Temp(tmp) => tmp.path(),
        }
    }

    /// Remove a temporary store; a kept store stays behind. Returns true
    /// when removal was attempted and failed.
    fn cleanup(self) -> bool {
        match self {
            UnloadStore::Kept(path) => {
                info!(path = %path.display(), "unload stream kept");
                false
            }
            UnloadStore::Temp(tmp) => match tmp.close() {
                Ok(()) => false,
                Err(e) => {
                    warn!(error = %e, "failed to remove temporary unload file");
                    true
                }
            },
        }
    }
}

/// Run the whole extraction. Returns the member count and whether
/// temporary-file cleanup failed.
pub fn run(opts: &ExtractOptions) -> Result<ExtractReport, XmitError> {
    if !opts.target.is_dir() {
        return Err(XmitError::TargetMissing {
            path: opts.target.display().to_string(),
        });
    }

    let input = File::open(&opts.input)
        .map_err(io_context(format!("opening input {}", opts.input.display())))?;
    let mut input = BufReader::new(input);

    let store = UnloadStore::create(opts.unload.as_deref())?;

    // Stage 1: envelope → metadata + unload stream on disk.
    let meta = {
        let unload_file = File::create(store.path())
            .map_err(io_context(format!("creating {}", store.path().display())))?;
        let mut writer = BufWriter::new(unload_file);
        let meta = envelope::run(&mut input, &mut writer, opts.codepage)?;
        writer.flush().map_err(io_context("flushing unload stream"))?;
        meta
    };

    if let Some(ts) = &meta.origin_timestamp {
        info!(
            node = %meta.origin_node,
            user = %meta.origin_user,
            timestamp = %ts,
            "transfer origin"
        );
    }

    // Stage 2 only makes sense for a partitioned dataset.
    let members_written = match meta.extraction_file() {
        None => {
            info!("transfer announced no files; nothing to extract");
            0
        }
        Some(file) if !file.is_partitioned() => {
            warn!(
                dsname = %file.dsname,
                dsorg = %file.dsorg,
                "dataset is not partitioned; nothing to extract"
            );
            0
        }
        Some(file) => {
            info!(
                dsname = %file.dsname,
                dstype = %file.dstype,
                recfm = %file.recfm,
                lrecl = file.lrecl,
                "extracting members"
            );
            let unload_file = File::open(store.path())
                .map_err(io_context(format!("opening {}", store.path().display())))?;
            let mut reader = BufReader::new(unload_file);
            unload::run(
                &mut reader,
                file,
                &opts.target,
                &opts.extension,
                opts.codepage,
            )?
        }
    };

    info!(members = members_written, "extraction complete");
    let cleanup_failed = store.cleanup();
    Ok(ExtractReport {
        members_written,
        cleanup_failed,
    })
}

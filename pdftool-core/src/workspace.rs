//! Transient per-job filesystem resources
//!
//! Every job gets its own directory `job-<uuid>` below the work area root, so
//! concurrent requests can never collide on a path regardless of what
//! filenames clients declare. Inside it the input and output use fixed names.
//!
//! A [`ResourceHandle`] removes its files when [`ResourceHandle::release`] is
//! called or, at the latest, when the handle is dropped. Dropping covers every
//! early return, a panicking handler and a handler aborted by a deadline.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, warn};
use uuid::Uuid;

const INPUT_FILE: &str = "input.pdf";
const OUTPUT_FILE: &str = "output.pdf";

/// Root directory under which job directories are allocated
#[derive(Debug, Clone)]
pub struct WorkArea {
    root: PathBuf,
}

impl WorkArea {
    /// Use `root` as the work area, creating it if needed
    pub fn new(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create a fresh job directory and return its handle.
    ///
    /// Nothing is written yet; the caller owns `input_path` and fills it.
    pub fn allocate(&self) -> io::Result<ResourceHandle> {
        let id = Uuid::new_v4();
        let dir = self.root.join(format!("job-{id}"));
        // create_dir (not create_dir_all) fails on an existing path
        std::fs::create_dir(&dir)?;

        debug!(job_id = %id, dir = %dir.display(), "allocated job directory");

        Ok(ResourceHandle {
            id,
            input_path: dir.join(INPUT_FILE),
            output_path: dir.join(OUTPUT_FILE),
            dir,
            released: AtomicBool::new(false),
        })
    }
}

/// Filesystem footprint of one job
#[derive(Debug)]
pub struct ResourceHandle {
    id: Uuid,
    dir: PathBuf,
    input_path: PathBuf,
    output_path: PathBuf,
    released: AtomicBool,
}

impl ResourceHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn input_path(&self) -> &Path {
        &self.input_path
    }

    /// Reserved for the transform; may not exist
    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    /// Remove output, then input, then the job directory.
    ///
    /// Only the first call does any work. Removal failures are logged and
    /// never returned.
    pub fn release(&self) {
        if self.released.swap(true, Ordering::AcqRel) {
            return;
        }

        remove_file_logged(self.id, &self.output_path, "output");
        remove_file_logged(self.id, &self.input_path, "input");

        match std::fs::remove_dir_all(&self.dir) {
            Ok(()) => debug!(job_id = %self.id, "released job directory"),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => warn!(
                job_id = %self.id,
                dir = %self.dir.display(),
                error = %err,
                "failed to remove job directory"
            ),
        }
    }
}

impl Drop for ResourceHandle {
    fn drop(&mut self) {
        self.release();
    }
}

fn remove_file_logged(id: Uuid, path: &Path, role: &str) {
    match std::fs::remove_file(path) {
        Ok(()) => {}
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            debug!(job_id = %id, role, "{role} file does not exist, skipping removal");
        }
        Err(err) => warn!(
            job_id = %id,
            path = %path.display(),
            error = %err,
            "failed to remove {role} file"
        ),
    }
}

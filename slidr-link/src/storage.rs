//! Image storage on the device filesystem
//!
//! Layout under the storage root:
//! - `images/img-<segment>.bin`: finalized image of one segment
//! - `upload_temp`: the upload in progress

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use log::debug;

use crate::error::{ResourceOp, TransferError};

const IMAGE_DIR: &str = "images";
const TEMP_FILE: &str = "upload_temp";

#[derive(Debug, Clone)]
pub struct Storage {
    root: PathBuf,
}

impl Storage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Final location of a segment's image
    pub fn image_path(&self, segment: u8) -> PathBuf {
        self.root
            .join(IMAGE_DIR)
            .join(format!("img-{}.bin", segment))
    }

    pub fn temp_path(&self) -> PathBuf {
        self.root.join(TEMP_FILE)
    }

    /// Segment index an image path belongs to
    pub fn segment_for_path(&self, path: &Path) -> Option<u8> {
        if path.parent()? != self.root.join(IMAGE_DIR) {
            return None;
        }
        path.file_name()?
            .to_str()?
            .strip_prefix("img-")?
            .strip_suffix(".bin")?
            .parse()
            .ok()
    }

    /// Create (or truncate) the upload temp file
    pub fn create_temp(&self) -> Result<File, TransferError> {
        File::create(self.temp_path()).map_err(TransferError::resource(ResourceOp::Open))
    }

    pub fn open_image(&self, segment: u8) -> Result<File, TransferError> {
        File::open(self.image_path(segment)).map_err(TransferError::resource(ResourceOp::Open))
    }

    /// Delete the temp file; a missing file is not an error
    pub fn remove_temp(&self) -> Result<(), TransferError> {
        remove_if_exists(&self.temp_path()).map_err(TransferError::resource(ResourceOp::Remove))
    }

    /// Move the temp file to `target`
    ///
    /// An existing file at `target` is deleted first and missing parent
    /// directories are created.
    pub fn replace(&self, target: &Path) -> Result<(), TransferError> {
        remove_if_exists(target).map_err(TransferError::resource(ResourceOp::Remove))?;

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(TransferError::resource(ResourceOp::CreateDir))?;
        }

        fs::rename(self.temp_path(), target).map_err(TransferError::resource(ResourceOp::Rename))?;
        debug!("Stored {}", target.display());
        Ok(())
    }
}

fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

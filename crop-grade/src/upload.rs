use std::io::Write;
use std::path::Path;

use log::debug;
use tempfile::NamedTempFile;

use crate::error::Result;

/// An uploaded image staged on disk for the lifetime of one request.
///
/// The file is deleted when the value is dropped, whether grading
/// succeeded or not.
pub struct TempUpload {
    file: NamedTempFile,
}

impl TempUpload {
    pub fn stage(dir: &Path, file_name: Option<&str>, bytes: &[u8]) -> Result<Self> {
        let suffix = file_name.and_then(extension).unwrap_or_default();

        let mut file = tempfile::Builder::new()
            .prefix("upload-")
            .suffix(&suffix)
            .tempfile_in(dir)?;
        file.write_all(bytes)?;
        file.flush()?;

        debug!("Staged {} bytes at {}", bytes.len(), file.path().display());

        Ok(TempUpload { file })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }
}

/// Keep a short alphanumeric extension from the client file name, drop
/// anything else it sent.
fn extension(file_name: &str) -> Option<String> {
    let ext = Path::new(file_name).extension()?.to_str()?;

    if ext.is_empty() || ext.len() > 5 || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }

    Some(format!(".{}", ext.to_ascii_lowercase()))
}

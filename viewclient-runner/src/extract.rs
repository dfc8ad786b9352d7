use std::io::Write;
use std::path::{Path, PathBuf};

use zip::result::ZipError;

use crate::archive::SelfArchive;
use crate::executable::set_executable;

/// Directory of the archive where the tools are stored
const TOOLS: &str = "tools";

/// Failure to produce a runnable copy of a tool
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    /// The launcher was not started from its archive
    #[error("Tools should be started using the archive, `{}` is not one", path.display())]
    NotAnArchive {
        /// Path that was expected to be the archive
        path: PathBuf,
        /// Reason why it could not be read as an archive
        #[source]
        source: ZipError,
    },

    /// The archive does not bundle the requested tool
    #[error("Cannot extract {entry} from {}", archive.display())]
    MissingEntry {
        /// Name of the entry within the archive (e.g., `tools/dump`)
        entry: String,
        /// Path of the archive
        archive: PathBuf,
    },

    /// Reading the archive or writing the tool failed
    #[error("Failed to extract to `{}`", path.display())]
    Io {
        /// Path of the file that could not be read or written
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

/// What happens to an extracted tool once the launcher is done with it
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum Retention {
    /// The file is removed when the [`ExtractedPayload`] is dropped
    #[default]
    Delete,

    /// The file is left in place
    Keep,
}

/// A tool bundled in the archive, identified by its name (e.g., `dump`)
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Payload {
    name: String,
}

impl Payload {
    /// Creates the descriptor of a tool, the name is case insensitive
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_lowercase(),
        }
    }

    /// Name of the tool, always lowercase
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the entry within the archive (e.g., `tools/dump`)
    pub fn entry_name(&self) -> String {
        format!("{TOOLS}/{}", self.name)
    }

    /// Path where the tool ends up when extracted into `dir`
    pub fn destination_in(&self, dir: &Path) -> PathBuf {
        dir.join(&self.name)
    }

    /// Extracts the tool from the archive into `dir` and marks it executable.
    ///
    /// `dir` must allow execution, which is why the home directory is used rather than
    /// the temporary directory: it is common for `/tmp` to be mounted with noexec.
    ///
    /// The content is first written to a hidden file next to the destination,
    /// which is then renamed, so the destination is either the complete
    /// executable tool or left untouched.
    pub fn extract(
        &self,
        archive: &mut SelfArchive,
        dir: &Path,
        retention: Retention,
    ) -> Result<ExtractedPayload, ExtractError> {
        let destination = self.destination_in(dir);
        let io_error = |source| ExtractError::Io {
            path: destination.clone(),
            source,
        };

        let mut entry = archive.entry(&self.entry_name())?;
        let mut file = tempfile::Builder::new()
            .prefix(&format!(".{}", self.name))
            .tempfile_in(dir)
            .map_err(io_error)?;

        let size = std::io::copy(&mut entry, &mut file).map_err(io_error)?;
        file.flush().map_err(io_error)?;
        set_executable(file.as_file()).map_err(io_error)?;

        file.persist(&destination).map_err(|e| io_error(e.error))?;

        tracing::debug!(
            entry = %self.entry_name(),
            destination = %destination.display(),
            size,
            "extracted tool"
        );

        Ok(ExtractedPayload {
            path: destination,
            retention,
        })
    }
}

/// A tool that has been successfully extracted and can be executed
#[derive(Debug)]
pub struct ExtractedPayload {
    path: PathBuf,
    retention: Retention,
}

impl ExtractedPayload {
    /// Path of the extracted tool
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Keeps the file on disk when this is dropped
    pub fn keep(&mut self) {
        self.retention = Retention::Keep;
    }
}

impl Drop for ExtractedPayload {
    fn drop(&mut self) {
        if self.retention == Retention::Keep {
            return;
        }

        if let Err(e) = std::fs::remove_file(&self.path) {
            tracing::debug!(
                path = %self.path.display(),
                "failed to remove the extracted tool: {e}"
            );
        }
    }
}

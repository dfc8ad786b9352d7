use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::platform::Platform;

/// Looks for `monkeyrunner` in a list of directories
#[derive(Clone, Debug)]
pub struct InterpreterLocator {
    search_path: Option<OsString>,
    platform: Platform,
}

impl InterpreterLocator {
    /// Creates a locator that searches the directories of `search_path`,
    /// separated like the `PATH` environment variable
    pub fn new(search_path: Option<OsString>, platform: Platform) -> Self {
        Self {
            search_path,
            platform,
        }
    }

    /// Creates a locator that searches the directories of the `PATH` environment variable
    pub fn from_env(platform: Platform) -> Self {
        Self::new(std::env::var_os("PATH"), platform)
    }

    /// Returns the absolute path of the first interpreter found in the search path
    pub fn locate(&self) -> Option<PathBuf> {
        let search_path = self.search_path.as_deref()?;
        let name = self.platform.interpreter_file_name();

        let found = match which::which_in(&name, Some(search_path), Path::new(".")) {
            Ok(found) => found,
            Err(e) => {
                tracing::debug!("{name} not found in the search path: {e}");
                return None;
            }
        };
        let found = std::path::absolute(&found).unwrap_or(found);

        tracing::debug!(interpreter = %found.display(), "found interpreter");

        Some(found)
    }
}

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use zip::ZipArchive;
use zip::result::ZipError;

use crate::extract::ExtractError;

/// The archive the launcher was shipped in, which bundles the tool scripts under `tools/`.
///
/// Any zip file is accepted, including a jar or an executable with a zip appended to it.
pub struct SelfArchive {
    path: PathBuf,
    zip: ZipArchive<File>,
}

impl SelfArchive {
    /// Opens the archive located at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ExtractError> {
        let path = path.as_ref();
        let path = std::path::absolute(path).map_err(|source| ExtractError::Io {
            path: path.to_owned(),
            source,
        })?;
        let file = File::open(&path).map_err(|source| ExtractError::Io {
            path: path.clone(),
            source,
        })?;
        let zip = ZipArchive::new(file).map_err(|source| ExtractError::NotAnArchive {
            path: path.clone(),
            source,
        })?;

        tracing::debug!(archive = %path.display(), entries = zip.len(), "opened archive");

        Ok(Self { path, zip })
    }

    /// Absolute path of the archive
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns a reader over the uncompressed content of the entry named `name`
    pub(crate) fn entry(&mut self, name: &str) -> Result<impl Read + '_, ExtractError> {
        match self.zip.by_name(name) {
            Ok(entry) => Ok(entry),
            Err(ZipError::FileNotFound) => Err(ExtractError::MissingEntry {
                entry: name.to_owned(),
                archive: self.path.clone(),
            }),
            Err(source) => Err(ExtractError::NotAnArchive {
                path: self.path.clone(),
                source,
            }),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::io::{Read, Write};
    use std::path::{Path, PathBuf};

    use zip::ZipWriter;
    use zip::write::SimpleFileOptions;

    use crate::extract::ExtractError;

    use super::SelfArchive;

    /// Writes a zip archive named `tools.jar` in `dir` containing the given entries
    pub(crate) fn write_archive(dir: &Path, entries: &[(&str, &[u8])]) -> PathBuf {
        let path = dir.join("tools.jar");
        let file = std::fs::File::create(&path).unwrap();
        let mut zip = ZipWriter::new(file);
        for (name, content) in entries {
            zip.start_file(*name, SimpleFileOptions::default()).unwrap();
            zip.write_all(content).unwrap();
        }
        zip.finish().unwrap();

        path
    }

    #[test]
    fn open_and_read_entry() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_archive(dir.path(), &[("tools/dump", b"#!/bin/sh\necho dump\n")]);

        let mut archive = SelfArchive::open(&path).unwrap();
        assert_eq!(archive.path(), path);

        let mut content = String::new();
        archive
            .entry("tools/dump")
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, "#!/bin/sh\necho dump\n");
    }

    #[test]
    fn missing_entry() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_archive(dir.path(), &[("tools/culebra", b"")]);

        let mut archive = SelfArchive::open(path).unwrap();
        let Err(err) = archive.entry("tools/dump") else {
            panic!("tools/dump should not be found");
        };
        assert!(
            matches!(err, ExtractError::MissingEntry { ref entry, .. } if entry == "tools/dump")
        );
        assert!(err.to_string().starts_with("Cannot extract tools/dump from"));
    }

    #[test]
    fn not_an_archive() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plain");
        std::fs::write(&path, b"this is not a zip file").unwrap();

        let Err(err) = SelfArchive::open(&path) else {
            panic!("a plain file should not be accepted as an archive");
        };
        assert!(matches!(err, ExtractError::NotAnArchive { .. }));
    }

    #[test]
    fn archive_does_not_exist() {
        let dir = tempfile::tempdir().unwrap();

        let Err(err) = SelfArchive::open(dir.path().join("missing.jar")) else {
            panic!("a missing file should not be opened");
        };
        assert!(matches!(err, ExtractError::Io { .. }));
    }

    #[test]
    fn archive_appended_to_executable() {
        let dir = tempfile::tempdir().unwrap();
        let zip_path = write_archive(dir.path(), &[("tools/dump", b"payload")]);

        let bundled = dir.path().join("bundled");
        let mut content = b"\x7fELF not really an executable".to_vec();
        content.extend(std::fs::read(zip_path).unwrap());
        std::fs::write(&bundled, content).unwrap();

        let mut archive = SelfArchive::open(&bundled).unwrap();
        let mut payload = Vec::new();
        archive
            .entry("tools/dump")
            .unwrap()
            .read_to_end(&mut payload)
            .unwrap();
        assert_eq!(payload, b"payload");
    }
}

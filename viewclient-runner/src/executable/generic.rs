use std::fs::File;

/// Files do not carry an executable bit on this platform
pub fn set_executable(_file: &File) -> std::io::Result<()> {
    Ok(())
}

use std::fs::File;
use std::os::unix::fs::PermissionsExt;

/// Allows the owner of the file to execute it
pub fn set_executable(file: &File) -> std::io::Result<()> {
    let mut permissions = file.metadata()?.permissions();
    permissions.set_mode(permissions.mode() | 0o700);

    file.set_permissions(permissions)
}

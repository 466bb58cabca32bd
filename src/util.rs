//! Internal utilities.

use std::ffi::CString;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

/// Checks whether the current process may write to `path`.
///
/// Uses `access(path, W_OK)`, which checks permissions without opening
/// or modifying anything.
#[must_use]
pub fn is_writable(path: &Path) -> bool {
    let Ok(c_path) = CString::new(path.as_os_str().as_bytes()) else {
        return false;
    };
    // SAFETY: `c_path` is a valid NUL-terminated string that outlives the call,
    // and `access` does not retain the pointer.
    unsafe { libc::access(c_path.as_ptr(), libc::W_OK) == 0 }
}

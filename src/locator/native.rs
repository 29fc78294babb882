//! OS-backed module locator
//!
//! Windows queries the process with `PROCESS_QUERY_LIMITED_INFORMATION` rights and
//! reads its image name with `QueryFullProcessImageNameW`. A caller that already
//! holds a process handle can skip the open step. Linux follows the
//! `/proc/<pid>/exe` link. Other targets cannot resolve processes or system modules.

use super::{ModuleLocator, ModuleOrigin, ModuleReference};
use crate::error::{IconError, Result};
use tracing::debug;

#[cfg(windows)]
use windows::Win32::Foundation::{CloseHandle, ERROR_ACCESS_DENIED, ERROR_INVALID_PARAMETER, HANDLE};
#[cfg(windows)]
use std::os::windows::io::{AsRawHandle, BorrowedHandle};
#[cfg(windows)]
use windows::Win32::System::Threading::{
    GetProcessId, OpenProcess, PROCESS_NAME_WIN32, PROCESS_QUERY_LIMITED_INFORMATION,
    QueryFullProcessImageNameW,
};

/// Longest path `QueryFullProcessImageNameW` can report (extended-length paths)
#[cfg(windows)]
const MAX_IMAGE_PATH: usize = 32_768;

/// Locator for the compilation target's OS
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeLocator;

impl ModuleLocator for NativeLocator {
    fn resolve_pid(&self, pid: u32) -> Result<ModuleReference> {
        // PID 0 is the idle pseudo-process on Windows and the scheduler on Linux
        if pid == 0 {
            return Err(IconError::ModuleUnavailable(
                "process 0 has no backing image".to_string(),
            ));
        }

        let path = process_image_path(pid)?;
        debug!("Resolved process {} to {}", pid, path.display());
        Ok(ModuleReference::new(path, ModuleOrigin::Process(pid)))
    }

    fn system_module(&self, name: &str) -> Result<ModuleReference> {
        let path = system_directory()?.join(name);
        debug!("Resolved system module {} to {}", name, path.display());
        Ok(ModuleReference::new(path, ModuleOrigin::System))
    }
}

#[cfg(windows)]
impl NativeLocator {
    /// Resolve an open process handle to its main executable image
    ///
    /// The handle needs `PROCESS_QUERY_LIMITED_INFORMATION` access. It stays
    /// owned by the caller and is not closed.
    ///
    /// # Safety
    ///
    /// `BorrowedHandle` guarantees the handle is open for the duration of the
    /// borrow. `GetProcessId` only reads it and returns 0 on failure.
    #[expect(unsafe_code, reason = "Windows FFI for GetProcessId")]
    pub fn resolve_process_handle(&self, process: BorrowedHandle<'_>) -> Result<ModuleReference> {
        let handle = HANDLE(process.as_raw_handle());
        let pid = unsafe { GetProcessId(handle) };

        let path = image_path_from_handle(handle, &format!("process {pid}"))?;
        debug!("Resolved process handle {:?} to {}", handle.0, path.display());
        Ok(ModuleReference::new(path, ModuleOrigin::Process(pid)))
    }
}

/// Open a process by id and query its full image path
///
/// # Safety
///
/// `OpenProcess` result is checked before use and the handle is owned by
/// `ProcessHandleGuard` (closed exactly once), which outlives the query.
#[cfg(windows)]
#[expect(unsafe_code, reason = "Windows FFI for OpenProcess")]
fn process_image_path(pid: u32) -> Result<std::path::PathBuf> {
    let handle = unsafe { OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, false, pid) }.map_err(
        |e| {
            if e.code() == ERROR_INVALID_PARAMETER.to_hresult() {
                IconError::ProcessNotFound(pid)
            } else if e.code() == ERROR_ACCESS_DENIED.to_hresult() {
                IconError::AccessDenied(format!("cannot query process {pid}"))
            } else {
                IconError::WindowsApi(e)
            }
        },
    )?;
    let _guard = ProcessHandleGuard(handle);

    image_path_from_handle(handle, &format!("process {pid}"))
}

/// Query the full image path behind an open process handle
///
/// `what` names the process in error messages.
///
/// # Safety
///
/// The caller keeps `handle` open for the duration of the call. The image name
/// buffer is a live `Vec` of `MAX_IMAGE_PATH` elements and its length is passed
/// in `len`, which the API overwrites with the number of characters written
/// (excluding the terminator).
#[cfg(windows)]
#[expect(unsafe_code, reason = "Windows FFI for QueryFullProcessImageNameW")]
fn image_path_from_handle(handle: HANDLE, what: &str) -> Result<std::path::PathBuf> {
    use std::ffi::OsString;
    use std::os::windows::ffi::OsStringExt;
    use windows::core::PWSTR;

    let mut buffer = vec![0u16; MAX_IMAGE_PATH];
    #[expect(
        clippy::cast_possible_truncation,
        reason = "MAX_IMAGE_PATH is a compile-time constant (32768) that fits in u32"
    )]
    let mut len = buffer.len() as u32;

    unsafe {
        QueryFullProcessImageNameW(
            handle,
            PROCESS_NAME_WIN32,
            PWSTR(buffer.as_mut_ptr()),
            &raw mut len,
        )
    }
    .map_err(|e| {
        if e.code() == ERROR_ACCESS_DENIED.to_hresult() {
            IconError::AccessDenied(format!("cannot read image name of {what}"))
        } else {
            IconError::ModuleUnavailable(format!("{what}: {e}"))
        }
    })?;

    buffer.truncate(len as usize);
    Ok(OsString::from_wide(&buffer).into())
}

#[cfg(target_os = "linux")]
fn process_image_path(pid: u32) -> Result<std::path::PathBuf> {
    let proc_dir = std::path::PathBuf::from(format!("/proc/{pid}"));

    std::fs::read_link(proc_dir.join("exe")).map_err(|e| {
        if !proc_dir.exists() {
            IconError::ProcessNotFound(pid)
        } else if e.kind() == std::io::ErrorKind::PermissionDenied {
            IconError::AccessDenied(format!("cannot query process {pid}"))
        } else {
            // Kernel threads have a /proc entry but no executable link
            IconError::ModuleUnavailable(format!("process {pid}: {e}"))
        }
    })
}

#[cfg(not(any(windows, target_os = "linux")))]
fn process_image_path(pid: u32) -> Result<std::path::PathBuf> {
    Err(IconError::ModuleUnavailable(format!(
        "process {pid}: process lookup is not supported on this platform"
    )))
}

/// Locate the OS system directory (`%SystemRoot%\System32`)
///
/// # Safety
///
/// `GetSystemDirectoryW` writes at most `buffer.len()` characters into a live
/// slice and returns the count written, or the required size if it did not fit.
#[cfg(windows)]
#[expect(unsafe_code, reason = "Windows FFI for GetSystemDirectoryW")]
fn system_directory() -> Result<std::path::PathBuf> {
    use std::ffi::OsString;
    use std::os::windows::ffi::OsStringExt;
    use windows::Win32::System::SystemInformation::GetSystemDirectoryW;

    let mut buffer = vec![0u16; 260];
    loop {
        let written = unsafe { GetSystemDirectoryW(Some(&mut buffer)) } as usize;
        if written == 0 {
            return Err(IconError::WindowsApi(windows::core::Error::from_thread()));
        }
        if written < buffer.len() {
            buffer.truncate(written);
            return Ok(OsString::from_wide(&buffer).into());
        }
        buffer.resize(written, 0);
    }
}

#[cfg(not(windows))]
fn system_directory() -> Result<std::path::PathBuf> {
    Err(IconError::ModuleUnavailable(
        "the system icon library is only available on Windows".to_string(),
    ))
}

/// RAII guard for a process handle
///
/// Ensures the handle from `OpenProcess` is closed when the guard goes out of scope.
#[cfg(windows)]
struct ProcessHandleGuard(HANDLE);

#[cfg(windows)]
impl Drop for ProcessHandleGuard {
    /// Closes the process handle
    ///
    /// # Safety
    ///
    /// Only valid handles returned by `OpenProcess` are stored. The guard owns the
    /// handle (closed once, not cloned/shared); the result is ignored.
    #[expect(
        unsafe_code,
        reason = "Windows FFI for CloseHandle to release process handle"
    )]
    fn drop(&mut self) {
        unsafe {
            let _ = CloseHandle(self.0);
        }
    }
}

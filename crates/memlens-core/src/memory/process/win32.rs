//! Windows backend: `ReadProcessMemory` and Toolhelp32 enumeration.

use std::ffi::c_void;

use tracing::debug;
use windows::Win32::Foundation::{
    CloseHandle, ERROR_ACCESS_DENIED, ERROR_PARTIAL_COPY, HANDLE,
};
use windows::Win32::System::Diagnostics::Debug::ReadProcessMemory;
use windows::Win32::System::Diagnostics::ToolHelp::{
    CreateToolhelp32Snapshot, MODULEENTRY32W, Module32FirstW, Module32NextW, PROCESSENTRY32W,
    Process32FirstW, Process32NextW, TH32CS_SNAPMODULE, TH32CS_SNAPMODULE32, TH32CS_SNAPPROCESS,
};
use windows::Win32::System::Threading::{
    GetExitCodeProcess, OpenProcess, PROCESS_QUERY_INFORMATION, PROCESS_VM_READ,
};

use super::ProcessSelector;
use crate::error::{Error, Result};
use crate::memory::{MemoryRegion, MemorySource};

const STILL_ACTIVE: u32 = 259;

/// Open read-only view of a running process
pub struct ProcessHandle {
    pub pid: u32,
    pub name: String,
    handle: HANDLE,
}

// SAFETY: a process HANDLE is a kernel object reference usable from any thread.
unsafe impl Send for ProcessHandle {}

impl ProcessHandle {
    pub fn open(pid: u32) -> Result<Self> {
        // SAFETY: OpenProcess has no memory-safety preconditions.
        let handle = unsafe { OpenProcess(PROCESS_VM_READ | PROCESS_QUERY_INFORMATION, false, pid) }
            .map_err(|e| Error::ProcessOpenFailed(format!("pid {}: {}", pid, e)))?;

        let name = main_module(pid)
            .ok()
            .and_then(|module| module.name)
            .unwrap_or_else(|| "unknown".to_string());
        debug!("Opened process {} ({})", pid, name);

        Ok(Self { pid, name, handle })
    }

    /// Find the pid of a process by executable name
    pub fn find(selector: &ProcessSelector) -> Result<u32> {
        if let ProcessSelector::Pid(pid) = selector {
            return Ok(*pid);
        }

        let snapshot = Snapshot::new(TH32CS_SNAPPROCESS, 0)?;
        let mut entry = PROCESSENTRY32W {
            dwSize: std::mem::size_of::<PROCESSENTRY32W>() as u32,
            ..Default::default()
        };

        // SAFETY: entry.dwSize is initialized and the snapshot handle is valid.
        let mut more = unsafe { Process32FirstW(snapshot.0, &mut entry) }.is_ok();
        while more {
            let exe = wide_to_string(&entry.szExeFile);
            if selector.matches_name(&exe) {
                return Ok(entry.th32ProcessID);
            }
            // SAFETY: same snapshot and entry as above.
            more = unsafe { Process32NextW(snapshot.0, &mut entry) }.is_ok();
        }

        Err(Error::ProcessNotFound(selector.to_string()))
    }
}

impl MemorySource for ProcessHandle {
    fn read_into(&self, address: u64, buf: &mut [u8]) -> Result<usize> {
        let mut bytes_read = 0usize;
        // SAFETY: buf is a valid writable buffer of buf.len() bytes.
        let result = unsafe {
            ReadProcessMemory(
                self.handle,
                address as *const c_void,
                buf.as_mut_ptr() as *mut c_void,
                buf.len(),
                Some(&mut bytes_read),
            )
        };

        match result {
            Ok(()) => Ok(bytes_read),
            Err(e) if e.code() == ERROR_PARTIAL_COPY.to_hresult() && bytes_read > 0 => {
                Ok(bytes_read)
            }
            Err(e) if e.code() == ERROR_ACCESS_DENIED.to_hresult() => Err(Error::AccessDenied {
                address,
                size: buf.len(),
            }),
            Err(_) if !self.is_alive() => Err(Error::ProcessExited),
            Err(_) => Err(Error::AddressInvalid { address }),
        }
    }

    fn modules(&self) -> Result<Vec<MemoryRegion>> {
        enumerate_modules(self.pid)
    }

    fn is_alive(&self) -> bool {
        let mut code = 0u32;
        // SAFETY: the handle stays open for the lifetime of self.
        unsafe { GetExitCodeProcess(self.handle, &mut code) }.is_ok() && code == STILL_ACTIVE
    }

    fn pid(&self) -> u32 {
        self.pid
    }
}

impl Drop for ProcessHandle {
    fn drop(&mut self) {
        // SAFETY: the handle was returned by OpenProcess and is closed once.
        let _ = unsafe { CloseHandle(self.handle) };
    }
}

struct Snapshot(HANDLE);

impl Snapshot {
    fn new(
        flags: windows::Win32::System::Diagnostics::ToolHelp::CREATE_TOOLHELP_SNAPSHOT_FLAGS,
        pid: u32,
    ) -> Result<Self> {
        // SAFETY: CreateToolhelp32Snapshot has no memory-safety preconditions.
        let handle = unsafe { CreateToolhelp32Snapshot(flags, pid) }
            .map_err(|e| Error::ProcessOpenFailed(format!("snapshot of pid {}: {}", pid, e)))?;
        Ok(Self(handle))
    }
}

impl Drop for Snapshot {
    fn drop(&mut self) {
        // SAFETY: the snapshot handle is owned and closed once.
        let _ = unsafe { CloseHandle(self.0) };
    }
}

fn enumerate_modules(pid: u32) -> Result<Vec<MemoryRegion>> {
    let snapshot = Snapshot::new(TH32CS_SNAPMODULE | TH32CS_SNAPMODULE32, pid)?;
    let mut entry = MODULEENTRY32W {
        dwSize: std::mem::size_of::<MODULEENTRY32W>() as u32,
        ..Default::default()
    };

    let mut modules = Vec::new();
    // SAFETY: entry.dwSize is initialized and the snapshot handle is valid.
    let mut more = unsafe { Module32FirstW(snapshot.0, &mut entry) }.is_ok();
    while more {
        modules.push(MemoryRegion::named(
            entry.modBaseAddr as u64,
            entry.modBaseSize as usize,
            wide_to_string(&entry.szModule),
        ));
        // SAFETY: same snapshot and entry as above.
        more = unsafe { Module32NextW(snapshot.0, &mut entry) }.is_ok();
    }

    Ok(modules)
}

fn main_module(pid: u32) -> Result<MemoryRegion> {
    enumerate_modules(pid)?
        .into_iter()
        .next()
        .ok_or_else(|| Error::ProcessNotFound(format!("pid {} has no modules", pid)))
}

fn wide_to_string(wide: &[u16]) -> String {
    let len = wide.iter().position(|&c| c == 0).unwrap_or(wide.len());
    String::from_utf16_lossy(&wide[..len])
}

//! Linux backend: positional reads from `/proc/<pid>/mem`.

use std::fs::{self, File};
use std::io::{self, BufRead, BufReader};
use std::os::unix::fs::FileExt;
use std::path::Path;

use tracing::debug;

use super::ProcessSelector;
use crate::error::{Error, Result};
use crate::memory::{MemoryRegion, MemorySource};

const ESRCH: i32 = 3;
const EIO: i32 = 5;
const EFAULT: i32 = 14;

/// Open read-only view of a running process
pub struct ProcessHandle {
    pub pid: u32,
    pub name: String,
    mem: File,
}

impl ProcessHandle {
    pub fn open(pid: u32) -> Result<Self> {
        let mem_path = format!("/proc/{}/mem", pid);
        let mem = File::open(&mem_path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => Error::ProcessNotFound(format!("pid {}", pid)),
            _ => Error::ProcessOpenFailed(format!("{}: {}", mem_path, e)),
        })?;

        let name = process_name(pid).unwrap_or_else(|| "unknown".to_string());
        debug!("Opened process {} ({})", pid, name);

        Ok(Self { pid, name, mem })
    }

    /// Find the pid of a process by executable name
    pub fn find(selector: &ProcessSelector) -> Result<u32> {
        if let ProcessSelector::Pid(pid) = selector {
            return Ok(*pid);
        }

        let mut candidates: Vec<u32> = fs::read_dir("/proc")?
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| entry.file_name().to_str()?.parse::<u32>().ok())
            .filter(|pid| {
                process_name(*pid).is_some_and(|name| selector.matches_name(&name))
                    || process_cmdline_exe(*pid).is_some_and(|exe| selector.matches_name(&exe))
            })
            .collect();

        candidates.sort_unstable();
        if candidates.len() > 1 {
            debug!(
                "Multiple processes match {}: {:?}, using the first",
                selector, candidates
            );
        }

        candidates
            .first()
            .copied()
            .ok_or_else(|| Error::ProcessNotFound(selector.to_string()))
    }
}

impl MemorySource for ProcessHandle {
    fn read_into(&self, address: u64, buf: &mut [u8]) -> Result<usize> {
        let mut total = 0usize;
        while total < buf.len() {
            match self.mem.read_at(&mut buf[total..], address + total as u64) {
                Ok(0) => break,
                Ok(n) => total += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    if total > 0 {
                        break;
                    }
                    return Err(map_read_error(e, address, buf.len()));
                }
            }
        }
        Ok(total)
    }

    fn modules(&self) -> Result<Vec<MemoryRegion>> {
        let file = File::open(format!("/proc/{}/maps", self.pid))?;
        let mut lines = Vec::new();
        for line in BufReader::new(file).lines() {
            lines.push(line?);
        }
        Ok(parse_module_bounds(lines.iter().map(String::as_str)))
    }

    fn is_alive(&self) -> bool {
        Path::new(&format!("/proc/{}", self.pid)).exists()
    }

    fn pid(&self) -> u32 {
        self.pid
    }
}

fn map_read_error(e: io::Error, address: u64, size: usize) -> Error {
    match e.raw_os_error() {
        Some(EIO) | Some(EFAULT) => Error::AddressInvalid { address },
        Some(ESRCH) => Error::ProcessExited,
        _ if e.kind() == io::ErrorKind::PermissionDenied => Error::AccessDenied { address, size },
        _ => Error::Io(e),
    }
}

fn process_name(pid: u32) -> Option<String> {
    fs::read_to_string(format!("/proc/{}/comm", pid))
        .ok()
        .map(|s| s.trim().to_string())
}

/// First argv entry; Wine processes show the Windows executable path here
fn process_cmdline_exe(pid: u32) -> Option<String> {
    let cmdline = fs::read(format!("/proc/{}/cmdline", pid)).ok()?;
    let first = cmdline.split(|&b| b == 0).next()?;
    if first.is_empty() {
        return None;
    }
    Some(String::from_utf8_lossy(first).into_owned())
}

/// Collapse `/proc/<pid>/maps` lines into one region per mapped file.
///
/// Each module spans from its lowest mapping start to its highest mapping end,
/// in order of first appearance (the main executable comes first).
pub(crate) fn parse_module_bounds<'a, I>(lines: I) -> Vec<MemoryRegion>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut modules: Vec<(String, u64, u64)> = Vec::new();

    for line in lines {
        let parts: Vec<&str> = line.split_whitespace().collect();
        let Some(path) = parts.get(5) else {
            continue;
        };
        if !path.starts_with('/') {
            continue;
        }

        let Some((start, end)) = parts[0].split_once('-') else {
            continue;
        };
        let (Ok(start), Ok(end)) = (u64::from_str_radix(start, 16), u64::from_str_radix(end, 16))
        else {
            continue;
        };

        match modules.iter_mut().find(|(name, _, _)| name == path) {
            Some(module) => {
                module.1 = module.1.min(start);
                module.2 = module.2.max(end);
            }
            None => modules.push((path.to_string(), start, end)),
        }
    }

    modules
        .into_iter()
        .map(|(name, start, end)| MemoryRegion::named(start, (end - start) as usize, name))
        .collect()
}

use std::io;

use sockrelay_peer::{CommandBackend, INVALID_COMMAND};

/// Commands profile C clients may send.
pub const SYSINFO_COMMANDS: [&str; 2] = ["freeram", "loads"];

/// The figures the system-info backend reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Snapshot {
    pub free_ram_kb: u64,
    /// One-minute load average, truncated to an integer.
    pub load_1m: u64,
}

/// Answers `freeram` and `loads` from a system snapshot.
#[derive(Debug, Clone, Copy)]
pub struct SystemInfoBackend {
    probe: fn() -> io::Result<Snapshot>,
}

impl SystemInfoBackend {
    /// Use a custom snapshot source.
    pub fn with_probe(probe: fn() -> io::Result<Snapshot>) -> Self {
        Self { probe }
    }
}

impl Default for SystemInfoBackend {
    fn default() -> Self {
        Self::with_probe(read_snapshot)
    }
}

impl CommandBackend for SystemInfoBackend {
    fn execute(&self, command: &str) -> String {
        let command = command.trim();
        if !SYSINFO_COMMANDS.contains(&command) {
            return format!(
                "{INVALID_COMMAND}\nAvailable commands: <{}>",
                SYSINFO_COMMANDS.join("> <")
            );
        }

        let snapshot = match (self.probe)() {
            Ok(snapshot) => snapshot,
            Err(err) => return format!("System information unavailable: {err}"),
        };

        match command {
            "freeram" => format!("Free RAM: {} KB", snapshot.free_ram_kb),
            _ => format!("Load average (last minute): {}", snapshot.load_1m),
        }
    }
}

/// Fixed-point shift of the kernel's load averages.
#[cfg(target_os = "linux")]
const SI_LOAD_SHIFT: u32 = 16;

#[cfg(target_os = "linux")]
pub fn read_snapshot() -> io::Result<Snapshot> {
    // SAFETY: `sysinfo` only writes into the zeroed struct we own.
    let mut info: libc::sysinfo = unsafe { std::mem::zeroed() };
    // SAFETY: `info` is a valid, exclusively borrowed `sysinfo` struct.
    if unsafe { libc::sysinfo(&mut info) } != 0 {
        return Err(io::Error::last_os_error());
    }

    let unit = u64::from(info.mem_unit.max(1));
    Ok(Snapshot {
        free_ram_kb: (info.freeram as u64).saturating_mul(unit) / 1024,
        load_1m: (info.loads[0] as u64) >> SI_LOAD_SHIFT,
    })
}

#[cfg(not(target_os = "linux"))]
pub fn read_snapshot() -> io::Result<Snapshot> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "system information is only available on Linux",
    ))
}

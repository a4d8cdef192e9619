//! Process table access for the `ps`, `top` and `kill` builtins
//!
//! Everything here blocks (CPU usage needs two samples), so the executor
//! calls in through `spawn_blocking`.

use serde::Serialize;
use std::path::Path;
use std::time::Duration;
use sysinfo::{CpuExt, DiskExt, Pid, PidExt, ProcessExt, Signal, System, SystemExt};

/// Delay between the two CPU samples `top` takes
const CPU_SAMPLE_INTERVAL: Duration = Duration::from_millis(500);

/// How many processes `top` shows
const TOP_LIMIT: usize = 10;

const MIB: u64 = 1024 * 1024;
const GIB: u64 = 1024 * MIB;

#[derive(Clone, Debug, Serialize)]
pub struct ProcessInfo {
    pub pid: u32,
    pub name: String,
    pub cpu_percent: f32,
    pub memory_percent: f32,
}

#[derive(Debug, thiserror::Error)]
pub enum KillError {
    #[error("no such process: {0}")]
    NoSuchProcess(u32),
    #[error("permission denied: {0}")]
    PermissionDenied(u32),
}

/// Processes known to `sys`, ordered by pid
pub fn snapshot(sys: &System) -> Vec<ProcessInfo> {
    let total_memory = sys.total_memory().max(1) as f32;
    let mut processes: Vec<ProcessInfo> = sys
        .processes()
        .iter()
        .map(|(pid, process)| ProcessInfo {
            pid: pid.as_u32(),
            name: process.name().to_string(),
            cpu_percent: process.cpu_usage(),
            memory_percent: process.memory() as f32 / total_memory * 100.0,
        })
        .collect();
    processes.sort_by_key(|p| p.pid);
    processes
}

/// Output of the `ps` builtin
pub fn render_ps() -> String {
    let mut sys = System::new();
    sys.refresh_memory();
    sys.refresh_processes();

    let processes = snapshot(&sys);
    if processes.is_empty() {
        return "No processes found".to_string();
    }

    let mut lines = vec![format!(
        "{:>8} {:<20} {:>7} {:>7}",
        "PID", "NAME", "CPU", "MEM"
    )];
    lines.extend(processes.iter().map(|p| {
        let name: String = p.name.chars().take(20).collect();
        format!(
            "{:>8} {:<20} {:>6.1}% {:>6.1}%",
            p.pid, name, p.cpu_percent, p.memory_percent
        )
    }));
    lines.join("\n")
}

/// Output of the `top` builtin: system load plus the busiest processes
pub fn render_top() -> String {
    let mut sys = System::new();
    sys.refresh_memory();
    sys.refresh_cpu();
    sys.refresh_processes();
    sys.refresh_disks_list();
    std::thread::sleep(CPU_SAMPLE_INTERVAL);
    sys.refresh_cpu();
    sys.refresh_processes();

    let cpu = sys.global_cpu_info().cpu_usage();
    let total_memory = sys.total_memory();
    let used_memory = sys.used_memory();

    let mut lines = vec![
        format!("CPU Usage: {:.1}%", cpu),
        format!(
            "Memory Usage: {:.1}% ({}MB / {}MB)",
            percent(used_memory, total_memory),
            used_memory / MIB,
            total_memory / MIB
        ),
    ];

    let root = sys
        .disks()
        .iter()
        .find(|disk| disk.mount_point() == Path::new("/"))
        .or_else(|| sys.disks().first());
    if let Some(disk) = root {
        let total = disk.total_space();
        let used = total.saturating_sub(disk.available_space());
        lines.push(format!(
            "Disk Usage: {:.1}% ({}GB / {}GB)",
            percent(used, total),
            used / GIB,
            total / GIB
        ));
    }

    lines.push(String::new());
    lines.push(format!("{:<8} {:<20} {:<8} {:<8}", "PID", "NAME", "CPU%", "MEM%"));
    lines.push("-".repeat(50));

    let mut processes = snapshot(&sys);
    processes.sort_by(|a, b| b.cpu_percent.total_cmp(&a.cpu_percent));
    lines.extend(processes.iter().take(TOP_LIMIT).map(|p| {
        let name: String = p.name.chars().take(19).collect();
        format!(
            "{:>8} {:<20} {:>7.1} {:>7.1}",
            p.pid, name, p.cpu_percent, p.memory_percent
        )
    }));

    lines.join("\n")
}

/// Ask a process to terminate, falling back to a hard kill where SIGTERM
/// is unsupported
pub fn terminate(pid: u32) -> Result<(), KillError> {
    let mut sys = System::new();
    let target = Pid::from_u32(pid);
    if !sys.refresh_process(target) {
        return Err(KillError::NoSuchProcess(pid));
    }
    let process = sys.process(target).ok_or(KillError::NoSuchProcess(pid))?;

    let delivered = process
        .kill_with(Signal::Term)
        .unwrap_or_else(|| process.kill());
    if delivered {
        Ok(())
    } else {
        Err(KillError::PermissionDenied(pid))
    }
}

fn percent(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_contains_current_process() {
        let mut sys = System::new();
        sys.refresh_processes();

        let me = std::process::id();
        assert!(snapshot(&sys).iter().any(|p| p.pid == me));
    }

    #[test]
    fn test_render_ps_columns_line_up() {
        let output = render_ps();
        let mut lines = output.lines();
        let header = lines.next().unwrap();
        assert_eq!(header.split_whitespace().collect::<Vec<_>>(), ["PID", "NAME", "CPU", "MEM"]);

        let width = header.chars().count();
        for row in lines {
            assert_eq!(row.chars().count(), width, "misaligned row: {row:?}");
            assert!(row.ends_with('%'));
        }
    }

    #[test]
    fn test_terminate_unknown_pid() {
        let err = terminate(u32::MAX - 1).unwrap_err();
        assert!(matches!(err, KillError::NoSuchProcess(_)));
        assert_eq!(err.to_string(), format!("no such process: {}", u32::MAX - 1));
    }

    #[test]
    fn test_percent() {
        assert_eq!(percent(1, 4), 25.0);
        assert_eq!(percent(1, 0), 0.0);
    }
}

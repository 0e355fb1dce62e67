use std::collections::{HashMap, HashSet};
use std::path::Path;
use sysinfo::{Pid, System};

/// Outcome of an OS-level kill scan
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KillReport {
    /// Processes whose executable matched
    pub found: usize,
    /// Matching processes that accepted the kill signal; never above `found`
    pub killed: usize,
}

/// Last resort when a process ignores the forceful stop request.
///
/// Called from a blocking task; implementations may take their time.
pub trait ProcessKiller: Send + Sync {
    /// Kill every process whose executable path ends with `executable`,
    /// together with its children.
    fn kill_matching(&self, executable: &Path) -> KillReport;
}

/// [`ProcessKiller`] that scans the process table with `sysinfo`
#[derive(Debug, Default, Clone, Copy)]
pub struct SysinfoKiller;

impl ProcessKiller for SysinfoKiller {
    fn kill_matching(&self, executable: &Path) -> KillReport {
        let mut system = System::new();
        system.refresh_processes();

        let matching: Vec<Pid> = system
            .processes()
            .iter()
            .filter(|(_, process)| process.exe().is_some_and(|exe| exe.ends_with(executable)))
            .map(|(pid, _)| *pid)
            .collect();

        let mut children: HashMap<Pid, Vec<Pid>> = HashMap::new();
        for (pid, process) in system.processes() {
            if let Some(parent) = process.parent() {
                children.entry(parent).or_default().push(*pid);
            }
        }

        let mut report = KillReport {
            found: matching.len(),
            killed: 0,
        };
        let mut visited = HashSet::new();

        for root in matching {
            if !visited.insert(root) {
                // Already taken down as a child of an earlier match.
                report.killed += 1;
                continue;
            }

            for child in descendants(&children, root) {
                if visited.insert(child) {
                    if let Some(process) = system.process(child) {
                        process.kill();
                    }
                }
            }

            let killed = system.process(root).is_some_and(|process| process.kill());
            if killed {
                report.killed += 1;
            } else {
                tracing::warn!(pid = %root, "Failed to kill process");
            }
        }

        tracing::info!(
            executable = %executable.display(),
            found = report.found,
            killed = report.killed,
            "Kill scan finished"
        );
        report
    }
}

/// Every process below `root`, deepest first.
fn descendants(children: &HashMap<Pid, Vec<Pid>>, root: Pid) -> Vec<Pid> {
    let mut order = Vec::new();
    let mut stack = vec![root];
    let mut seen = HashSet::from([root]);

    while let Some(pid) = stack.pop() {
        for child in children.get(&pid).into_iter().flatten() {
            if seen.insert(*child) {
                order.push(*child);
                stack.push(*child);
            }
        }
    }

    order.reverse();
    order
}

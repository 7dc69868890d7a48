use std::collections::HashMap;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::{Mutex, PoisonError};

use tracing::debug;

use super::{Task, TaskId, TaskRef, MAX_PRIORITY};
use crate::config::LocalConfig;
use crate::error::{HwError, Result};
use crate::topology::VirtualCoreId;
use crate::{sched, sysfs};

// Positions among the `stat` fields following the command name.
const STAT_UTIME: usize = 11;
const STAT_STIME: usize = 12;
const STAT_NICE: usize = 16;
const STAT_STARTTIME: usize = 19;
const STAT_PROCESSOR: usize = 36;

/// Nice value of priority 0.
const NICE_OF_LOWEST_PRIORITY: i32 = 20;

/// Uptime in seconds and consumed cpu ticks at the last usage reset.
#[derive(Debug, Clone, Copy)]
struct UsageBaseline {
    uptime: f64,
    ticks: u64,
}

/// Task control through procfs and the scheduler syscalls.
#[derive(Debug)]
pub struct LocalTask {
    proc_dir: PathBuf,
    ticks_per_second: u64,
    usage_baselines: Mutex<HashMap<TaskRef, UsageBaseline>>,
}

impl LocalTask {
    pub fn new(config: &LocalConfig) -> Result<Self> {
        let proc_dir = config.proc_dir();
        if !proc_dir.is_dir() {
            return Err(HwError::Unsupported(format!(
                "no procfs at {}",
                proc_dir.display()
            )));
        }
        Ok(Self {
            proc_dir,
            ticks_per_second: sched::clock_ticks_per_second(),
            usage_baselines: Mutex::new(HashMap::new()),
        })
    }

    fn task_dir(&self, task: TaskRef) -> PathBuf {
        match task {
            TaskRef::Process(pid) => self.proc_dir.join(pid.to_string()),
            TaskRef::Thread { pid, tid } => self
                .proc_dir
                .join(pid.to_string())
                .join("task")
                .join(tid.to_string()),
        }
    }

    /// Parse one `stat` field, or `None` once the task has exited.
    fn stat_field<T>(&self, task: TaskRef, index: usize) -> Result<Option<T>>
    where
        T: FromStr,
        T::Err: Display,
    {
        let path = self.task_dir(task).join("stat");
        let line = match sysfs::read_first_line(&path) {
            Ok(line) => line,
            Err(_) if !self.task_dir(task).exists() => return Ok(None),
            Err(err) => return Err(err),
        };

        // The command name is parenthesized and may itself contain spaces
        // and parentheses.
        let Some(end) = line.rfind(')') else {
            return Err(HwError::parse(&path, line.as_str(), "missing command name"));
        };
        let value = line[end + 1..]
            .split_whitespace()
            .nth(index)
            .ok_or_else(|| HwError::parse(&path, line.as_str(), format!("no field {index}")))?;
        value
            .parse()
            .map(Some)
            .map_err(|err| HwError::parse(&path, value, err))
    }

    /// Seconds since boot, from `/proc/uptime`.
    fn uptime(&self) -> Result<f64> {
        let path = self.proc_dir.join("uptime");
        let line = sysfs::read_first_line(&path)?;
        let seconds = line.split_whitespace().next().unwrap_or_default();
        seconds
            .parse()
            .map_err(|err| HwError::parse(&path, seconds, err))
    }

    /// Current uptime and consumed user plus system ticks, or `None` once
    /// the task has exited.
    fn usage_sample(&self, task: TaskRef) -> Result<Option<UsageBaseline>> {
        let (Some(utime), Some(stime)) = (
            self.stat_field::<u64>(task, STAT_UTIME)?,
            self.stat_field::<u64>(task, STAT_STIME)?,
        ) else {
            return Ok(None);
        };
        Ok(Some(UsageBaseline {
            uptime: self.uptime()?,
            ticks: utime + stime,
        }))
    }

    fn reset_baseline(&self, task: TaskRef) -> Option<UsageBaseline> {
        self.usage_baselines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&task)
            .copied()
    }

    /// Baseline of a task never reset: zero ticks when it started.
    fn start_baseline(&self, task: TaskRef) -> Result<Option<UsageBaseline>> {
        let started: Option<u64> = self.stat_field(task, STAT_STARTTIME)?;
        Ok(started.map(|ticks| UsageBaseline {
            uptime: ticks as f64 / self.ticks_per_second as f64,
            ticks: 0,
        }))
    }

    /// Kernel ids to act on: every thread of a process, or the thread itself.
    fn thread_ids(&self, task: TaskRef) -> Result<Vec<TaskId>> {
        match task {
            TaskRef::Process(pid) => self.active_threads(pid),
            TaskRef::Thread { tid, .. } => Ok(vec![tid]),
        }
    }
}

impl Task for LocalTask {
    fn active_processes(&self) -> Result<Vec<TaskId>> {
        sysfs::numbered_entries(&self.proc_dir, "")
    }

    fn active_threads(&self, pid: TaskId) -> Result<Vec<TaskId>> {
        sysfs::numbered_entries(&self.task_dir(TaskRef::Process(pid)).join("task"), "")
    }

    fn is_active(&self, task: TaskRef) -> Result<bool> {
        Ok(self.task_dir(task).exists())
    }

    fn priority(&self, task: TaskRef) -> Result<Option<u32>> {
        let nice: Option<i32> = self.stat_field(task, STAT_NICE)?;
        Ok(nice.map(|nice| (NICE_OF_LOWEST_PRIORITY - nice).clamp(0, MAX_PRIORITY as i32) as u32))
    }

    fn set_priority(&self, task: TaskRef, priority: u32) -> Result<bool> {
        if priority > MAX_PRIORITY {
            return Ok(false);
        }
        let nice = NICE_OF_LOWEST_PRIORITY - priority as i32;
        let tids = self.thread_ids(task)?;
        if tids.is_empty() {
            return Ok(false);
        }
        for tid in tids {
            if let Err(err) = sched::set_nice(tid, nice) {
                debug!(%task, tid, nice, error = %err, "setpriority refused");
                return Ok(false);
            }
        }
        debug!(%task, priority, "priority set");
        Ok(true)
    }

    fn virtual_core(&self, task: TaskRef) -> Result<Option<VirtualCoreId>> {
        self.stat_field(task, STAT_PROCESSOR)
    }

    fn affinity(&self, task: TaskRef) -> Result<Option<Vec<VirtualCoreId>>> {
        let id = match task {
            TaskRef::Process(pid) => pid,
            TaskRef::Thread { tid, .. } => tid,
        };
        match sched::affinity(id) {
            Ok(virtual_cores) => Ok(Some(virtual_cores)),
            Err(_) if !self.task_dir(task).exists() => Ok(None),
            Err(err) => Err(HwError::io("sched_getaffinity", self.task_dir(task), err)),
        }
    }

    fn move_to(&self, task: TaskRef, virtual_cores: &[VirtualCoreId]) -> Result<bool> {
        if virtual_cores.is_empty() {
            return Ok(false);
        }
        match task {
            TaskRef::Thread { tid, .. } => {
                if let Err(err) = sched::set_affinity(tid, virtual_cores) {
                    debug!(%task, error = %err, "sched_setaffinity refused");
                    return Ok(false);
                }
            }
            TaskRef::Process(pid) => {
                if let Err(err) = sched::set_affinity(pid, virtual_cores) {
                    debug!(%task, error = %err, "sched_setaffinity refused");
                    return Ok(false);
                }
                // Threads may exit while we walk them.
                for tid in self.active_threads(pid)? {
                    if let Err(err) = sched::set_affinity(tid, virtual_cores) {
                        debug!(%task, tid, error = %err, "thread not moved");
                    }
                }
            }
        }
        debug!(%task, ?virtual_cores, "task moved");
        Ok(true)
    }

    fn core_usage(&self, task: TaskRef) -> Result<Option<f64>> {
        let Some(now) = self.usage_sample(task)? else {
            return Ok(None);
        };
        let baseline = match self.reset_baseline(task) {
            Some(baseline) => baseline,
            None => match self.start_baseline(task)? {
                Some(baseline) => baseline,
                None => return Ok(None),
            },
        };

        let elapsed = now.uptime - baseline.uptime;
        if elapsed <= 0.0 {
            return Ok(Some(0.0));
        }
        let busy = now.ticks.saturating_sub(baseline.ticks) as f64 / self.ticks_per_second as f64;
        Ok(Some(busy / elapsed * 100.0))
    }

    fn reset_core_usage(&self, task: TaskRef) -> Result<bool> {
        let Some(now) = self.usage_sample(task)? else {
            return Ok(false);
        };
        self.usage_baselines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(task, now);
        Ok(true)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::testing::FakeTree;
    use crate::topology::Topology;

    /// Above the largest pid the kernel can hand out.
    pub(crate) const NEVER_A_PID: TaskId = 4_194_305;

    /// A `stat` line whose command name contains spaces and parentheses.
    pub(crate) fn stat_line(pid: TaskId, nice: i32, processor: u32) -> String {
        timed_stat_line(pid, nice, processor, (0, 0, 0))
    }

    /// [`stat_line`] with `(utime, stime, starttime)` in clock ticks.
    pub(crate) fn timed_stat_line(
        pid: TaskId,
        nice: i32,
        processor: u32,
        (utime, stime, starttime): (u64, u64, u64),
    ) -> String {
        let mut fields = vec!["0".to_string(); 44];
        fields[0] = "S".into();
        fields[STAT_UTIME] = utime.to_string();
        fields[STAT_STIME] = stime.to_string();
        fields[STAT_NICE] = nice.to_string();
        fields[STAT_STARTTIME] = starttime.to_string();
        fields[STAT_PROCESSOR] = processor.to_string();
        format!("{pid} (my (odd) proc) {}\n", fields.join(" "))
    }

    /// Process 300 with threads 300 and 301, process 302 alone.
    pub(crate) fn with_tasks(tag: &str) -> FakeTree {
        let tree = FakeTree::new(tag);
        tree.write("proc/300/stat", &stat_line(300, -5, 3));
        tree.write("proc/300/task/300/stat", &stat_line(300, -5, 3));
        tree.write("proc/300/task/301/stat", &stat_line(301, 10, 6));
        tree.write("proc/302/stat", &stat_line(302, 0, 1));
        tree.write("proc/self/stat", &stat_line(302, 0, 1));
        tree.write("proc/cpuinfo", "processor : 0\n");
        tree
    }

    #[test]
    fn lists_processes_and_threads() {
        let tree = with_tasks("task-list");
        let tasks = LocalTask::new(&tree.config()).unwrap();

        assert_eq!(tasks.active_processes().unwrap(), vec![300, 302]);
        assert_eq!(tasks.active_threads(300).unwrap(), vec![300, 301]);
        assert!(tasks.active_threads(999).unwrap().is_empty());
        assert!(tasks.is_active(TaskRef::Thread { pid: 300, tid: 301 }).unwrap());
        assert!(!tasks.is_active(TaskRef::Process(999)).unwrap());
        assert_eq!(
            tasks.threads_of(300).unwrap()[1],
            TaskRef::Thread { pid: 300, tid: 301 }
        );
    }

    #[test]
    fn reads_priority_and_processor_from_stat() {
        let tree = with_tasks("task-stat");
        let tasks = LocalTask::new(&tree.config()).unwrap();

        assert_eq!(tasks.priority(TaskRef::Process(300)).unwrap(), Some(25));
        assert_eq!(tasks.priority(TaskRef::Process(302)).unwrap(), Some(20));
        let thread = TaskRef::Thread { pid: 300, tid: 301 };
        assert_eq!(tasks.priority(thread).unwrap(), Some(10));
        assert_eq!(tasks.virtual_core(thread).unwrap(), Some(6));
    }

    #[test]
    fn exited_tasks_read_as_none() {
        let tree = with_tasks("task-gone");
        let tasks = LocalTask::new(&tree.config()).unwrap();

        assert_eq!(tasks.priority(TaskRef::Process(999)).unwrap(), None);
        assert_eq!(tasks.virtual_core(TaskRef::Process(999)).unwrap(), None);
    }

    #[test]
    fn garbled_stat_of_a_live_task_is_an_error() {
        let tree = with_tasks("task-garbled");
        tree.write("proc/302/stat", "302 no command name\n");
        let tasks = LocalTask::new(&tree.config()).unwrap();

        assert!(matches!(
            tasks.priority(TaskRef::Process(302)),
            Err(HwError::Parse { .. })
        ));
    }

    #[test]
    fn core_usage_since_start_and_since_reset() {
        let tree = with_tasks("task-usage");
        let tasks = LocalTask::new(&tree.config()).unwrap();
        let hz = tasks.ticks_per_second;
        let process = TaskRef::Process(302);

        // Started 10 s after boot, 20 s of uptime, busy for 5 of them.
        tree.write("proc/uptime", "30.00 100.00\n");
        tree.write(
            "proc/302/stat",
            &timed_stat_line(302, 0, 1, (3 * hz, 2 * hz, 10 * hz)),
        );
        let usage = tasks.core_usage(process).unwrap().unwrap();
        assert!((usage - 25.0).abs() < 1e-9, "{usage}");

        assert!(tasks.reset_core_usage(process).unwrap());
        assert_eq!(tasks.core_usage(process).unwrap(), Some(0.0));

        // One fully busy second out of four.
        tree.write("proc/uptime", "34.00 100.00\n");
        tree.write(
            "proc/302/stat",
            &timed_stat_line(302, 0, 1, (4 * hz, 2 * hz, 10 * hz)),
        );
        let usage = tasks.core_usage(process).unwrap().unwrap();
        assert!((usage - 25.0).abs() < 1e-9, "{usage}");

        let gone = TaskRef::Process(999);
        assert_eq!(tasks.core_usage(gone).unwrap(), None);
        assert!(!tasks.reset_core_usage(gone).unwrap());
    }

    #[test]
    fn moves_to_cpus_and_physical_cores_of_a_layout() {
        let tree = FakeTree::with_two_packages("task-move-layout");
        tree.write("proc/1/stat", &stat_line(1, 0, 0));
        let layout = crate::topology::LocalTopology::new(&tree.config())
            .unwrap()
            .layout()
            .clone();
        let tasks = LocalTask::new(&tree.config()).unwrap();

        // Nothing to move onto.
        assert!(!tasks
            .move_to_cpu(TaskRef::Process(1), &layout, 9)
            .unwrap());
        assert!(!tasks
            .move_to_physical_core(TaskRef::Process(1), &layout, 0, 7)
            .unwrap());
    }

    #[test]
    fn rejected_arguments_are_false() {
        let tree = with_tasks("task-reject");
        let tasks = LocalTask::new(&tree.config()).unwrap();

        assert!(!tasks.set_priority(TaskRef::Process(300), 41).unwrap());
        assert!(!tasks.set_priority(TaskRef::Process(999), 20).unwrap());
        assert!(!tasks.move_to(TaskRef::Process(300), &[]).unwrap());
    }

    #[test]
    fn missing_procfs_is_unsupported() {
        let tree = FakeTree::new("task-none");
        assert!(matches!(
            LocalTask::new(&tree.config()),
            Err(HwError::Unsupported(_))
        ));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn controls_this_process() {
        let tasks = LocalTask::new(&LocalConfig::default()).unwrap();
        let me = TaskRef::Process(std::process::id());

        assert!(tasks.is_active(me).unwrap());
        assert!(tasks.active_processes().unwrap().contains(&me.pid()));
        assert!(tasks.active_threads(me.pid()).unwrap().contains(&me.pid()));

        let priority = tasks.priority(me).unwrap().unwrap();
        assert!(priority <= MAX_PRIORITY);
        assert!(tasks.set_priority(me, priority).unwrap());

        let cores = tasks.affinity(me).unwrap().unwrap();
        assert!(!cores.is_empty());
        assert!(tasks.move_to(me, &cores).unwrap());
        assert!(tasks.virtual_core(me).unwrap().is_some());

        let usage = tasks.core_usage(me).unwrap().unwrap();
        assert!(usage >= 0.0);
        assert!(tasks.reset_core_usage(me).unwrap());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn exited_processes_cannot_be_controlled() {
        let tasks = LocalTask::new(&LocalConfig::default()).unwrap();
        let gone = TaskRef::Process(NEVER_A_PID);

        assert!(!tasks.is_active(gone).unwrap());
        assert_eq!(tasks.priority(gone).unwrap(), None);
        assert_eq!(tasks.affinity(gone).unwrap(), None);
        assert!(!tasks.set_priority(gone, 20).unwrap());
        assert!(!tasks.move_to(gone, &[0]).unwrap());
    }
}

//! Scheduler syscalls shared by task control and the utilization spinners.
//!
//! A thread id of 0 designates the calling thread.

use crate::topology::VirtualCoreId;

/// Kernel task identifier.
pub(crate) type Tid = u32;

/// Clock ticks per second assumed when the kernel cannot be asked.
const DEFAULT_CLOCK_TICKS: u64 = 100;

#[cfg(target_os = "linux")]
mod sys {
    use std::io;
    use std::mem;

    use super::{Tid, VirtualCoreId};

    pub(crate) fn set_nice(tid: Tid, nice: i32) -> io::Result<()> {
        // SAFETY: setpriority only takes integers.
        let rc = unsafe { libc::setpriority(libc::PRIO_PROCESS, tid as libc::id_t, nice) };
        if rc == -1 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    pub(crate) fn set_affinity(tid: Tid, virtual_cores: &[VirtualCoreId]) -> io::Result<()> {
        let set_size = libc::CPU_SETSIZE as usize;
        if let Some(vc) = virtual_cores.iter().find(|&&vc| vc as usize >= set_size) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("virtual core {vc} beyond affinity mask"),
            ));
        }

        // SAFETY: all zeroes is the empty cpu_set_t.
        let mut set: libc::cpu_set_t = unsafe { mem::zeroed() };
        for &vc in virtual_cores {
            // SAFETY: `vc` was checked against CPU_SETSIZE above.
            unsafe { libc::CPU_SET(vc as usize, &mut set) };
        }
        // SAFETY: `set` is a live cpu_set_t and the size passed is its own.
        let rc = unsafe {
            libc::sched_setaffinity(tid as libc::pid_t, mem::size_of::<libc::cpu_set_t>(), &set)
        };
        if rc == -1 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    pub(crate) fn affinity(tid: Tid) -> io::Result<Vec<VirtualCoreId>> {
        // SAFETY: all zeroes is the empty cpu_set_t.
        let mut set: libc::cpu_set_t = unsafe { mem::zeroed() };
        // SAFETY: `set` is a live cpu_set_t and the size passed is its own.
        let rc = unsafe {
            libc::sched_getaffinity(
                tid as libc::pid_t,
                mem::size_of::<libc::cpu_set_t>(),
                &mut set,
            )
        };
        if rc == -1 {
            return Err(io::Error::last_os_error());
        }
        Ok((0..libc::CPU_SETSIZE as usize)
            // SAFETY: the index stays below CPU_SETSIZE.
            .filter(|&cpu| unsafe { libc::CPU_ISSET(cpu, &set) })
            .map(|cpu| cpu as VirtualCoreId)
            .collect())
    }

    pub(crate) fn clock_ticks() -> Option<u64> {
        // SAFETY: sysconf only takes an integer.
        let ticks = unsafe { libc::sysconf(libc::_SC_CLK_TCK) };
        (ticks > 0).then_some(ticks as u64)
    }
}

#[cfg(not(target_os = "linux"))]
mod sys {
    use std::io;

    use super::{Tid, VirtualCoreId};

    fn unsupported() -> io::Error {
        io::Error::new(io::ErrorKind::Unsupported, "scheduler control requires linux")
    }

    pub(crate) fn set_nice(_tid: Tid, _nice: i32) -> io::Result<()> {
        Err(unsupported())
    }

    pub(crate) fn set_affinity(_tid: Tid, _virtual_cores: &[VirtualCoreId]) -> io::Result<()> {
        Err(unsupported())
    }

    pub(crate) fn affinity(_tid: Tid) -> io::Result<Vec<VirtualCoreId>> {
        Err(unsupported())
    }

    pub(crate) fn clock_ticks() -> Option<u64> {
        None
    }
}

pub(crate) use sys::{affinity, set_affinity, set_nice};

/// `USER_HZ`, the unit of the times in `/proc/stat` and `/proc/<pid>/stat`.
pub(crate) fn clock_ticks_per_second() -> u64 {
    sys::clock_ticks().unwrap_or(DEFAULT_CLOCK_TICKS)
}

//! Busy-loop threads that keep virtual cores fully utilized.

use std::collections::HashMap;
use std::hint::black_box;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use tracing::debug;

use crate::error::{HwError, Result};
use crate::sched;
use crate::topology::VirtualCoreId;

/// Highest scheduling priority.
const SPINNER_NICE: i32 = -20;

struct Spinner {
    stop: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl Spinner {
    fn start(virtual_core: VirtualCoreId) -> Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let join = thread::Builder::new()
            .name(format!("powerprims-spin-{virtual_core}"))
            .spawn(move || spin(virtual_core, &flag))
            .map_err(|source| HwError::Spawn {
                name: "utilization spinner",
                source,
            })?;
        Ok(Self {
            stop,
            join: Some(join),
        })
    }
}

impl Drop for Spinner {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

fn spin(virtual_core: VirtualCoreId, stop: &AtomicBool) {
    if let Err(err) = sched::set_affinity(0, &[virtual_core]) {
        debug!(virtual_core, error = %err, "spinner not pinned");
    }
    if let Err(err) = sched::set_nice(0, SPINNER_NICE) {
        debug!(virtual_core, error = %err, "spinner priority unchanged");
    }
    let mut x = 0.0f64;
    while !stop.load(Ordering::Relaxed) {
        x = black_box(black_box(x).sin() + 1.0);
    }
}

/// At most one spinner per virtual core. Dropping the set stops them all.
#[derive(Default)]
pub(crate) struct Spinners {
    running: Mutex<HashMap<VirtualCoreId, Spinner>>,
}

impl Spinners {
    /// Start a spinner on every listed core, replacing any already there.
    pub(crate) fn start(&self, virtual_cores: &[VirtualCoreId]) -> Result<()> {
        let mut running = self.running.lock().unwrap_or_else(PoisonError::into_inner);
        for &vc in virtual_cores {
            running.remove(&vc);
            running.insert(vc, Spinner::start(vc)?);
        }
        Ok(())
    }

    /// Stop the spinners of the listed cores; returns how many were running.
    pub(crate) fn stop(&self, virtual_cores: &[VirtualCoreId]) -> usize {
        let stopped: Vec<Spinner> = {
            let mut running = self.running.lock().unwrap_or_else(PoisonError::into_inner);
            virtual_cores
                .iter()
                .filter_map(|vc| running.remove(vc))
                .collect()
        };
        stopped.len()
    }

    pub(crate) fn running(&self) -> Vec<VirtualCoreId> {
        let running = self.running.lock().unwrap_or_else(PoisonError::into_inner);
        let mut cores: Vec<_> = running.keys().copied().collect();
        cores.sort_unstable();
        cores
    }
}

impl std::fmt::Debug for Spinners {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Spinners")
            .field("running", &self.running())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_and_stop() {
        let spinners = Spinners::default();
        spinners.start(&[0]).unwrap();
        spinners.start(&[0]).unwrap();
        assert_eq!(spinners.running(), vec![0]);

        assert_eq!(spinners.stop(&[0, 1]), 1);
        assert!(spinners.running().is_empty());
    }

    #[test]
    fn dropping_joins_every_spinner() {
        let spinners = Spinners::default();
        spinners.start(&[0]).unwrap();
        drop(spinners);
    }
}

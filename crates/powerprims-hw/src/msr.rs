//! Model-specific registers through the `msr` driver's `/dev/cpu/<N>/msr`.

use std::fs::OpenOptions;
use std::path::PathBuf;

use crate::config::LocalConfig;
use crate::error::{HwError, Result};
use crate::topology::VirtualCoreId;

/// Current performance state; bits 47:32 hold the core voltage.
pub(crate) const MSR_PERF_STATUS: u64 = 0x198;
/// On-demand clock modulation (T-states).
pub(crate) const MSR_CLOCK_MODULATION: u64 = 0x19A;

/// Registers of one virtual core. Each access opens the device anew.
#[derive(Debug, Clone)]
pub(crate) struct Msr {
    path: PathBuf,
}

impl Msr {
    pub(crate) fn new(config: &LocalConfig, virtual_core: VirtualCoreId) -> Self {
        Self {
            path: config.msr_file(virtual_core),
        }
    }

    /// The device is a character file on real machines, so only existence
    /// is checked.
    pub(crate) fn available(&self) -> bool {
        self.path.exists()
    }

    pub(crate) fn read(&self, register: u64) -> Result<u64> {
        let file = OpenOptions::new()
            .read(true)
            .open(&self.path)
            .map_err(|err| HwError::io("open", &self.path, err))?;
        let mut value = [0u8; 8];
        sys::read_at(&file, &mut value, register)
            .map_err(|err| HwError::io("read msr", &self.path, err))?;
        Ok(u64::from_le_bytes(value))
    }

    pub(crate) fn write(&self, register: u64, value: u64) -> Result<()> {
        let file = OpenOptions::new()
            .write(true)
            .open(&self.path)
            .map_err(|err| HwError::io("open", &self.path, err))?;
        sys::write_at(&file, &value.to_le_bytes(), register)
            .map_err(|err| HwError::io("write msr", &self.path, err))
    }

    /// Bits `high..=low` of a register, shifted down.
    pub(crate) fn read_bits(&self, register: u64, high: u32, low: u32) -> Result<u64> {
        Ok((self.read(register)? & mask(high, low)) >> low)
    }

    /// Replace bits `high..=low` of a register, keeping the others.
    pub(crate) fn write_bits(&self, register: u64, high: u32, low: u32, value: u64) -> Result<()> {
        let mask = mask(high, low);
        let current = self.read(register)?;
        self.write(register, (current & !mask) | ((value << low) & mask))
    }
}

fn mask(high: u32, low: u32) -> u64 {
    let width = high - low + 1;
    let ones = if width >= 64 { u64::MAX } else { (1u64 << width) - 1 };
    ones << low
}

#[cfg(unix)]
mod sys {
    use std::fs::File;
    use std::io;
    use std::os::unix::fs::FileExt;

    pub(super) fn read_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<()> {
        file.read_exact_at(buf, offset)
    }

    pub(super) fn write_at(file: &File, buf: &[u8], offset: u64) -> io::Result<()> {
        file.write_all_at(buf, offset)
    }
}

#[cfg(not(unix))]
mod sys {
    use std::fs::File;
    use std::io;

    fn unsupported() -> io::Error {
        io::Error::new(io::ErrorKind::Unsupported, "msr access requires unix")
    }

    pub(super) fn read_at(_file: &File, _buf: &mut [u8], _offset: u64) -> io::Result<()> {
        Err(unsupported())
    }

    pub(super) fn write_at(_file: &File, _buf: &[u8], _offset: u64) -> io::Result<()> {
        Err(unsupported())
    }
}

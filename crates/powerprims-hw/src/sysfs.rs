//! Small helpers for sysfs and procfs attribute files.

use std::fmt::Display;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use crate::error::{HwError, Result};

/// First line of a file, without the trailing newline.
pub(crate) fn read_first_line(path: &Path) -> Result<String> {
    let contents = fs::read_to_string(path).map_err(|err| HwError::io("read", path, err))?;
    Ok(contents.lines().next().unwrap_or_default().trim_end().to_string())
}

/// Parse the first line of a file.
pub(crate) fn read_value<T>(path: &Path) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    let line = read_first_line(path)?;
    line.trim()
        .parse()
        .map_err(|err| HwError::parse(path, line.clone(), err))
}

/// Whitespace separated values of the first line.
pub(crate) fn read_values<T>(path: &Path) -> Result<Vec<T>>
where
    T: FromStr,
    T::Err: Display,
{
    let line = read_first_line(path)?;
    line.split_whitespace()
        .map(|token| {
            token
                .parse()
                .map_err(|err| HwError::parse(path, token, err))
        })
        .collect()
}

/// Overwrite an attribute file.
pub(crate) fn write_value(path: &Path, value: impl Display) -> Result<()> {
    fs::write(path, value.to_string()).map_err(|err| HwError::io("write", path, err))
}

/// Read a cpu list attribute such as `present` or `related_cpus`.
pub(crate) fn read_cpu_list(path: &Path) -> Result<Vec<u32>> {
    let line = read_first_line(path)?;
    parse_cpu_list(&line).ok_or_else(|| HwError::parse(path, line.clone(), "invalid cpu list"))
}

/// Parse `0-3,6 8` style lists. Ranges are inclusive; separators may be
/// commas or whitespace. The result is sorted and deduplicated.
pub(crate) fn parse_cpu_list(list: &str) -> Option<Vec<u32>> {
    let mut cpus = Vec::new();
    for item in list
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|item| !item.is_empty())
    {
        match item.split_once('-') {
            Some((low, high)) => {
                let low: u32 = low.parse().ok()?;
                let high: u32 = high.parse().ok()?;
                if low > high {
                    return None;
                }
                cpus.extend(low..=high);
            }
            None => cpus.push(item.parse().ok()?),
        }
    }
    cpus.sort_unstable();
    cpus.dedup();
    Some(cpus)
}

/// Numeric suffixes of entries named `<prefix><N>` in a directory, sorted.
///
/// A missing directory yields an empty list.
pub(crate) fn numbered_entries(dir: &Path, prefix: &str) -> Result<Vec<u32>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(HwError::io("list", dir, err)),
    };

    let mut ids: Vec<u32> = entries
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| {
            entry
                .file_name()
                .to_str()
                .and_then(|name| name.strip_prefix(prefix))
                .and_then(|suffix| suffix.parse().ok())
        })
        .collect();
    ids.sort_unstable();
    Ok(ids)
}

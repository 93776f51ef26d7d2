use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::procfs::ProcfsError;
use crate::format::human;

/// The vital lines of `/proc/meminfo`, in KiB.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemInfo {
    pub total_kb: u64,
    pub available_kb: u64,
    pub dirty_kb: u64,
    pub shmem_kb: u64,
}

impl MemInfo {
    pub fn used_kb(&self) -> u64 {
        self.total_kb.saturating_sub(self.available_kb)
    }

    pub fn read(path: &Path) -> Result<Self, ProcfsError> {
        let text = fs::read_to_string(path).map_err(|source| ProcfsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text).map_err(|field| ProcfsError::MissingField {
            path: path.to_path_buf(),
            field,
        })
    }

    /// Parses `Key:   N kB` lines; the name of the first missing key is the error.
    pub fn parse(text: &str) -> Result<Self, &'static str> {
        let mut total = None;
        let mut available = None;
        let mut dirty = None;
        let mut shmem = None;
        for line in text.lines() {
            let Some((key, rest)) = line.split_once(':') else {
                continue;
            };
            let mut words = rest.split_whitespace();
            let (Some(value), Some("kB")) = (words.next(), words.next()) else {
                continue;
            };
            let Ok(value) = value.parse::<u64>() else {
                continue;
            };
            let slot = match key {
                "MemTotal" => &mut total,
                "MemAvailable" => &mut available,
                "Dirty" => &mut dirty,
                "Shmem" => &mut shmem,
                _ => continue,
            };
            *slot = Some(value);
        }
        Ok(MemInfo {
            total_kb: total.ok_or("MemTotal")?,
            available_kb: available.ok_or("MemAvailable")?,
            dirty_kb: dirty.ok_or("Dirty")?,
            shmem_kb: shmem.ok_or("Shmem")?,
        })
    }
}

/// Statistics of one compressed-swap device, in bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ZramStats {
    pub orig_data_size: u64,
    pub compr_data_size: u64,
    pub mem_used_total: u64,
    /// 0 means unlimited.
    pub mem_limit: u64,
    pub mem_used_max: u64,
    pub disksize: u64,
}

impl ZramStats {
    /// Parses the first line of `mm_stat`.
    pub fn parse_mm_stat(text: &str) -> Option<Self> {
        let line = text.lines().next()?;
        let nums: Vec<u64> = line
            .split_whitespace()
            .take(5)
            .map(str::parse)
            .collect::<Result<_, _>>()
            .ok()?;
        let [orig, compr, used, limit, used_max] = nums[..] else {
            return None;
        };
        Some(ZramStats {
            orig_data_size: orig,
            compr_data_size: compr,
            mem_used_total: used,
            mem_limit: limit,
            mem_used_max: used_max,
            disksize: 0,
        })
    }

    pub fn read(device: &Path) -> Option<Self> {
        let mm_stat = fs::read_to_string(device.join("mm_stat")).ok()?;
        let mut stats = Self::parse_mm_stat(&mm_stat)?;
        stats.disksize = fs::read_to_string(device.join("disksize"))
            .ok()
            .and_then(|text| text.trim().parse().ok())
            .unwrap_or(0);
        Some(stats)
    }

    fn add(&mut self, other: &ZramStats) {
        self.orig_data_size += other.orig_data_size;
        self.compr_data_size += other.compr_data_size;
        self.mem_used_total += other.mem_used_total;
        self.mem_limit += other.mem_limit;
        self.mem_used_max += other.mem_used_max;
        self.disksize += other.disksize;
    }
}

/// Reads every active device; unreadable ones are skipped.
pub fn read_zram_devices(devices: &[PathBuf]) -> Vec<ZramStats> {
    devices
        .iter()
        .filter_map(|device| {
            let stats = ZramStats::read(device);
            if stats.is_none() {
                debug!(device = %device.display(), "skipping unreadable zram device");
            }
            stats
        })
        .collect()
}

/// Effective memory figures when compressed swap stretches RAM, in bytes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZramProjection {
    pub total: u64,
    pub zram_used: u64,
    pub e_used: f64,
    pub e_max_used: f64,
    pub e_avail: f64,
}

impl ZramProjection {
    /// Human size plus percent of physical memory, e.g. `1.5G/38%`.
    pub fn human_pct(&self, bytes: f64) -> String {
        let mut text = human(bytes);
        if bytes > 0.0 && self.total > 0 {
            let pct = (100.0 * bytes / self.total as f64).round() as i64;
            text.push_str(&format!("/{pct}%"));
        }
        text
    }
}

/// Projects how much memory is effectively available with compressed swap.
///
/// The result is a heuristic: until the devices hold enough data to measure
/// a compression ratio, `fallback_ratio` is assumed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZramProjector {
    pub limit_pct: f64,
    pub fallback_ratio: f64,
}

impl ZramProjector {
    pub fn project(&self, meminfo: &MemInfo, devices: &[ZramStats]) -> Option<ZramProjection> {
        let (first, rest) = devices.split_first()?;
        let mut stats = *first;
        for dev in rest {
            stats.add(dev);
        }

        let total = meminfo.total_kb * 1024;
        let used = meminfo.used_kb() * 1024;
        let total_f = total as f64;

        let mut ratio = None;
        let mut e_used = used as f64 - stats.mem_used_total as f64 + stats.orig_data_size as f64;
        if e_used <= used as f64 {
            // compression is not paying off yet
            e_used = used as f64;
            ratio = Some(self.fallback_ratio);
        }

        let mut limit_pct = self.limit_pct;
        if stats.mem_limit > 0 && total > 0 {
            limit_pct = limit_pct.min(100.0 * stats.mem_limit as f64 / total_f);
        }

        let ratio = match ratio {
            Some(ratio) => ratio,
            None if stats.mem_used_total > 0 => {
                stats.orig_data_size as f64 / stats.mem_used_total as f64
            }
            None => self.fallback_ratio,
        };

        let mut e_max_used = (ratio * total_f * limit_pct / 100.0).min(stats.disksize as f64);
        e_max_used += total_f - e_max_used / ratio;

        Some(ZramProjection {
            total,
            zram_used: stats.mem_used_total,
            e_used,
            e_max_used,
            e_avail: e_max_used - e_used,
        })
    }
}

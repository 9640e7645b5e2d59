// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

pub const KIB: u64 = 1 << 10;
pub const MIB: u64 = 1 << 20;
pub const GIB: u64 = 1 << 30;

/// `"512 B"` below one KiB, otherwise `"<n> bytes (<x.y> <unit>iB)"`.
#[must_use]
pub fn human_readable_size(bytes: u64) -> String {
    const UNIT: u64 = 1024;
    if bytes < UNIT {
        return format!("{bytes} B");
    }
    let mut div = UNIT;
    let mut exp = 0_usize;
    let mut n = bytes / UNIT;
    while n >= UNIT {
        div *= UNIT;
        exp += 1;
        n /= UNIT;
    }
    let unit = ['K', 'M', 'G', 'T', 'P', 'E'][exp];
    format!("{bytes} bytes ({:.1} {unit}iB)", bytes as f64 / div as f64)
}

/// Throughput of `bytes` moved in `elapsed`, in megabits per second rounded
/// to two decimals. Zero when nothing moved or no time elapsed.
#[must_use]
pub fn throughput_mbps(bytes: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if bytes == 0 || secs <= 0.0 {
        return 0.0;
    }
    let bytes_per_sec = bytes as f64 / secs;
    (bytes_per_sec * 0.000_008 * 100.0).round() / 100.0
}

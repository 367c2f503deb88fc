//! CPU cache line size detection.
//!
//! Stripe locks are laid out at a fixed [`CACHE_LINE_SIZE`] so the layout can
//! be checked at compile time. The harness compares that constant against the
//! line size reported by the running CPU and warns when a stripe lock would
//! straddle less than a full line (e.g. 128-byte lines on some ARM parts).

use std::sync::OnceLock;

/// Cache line size the stripe locks are padded to.
///
/// Modern x86_64 CPUs use 64-byte cache lines. ARM64 may use 128 bytes,
/// which is reported at startup rather than changing the layout.
pub const CACHE_LINE_SIZE: usize = 64;

/// Detect the L1 data cache line size at runtime (cached result).
///
/// Falls back to [`CACHE_LINE_SIZE`] when nothing can be detected.
pub fn detect_cache_line_size() -> usize {
    static LINE_SIZE: OnceLock<usize> = OnceLock::new();

    *LINE_SIZE.get_or_init(|| {
        #[cfg(target_os = "linux")]
        {
            if let Some(line) = read_linux_sysfs_line_size() {
                return line;
            }
        }

        #[cfg(target_arch = "x86_64")]
        {
            if let Some(line) = detect_x86_64_line_size() {
                return line;
            }
        }

        CACHE_LINE_SIZE
    })
}

#[cfg(target_os = "linux")]
fn read_linux_sysfs_line_size() -> Option<usize> {
    let raw = std::fs::read_to_string(
        "/sys/devices/system/cpu/cpu0/cache/index0/coherency_line_size",
    )
    .ok()?;
    parse_line_size(&raw)
}

#[cfg(target_arch = "x86_64")]
#[allow(unused_unsafe)]
fn detect_x86_64_line_size() -> Option<usize> {
    use std::arch::x86_64::__cpuid;

    // CPUID leaf 1, EBX[15:8] = CLFLUSH line size in 8-byte units.
    let cpuid = unsafe { __cpuid(1) };
    let line = (((cpuid.ebx >> 8) & 0xFF) as usize) * 8;
    sane_line_size(line)
}

fn parse_line_size(raw: &str) -> Option<usize> {
    raw.trim().parse::<usize>().ok().and_then(sane_line_size)
}

fn sane_line_size(line: usize) -> Option<usize> {
    if line.is_power_of_two() && (32..=256).contains(&line) {
        Some(line)
    } else {
        None
    }
}

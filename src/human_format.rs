//! Byte-size rendering for progress and log output.

const SUFFIXES: [&str; 4] = ["B", "KiB", "MiB", "GiB"];

/// Render `size` bytes as e.g. `"3 MiB"`, floor-dividing by 1024 per step.
pub fn human_size(size: u64) -> String {
    let mut size = size;
    let mut i = 0;
    while size >= 1024 && i < SUFFIXES.len() - 1 {
        size /= 1024;
        i += 1;
    }
    format!("{size} {}", SUFFIXES[i])
}

/// Render `size` against `total`, scaling both by the same power of 1024 so
/// they share a unit, right-aligning `size` to the width of `total`.
pub fn human_size_pair(size: u64, total: u64) -> String {
    let mut size = size;
    let mut total = total;
    let mut i = 0;
    while total >= 1024 && i < SUFFIXES.len() - 1 {
        total /= 1024;
        size /= 1024;
        i += 1;
    }
    let stotal = total.to_string();
    let ssize = format!("{:>width$}", size, width = stotal.len());
    format!("{ssize} / {stotal} {}", SUFFIXES[i])
}

/// Point-in-time view of the tracker's counters.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressSnapshot {
    pub total: usize,
    pub settled: usize,
    pub percent: f64,
    pub registration_open: bool,
    pub completed: bool,
}

/// Share of settled resources, clamped to `[0, 100]`. An empty population is fully done.
pub fn percent(settled: usize, total: usize) -> f64 {
    if total == 0 {
        return 100.0;
    }
    (settled as f64 / total as f64 * 100.0).min(100.0)
}

/// Human-readable progress line, e.g. `Loading image (3/4) [75%]`.
pub fn label(kind: &str, is_error: bool, settled: usize, total: usize) -> String {
    let prefix = if is_error { "Error loading" } else { "Loading" };
    format!(
        "{} {} ({}/{}) [{}%]",
        prefix,
        kind,
        settled,
        total,
        percent(settled, total).round() as u64
    )
}

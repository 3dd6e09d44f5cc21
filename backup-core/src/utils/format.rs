//! Human-readable rendering of backup metrics.

/// Format a byte count with decimal units and one fractional digit, e.g. `2.1GB`.
pub fn format_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1000.0 && unit_index < UNITS.len() - 1 {
        size /= 1000.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{}B", bytes)
    } else {
        format!("{:.1}{}", size, UNITS[unit_index])
    }
}

/// Format a duration in seconds, e.g. `45s`, `15m`, `1h 5m`.
pub fn format_duration(seconds: u64) -> String {
    if seconds < 60 {
        format!("{}s", seconds)
    } else if seconds < 3600 {
        format!("{}m", seconds / 60)
    } else {
        format!("{}h {}m", seconds / 3600, (seconds % 3600) / 60)
    }
}

/// Format a 0.0-1.0 ratio as a whole percentage, e.g. `60%`.
pub fn format_ratio(ratio: f64) -> String {
    format!("{:.0}%", ratio * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0B");
        assert_eq!(format_size(999), "999B");
        assert_eq!(format_size(800_000_000), "800.0MB");
        assert_eq!(format_size(2_100_000_000), "2.1GB");
        assert_eq!(format_size(1_500_000_000_000), "1.5TB");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(45), "45s");
        assert_eq!(format_duration(900), "15m");
        assert_eq!(format_duration(3900), "1h 5m");
    }

    #[test]
    fn test_format_ratio() {
        assert_eq!(format_ratio(0.6), "60%");
        assert_eq!(format_ratio(0.0), "0%");
    }
}

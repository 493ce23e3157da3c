pub mod download;
pub mod ping;
pub mod upload;

/// Figures gathered over one full test run.
#[derive(Debug, Clone, Default)]
pub struct SpeedTestResult {
    pub download_mbps: f64,
    pub upload_mbps: f64,
    pub ping_ms: Option<f64>,
}

/// Median RTT over the collected samples. Even-length inputs take the
/// lower-middle element, not the average of the two middles.
pub(crate) fn median_ms(samples: &[f64]) -> Option<f64> {
    if samples.is_empty() {
        return None;
    }
    let mut sorted = samples.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    Some(sorted[(sorted.len() - 1) / 2])
}

/// Megabits per second for `bytes` moved in `seconds`; zero when the
/// interval is not positive.
pub(crate) fn throughput_mbps(bytes: u64, seconds: f64) -> f64 {
    if seconds > 0.0 {
        (bytes as f64 * 8.0) / (seconds * 1_000_000.0)
    } else {
        0.0
    }
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn median_of_odd_sample_count() {
        assert_eq!(median_ms(&[30.0, 10.0, 20.0]), Some(20.0));
    }

    #[test]
    fn median_of_even_sample_count_takes_lower_middle() {
        assert_eq!(median_ms(&[10.0, 20.0, 30.0, 40.0]), Some(20.0));
    }

    #[test]
    fn median_of_no_samples() {
        assert_eq!(median_ms(&[]), None);
    }

    #[test]
    fn throughput_of_one_mebibyte_per_second() {
        let mbps = throughput_mbps(1_048_576, 1.0);
        assert!((mbps - 8.388608).abs() < 1e-9);
        assert_eq!(round2(mbps), 8.39);
    }

    #[test]
    fn throughput_guards_non_positive_duration() {
        assert_eq!(throughput_mbps(1000, 0.0), 0.0);
        assert_eq!(throughput_mbps(1000, -1.0), 0.0);
    }
}

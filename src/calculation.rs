/// Formats seconds as `m:ss`. Anything that isn't a finite, non-negative
/// number renders as `0:00`.
pub fn format_time(secs: f64) -> String {
    if !secs.is_finite() || secs < 0.0 {
        return "0:00".to_string();
    }
    let minutes = (secs / 60.0).floor() as u64;
    let seconds = (secs % 60.0).floor() as u64;
    format!("{}:{:02}", minutes, seconds)
}

/// Fraction of the track already played, in `[0, 1]`.
pub fn progress_ratio(current: f64, duration: f64) -> f64 {
    if !is_known_duration(duration) || !current.is_finite() {
        return 0.0;
    }
    (current / duration).clamp(0.0, 1.0)
}

/// Position of a click inside a bar of the given pixel width, in `[0, 1]`.
pub fn ratio_from_offset(offset: f32, width: f32) -> f32 {
    if !(width > 0.0) || !offset.is_finite() {
        return 0.0;
    }
    (offset / width).clamp(0.0, 1.0)
}

/// Maps a click on the seek bar to a time in `[0, duration]`.
pub fn time_from_offset(offset: f32, width: f32, duration: f64) -> f64 {
    if !is_known_duration(duration) {
        return 0.0;
    }
    ratio_from_offset(offset, width) as f64 * duration
}

pub fn volume_percent(volume: f32) -> u32 {
    (volume.clamp(0.0, 1.0) * 100.0).round() as u32
}

/// Durations of zero, NaN or infinity all mean "not known yet".
pub fn is_known_duration(duration: f64) -> bool {
    duration.is_finite() && duration > 0.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn formats_times() {
        assert_eq!(format_time(0.0), "0:00");
        assert_eq!(format_time(f64::NAN), "0:00");
        assert_eq!(format_time(65.0), "1:05");
        assert_eq!(format_time(59.99), "0:59");
        assert_eq!(format_time(3600.0), "60:00");
        assert_eq!(format_time(-3.0), "0:00");
        assert_eq!(format_time(f64::INFINITY), "0:00");
    }

    #[test]
    fn progress_guards_zero_duration() {
        assert_eq!(progress_ratio(10.0, 0.0), 0.0);
        assert_eq!(progress_ratio(10.0, f64::NAN), 0.0);
        assert_eq!(progress_ratio(30.0, 120.0), 0.25);
        assert_eq!(progress_ratio(500.0, 120.0), 1.0);
    }

    #[test]
    fn zero_width_bar_maps_to_zero() {
        assert_eq!(ratio_from_offset(12.0, 0.0), 0.0);
        assert_eq!(ratio_from_offset(f32::NAN, 100.0), 0.0);
        assert_eq!(time_from_offset(50.0, 100.0, 0.0), 0.0);
    }

    #[test]
    fn volume_percent_rounds() {
        assert_eq!(volume_percent(0.0), 0);
        assert_eq!(volume_percent(0.505), 51);
        assert_eq!(volume_percent(1.0), 100);
        assert_eq!(volume_percent(3.0), 100);
    }

    proptest! {
        #[test]
        fn volume_stays_in_range_and_is_monotonic(
            width in 1.0f32..2000.0,
            a in 0.0f32..1.0,
            b in 0.0f32..1.0,
        ) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            let v_lo = ratio_from_offset(lo * width, width);
            let v_hi = ratio_from_offset(hi * width, width);
            prop_assert!((0.0..=1.0).contains(&v_lo));
            prop_assert!((0.0..=1.0).contains(&v_hi));
            prop_assert!(v_lo <= v_hi);
        }

        #[test]
        fn seek_stays_in_range_and_is_monotonic(
            width in 1.0f32..2000.0,
            duration in 0.0f64..7200.0,
            a in 0.0f32..1.0,
            b in 0.0f32..1.0,
        ) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            let t_lo = time_from_offset(lo * width, width, duration);
            let t_hi = time_from_offset(hi * width, width, duration);
            prop_assert!(!t_lo.is_nan() && !t_hi.is_nan());
            prop_assert!(t_lo >= 0.0 && t_hi <= duration);
            prop_assert!(t_lo <= t_hi);
        }

        #[test]
        fn formatted_seconds_are_two_digits(secs in 0.0f64..100_000.0) {
            let text = format_time(secs);
            let (_, seconds) = text.split_once(':').unwrap();
            prop_assert_eq!(seconds.len(), 2);
        }
    }
}

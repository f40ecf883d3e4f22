//! Frequency plan

/// Inclusive, evenly spaced points from `start` to `stop`
///
/// The count is `floor((stop - start) / step) + 1`, and the points are spread
/// evenly over `[start, stop]`, so the last point is always `stop`. When the
/// step does not divide the range the actual spacing is slightly wider than
/// `step`. Callers validate `step > 0` and `stop >= start` first.
pub fn frequency_points(start: f64, stop: f64, step: f64) -> Vec<f64> {
    let count = ((stop - start) / step).floor() as usize + 1;
    if count == 1 {
        return vec![start];
    }

    let spacing = (stop - start) / (count - 1) as f64;
    let mut points: Vec<f64> = (0..count).map(|i| start + spacing * i as f64).collect();
    if let Some(last) = points.last_mut() {
        *last = stop;
    }
    points
}

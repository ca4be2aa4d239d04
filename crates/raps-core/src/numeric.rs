//! Unit conversions and small ordering helpers.

/// Convert a power level in dBm to Watts.
#[inline]
pub fn dbm_to_watts(dbm: f64) -> f64 {
    10f64.powf((dbm - 30.0) / 10.0)
}

/// Convert a value in dB to linear scale.
#[inline]
pub fn db_to_linear(db: f64) -> f64 {
    10f64.powf(db / 10.0)
}

/// Convert a linear power ratio (or Watts) to dB (or dBW).
#[inline]
pub fn linear_to_db(linear: f64) -> f64 {
    10.0 * linear.log10()
}

/// `count` evenly spaced samples from `start` to `stop` inclusive.
pub fn linspace(start: f64, stop: f64, count: usize) -> Vec<f64> {
    match count {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (stop - start) / (count - 1) as f64;
            (0..count).map(|i| start + step * i as f64).collect()
        }
    }
}

/// Index of the largest value. Ties resolve to the lowest index; NaN never wins.
pub fn argmax(values: &[f64]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (i, &v) in values.iter().enumerate() {
        match best {
            None if !v.is_nan() => best = Some(i),
            Some(b) if v > values[b] => best = Some(i),
            _ => {}
        }
    }
    best
}

/// Indices that sort `values` in descending order.
///
/// Computed as a stable ascending sort reversed, so equal values appear with
/// the higher index first.
pub fn argsort_descending(values: &[f64]) -> Vec<usize> {
    let mut idx: Vec<usize> = (0..values.len()).collect();
    idx.sort_by(|&a, &b| values[a].total_cmp(&values[b]));
    idx.reverse();
    idx
}

/// `0..len` rotated right by `shift` positions.
pub fn rolled_range(len: usize, shift: usize) -> Vec<usize> {
    if len == 0 {
        return Vec::new();
    }
    let mut order: Vec<usize> = (0..len).collect();
    order.rotate_right(shift % len);
    order
}

/// True if `order` is `0..n` or its reverse.
pub fn is_trivial_order(order: &[usize]) -> bool {
    let n = order.len();
    order.iter().enumerate().all(|(i, &v)| v == i)
        || order.iter().enumerate().all(|(i, &v)| v == n - 1 - i)
}

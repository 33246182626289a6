use itertools::Itertools;

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }

    Some(values.iter().sum::<f64>() / values.len() as f64)
}

pub fn median(values: &[f64]) -> Option<f64> {
    let sorted = values
        .iter()
        .copied()
        .sorted_by(|l, r| l.total_cmp(r))
        .collect_vec();
    let mid = sorted.len() / 2;

    match sorted.len() {
        0 => None,
        len if len % 2 == 0 => Some((sorted[mid - 1] + sorted[mid]) / 2.0),
        _ => Some(sorted[mid]),
    }
}

/// Sample standard deviation (divisor `n - 1`). Undefined below two values.
pub fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }

    let mean = mean(values)?;
    let squares = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>();

    Some((squares / (values.len() - 1) as f64).sqrt())
}

/// Cluster tolerance for treating two x positions as the same column.
pub(crate) const COLUMN_CLUSTER_TOLERANCE: f64 = 25.0;

/// Cluster sorted-or-unsorted positions into `(min, max)` bands, left to
/// right. A position joins a band when it lies within `tolerance` of the
/// band's start.
pub(crate) fn cluster_positions(positions: &[f64], tolerance: f64) -> Vec<(f64, f64)> {
    let mut sorted = positions.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let mut bands: Vec<(f64, f64)> = Vec::new();
    for position in sorted {
        match bands.last_mut() {
            Some((start, end)) if position - *start <= tolerance => {
                if position > *end {
                    *end = position;
                }
            }
            _ => bands.push((position, position)),
        }
    }
    bands
}

/// Index of the element whose center is closest to `target`, if it lies
/// within `tolerance`.
pub(crate) fn nearest_within(centers: &[f64], target: f64, tolerance: f64) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (index, center) in centers.iter().enumerate() {
        let delta = (center - target).abs();
        match best {
            Some((_, best_delta)) if delta >= best_delta => {}
            _ => best = Some((index, delta)),
        }
    }
    best.filter(|(_, delta)| *delta <= tolerance).map(|(index, _)| index)
}

/// Indices of the `k` elements closest to `target`, nearest first.
/// Ties break on index so repeated runs are stable.
pub(crate) fn k_nearest(centers: &[f64], target: f64, k: usize) -> Vec<usize> {
    let mut ranked = centers
        .iter()
        .enumerate()
        .map(|(index, center)| (index, (center - target).abs()))
        .collect::<Vec<(usize, f64)>>();
    ranked.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
    ranked.into_iter().take(k).map(|(index, _)| index).collect()
}

pub(crate) fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 1 {
        Some(values[mid])
    } else {
        Some((values[mid - 1] + values[mid]) / 2.0)
    }
}

use std::error::Error;

pub type DynError = Box<dyn Error + Send + Sync>;

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Index of the smallest value; the first one wins on ties (numpy `argmin`).
pub fn argmin(values: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (idx, &value) in values.iter().enumerate() {
        match best {
            Some((_, current)) if value >= current => {}
            _ => best = Some((idx, value)),
        }
    }
    best.map(|(idx, _)| idx)
}

/// Circular shift: the element at index `i` moves to `(i + shift) mod N`.
pub fn roll(values: &[f64], shift: isize) -> Vec<f64> {
    let len = values.len();
    if len == 0 {
        return Vec::new();
    }
    let offset = shift.rem_euclid(len as isize) as usize;
    let mut rolled = vec![0.0; len];
    for (idx, &value) in values.iter().enumerate() {
        rolled[(idx + offset) % len] = value;
    }
    rolled
}

/// Concatenate `values` with itself `reps` times.
pub fn tile(values: &[f64], reps: usize) -> Vec<f64> {
    let mut tiled = Vec::with_capacity(values.len() * reps);
    for _ in 0..reps {
        tiled.extend_from_slice(values);
    }
    tiled
}

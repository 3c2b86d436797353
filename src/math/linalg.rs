/// Small dense helpers for age-by-age mixing matrices given as `Vec<Vec<f64>>`.

/// `out = A x` for a square matrix `A`.
pub fn mat_vec(a: &[Vec<f64>], x: &[f64]) -> Vec<f64> {
    a.iter()
        .map(|row| row.iter().zip(x).map(|(m, v)| m * v).sum())
        .collect()
}

/// `(A + Aᵀ) / 2`, the symmetric part of a square matrix.
pub fn symmetrize(a: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let n = a.len();
    let mut out = vec![vec![0.0; n]; n];
    for i in 0..n {
        for j in 0..n {
            out[i][j] = 0.5 * (a[i][j] + a[j][i]);
        }
    }
    out
}

/// Element-wise `A - B`.
pub fn mat_sub(a: &[Vec<f64>], b: &[Vec<f64>]) -> Vec<Vec<f64>> {
    a.iter()
        .zip(b)
        .map(|(ra, rb)| ra.iter().zip(rb).map(|(x, y)| x - y).collect())
        .collect()
}

/// `Σ_j (wᵀ A)_j`: total contacts per person for a population with age weights `w`.
pub fn weighted_contact_total(w: &[f64], a: &[Vec<f64>]) -> f64 {
    w.iter()
        .zip(a)
        .map(|(wi, row)| wi * row.iter().sum::<f64>())
        .sum()
}

pub fn is_square(a: &[Vec<f64>], n: usize) -> bool {
    a.len() == n && a.iter().all(|row| row.len() == n)
}

use std::path::Path;

use anyhow::Context;

use crate::math::linalg::symmetrize;

/// Load a square age-mixing matrix from CSV. Non-numeric cells (a leading age
/// label column, say) are skipped; every row must have the same number of
/// numeric cells. The result is symmetrised, `(M + Mᵀ) / 2`.
pub fn load_mixing_matrix_csv(path: impl AsRef<Path>) -> anyhow::Result<Vec<Vec<f64>>> {
    let path = path.as_ref();
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .with_context(|| format!("failed to open mixing matrix CSV: {}", path.display()))?;

    let mut matrix: Vec<Vec<f64>> = Vec::new();
    for (line, result) in rdr.records().enumerate() {
        let record = result.with_context(|| format!("{}: bad record {}", path.display(), line + 2))?;
        let row: Vec<f64> = record
            .iter()
            .filter_map(|field| field.trim().parse::<f64>().ok())
            .collect();
        if !row.is_empty() {
            matrix.push(row);
        }
    }

    let n = matrix.len();
    anyhow::ensure!(n > 0, "{}: mixing matrix empty or unparsable", path.display());
    anyhow::ensure!(
        matrix.iter().all(|r| r.len() == n),
        "{}: mixing matrix must be square (n x n)",
        path.display()
    );
    anyhow::ensure!(
        matrix.iter().flatten().all(|v| v.is_finite() && *v >= 0.0),
        "{}: mixing rates must be finite and >= 0",
        path.display()
    );
    Ok(symmetrize(&matrix))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_column_is_skipped_and_matrix_symmetrised() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mixing.csv");
        std::fs::write(&path, "age,0-9,10+\n0-9,2.0,1.0\n10+,3.0,4.0\n").unwrap();
        let m = load_mixing_matrix_csv(&path).unwrap();
        assert_eq!(m, vec![vec![2.0, 2.0], vec![2.0, 4.0]]);
    }

    #[test]
    fn ragged_matrix_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mixing.csv");
        std::fs::write(&path, "a,b\n1.0,2.0\n3.0,x\n").unwrap();
        let err = load_mixing_matrix_csv(&path).unwrap_err().to_string();
        assert!(err.contains("square"), "{}", err);
    }
}

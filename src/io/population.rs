use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct PopRow {
    age_group: String,
    pop: f64,
}

/// Load population by age from a CSV file with columns `age_group,pop`.
/// Returns the labels and the populations in file order.
pub fn load_population_csv(path: impl AsRef<Path>) -> anyhow::Result<(Vec<String>, Vec<f64>)> {
    let path = path.as_ref();
    let mut rdr = csv::Reader::from_path(path)
        .with_context(|| format!("failed to open population CSV: {}", path.display()))?;
    let mut labels = Vec::new();
    let mut pops = Vec::new();
    for (line, result) in rdr.deserialize::<PopRow>().enumerate() {
        let row = result.with_context(|| format!("{}: bad row {}", path.display(), line + 2))?;
        anyhow::ensure!(
            row.pop.is_finite() && row.pop > 0.0,
            "{}: population of {} must be > 0",
            path.display(),
            row.age_group
        );
        labels.push(row.age_group);
        pops.push(row.pop);
    }
    anyhow::ensure!(!pops.is_empty(), "{}: no age groups", path.display());
    Ok((labels, pops))
}

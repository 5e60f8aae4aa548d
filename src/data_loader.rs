use ndarray::{Array1, Array2, Axis};
use polars::prelude::*;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rusqlite::types::Value;
use rusqlite::{Connection, OpenFlags};
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

use crate::config::DataConfig;
use crate::error::{PipelineError, Result};

/// Number of predictor columns every source must carry.
pub const FEATURE_COUNT: usize = 9;

/// Predictor order of the water potability table.
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "ph",
    "Hardness",
    "Solids",
    "Chloramines",
    "Sulfate",
    "Conductivity",
    "Organic_carbon",
    "Trihalomethanes",
    "Turbidity",
];

/// Feature matrix plus aligned binary labels.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub features: Array2<f64>,
    pub labels: Array1<u8>,
}

impl Dataset {
    pub fn new(features: Array2<f64>, labels: Array1<u8>) -> Result<Self> {
        if features.nrows() != labels.len() {
            return Err(PipelineError::Validation(format!(
                "{} feature rows but {} labels",
                features.nrows(),
                labels.len()
            )));
        }
        Ok(Self { features, labels })
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Rows per label value, ascending by label.
    pub fn class_counts(&self) -> Vec<(u8, usize)> {
        let mut counts: Vec<(u8, usize)> = Vec::new();
        for &label in self.labels.iter() {
            match counts.iter_mut().find(|(value, _)| *value == label) {
                Some((_, count)) => *count += 1,
                None => counts.push((label, 1)),
            }
        }
        counts.sort_by_key(|(value, _)| *value);
        counts
    }

    pub fn count_of(&self, label: u8) -> usize {
        self.labels.iter().filter(|&&value| value == label).count()
    }

    pub fn select(&self, rows: &[usize]) -> Self {
        Self {
            features: self.features.select(Axis(0), rows),
            labels: self.labels.select(Axis(0), rows),
        }
    }
}

/// Disjoint train/test partition of a [`Dataset`].
#[derive(Debug, Clone)]
pub struct Split {
    pub train: Dataset,
    pub test: Dataset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SourceKind {
    Sqlite,
    Csv,
    Parquet,
}

impl SourceKind {
    fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .as_deref()
        {
            Some("csv") => Self::Csv,
            Some("parquet") => Self::Parquet,
            _ => Self::Sqlite,
        }
    }
}

/// Column-major cells as read from the store, before schema checks.
struct RawTable {
    columns: Vec<(String, Vec<Option<f64>>)>,
}

/// Read-only access to the cleaned potability table.
pub struct DataLoader {
    path: PathBuf,
    kind: SourceKind,
    table: String,
    label_column: String,
}

impl DataLoader {
    pub fn new<P: AsRef<Path>>(path: P, config: &DataConfig) -> Self {
        let path = path.as_ref().to_path_buf();
        let kind = SourceKind::from_path(&path);
        Self {
            path,
            kind,
            table: config.table.clone(),
            label_column: config.label_column.clone(),
        }
    }

    /// Loads the table and splits it into features and labels.
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub fn load(&self) -> Result<Dataset> {
        if !self.path.is_file() {
            return Err(PipelineError::DataAccess(format!(
                "no such file: {}",
                self.path.display()
            )));
        }

        let raw = match self.kind {
            SourceKind::Sqlite => self.read_sqlite()?,
            SourceKind::Csv | SourceKind::Parquet => self.read_frame()?,
        };
        debug!(columns = raw.columns.len(), "Raw table read");

        let dataset = self.build_dataset(raw)?;
        info!(rows = dataset.len(), "Dataset loaded");
        Ok(dataset)
    }

    fn read_sqlite(&self) -> Result<RawTable> {
        let conn = Connection::open_with_flags(&self.path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;

        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1)",
            [self.table.as_str()],
            |row| row.get(0),
        )?;
        if !exists {
            return Err(PipelineError::DataAccess(format!(
                "table {} not found in {}",
                self.table,
                self.path.display()
            )));
        }

        let query = format!("SELECT * FROM \"{}\"", self.table.replace('"', "\"\""));
        let mut stmt = conn.prepare(&query)?;
        let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let mut columns: Vec<(String, Vec<Option<f64>>)> =
            names.into_iter().map(|name| (name, Vec::new())).collect();

        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            for (idx, (_, cells)) in columns.iter_mut().enumerate() {
                let value: Value = row.get(idx)?;
                cells.push(match value {
                    Value::Integer(v) => Some(v as f64),
                    Value::Real(v) => Some(v),
                    Value::Text(text) => text.trim().parse().ok(),
                    Value::Null | Value::Blob(_) => None,
                });
            }
        }

        Ok(RawTable { columns })
    }

    fn read_frame(&self) -> Result<RawTable> {
        let df = match self.kind {
            SourceKind::Csv => CsvReadOptions::default()
                .with_has_header(true)
                .try_into_reader_with_file_path(Some(self.path.clone()))?
                .finish()?,
            _ => LazyFrame::scan_parquet(&self.path, ScanArgsParquet::default())?.collect()?,
        };
        debug!(shape = ?df.shape(), "Frame read");

        let names: Vec<String> = df
            .get_column_names()
            .into_iter()
            .map(|name| name.to_string())
            .collect();

        let mut columns = Vec::with_capacity(names.len());
        for name in names {
            // Non-numeric text becomes null under the non-strict cast.
            let series = df
                .column(&name)?
                .as_materialized_series()
                .cast(&DataType::Float64)?;
            let cells: Vec<Option<f64>> = series.f64()?.into_iter().collect();
            columns.push((name, cells));
        }

        Ok(RawTable { columns })
    }

    fn build_dataset(&self, raw: RawTable) -> Result<Dataset> {
        let label_idx = raw
            .columns
            .iter()
            .position(|(name, _)| *name == self.label_column)
            .ok_or_else(|| {
                PipelineError::DataAccess(format!("label column {} not found", self.label_column))
            })?;

        let mut columns = raw.columns;
        let (_, label_cells) = columns.remove(label_idx);
        if columns.len() != FEATURE_COUNT {
            return Err(PipelineError::Validation(format!(
                "expected {} predictor columns, found {}",
                FEATURE_COUNT,
                columns.len()
            )));
        }

        let n_rows = label_cells.len();
        if n_rows == 0 {
            return Err(PipelineError::Validation("table has no rows".to_string()));
        }

        let labels = label_cells
            .iter()
            .enumerate()
            .map(|(row, cell)| match cell {
                Some(v) if *v == 0.0 => Ok(0u8),
                Some(v) if *v == 1.0 => Ok(1u8),
                Some(v) => Err(PipelineError::Validation(format!(
                    "row {}: label {} is not 0 or 1",
                    row, v
                ))),
                None => Err(PipelineError::Validation(format!("row {}: label is missing", row))),
            })
            .collect::<Result<Vec<u8>>>()?;

        let mut features = Array2::<f64>::zeros((n_rows, FEATURE_COUNT));
        for (col, (name, cells)) in columns.iter().enumerate() {
            for (row, cell) in cells.iter().enumerate() {
                features[[row, col]] = cell.filter(|v| v.is_finite()).ok_or_else(|| {
                    PipelineError::Validation(format!(
                        "row {}: column {} is missing, non-numeric or not finite",
                        row, name
                    ))
                })?;
            }
        }

        Dataset::new(features, Array1::from(labels))
    }
}

/// Stratified, seeded train/test split.
///
/// Each label keeps `round(n * test_fraction)` of its rows for the test side.
#[instrument(skip(dataset), fields(rows = dataset.len()))]
pub fn train_test_split(dataset: &Dataset, test_fraction: f64, seed: u64) -> Result<Split> {
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(PipelineError::Validation(format!(
            "test fraction must lie in (0, 1), got {}",
            test_fraction
        )));
    }

    if dataset.is_empty() {
        return Err(PipelineError::Validation("cannot split an empty dataset".to_string()));
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut train_rows = Vec::new();
    let mut test_rows = Vec::new();

    for (label, _) in dataset.class_counts() {
        let mut rows: Vec<usize> = dataset
            .labels
            .iter()
            .enumerate()
            .filter(|(_, &value)| value == label)
            .map(|(idx, _)| idx)
            .collect();
        rows.shuffle(&mut rng);

        let n_test = (rows.len() as f64 * test_fraction).round() as usize;
        test_rows.extend_from_slice(&rows[..n_test]);
        train_rows.extend_from_slice(&rows[n_test..]);
    }

    if train_rows.is_empty() || test_rows.is_empty() {
        return Err(PipelineError::Validation(format!(
            "split of {} rows leaves an empty side",
            dataset.len()
        )));
    }

    train_rows.shuffle(&mut rng);
    test_rows.shuffle(&mut rng);

    debug!(train = train_rows.len(), test = test_rows.len(), "Split computed");
    Ok(Split {
        train: dataset.select(&train_rows),
        test: dataset.select(&test_rows),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn csv_header() -> String {
        let mut header = FEATURE_NAMES.join(",");
        header.push_str(",Potability");
        header
    }

    fn write_sqlite(path: &Path, rows: &[([f64; FEATURE_COUNT], i64)]) {
        let conn = Connection::open(path).unwrap();
        let columns: Vec<String> = FEATURE_NAMES.iter().map(|n| format!("{} REAL", n)).collect();
        conn.execute(
            &format!(
                "CREATE TABLE water_potability ({}, Potability INTEGER)",
                columns.join(", ")
            ),
            [],
        )
        .unwrap();
        for (features, label) in rows {
            let values: Vec<String> = features.iter().map(|v| v.to_string()).collect();
            conn.execute(
                &format!(
                    "INSERT INTO water_potability VALUES ({}, {})",
                    values.join(", "),
                    label
                ),
                [],
            )
            .unwrap();
        }
    }

    fn labelled(zeros: usize, ones: usize) -> Dataset {
        let n = zeros + ones;
        let features = Array2::from_shape_fn((n, FEATURE_COUNT), |(r, c)| (r * 10 + c) as f64);
        let labels: Vec<u8> = (0..n).map(|i| if i < zeros { 0 } else { 1 }).collect();
        Dataset::new(features, Array1::from(labels)).unwrap()
    }

    #[test]
    fn test_load_sqlite_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("water.db");
        write_sqlite(
            &path,
            &[([7.0, 204.8, 20791.3, 7.3, 368.5, 564.3, 10.3, 86.9, 2.9], 0), ([8.1; 9], 1)],
        );

        let dataset = DataLoader::new(&path, &DataConfig::default()).load().unwrap();
        assert_eq!(dataset.features.dim(), (2, FEATURE_COUNT));
        assert_eq!(dataset.labels.to_vec(), vec![0, 1]);
        assert_eq!(dataset.features[[0, 1]], 204.8);
    }

    #[test]
    fn test_missing_table_is_data_access_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("water.db");
        write_sqlite(&path, &[([1.0; 9], 0)]);

        let config = DataConfig {
            table: "other".to_string(),
            ..DataConfig::default()
        };
        let result = DataLoader::new(&path, &config).load();
        assert!(matches!(result, Err(PipelineError::DataAccess(_))));
    }

    #[test]
    fn test_missing_file_is_data_access_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = DataLoader::new(dir.path().join("absent.db"), &DataConfig::default()).load();
        assert!(matches!(result, Err(PipelineError::DataAccess(_))));
    }

    #[test]
    fn test_loader_does_not_create_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.db");
        let _ = DataLoader::new(&path, &DataConfig::default()).load();
        assert!(!path.exists());
    }

    #[test]
    fn test_load_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("water.csv");
        let body = format!(
            "{}\n1,2,3,4,5,6,7,8,9,1\n9,8,7,6,5,4,3,2,1,0\n",
            csv_header()
        );
        fs::write(&path, body).unwrap();

        let dataset = DataLoader::new(&path, &DataConfig::default()).load().unwrap();
        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.labels.to_vec(), vec![1, 0]);
        assert_eq!(dataset.features[[1, 0]], 9.0);
    }

    #[test]
    fn test_missing_label_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("water.csv");
        fs::write(&path, format!("{},label\n1,2,3,4,5,6,7,8,9,1\n", FEATURE_NAMES.join(","))).unwrap();

        let result = DataLoader::new(&path, &DataConfig::default()).load();
        assert!(matches!(result, Err(PipelineError::DataAccess(_))));
    }

    #[test]
    fn test_wrong_feature_count() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("water.csv");
        fs::write(&path, "a,b,Potability\n1,2,0\n").unwrap();

        let result = DataLoader::new(&path, &DataConfig::default()).load();
        assert!(matches!(result, Err(PipelineError::Validation(_))));
    }

    #[test]
    fn test_non_binary_label_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("water.db");
        write_sqlite(&path, &[([1.0; 9], 0), ([2.0; 9], 2)]);

        let result = DataLoader::new(&path, &DataConfig::default()).load();
        assert!(matches!(result, Err(PipelineError::Validation(_))));
    }

    #[test]
    fn test_missing_value_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("water.csv");
        fs::write(&path, format!("{}\n1,,3,4,5,6,7,8,9,1\n", csv_header())).unwrap();

        let result = DataLoader::new(&path, &DataConfig::default()).load();
        assert!(matches!(result, Err(PipelineError::Validation(_))));
    }

    #[test]
    fn test_non_finite_csv_cells_rejected() {
        let dir = tempfile::tempdir().unwrap();
        for (idx, cell) in ["NaN", "inf", "-inf"].iter().enumerate() {
            let path = dir.path().join(format!("water_{}.csv", idx));
            let body = format!(
                "{}\n{},2,3,4,5,6,7,8,9,1\n1,2,3,4,5,6,7,8,9,0\n",
                csv_header(),
                cell
            );
            fs::write(&path, body).unwrap();

            let result = DataLoader::new(&path, &DataConfig::default()).load();
            assert!(matches!(result, Err(PipelineError::Validation(_))), "{}", cell);
        }
    }

    #[test]
    fn test_non_finite_sqlite_text_cells_rejected() {
        let dir = tempfile::tempdir().unwrap();
        for (idx, cell) in ["NaN", "inf", "-inf"].iter().enumerate() {
            let path = dir.path().join(format!("water_{}.db", idx));
            let conn = Connection::open(&path).unwrap();
            let columns: Vec<String> = FEATURE_NAMES.iter().map(|n| format!("{} TEXT", n)).collect();
            conn.execute(
                &format!(
                    "CREATE TABLE water_potability ({}, Potability INTEGER)",
                    columns.join(", ")
                ),
                [],
            )
            .unwrap();
            conn.execute(
                &format!(
                    "INSERT INTO water_potability VALUES ('{}', '1', '2', '3', '4', '5', '6', '7', '8', 1)",
                    cell
                ),
                [],
            )
            .unwrap();
            drop(conn);

            let result = DataLoader::new(&path, &DataConfig::default()).load();
            assert!(matches!(result, Err(PipelineError::Validation(_))), "{}", cell);
        }
    }

    #[test]
    fn test_stratified_split_scenario() {
        let dataset = labelled(80, 20);
        let split = train_test_split(&dataset, 0.2, 7).unwrap();

        assert_eq!(split.train.count_of(0), 64);
        assert_eq!(split.train.count_of(1), 16);
        assert_eq!(split.test.count_of(0), 16);
        assert_eq!(split.test.count_of(1), 4);
    }

    #[test]
    fn test_split_is_disjoint_and_complete() {
        let dataset = labelled(30, 12);
        let split = train_test_split(&dataset, 0.25, 3).unwrap();

        // Column 0 encodes the original row index.
        let mut seen: Vec<usize> = split
            .train
            .features
            .column(0)
            .iter()
            .chain(split.test.features.column(0).iter())
            .map(|v| (*v / 10.0) as usize)
            .collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..42).collect::<Vec<_>>());
    }

    #[test]
    fn test_split_is_reproducible() {
        let dataset = labelled(40, 10);
        let a = train_test_split(&dataset, 0.2, 11).unwrap();
        let b = train_test_split(&dataset, 0.2, 11).unwrap();
        assert_eq!(a.train, b.train);
        assert_eq!(a.test, b.test);
    }

    #[test]
    fn test_split_rejects_empty_dataset() {
        let empty = labelled(0, 0);
        assert!(empty.is_empty());
        assert!(matches!(
            train_test_split(&empty, 0.2, 7),
            Err(PipelineError::Validation(_))
        ));
    }

    #[test]
    fn test_split_rejects_bad_fraction() {
        let dataset = labelled(10, 10);
        assert!(matches!(
            train_test_split(&dataset, 1.0, 7),
            Err(PipelineError::Validation(_))
        ));
    }
}

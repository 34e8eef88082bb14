use polars::prelude::*;
use rayon::prelude::*;
use std::collections::HashSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, trace};

use crate::domain::SRError;

#[derive(Debug)]
pub struct FileInfo {
    pub path: PathBuf,
    pub file_size: u64,
}

#[derive(Debug, Clone)]
pub struct Column {
    pub idx: usize,
    pub name: String,
    pub dtype: DataType,
    /// Textual value of every row, `None` for a missing cell.
    pub data: Vec<Option<String>>,
    /// Numeric value of every row, only present for numeric dtypes.
    pub numbers: Option<Vec<Option<f64>>>,
}

impl Column {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_numeric(&self) -> bool {
        self.numbers.is_some()
    }

    pub fn as_string(&self) -> String {
        format!(
            "{} \"{}\", {:?}, numeric: {}, # rows {}",
            self.idx,
            self.name,
            self.dtype,
            self.is_numeric(),
            self.data.len(),
        )
    }
}

#[derive(Debug, Clone)]
pub struct Table {
    name: String,
    path: Option<PathBuf>,
    columns: Vec<Column>,
    nrows: usize,
}

impl Table {
    /// Parses a CSV file with a header row into a table of typed columns.
    pub fn load(path: PathBuf) -> Result<Self, SRError> {
        let file_info = Table::get_file_info(path)?;
        trace!("Loading {:?} ({} bytes)", file_info.path, file_info.file_size);

        let start_time = Instant::now();
        Table::check_header(&file_info.path)?;
        let df = Arc::new(Table::load_csv(&file_info.path)?.collect()?);

        // Every column is converted in its own rayon task.
        let c_: Result<Vec<Column>, _> = df
            .get_column_names()
            .par_iter()
            .enumerate()
            .map(|(idx, name)| Self::load_column(&df, idx, name))
            .collect();
        let columns = c_?;

        let loading_duration = start_time.elapsed().as_millis();
        info!(
            "Loaded {} columns from {:?} in {loading_duration}ms",
            columns.len(),
            file_info.path
        );
        for c in columns.iter() {
            debug!("Column: {}", c.as_string());
        }

        let name = file_info
            .path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("???")
            .to_string();
        let mut table = Table::from_columns(name, columns)?;
        table.path = Some(file_info.path);
        Ok(table)
    }

    pub fn from_columns(name: impl Into<String>, columns: Vec<Column>) -> Result<Self, SRError> {
        let nrows = columns.first().map(|c| c.len()).unwrap_or(0);
        if let Some(c) = columns.iter().find(|c| c.len() != nrows) {
            return Err(SRError::LoadingFailed(format!(
                "column '{}' has {} rows, expected {}",
                c.name,
                c.len(),
                nrows
            )));
        }

        let mut seen = HashSet::new();
        for c in columns.iter() {
            if !seen.insert(c.name.as_str()) {
                return Err(SRError::LoadingFailed(format!(
                    "duplicate column name '{}'",
                    c.name
                )));
            }
        }

        Ok(Self {
            name: name.into(),
            path: None,
            columns,
            nrows,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn nrows(&self) -> usize {
        self.nrows
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Column names in header order.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    fn is_numeric_type(dtype: &DataType) -> bool {
        matches!(
            dtype,
            DataType::Int8
                | DataType::Int16
                | DataType::Int32
                | DataType::Int64
                | DataType::UInt8
                | DataType::UInt16
                | DataType::UInt32
                | DataType::UInt64
                | DataType::Float32
                | DataType::Float64
        )
    }

    fn load_column(df: &DataFrame, idx: usize, col_name: &str) -> Result<Column, PolarsError> {
        let column = df.column(col_name)?;
        let dtype = column.dtype().clone();

        let text = column.cast(&DataType::String)?;
        let data = text
            .str()?
            .into_iter()
            .map(|value| value.map(|s| s.to_string()))
            .collect();

        let numbers = if Table::is_numeric_type(&dtype) {
            let floats = column.cast(&DataType::Float64)?;
            Some(floats.f64()?.into_iter().collect())
        } else {
            None
        };

        Ok(Column {
            idx,
            name: col_name.to_string(),
            dtype,
            data,
            numbers,
        })
    }

    fn get_file_info(path: PathBuf) -> Result<FileInfo, SRError> {
        let metadata = fs::metadata(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => SRError::FileNotFound,
            ErrorKind::PermissionDenied => SRError::PermissionDenied,
            _ => SRError::IoError(e),
        })?;
        if !metadata.is_file() {
            return Err(SRError::LoadingFailed("Not a file!".into()));
        }

        let is_csv = path
            .extension()
            .and_then(|s| s.to_str())
            .is_some_and(|s| s.eq_ignore_ascii_case("csv"));
        if !is_csv {
            return Err(SRError::UnknownFileType);
        }

        Ok(FileInfo {
            path,
            file_size: metadata.len(),
        })
    }

    /// Types are inferred over the whole file, a late `3.5` or `n/a` must not fail the load.
    fn load_csv(path: &Path) -> Result<LazyFrame, PolarsError> {
        LazyCsvReader::new(PlPath::Local(path.into()))
            .with_has_header(true)
            .with_infer_schema_length(None)
            .finish()
    }

    /// The header row exactly as written in the file.
    fn read_header(path: &Path) -> Result<Vec<String>, PolarsError> {
        let df = LazyCsvReader::new(PlPath::Local(path.into()))
            .with_has_header(false)
            .with_n_rows(Some(1))
            .with_infer_schema_length(Some(0))
            .finish()?
            .collect()?;
        df.get_columns()
            .iter()
            .map(|c| Ok(c.str()?.get(0).unwrap_or_default().to_string()))
            .collect()
    }

    /// Polars renames repeated header fields (`a`, `a_duplicated_0`), so
    /// duplicates are looked for in the raw header row.
    fn check_header(path: &Path) -> Result<(), SRError> {
        let header = Table::read_header(path)?;
        let mut seen = HashSet::new();
        if let Some(name) = header.iter().find(|name| !seen.insert(name.as_str())) {
            trace!("Header row {:?}", header);
            return Err(SRError::LoadingFailed(format!(
                "duplicate column name '{name}'"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
impl Column {
    pub(crate) fn text(idx: usize, name: &str, values: &[&str]) -> Self {
        Column {
            idx,
            name: name.to_string(),
            dtype: DataType::String,
            data: values.iter().map(|v| Some(v.to_string())).collect(),
            numbers: None,
        }
    }

    pub(crate) fn numeric(idx: usize, name: &str, values: &[f64]) -> Self {
        Column {
            idx,
            name: name.to_string(),
            dtype: DataType::Float64,
            data: values.iter().map(|v| Some(v.to_string())).collect(),
            numbers: Some(values.iter().copied().map(Some).collect()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(dir: &tempfile::TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn column_names_match_header_row() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(
            &dir,
            "survey.csv",
            "zeta,age,city,alpha\n1,30,Medellin,x\n2,41,La Ceja,y\n",
        );

        let table = Table::load(path).unwrap();
        assert_eq!(table.column_names(), vec!["zeta", "age", "city", "alpha"]);
        assert_eq!(table.nrows(), 2);
        assert_eq!(table.name(), "survey.csv");
    }

    #[test]
    fn numeric_columns_keep_numbers() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(&dir, "s.csv", "score,comment\n1,good\n,bad\n3.5,ok\n");

        let table = Table::load(path).unwrap();
        let score = table.column("score").unwrap();
        assert!(score.is_numeric());
        assert_eq!(
            score.numbers.as_ref().unwrap(),
            &vec![Some(1.0), None, Some(3.5)]
        );
        assert_eq!(score.data[1], None);

        let comment = table.column("comment").unwrap();
        assert!(!comment.is_numeric());
        assert_eq!(
            comment.data,
            vec![Some("good".to_string()), Some("bad".to_string()), Some("ok".to_string())]
        );
    }

    #[test]
    fn late_type_change_still_loads() {
        let dir = tempfile::tempdir().unwrap();
        let mut content = String::from("score,answer\n");
        for i in 0..150 {
            content.push_str(&format!("{},{}\n", i % 5, i % 3));
        }
        content.push_str("3.5,n/a\n");
        let path = write_csv(&dir, "late.csv", &content);

        let table = Table::load(path).unwrap();
        assert_eq!(table.nrows(), 151);

        let score = table.column("score").unwrap();
        assert!(score.is_numeric());
        assert_eq!(score.numbers.as_ref().unwrap()[150], Some(3.5));

        let answer = table.column("answer").unwrap();
        assert!(!answer.is_numeric());
        assert_eq!(answer.data[150].as_deref(), Some("n/a"));
        assert_eq!(answer.data[4].as_deref(), Some("1"));
    }

    #[test]
    fn repeated_header_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(&dir, "dup.csv", "a,a\n1,2\n");
        match Table::load(path) {
            Err(SRError::LoadingFailed(reason)) => assert!(reason.contains("duplicate column name 'a'")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn quoted_header_names_are_kept() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(&dir, "q.csv", "\"edad, años\",ciudad\n30,Rionegro\n");
        let table = Table::load(path).unwrap();
        assert_eq!(table.column_names(), vec!["edad, años", "ciudad"]);
    }

    #[test]
    fn missing_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let result = Table::load(dir.path().join("nope.csv"));
        assert!(matches!(result, Err(SRError::FileNotFound)));
    }

    #[test]
    fn non_csv_extension_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(&dir, "data.txt", "a,b\n1,2\n");
        assert!(matches!(Table::load(path), Err(SRError::UnknownFileType)));
    }

    #[test]
    fn from_columns_rejects_duplicates() {
        let columns = vec![
            Column::text(0, "a", &["x"]),
            Column::text(1, "a", &["y"]),
        ];
        assert!(matches!(
            Table::from_columns("t", columns),
            Err(SRError::LoadingFailed(_))
        ));
    }

    #[test]
    fn from_columns_rejects_ragged_columns() {
        let columns = vec![
            Column::text(0, "a", &["x", "y"]),
            Column::text(1, "b", &["y"]),
        ];
        assert!(Table::from_columns("t", columns).is_err());
    }
}

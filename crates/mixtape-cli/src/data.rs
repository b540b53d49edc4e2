use crate::error::{CliError, Result};
use nalgebra::DMatrix;
use std::path::Path;
use tracing::debug;

fn parse_error(path: &Path, message: String) -> CliError {
    CliError::FileParsing {
        path: path.to_path_buf(),
        source: anyhow::anyhow!(message),
    }
}

/// Reads a headerless numeric CSV file into a matrix, one CSV record per row.
///
/// Blank lines and lines starting with `#` are skipped. Every record must have
/// the same number of fields.
pub fn read_matrix(path: &Path) -> Result<DMatrix<f64>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .comment(Some(b'#'))
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| parse_error(path, e.to_string()))?;

    let mut values = Vec::new();
    let mut n_cols = None;
    let mut n_rows = 0;
    for (row, record) in reader.records().enumerate() {
        let record = record.map_err(|e| parse_error(path, e.to_string()))?;
        for (col, field) in record.iter().enumerate() {
            let value: f64 = field.parse().map_err(|_| {
                parse_error(
                    path,
                    format!("row {}, column {}: '{}' is not a number", row + 1, col + 1, field),
                )
            })?;
            values.push(value);
        }
        match n_cols {
            None => n_cols = Some(record.len()),
            Some(expected) if expected != record.len() => {
                return Err(parse_error(
                    path,
                    format!(
                        "row {} has {} fields, expected {}",
                        row + 1,
                        record.len(),
                        expected
                    ),
                ));
            }
            Some(_) => {}
        }
        n_rows += 1;
    }

    let n_cols = n_cols.ok_or_else(|| parse_error(path, "file contains no data".to_string()))?;
    debug!("Read {}x{} matrix from {:?}", n_rows, n_cols, path);
    Ok(DMatrix::from_row_slice(n_rows, n_cols, &values))
}

/// Writes `matrix` as a headerless CSV file, one matrix row per record.
pub fn write_matrix(path: &Path, matrix: &DMatrix<f64>) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .map_err(|e| CliError::Other(e.into()))?;
    for row in matrix.row_iter() {
        writer
            .write_record(row.iter().map(|v| v.to_string()))
            .map_err(|e| CliError::Other(e.into()))?;
    }
    writer.flush()?;
    debug!(
        "Wrote {}x{} matrix to {:?}",
        matrix.nrows(),
        matrix.ncols(),
        path
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn reads_rows_and_columns_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("m.csv");
        fs::write(&path, "# comment\n1.0, 2.5,-3\n4,5e-1,6\n").unwrap();

        let m = read_matrix(&path).unwrap();
        assert_eq!(m.shape(), (2, 3));
        assert_eq!(m[(0, 1)], 2.5);
        assert_eq!(m[(0, 2)], -3.0);
        assert_eq!(m[(1, 1)], 0.5);
    }

    #[test]
    fn written_matrix_reads_back_identically() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let m = DMatrix::from_row_slice(2, 2, &[0.1, -2.0, 1e-12, 3.75]);

        write_matrix(&path, &m).unwrap();
        assert_eq!(read_matrix(&path).unwrap(), m);
    }

    #[test]
    fn non_numeric_field_names_its_position() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.csv");
        fs::write(&path, "1,2\n3,x\n").unwrap();

        let err = read_matrix(&path).unwrap_err();
        assert!(matches!(err, CliError::FileParsing { .. }));
        assert!(err.to_string().contains("row 2, column 2"));
    }

    #[test]
    fn ragged_rows_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ragged.csv");
        fs::write(&path, "1,2,3\n4,5\n").unwrap();
        assert!(matches!(
            read_matrix(&path),
            Err(CliError::FileParsing { .. })
        ));
    }

    #[test]
    fn empty_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.csv");
        fs::write(&path, "").unwrap();
        assert!(read_matrix(&path).is_err());
    }
}

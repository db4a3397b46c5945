//! Result artifact produced by the external sampler.
//!
//! The tool writes a fixed-name CSV next to its inputs: one record per batch
//! table row, `table,sample_index,v0,...,vN`, where `table` is one of
//! `gen_p`, `load_p`, `load_q` and the values follow the connected-element
//! order of the staged input. A table may be entirely absent. `NaN` cells are
//! the missing-value sentinel.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// Fixed name of the result artifact in the working directory.
pub const OUTPUT_FILE_NAME: &str = "mcsampleroutput.csv";

/// Auxiliary human-readable CSV the tool drops alongside the result. Not
/// consumed here; it stays in the working directory when debug retention is
/// on.
pub const AUX_OUTPUT_FILE_NAME: &str = "printSamples.csv";

/// Result artifact parse failure. Fatal for the sampling round, no retry.
#[derive(Debug, thiserror::Error)]
pub enum OutputParseError {
    #[error("cannot read sampler output \"{path}\": {source}")]
    Read {
        path: std::path::PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("malformed sampler output: {0}")]
    Malformed(String),
    #[error("malformed sampler output: {0}")]
    Csv(#[from] csv::Error),
}

/// Externally produced table of per-element power values, one row per
/// requested sample. Owned by the sampler instance that requested it and
/// consumed row-by-row.
#[derive(Debug, Clone, Default)]
pub struct SampledBatch {
    generators_p: Option<Vec<Vec<f64>>>,
    loads_p: Option<Vec<Vec<f64>>>,
    loads_q: Option<Vec<Vec<f64>>>,
}

/// One row drawn from the batch: per-quantity value vectors in
/// connected-element order. A `None` quantity was absent from the batch.
#[derive(Debug, Clone, Default)]
pub struct SampleRow {
    /// Generator active power values (consumption convention).
    pub generators_p: Option<Vec<f64>>,
    /// Load active power values.
    pub loads_p: Option<Vec<f64>>,
    /// Load reactive power values.
    pub loads_q: Option<Vec<f64>>,
}

impl SampledBatch {
    /// Extracts the row at `index` from each present table. A table shorter
    /// than `index` contributes `None` for its quantity.
    pub fn row(&self, index: usize) -> SampleRow {
        SampleRow {
            generators_p: table_row(&self.generators_p, index),
            loads_p: table_row(&self.loads_p, index),
            loads_q: table_row(&self.loads_q, index),
        }
    }

    /// Number of rows in the largest present table.
    pub fn rows(&self) -> usize {
        [&self.generators_p, &self.loads_p, &self.loads_q]
            .into_iter()
            .flatten()
            .map(Vec::len)
            .max()
            .unwrap_or(0)
    }
}

fn table_row(table: &Option<Vec<Vec<f64>>>, index: usize) -> Option<Vec<f64>> {
    table.as_ref().and_then(|rows| rows.get(index).cloned())
}

/// Parses the result artifact from any reader.
///
/// Rows of each table must appear in sample-index order starting at zero.
///
/// # Errors
///
/// Returns an [`OutputParseError`] on malformed CSV, unknown table names,
/// unparseable values or out-of-order indices.
pub fn read_batch(reader: impl Read) -> Result<SampledBatch, OutputParseError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);

    let mut batch = SampledBatch::default();
    for record in rdr.records() {
        let rec = record?;
        if rec.len() < 2 {
            return Err(OutputParseError::Malformed(format!(
                "record with {} fields, expected at least table and sample index",
                rec.len()
            )));
        }
        let table_name = rec.get(0).unwrap_or("");
        let table = match table_name {
            "gen_p" => batch.generators_p.get_or_insert_with(Vec::new),
            "load_p" => batch.loads_p.get_or_insert_with(Vec::new),
            "load_q" => batch.loads_q.get_or_insert_with(Vec::new),
            other => {
                return Err(OutputParseError::Malformed(format!(
                    "unknown table \"{other}\""
                )));
            }
        };
        let index: usize = rec
            .get(1)
            .unwrap_or("")
            .parse()
            .map_err(|_| {
                OutputParseError::Malformed(format!(
                    "invalid sample index \"{}\" in table {table_name}",
                    rec.get(1).unwrap_or("")
                ))
            })?;
        if index != table.len() {
            return Err(OutputParseError::Malformed(format!(
                "table {table_name}: sample index {index} out of order, expected {}",
                table.len()
            )));
        }
        let mut values = Vec::with_capacity(rec.len() - 2);
        for cell in rec.iter().skip(2) {
            let value: f64 = cell.parse().map_err(|_| {
                OutputParseError::Malformed(format!(
                    "invalid value \"{cell}\" in table {table_name}, sample {index}"
                ))
            })?;
            values.push(value);
        }
        table.push(values);
    }
    Ok(batch)
}

/// Parses the result artifact from a file.
///
/// # Errors
///
/// Returns an [`OutputParseError`] if the file cannot be read or its content
/// is malformed.
pub fn read_batch_from_path(path: &Path) -> Result<SampledBatch, OutputParseError> {
    let file = File::open(path).map_err(|source| OutputParseError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    read_batch(io::BufReader::new(file))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_three_tables() {
        let csv = "gen_p,0,10.0,20.0\n\
                   gen_p,1,11.0,21.0\n\
                   load_p,0,5.0\n\
                   load_p,1,6.0\n\
                   load_q,0,1.0\n\
                   load_q,1,2.0\n";
        let batch = read_batch(csv.as_bytes()).expect("batch should parse");
        assert_eq!(batch.rows(), 2);
        let row = batch.row(1);
        assert_eq!(row.generators_p, Some(vec![11.0, 21.0]));
        assert_eq!(row.loads_p, Some(vec![6.0]));
        assert_eq!(row.loads_q, Some(vec![2.0]));
    }

    #[test]
    fn absent_table_yields_none() {
        let csv = "gen_p,0,10.0\n";
        let batch = read_batch(csv.as_bytes()).expect("batch should parse");
        let row = batch.row(0);
        assert!(row.generators_p.is_some());
        assert!(row.loads_p.is_none());
        assert!(row.loads_q.is_none());
    }

    #[test]
    fn nan_cells_parse_to_nan_sentinel() {
        let csv = "gen_p,0,NaN,50.0\n";
        let batch = read_batch(csv.as_bytes()).expect("batch should parse");
        let row = batch.row(0);
        let values = row.generators_p.expect("table should be present");
        assert!(values[0].is_nan());
        assert_eq!(values[1], 50.0);
    }

    #[test]
    fn unknown_table_is_rejected() {
        let csv = "shunt_q,0,1.0\n";
        assert!(read_batch(csv.as_bytes()).is_err());
    }

    #[test]
    fn out_of_order_index_is_rejected() {
        let csv = "gen_p,1,10.0\n";
        assert!(read_batch(csv.as_bytes()).is_err());
    }

    #[test]
    fn non_numeric_value_is_rejected() {
        let csv = "gen_p,0,abc\n";
        assert!(read_batch(csv.as_bytes()).is_err());
    }

    #[test]
    fn row_past_end_yields_none() {
        let csv = "gen_p,0,10.0\n";
        let batch = read_batch(csv.as_bytes()).expect("batch should parse");
        assert!(batch.row(5).generators_p.is_none());
    }
}

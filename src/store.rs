//! Persistence of reference samples
//!
//! The estimator only ever needs a bulk read of the reference table, expressed by
//! [`TableSource`]. [`CsvStore`] is the flat file backend used by the command line tool, and
//! an in-memory [`ReferenceTable`] is itself a source.
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use csv::StringRecord;
use tracing::{debug, info, warn};

use crate::sample::{BodyColor, ReferenceSample};
use crate::table::ReferenceTable;
use crate::{Error, Result};

pub trait TableSource {
    /// Read every reference sample currently stored
    ///
    /// # Errors
    /// [`Error::DataUnavailable`] if the backing store is missing or unreadable.
    fn load(&self) -> Result<ReferenceTable>;
}

impl TableSource for ReferenceTable {
    fn load(&self) -> Result<ReferenceTable> {
        Ok(self.clone())
    }
}

pub const LOT: &str = "LOT_Number";
pub const NATURAL: &str = "Natural_Fiber_%";
pub const BLACK: &str = "Black_Fiber_%";
pub const WHITE: &str = "White_Fiber_%";
pub const DENIM: &str = "Indigo_Fiber_%";
pub const MASTERMIX_DOSAGE: &str = "Mastermix_Dosage_%";
pub const LUMINESCENT_CONTENT: &str = "Luminescent_Content_in_Fiber_%";
pub const MARKED_FIBER_SHARE: &str = "Marked_R_Cotton_in_Sample_%";
pub const MARKER_CONCENTRATION: &str = "Marker_in_Cotton_ppm";
pub const EFFECTIVE_DOSAGE: &str = "Effective_Dosage_ppm";
pub const EMISSION_COUNT: &str = "Emission_Count";
pub const BODY_COLOR: &str = "Ash_Bodycolor_RGB";

/// Column layout of the reference file
pub const HEADER: [&str; 12] = [
    LOT,
    NATURAL,
    BLACK,
    WHITE,
    DENIM,
    MASTERMIX_DOSAGE,
    LUMINESCENT_CONTENT,
    MARKED_FIBER_SHARE,
    MARKER_CONCENTRATION,
    EFFECTIVE_DOSAGE,
    EMISSION_COUNT,
    BODY_COLOR,
];

/// Reference samples kept in a single CSV file
#[derive(Clone, Debug)]
pub struct CsvStore {
    path: PathBuf,
}

impl CsvStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the file with only a header row if it does not exist yet
    ///
    /// # Errors
    /// Returns an error if the file cannot be created.
    pub fn ensure_exists(&self) -> Result<()> {
        if self.path.exists() {
            return Ok(());
        }
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut writer = csv::Writer::from_path(&self.path)?;
        writer.write_record(HEADER)?;
        writer.flush()?;
        info!(path = %self.path.display(), "created reference file");
        Ok(())
    }

    /// Append one sample to the end of the file
    ///
    /// Fields are written under the columns of the file's own header, whatever their order.
    /// Columns the file has but this tool does not know are left empty.
    ///
    /// # Errors
    /// [`Error::DataUnavailable`] if the existing header lacks one of the known columns,
    /// otherwise create/write failures.
    pub fn append(&self, sample: &ReferenceSample) -> Result<()> {
        self.ensure_exists()?;
        let headers = self.read_header()?;
        let columns = ColumnIndex::new(&headers);

        let mut row = vec![String::new(); headers.len()];
        let fields = HEADER.iter().zip(columns.positions).zip(to_record(sample));
        for ((name, position), value) in fields {
            let position = position.ok_or_else(|| Error::DataUnavailable {
                path: self.path.clone(),
                reason: format!("header has no `{name}` column to append to"),
            })?;
            row[position] = value;
        }

        let file = OpenOptions::new().append(true).open(&self.path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        writer.write_record(&row)?;
        writer.flush()?;
        info!(lot = %sample.lot_id, "saved reference sample");
        Ok(())
    }

    /// Remove every row recorded under `lot_id`, returning how many were removed
    ///
    /// Remaining rows are written back exactly as read, including any malformed cells.
    ///
    /// # Errors
    /// [`Error::DataUnavailable`] if the file does not exist, otherwise read/write failures.
    pub fn delete_lot(&self, lot_id: &str) -> Result<usize> {
        let (headers, records) = self.read_records()?;
        let lot_index = headers.iter().position(|h| h == LOT);

        let total = records.len();
        let kept: Vec<StringRecord> = records
            .into_iter()
            .filter(|record| lot_index.and_then(|i| record.get(i)) != Some(lot_id))
            .collect();
        let removed = total - kept.len();

        let mut writer = csv::Writer::from_path(&self.path)?;
        writer.write_record(&headers)?;
        for record in &kept {
            writer.write_record(record)?;
        }
        writer.flush()?;

        info!(lot = lot_id, removed, "deleted reference samples");
        Ok(removed)
    }

    fn reader(&self) -> Result<csv::Reader<fs::File>> {
        if !self.path.exists() {
            return Err(Error::DataUnavailable {
                path: self.path.clone(),
                reason: "file not found".into(),
            });
        }
        csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(&self.path)
            .map_err(|err| Error::DataUnavailable {
                path: self.path.clone(),
                reason: err.to_string(),
            })
    }

    fn read_header(&self) -> Result<StringRecord> {
        Ok(self.reader()?.headers()?.clone())
    }

    fn read_records(&self) -> Result<(StringRecord, Vec<StringRecord>)> {
        let mut reader = self.reader()?;
        let headers = reader.headers()?.clone();
        let records = reader.records().collect::<std::result::Result<Vec<_>, _>>()?;
        Ok((headers, records))
    }
}

impl TableSource for CsvStore {
    fn load(&self) -> Result<ReferenceTable> {
        let (headers, records) = self.read_records()?;
        let columns = ColumnIndex::new(&headers);

        let table: ReferenceTable = records
            .iter()
            .map(|record| columns.sample(record))
            .collect();
        debug!(path = %self.path.display(), rows = table.len(), "loaded reference table");
        Ok(table)
    }
}

/// Position of each known column in a file's header
struct ColumnIndex {
    positions: [Option<usize>; HEADER.len()],
}

impl ColumnIndex {
    fn new(headers: &StringRecord) -> Self {
        let positions = HEADER.map(|name| headers.iter().position(|h| h.trim() == name));
        for (name, position) in HEADER.iter().zip(&positions) {
            if position.is_none() {
                warn!(column = name, "reference file is missing a column");
            }
        }
        Self { positions }
    }

    fn cell<'r>(&self, record: &'r StringRecord, name: &str) -> Option<&'r str> {
        let column = HEADER.iter().position(|h| *h == name)?;
        self.positions[column]
            .and_then(|i| record.get(i))
            .map(str::trim)
            .filter(|cell| !cell.is_empty())
    }

    fn number(&self, record: &StringRecord, name: &str) -> Option<f64> {
        self.cell(record, name)
            .and_then(|cell| cell.parse::<f64>().ok())
            .filter(|value| value.is_finite())
    }

    fn count(&self, record: &StringRecord, name: &str) -> Option<u32> {
        self.number(record, name)
            .filter(|value| *value >= 0.0 && value.fract() == 0.0 && *value <= f64::from(u32::MAX))
            .map(|value| value as u32)
    }

    fn sample(&self, record: &StringRecord) -> ReferenceSample {
        ReferenceSample {
            lot_id: self.cell(record, LOT).unwrap_or_default().to_owned(),
            natural: self.number(record, NATURAL),
            black: self.number(record, BLACK),
            white: self.number(record, WHITE),
            denim: self.number(record, DENIM),
            mastermix_dosage: self.number(record, MASTERMIX_DOSAGE),
            luminescent_content: self.number(record, LUMINESCENT_CONTENT),
            marked_fiber_share: self.number(record, MARKED_FIBER_SHARE),
            marker_concentration_ppm: self.number(record, MARKER_CONCENTRATION),
            effective_dosage_ppm: self.number(record, EFFECTIVE_DOSAGE),
            emission_count: self.count(record, EMISSION_COUNT),
            body_color: self
                .cell(record, BODY_COLOR)
                .and_then(|cell| cell.parse::<BodyColor>().ok()),
        }
    }
}

fn to_record(sample: &ReferenceSample) -> [String; HEADER.len()] {
    let number = |value: Option<f64>| value.map(|v| v.to_string()).unwrap_or_default();
    [
        sample.lot_id.clone(),
        number(sample.natural),
        number(sample.black),
        number(sample.white),
        number(sample.denim),
        number(sample.mastermix_dosage),
        number(sample.luminescent_content),
        number(sample.marked_fiber_share),
        number(sample.marker_concentration_ppm),
        number(sample.effective_dosage_ppm),
        sample
            .emission_count
            .map(|count| count.to_string())
            .unwrap_or_default(),
        sample
            .body_color
            .map(|color| color.to_string())
            .unwrap_or_default(),
    ]
}

#[cfg(test)]
mod tests {
    use tempdir::TempDir;

    use super::{CsvStore, TableSource, HEADER};
    use crate::fiber::Composition;
    use crate::sample::{BodyColor, NewEntry};
    use crate::{Error, Result};

    fn entry(lot: &str, emission_count: u32) -> NewEntry {
        NewEntry {
            lot_id: lot.into(),
            composition: Composition::new(0.0, 0.0, 100.0, 0.0),
            mastermix_dosage: 0.01,
            luminescent_content: 4.0,
            marked_fiber_share: 20.0,
            emission_count,
            body_color: BodyColor::new(200, 190, 180),
        }
    }

    #[test]
    fn missing_file_is_reported_as_unavailable() {
        let tmp_dir = TempDir::new("missing_file_is_reported_as_unavailable").unwrap();
        let store = CsvStore::new(tmp_dir.path().join("absent.csv"));

        assert!(matches!(store.load(), Err(Error::DataUnavailable { .. })));
        assert!(matches!(store.delete_lot("x"), Err(Error::DataUnavailable { .. })));
    }

    #[test]
    fn fresh_file_contains_only_the_header() -> Result<()> {
        let tmp_dir = TempDir::new("fresh_file_contains_only_the_header").unwrap();
        let store = CsvStore::new(tmp_dir.path().join("data").join("reference.csv"));
        store.ensure_exists()?;

        let contents = std::fs::read_to_string(store.path())?;
        assert_eq!(contents.trim_end(), HEADER.join(","));
        assert!(store.load()?.is_empty());
        Ok(())
    }

    #[test]
    fn appended_samples_are_loaded_back() -> Result<()> {
        let tmp_dir = TempDir::new("appended_samples_are_loaded_back").unwrap();
        let store = CsvStore::new(tmp_dir.path().join("reference.csv"));

        let sample = entry("L1", 1500).into_sample()?;
        store.append(&sample)?;
        store.append(&entry("L2", 3000).into_sample()?)?;

        let table = store.load()?;
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows()[0], sample);
        assert_eq!(table.rows()[1].emission_count, Some(3000));
        Ok(())
    }

    #[test]
    fn malformed_cells_load_as_missing() -> Result<()> {
        let tmp_dir = TempDir::new("malformed_cells_load_as_missing").unwrap();
        let path = tmp_dir.path().join("reference.csv");
        let contents = format!(
            "{}\nL1,abc,0,100,0,0.01,4,20,4,0.8,-5,not a color\nL2,,,,,,,,,,12.5,#ffffff\n",
            HEADER.join(",")
        );
        std::fs::write(&path, contents)?;

        let table = CsvStore::new(path).load()?;
        assert_eq!(table.len(), 2);

        let first = &table.rows()[0];
        assert_eq!(first.natural, None);
        assert_eq!(first.white, Some(100.0));
        assert_eq!(first.emission_count, None);
        assert_eq!(first.body_color, None);

        let second = &table.rows()[1];
        assert_eq!(second.white, None);
        assert_eq!(second.emission_count, None);
        assert_eq!(second.body_color, Some(BodyColor::new(255, 255, 255)));
        Ok(())
    }

    #[test]
    fn reordered_columns_are_matched_by_name() -> Result<()> {
        let tmp_dir = TempDir::new("reordered_columns_are_matched_by_name").unwrap();
        let path = tmp_dir.path().join("reference.csv");
        std::fs::write(
            &path,
            "Emission_Count,LOT_Number,White_Fiber_%\n42,L9,100\n",
        )?;

        let table = CsvStore::new(path).load()?;
        let row = &table.rows()[0];
        assert_eq!(row.lot_id, "L9");
        assert_eq!(row.emission_count, Some(42));
        assert_eq!(row.white, Some(100.0));
        assert_eq!(row.effective_dosage_ppm, None);
        Ok(())
    }

    #[test]
    fn samples_appended_to_reordered_file_land_under_their_columns() -> Result<()> {
        let tmp_dir = TempDir::new("samples_appended_to_reordered_file").unwrap();
        let path = tmp_dir.path().join("reference.csv");
        let mut header: Vec<&str> = HEADER.iter().rev().copied().collect();
        header.insert(3, "Operator");
        std::fs::write(&path, format!("{}\n", header.join(",")))?;

        let store = CsvStore::new(path);
        let sample = entry("L1", 1500).into_sample()?;
        store.append(&sample)?;

        let table = store.load()?;
        assert_eq!(table.len(), 1);
        assert_eq!(table.rows()[0], sample);
        Ok(())
    }

    #[test]
    fn appending_to_file_missing_a_known_column_is_refused() -> Result<()> {
        let tmp_dir = TempDir::new("appending_to_file_missing_a_known_column").unwrap();
        let path = tmp_dir.path().join("reference.csv");
        std::fs::write(&path, "Emission_Count,LOT_Number,White_Fiber_%\n42,L9,100\n")?;

        let store = CsvStore::new(path.clone());
        let result = store.append(&entry("L1", 1500).into_sample()?);
        assert!(matches!(result, Err(Error::DataUnavailable { .. })));

        let contents = std::fs::read_to_string(&path)?;
        assert_eq!(contents, "Emission_Count,LOT_Number,White_Fiber_%\n42,L9,100\n");
        Ok(())
    }

    #[test]
    fn deleting_a_lot_removes_all_its_rows() -> Result<()> {
        let tmp_dir = TempDir::new("deleting_a_lot_removes_all_its_rows").unwrap();
        let store = CsvStore::new(tmp_dir.path().join("reference.csv"));
        for (lot, count) in [("L1", 10), ("L2", 20), ("L1", 30)] {
            store.append(&entry(lot, count).into_sample()?)?;
        }

        assert_eq!(store.delete_lot("L1")?, 2);
        assert_eq!(store.delete_lot("unknown")?, 0);

        let table = store.load()?;
        assert_eq!(table.lots(), vec!["L2"]);
        Ok(())
    }
}

//! Generic CSV loading driven by a [`SourceDefinition`].

use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use basel_hotspots_event_models::{Event, EventSet};
use csv::StringRecord;

use crate::SourceError;
use crate::source_def::SourceDefinition;

/// A CSV record addressed by column name.
pub struct Row<'a> {
    columns: &'a BTreeMap<String, usize>,
    record: &'a StringRecord,
}

impl Row<'_> {
    /// Trimmed cell value, `None` for an unknown column or an empty cell.
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&str> {
        let idx = *self.columns.get(column)?;
        let value = self.record.get(idx)?.trim();
        (!value.is_empty()).then_some(value)
    }
}

/// Outcome of loading one CSV export.
#[derive(Debug)]
pub struct LoadReport {
    /// Valid events, in file order.
    pub events: EventSet,
    /// Data rows read.
    pub rows: usize,
    /// Rows without a usable coordinate pair.
    pub missing_coordinates: usize,
    /// Rows whose weight was the source's placeholder value.
    pub sentinel_weights: usize,
    /// Rows whose coordinate or weight is invalid for the source's CRS.
    pub invalid: usize,
    /// Rows where a configured timestamp could not be parsed.
    pub missing_timestamps: usize,
}

impl LoadReport {
    /// Rows that did not become events.
    #[must_use]
    pub const fn skipped(&self) -> usize {
        self.missing_coordinates + self.sentinel_weights + self.invalid
    }
}

/// Parses CSV data from `reader` into events.
///
/// Rows with missing or unparseable coordinates are skipped and counted,
/// never fatal.
///
/// # Errors
///
/// * [`SourceError::InvalidDefinition`] if the delimiter is not ASCII.
/// * [`SourceError::MissingColumn`] if the header lacks a mapped column.
/// * [`SourceError::Csv`] on malformed CSV.
pub fn load_csv<R: Read>(reader: R, def: &SourceDefinition) -> Result<LoadReport, SourceError> {
    let delimiter = u8::try_from(def.delimiter)
        .ok()
        .filter(u8::is_ascii)
        .ok_or_else(|| SourceError::InvalidDefinition {
            id: def.id.clone(),
            message: format!("delimiter {:?} is not a single ASCII character", def.delimiter),
        })?;

    let mut csv = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(reader);

    let columns: BTreeMap<String, usize> = csv
        .headers()?
        .iter()
        .enumerate()
        .map(|(i, h)| (h.trim_start_matches('\u{feff}').trim().to_string(), i))
        .collect();
    if let Some(missing) = def
        .fields
        .columns()
        .into_iter()
        .find(|c| !columns.contains_key(*c))
    {
        return Err(SourceError::MissingColumn {
            source_id: def.id.clone(),
            column: missing.to_string(),
        });
    }

    let mut events = Vec::new();
    let mut rows = 0;
    let mut missing_coordinates = 0;
    let mut sentinel_weights = 0;
    let mut missing_timestamps = 0;

    let zero_is_missing = def.zero_coordinates_missing();
    let mut record = StringRecord::new();
    while csv.read_record(&mut record)? {
        rows += 1;
        let row = Row {
            columns: &columns,
            record: &record,
        };

        let Some((x, y)) = def.fields.coordinates(&row, zero_is_missing) else {
            missing_coordinates += 1;
            continue;
        };

        let weight = def.fields.weight(&row);
        if let (Some(w), Some(sentinel)) = (weight, def.weight_sentinel)
            && sentinel.matches(w)
        {
            sentinel_weights += 1;
            continue;
        }

        let id = def
            .fields
            .id
            .as_deref()
            .and_then(|c| row.get(c))
            .map_or_else(|| rows.to_string(), String::from);
        let mut event = Event::new(id, x, y);
        event.weight = weight;
        event.category = def.fields.category(&row);
        event.severity = def.fields.severity(&row);
        if let Some(extractor) = &def.fields.occurred_at {
            match extractor.extract(&row) {
                Some((at, precision)) => event = event.with_partial_time(at, precision),
                None => missing_timestamps += 1,
            }
        }
        events.push(event);
    }

    let (events, invalid) = EventSet::filtered(def.crs, events);

    if missing_coordinates + sentinel_weights + invalid > 0 {
        log::warn!(
            "[{}] Skipped {missing_coordinates} rows without coordinates, \
             {sentinel_weights} placeholder measurements, {invalid} invalid rows",
            def.id
        );
    }
    if missing_timestamps > 0 {
        log::warn!(
            "[{}] {missing_timestamps} rows have no parseable timestamp",
            def.id
        );
    }
    log::info!("[{}] Loaded {} events from {rows} rows", def.id, events.len());

    Ok(LoadReport {
        events,
        rows,
        missing_coordinates,
        sentinel_weights,
        invalid,
        missing_timestamps,
    })
}

/// Opens `path` and loads it with [`load_csv`].
///
/// # Errors
///
/// Returns [`SourceError::Io`] if the file cannot be opened, otherwise the
/// same errors as [`load_csv`].
pub fn load_path(path: impl AsRef<Path>, def: &SourceDefinition) -> Result<LoadReport, SourceError> {
    let path = path.as_ref();
    log::info!("[{}] Reading {}", def.id, path.display());
    let file = std::fs::File::open(path)?;
    load_csv(std::io::BufReader::new(file), def)
}

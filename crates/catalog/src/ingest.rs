use std::fs;
use std::io::Read;
use std::path::Path;

use flate2::read::GzDecoder;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::catalog::PointCatalog;
use crate::error::{CatalogError, RecordError};
use crate::point::Point;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// One dataset record as it appears on disk.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PointRecord {
    pub id: String,
    pub name: String,
    pub lat: f64,
    pub lon: f64,
}

/// Outcome of loading a dataset: the catalog plus every rejected record.
#[derive(Debug)]
pub struct IngestReport {
    pub catalog: PointCatalog,
    pub rejected: Vec<RecordError>,
}

/// Decode a JSON record array, gunzipping first when the payload is gzip.
///
/// Records that do not match the `{id, name, lat, lon}` shape are rejected
/// individually instead of failing the whole dataset.
pub fn decode_records(bytes: &[u8]) -> Result<(Vec<PointRecord>, Vec<RecordError>), CatalogError> {
    let values: Vec<serde_json::Value> = if bytes.starts_with(&GZIP_MAGIC) {
        let mut json = Vec::new();
        GzDecoder::new(bytes)
            .read_to_end(&mut json)
            .map_err(CatalogError::Decompress)?;
        serde_json::from_slice(&json)?
    } else {
        serde_json::from_slice(bytes)?
    };

    let mut records = Vec::with_capacity(values.len());
    let mut rejected = Vec::new();
    for (index, value) in values.into_iter().enumerate() {
        match serde_json::from_value::<PointRecord>(value) {
            Ok(r) => records.push(r),
            Err(e) => rejected.push(RecordError::Malformed {
                index,
                reason: e.to_string(),
            }),
        }
    }
    Ok((records, rejected))
}

/// Validate records and build the catalog. Invalid records are skipped.
pub fn catalog_from_records(records: Vec<PointRecord>) -> IngestReport {
    let mut points = Vec::with_capacity(records.len());
    let mut rejected = Vec::new();

    for r in records {
        match Point::new(r.id, r.name, r.lat, r.lon) {
            Ok(p) => points.push(p),
            Err(e) => rejected.push(e),
        }
    }

    let (catalog, duplicates) = PointCatalog::build(points);
    rejected.extend(duplicates);
    IngestReport { catalog, rejected }
}

pub fn load_catalog_bytes(bytes: &[u8]) -> Result<IngestReport, CatalogError> {
    let (records, mut rejected) = decode_records(bytes)?;
    let mut report = catalog_from_records(records);
    rejected.append(&mut report.rejected);
    report.rejected = rejected;

    for err in &report.rejected {
        debug!(%err, "dataset record rejected");
    }
    if !report.rejected.is_empty() {
        warn!(
            rejected = report.rejected.len(),
            kept = report.catalog.len(),
            "dataset contained invalid records"
        );
    }
    if report.catalog.is_empty() {
        return Err(CatalogError::Empty {
            rejected: report.rejected.len(),
        });
    }
    Ok(report)
}

pub fn load_catalog(path: &Path) -> Result<IngestReport, CatalogError> {
    let bytes = fs::read(path).map_err(|source| CatalogError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    load_catalog_bytes(&bytes)
}

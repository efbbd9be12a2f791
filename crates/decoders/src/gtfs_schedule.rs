use std::io::{Cursor, Read};

use serde_json::{Map, Value};
use transit_feed_registry::GtfsScheduleFileType;
use transit_keying::Table;

use crate::error::DecodeError;
use crate::model::{digest, DecodedGroup, Decoder};

/// Decodes a GTFS static ZIP archive. Each recognized entry is UTF-8 CSV
/// with a header row; one `DecodedGroup` is emitted per entry, keyed by its
/// `GtfsScheduleFileType`. Unrecognized entry names are warned about and
/// skipped rather than failing the whole archive.
#[derive(Default)]
pub struct GtfsScheduleDecoder;

impl Decoder for GtfsScheduleDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<Vec<DecodedGroup>, DecodeError> {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;
        let mut groups = Vec::new();
        for i in 0..archive.len() {
            let mut entry = archive.by_index(i)?;
            let name = entry.name().to_string();
            let Some(file_type) = GtfsScheduleFileType::from_filename(&name) else {
                tracing::warn!(entry = %name, "skipping unrecognized gtfs schedule entry");
                continue;
            };
            let mut contents = Vec::new();
            entry.read_to_end(&mut contents).map_err(|source| DecodeError::Io {
                entry: name.clone(),
                source,
            })?;
            let records = decode_csv_entry(&name, &contents)?;
            groups.push(DecodedGroup {
                sub_table: Table::GtfsFile(file_type),
                records,
                digest: digest(&contents),
            });
        }
        Ok(groups)
    }
}

fn decode_csv_entry(entry: &str, contents: &[u8]) -> Result<Vec<Value>, DecodeError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(contents);
    let headers = reader
        .headers()
        .map_err(|source| DecodeError::Csv {
            entry: entry.to_string(),
            source,
        })?
        .clone();
    let mut records = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|source| DecodeError::Csv {
            entry: entry.to_string(),
            source,
        })?;
        let mut obj = Map::new();
        for (header, field) in headers.iter().zip(record.iter()) {
            obj.insert(header.to_string(), Value::String(field.to_string()));
        }
        records.push(Value::Object(obj));
    }
    Ok(records)
}

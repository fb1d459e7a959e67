//! Delimited text extracts
//!
//! Registry extracts are comma or semicolon separated and either UTF-8 or
//! Latin-1. The text is decoded first, then parsed by `arrow::csv` with
//! every column typed as `Utf8`. Short rows are padded with nulls; rows
//! with more fields than the header are dropped and counted.

use std::borrow::Cow;
use std::fs::File;
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use arrow::csv::reader::Format;
use arrow::csv::{ReaderBuilder, WriterBuilder};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;

use crate::error::util::{ensure_directory, read_bytes};
use crate::error::{PipelineError, Result};
use crate::utils::io::{DEFAULT_BATCH_SIZE, Extract};
use crate::utils::logging::{log_operation_complete, log_operation_start, log_warning};

/// Decode raw bytes as UTF-8, falling back to Latin-1
///
/// Latin-1 maps each byte to the code point of the same value.
#[must_use]
pub fn decode_text(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(err) => {
            log::debug!("extract is not valid UTF-8, decoding as Latin-1");
            err.into_bytes().iter().map(|&b| char::from(b)).collect()
        }
    }
}

/// Pick the delimiter that occurs most often in the header line
#[must_use]
pub fn detect_delimiter(text: &str) -> u8 {
    let header = text.lines().next().unwrap_or_default();
    [b',', b';', b'\t', b'|']
        .into_iter()
        .map(|delimiter| {
            let count = header.bytes().filter(|b| *b == delimiter).count();
            (count, delimiter)
        })
        .filter(|(count, _)| *count > 0)
        .max_by_key(|(count, delimiter)| (*count, *delimiter == b','))
        .map_or(b',', |(_, delimiter)| delimiter)
}

/// Split text into records at newlines outside double quotes
///
/// Each record keeps its line terminator.
fn split_records(text: &str) -> Vec<&str> {
    let mut records = Vec::new();
    let mut start = 0;
    let mut quoted = false;
    for (i, byte) in text.bytes().enumerate() {
        match byte {
            b'"' => quoted = !quoted,
            b'\n' if !quoted => {
                records.push(&text[start..=i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    if start < text.len() {
        records.push(&text[start..]);
    }
    records
}

/// Number of fields in one record, ignoring delimiters inside quotes
fn field_count(record: &str, delimiter: u8) -> usize {
    let (delimiters, _) = record.bytes().fold((0, false), |(count, quoted), byte| match byte {
        b'"' => (count, !quoted),
        b if b == delimiter && !quoted => (count + 1, quoted),
        _ => (count, quoted),
    });
    delimiters + 1
}

/// Drop records with more fields than the header
///
/// `arrow::csv` rejects the whole batch on such a record, so they are
/// removed up front and their number returned.
fn drop_overlong_records(text: &str, delimiter: u8) -> (Cow<'_, str>, usize) {
    let records = split_records(text);
    let Some((header, body)) = records.split_first() else {
        return (Cow::Borrowed(text), 0);
    };
    let width = field_count(header, delimiter);
    let fits = |record: &&str| field_count(record, delimiter) <= width;

    let overlong = body.iter().filter(|record| !fits(record)).count();
    if overlong == 0 {
        return (Cow::Borrowed(text), 0);
    }
    let kept = std::iter::once(*header)
        .chain(body.iter().copied().filter(|record| fits(record)))
        .collect();
    (Cow::Owned(kept), overlong)
}

/// Read a delimited text extract with all columns as `Utf8`
pub fn read_csv(path: &Path) -> Result<Extract> {
    let start = Instant::now();
    log_operation_start("Reading extract", path);

    let text = decode_text(read_bytes(path, "reading a delimited extract")?);
    let extract = parse_csv(&text)?;
    if extract.overlong_rows > 0 {
        log_warning(
            &format!(
                "Skipped {} rows with more fields than the header",
                extract.overlong_rows
            ),
            Some(path),
        );
    }

    log_operation_complete("read", path, extract.num_rows(), Some(start.elapsed()));
    Ok(extract)
}

/// Parse decoded delimited text into record batches
pub fn parse_csv(text: &str) -> Result<Extract> {
    if text.trim().is_empty() {
        return Ok(Extract::default());
    }

    let delimiter = detect_delimiter(text);
    let (text, overlong_rows) = drop_overlong_records(text, delimiter);
    let format = Format::default()
        .with_header(true)
        .with_delimiter(delimiter)
        .with_truncated_rows(true);

    let (inferred, _) = format.infer_schema(Cursor::new(text.as_bytes()), Some(1))?;
    let schema = Arc::new(Schema::new(
        inferred
            .fields()
            .iter()
            .map(|field| Field::new(field.name(), DataType::Utf8, true))
            .collect::<Vec<_>>(),
    ));

    let reader = ReaderBuilder::new(schema.clone())
        .with_format(format)
        .with_batch_size(DEFAULT_BATCH_SIZE)
        .build(Cursor::new(text.as_bytes()))?;

    let mut batches = reader
        .map(|batch| batch.map_err(PipelineError::from))
        .collect::<Result<Vec<_>>>()?;
    if batches.is_empty() {
        // header-only extract: keep the schema so columns can still be checked
        batches.push(RecordBatch::new_empty(schema));
    }
    Ok(Extract {
        batches,
        overlong_rows,
    })
}

/// Write record batches as a comma-separated file with a header row
pub fn write_csv(path: &Path, batches: &[RecordBatch]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        ensure_directory(parent)?;
    }
    let file = File::create(path).map_err(|e| PipelineError::io(path, e))?;
    let mut writer = WriterBuilder::new().with_header(true).build(file);
    for batch in batches {
        writer.write(batch)?;
    }
    let rows = batches.iter().map(RecordBatch::num_rows).sum();
    log_operation_complete("wrote", path, rows, None);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Array, StringArray};

    #[test]
    fn test_detect_delimiter() {
        assert_eq!(detect_delimiter("A,B,C\n1,2,3"), b',');
        assert_eq!(detect_delimiter("A;B;C\n1;2;3"), b';');
        assert_eq!(detect_delimiter("A;B,C;D"), b';');
        assert_eq!(detect_delimiter("single"), b',');
    }

    #[test]
    fn test_latin1_fallback() {
        let bytes = vec![b'B', b'o', b'g', b'o', b't', 0xE1];
        assert_eq!(decode_text(bytes), "Bogotá");
        assert_eq!(decode_text("Nariño".as_bytes().to_vec()), "Nariño");
    }

    #[test]
    fn test_parse_semicolon_short_rows_as_strings() {
        let text = "COD_DEP;COD_MUN;NombreSede\n50;001;Hospital\n81;065\n";
        let extract = parse_csv(text).unwrap();
        assert_eq!(extract.batches.len(), 1);
        assert_eq!(extract.overlong_rows, 0);
        let batch = &extract.batches[0];
        assert_eq!(batch.num_rows(), 2);
        assert!(batch
            .schema()
            .fields()
            .iter()
            .all(|f| f.data_type() == &DataType::Utf8));

        let munic = batch
            .column(1)
            .as_any()
            .downcast_ref::<StringArray>()
            .unwrap();
        assert_eq!(munic.value(0), "001");
        let names = batch
            .column(2)
            .as_any()
            .downcast_ref::<StringArray>()
            .unwrap();
        assert!(names.is_null(1));
    }

    #[test]
    fn test_header_only_keeps_schema() {
        let batches = parse_csv("COD_DPTO,COD_MUNIC,ANO\n").unwrap().batches;
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].num_rows(), 0);
        assert_eq!(batches[0].num_columns(), 3);
    }

    #[test]
    fn test_read_and_write_roundtrip_through_files() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.csv");
        std::fs::write(&input, "A,B\n1,x\n2,y\n").unwrap();
        let batches = read_csv(&input).unwrap().batches;

        let output = dir.path().join("out").join("copy.csv");
        write_csv(&output, &batches).unwrap();
        assert_eq!(std::fs::read_to_string(&output).unwrap(), "A,B\n1,x\n2,y\n");
    }

    #[test]
    fn test_rows_with_extra_fields_are_dropped() {
        let text = "A,B,C\n1,2,3\n4,5,6,7\n\"x,y\",8,9\n10;11,12\n";
        let extract = parse_csv(text).unwrap();
        assert_eq!(extract.overlong_rows, 1);
        assert_eq!(extract.num_rows(), 3);

        let first = extract.batches[0]
            .column(0)
            .as_any()
            .downcast_ref::<StringArray>()
            .unwrap();
        let values: Vec<_> = (0..first.len()).map(|i| first.value(i)).collect();
        assert_eq!(values, vec!["1", "x,y", "10;11"]);
    }

    #[test]
    fn test_quoted_newline_stays_in_one_record() {
        let records = split_records("A,B\n\"line\nbreak\",2\n3,4");
        assert_eq!(records, vec!["A,B\n", "\"line\nbreak\",2\n", "3,4"]);
        assert_eq!(field_count("\"a,b\",c", b','), 2);
    }
}

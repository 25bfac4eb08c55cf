//! Intel-HEX to flat-binary conversion.
//!
//! Firmware ships as a textual Intel-HEX record stream, one record per
//! line. Decoding flattens the records into a contiguous byte image, with
//! gaps between records reading as zero.

use std::fs;
use std::path::Path;

use ihex::{Reader, Record};
use thiserror::Error;

use crate::protocol::constants::FIRMWARE_MAX_SIZE_BYTES;

#[derive(Error, Debug)]
pub enum HexError {
    #[error("record {line}: {source}")]
    MalformedRecord {
        line: usize,
        #[source]
        source: ihex::ReaderError,
    },

    #[error("data record reaching 0x{end:08X} lands beyond the firmware region")]
    RegionOverflow { end: usize },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Decode an Intel-HEX record stream into a flat binary image.
///
/// Address records rebase subsequent data records; an end-of-file record
/// terminates the stream. The first malformed record aborts the decode.
pub fn decode(text: &str) -> Result<Vec<u8>, HexError> {
    let mut image: Vec<u8> = Vec::new();
    let mut base: u32 = 0;

    for (idx, record) in Reader::new(text).enumerate() {
        let line = idx + 1;
        match record.map_err(|source| HexError::MalformedRecord { line, source })? {
            Record::ExtendedLinearAddress(upper) => base = u32::from(upper) << 16,
            Record::ExtendedSegmentAddress(segment) => base = u32::from(segment) << 4,
            Record::Data { offset, value } => {
                let start = (base + u32::from(offset)) as usize;
                let end = start + value.len();
                if end > FIRMWARE_MAX_SIZE_BYTES {
                    return Err(HexError::RegionOverflow { end });
                }
                if image.len() < end {
                    image.resize(end, 0);
                }
                image[start..end].copy_from_slice(&value);
            }
            Record::EndOfFile => break,
            // Entry-point records carry no image bytes.
            Record::StartSegmentAddress { .. } | Record::StartLinearAddress(_) => {}
        }
    }

    Ok(image)
}

/// Convert a `.hex` file into a freshly created flat `.bin` file.
///
/// The output file is written and closed only after the whole input decoded
/// cleanly; a failed decode leaves no output behind.
pub fn convert_file(src: &Path, dst: &Path) -> Result<(), HexError> {
    let text = fs::read_to_string(src)?;
    let image = decode(&text)?;
    fs::write(dst, &image)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ihex::create_object_file_representation;

    fn encode(records: &[Record]) -> String {
        create_object_file_representation(records).unwrap()
    }

    #[test]
    fn test_round_trip() {
        let payload: Vec<u8> = (0u16..600).map(|i| (i % 251) as u8).collect();
        let mut records: Vec<Record> = payload
            .chunks(32)
            .enumerate()
            .map(|(i, chunk)| Record::Data {
                offset: (i * 32) as u16,
                value: chunk.to_vec(),
            })
            .collect();
        records.push(Record::EndOfFile);

        let decoded = decode(&encode(&records)).unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn test_gap_between_records_reads_zero() {
        let records = vec![
            Record::Data {
                offset: 0,
                value: vec![0xAA],
            },
            Record::Data {
                offset: 4,
                value: vec![0xBB],
            },
            Record::EndOfFile,
        ];
        assert_eq!(decode(&encode(&records)).unwrap(), vec![
            0xAA, 0, 0, 0, 0xBB
        ]);
    }

    #[test]
    fn test_extended_linear_address_rebases() {
        let records = vec![
            Record::ExtendedLinearAddress(0x0001),
            Record::Data {
                offset: 0x10,
                value: vec![0xCC],
            },
            Record::EndOfFile,
        ];
        // 0x0001_0010 exceeds the firmware region, which the decoder refuses
        // to grow past.
        assert!(matches!(
            decode(&encode(&records)),
            Err(HexError::RegionOverflow { end: 0x10011 })
        ));
    }

    #[test]
    fn test_malformed_record_reports_line() {
        let mut text = encode(&[
            Record::Data {
                offset: 0,
                value: vec![1, 2, 3],
            },
            Record::EndOfFile,
        ]);
        // Corrupt the first record's checksum digit.
        let bad = if text.as_bytes()[12] == b'0' { "1" } else { "0" };
        text.replace_range(12..13, bad);

        match decode(&text) {
            Err(HexError::MalformedRecord { line: 1, .. }) => {}
            other => panic!("expected malformed record at line 1, got {other:?}"),
        }
    }

    #[test]
    fn test_convert_file_leaves_no_output_on_failure(){
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("fw.hex");
        let dst = dir.path().join("fw.bin");
        std::fs::write(&src, ":bogus\n").unwrap();

        assert!(convert_file(&src, &dst).is_err());
        assert!(!dst.exists());
    }
}

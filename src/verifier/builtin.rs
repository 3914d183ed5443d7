//! In-process checks.
//!
//! Each check consumes the whole file. Problems are sorted into three bins:
//! the data is provably wrong, the data uses a feature we cannot check, or
//! the file could not be read at all.

use super::zip_layout::read_layout;
use crate::outcome::Outcome;
use crate::registry::{DecodeKind, QueryKind};
use flate2::read::MultiGzDecoder;
use rusqlite::{Connection, OpenFlags};
use serde::de::IgnoredAny;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

/// Buffer size for sequential reads.
const READ_CHUNK: usize = 64 * 1024;

/// Integrity-check rows kept in the failure reason.
const MAX_SQLITE_MESSAGES: usize = 3;

/// Why a built-in check did not pass.
#[derive(Debug)]
pub(super) enum CheckFailure {
    /// The content is corrupt or malformed.
    Invalid(String),
    /// The content uses something this check cannot verify.
    Unsupported(String),
    /// The file could not be read.
    Io(io::Error),
}

impl CheckFailure {
    pub(super) fn into_outcome(self) -> Outcome {
        match self {
            Self::Invalid(reason) => Outcome::failed(reason),
            Self::Unsupported(reason) => Outcome::unverifiable(reason),
            Self::Io(e) => Outcome::path_error(e.to_string()),
        }
    }
}

type CheckResult = Result<(), CheckFailure>;

fn open(path: &Path) -> Result<File, CheckFailure> {
    File::open(path).map_err(CheckFailure::Io)
}

/// Read errors from a decoder wrap both real I/O trouble and corrupt data.
fn classify_read_error(e: io::Error) -> CheckFailure {
    match e.kind() {
        io::ErrorKind::InvalidData
        | io::ErrorKind::InvalidInput
        | io::ErrorKind::UnexpectedEof
        | io::ErrorKind::Other => CheckFailure::Invalid(e.to_string()),
        _ => CheckFailure::Io(e),
    }
}

pub(super) fn decode(path: &Path, kind: DecodeKind) -> Result<Outcome, CheckFailure> {
    match kind {
        DecodeKind::Gzip => check_gzip(path)?,
        DecodeKind::Zip => check_zip(path)?,
        DecodeKind::Json => check_json(path)?,
        DecodeKind::Toml => check_toml(path)?,
        DecodeKind::Image { multipage } => {
            check_image(path)?;
            if multipage {
                return Ok(Outcome::unverifiable(
                    "only the first frame of a multi-frame image was checked",
                ));
            }
        }
    }
    Ok(Outcome::Ok)
}

pub(super) fn query(path: &Path, kind: QueryKind) -> Result<Outcome, CheckFailure> {
    match kind {
        QueryKind::Sqlite => check_sqlite(path),
    }
}

/// Read every byte, proving only that the file is readable.
pub(super) fn read_through(path: &Path) -> CheckResult {
    let mut reader = BufReader::with_capacity(READ_CHUNK, open(path)?);
    io::copy(&mut reader, &mut io::sink()).map_err(CheckFailure::Io)?;
    Ok(())
}

fn check_gzip(path: &Path) -> CheckResult {
    let mut decoder = MultiGzDecoder::new(BufReader::with_capacity(READ_CHUNK, open(path)?));
    io::copy(&mut decoder, &mut io::sink()).map_err(classify_read_error)?;
    Ok(())
}

fn check_zip(path: &Path) -> CheckResult {
    // Structure first: the reader below trusts whatever the directory says.
    let mut raw = open(path)?;
    let layout = read_layout(&mut raw)?;
    let mut archive = zip::ZipArchive::new(BufReader::new(open(path)?)).map_err(zip_failure)?;
    if let Some(layout) = &layout
        && layout.records.len() != archive.len()
    {
        return Err(CheckFailure::Invalid(format!(
            "central directory holds {} entries, archive reader found {}",
            layout.records.len(),
            archive.len()
        )));
    }

    for index in 0..archive.len() {
        if let Some(layout) = &layout {
            layout.check_local_header(&mut raw, index).map_err(|reason| {
                CheckFailure::Invalid(format!(
                    "member '{}': {reason}",
                    layout.records[index].display_name()
                ))
            })?;
        }

        let mut member = archive.by_index(index).map_err(zip_failure)?;
        if member.is_dir() {
            continue;
        }
        let name = member.name().to_string();
        let member_failure = |reason: String| CheckFailure::Invalid(format!("member '{name}': {reason}"));
        let recorded = member.size();
        let decoded = io::copy(&mut member, &mut io::sink())
            .map_err(|e| member_failure(e.to_string()))?;
        if decoded != recorded {
            return Err(member_failure(format!(
                "decoded {decoded} bytes, central directory records {recorded}"
            )));
        }
    }
    Ok(())
}

fn zip_failure(e: zip::result::ZipError) -> CheckFailure {
    use zip::result::ZipError;
    match e {
        ZipError::Io(e) => classify_read_error(e),
        ZipError::UnsupportedArchive(reason) => CheckFailure::Unsupported(reason.to_string()),
        other => CheckFailure::Invalid(other.to_string()),
    }
}

fn check_json(path: &Path) -> CheckResult {
    let reader = BufReader::with_capacity(READ_CHUNK, open(path)?);
    serde_json::from_reader::<_, IgnoredAny>(reader).map_err(|e| {
        if e.is_io() {
            CheckFailure::Io(io::Error::from(e))
        } else {
            CheckFailure::Invalid(format!("JSON is not well-formed: {e}"))
        }
    })?;
    Ok(())
}

fn check_toml(path: &Path) -> CheckResult {
    let mut bytes = Vec::new();
    open(path)?
        .read_to_end(&mut bytes)
        .map_err(CheckFailure::Io)?;
    let text = String::from_utf8(bytes)
        .map_err(|e| CheckFailure::Invalid(format!("TOML is not valid UTF-8: {e}")))?;
    text.parse::<toml::Table>()
        .map_err(|e| CheckFailure::Invalid(format!("TOML is not well-formed: {}", e.message())))?;
    Ok(())
}

fn check_image(path: &Path) -> CheckResult {
    use image::ImageError;

    let reader = image::ImageReader::open(path)
        .map_err(CheckFailure::Io)?
        .with_guessed_format()
        .map_err(CheckFailure::Io)?;

    match reader.decode() {
        Ok(_) => Ok(()),
        Err(ImageError::Decoding(e)) => Err(CheckFailure::Invalid(e.to_string())),
        Err(ImageError::Parameter(e)) => Err(CheckFailure::Invalid(e.to_string())),
        Err(ImageError::IoError(e)) => Err(classify_read_error(e)),
        Err(ImageError::Unsupported(e)) => Err(CheckFailure::Unsupported(e.to_string())),
        Err(other) => Err(CheckFailure::Unsupported(other.to_string())),
    }
}

fn check_sqlite(path: &Path) -> Result<Outcome, CheckFailure> {
    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .map_err(sqlite_failure)?;

    let mut stmt = conn
        .prepare("PRAGMA integrity_check")
        .map_err(sqlite_failure)?;
    let messages = stmt
        .query_map([], |row| row.get::<_, String>(0))
        .map_err(sqlite_failure)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(sqlite_failure)?;

    if messages.len() == 1 && messages[0] == "ok" {
        return Ok(Outcome::Ok);
    }
    let shown: Vec<&str> = messages
        .iter()
        .take(MAX_SQLITE_MESSAGES)
        .map(String::as_str)
        .collect();
    Ok(Outcome::failed(format!(
        "integrity_check reported {} problem(s): {}",
        messages.len(),
        shown.join("; ")
    )))
}

fn sqlite_failure(e: rusqlite::Error) -> CheckFailure {
    use rusqlite::ErrorCode;
    match e.sqlite_error_code() {
        Some(ErrorCode::CannotOpen | ErrorCode::PermissionDenied) => {
            CheckFailure::Io(io::Error::other(e.to_string()))
        }
        _ => CheckFailure::Invalid(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::fixtures::{gzip_bytes, zip_bytes};
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, bytes: &[u8]) -> std::path::PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, bytes).unwrap();
        path
    }

    fn decode_outcome(path: &Path, kind: DecodeKind) -> Outcome {
        decode(path, kind).unwrap_or_else(CheckFailure::into_outcome)
    }

    #[test]
    fn test_gzip_valid() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "a.gz", &gzip_bytes(b"hello world\n"));
        assert_eq!(decode_outcome(&path, DecodeKind::Gzip), Outcome::Ok);
    }

    #[test]
    fn test_gzip_crc_mismatch_fails() {
        let dir = TempDir::new().unwrap();
        let mut bytes = gzip_bytes(b"hello world, this is a longer payload\n");
        let crc_at = bytes.len() - 8;
        bytes[crc_at] ^= 0xff;
        let path = write(&dir, "a.gz", &bytes);
        assert!(matches!(
            decode_outcome(&path, DecodeKind::Gzip),
            Outcome::Failed { .. }
        ));
    }

    /// Bytes that deflate cannot shrink much, so flips land in real data.
    fn noisy_payload(len: usize) -> Vec<u8> {
        (0..len).map(|i| ((i * 7919 + 13) % 251) as u8).collect()
    }

    #[test]
    fn test_gzip_payload_bit_flip_fails() {
        let dir = TempDir::new().unwrap();
        let mut bytes = gzip_bytes(&noisy_payload(4096));
        // 10-byte header, 8-byte trailer; flip one bit in the middle of the deflate data.
        let middle = 10 + (bytes.len() - 18) / 2;
        bytes[middle] ^= 0x01;
        let path = write(&dir, "a.gz", &bytes);
        assert!(matches!(
            decode_outcome(&path, DecodeKind::Gzip),
            Outcome::Failed { .. }
        ));
    }

    #[test]
    fn test_gzip_multiple_members_valid() {
        let dir = TempDir::new().unwrap();
        let mut bytes = gzip_bytes(b"first\n");
        bytes.extend(gzip_bytes(b"second\n"));
        let path = write(&dir, "multi.gz", &bytes);
        assert_eq!(decode_outcome(&path, DecodeKind::Gzip), Outcome::Ok);
    }

    #[test]
    fn test_zip_valid() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "a.zip",
            &zip_bytes(&[("one.txt", b"one"), ("two.txt", b"two two two")]),
        );
        assert_eq!(decode_outcome(&path, DecodeKind::Zip), Outcome::Ok);
    }

    #[test]
    fn test_zip_member_crc_mismatch_names_member() {
        let dir = TempDir::new().unwrap();
        let payload = b"aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
        let mut bytes = zip_bytes(&[("good.txt", b"fine"), ("broken.txt", payload)]);
        // The CRC-32 of the second member lives at offset 14 of its local header.
        let second = bytes
            .windows(4)
            .enumerate()
            .filter(|(_, w)| *w == [0x50, 0x4b, 0x03, 0x04])
            .nth(1)
            .map(|(i, _)| i)
            .unwrap();
        bytes[second + 14] ^= 0xff;
        // Keep the central directory copy consistent so only the data check trips.
        let central = bytes
            .windows(4)
            .enumerate()
            .filter(|(_, w)| *w == [0x50, 0x4b, 0x01, 0x02])
            .nth(1)
            .map(|(i, _)| i)
            .unwrap();
        bytes[central + 16] ^= 0xff;
        let path = write(&dir, "a.zip", &bytes);

        match decode_outcome(&path, DecodeKind::Zip) {
            Outcome::Failed { reason } => assert!(reason.contains("broken.txt"), "{reason}"),
            other => panic!("expected failure, got {other:?}"),
        }
    }

    fn signature_offsets(bytes: &[u8], signature: [u8; 4]) -> Vec<usize> {
        bytes
            .windows(4)
            .enumerate()
            .filter(|(_, w)| *w == signature)
            .map(|(i, _)| i)
            .collect()
    }

    fn le_u16_at(bytes: &[u8], at: usize) -> usize {
        usize::from(u16::from_le_bytes([bytes[at], bytes[at + 1]]))
    }

    fn two_member_zip() -> Vec<u8> {
        let first = noisy_payload(300);
        let second = noisy_payload(500);
        zip_bytes(&[("first.bin", first.as_slice()), ("second.bin", second.as_slice())])
    }

    fn assert_zip_fails(bytes: &[u8], context: &str) -> String {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "a.zip", bytes);
        match decode_outcome(&path, DecodeKind::Zip) {
            Outcome::Failed { reason } => reason,
            other => panic!("{context}: expected failure, got {other:?}"),
        }
    }

    #[test]
    fn test_zip_member_data_flip_names_member() {
        let bytes = two_member_zip();
        let second = signature_offsets(&bytes, [0x50, 0x4b, 0x03, 0x04])[1];
        let data_start = second + 30 + le_u16_at(&bytes, second + 26) + le_u16_at(&bytes, second + 28);
        let compressed = u32::from_le_bytes(bytes[second + 18..second + 22].try_into().unwrap());

        for offset in [0, compressed as usize / 2] {
            let mut corrupt = bytes.clone();
            corrupt[data_start + offset] ^= 0x10;
            let reason = assert_zip_fails(&corrupt, &format!("data offset {offset}"));
            assert!(reason.contains("second.bin"), "{reason}");
        }
    }

    #[test]
    fn test_zip_central_fields_are_cross_checked() {
        let bytes = two_member_zip();
        let central = signature_offsets(&bytes, [0x50, 0x4b, 0x01, 0x02])[0];
        // Flags, modification time, compressed size, uncompressed size, disk start.
        for field in [8, 12, 20, 24, 34] {
            let mut corrupt = bytes.clone();
            corrupt[central + field] ^= 0xff;
            assert_zip_fails(&corrupt, &format!("central field {field}"));
        }

        let mut corrupt = bytes.clone();
        corrupt[central + 46] ^= 0x20;
        let reason = assert_zip_fails(&corrupt, "central name");
        assert!(reason.contains("local header name 'first.bin'"), "{reason}");
    }

    #[test]
    fn test_zip_end_of_directory_totals_are_cross_checked() {
        let bytes = two_member_zip();
        let eocd = *signature_offsets(&bytes, [0x50, 0x4b, 0x05, 0x06]).last().unwrap();
        // Disk numbers, entries on this disk, total entries, directory size.
        for field in [4, 6, 8, 10, 12] {
            let mut corrupt = bytes.clone();
            corrupt[eocd + field] ^= 0x01;
            assert_zip_fails(&corrupt, &format!("end record field {field}"));
        }
    }

    #[test]
    fn test_zip_decoded_length_must_match_directory() {
        let bytes = two_member_zip();
        let local = signature_offsets(&bytes, [0x50, 0x4b, 0x03, 0x04])[0];
        let central = signature_offsets(&bytes, [0x50, 0x4b, 0x01, 0x02])[0];
        // Change the recorded uncompressed size in both headers consistently.
        let mut corrupt = bytes.clone();
        corrupt[local + 22] ^= 0x04;
        corrupt[central + 24] ^= 0x04;
        let reason = assert_zip_fails(&corrupt, "consistent size change");
        assert!(reason.contains("first.bin"), "{reason}");
    }

    #[test]
    fn test_zip_truncated_directory_fails() {
        let dir = TempDir::new().unwrap();
        let bytes = zip_bytes(&[("one.txt", b"one")]);
        let path = write(&dir, "a.zip", &bytes[..bytes.len() - 10]);
        assert!(matches!(
            decode_outcome(&path, DecodeKind::Zip),
            Outcome::Failed { .. }
        ));
    }

    #[test]
    fn test_json_valid_and_invalid() {
        let dir = TempDir::new().unwrap();
        let good = write(&dir, "a.json", br#"{"a": [1, 2, {"b": null}]}"#);
        assert_eq!(decode_outcome(&good, DecodeKind::Json), Outcome::Ok);

        let bad = write(&dir, "b.json", br#"{"a": [1, 2"#);
        match decode_outcome(&bad, DecodeKind::Json) {
            Outcome::Failed { reason } => assert!(reason.contains("JSON")),
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[test]
    fn test_toml_valid_and_invalid() {
        let dir = TempDir::new().unwrap();
        let good = write(&dir, "a.toml", b"[package]\nname = \"x\"\n");
        assert_eq!(decode_outcome(&good, DecodeKind::Toml), Outcome::Ok);

        let bad = write(&dir, "b.toml", b"[package\nname = \n");
        assert!(matches!(
            decode_outcome(&bad, DecodeKind::Toml),
            Outcome::Failed { .. }
        ));
    }

    fn png_bytes() -> Vec<u8> {
        let mut bytes = Vec::new();
        image::RgbImage::from_pixel(16, 16, image::Rgb([10, 20, 30]))
            .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        bytes
    }

    #[test]
    fn test_image_truncated_fails() {
        let dir = TempDir::new().unwrap();
        let bytes = png_bytes();
        let path = write(&dir, "a.png", &bytes[..bytes.len() / 2]);
        assert!(matches!(
            decode_outcome(&path, DecodeKind::Image { multipage: false }),
            Outcome::Failed { .. }
        ));
    }

    #[test]
    fn test_image_valid_png() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "a.png", &png_bytes());
        assert_eq!(
            decode_outcome(&path, DecodeKind::Image { multipage: false }),
            Outcome::Ok
        );
        assert!(matches!(
            decode_outcome(&path, DecodeKind::Image { multipage: true }),
            Outcome::Unverifiable { .. }
        ));
    }

    #[test]
    fn test_sqlite_valid_database() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.sqlite3");
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute_batch("CREATE TABLE t(x); INSERT INTO t VALUES (1), (2);")
                .unwrap();
        }
        assert_eq!(query(&path, QueryKind::Sqlite).unwrap(), Outcome::Ok);
    }

    #[test]
    fn test_sqlite_garbage_fails() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "a.sqlite3", &[0x42; 4096]);
        let outcome = query(&path, QueryKind::Sqlite).unwrap_or_else(CheckFailure::into_outcome);
        assert!(matches!(outcome, Outcome::Failed { .. }), "{outcome:?}");
    }

    #[test]
    fn test_read_through_missing_file_is_io() {
        let err = read_through(Path::new("/nonexistent/file.txt")).unwrap_err();
        assert!(matches!(err.into_outcome(), Outcome::PathError { .. }));
    }
}

//! Raw zip structure cross-checks.
//!
//! The `zip` crate trusts the central directory: it decodes each member using
//! the sizes recorded there and never compares them with the local headers or
//! the end-of-central-directory totals. Bit-rot in those fields would go
//! unnoticed, so this module re-reads the structure directly.
//!
//! Archives that need zip64 records are left to the crate; the 32-bit fields
//! hold sentinel values there and cannot be compared.

use super::builtin::CheckFailure;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};

const SIG_EOCD: u32 = 0x0605_4b50;
const SIG_CDFH: u32 = 0x0201_4b50;
const SIG_LFH: u32 = 0x0403_4b50;

const EOCD_LEN: usize = 22;
/// 64 KiB comment plus the fixed record.
const EOCD_SEARCH_MAX: usize = EOCD_LEN + u16::MAX as usize;
const CDFH_LEN: usize = 46;
const LFH_LEN: usize = 30;

const FLAG_DATA_DESCRIPTOR: u16 = 0x0008;
const ZIP64_U16: u16 = u16::MAX;
const ZIP64_U32: u32 = u32::MAX;

/// One central directory file header, as stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct CentralRecord {
    pub name: Vec<u8>,
    pub flags: u16,
    pub method: u16,
    /// DOS time and date, as one little-endian word.
    pub modified: u32,
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub disk_start: u16,
    pub local_header_offset: u32,
}

impl CentralRecord {
    pub(super) fn display_name(&self) -> String {
        String::from_utf8_lossy(&self.name).into_owned()
    }

    fn uses_data_descriptor(&self) -> bool {
        self.flags & FLAG_DATA_DESCRIPTOR != 0
    }
}

/// The central directory of a non-zip64 archive.
#[derive(Debug)]
pub(super) struct Layout {
    pub records: Vec<CentralRecord>,
    /// Bytes prepended before the archive proper (self-extracting stubs).
    archive_offset: u64,
}

fn invalid(reason: impl Into<String>) -> CheckFailure {
    CheckFailure::Invalid(reason.into())
}

fn read_failure(e: io::Error) -> CheckFailure {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        invalid("zip structure is truncated")
    } else {
        CheckFailure::Io(e)
    }
}

/// Locate the end-of-central-directory record and walk every central header.
///
/// Returns `None` for zip64 archives. Fails when the record counts or the
/// directory size disagree with what is actually stored.
pub(super) fn read_layout(file: &mut File) -> Result<Option<Layout>, CheckFailure> {
    let file_len = file.metadata().map_err(CheckFailure::Io)?.len();
    if file_len < EOCD_LEN as u64 {
        return Err(invalid("file is too short to be a zip archive"));
    }

    let win_len = usize::try_from(file_len).map_or(EOCD_SEARCH_MAX, |len| len.min(EOCD_SEARCH_MAX));
    let win_off = file_len - win_len as u64;
    let mut win = vec![0u8; win_len];
    file.seek(SeekFrom::Start(win_off)).map_err(CheckFailure::Io)?;
    file.read_exact(&mut win).map_err(read_failure)?;

    let eocd_rel = find_eocd(&win).ok_or_else(|| invalid("end of central directory not found"))?;
    let eocd = &win[eocd_rel..eocd_rel + EOCD_LEN];
    let eocd_pos = win_off + eocd_rel as u64;

    let disk = le_u16(&eocd[4..]);
    let cd_disk = le_u16(&eocd[6..]);
    let entries_disk = le_u16(&eocd[8..]);
    let entries_total = le_u16(&eocd[10..]);
    let cd_size = le_u32(&eocd[12..]);
    let cd_off = le_u32(&eocd[16..]);

    if entries_total == ZIP64_U16 || cd_size == ZIP64_U32 || cd_off == ZIP64_U32 {
        return Ok(None);
    }
    if disk != cd_disk {
        return Err(invalid(format!(
            "end of central directory is on disk {disk} but the directory starts on disk {cd_disk}"
        )));
    }
    if entries_disk != entries_total {
        return Err(invalid(format!(
            "end of central directory lists {entries_disk} entries on this disk but {entries_total} in total"
        )));
    }

    let cd_start = eocd_pos
        .checked_sub(u64::from(cd_size))
        .ok_or_else(|| invalid("central directory size exceeds the archive"))?;
    let archive_offset = cd_start
        .checked_sub(u64::from(cd_off))
        .ok_or_else(|| invalid("central directory offset points past the directory"))?;

    let mut cd = vec![0u8; cd_size as usize];
    file.seek(SeekFrom::Start(cd_start)).map_err(CheckFailure::Io)?;
    file.read_exact(&mut cd).map_err(read_failure)?;

    let records = parse_central_directory(&cd)?;
    if records.len() != usize::from(entries_total) {
        return Err(invalid(format!(
            "end of central directory lists {entries_total} entries, central directory holds {}",
            records.len()
        )));
    }
    if let Some(stray) = records.iter().find(|r| r.disk_start != disk) {
        return Err(invalid(format!(
            "entry '{}' starts on disk {}, archive has only disk {disk}",
            stray.display_name(),
            stray.disk_start
        )));
    }

    Ok(Some(Layout {
        records,
        archive_offset,
    }))
}

/// Last EOCD signature whose comment fits in the window.
fn find_eocd(win: &[u8]) -> Option<usize> {
    (0..=win.len().checked_sub(EOCD_LEN)?).rev().find(|&at| {
        le_u32(&win[at..]) == SIG_EOCD
            && at + EOCD_LEN + usize::from(le_u16(&win[at + 20..])) <= win.len()
    })
}

/// Every header must start with its signature and the last must end exactly
/// where the directory does.
fn parse_central_directory(cd: &[u8]) -> Result<Vec<CentralRecord>, CheckFailure> {
    let mut records = Vec::new();
    let mut pos = 0;

    while pos < cd.len() {
        let header = cd
            .get(pos..pos + CDFH_LEN)
            .filter(|h| le_u32(h) == SIG_CDFH)
            .ok_or_else(|| {
                invalid(format!(
                    "central directory size does not match its records (entry {})",
                    records.len() + 1
                ))
            })?;

        let name_len = usize::from(le_u16(&header[28..]));
        let extra_len = usize::from(le_u16(&header[30..]));
        let comment_len = usize::from(le_u16(&header[32..]));
        let name_start = pos + CDFH_LEN;
        let end = name_start + name_len + extra_len + comment_len;
        if end > cd.len() {
            return Err(invalid(format!(
                "central directory entry {} runs past the directory",
                records.len() + 1
            )));
        }

        records.push(CentralRecord {
            name: cd[name_start..name_start + name_len].to_vec(),
            flags: le_u16(&header[8..]),
            method: le_u16(&header[10..]),
            modified: le_u32(&header[12..]),
            crc32: le_u32(&header[16..]),
            compressed_size: le_u32(&header[20..]),
            uncompressed_size: le_u32(&header[24..]),
            disk_start: le_u16(&header[34..]),
            local_header_offset: le_u32(&header[42..]),
        });
        pos = end;
    }

    Ok(records)
}

impl Layout {
    /// Compare the local header of member `index` with its central record.
    ///
    /// Name, flags, method and modification time must match. CRC and sizes
    /// are skipped when the entry defers them to a data descriptor, and sizes
    /// are skipped when either holds the zip64 sentinel.
    pub(super) fn check_local_header(&self, file: &mut File, index: usize) -> Result<(), String> {
        let Some(central) = self.records.get(index) else {
            return Err("missing from the central directory".to_string());
        };
        if central.local_header_offset == ZIP64_U32 {
            return Ok(());
        }

        let at = self.archive_offset + u64::from(central.local_header_offset);
        let mut header = [0u8; LFH_LEN];
        file.seek(SeekFrom::Start(at))
            .and_then(|_| file.read_exact(&mut header))
            .map_err(|e| format!("cannot read local header: {e}"))?;
        if le_u32(&header) != SIG_LFH {
            return Err("local header signature is missing".to_string());
        }

        let mut name = vec![0u8; usize::from(le_u16(&header[26..]))];
        file.read_exact(&mut name)
            .map_err(|e| format!("cannot read local header name: {e}"))?;
        if name != central.name {
            return Err(format!(
                "local header name '{}' differs from the central directory",
                String::from_utf8_lossy(&name)
            ));
        }

        let flags = le_u16(&header[6..]);
        if flags != central.flags {
            return Err(format!(
                "local header flags {flags:#06x} differ from central directory flags {:#06x}",
                central.flags
            ));
        }
        if le_u16(&header[8..]) != central.method {
            return Err("compression method differs between local header and central directory".to_string());
        }
        if le_u32(&header[10..]) != central.modified {
            return Err("modification time differs between local header and central directory".to_string());
        }
        if central.uses_data_descriptor() {
            return Ok(());
        }

        let crc32 = le_u32(&header[14..]);
        if crc32 != central.crc32 {
            return Err(format!(
                "local header CRC {crc32:08x} differs from central directory CRC {:08x}",
                central.crc32
            ));
        }
        let sizes = [
            ("compressed", le_u32(&header[18..]), central.compressed_size),
            ("uncompressed", le_u32(&header[22..]), central.uncompressed_size),
        ];
        for (what, local, recorded) in sizes {
            if local != ZIP64_U32 && recorded != ZIP64_U32 && local != recorded {
                return Err(format!(
                    "local header {what} size {local} differs from central directory size {recorded}"
                ));
            }
        }
        Ok(())
    }
}

fn le_u16(b: &[u8]) -> u16 {
    u16::from_le_bytes([b[0], b[1]])
}

fn le_u32(b: &[u8]) -> u32 {
    u32::from_le_bytes([b[0], b[1], b[2], b[3]])
}

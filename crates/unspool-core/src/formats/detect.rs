//! Content-based format detection.
//!
//! Classification looks only at the first [`SNIFF_LEN`] bytes of a file.
//! File names are never trusted; [`FormatTag::advisory_from_path`] exists
//! so callers can warn when an extension disagrees with the content.

use std::fmt;
use std::fs::File;
use std::io::Read;
use std::io::Seek;
use std::io::SeekFrom;
use std::path::Path;

use tracing::warn;

/// Number of leading bytes inspected by the detector.
pub const SNIFF_LEN: usize = 512;

const ZIP_LOCAL: &[u8] = b"PK\x03\x04";
const ZIP_EMPTY: &[u8] = b"PK\x05\x06";
const ZIP_SPANNED: &[u8] = b"PK\x07\x08";
const RAR4_MAGIC: &[u8] = b"Rar!\x1a\x07\x00";
const RAR5_MAGIC: &[u8] = b"Rar!\x1a\x07\x01\x00";
const SEVENZ_MAGIC: &[u8] = &[0x37, 0x7A, 0xBC, 0xAF, 0x27, 0x1C];
const GZIP_MAGIC: &[u8] = &[0x1F, 0x8B];

const USTAR_OFFSET: usize = 257;
const USTAR_MAGIC: &[u8] = b"ustar";
const TAR_BLOCK: usize = 512;
const TAR_CHKSUM: std::ops::Range<usize> = 148..156;

/// Classification of a file's content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormatTag {
    /// ZIP container.
    Zip,
    /// RAR container (v4 or v5).
    Rar,
    /// 7z container.
    SevenZ,
    /// Uncompressed tar container.
    Tar,
    /// Gzip stream, treated as a gzip-wrapped tar container.
    TarGz,
    /// Printable text.
    PlainText,
    /// Anything else, including empty and unreadable input.
    Unknown,
}

impl FormatTag {
    /// Short lowercase name used in logs and reports.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Zip => "zip",
            Self::Rar => "rar",
            Self::SevenZ => "7z",
            Self::Tar => "tar",
            Self::TarGz => "tar.gz",
            Self::PlainText => "text",
            Self::Unknown => "unknown",
        }
    }

    /// Returns `true` for formats handled by the tar unpacker.
    pub const fn is_tar_family(self) -> bool {
        matches!(self, Self::Tar | Self::TarGz)
    }

    /// Returns `true` for multi-entry container formats.
    pub const fn is_container(self) -> bool {
        matches!(
            self,
            Self::Zip | Self::Rar | Self::SevenZ | Self::Tar | Self::TarGz
        )
    }

    /// Guesses a format from the file extension alone.
    ///
    /// The result is advisory: dispatch never acts on it.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::path::Path;
    /// use unspool_core::FormatTag;
    ///
    /// assert_eq!(
    ///     FormatTag::advisory_from_path(Path::new("dump.tar.gz")),
    ///     Some(FormatTag::TarGz)
    /// );
    /// assert_eq!(FormatTag::advisory_from_path(Path::new("README")), None);
    /// ```
    pub fn advisory_from_path(path: &Path) -> Option<Self> {
        let extension = path.extension().and_then(|e| e.to_str())?;
        match extension.to_ascii_lowercase().as_str() {
            "tar" => Some(Self::Tar),
            "gz" | "tgz" => Some(Self::TarGz),
            "zip" => Some(Self::Zip),
            "rar" => Some(Self::Rar),
            "7z" => Some(Self::SevenZ),
            "txt" | "log" | "csv" => Some(Self::PlainText),
            _ => None,
        }
    }
}

impl fmt::Display for FormatTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Classifies a byte prefix.
///
/// Pure and total: the same prefix always yields the same tag, and no input
/// is an error.
pub fn sniff(prefix: &[u8]) -> FormatTag {
    let prefix = &prefix[..prefix.len().min(SNIFF_LEN)];

    if [ZIP_LOCAL, ZIP_EMPTY, ZIP_SPANNED]
        .iter()
        .any(|magic| prefix.starts_with(magic))
    {
        return FormatTag::Zip;
    }
    if prefix.starts_with(RAR4_MAGIC) || prefix.starts_with(RAR5_MAGIC) {
        return FormatTag::Rar;
    }
    if prefix.starts_with(SEVENZ_MAGIC) {
        return FormatTag::SevenZ;
    }
    if prefix.starts_with(GZIP_MAGIC) {
        return FormatTag::TarGz;
    }
    if is_tar_header(prefix) {
        return FormatTag::Tar;
    }
    if looks_like_text(prefix) {
        return FormatTag::PlainText;
    }
    FormatTag::Unknown
}

fn is_tar_header(prefix: &[u8]) -> bool {
    if prefix
        .get(USTAR_OFFSET..USTAR_OFFSET + USTAR_MAGIC.len())
        .is_some_and(|magic| magic == USTAR_MAGIC)
    {
        return true;
    }
    // Pre-POSIX headers carry no magic; accept them when the checksum holds.
    if prefix.len() < TAR_BLOCK {
        return false;
    }
    let header = &prefix[..TAR_BLOCK];
    let Some(recorded) = parse_octal(&header[TAR_CHKSUM]) else {
        return false;
    };
    let computed: u64 = header
        .iter()
        .enumerate()
        .map(|(i, &b)| {
            if TAR_CHKSUM.contains(&i) {
                u64::from(b' ')
            } else {
                u64::from(b)
            }
        })
        .sum();
    recorded == computed
}

fn parse_octal(field: &[u8]) -> Option<u64> {
    let digits: &[u8] = {
        let start = field.iter().position(|&b| b != b' ')?;
        let rest = &field[start..];
        let end = rest
            .iter()
            .position(|&b| b == 0 || b == b' ')
            .unwrap_or(rest.len());
        &rest[..end]
    };
    if digits.is_empty() {
        return None;
    }
    digits.iter().try_fold(0u64, |acc, &b| match b {
        b'0'..=b'7' => acc.checked_mul(8)?.checked_add(u64::from(b - b'0')),
        _ => None,
    })
}

fn looks_like_text(prefix: &[u8]) -> bool {
    if prefix.is_empty() || prefix.contains(&0) {
        return false;
    }
    let text = match std::str::from_utf8(prefix) {
        Ok(text) => text,
        // A multi-byte sequence cut off by the sniff window still counts.
        Err(e) if e.error_len().is_none() && prefix.len() == SNIFF_LEN => {
            match std::str::from_utf8(&prefix[..e.valid_up_to()]) {
                Ok(text) => text,
                Err(_) => return false,
            }
        }
        Err(_) => return false,
    };
    text.chars()
        .all(|c| !c.is_control() || matches!(c, '\t' | '\n' | '\r' | '\x0c'))
}

/// Reads up to [`SNIFF_LEN`] bytes from `reader` and classifies them, then
/// seeks back to where the reader started.
pub fn detect_reader<R: Read + Seek>(reader: &mut R) -> FormatTag {
    let Ok(start) = reader.stream_position() else {
        return FormatTag::Unknown;
    };
    let tag = read_prefix(reader).map_or(FormatTag::Unknown, |prefix| sniff(&prefix));
    if reader.seek(SeekFrom::Start(start)).is_err() {
        warn!("failed to rewind reader after format detection");
    }
    tag
}

/// Opens `path` independently and classifies its leading bytes.
///
/// A file that cannot be opened or read is reported through the log and
/// classified as [`FormatTag::Unknown`].
pub fn detect_path(path: &Path) -> FormatTag {
    let prefix = File::open(path).and_then(|mut file| read_prefix(&mut file));
    match prefix {
        Ok(prefix) => sniff(&prefix),
        Err(err) => {
            warn!(path = %path.display(), error = %err, "cannot read input for detection");
            FormatTag::Unknown
        }
    }
}

fn read_prefix<R: Read>(reader: &mut R) -> std::io::Result<Vec<u8>> {
    let mut prefix = Vec::with_capacity(SNIFF_LEN);
    reader.take(SNIFF_LEN as u64).read_to_end(&mut prefix)?;
    Ok(prefix)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::test_utils::create_test_tar;
    use crate::test_utils::create_test_zip;
    use crate::test_utils::gzip_bytes;
    use std::io::Cursor;
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[test]
    fn test_sniff_zip() {
        let data = create_test_zip(vec![("a.txt", b"hi")]);
        assert_eq!(sniff(&data), FormatTag::Zip);
        assert_eq!(sniff(b"PK\x05\x06\0\0\0\0"), FormatTag::Zip);
    }

    #[test]
    fn test_sniff_rar() {
        assert_eq!(sniff(b"Rar!\x1a\x07\x00rest"), FormatTag::Rar);
        assert_eq!(sniff(b"Rar!\x1a\x07\x01\x00rest"), FormatTag::Rar);
    }

    #[test]
    fn test_sniff_7z() {
        let mut data = SEVENZ_MAGIC.to_vec();
        data.extend_from_slice(&[0, 4, 0, 0]);
        assert_eq!(sniff(&data), FormatTag::SevenZ);
    }

    #[test]
    fn test_sniff_gzip() {
        let data = gzip_bytes(&create_test_tar(vec![("a.txt", b"hi")]));
        assert_eq!(sniff(&data), FormatTag::TarGz);
    }

    #[test]
    fn test_sniff_ustar() {
        let data = create_test_tar(vec![("a.txt", b"hi")]);
        assert_eq!(sniff(&data), FormatTag::Tar);
    }

    #[test]
    fn test_sniff_v7_tar_by_checksum() {
        let mut header = tar::Header::new_old();
        header.set_path("legacy.txt").unwrap();
        header.set_size(0);
        header.set_mode(0o644);
        header.set_cksum();
        let block = header.as_bytes().to_vec();
        assert_eq!(&block[USTAR_OFFSET..USTAR_OFFSET + 5], &[0u8; 5]);
        assert_eq!(sniff(&block), FormatTag::Tar);

        let mut corrupted = block;
        corrupted[0] ^= 0x01;
        assert_eq!(sniff(&corrupted), FormatTag::Unknown);
    }

    #[test]
    fn test_sniff_plain_text() {
        assert_eq!(sniff(b"hello world\n"), FormatTag::PlainText);
        assert_eq!(sniff("héllo\tthere\r\n".as_bytes()), FormatTag::PlainText);
    }

    #[test]
    fn test_sniff_text_cut_mid_character() {
        let mut data = vec![b'a'; SNIFF_LEN - 1];
        data.extend_from_slice("é".as_bytes());
        assert_eq!(sniff(&data[..SNIFF_LEN]), FormatTag::PlainText);

        // A short file ending in a broken sequence is not text.
        assert_eq!(sniff(&[b'a', b'b', 0xC3]), FormatTag::Unknown);
    }

    #[test]
    fn test_sniff_binary_and_empty() {
        assert_eq!(sniff(b""), FormatTag::Unknown);
        assert_eq!(sniff(b"P"), FormatTag::Unknown);
        assert_eq!(sniff(&[0x7F, b'E', b'L', b'F', 2, 1, 1, 0]), FormatTag::Unknown);
        assert_eq!(sniff(b"bell\x07"), FormatTag::Unknown);
    }

    #[test]
    fn test_detect_reader_rewinds() {
        let mut cursor = Cursor::new(b"xxplain text".to_vec());
        cursor.set_position(2);
        assert_eq!(detect_reader(&mut cursor), FormatTag::PlainText);
        assert_eq!(cursor.position(), 2);
    }

    #[test]
    fn test_detect_path_ignores_extension() {
        let temp = TempDir::new().unwrap();
        let disguised = temp.path().join("holiday.jpg");
        std::fs::write(&disguised, create_test_zip(vec![("a.txt", b"hi")])).unwrap();
        assert_eq!(detect_path(&disguised), FormatTag::Zip);
    }

    #[test]
    fn test_detect_path_missing_file() {
        let path = PathBuf::from("/nonexistent/unspool/input.zip");
        assert_eq!(detect_path(&path), FormatTag::Unknown);
    }

    #[test]
    fn test_advisory_extensions() {
        assert_eq!(
            FormatTag::advisory_from_path(Path::new("a.TGZ")),
            Some(FormatTag::TarGz)
        );
        assert_eq!(
            FormatTag::advisory_from_path(Path::new("a.7z")),
            Some(FormatTag::SevenZ)
        );
        assert_eq!(
            FormatTag::advisory_from_path(Path::new("notes.txt")),
            Some(FormatTag::PlainText)
        );
        assert_eq!(FormatTag::advisory_from_path(Path::new("a.bin")), None);
    }

    #[test]
    fn test_tag_names() {
        assert_eq!(FormatTag::TarGz.to_string(), "tar.gz");
        assert!(FormatTag::Tar.is_tar_family());
        assert!(!FormatTag::Zip.is_tar_family());
        assert!(!FormatTag::PlainText.is_container());
    }
}

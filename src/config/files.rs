//! Reading config files from disk.
//!
//! Config files must be UTF-8. A UTF-8 byte order mark is stripped; UTF-16 and
//! UTF-32 marks are rejected with an error that names the encoding.

use crate::error::FileError;
use std::path::Path;

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Known byte order marks, longest first so UTF-32 LE wins over UTF-16 LE.
const UNSUPPORTED_BOMS: &[(&[u8], &str)] = &[
    (&[0x00, 0x00, 0xFE, 0xFF], "UTF-32 BE"),
    (&[0xFF, 0xFE, 0x00, 0x00], "UTF-32 LE"),
    (&[0xFE, 0xFF], "UTF-16 BE"),
    (&[0xFF, 0xFE], "UTF-16 LE"),
];

/// Read a config file as text.
pub fn read_config_file(path: &Path) -> Result<String, FileError> {
    let bytes = std::fs::read(path).map_err(|source| FileError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    decode_config_bytes(path, bytes)
}

/// Decode raw file contents, handling byte order marks.
pub fn decode_config_bytes(path: &Path, mut bytes: Vec<u8>) -> Result<String, FileError> {
    if bytes.starts_with(UTF8_BOM) {
        bytes.drain(..UTF8_BOM.len());
    } else if let Some(&(_, encoding)) = UNSUPPORTED_BOMS
        .iter()
        .find(|(bom, _)| bytes.starts_with(bom))
    {
        return Err(FileError::UnsupportedEncoding {
            path: path.to_path_buf(),
            encoding,
        });
    }
    String::from_utf8(bytes).map_err(|source| FileError::InvalidUtf8 {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_utf8_bom_is_stripped() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("wrangler.toml");
        let mut bytes = UTF8_BOM.to_vec();
        bytes.extend_from_slice(b"name = \"w\"\n");
        std::fs::write(&path, bytes).unwrap();

        assert_eq!(read_config_file(&path).unwrap(), "name = \"w\"\n");
    }

    #[test]
    fn test_utf16_and_utf32_boms_are_rejected() {
        let path = Path::new("wrangler.json");
        let cases: [(&[u8], &str); 4] = [
            (&[0xFE, 0xFF, 0x00, b'{'], "UTF-16 BE"),
            (&[0xFF, 0xFE, b'{', 0x00], "UTF-16 LE"),
            (&[0x00, 0x00, 0xFE, 0xFF], "UTF-32 BE"),
            (&[0xFF, 0xFE, 0x00, 0x00], "UTF-32 LE"),
        ];
        for (bytes, expected) in cases {
            let err = decode_config_bytes(path, bytes.to_vec()).unwrap_err();
            match err {
                FileError::UnsupportedEncoding { encoding, .. } => assert_eq!(encoding, expected),
                other => panic!("unexpected error: {other}"),
            }
        }
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let temp = TempDir::new().unwrap();
        let err = read_config_file(&temp.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, FileError::Read { .. }));
    }

    #[test]
    fn test_invalid_utf8() {
        let err = decode_config_bytes(Path::new("x.toml"), vec![b'a', 0xC3, 0x28]).unwrap_err();
        assert!(matches!(err, FileError::InvalidUtf8 { .. }));
    }
}

//! Binary header codec
//!
//! Every entry file starts with a little-endian header:
//!
//! ```text
//! i32  magic (0x20120504)
//! i64  key length, then key bytes (UTF-8)
//! i64  expire time (epoch millis)
//! i64  charset length, then charset bytes (UTF-8)
//! ```
//!
//! The payload follows immediately. Its length is never written; readers
//! derive it from the file length.

use crate::error::{CacheError, Result};
use crate::types::CacheHeader;
use std::collections::HashMap;
use std::io::{Read, Write};

/// Magic number for the current version of the entry file format
pub const CACHE_MAGIC: i32 = 0x2012_0504;

/// Decode a header. Fails on the magic before reading anything else.
pub fn decode_header<R: Read>(reader: &mut R) -> Result<CacheHeader> {
    let magic = read_i32(reader)?;
    if magic != CACHE_MAGIC {
        return Err(CacheError::CorruptHeader { found: magic });
    }

    let key = read_string(reader)?;
    let expire_time = read_i64(reader)?;
    let charset = read_string(reader)?;

    Ok(CacheHeader {
        key,
        size_bytes: 0,
        expire_time,
        charset,
    })
}

/// Encode a header. `size_bytes` is not written.
pub fn encode_header<W: Write>(header: &CacheHeader, writer: &mut W) -> Result<()> {
    write_i32(writer, CACHE_MAGIC)?;
    write_string(writer, &header.key)?;
    write_i64(writer, header.expire_time)?;
    write_string(writer, &header.charset)?;
    writer.flush()?;
    Ok(())
}

/// Number of bytes `encode_header` writes for this header
pub fn encoded_len(header: &CacheHeader) -> u64 {
    (4 + 8 + header.key.len() + 8 + 8 + header.charset.len()) as u64
}

pub fn write_i32<W: Write>(writer: &mut W, n: i32) -> Result<()> {
    writer.write_all(&n.to_le_bytes())?;
    Ok(())
}

pub fn read_i32<R: Read>(reader: &mut R) -> Result<i32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(i32::from_le_bytes(buf))
}

pub fn write_i64<W: Write>(writer: &mut W, n: i64) -> Result<()> {
    writer.write_all(&n.to_le_bytes())?;
    Ok(())
}

pub fn read_i64<R: Read>(reader: &mut R) -> Result<i64> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf)?;
    Ok(i64::from_le_bytes(buf))
}

pub fn write_string<W: Write>(writer: &mut W, s: &str) -> Result<()> {
    let bytes = s.as_bytes();
    write_i64(writer, bytes.len() as i64)?;
    writer.write_all(bytes)?;
    Ok(())
}

pub fn read_string<R: Read>(reader: &mut R) -> Result<String> {
    let len = read_i64(reader)?;
    if len < 0 {
        return Err(CacheError::InvalidLength(len));
    }

    // Bounded by `take` so a bogus length cannot force a huge allocation
    let mut bytes = Vec::new();
    reader.take(len as u64).read_to_end(&mut bytes)?;
    if (bytes.len() as u64) < len as u64 {
        return Err(CacheError::TruncatedStream);
    }

    String::from_utf8(bytes).map_err(|_| CacheError::InvalidUtf8)
}

/// Write a string map as an i32 count followed by key/value string pairs
pub fn write_string_map<W: Write>(
    writer: &mut W,
    map: Option<&HashMap<String, String>>,
) -> Result<()> {
    let Some(map) = map else {
        return write_i32(writer, 0);
    };

    write_i32(writer, map.len() as i32)?;
    for (key, value) in map {
        write_string(writer, key)?;
        write_string(writer, value)?;
    }
    Ok(())
}

pub fn read_string_map<R: Read>(reader: &mut R) -> Result<HashMap<String, String>> {
    let count = read_i32(reader)?;
    if count < 0 {
        return Err(CacheError::InvalidLength(count as i64));
    }

    let mut map = HashMap::new();
    for _ in 0..count {
        let key = read_string(reader)?;
        let value = read_string(reader)?;
        map.insert(key, value);
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn sample_header() -> CacheHeader {
        CacheHeader {
            key: "http://www.iteye.com/news/1".to_string(),
            size_bytes: 0,
            expire_time: 1_700_000_000_000,
            charset: "utf-8".to_string(),
        }
    }

    #[test]
    fn test_header_wire_layout() {
        let header = CacheHeader {
            key: "ab".to_string(),
            size_bytes: 99,
            expire_time: 0x0102030405060708,
            charset: "c".to_string(),
        };

        let mut buf = Vec::new();
        encode_header(&header, &mut buf).unwrap();

        let mut expected: Vec<u8> = vec![0x04, 0x05, 0x12, 0x20];
        expected.extend_from_slice(&[2, 0, 0, 0, 0, 0, 0, 0]);
        expected.extend_from_slice(b"ab");
        expected.extend_from_slice(&[0x08, 0x07, 0x06, 0x05, 0x04, 0x03, 0x02, 0x01]);
        expected.extend_from_slice(&[1, 0, 0, 0, 0, 0, 0, 0]);
        expected.extend_from_slice(b"c");
        assert_eq!(buf, expected);
        assert_eq!(encoded_len(&header), expected.len() as u64);
    }

    #[test]
    fn test_decode_stops_at_header_end() {
        let header = sample_header();
        let mut buf = Vec::new();
        encode_header(&header, &mut buf).unwrap();
        buf.extend_from_slice(b"<html>payload</html>");

        let mut cursor = Cursor::new(buf);
        let decoded = decode_header(&mut cursor).unwrap();
        assert_eq!(decoded.key, header.key);
        assert_eq!(decoded.expire_time, header.expire_time);
        assert_eq!(decoded.charset, header.charset);
        assert_eq!(decoded.size_bytes, 0);
        assert_eq!(cursor.position(), encoded_len(&header));
    }

    #[test]
    fn test_empty_charset() {
        let mut header = sample_header();
        header.charset = String::new();
        let mut buf = Vec::new();
        encode_header(&header, &mut buf).unwrap();

        let decoded = decode_header(&mut buf.as_slice()).unwrap();
        assert_eq!(decoded.charset, "");
    }

    #[test]
    fn test_bad_magic_is_corrupt() {
        let mut buf = Vec::new();
        write_i32(&mut buf, 0x1234_5678).unwrap();
        write_string(&mut buf, "key").unwrap();

        let err = decode_header(&mut buf.as_slice()).unwrap_err();
        assert!(matches!(err, CacheError::CorruptHeader { found: 0x1234_5678 }));
    }

    #[test]
    fn test_truncated_magic() {
        let buf = [0x04u8, 0x05];
        let err = decode_header(&mut &buf[..]).unwrap_err();
        assert!(matches!(err, CacheError::TruncatedStream));
    }

    #[test]
    fn test_truncated_string() {
        let mut buf = Vec::new();
        encode_header(&sample_header(), &mut buf).unwrap();
        buf.truncate(4 + 8 + 5);

        let err = decode_header(&mut buf.as_slice()).unwrap_err();
        assert!(matches!(err, CacheError::TruncatedStream));
    }

    #[test]
    fn test_huge_declared_length_is_truncated() {
        let mut buf = Vec::new();
        write_i32(&mut buf, CACHE_MAGIC).unwrap();
        write_i64(&mut buf, i64::MAX).unwrap();
        buf.extend_from_slice(b"short");

        let err = decode_header(&mut buf.as_slice()).unwrap_err();
        assert!(matches!(err, CacheError::TruncatedStream));
    }

    #[test]
    fn test_negative_length() {
        let mut buf = Vec::new();
        write_i32(&mut buf, CACHE_MAGIC).unwrap();
        write_i64(&mut buf, -3).unwrap();

        let err = decode_header(&mut buf.as_slice()).unwrap_err();
        assert!(matches!(err, CacheError::InvalidLength(-3)));
    }

    #[test]
    fn test_invalid_utf8() {
        let mut buf = Vec::new();
        write_i32(&mut buf, CACHE_MAGIC).unwrap();
        write_i64(&mut buf, 2).unwrap();
        buf.extend_from_slice(&[0xff, 0xfe]);

        let err = decode_header(&mut buf.as_slice()).unwrap_err();
        assert!(matches!(err, CacheError::InvalidUtf8));
    }

    #[test]
    fn test_multibyte_key_length_is_byte_count() {
        let mut buf = Vec::new();
        write_string(&mut buf, "开源中国").unwrap();
        assert_eq!(read_i64(&mut &buf[..8]).unwrap(), 12);
        assert_eq!(read_string(&mut buf.as_slice()).unwrap(), "开源中国");
    }

    #[test]
    fn test_string_map() {
        let mut map = HashMap::new();
        map.insert("Content-Type".to_string(), "text/html".to_string());
        map.insert("ETag".to_string(), "\"abc\"".to_string());

        let mut buf = Vec::new();
        write_string_map(&mut buf, Some(&map)).unwrap();
        let decoded = read_string_map(&mut buf.as_slice()).unwrap();
        assert_eq!(decoded, map);
    }

    #[test]
    fn test_missing_string_map_writes_zero_count() {
        let mut buf = Vec::new();
        write_string_map(&mut buf, None).unwrap();
        assert_eq!(buf, vec![0, 0, 0, 0]);
        assert!(read_string_map(&mut buf.as_slice()).unwrap().is_empty());
    }
}

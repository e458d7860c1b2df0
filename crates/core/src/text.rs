use std::borrow::Cow;

use chardetng::EncodingDetector;
use encoding_rs::{Encoding as RsEncoding, BIG5, GBK, SHIFT_JIS, WINDOWS_1252};

/// 無法以支援的編碼解碼。 / The bytes are not text in any supported encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UndecodableText;

/// 將磁碟位元組解碼為文字；依序嘗試 BOM、UTF-8 與偵測到的傳統編碼。 / Decodes on-disk bytes: BOMs first, then UTF-8, then a detected legacy encoding.
pub fn decode_text(bytes: &[u8]) -> Result<String, UndecodableText> {
    if let Some(rest) = bytes.strip_prefix(b"\xEF\xBB\xBF") {
        return std::str::from_utf8(rest)
            .map(str::to_owned)
            .map_err(|_| UndecodableText);
    }
    if let Some(rest) = bytes.strip_prefix(b"\xFF\xFE") {
        return decode_utf16(rest, false);
    }
    if let Some(rest) = bytes.strip_prefix(b"\xFE\xFF") {
        return decode_utf16(rest, true);
    }
    if let Ok(text) = std::str::from_utf8(bytes) {
        return Ok(text.to_owned());
    }
    match detect_legacy_encoding(bytes) {
        Some(encoding) => decode_legacy(bytes, encoding),
        None => Err(UndecodableText),
    }
}

fn decode_utf16(bytes: &[u8], big_endian: bool) -> Result<String, UndecodableText> {
    if bytes.len() % 2 != 0 {
        return Err(UndecodableText);
    }
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|chunk| {
            let pair = [chunk[0], chunk[1]];
            if big_endian {
                u16::from_be_bytes(pair)
            } else {
                u16::from_le_bytes(pair)
            }
        })
        .collect();
    String::from_utf16(&units).map_err(|_| UndecodableText)
}

fn decode_legacy(bytes: &[u8], encoding: &'static RsEncoding) -> Result<String, UndecodableText> {
    let (cow, had_errors) = encoding.decode_without_bom_handling(bytes);
    if had_errors {
        return Err(UndecodableText);
    }
    Ok(match cow {
        Cow::Borrowed(slice) => slice.to_owned(),
        Cow::Owned(string) => string,
    })
}

fn detect_legacy_encoding(bytes: &[u8]) -> Option<&'static RsEncoding> {
    if bytes.is_empty() {
        return None;
    }
    let mut detector = EncodingDetector::new();
    detector.feed(bytes, true);
    let guess = detector.guess(None, true);
    [WINDOWS_1252, SHIFT_JIS, GBK, BIG5]
        .into_iter()
        .find(|candidate| *candidate == guess)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_plain_and_bom_prefixed_utf8() {
        assert_eq!(decode_text(b"hello").unwrap(), "hello");
        assert_eq!(decode_text(b"\xEF\xBB\xBFhello").unwrap(), "hello");
    }

    #[test]
    fn decodes_utf16_with_bom() {
        let le = [0xFF, 0xFE, b'h', 0x00, b'i', 0x00];
        let be = [0xFE, 0xFF, 0x00, b'h', 0x00, b'i'];
        assert_eq!(decode_text(&le).unwrap(), "hi");
        assert_eq!(decode_text(&be).unwrap(), "hi");
    }

    #[test]
    fn decodes_detected_legacy_encodings() {
        let (gbk, _, _) = GBK.encode("中文測試");
        assert_eq!(decode_text(&gbk).unwrap(), "中文測試");

        let (sjis, _, _) = SHIFT_JIS.encode("テスト");
        assert_eq!(decode_text(&sjis).unwrap(), "テスト");
    }

    #[test]
    fn rejects_odd_length_utf16() {
        assert_eq!(decode_text(&[0xFF, 0xFE, b'h']), Err(UndecodableText));
    }
}

//! Encoding resolver: transfer decodings and charset lookup.

use std::borrow::Cow;

use base64::engine::general_purpose::STANDARD_NO_PAD;
use base64::Engine as _;
use charset::Charset;

/// Reverses a `Content-Transfer-Encoding` to recover raw bytes.
///
/// Recognized values are `base64` and `quoted-printable` (compared ignoring
/// case); any other or absent value passes the bytes through unchanged.
pub fn transfer_decode<'a>(encoding: Option<&str>, data: &'a [u8]) -> Cow<'a, [u8]> {
    let encoding = encoding.map(|e| e.trim().to_ascii_lowercase());
    match encoding.as_deref() {
        Some("base64") => Cow::Owned(decode_base64(data).unwrap_or_default()),
        Some("quoted-printable") => {
            match quoted_printable::decode(data, quoted_printable::ParseMode::Robust) {
                Ok(decoded) => Cow::Owned(decoded),
                Err(_) => Cow::Borrowed(data),
            }
        }
        _ => Cow::Borrowed(data),
    }
}

/// Decodes mail-style base64: whitespace stripped, trailing padding ignored,
/// standard alphabet.
pub fn decode_base64(data: &[u8]) -> Option<Vec<u8>> {
    let filtered: Vec<u8> = data
        .iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    let trimmed = filtered
        .strip_suffix(b"==")
        .or_else(|| filtered.strip_suffix(b"="))
        .unwrap_or(&filtered);
    STANDARD_NO_PAD.decode(trimmed).ok()
}

/// Maps a declared charset label to a decoder, if the label is known.
pub fn resolve_charset(label: &str) -> Option<Charset> {
    Charset::for_label_no_replacement(label.trim().as_bytes())
}

/// Decodes `data` as text under the given charset label.
///
/// A missing or unknown label falls back to lossy UTF-8 rather than dropping
/// the text (the upstream behavior silently lost such bodies).
pub fn decode_text(label: Option<&str>, data: &[u8]) -> String {
    match label.and_then(resolve_charset) {
        Some(charset) => charset.decode(data).0.into_owned(),
        None => String::from_utf8_lossy(data).into_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::STANDARD;

    #[test]
    fn base64_accepts_padded_and_unpadded() {
        assert_eq!(decode_base64(b"SGVsbG8=").unwrap(), b"Hello");
        assert_eq!(decode_base64(b"SGVsbG8").unwrap(), b"Hello");
    }

    #[test]
    fn base64_ignores_line_breaks() {
        let encoded = STANDARD.encode(vec![0u8; 90]);
        let mut wrapped = String::new();
        for chunk in encoded.as_bytes().chunks(76) {
            wrapped.push_str(std::str::from_utf8(chunk).unwrap());
            wrapped.push_str("\r\n");
        }
        assert_eq!(decode_base64(wrapped.as_bytes()).unwrap(), vec![0u8; 90]);
    }

    #[test]
    fn transfer_decode_quoted_printable() {
        let decoded = transfer_decode(Some("quoted-printable"), b"caf=C3=A9");
        assert_eq!(decoded.as_ref(), "café".as_bytes());
    }

    #[test]
    fn transfer_decode_unknown_passes_through() {
        let body = b"7bit body".as_slice();
        assert_eq!(transfer_decode(Some("7bit"), body).as_ref(), body);
        assert_eq!(transfer_decode(None, body).as_ref(), body);
    }

    #[test]
    fn transfer_decode_is_case_insensitive() {
        let decoded = transfer_decode(Some("Base64"), b"aGk=");
        assert_eq!(decoded.as_ref(), b"hi");
    }

    #[test]
    fn charset_labels_resolve() {
        assert!(resolve_charset("utf-8").is_some());
        assert!(resolve_charset("GBK").is_some());
        assert!(resolve_charset("no-such-charset").is_none());
    }

    #[test]
    fn decode_text_gbk() {
        // "你好" in GBK
        let bytes = [0xc4, 0xe3, 0xba, 0xc3];
        assert_eq!(decode_text(Some("gbk"), &bytes), "你好");
    }

    #[test]
    fn decode_text_falls_back_to_lossy_utf8() {
        assert_eq!(decode_text(None, "héllo".as_bytes()), "héllo");
        assert_eq!(decode_text(Some("not-a-charset"), b"plain"), "plain");
    }
}

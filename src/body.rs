//! Recursive body decomposer: walks a message's content tree, applying
//! transfer decoding, multipart splitting and charset decoding, and flattens
//! it into plain-text segments and opaque parts.

use std::borrow::Cow;

use mime::Mime;

use crate::encoding;
use crate::message::{HeaderMap, Part};

/// Nesting is sender-controlled; branches deeper than this are dropped
/// instead of recursing further.
const MAX_NESTING_DEPTH: usize = 32;

/// Decomposes one (header, body) entity into plain-text segments and opaque
/// parts, both in depth-first traversal order.
pub fn decompose(header: &HeaderMap, body: &[u8]) -> (Vec<String>, Vec<Part>) {
    let mut texts = Vec::new();
    let mut parts = Vec::new();
    walk(header, body, 0, &mut texts, &mut parts);
    (texts, parts)
}

fn walk(header: &HeaderMap, body: &[u8], depth: usize, texts: &mut Vec<String>, parts: &mut Vec<Part>) {
    if depth > MAX_NESTING_DEPTH {
        log::debug!("dropping content nested deeper than {} levels", MAX_NESTING_DEPTH);
        return;
    }

    // A missing or unparsable Content-Type terminates the branch.
    let media_type: Mime = match header.get("Content-Type").map(str::parse) {
        Some(Ok(m)) => m,
        _ => return,
    };

    let decoded: Cow<'_, [u8]> =
        encoding::transfer_decode(header.get("Content-Transfer-Encoding"), body);

    if media_type.essence_str() == "text/plain" {
        let charset = media_type.get_param(mime::CHARSET);
        texts.push(encoding::decode_text(
            charset.as_ref().map(|c| c.as_str()),
            &decoded,
        ));
    } else if media_type.type_() == mime::MULTIPART {
        let boundary = match media_type.get_param(mime::BOUNDARY) {
            Some(b) => b,
            None => return,
        };
        for segment in split_multipart(&decoded, boundary.as_str()) {
            match mailparse::parse_headers(segment) {
                Ok((headers, offset)) => {
                    let child = HeaderMap::from_mail_headers(&headers);
                    walk(&child, &segment[offset..], depth + 1, texts, parts);
                }
                // An unparsable sub-part ends enumeration at this level;
                // siblings already walked are kept.
                Err(_) => break,
            }
        }
    } else {
        parts.push(Part {
            header: header.clone(),
            data: decoded.into_owned(),
        });
    }
}

/// Splits a multipart body into its raw sub-part segments (header block plus
/// body each) per the boundary framing rule.
///
/// The CRLF preceding a delimiter line belongs to the delimiter. A missing
/// closing delimiter lets the open part run to end of input.
/// A delimiter line is `--boundary` followed by nothing, by `--` (closing),
/// or by transport padding only. A content line that merely shares the
/// prefix is not a delimiter.
fn is_delimiter_line(line: &[u8], delimiter: &[u8]) -> bool {
    match line.strip_prefix(delimiter) {
        Some(rest) => {
            rest.is_empty()
                || rest.starts_with(b"--")
                || rest.iter().all(u8::is_ascii_whitespace)
        }
        None => false,
    }
}

fn split_multipart<'a>(data: &'a [u8], boundary: &str) -> Vec<&'a [u8]> {
    let delimiter = format!("--{}", boundary).into_bytes();
    let mut segments = Vec::new();
    let mut part_start: Option<usize> = None;
    let mut pos = 0;

    while pos < data.len() {
        let line_len = data[pos..]
            .iter()
            .position(|&b| b == b'\n')
            .map(|i| i + 1)
            .unwrap_or(data.len() - pos);
        let mut line = &data[pos..pos + line_len];
        while let Some((&last, rest)) = line.split_last() {
            if last == b'\n' || last == b'\r' {
                line = rest;
            } else {
                break;
            }
        }

        if is_delimiter_line(line, &delimiter) {
            if let Some(start) = part_start.take() {
                let mut end = pos;
                if end > start && data[end - 1] == b'\n' {
                    end -= 1;
                    if end > start && data[end - 1] == b'\r' {
                        end -= 1;
                    }
                }
                segments.push(&data[start..end]);
            }
            if line[delimiter.len()..].starts_with(b"--") {
                return segments;
            }
            part_start = Some(pos + line_len);
        }
        pos += line_len;
    }

    if let Some(start) = part_start {
        segments.push(&data[start..]);
    }
    segments
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;

    fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut h = HeaderMap::new();
        for (k, v) in pairs {
            h.append(*k, *v);
        }
        h
    }

    #[test]
    fn plain_text_with_charset_yields_one_segment() {
        let h = headers(&[("Content-Type", "text/plain; charset=utf-8")]);
        let (texts, parts) = decompose(&h, "hello body".as_bytes());
        assert_eq!(texts, vec!["hello body"]);
        assert!(parts.is_empty());
    }

    #[test]
    fn missing_content_type_drops_branch() {
        let h = HeaderMap::new();
        let (texts, parts) = decompose(&h, b"orphan bytes");
        assert!(texts.is_empty());
        assert!(parts.is_empty());
    }

    #[test]
    fn missing_charset_falls_back_to_utf8() {
        let h = headers(&[("Content-Type", "text/plain")]);
        let (texts, _) = decompose(&h, "no charset declared".as_bytes());
        assert_eq!(texts, vec!["no charset declared"]);
    }

    #[test]
    fn base64_round_trips_multibyte_text() {
        let original = "你好, watch loop 多字节 text";
        let h = headers(&[
            ("Content-Type", "text/plain; charset=utf-8"),
            ("Content-Transfer-Encoding", "base64"),
        ]);
        let body = STANDARD.encode(original.as_bytes());
        let (texts, _) = decompose(&h, body.as_bytes());
        assert_eq!(texts, vec![original]);
    }

    #[test]
    fn gb2312_text_is_charset_decoded() {
        // "你好" in GBK/GB2312
        let h = headers(&[("Content-Type", "text/plain; charset=gb2312")]);
        let (texts, _) = decompose(&h, &[0xc4, 0xe3, 0xba, 0xc3]);
        assert_eq!(texts, vec!["你好"]);
    }

    #[test]
    fn non_text_leaf_becomes_part() {
        let h = headers(&[
            ("Content-Type", "application/pdf"),
            ("Content-Transfer-Encoding", "base64"),
        ]);
        let (texts, parts) = decompose(&h, STANDARD.encode([1u8, 2, 3]).as_bytes());
        assert!(texts.is_empty());
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].data, vec![1, 2, 3]);
        assert_eq!(parts[0].header.get("Content-Type"), Some("application/pdf"));
    }

    #[test]
    fn html_is_not_a_text_segment() {
        let h = headers(&[("Content-Type", "text/html; charset=utf-8")]);
        let (texts, parts) = decompose(&h, b"<p>hi</p>");
        assert!(texts.is_empty());
        assert_eq!(parts.len(), 1);
    }

    #[test]
    fn multipart_splits_text_and_attachment_in_order() {
        let body = concat!(
            "preamble to ignore\r\n",
            "--xyz\r\n",
            "Content-Type: text/plain; charset=utf-8\r\n",
            "\r\n",
            "hello body\r\n",
            "--xyz\r\n",
            "Content-Type: application/octet-stream\r\n",
            "Content-Transfer-Encoding: base64\r\n",
            "\r\n",
            "AQID\r\n",
            "--xyz--\r\n",
            "epilogue to ignore\r\n",
        );
        let h = headers(&[("Content-Type", "multipart/mixed; boundary=xyz")]);
        let (texts, parts) = decompose(&h, body.as_bytes());
        assert_eq!(texts, vec!["hello body"]);
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].data, vec![1, 2, 3]);
        assert_eq!(
            parts[0].header.get("Content-Type"),
            Some("application/octet-stream")
        );
    }

    #[test]
    fn nested_multipart_preserves_depth_first_order() {
        let inner = concat!(
            "--in\r\n",
            "Content-Type: text/plain; charset=utf-8\r\n",
            "\r\n",
            "first\r\n",
            "--in\r\n",
            "Content-Type: application/octet-stream\r\n",
            "\r\n",
            "blob\r\n",
            "--in--\r\n",
        );
        let body = format!(
            concat!(
                "--out\r\n",
                "Content-Type: multipart/alternative; boundary=in\r\n",
                "\r\n",
                "{}\r\n",
                "--out\r\n",
                "Content-Type: text/plain; charset=utf-8\r\n",
                "\r\n",
                "second\r\n",
                "--out--\r\n",
            ),
            inner
        );
        let h = headers(&[("Content-Type", "multipart/mixed; boundary=out")]);
        let (texts, parts) = decompose(&h, body.as_bytes());
        assert_eq!(texts, vec!["first", "second"]);
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].data, b"blob");
    }

    #[test]
    fn quoted_boundary_parameter() {
        let body = concat!(
            "--b=1\r\n",
            "Content-Type: text/plain; charset=utf-8\r\n",
            "\r\n",
            "quoted\r\n",
            "--b=1--\r\n",
        );
        let h = headers(&[("Content-Type", "multipart/mixed; boundary=\"b=1\"")]);
        let (texts, _) = decompose(&h, body.as_bytes());
        assert_eq!(texts, vec!["quoted"]);
    }

    #[test]
    fn content_line_sharing_boundary_prefix_is_not_a_delimiter() {
        let body = concat!(
            "--b\r\n",
            "Content-Type: text/plain; charset=utf-8\r\n",
            "\r\n",
            "first line\r\n",
            "--bogus is ordinary content\r\n",
            "last line\r\n",
            "--b--\r\n",
        );
        let h = headers(&[("Content-Type", "multipart/mixed; boundary=b")]);
        let (texts, parts) = decompose(&h, body.as_bytes());
        assert_eq!(
            texts,
            vec!["first line\r\n--bogus is ordinary content\r\nlast line"]
        );
        assert!(parts.is_empty());
    }

    #[test]
    fn inner_boundary_sharing_outer_prefix_stays_inside_its_part() {
        let body = concat!(
            "--out\r\n",
            "Content-Type: multipart/alternative; boundary=out1\r\n",
            "\r\n",
            "--out1\r\n",
            "Content-Type: text/plain; charset=utf-8\r\n",
            "\r\n",
            "inner text\r\n",
            "--out1--\r\n",
            "\r\n",
            "--out--\r\n",
        );
        let h = headers(&[("Content-Type", "multipart/mixed; boundary=out")]);
        let (texts, _) = decompose(&h, body.as_bytes());
        assert_eq!(texts, vec!["inner text"]);
    }

    #[test]
    fn delimiter_with_transport_padding_is_accepted() {
        let body = concat!(
            "--xyz \t\r\n",
            "Content-Type: text/plain; charset=utf-8\r\n",
            "\r\n",
            "padded\r\n",
            "--xyz-- \r\n",
        );
        let h = headers(&[("Content-Type", "multipart/mixed; boundary=xyz")]);
        let (texts, _) = decompose(&h, body.as_bytes());
        assert_eq!(texts, vec!["padded"]);
    }

    #[test]
    fn multipart_without_boundary_yields_nothing() {
        let h = headers(&[("Content-Type", "multipart/mixed")]);
        let (texts, parts) = decompose(&h, b"--a\r\n\r\nx\r\n--a--\r\n");
        assert!(texts.is_empty());
        assert!(parts.is_empty());
    }

    #[test]
    fn malformed_sibling_ends_enumeration_but_keeps_earlier() {
        let body = concat!(
            "--xyz\r\n",
            "Content-Type: text/plain; charset=utf-8\r\n",
            "\r\n",
            "kept\r\n",
            "--xyz\r\n",
            "this line is not a header\r\n",
            "\r\n",
            "lost\r\n",
            "--xyz\r\n",
            "Content-Type: text/plain; charset=utf-8\r\n",
            "\r\n",
            "also lost\r\n",
            "--xyz--\r\n",
        );
        let h = headers(&[("Content-Type", "multipart/mixed; boundary=xyz")]);
        let (texts, _) = decompose(&h, body.as_bytes());
        assert_eq!(texts, vec!["kept"]);
    }

    #[test]
    fn missing_closing_delimiter_runs_to_eof() {
        let body = concat!(
            "--xyz\r\n",
            "Content-Type: text/plain; charset=utf-8\r\n",
            "\r\n",
            "tail part",
        );
        let h = headers(&[("Content-Type", "multipart/mixed; boundary=xyz")]);
        let (texts, _) = decompose(&h, body.as_bytes());
        assert_eq!(texts, vec!["tail part"]);
    }

    #[test]
    fn nesting_depth_is_bounded() {
        // Build a chain of multiparts deeper than the bound, with a text leaf
        // at the bottom.
        let mut body = String::from("deep text");
        let mut header = "Content-Type: text/plain; charset=utf-8".to_string();
        for i in 0..(MAX_NESTING_DEPTH + 4) {
            let boundary = format!("b{}", i);
            let wrapped = format!(
                "--{b}\r\n{h}\r\n\r\n{inner}\r\n--{b}--\r\n",
                b = boundary,
                h = header,
                inner = body
            );
            body = wrapped;
            header = format!("Content-Type: multipart/mixed; boundary={}", boundary);
        }
        let mut top = HeaderMap::new();
        let (name, value) = header.split_once(": ").unwrap();
        top.append(name, value);
        let (texts, parts) = decompose(&top, body.as_bytes());
        assert!(texts.is_empty());
        assert!(parts.is_empty());
    }
}

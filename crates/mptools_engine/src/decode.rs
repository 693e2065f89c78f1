use chardetng::EncodingDetector;
use encoding_rs::Encoding;

/// How far into the document a `<meta charset>` declaration is looked for.
const META_PRESCAN_BYTES: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedPage {
    pub html: String,
    pub encoding: &'static str,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("page bytes are not valid {encoding}")]
    Malformed { encoding: &'static str },
}

/// Decodes page bytes to UTF-8.
///
/// Encoding precedence: byte order mark, `charset` of the Content-Type
/// header, a `<meta charset>` near the top of the document, then
/// statistical detection.
pub fn decode_page(bytes: &[u8], content_type: Option<&str>) -> Result<DecodedPage, DecodeError> {
    if let Some((encoding, _)) = Encoding::for_bom(bytes) {
        return decode_with(bytes, encoding);
    }

    let declared = content_type
        .and_then(header_charset)
        .or_else(|| meta_charset(bytes))
        .and_then(|label| Encoding::for_label(label.as_bytes()));
    if let Some(encoding) = declared {
        return decode_with(bytes, encoding);
    }

    let mut detector = EncodingDetector::new();
    detector.feed(bytes, true);
    decode_with(bytes, detector.guess(None, true))
}

fn header_charset(content_type: &str) -> Option<String> {
    content_type.split(';').find_map(|part| {
        let (key, value) = part.split_once('=')?;
        key.trim()
            .eq_ignore_ascii_case("charset")
            .then(|| value.trim().trim_matches(&['"', '\''][..]).to_string())
    })
}

fn meta_charset(bytes: &[u8]) -> Option<String> {
    let head = &bytes[..bytes.len().min(META_PRESCAN_BYTES)];
    let head = String::from_utf8_lossy(head).to_ascii_lowercase();
    let start = head.find("charset=")? + "charset=".len();
    let label: String = head[start..]
        .trim_start_matches(&['"', '\''][..])
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || matches!(*c, '-' | '_' | ':' | '.'))
        .collect();
    (!label.is_empty()).then_some(label)
}

fn decode_with(bytes: &[u8], encoding: &'static Encoding) -> Result<DecodedPage, DecodeError> {
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        return Err(DecodeError::Malformed {
            encoding: encoding.name(),
        });
    }
    Ok(DecodedPage {
        html: text.into_owned(),
        encoding: encoding.name(),
    })
}

#[cfg(test)]
mod tests {
    use super::{decode_page, header_charset, meta_charset, DecodeError};

    #[test]
    fn header_charset_wins_over_detection() {
        let bytes = b"<p>caf\xe9</p>";
        let page = decode_page(bytes, Some("text/html; charset=\"ISO-8859-1\"")).unwrap();
        assert_eq!(page.html, "<p>café</p>");
        assert_eq!(page.encoding, "windows-1252");
    }

    #[test]
    fn meta_charset_is_used_without_header() {
        let bytes = b"<html><head><meta charset=\"windows-1252\"></head><body>\xe9</body></html>";
        assert_eq!(meta_charset(bytes).as_deref(), Some("windows-1252"));
        let page = decode_page(bytes, None).unwrap();
        assert!(page.html.contains('é'));
    }

    #[test]
    fn bom_marks_utf8() {
        let page = decode_page(b"\xef\xbb\xbf<p>ok</p>", Some("text/html; charset=latin1")).unwrap();
        assert_eq!(page.encoding, "UTF-8");
        assert_eq!(page.html, "<p>ok</p>");
    }

    #[test]
    fn invalid_utf8_is_reported() {
        let err = decode_page(b"ok \xc3\x28", Some("text/html; charset=utf-8")).unwrap_err();
        assert_eq!(err, DecodeError::Malformed { encoding: "UTF-8" });
    }

    #[test]
    fn header_without_charset_yields_nothing() {
        assert_eq!(header_charset("text/html"), None);
        assert_eq!(header_charset("text/html; Charset=utf-8").as_deref(), Some("utf-8"));
    }
}

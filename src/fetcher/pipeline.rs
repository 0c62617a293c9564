use crate::fetcher::{
    errors::FetchError,
    types::{Charset, PageResponse},
};
use bytes::Bytes;
use chrono::Utc;
use encoding_rs::Encoding;
use regex::Regex;
use reqwest::{StatusCode, header::HeaderMap};
use std::sync::LazyLock;
use url::Url;

static CHARSET_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)charset\s*=\s*["']?([^"'\s;]+)"#).unwrap());

static META_CHARSET_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)<meta\s+[^>]*?charset\s*=\s*["']?([^"'\s/>]+)"#).unwrap());

static META_HTTP_EQUIV_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<meta\s+[^>]*?http-equiv\s*=\s*["']?content-type["']?[^>]*?content\s*=\s*["']?[^"'>]*?charset\s*=\s*([^"'\s;/>]+)"#).unwrap()
});

// XML prolog: <?xml version="1.0" encoding="ISO-8859-1"?>
static XML_ENCODING_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)<\?xml[^>]*?encoding\s*=\s*["']([^"']+)["']"#).unwrap());

/// How far into the body we look for in-document charset declarations.
const SNIFF_WINDOW: usize = 4096;

pub fn process_response(
    url_final: Url,
    status: StatusCode,
    headers: HeaderMap,
    body_bytes: Bytes,
    content_type: &str,
) -> Result<PageResponse, FetchError> {
    let charset = detect_charset(content_type, &body_bytes);
    let body_utf8 = decode_to_utf8(&body_bytes, &charset)?;

    Ok(PageResponse {
        url_final,
        status,
        headers,
        body_raw: body_bytes,
        body_utf8,
        charset,
        fetched_at: Utc::now(),
    })
}

/// Header first, then in-document declarations, then statistical guessing.
pub(crate) fn detect_charset(content_type: &str, body_bytes: &[u8]) -> Charset {
    if let Some(charset) = charset_from(&CHARSET_REGEX, content_type) {
        return charset;
    }

    let search_bytes = &body_bytes[..body_bytes.len().min(SNIFF_WINDOW)];
    let search_str = String::from_utf8_lossy(search_bytes);

    for regex in [&*META_CHARSET_REGEX, &*META_HTTP_EQUIV_REGEX, &*XML_ENCODING_REGEX] {
        if let Some(charset) = charset_from(regex, &search_str) {
            return charset;
        }
    }

    let mut detector = chardetng::EncodingDetector::new();
    detector.feed(search_bytes, false);
    Charset::from_encoding(detector.guess(None, true))
}

fn charset_from(regex: &Regex, haystack: &str) -> Option<Charset> {
    let label = regex.captures(haystack)?.get(1)?.as_str().to_lowercase();
    Encoding::for_label(label.as_bytes()).map(Charset::from_encoding)
}

fn decode_to_utf8(body_bytes: &[u8], charset: &Charset) -> Result<String, FetchError> {
    let encoding = charset.encoding();
    let (decoded, _encoding, had_errors) = encoding.decode(body_bytes);

    if had_errors {
        return Err(FetchError::Charset(format!(
            "Failed to decode content with encoding: {}",
            encoding.name()
        )));
    }

    Ok(decoded.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_charset_wins() {
        let body = b"<html><head><meta charset=\"iso-8859-1\"></head></html>";
        let charset = detect_charset("text/html; charset=utf-8", body);
        assert_eq!(charset, Charset::Utf8);
    }

    #[test]
    fn meta_charset_is_used_without_header() {
        let body = b"<html><head><meta charset=\"iso-8859-1\"><title>Test</title></head></html>";
        // encoding_rs maps ISO-8859-1 onto its windows-1252 superset
        assert_eq!(detect_charset("text/html", body), Charset::Windows1252);
    }

    #[test]
    fn meta_http_equiv_is_used_without_header() {
        let body = b"<html><head><meta http-equiv=\"Content-Type\" content=\"text/html; charset=windows-1252\"></head></html>";
        assert_eq!(detect_charset("text/html", body), Charset::Windows1252);
    }

    #[test]
    fn xml_prolog_encoding_is_used_for_feeds() {
        let body = b"<?xml version=\"1.0\" encoding=\"Shift_JIS\"?><rss></rss>";
        assert_eq!(detect_charset("application/rss+xml", body), Charset::ShiftJis);
    }

    #[test]
    fn decodes_windows_1252_bytes() {
        let body = b"caf\xe9";
        let decoded = decode_to_utf8(body, &Charset::Windows1252).unwrap();
        assert_eq!(decoded, "café");
    }

    #[test]
    fn invalid_utf8_is_a_charset_error() {
        let body = b"broken \xff\xfd bytes";
        let err = decode_to_utf8(body, &Charset::Utf8).unwrap_err();
        assert!(matches!(err, FetchError::Charset(_)));
    }
}

//! Attachment name from a `Content-Disposition` response header.

/// Extracts the attachment name from a raw `Content-Disposition` value.
///
/// Handles `filename="quoted"`, `filename=token` and RFC 5987
/// `filename*=UTF-8''percent%20encoded`; the extended form wins when both are
/// present. Path components are stripped, since only the last one names the file.
pub fn parse_content_disposition_filename(header_value: &str) -> Option<String> {
    let mut plain: Option<String> = None;
    let mut extended: Option<String> = None;

    for param in header_value.split(';') {
        let Some((key, value)) = param.trim().split_once('=') else {
            continue;
        };
        let key = key.trim();
        let value = value.trim();
        if key.eq_ignore_ascii_case("filename*") {
            let encoded = value
                .split_once("''")
                .filter(|(charset, _)| charset.eq_ignore_ascii_case("utf-8"))
                .map(|(_, rest)| rest);
            if let Some(rest) = encoded {
                extended = Some(percent_decode(rest.trim_matches('"')));
            }
        } else if key.eq_ignore_ascii_case("filename") {
            plain = Some(unquote(value));
        }
    }

    extended
        .into_iter()
        .chain(plain)
        .map(|name| last_component(&name).to_string())
        .find(|name| !name.is_empty())
}

fn unquote(value: &str) -> String {
    let Some(inner) = value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
    else {
        return value.to_string();
    };
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        match (c, chars.clone().next()) {
            ('\\', Some(next @ ('"' | '\\'))) => {
                out.push(next);
                chars.next();
            }
            _ => out.push(c),
        }
    }
    out
}

fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let high = bytes.get(i + 1).and_then(hex_value);
            let low = bytes.get(i + 2).and_then(hex_value);
            if let (Some(h), Some(l)) = (high, low) {
                out.push(h << 4 | l);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn hex_value(b: &u8) -> Option<u8> {
    (*b as char).to_digit(16).map(|d| d as u8)
}

fn last_component(name: &str) -> &str {
    name.rsplit(['/', '\\']).next().unwrap_or(name)
}

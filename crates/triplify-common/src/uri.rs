//! Encoding of arbitrary identifiers into RDF-safe URIs.
//!
//! Source-file cell values become URI local parts. Percent-encoding alone
//! is not enough: several characters legal in URLs are illegal in SPARQL
//! prefixed names, so they get private escape sequences that survive a
//! round trip.

/// Escape sequences applied after percent-encoding, in this order.
const SUBSTITUTIONS: &[(&str, &str)] = &[
    ("'", "_qu_"),
    (".", "_d_"),
    ("-", "_t_"),
    (":", "_s1_"),
    ("/", "_s2_"),
    ("%", "_s3_"),
];

/// Encode a raw value into an RDF-safe local name.
pub fn encode(value: &str) -> String {
    let mut out = urlencoding::encode(value).into_owned();
    for (from, to) in SUBSTITUTIONS {
        out = out.replace(from, to);
    }
    out
}

/// Reverse [`encode`].
pub fn decode(value: &str) -> String {
    let mut out = value.to_string();
    // Substitutions are reversed before percent-decoding, so the '%' of
    // _s3_ is restored in time to take part in the decode.
    for (from, to) in SUBSTITUTIONS.iter().rev() {
        out = out.replace(to, from);
    }
    urlencoding::decode(&out)
        .map(|c| c.into_owned())
        .unwrap_or(out)
}

/// Turn a value into a term usable in Turtle or SPARQL text.
///
/// Already-bracketed IRIs pass through unchanged. A value containing a
/// colon keeps its prefix and gets an encoded local part. Otherwise the
/// value is encoded under `prefix` (the empty prefix when `None`).
pub fn encode_to_rdf_uri(value: &str, prefix: Option<&str>) -> String {
    if value.starts_with('<') && value.ends_with('>') {
        return value.to_string();
    }

    if let Some(idx) = value.find(':') {
        let (head, tail) = value.split_at(idx + 1);
        return format!("{}{}", head, encode(tail));
    }

    let (head, tail) = match prefix.map(str::trim) {
        Some(p) if p.ends_with(':') => (p.to_string(), String::new()),
        Some(p) if p.starts_with('<') && p.ends_with('>') => {
            (p[..p.len() - 1].to_string(), ">".to_string())
        }
        Some(p) if !p.is_empty() => (format!("<{}", p), ">".to_string()),
        _ => (":".to_string(), String::new()),
    };
    format!("{}{}{}", head, encode(value), tail)
}

/// Reverse [`encode_to_rdf_uri`], stripping brackets, prefixes and the
/// optional base URI.
pub fn decode_from_rdf_uri(value: &str, base: &str) -> String {
    let mut out = value.trim().to_string();

    if out.starts_with('<') && out.ends_with('>') {
        out = out[1..out.len() - 1].to_string();
        if !base.is_empty() {
            out = out.replace(base, "");
        }
    }

    if let Some(idx) = out.find(':') {
        out = out[idx + 1..].to_string();
    }

    decode(&out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_escapes_prefixed_name_hostile_chars() {
        // '.' and '-' survive percent-encoding and get their own escapes;
        // ':' and '/' arrive percent-encoded and are covered by '%'.
        assert_eq!(encode("a.b-c:d/e"), "a_d_b_t_c_s3_3Ad_s3_2Fe");
    }

    #[test]
    fn encode_percent_encodes_then_escapes_percent() {
        // ' ' becomes %20, whose '%' is then escaped.
        assert_eq!(encode("a b"), "a_s3_20b");
    }

    #[test]
    fn round_trip() {
        for value in ["gene-1.2", "AT3G52430", "chr1:100/+", "l'été 2024"] {
            assert_eq!(decode(&encode(value)), value);
        }
    }

    #[test]
    fn bracketed_iri_passes_through() {
        assert_eq!(
            encode_to_rdf_uri("<http://example.org/x>", None),
            "<http://example.org/x>"
        );
    }

    #[test]
    fn prefixed_value_keeps_its_prefix() {
        assert_eq!(encode_to_rdf_uri("go:1234-5", None), "go:1234_t_5");
    }

    #[test]
    fn bare_value_uses_default_prefix() {
        assert_eq!(encode_to_rdf_uri("Gene1", None), ":Gene1");
    }

    #[test]
    fn bare_value_under_full_uri_prefix() {
        assert_eq!(
            encode_to_rdf_uri("Gene1", Some("http://example.org/")),
            "<http://example.org/Gene1>"
        );
    }

    #[test]
    fn decode_from_rdf_uri_strips_base() {
        assert_eq!(
            decode_from_rdf_uri("<http://example.org/Gene_t_1>", "http://example.org/"),
            "Gene-1"
        );
    }
}

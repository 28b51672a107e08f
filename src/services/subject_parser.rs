// src/services/subject_parser.rs
//! `key=value; key=value` grammar for email subject lines.
//!
//! Parsing is lenient: malformed segments are dropped and absent keys read as
//! the empty string. Callers treat `""` as "not disclosed".

use std::collections::BTreeMap;

/// Keys understood by the offer and domain flows; anything else is ignored.
pub const KNOWN_KEYS: [&str; 6] = ["offer", "currency", "company", "organization", "role", "email"];

/// Removes the leading `.` (plus whitespace) some transports add when a line starts with a dot.
fn strip_dot_stuffing(line: &str) -> &str {
    match line.strip_prefix('.') {
        Some(rest) => rest.trim_start(),
        None => line,
    }
}

/// Normalized attributes extracted from one subject line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedSubject {
    fields: BTreeMap<String, String>,
}

impl ParsedSubject {
    /// Value for `key`, or `""` when absent.
    pub fn get(&self, key: &str) -> &str {
        self.fields.get(key).map(String::as_str).unwrap_or("")
    }

    pub fn offer(&self) -> &str {
        self.get("offer")
    }

    pub fn currency(&self) -> &str {
        self.get("currency")
    }

    pub fn company(&self) -> &str {
        self.get("company")
    }

    /// Claimed organization: `organization`, falling back to `company`.
    pub fn organization_claim(&self) -> &str {
        match self.get("organization") {
            "" => self.company(),
            claim => claim,
        }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn fields(&self) -> &BTreeMap<String, String> {
        &self.fields
    }
}

/// Parses a subject line. Never fails.
///
/// Segments without `=`, with an empty key, or with an empty value are
/// dropped. Keys are lower-cased; a repeated key keeps its last value.
pub fn parse_subject(subject: &str) -> ParsedSubject {
    let line = subject.lines().next().unwrap_or("");
    let cleaned = strip_dot_stuffing(line);

    let mut fields = BTreeMap::new();
    for segment in cleaned.split(';') {
        let Some((key, value)) = segment.split_once('=') else {
            continue;
        };
        let key = key.trim().to_lowercase();
        let value = value.trim();
        if key.is_empty() || value.is_empty() || !KNOWN_KEYS.contains(&key.as_str()) {
            continue;
        }
        fields.insert(key, value.to_string());
    }
    ParsedSubject { fields }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_offer_subject() {
        let parsed = parse_subject("offer=1000000; currency=USD; company=Acme");
        assert_eq!(parsed.offer(), "1000000");
        assert_eq!(parsed.currency(), "USD");
        assert_eq!(parsed.company(), "Acme");
        assert_eq!(parsed.len(), 3);
    }

    #[test]
    fn strips_dot_stuffing_prefix() {
        let parsed = parse_subject(". organization=Acme; role=eng; email=user@acme.com");
        assert_eq!(parsed.get("organization"), "Acme");
        assert_eq!(parsed.get("role"), "eng");
        assert_eq!(parsed.get("email"), "user@acme.com");
        assert_eq!(parsed.len(), 3);
    }

    #[test]
    fn malformed_segments_are_dropped() {
        let parsed = parse_subject("hello; offer=5;=x; currency=; COMPANY = Acme ;junk");
        assert_eq!(parsed.offer(), "5");
        assert_eq!(parsed.currency(), "");
        assert_eq!(parsed.company(), "Acme");
        assert_eq!(parsed.len(), 2);
    }

    #[test]
    fn splits_on_first_equals_only() {
        let parsed = parse_subject("email=a=b@acme.com");
        assert_eq!(parsed.get("email"), "a=b@acme.com");
    }

    #[test]
    fn unknown_keys_and_empty_input() {
        assert!(parse_subject("salary=1; bonus=2").is_empty());
        assert!(parse_subject("").is_empty());
        assert_eq!(parse_subject("").get("offer"), "");
    }

    #[test]
    fn organization_falls_back_to_company() {
        assert_eq!(parse_subject("company=Acme").organization_claim(), "Acme");
        let parsed = parse_subject("company=Acme; organization=AcmeCorp");
        assert_eq!(parsed.organization_claim(), "AcmeCorp");
        assert_eq!(parse_subject("offer=1").organization_claim(), "");
    }
}

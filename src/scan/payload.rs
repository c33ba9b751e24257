use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

use crate::scan::card_input::{self, KeyEvent};

// NFC Forum URI RTD identifier codes 0x00..=0x23
const URI_PREFIXES: [&str; 36] = [
    "",
    "http://www.",
    "https://www.",
    "http://",
    "https://",
    "tel:",
    "mailto:",
    "ftp://anonymous:anonymous@",
    "ftp://ftp.",
    "ftps://",
    "sftp://",
    "smb://",
    "nfs://",
    "ftp://",
    "dav://",
    "news:",
    "telnet://",
    "imap:",
    "rtsp://",
    "urn:",
    "pop:",
    "sip:",
    "sips:",
    "tftp:",
    "btspp://",
    "btl2cap://",
    "btgoep://",
    "tcpobex://",
    "irdaobex://",
    "file://",
    "urn:epc:id:",
    "urn:epc:tag:",
    "urn:epc:pat:",
    "urn:epc:raw:",
    "urn:epc:",
    "urn:nfc:",
];

static ID_QUERY_PARAM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[?&](?:id|studentId|teacherId|card)=([^&#]+)").expect("valid query pattern")
});

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RecordData {
    Text(String),
    Bytes(Vec<u8>),
}

/// One NDEF record as delivered by Web NFC, or a raw well-known record.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NdefRecord {
    pub record_type: String,
    pub data: Option<RecordData>,
}

impl NdefRecord {
    fn is_url(&self) -> bool {
        matches!(self.record_type.as_str(), "url" | "absolute-url" | "U")
    }

    fn is_text(&self) -> bool {
        matches!(self.record_type.as_str(), "text" | "T")
    }

    /// Decoded payload text. Raw `U`/`T` records are unpacked per the NFC
    /// Forum RTD; Web NFC records already carry plain text.
    pub fn decode(&self) -> Option<String> {
        let text = match (&self.data, self.record_type.as_str()) {
            (Some(RecordData::Text(s)), _) => s.clone(),
            (Some(RecordData::Bytes(bytes)), "U") => {
                let (code, rest) = bytes.split_first()?;
                let prefix = URI_PREFIXES.get(*code as usize).copied().unwrap_or("");
                format!("{}{}", prefix, String::from_utf8_lossy(rest))
            }
            (Some(RecordData::Bytes(bytes)), "T") => {
                let (status, rest) = bytes.split_first()?;
                let lang_len = (*status & 0x3f) as usize;
                String::from_utf8_lossy(rest.get(lang_len..)?).into_owned()
            }
            (Some(RecordData::Bytes(bytes)), _) => String::from_utf8_lossy(bytes).into_owned(),
            (None, _) => return None,
        };
        let text = text.trim_matches(char::from(0)).trim().to_string();
        if text.is_empty() { None } else { Some(text) }
    }
}

/// Everything a scanner may send when it is not a bare string.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanObject {
    pub records: Option<Vec<NdefRecord>>,
    pub message: Option<NdefMessage>,
    pub keystrokes: Option<Vec<KeyEvent>>,
    pub id: Option<Value>,
    pub serial_number: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NdefMessage {
    pub records: Vec<NdefRecord>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ScanPayload {
    Text(String),
    Number(u64),
    Object(ScanObject),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateSource {
    UrlRecord,
    TextRecord,
    RawString,
    Keystrokes,
    ObjectId,
    SerialNumber,
}

impl CandidateSource {
    /// Provenance tag stored on the attendance record.
    pub fn method(self) -> &'static str {
        match self {
            CandidateSource::UrlRecord => "url",
            _ => "nfc_card_number",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub value: String,
    pub source: CandidateSource,
}

impl Candidate {
    fn new(value: impl Into<String>, source: CandidateSource) -> Self {
        Self {
            value: value.into(),
            source,
        }
    }
}

/// Pulls the person identifier out of a URL: an id-like query parameter,
/// otherwise the last path segment.
pub fn identifier_from_url(url: &str) -> Option<String> {
    if let Some(caps) = ID_QUERY_PARAM.captures(url) {
        return Some(caps[1].to_string());
    }
    let without_query = url.split(['?', '#']).next().unwrap_or(url);
    let path = match without_query.split_once("://") {
        Some((_, rest)) => rest.split_once('/').map(|(_, path)| path).unwrap_or(""),
        None => without_query,
    };
    path.rsplit('/')
        .find(|segment| !segment.is_empty())
        .map(str::to_string)
}

impl ScanPayload {
    pub fn from_value(value: &Value) -> Option<Self> {
        serde_json::from_value(value.clone()).ok()
    }

    /// Best identifier candidate: URL record, text record, raw string,
    /// replayed keystrokes, object id, then serial number.
    pub fn candidate(&self) -> Option<Candidate> {
        match self {
            ScanPayload::Text(raw) => {
                let value = raw.trim();
                (!value.is_empty()).then(|| Candidate::new(value, CandidateSource::RawString))
            }
            ScanPayload::Number(n) => Some(Candidate::new(n.to_string(), CandidateSource::RawString)),
            ScanPayload::Object(obj) => obj.candidate(),
        }
    }
}

impl ScanObject {
    fn records(&self) -> impl Iterator<Item = &NdefRecord> {
        self.records
            .iter()
            .flatten()
            .chain(self.message.iter().flat_map(|m| m.records.iter()))
    }

    fn candidate(&self) -> Option<Candidate> {
        let from_url = self
            .records()
            .filter(|r| r.is_url())
            .filter_map(|r| r.decode())
            .find_map(|url| identifier_from_url(&url))
            .map(|id| Candidate::new(id, CandidateSource::UrlRecord));

        from_url
            .or_else(|| {
                self.records()
                    .filter(|r| r.is_text())
                    .find_map(|r| r.decode())
                    .map(|text| Candidate::new(text, CandidateSource::TextRecord))
            })
            .or_else(|| {
                let events = self.keystrokes.as_deref()?;
                card_input::replay(events)
                    .pop()
                    .map(|read| Candidate::new(read, CandidateSource::Keystrokes))
            })
            .or_else(|| {
                let id = match self.id.as_ref()? {
                    Value::String(s) => s.trim().to_string(),
                    Value::Number(n) => n.to_string(),
                    _ => return None,
                };
                (!id.is_empty()).then(|| Candidate::new(id, CandidateSource::ObjectId))
            })
            .or_else(|| {
                let serial = self.serial_number.as_deref()?.trim();
                (!serial.is_empty()).then(|| Candidate::new(serial, CandidateSource::SerialNumber))
            })
    }
}

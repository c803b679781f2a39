//! Body reconstruction: turns the heterogeneous wire representations a
//! capture event may carry into one canonical text form.

use url::form_urlencoded;

/// One field of a structured form payload. Values are raw bytes as captured;
/// multi-valued fields keep their submission order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormField {
    pub name: String,
    pub values: Vec<Vec<u8>>,
}

impl FormField {
    pub fn new(name: impl Into<String>, values: Vec<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }
}

/// One segment of a raw (unstructured) request body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawSegment {
    Bytes(Vec<u8>),
    /// Reference to a file on the submitting machine. The file is never
    /// read; reconstruction renders a placeholder naming it.
    File(String),
}

/// Re-encodes structured form data as canonical
/// `application/x-www-form-urlencoded` text. Byte values are decoded as
/// UTF-8 with replacement, a documented lossy step for binary fields.
pub fn from_form_fields(fields: &[FormField]) -> String {
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for field in fields {
        for value in &field.values {
            serializer.append_pair(&field.name, &String::from_utf8_lossy(value));
        }
    }
    serializer.finish()
}

/// Concatenates raw segments in order. Inline bytes are decoded lossily;
/// file references become `[Content of 'NAME']`.
pub fn from_raw_segments(segments: &[RawSegment]) -> String {
    segments
        .iter()
        .map(|segment| match segment {
            RawSegment::Bytes(bytes) => String::from_utf8_lossy(bytes).into_owned(),
            RawSegment::File(name) => format!("[Content of '{}']", name),
        })
        .collect()
}

/// Parses url-encoded text back into ordered form fields, preserving
/// duplicate keys as separate fields in encounter order.
pub fn parse_form_fields(data: &[u8]) -> Vec<FormField> {
    let mut fields: Vec<FormField> = Vec::new();
    for (name, value) in form_urlencoded::parse(data) {
        match fields.iter_mut().find(|f| f.name == name) {
            Some(field) => field.values.push(value.as_bytes().to_vec()),
            None => fields.push(FormField::new(name.into_owned(), vec![value.as_bytes().to_vec()])),
        }
    }
    fields
}

use once_cell::sync::Lazy;

/// Closed set of body encodings the editor understands.
///
/// Each codec carries a canonical form name (what the edit panel shows and
/// what snapshots record in `body.enctype`) and a canonical wire
/// content-type. For the short-named codecs the two differ, which is the
/// signal that a replayed request needs its `content-type` header rewritten
/// by the rule engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyCodec {
    UrlEncoded,
    Multipart,
    PlainText,
    Json,
    Xml,
}

impl BodyCodec {
    pub fn name(&self) -> &'static str {
        match self {
            Self::UrlEncoded => "application/x-www-form-urlencoded",
            Self::Multipart => "multipart/form-data",
            Self::PlainText => "text/plain",
            Self::Json => "json",
            Self::Xml => "xml",
        }
    }

    pub fn wire_type(&self) -> &'static str {
        match self {
            Self::UrlEncoded => "application/x-www-form-urlencoded",
            Self::Multipart => "multipart/form-data",
            Self::PlainText => "text/plain",
            Self::Json => "application/json",
            Self::Xml => "application/xml",
        }
    }

    /// Wire content-types this codec accepts, beyond its canonical one.
    /// `normalized` must already be lowercased with parameters stripped.
    pub fn matches_wire_type(&self, normalized: &str) -> bool {
        match self {
            Self::UrlEncoded => normalized == "application/x-www-form-urlencoded",
            Self::Multipart => normalized.starts_with("multipart/"),
            Self::PlainText => normalized == "text/plain",
            Self::Json => {
                normalized == "application/json"
                    || normalized == "text/json"
                    || normalized.ends_with("+json")
            }
            Self::Xml => {
                normalized == "application/xml"
                    || normalized == "text/xml"
                    || normalized.ends_with("+xml")
            }
        }
    }

    pub fn is_default(&self) -> bool {
        matches!(self, Self::UrlEncoded)
    }

    /// Whether replaying a body declared with this codec requires a
    /// synthetic `content-type` header rewrite.
    pub fn needs_content_type_rewrite(&self) -> bool {
        self.name() != self.wire_type()
    }
}

/// Fixed, ordered codec set built once at startup. Lookup by wire type is a
/// first-match scan in registration order.
pub struct CodecRegistry {
    codecs: Vec<BodyCodec>,
}

impl CodecRegistry {
    pub fn new() -> Self {
        let codecs = vec![
            BodyCodec::UrlEncoded,
            BodyCodec::Multipart,
            BodyCodec::PlainText,
            BodyCodec::Json,
            BodyCodec::Xml,
        ];
        debug_assert_eq!(codecs.iter().filter(|c| c.is_default()).count(), 1);
        Self { codecs }
    }

    pub fn codecs(&self) -> &[BodyCodec] {
        &self.codecs
    }

    pub fn find(&self, name: &str) -> Option<&BodyCodec> {
        self.codecs
            .iter()
            .find(|c| c.name().eq_ignore_ascii_case(name))
    }

    pub fn find_by_wire_type(&self, raw: &str) -> Option<&BodyCodec> {
        let normalized = normalize_content_type(raw);
        self.codecs
            .iter()
            .find(|c| c.matches_wire_type(&normalized))
    }

    /// Like [`find_by_wire_type`](Self::find_by_wire_type) but never fails:
    /// unknown incoming content-types resolve to the default codec so
    /// capture is never aborted by an exotic type.
    pub fn resolve_wire_type(&self, raw: &str) -> &BodyCodec {
        self.find_by_wire_type(raw)
            .unwrap_or_else(|| self.default_codec())
    }

    pub fn default_codec(&self) -> &BodyCodec {
        self.codecs
            .iter()
            .find(|c| c.is_default())
            .unwrap_or(&self.codecs[0])
    }

    pub fn default_name(&self) -> &'static str {
        self.default_codec().name()
    }
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::new()
    }
}

static REGISTRY: Lazy<CodecRegistry> = Lazy::new(CodecRegistry::new);

pub fn registry() -> &'static CodecRegistry {
    &REGISTRY
}

/// Lowercase and strip parameters: `Application/JSON; charset=utf-8` →
/// `application/json`.
pub fn normalize_content_type(raw: &str) -> String {
    raw.split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

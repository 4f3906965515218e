//! JSON Pointer (RFC 6901) and reference URI handling

use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

/// A decoded JSON Pointer
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JsonPointer {
    segments: Vec<String>,
}

impl JsonPointer {
    pub fn root() -> Self {
        Self::default()
    }

    /// Parse a pointer such as `/definitions/a~1b`. The empty string is the root.
    pub fn parse(text: &str) -> Option<Self> {
        if text.is_empty() {
            return Some(Self::root());
        }
        let rest = text.strip_prefix('/')?;
        let segments = rest
            .split('/')
            .map(|s| s.replace("~1", "/").replace("~0", "~"))
            .collect();
        Some(Self { segments })
    }

    pub fn from_segments(segments: &[String]) -> Self {
        Self {
            segments: segments.to_vec(),
        }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment.into());
        Self { segments }
    }

    pub fn child_index(&self, index: usize) -> Self {
        self.child(index.to_string())
    }

    /// Fragment form, e.g. `#/properties/name`
    pub fn to_fragment(&self) -> String {
        format!("#{}", self)
    }
}

impl fmt::Display for JsonPointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.segments {
            write!(f, "/{}", segment.replace('~', "~0").replace('/', "~1"))?;
        }
        Ok(())
    }
}

/// Decoded `$ref` fragment
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Fragment {
    Pointer(JsonPointer),
    /// Plain-name fragment (`#foo`), addressing an anchor
    Anchor(String),
}

/// Absolute target of a reference: document URI (no fragment) plus fragment
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReferenceTarget {
    pub document: Url,
    pub fragment: Fragment,
}

impl ReferenceTarget {
    /// Join `reference` against `base` and split off the fragment
    pub fn parse(base: &Url, reference: &str) -> Result<Self, String> {
        let absolute = base.join(reference).map_err(|e| e.to_string())?;
        let raw_fragment = absolute.fragment().map(percent_decode).unwrap_or_default();

        let fragment = if raw_fragment.is_empty() || raw_fragment.starts_with('/') {
            let pointer = JsonPointer::parse(&raw_fragment)
                .ok_or_else(|| format!("invalid JSON pointer '{}'", raw_fragment))?;
            Fragment::Pointer(pointer)
        } else {
            Fragment::Anchor(raw_fragment)
        };

        Ok(Self {
            document: without_fragment(&absolute),
            fragment,
        })
    }

    /// Canonical string used as the memo key
    pub fn key(&self) -> String {
        match &self.fragment {
            Fragment::Pointer(p) => format!("{}#{}", self.document, p),
            Fragment::Anchor(a) => format!("{}#{}", self.document, a),
        }
    }
}

/// Copy of `url` with the fragment removed
pub fn without_fragment(url: &Url) -> Url {
    let mut out = url.clone();
    out.set_fragment(None);
    out
}

fn percent_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hi = (bytes[i + 1] as char).to_digit(16);
            let lo = (bytes[i + 2] as char).to_digit(16);
            if let (Some(hi), Some(lo)) = (hi, lo) {
                out.push((hi * 16 + lo) as u8);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

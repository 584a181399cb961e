//! Identity extraction from verified transcripts
//!
//! Extraction is a capability, not a parser baked into allocation: the
//! transcript format depends on which plugin produced the proof, so the
//! strategy stays swappable behind `IdentityExtractor`.

use regex::Regex;

use crate::domain::{Identity, Transcript};

/// Extracts the proven identity from a verified transcript.
///
/// Returning `None` means the identity is unresolved and no allocation
/// may be attempted for this transcript.
pub trait IdentityExtractor: Send + Sync {
    fn extract(&self, transcript: &Transcript) -> Option<Identity>;
}

/// Matches a `"screen_name":"<value>"` field in the received data.
pub struct ScreenNameExtractor {
    pattern: Regex,
}

impl ScreenNameExtractor {
    pub fn new() -> Self {
        Self {
            pattern: Regex::new(r#""screen_name"\s*:\s*"([^"]+)""#)
                .expect("screen name pattern is valid"),
        }
    }
}

impl Default for ScreenNameExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentityExtractor for ScreenNameExtractor {
    fn extract(&self, transcript: &Transcript) -> Option<Identity> {
        self.pattern
            .captures(&transcript.recv)
            .and_then(|captures| captures.get(1))
            .map(|m| Identity::from(m.as_str()))
    }
}

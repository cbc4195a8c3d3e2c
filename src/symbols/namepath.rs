//! Name-path query grammar: `A/B/c` selects symbol `c` nested under `B`
//! nested under `A`. Each segment may be a literal (substring match against
//! the symbol's own name), a `*` wildcard (matches any single segment), or
//! a `re:<pattern>` regex segment.

use lsp_types::SymbolKind;
use regex::Regex;

use crate::error::ToolError;

/// A single segment of a name-path pattern.
#[derive(Debug, Clone)]
enum Segment {
    Literal(String),
    Wildcard,
    Regex(Regex),
}

impl Segment {
    fn parse(raw: &str) -> Result<Self, ToolError> {
        if raw == "*" {
            Ok(Segment::Wildcard)
        } else if let Some(body) = raw.strip_prefix("re:") {
            let re = Regex::new(body)
                .map_err(|e| ToolError::InvalidArguments(format!("invalid regex segment '{body}': {e}")))?;
            Ok(Segment::Regex(re))
        } else {
            Ok(Segment::Literal(raw.to_string()))
        }
    }

    /// Matches this segment against `actual`. A literal segment matches
    /// exactly unless `substring_matching` is set, in which case it matches
    /// if `actual` contains it; wildcard and regex segments are unaffected.
    fn matches(&self, actual: &str, substring_matching: bool) -> bool {
        match self {
            Segment::Literal(lit) => {
                if substring_matching {
                    actual.contains(lit.as_str())
                } else {
                    actual == lit.as_str()
                }
            }
            Segment::Wildcard => true,
            Segment::Regex(re) => re.is_match(actual),
        }
    }
}

/// A parsed name-path pattern, e.g. from `"Foo/bar"` or `"*/re:^on_.*$"`.
#[derive(Debug, Clone)]
pub struct Pattern {
    raw: String,
    segments: Vec<Segment>,
}

impl Pattern {
    /// Parses a `/`-separated name-path pattern.
    ///
    /// ## Errors
    /// Returns [`ToolError::InvalidArguments`] if a `re:` segment's regex is
    /// malformed, or if `raw` is empty.
    pub fn parse(raw: &str) -> Result<Self, ToolError> {
        if raw.is_empty() {
            return Err(ToolError::InvalidArguments(
                "name path pattern must not be empty".to_string(),
            ));
        }
        let segments = raw
            .split('/')
            .map(Segment::parse)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    /// The original pattern string this was parsed from, for error messages.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.raw
    }

    /// Returns true if this pattern matches a contiguous suffix of
    /// `symbol_path` (so a two-segment pattern `"B/c"` matches a symbol
    /// whose full path is `["A", "B", "c"]`). Literal segments match
    /// exactly unless `substring_matching` is set.
    #[must_use]
    pub fn matches(&self, symbol_path: &[String], substring_matching: bool) -> bool {
        if self.segments.len() > symbol_path.len() {
            return false;
        }
        let start = symbol_path.len() - self.segments.len();
        symbol_path[start..]
            .iter()
            .zip(self.segments.iter())
            .all(|(actual, seg)| seg.matches(actual, substring_matching))
    }
}

/// Returns true if `kinds` is absent (no filter) or contains `kind`. Only
/// ever applied to the terminal (leaf) segment of a name-path match.
#[must_use]
pub fn matches_kinds(kinds: Option<&[SymbolKind]>, kind: SymbolKind) -> bool {
    kinds.is_none_or(|ks| ks.contains(&kind))
}

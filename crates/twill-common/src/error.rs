//! Shared error surface for the identifier grammars.

use smol_str::SmolStr;
use std::sync::Arc;

/// Parsing error for atproto string identifier types.
///
/// `spec` is the final url path segment on atproto.com/specs, detailing the
/// specification for the type. `input` is the offending source string.
#[derive(Debug, Clone, thiserror::Error, miette::Diagnostic)]
#[error("invalid {spec} `{input}`: {kind}")]
#[diagnostic(url("https://atproto.com/specs/{spec}"))]
pub struct AtStrError {
    /// Identifier family (e.g. `did`, `nsid`, `at-uri-scheme`).
    pub spec: SmolStr,
    /// The string that failed to parse.
    pub input: String,
    /// What went wrong.
    #[source]
    #[diagnostic_source]
    pub kind: StrParseKind,
}

impl AtStrError {
    /// Generic constructor.
    pub fn new(spec: &'static str, input: &str, kind: StrParseKind) -> Self {
        Self {
            spec: SmolStr::new_static(spec),
            input: input.to_string(),
            kind,
        }
    }

    /// Length cap exceeded.
    pub fn too_long(spec: &'static str, input: &str, max: usize, actual: usize) -> Self {
        Self::new(spec, input, StrParseKind::TooLong { max, actual })
    }

    /// Not enough dot- or colon-separated segments.
    pub fn too_few_segments(spec: &'static str, input: &str, min: usize, actual: usize) -> Self {
        Self::new(spec, input, StrParseKind::TooFewSegments { min, actual })
    }

    /// A character class or structural rule was violated.
    pub fn char_class(spec: &'static str, input: &str, message: &'static str) -> Self {
        Self::new(
            spec,
            input,
            StrParseKind::CharClass {
                message: SmolStr::new_static(message),
            },
        )
    }

    /// A required component is absent.
    pub fn missing(spec: &'static str, input: &str, expected: &'static str) -> Self {
        Self::new(
            spec,
            input,
            StrParseKind::MissingComponent {
                expected: SmolStr::new_static(expected),
            },
        )
    }

    /// The method (or other registry value) is not one we support.
    pub fn unsupported(spec: &'static str, input: &str, value: &str) -> Self {
        Self::new(
            spec,
            input,
            StrParseKind::Unsupported {
                value: SmolStr::new(value),
            },
        )
    }

    /// Wrap an error from a nested identifier grammar.
    pub fn wrap(spec: &'static str, input: &str, error: AtStrError) -> Self {
        Self::new(spec, input, StrParseKind::Wrap(Arc::new(error)))
    }
}

/// The kinds of identifier parse failure.
#[derive(Debug, Clone, thiserror::Error, miette::Diagnostic)]
pub enum StrParseKind {
    /// String exceeds the grammar's length cap.
    #[error("too long (allowed: {max}, actual: {actual})")]
    #[diagnostic(code(twill::atstr::too_long))]
    TooLong {
        /// Maximum permitted length
        max: usize,
        /// Observed length
        actual: usize,
    },

    /// Too few segments for the grammar.
    #[error("too few segments (required: {min}, actual: {actual})")]
    #[diagnostic(code(twill::atstr::too_few_segments))]
    TooFewSegments {
        /// Minimum segment count
        min: usize,
        /// Observed segment count
        actual: usize,
    },

    /// Character class or structural rule violated.
    #[error("{message}")]
    #[diagnostic(code(twill::atstr::char_class))]
    CharClass {
        /// Which rule failed
        message: SmolStr,
    },

    /// A required component is missing.
    #[error("missing {expected}")]
    #[diagnostic(code(twill::atstr::missing_component))]
    MissingComponent {
        /// What was expected
        expected: SmolStr,
    },

    /// Value outside the supported registry (e.g. an unknown DID method).
    #[error("unsupported value `{value}`")]
    #[diagnostic(code(twill::atstr::unsupported))]
    Unsupported {
        /// The offending value
        value: SmolStr,
    },

    /// Error from a nested grammar (e.g. the NSID inside an at:// URI).
    #[error("{0}")]
    #[diagnostic(code(twill::atstr::inner))]
    Wrap(#[source] Arc<AtStrError>),
}

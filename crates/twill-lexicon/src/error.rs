//! Validation error types.

use smol_str::SmolStr;
use std::fmt;

/// Top-level lexicon errors.
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum LexiconError {
    /// Document JSON failed to parse into the schema model
    #[error("failed to parse lexicon document")]
    #[diagnostic(code(twill_lexicon::parse))]
    Parse(#[from] serde_json::Error),

    /// Document has no `main` definition
    #[error("lexicon document has no main definition")]
    #[diagnostic(code(twill_lexicon::missing_main))]
    MissingMain,

    /// Data failed validation
    #[error(transparent)]
    #[diagnostic(transparent)]
    Validation(#[from] ValidationErrors),
}

/// The full set of problems found in one validation pass.
///
/// The validator never stops at the first failure within a level; every
/// issue is collected so a caller can render a complete report.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, miette::Diagnostic)]
#[diagnostic(code(twill_lexicon::validation))]
pub struct ValidationErrors {
    /// Individual problems, in discovery order
    pub issues: Vec<Issue>,
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} validation issue(s)", self.issues.len())?;
        for issue in &self.issues {
            write!(f, "\n  {}", issue)?;
        }
        Ok(())
    }
}

/// One validation problem, located by path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    /// Where in the value the problem is
    pub path: Vec<PathSegment>,
    /// What the problem is
    pub message: String,
}

impl Issue {
    /// An issue at the current location.
    pub fn here(message: impl Into<String>) -> Self {
        Self {
            path: Vec::new(),
            message: message.into(),
        }
    }

    /// An issue one property below the current location.
    pub fn at(property: &str, message: impl Into<String>) -> Self {
        Self {
            path: vec![PathSegment::Property(SmolStr::new(property))],
            message: message.into(),
        }
    }

    /// Prefix this issue's path with a property name.
    pub fn under_property(mut self, property: &str) -> Self {
        self.path.insert(0, PathSegment::Property(SmolStr::new(property)));
        self
    }

    /// Prefix this issue's path with an array index.
    pub fn under_index(mut self, index: usize) -> Self {
        self.path.insert(0, PathSegment::Index(index));
        self
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "(root): {}", self.message)
        } else {
            let mut first = true;
            for segment in &self.path {
                match segment {
                    PathSegment::Property(name) => {
                        if !first {
                            write!(f, ".")?;
                        }
                        write!(f, "{}", name)?;
                    }
                    PathSegment::Index(i) => write!(f, "[{}]", i)?,
                }
                first = false;
            }
            write!(f, ": {}", self.message)
        }
    }
}

/// One step of an issue path: a property name or an array index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    /// Named property
    Property(SmolStr),
    /// `[i]` array index
    Index(usize),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issue_display() {
        let issue = Issue::at("email", "is required").under_property("profile");
        assert_eq!(issue.to_string(), "profile.email: is required");

        let indexed = Issue::here("must be a string")
            .under_index(2)
            .under_property("langs");
        assert_eq!(indexed.to_string(), "langs[2]: must be a string");
    }
}

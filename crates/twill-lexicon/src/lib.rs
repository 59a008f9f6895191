//! Lexicon schema model and runtime validation.
//!
//! A lexicon document is a JSON envelope `{lexicon: 1, id, defs}` whose
//! `defs.main` entry supplies the top-level schema. The validator walks
//! arbitrary JSON data against a schema tree and reports *every* problem it
//! finds, with a path to each, rather than stopping at the first.

#![warn(missing_docs)]

pub mod error;
pub mod lexicon;
pub mod validate;

pub use error::{Issue, LexiconError, PathSegment, ValidationErrors};
pub use lexicon::{LexSchema, LexiconDoc};
pub use validate::{validate, validate_doc};

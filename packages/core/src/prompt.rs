//! Interactive prompt abstraction.
//!
//! The pipeline never talks to a terminal directly; it goes through this
//! trait. One implementation exists per frontend (the CLI ships a
//! dialoguer-backed one), selected once at startup and never branched on
//! by core logic afterwards.

use crate::error::Result;

/// Blocking operator interaction used at each selection point.
///
/// Every method may come back "empty" (no selections, empty string,
/// declined confirmation) when the operator cancels; callers treat that as
/// finishing the current branch early, never as an error.
pub trait Prompt {
    /// Presents options for zero-or-more selections; returns chosen indices.
    fn choose(&self, title: &str, options: &[String]) -> Result<Vec<usize>>;

    /// Asks for a line of text, offering a default the operator can edit.
    fn input(&self, title: &str, default: &str) -> Result<String>;

    /// Asks for a secret without echoing it.
    fn secret(&self, title: &str) -> Result<String>;

    /// Asks a yes/no question.
    fn confirm(&self, question: &str) -> Result<bool>;
}

//! Error types for the herbalism rule engine.

/// Errors that can occur while blending a herbalism product (spec.md
/// §4.11).
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum HerbalismError {
    /// The ingredient list was empty.
    #[error("at least one ingredient is required")]
    NoIngredients,

    /// More than six ingredients were submitted.
    #[error("a maximum of 6 ingredients is allowed")]
    TooManyIngredients,

    /// One or more item numbers did not resolve to a known ingredient.
    #[error("unknown item numbers: {0:?}")]
    UnknownIngredients(Vec<String>),
}

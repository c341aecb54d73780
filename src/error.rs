//! Rich diagnostic error types for the scrollforge engine.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes and help text. Nothing in this crate is fatal to the
//! host: every failure degrades to "this one derived entity is skipped" with a
//! diagnostic, preserving the rest of the load pass.

use miette::Diagnostic;
use thiserror::Error;

/// Top-level error type for the scrollforge engine.
///
/// Each variant wraps a subsystem-specific error, preserving the full
/// diagnostic chain (error codes, help text, sources) through to the caller.
#[derive(Debug, Error, Diagnostic)]
pub enum ForgeError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Locator(#[from] LocatorError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Factory(#[from] FactoryError),
}

// ---------------------------------------------------------------------------
// Cache errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum CacheError {
    #[error("key not present in bidirectional map")]
    #[diagnostic(
        code(forge::cache::key_not_found),
        help(
            "The forward lookup missed. Use the `_opt` accessor if absence is \
             an expected outcome at this call site."
        )
    )]
    KeyNotFound,

    #[error("value not present in bidirectional map")]
    #[diagnostic(
        code(forge::cache::value_not_found),
        help(
            "The reverse lookup missed. Use the `_opt` accessor if absence is \
             an expected outcome at this call site."
        )
    )]
    ValueNotFound,
}

// ---------------------------------------------------------------------------
// Store errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum StoreError {
    #[error("I/O error: {source}")]
    #[diagnostic(
        code(forge::store::io),
        help(
            "A filesystem operation on the mapping file failed. Check that the \
             directory exists, has correct permissions, and the disk is not full."
        )
    )]
    Io {
        #[source]
        source: std::io::Error,
    },

    #[error("malformed mapping line {line}: {content:?}")]
    #[diagnostic(
        code(forge::store::parse),
        help(
            "Lines must be a `[SECTION]` header, a `# comment`, `key = value`, \
             or blank. Fix or remove the offending line."
        )
    )]
    Parse { line: usize, content: String },
}

// ---------------------------------------------------------------------------
// Locator errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum LocatorError {
    #[error("not a hexadecimal identifier: {input:?}")]
    #[diagnostic(
        code(forge::locator::bad_hex),
        help("Stable identifiers are persisted as `0x` followed by hex digits.")
    )]
    BadHex { input: String },

    #[error("malformed composite locator: {input:?}")]
    #[diagnostic(
        code(forge::locator::malformed),
        help(
            "A composite locator is either a bare hex identifier or \
             `<dataset>~<hex local id>`. The offending persisted entry will be \
             deleted and counted; processing continues."
        )
    )]
    Malformed { input: String },
}

// ---------------------------------------------------------------------------
// Factory errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum FactoryError {
    #[error("content factory cannot produce entities of kind {kind}")]
    #[diagnostic(
        code(forge::factory::unavailable),
        help(
            "The content factory collaborator refused the requested entity kind. \
             The generation or fusion call returns absence; no partial entity is \
             registered."
        )
    )]
    Unavailable { kind: String },
}

/// Convenience alias for functions returning scrollforge results.
pub type ForgeResult<T> = std::result::Result<T, ForgeError>;

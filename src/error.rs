use std::io;

use crate::ObjectId;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced while tokenising or parsing a single PDF value or object.
///
/// These correspond to the *SyntaxError* taxonomy entry: malformed tokens,
/// unbalanced brackets, unexpected EOF. In lenient mode the caller recovers
/// by skipping to the next plausible token boundary; in strict mode these
/// propagate.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    #[error("invalid file header")]
    InvalidFileHeader,
    #[error("invalid object")]
    InvalidObject,
    #[error("invalid dictionary")]
    InvalidDictionary,
    #[error("invalid stream")]
    InvalidStream,
    #[error("invalid string")]
    InvalidString,
    #[error("invalid name")]
    InvalidName,
    #[error("invalid number")]
    InvalidNumber,
    #[error("invalid reference")]
    InvalidReference,
    #[error("invalid xref table or stream")]
    InvalidXref,
    #[error("brackets nested too deeply")]
    BracketLimitExceeded,
}

/// Errors specific to locating and walking the cross-reference chain.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum XrefError {
    #[error("startxref not found")]
    Start,
    #[error("invalid Prev offset in trailer")]
    PrevStart,
    #[error("invalid XRefStm offset in hybrid trailer")]
    StreamStart,
    #[error("xref stream missing /W")]
    MissingWidths,
    #[error("xref stream /Index and entry count mismatch")]
    IndexMismatch,
    #[error("trailer missing /Root")]
    MissingRoot,
    #[error("brute-force recovery found no /Catalog")]
    RecoveryFailed,
}

/// Errors raised by a stream filter during decode or encode.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum FilterError {
    #[error("unknown filter: {0}")]
    UnknownFilter(String),
    #[error("corrupt stream data")]
    CorruptData,
    #[error("predictor geometry does not match the declared /Columns or /Colors")]
    InvalidPredictorGeometry,
}

/// The document-wide error type. `ParseError`/`XrefError` are recoverable in
/// lenient mode (the caller accumulates a warning and keeps going);
/// everything else is always surfaced.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Xref(#[from] XrefError),
    #[error(transparent)]
    Filter(#[from] FilterError),
    #[error(transparent)]
    Decryption(#[from] crate::encryption::DecryptionError),
    #[error("the supplied password authenticates neither the user nor the owner")]
    InvalidPassword,
    #[error("document is encrypted but has not been authenticated")]
    NotAuthenticated,
    #[error("operation requires owner access")]
    PermissionDenied,
    #[error("reference cycle detected at {0:?}")]
    ReferenceCycle(ObjectId),
    #[error("no xref entry for the requested object")]
    MissingXrefEntry,
    #[error("offset {0} lies outside the document buffer")]
    InvalidOffset(usize),
    #[error("invalid stream: {0}")]
    InvalidStream(String),
    #[error("numeric conversion failed: {0}")]
    NumericCast(String),
    #[error("dictionary is missing key {0:?}")]
    DictKey(Vec<u8>),
    #[error("object is not of the expected type")]
    WrongObjectType,
    #[error("{0}")]
    Unimplemented(&'static str),
    #[error("document has no source bytes to append an incremental update after")]
    IncrementalSaveUnavailable,
}

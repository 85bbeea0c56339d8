/*
    CAS Library (Common Analysis Structure)

        Licensed under the GNU General Public License v3
*/

//! This module contains the [`CasError`] type that is returned by all fallible operations.

use std::error::Error;
use std::fmt;

use crate::featurestructure::FsId;

// ------------------------------ ERROR DEFINITIONS & IMPLEMENTATIONS -------------------------------------------------------------

#[derive(Debug)]
/// This is the error type used throughout the library, the last argument of most variants
/// carries some additional context that explains where the error occurred.
pub enum CasError {
    /// A view with this name already exists
    DuplicateView(String),

    /// There is no view with this name
    ViewNotFound(String),

    /// The type is not known by the type system
    TypeNotFound(String, &'static str),

    /// The type was already declared in the type system
    DuplicateType(String),

    /// The serialisation target can not be used
    InvalidDestination(String, &'static str),

    /// A feature structure with this identifier already exists
    DuplicateId(FsId, &'static str),

    /// No feature structure with this identifier exists (unresolved reference)
    IdNotFound(FsId, &'static str),

    /// The identifier space is exhausted
    IdOverflow(&'static str),

    /// Invalid handle, the item does not exist (anymore)
    HandleError(&'static str),

    /// The feature structure does not have both a begin and an end
    NotPositional(&'static str),

    /// The input is not a valid CAS representation
    DeserializationError(String),

    SerializationError(String),

    JsonError(
        serde_path_to_error::Error<serde_json::Error>,
        String,
        &'static str,
    ),

    IOError(std::io::Error, String, &'static str),
}

impl From<&CasError> for String {
    /// Returns the error message as a String
    fn from(error: &CasError) -> String {
        match error {
            CasError::DuplicateView(name) => {
                format!("DuplicateView: A view with name [{}] already exists!", name)
            }
            CasError::ViewNotFound(name) => {
                format!("ViewNotFound: There is no view with name [{}] in this CAS!", name)
            }
            CasError::TypeNotFound(name, msg) => {
                format!("TypeNotFound: No such type: {} ({})", name, msg)
            }
            CasError::DuplicateType(name) => {
                format!("DuplicateType: Type already exists: {}", name)
            }
            CasError::InvalidDestination(dest, msg) => {
                format!("InvalidDestination: {} ({})", dest, msg)
            }
            CasError::DuplicateId(id, msg) => {
                format!("DuplicateId: Identifier already exists: {} ({})", id, msg)
            }
            CasError::IdNotFound(id, msg) => {
                format!("IdNotFound: No feature structure with identifier {} ({})", id, msg)
            }
            CasError::IdOverflow(msg) => {
                format!("IdOverflow: No more identifiers can be issued ({})", msg)
            }
            CasError::HandleError(msg) => {
                format!("HandleError: Invalid handle, item does not exist ({})", msg)
            }
            CasError::NotPositional(msg) => {
                format!("NotPositional: Feature structure has no begin/end ({})", msg)
            }
            CasError::DeserializationError(msg) => format!("DeserializationError: {}", msg),
            CasError::SerializationError(msg) => format!("SerializationError: {}", msg),
            CasError::JsonError(err, source, msg) => {
                format!("JsonError: {} (source: {}) ({})", err, source, msg)
            }
            CasError::IOError(err, filename, msg) => {
                format!("IOError: {} ({}): {}", filename, msg, err)
            }
        }
    }
}

impl fmt::Display for CasError {
    /// Formats the error message for printing
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let errmsg: String = String::from(self);
        write!(f, "[CasError] {}", errmsg)
    }
}

impl Error for CasError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            CasError::JsonError(err, _, _) => Some(err),
            CasError::IOError(err, _, _) => Some(err),
            _ => None,
        }
    }
}

/*
    CAS Library (Common Analysis Structure)

        Licensed under the GNU General Public License v3
*/

//! This module contains some common types and helper functions used throughout the library.

use sealed::sealed;
use std::fmt;

use crate::config::Config;

/// An enumeration of the core structures of this library, used for introspection
/// and to contextualise messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Type {
    Cas,
    View,
    FeatureStructure,
    TypeSystem,
    Config,
}

impl Type {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Cas => "Cas",
            Self::View => "View",
            Self::FeatureStructure => "FeatureStructure",
            Self::TypeSystem => "TypeSystem",
            Self::Config => "Config",
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Tells which [`Type`] a structure is, this is a sealed trait.
#[sealed(pub(crate))] //<-- this ensures nobody outside this crate can implement the trait
pub trait TypeInfo {
    fn typeinfo() -> Type;
}

/// Prints a debug message to standard error output if debug mode is enabled in the configuration.
/// The message is produced by a closure so no work is done when debugging is off.
pub(crate) fn debug<F>(config: &Config, message_func: F)
where
    F: FnOnce() -> String,
{
    if config.debug() {
        eprintln!("[CAS DEBUG] {}", message_func());
    }
}

/*
    CAS Library (Common Analysis Structure)

        Licensed under the GNU General Public License v3
*/

use sealed::sealed;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::CasError;
use crate::file::*;
use crate::json::ToJson;
use crate::types::*;

pub trait Configurable: Sized {
    //// Obtain the configuration
    fn config(&self) -> &Config;

    ///Builder pattern to associate a configuration
    fn with_config(mut self, config: Config) -> Self {
        self.set_config(config);
        self
    }

    ///Setter to associate a configuration
    fn set_config(&mut self, config: Config) -> &mut Self;
}

/// This holds the configuration for a [`crate::Cas`] and its (de)serialisation.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Debug mode
    pub(crate) debug: bool,

    /// The working directory, relative filenames are resolved against it first
    pub(crate) workdir: Option<PathBuf>,

    /// Serialise JSON without any indentation
    pub(crate) compact: bool,

    /// Write the feature structures section as a map keyed by (stringified) identifier rather than as an array
    pub(crate) feature_structures_as_map: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            debug: false,
            workdir: None,
            compact: false,
            feature_structures_as_map: false,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable debug mode. In debug mode, verbose output will be printed to standard error output
    pub fn with_debug(mut self, value: bool) -> Self {
        self.debug = value;
        self
    }

    /// Is debug mode enabled or not?
    pub fn debug(&self) -> bool {
        self.debug
    }

    /// Sets the working directory
    pub fn with_workdir(mut self, workdir: impl Into<PathBuf>) -> Self {
        self.workdir = Some(workdir.into());
        self
    }

    ///  Return the working directory, if set
    pub fn workdir(&self) -> Option<&Path> {
        self.workdir.as_deref()
    }

    /// Serialise to JSON without indentation?
    pub fn with_compact(mut self, value: bool) -> Self {
        self.compact = value;
        self
    }

    pub fn compact(&self) -> bool {
        self.compact
    }

    /// Write the feature structures as a map keyed by identifier instead of as an array.
    /// Both forms are always accepted when reading.
    pub fn with_feature_structures_as_map(mut self, value: bool) -> Self {
        self.feature_structures_as_map = value;
        self
    }

    pub fn feature_structures_as_map(&self) -> bool {
        self.feature_structures_as_map
    }

    /// Loads configuration from a JSON file
    pub fn from_file(filename: &str) -> Result<Self, CasError> {
        let reader = open_file_reader(filename, &Config::default())?;
        let deserializer = &mut serde_json::Deserializer::from_reader(reader);
        let result: Result<Self, _> = serde_path_to_error::deserialize(deserializer);
        result.map_err(|e| CasError::JsonError(e, filename.to_string(), "Reading config from file"))
    }
}

#[sealed]
impl TypeInfo for Config {
    fn typeinfo() -> Type {
        Type::Config
    }
}

impl ToJson for Config {}

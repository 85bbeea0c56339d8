/*
    CAS Library (Common Analysis Structure)

        Licensed under the GNU General Public License v3
*/

//! This module contains the [`IdGenerator`], which issues the numeric identifiers of feature structures
//! and the sequence numbers of sofas.

use crate::error::CasError;

/// Issues strictly increasing identifiers from a configurable starting point.
/// Identifiers are never reused, but gaps may be introduced deliberately by seeding
/// the generator past identifiers that were assigned elsewhere (e.g. during deserialisation).
/// `u64::MAX` is never issued, reaching it yields [`CasError::IdOverflow`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdGenerator {
    next_id: u64,
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new(1)
    }
}

impl IdGenerator {
    pub fn new(initial_id: u64) -> Self {
        Self {
            next_id: initial_id,
        }
    }

    /// Returns a fresh identifier and advances the generator
    pub fn generate_id(&mut self) -> Result<u64, CasError> {
        let result = self.next_id;
        self.next_id = result
            .checked_add(1)
            .ok_or(CasError::IdOverflow("IdGenerator::generate_id"))?;
        Ok(result)
    }

    /// Returns the identifier that will be issued next, without consuming it
    pub fn peek(&self) -> u64 {
        self.next_id
    }

    /// Makes sure the identifier will never be issued, by moving the generator past it if needed
    pub fn skip_past(&mut self, id: u64) -> Result<(), CasError> {
        if id >= self.next_id {
            self.next_id = id
                .checked_add(1)
                .ok_or(CasError::IdOverflow("IdGenerator::skip_past"))?;
        }
        Ok(())
    }
}

//! Compile-time options for a [`CompiledSchema`](crate::layout::CompiledSchema).
//!
//! Die Optionen werden beim Kompilieren in das Schema übernommen und gelten
//! für alle daraus erzeugten Message-Instanzen.
//!
//! # Beispiel
//!
//! ```
//! use protolite::options::CompileOptions;
//!
//! let opts = CompileOptions::default()
//!     .with_recursion_limit(16)
//!     .with_validate_utf8_on_parse(true);
//! assert_eq!(opts.recursion_limit(), 16);
//! assert!(opts.validate_utf8_on_parse());
//! assert_eq!(opts.repeated_initial_capacity(), 4);
//! ```

use crate::{Error, Result};

/// Default nesting depth accepted while parsing nested messages.
pub const DEFAULT_RECURSION_LIMIT: usize = 100;

/// First allocation size of a repeated numeric field; doubles afterwards.
pub const DEFAULT_REPEATED_CAPACITY: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompileOptions {
    pub(crate) recursion_limit: usize,
    pub(crate) repeated_initial_capacity: usize,
    /// Strings schon beim Parsen validieren statt erst beim ersten Lesen.
    pub(crate) validate_utf8_on_parse: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            recursion_limit: DEFAULT_RECURSION_LIMIT,
            repeated_initial_capacity: DEFAULT_REPEATED_CAPACITY,
            validate_utf8_on_parse: false,
        }
    }
}

impl CompileOptions {
    #[must_use]
    pub fn with_recursion_limit(mut self, limit: usize) -> Self {
        self.recursion_limit = limit;
        self
    }

    #[must_use]
    pub fn with_repeated_initial_capacity(mut self, capacity: usize) -> Self {
        self.repeated_initial_capacity = capacity;
        self
    }

    #[must_use]
    pub fn with_validate_utf8_on_parse(mut self, validate: bool) -> Self {
        self.validate_utf8_on_parse = validate;
        self
    }

    pub fn recursion_limit(&self) -> usize {
        self.recursion_limit
    }

    pub fn repeated_initial_capacity(&self) -> usize {
        self.repeated_initial_capacity
    }

    pub fn validate_utf8_on_parse(&self) -> bool {
        self.validate_utf8_on_parse
    }

    /// Rejects option combinations that cannot work.
    pub fn validate(&self) -> Result<()> {
        if self.recursion_limit == 0 {
            return Err(Error::invalid_schema("recursion limit must be at least 1"));
        }
        if self.repeated_initial_capacity == 0 {
            return Err(Error::invalid_schema("repeated initial capacity must be at least 1"));
        }
        Ok(())
    }
}

// crates/spec-harvest-store/src/ids.rs
// ============================================================================
// Module: SpecDb Row Identifiers
// Description: Typed wrappers over SQLite rowids.
// Purpose: Keep slot references strongly typed across store operations.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Review slots and assertions reference rows in other tables. Raw `i64`
//! rowids are easy to cross-wire, so each referencing table gets its own
//! wrapper. Wrappers serialize transparently as numbers.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Row Id Types
// ============================================================================

/// Declares a typed rowid wrapper in the canonical form.
macro_rules! row_identifier {
    ($(#[$docs:meta])* $name:ident) => {
        $(#[$docs])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Wraps a raw rowid.
            #[must_use]
            pub const fn new(id: i64) -> Self {
                Self(id)
            }

            /// Returns the raw rowid.
            #[must_use]
            pub const fn get(self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

row_identifier! {
    /// Rowid of a component identity.
    IdentityRowId
}

row_identifier! {
    /// Rowid of a component property value.
    ComponentValueId
}

row_identifier! {
    /// Rowid of an enum list.
    EnumListId
}

row_identifier! {
    /// Rowid of an enum list value.
    ListValueId
}

row_identifier! {
    /// Rowid of an item field state.
    ItemStateId
}

row_identifier! {
    /// Rowid of a key review state.
    ReviewStateId
}

row_identifier! {
    /// Rowid of a key review run.
    ReviewRunId
}

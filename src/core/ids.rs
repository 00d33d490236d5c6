//! Purpose: Typed identifiers used across the tracker and its collaborators.
//! Exports: `StringId`, `UniquePid`, `TrackId`, `TrackSetId`.
//! Role: Keep the four integer id spaces from being mixed up at call sites.
//! Invariants: All ids are dense, `Copy`, and totally ordered (usable as map keys).
use std::fmt;

use serde::Serialize;

use crate::core::error::{Error, ErrorKind};

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Clone, Copy, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize,
        )]
        #[serde(transparent)]
        pub struct $name(u32);

        impl $name {
            pub const fn new(raw: u32) -> Self {
                Self(raw)
            }

            /// Mints the id for a dense `index`; fails instead of wrapping past `u32::MAX`.
            pub fn from_index(index: usize) -> Result<Self, Error> {
                u32::try_from(index).map(Self).map_err(|err| {
                    Error::new(ErrorKind::Internal)
                        .with_message(format!(
                            "{} space exhausted at index {index}",
                            stringify!($name)
                        ))
                        .with_source(err)
                })
            }

            pub fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

define_id!(
    /// Interned string handle minted by a `StringPool`.
    StringId
);
define_id!(
    /// Process identity, unique for the lifetime of one trace session.
    UniquePid
);
define_id!(
    /// Physical track minted by a `TrackStore`.
    TrackId
);
define_id!(
    /// Group of physical tracks sharing one interned key.
    TrackSetId
);

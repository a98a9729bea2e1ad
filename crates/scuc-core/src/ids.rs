//! Newtype indices for buses, lines and generators.
//!
//! Every instance uses dense `0..N` indices (enforced by
//! [`crate::instance::UnitCommitmentInstance::validate`]), so these wrap a
//! plain `usize` rather than an opaque generational id.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! index_id {
    ($name:ident) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub usize);

        impl $name {
            pub fn new(index: usize) -> Self {
                Self(index)
            }

            pub fn index(self) -> usize {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<usize> for $name {
            fn from(value: usize) -> Self {
                Self(value)
            }
        }
    };
}

index_id!(BusId);
index_id!(LineId);
index_id!(GenId);
index_id!(ZoneId);

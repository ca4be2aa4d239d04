//! Network entities: base stations, cells and mobiles.
//!
//! Entities refer to each other by typed identifiers rather than references.
//! The [`World`](crate::world::World) owns every entity and resolves
//! identifiers; cell and base-station identifiers double as indices into the
//! world's collections because neither is ever removed.

pub mod basestation;
pub mod cell;
pub mod mobile;
pub mod sleep;

pub use basestation::BaseStation;
pub use cell::{Cell, PowerGrid};
pub use mobile::{AssociationTable, ChannelTensor, LinkRecord, Mobile, WidebandSinr};
pub use sleep::{rank_timeslots, static_timeslots, DtxSegregator, SleepState};

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! entity_id {
    ($(#[$doc:meta])* $name:ident, $prefix:literal) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub usize);

        impl $name {
            #[inline]
            pub fn index(self) -> usize {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }
    };
}

entity_id!(
    /// Base-station identifier, also its index in the world.
    BsId,
    "bs"
);
entity_id!(
    /// Cell identifier, also its index in the world.
    CellId,
    "cell"
);
entity_id!(
    /// Mobile identifier. Stable while mobiles come and go.
    MobileId,
    "mobile"
);

/// Hands out monotonically increasing identifiers, one counter per entity
/// kind. Every world owns a fresh factory, so runs never share numbering.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdFactory {
    next_bs: usize,
    next_cell: usize,
    next_mobile: usize,
}

impl IdFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn base_station(&mut self) -> BsId {
        let id = BsId(self.next_bs);
        self.next_bs += 1;
        id
    }

    pub fn cell(&mut self) -> CellId {
        let id = CellId(self.next_cell);
        self.next_cell += 1;
        id
    }

    pub fn mobile(&mut self) -> MobileId {
        let id = MobileId(self.next_mobile);
        self.next_mobile += 1;
        id
    }
}

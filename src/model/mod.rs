//! Object models on both sides of the conversion.
//!
//! The remote side is described by the [`ReadModel`] trait with two
//! encodings ([`RestRead`] and [`StreamedRead`]) plus readset metadata. The
//! target side is the SAM [`AlignmentRecord`].

mod metadata;
mod read;
mod record;
mod rest;
mod streamed;

pub use metadata::{
    Experiment, HeaderSection, Program, ReadGroup, ReadGroupSet, ReadsetMetadata, Reference,
};
pub use read::{AlignmentView, CigarUnit, PositionView, ReadModel};
pub use record::{flags, AlignmentRecord, CigarOp, CigarOpKind, TagArray, TagValue};
pub use rest::{RestAlignment, RestPosition, RestRead};
pub use streamed::{StreamedAlignment, StreamedPosition, StreamedRead};

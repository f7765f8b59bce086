use crate::model::{CigarOp, CigarOpKind, CigarUnit};

use super::ConvertError;

/// Operation names used by the remote API, paired with their CIGAR kind.
const OPERATIONS: [(&str, CigarOpKind); 9] = [
    ("ALIGNMENT_MATCH", CigarOpKind::Match),
    ("CLIP_HARD", CigarOpKind::HardClip),
    ("CLIP_SOFT", CigarOpKind::SoftClip),
    ("DELETE", CigarOpKind::Deletion),
    ("INSERT", CigarOpKind::Insertion),
    ("PAD", CigarOpKind::Padding),
    ("SEQUENCE_MATCH", CigarOpKind::SequenceMatch),
    ("SEQUENCE_MISMATCH", CigarOpKind::SequenceMismatch),
    ("SKIP", CigarOpKind::Skip),
];

/// Bidirectional mapping between named API operations and CIGAR codes.
#[derive(Debug, Clone, Copy, Default)]
pub struct CigarMapper;

impl CigarMapper {
    /// CIGAR kind for an API operation name.
    pub fn kind_for(operation: &str) -> Option<CigarOpKind> {
        OPERATIONS
            .iter()
            .find(|(name, _)| *name == operation)
            .map(|(_, kind)| *kind)
    }

    /// API operation name for a CIGAR kind.
    pub fn operation_for(kind: CigarOpKind) -> &'static str {
        OPERATIONS
            .iter()
            .find(|(_, candidate)| *candidate == kind)
            .map(|(name, _)| *name)
            .unwrap_or("ALIGNMENT_MATCH")
    }

    /// Map API units to CIGAR operations, preserving order.
    pub fn to_ops(units: &[CigarUnit]) -> Result<Vec<CigarOp>, ConvertError> {
        units
            .iter()
            .map(|unit| {
                let kind = Self::kind_for(&unit.operation)
                    .ok_or_else(|| ConvertError::UnknownCigarOperation(unit.operation.clone()))?;
                let len = u32::try_from(unit.operation_length).map_err(|_| {
                    ConvertError::InvalidCigarLength {
                        operation: unit.operation.clone(),
                        length: unit.operation_length,
                    }
                })?;
                Ok(CigarOp::new(kind, len))
            })
            .collect()
    }

    /// Map CIGAR operations back to API units.
    pub fn to_units(ops: &[CigarOp]) -> Vec<CigarUnit> {
        ops.iter()
            .map(|op| CigarUnit::new(Self::operation_for(op.kind), i64::from(op.len)))
            .collect()
    }

    /// Render API units as a CIGAR string (`<length><code>` per unit).
    pub fn render(units: &[CigarUnit]) -> Result<String, ConvertError> {
        Ok(Self::to_ops(units)?
            .iter()
            .map(ToString::to_string)
            .collect())
    }
}

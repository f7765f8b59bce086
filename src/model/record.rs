use std::fmt;

/// SAM flag bits.
pub mod flags {
    /// Template has multiple segments.
    pub const PAIRED: u16 = 0x1;
    /// Each segment properly aligned.
    pub const PROPER_PAIR: u16 = 0x2;
    /// Segment unmapped.
    pub const UNMAPPED: u16 = 0x4;
    /// Next segment unmapped.
    pub const MATE_UNMAPPED: u16 = 0x8;
    /// Sequence reverse complemented.
    pub const REVERSE: u16 = 0x10;
    /// Next segment reverse complemented.
    pub const MATE_REVERSE: u16 = 0x20;
    /// First segment in the template.
    pub const FIRST_IN_PAIR: u16 = 0x40;
    /// Last segment in the template.
    pub const SECOND_IN_PAIR: u16 = 0x80;
    /// Secondary alignment.
    pub const SECONDARY: u16 = 0x100;
    /// Not passing quality controls.
    pub const QC_FAIL: u16 = 0x200;
    /// PCR or optical duplicate.
    pub const DUPLICATE: u16 = 0x400;
    /// Supplementary alignment.
    pub const SUPPLEMENTARY: u16 = 0x800;

    /// Bits that only make sense for a read with a mate.
    pub const PAIRING: u16 =
        PAIRED | PROPER_PAIR | MATE_UNMAPPED | MATE_REVERSE | FIRST_IN_PAIR | SECOND_IN_PAIR;
}

/// CIGAR operation kinds describing how a read aligns to the reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CigarOpKind {
    /// Alignment match, either match or mismatch (`M`).
    Match,
    /// Insertion relative to the reference (`I`).
    Insertion,
    /// Deletion relative to the reference (`D`).
    Deletion,
    /// Skipped reference region, e.g. an intron (`N`).
    Skip,
    /// Soft clipping, sequence present in the read (`S`).
    SoftClip,
    /// Hard clipping, sequence trimmed from the read (`H`).
    HardClip,
    /// Silent deletion from a padded reference (`P`).
    Padding,
    /// Sequence match (`=`).
    SequenceMatch,
    /// Sequence mismatch (`X`).
    SequenceMismatch,
}

impl CigarOpKind {
    /// All kinds, in SAM specification order.
    pub const ALL: [CigarOpKind; 9] = [
        CigarOpKind::Match,
        CigarOpKind::Insertion,
        CigarOpKind::Deletion,
        CigarOpKind::Skip,
        CigarOpKind::SoftClip,
        CigarOpKind::HardClip,
        CigarOpKind::Padding,
        CigarOpKind::SequenceMatch,
        CigarOpKind::SequenceMismatch,
    ];

    /// Single-character SAM code.
    pub fn code(self) -> char {
        match self {
            CigarOpKind::Match => 'M',
            CigarOpKind::Insertion => 'I',
            CigarOpKind::Deletion => 'D',
            CigarOpKind::Skip => 'N',
            CigarOpKind::SoftClip => 'S',
            CigarOpKind::HardClip => 'H',
            CigarOpKind::Padding => 'P',
            CigarOpKind::SequenceMatch => '=',
            CigarOpKind::SequenceMismatch => 'X',
        }
    }

    /// Kind for a SAM code.
    pub fn from_code(code: char) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.code() == code)
    }

    /// Whether the operation advances along the reference.
    pub fn consumes_reference(self) -> bool {
        matches!(
            self,
            CigarOpKind::Match
                | CigarOpKind::Deletion
                | CigarOpKind::Skip
                | CigarOpKind::SequenceMatch
                | CigarOpKind::SequenceMismatch
        )
    }
}

/// CIGAR operation with length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CigarOp {
    /// Operation kind.
    pub kind: CigarOpKind,
    /// Number of bases affected by the operation.
    pub len: u32,
}

impl CigarOp {
    /// Construct a new CIGAR operation.
    pub fn new(kind: CigarOpKind, len: u32) -> Self {
        Self { kind, len }
    }
}

impl fmt::Display for CigarOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.len, self.kind.code())
    }
}

/// Typed numeric array carried by a `B` tag.
#[derive(Debug, Clone, PartialEq)]
pub enum TagArray {
    /// `c` subtype.
    I8(Vec<i8>),
    /// `C` subtype.
    U8(Vec<u8>),
    /// `s` subtype.
    I16(Vec<i16>),
    /// `S` subtype.
    U16(Vec<u16>),
    /// `i` subtype.
    I32(Vec<i32>),
    /// `I` subtype.
    U32(Vec<u32>),
    /// `f` subtype.
    Float(Vec<f32>),
}

impl TagArray {
    /// SAM subtype character.
    pub fn subtype(&self) -> char {
        match self {
            TagArray::I8(_) => 'c',
            TagArray::U8(_) => 'C',
            TagArray::I16(_) => 's',
            TagArray::U16(_) => 'S',
            TagArray::I32(_) => 'i',
            TagArray::U32(_) => 'I',
            TagArray::Float(_) => 'f',
        }
    }

    /// Whether the elements are unsigned integers.
    pub fn is_unsigned(&self) -> bool {
        matches!(self, TagArray::U8(_) | TagArray::U16(_) | TagArray::U32(_))
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        match self {
            TagArray::I8(v) => v.len(),
            TagArray::U8(v) => v.len(),
            TagArray::I16(v) => v.len(),
            TagArray::U16(v) => v.len(),
            TagArray::I32(v) => v.len(),
            TagArray::U32(v) => v.len(),
            TagArray::Float(v) => v.len(),
        }
    }

    /// Whether the array has no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn join<T: fmt::Display>(f: &mut fmt::Formatter<'_>, values: &[T]) -> fmt::Result {
    for value in values {
        write!(f, ",{value}")?;
    }
    Ok(())
}

impl fmt::Display for TagArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.subtype())?;
        match self {
            TagArray::I8(v) => join(f, v),
            TagArray::U8(v) => join(f, v),
            TagArray::I16(v) => join(f, v),
            TagArray::U16(v) => join(f, v),
            TagArray::I32(v) => join(f, v),
            TagArray::U32(v) => join(f, v),
            TagArray::Float(v) => join(f, v),
        }
    }
}

/// Decoded value of an auxiliary tag.
#[derive(Debug, Clone, PartialEq)]
pub enum TagValue {
    /// Printable character (`A`).
    Char(u8),
    /// Signed integer (`i`).
    Int(i64),
    /// Single-precision float (`f`).
    Float(f32),
    /// Printable string (`Z`).
    String(String),
    /// Hex-encoded byte array (`H`), stored as upper-case hex digits.
    Hex(String),
    /// Numeric array (`B`).
    Array(TagArray),
}

impl TagValue {
    /// SAM type character.
    pub fn type_code(&self) -> char {
        match self {
            TagValue::Char(_) => 'A',
            TagValue::Int(_) => 'i',
            TagValue::Float(_) => 'f',
            TagValue::String(_) => 'Z',
            TagValue::Hex(_) => 'H',
            TagValue::Array(_) => 'B',
        }
    }

    /// Whether this value is an array of unsigned integers.
    pub fn is_unsigned_array(&self) -> bool {
        matches!(self, TagValue::Array(array) if array.is_unsigned())
    }
}

impl fmt::Display for TagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TagValue::Char(c) => write!(f, "{}", *c as char),
            TagValue::Int(v) => write!(f, "{v}"),
            TagValue::Float(v) => write!(f, "{v}"),
            TagValue::String(v) | TagValue::Hex(v) => f.write_str(v),
            TagValue::Array(array) => write!(f, "{array}"),
        }
    }
}

/// One alignment record in the SAM model. Positions are 1-based.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AlignmentRecord {
    /// Query template name.
    pub read_name: Option<String>,
    /// Bitwise flags, see [`flags`].
    pub flags: u16,
    /// Reference name of the alignment.
    pub reference_name: Option<String>,
    /// Index of `reference_name` in the header's sequence dictionary.
    pub reference_index: Option<usize>,
    /// 1-based leftmost mapping position.
    pub alignment_start: Option<i64>,
    /// Mapping quality.
    pub mapping_quality: Option<u8>,
    /// CIGAR operations.
    pub cigar: Vec<CigarOp>,
    /// Reference name of the next segment.
    pub mate_reference_name: Option<String>,
    /// Index of `mate_reference_name` in the sequence dictionary.
    pub mate_reference_index: Option<usize>,
    /// 1-based position of the next segment.
    pub mate_alignment_start: Option<i64>,
    /// Observed template length.
    pub inferred_insert_size: Option<i32>,
    /// Bases, upper-case ASCII; empty when absent.
    pub sequence: Vec<u8>,
    /// Phred qualities without offset; empty when absent.
    pub base_qualities: Vec<u8>,
    /// Auxiliary tags in insertion order.
    pub tags: Vec<(String, TagValue)>,
}

impl AlignmentRecord {
    /// Whether all bits of `flag` are set.
    pub fn has_flag(&self, flag: u16) -> bool {
        self.flags & flag == flag
    }

    /// Whether the read is paired.
    pub fn is_paired(&self) -> bool {
        self.has_flag(flags::PAIRED)
    }

    /// Whether the read is unmapped.
    pub fn is_unmapped(&self) -> bool {
        self.has_flag(flags::UNMAPPED)
    }

    /// Number of reference bases covered by the CIGAR.
    pub fn reference_length(&self) -> u64 {
        self.cigar
            .iter()
            .filter(|op| op.kind.consumes_reference())
            .map(|op| u64::from(op.len))
            .sum()
    }

    /// 1-based inclusive end of the alignment. A CIGAR without reference
    /// bases covers only the start position. `None` when the end does not
    /// fit in `i64`.
    pub fn alignment_end(&self) -> Option<i64> {
        let start = self.alignment_start?;
        let length = i64::try_from(self.reference_length()).ok()?;
        start.checked_add((length - 1).max(0))
    }

    /// CIGAR in SAM text form, `*` when empty.
    pub fn cigar_string(&self) -> String {
        if self.cigar.is_empty() {
            return "*".to_string();
        }
        self.cigar.iter().map(ToString::to_string).collect()
    }

    /// Value of a tag.
    pub fn tag(&self, name: &str) -> Option<&TagValue> {
        self.tags
            .iter()
            .find(|(tag, _)| tag == name)
            .map(|(_, value)| value)
    }

    /// Set a tag, replacing any earlier value with the same name.
    pub fn set_tag(&mut self, name: &str, value: TagValue) {
        match self.tags.iter_mut().find(|(tag, _)| tag == name) {
            Some(slot) => slot.1 = value,
            None => self.tags.push((name.to_string(), value)),
        }
    }

    /// Render the record as one SAM text line (without newline).
    pub fn to_sam_line(&self) -> String {
        let rname = self.reference_name.as_deref().unwrap_or("*");
        let rnext = match (&self.mate_reference_name, &self.reference_name) {
            (Some(mate), Some(own)) if mate == own => "=",
            (Some(mate), _) => mate.as_str(),
            (None, _) => "*",
        };
        let sequence = if self.sequence.is_empty() {
            "*".to_string()
        } else {
            String::from_utf8_lossy(&self.sequence).into_owned()
        };
        let qualities = if self.base_qualities.is_empty() {
            "*".to_string()
        } else {
            self.base_qualities
                .iter()
                .map(|q| char::from(q.saturating_add(33)))
                .collect()
        };

        let mut line = format!(
            "{qname}\t{flag}\t{rname}\t{pos}\t{mapq}\t{cigar}\t{rnext}\t{pnext}\t{tlen}\t{sequence}\t{qualities}",
            qname = self.read_name.as_deref().unwrap_or("*"),
            flag = self.flags,
            pos = self.alignment_start.unwrap_or(0),
            mapq = self.mapping_quality.unwrap_or(255),
            cigar = self.cigar_string(),
            pnext = self.mate_alignment_start.unwrap_or(0),
            tlen = self.inferred_insert_size.unwrap_or(0),
        );
        for (name, value) in &self.tags {
            line.push_str(&format!("\t{name}:{}:{value}", value.type_code()));
        }
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_with_cigar(start: i64, cigar: Vec<CigarOp>) -> AlignmentRecord {
        AlignmentRecord {
            alignment_start: Some(start),
            cigar,
            ..AlignmentRecord::default()
        }
    }

    #[test]
    fn alignment_end_counts_reference_bases_only() {
        let record = record_with_cigar(
            100,
            vec![
                CigarOp::new(CigarOpKind::SoftClip, 5),
                CigarOp::new(CigarOpKind::Match, 10),
                CigarOp::new(CigarOpKind::Insertion, 2),
                CigarOp::new(CigarOpKind::Deletion, 3),
                CigarOp::new(CigarOpKind::Skip, 100),
            ],
        );
        assert_eq!(record.reference_length(), 113);
        assert_eq!(record.alignment_end(), Some(212));
    }

    #[test]
    fn empty_cigar_covers_start_only() {
        let record = record_with_cigar(42, Vec::new());
        assert_eq!(record.alignment_end(), Some(42));
        assert_eq!(record.cigar_string(), "*");
    }

    #[test]
    fn alignment_end_past_i64_is_none() {
        let record = record_with_cigar(i64::MAX - 5, vec![CigarOp::new(CigarOpKind::Match, 10)]);
        assert_eq!(record.alignment_end(), None);
    }

    #[test]
    fn set_tag_replaces_existing_value() {
        let mut record = AlignmentRecord::default();
        record.set_tag("NM", TagValue::Int(1));
        record.set_tag("RG", TagValue::String("rg1".into()));
        record.set_tag("NM", TagValue::Int(4));
        assert_eq!(record.tags.len(), 2);
        assert_eq!(record.tag("NM"), Some(&TagValue::Int(4)));
    }

    #[test]
    fn sam_line_for_unmapped_read() {
        let record = AlignmentRecord {
            read_name: Some("frag1".into()),
            flags: flags::UNMAPPED | flags::MATE_UNMAPPED,
            sequence: b"ACGT".to_vec(),
            base_qualities: vec![30, 30, 20, 10],
            ..AlignmentRecord::default()
        };
        assert_eq!(
            record.to_sam_line(),
            "frag1\t12\t*\t0\t255\t*\t*\t0\t0\tACGT\t??5+"
        );
    }

    #[test]
    fn cigar_codes_round_trip_through_kinds() {
        for kind in CigarOpKind::ALL {
            assert_eq!(CigarOpKind::from_code(kind.code()), Some(kind));
        }
        assert_eq!(CigarOpKind::from_code('Q'), None);
    }
}

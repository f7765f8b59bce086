//! SAM/BAM output through rust-htslib.

use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use rust_htslib::bam::{
    self,
    header::{Header, HeaderRecord},
    record::{Aux, AuxArray, Cigar, CigarString},
    HeaderView, Writer,
};

use crate::header::FileHeader;
use crate::model::{AlignmentRecord, CigarOp, CigarOpKind, TagArray, TagValue};

/// Output encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Text SAM.
    Sam,
    /// Compressed BAM.
    #[default]
    Bam,
}

impl From<OutputFormat> for bam::Format {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Sam => bam::Format::Sam,
            OutputFormat::Bam => bam::Format::Bam,
        }
    }
}

/// Translate a file header into an htslib header.
pub fn to_htslib_header(header: &FileHeader) -> Header {
    let mut out = Header::new();

    let mut hd = HeaderRecord::new(b"HD");
    hd.push_tag(b"VN", &header.version);
    hd.push_tag(b"SO", &header.sort_order.as_str());
    out.push_record(&hd);

    for sequence in &header.sequences {
        let mut sq = HeaderRecord::new(b"SQ");
        sq.push_tag(b"SN", &sequence.name);
        sq.push_tag(b"LN", &sequence.length);
        for (tag, value) in &sequence.other {
            sq.push_tag(tag.as_bytes(), value);
        }
        out.push_record(&sq);
    }

    for group in &header.read_groups {
        let mut rg = HeaderRecord::new(b"RG");
        for (tag, value) in group.tags() {
            rg.push_tag(tag.as_bytes(), &value);
        }
        out.push_record(&rg);
    }

    for program in &header.programs {
        let mut pg = HeaderRecord::new(b"PG");
        for (tag, value) in program.tags() {
            pg.push_tag(tag.as_bytes(), &value);
        }
        out.push_record(&pg);
    }

    for comment in &header.comments {
        out.push_comment(comment.as_bytes());
    }
    out
}

fn to_htslib_cigar(op: &CigarOp) -> Cigar {
    match op.kind {
        CigarOpKind::Match => Cigar::Match(op.len),
        CigarOpKind::Insertion => Cigar::Ins(op.len),
        CigarOpKind::Deletion => Cigar::Del(op.len),
        CigarOpKind::Skip => Cigar::RefSkip(op.len),
        CigarOpKind::SoftClip => Cigar::SoftClip(op.len),
        CigarOpKind::HardClip => Cigar::HardClip(op.len),
        CigarOpKind::Padding => Cigar::Pad(op.len),
        CigarOpKind::SequenceMatch => Cigar::Equal(op.len),
        CigarOpKind::SequenceMismatch => Cigar::Diff(op.len),
    }
}

fn tid(view: &HeaderView, name: Option<&str>) -> Result<i32> {
    let Some(name) = name else {
        return Ok(-1);
    };
    let tid = view
        .tid(name.as_bytes())
        .ok_or_else(|| anyhow!("reference {name} is not in the header"))?;
    i32::try_from(tid).with_context(|| format!("reference index of {name} out of range"))
}

fn push_tag(record: &mut bam::Record, name: &str, value: &TagValue) -> Result<()> {
    let tag = name.as_bytes();
    let aux = match value {
        TagValue::Char(c) => Aux::Char(*c),
        TagValue::Int(v) => {
            if let Ok(v) = i32::try_from(*v) {
                Aux::I32(v)
            } else if let Ok(v) = u32::try_from(*v) {
                Aux::U32(v)
            } else {
                bail!("tag {name} value {v} does not fit a BAM integer");
            }
        }
        TagValue::Float(v) => Aux::Float(*v),
        TagValue::String(v) => Aux::String(v.as_str()),
        TagValue::Hex(v) => Aux::HexByteArray(v.as_str()),
        TagValue::Array(array) => match array {
            TagArray::I8(v) => Aux::ArrayI8(AuxArray::from(v)),
            TagArray::U8(v) => Aux::ArrayU8(AuxArray::from(v)),
            TagArray::I16(v) => Aux::ArrayI16(AuxArray::from(v)),
            TagArray::U16(v) => Aux::ArrayU16(AuxArray::from(v)),
            TagArray::I32(v) => Aux::ArrayI32(AuxArray::from(v)),
            TagArray::U32(v) => Aux::ArrayU32(AuxArray::from(v)),
            TagArray::Float(v) => Aux::ArrayFloat(AuxArray::from(v)),
        },
    };
    record
        .push_aux(tag, aux)
        .with_context(|| format!("failed to add tag {name}"))
}

/// Build an htslib record. Missing qualities are written as `0xFF`; a
/// reference name absent from `view` is an error.
pub fn to_htslib_record(record: &AlignmentRecord, view: &HeaderView) -> Result<bam::Record> {
    let mut out = bam::Record::new();
    let name = record.read_name.as_deref().unwrap_or("*");
    let cigar = CigarString(record.cigar.iter().map(to_htslib_cigar).collect());
    let qualities = if record.base_qualities.is_empty() {
        vec![0xFF; record.sequence.len()]
    } else {
        record.base_qualities.clone()
    };
    if qualities.len() != record.sequence.len() {
        bail!(
            "read {name}: {} qualities for {} bases",
            qualities.len(),
            record.sequence.len()
        );
    }
    out.set(name.as_bytes(), Some(&cigar), &record.sequence, &qualities);

    out.set_flags(record.flags);
    out.set_tid(tid(view, record.reference_name.as_deref())?);
    out.set_pos(record.alignment_start.map_or(-1, |start| start - 1));
    out.set_mapq(record.mapping_quality.unwrap_or(255));
    out.set_mtid(tid(view, record.mate_reference_name.as_deref())?);
    out.set_mpos(record.mate_alignment_start.map_or(-1, |start| start - 1));
    out.set_insert_size(record.inferred_insert_size.map_or(0, i64::from));

    for (tag, value) in &record.tags {
        push_tag(&mut out, tag, value)?;
    }
    Ok(out)
}

/// Write `records` to `output` (stdout when `None`). Returns the number of
/// records written.
pub fn write_records<I>(
    output: Option<&Path>,
    format: OutputFormat,
    header: &FileHeader,
    records: I,
) -> Result<usize>
where
    I: IntoIterator<Item = AlignmentRecord>,
{
    let htslib_header = to_htslib_header(header);
    let view = HeaderView::from_header(&htslib_header);
    let mut writer = match output {
        Some(path) => Writer::from_path(path, &htslib_header, format.into())
            .with_context(|| format!("failed to create {}", path.display()))?,
        None => Writer::from_stdout(&htslib_header, format.into())
            .context("failed to open stdout for writing")?,
    };

    let mut written = 0;
    for record in records {
        let out = to_htslib_record(&record, &view)?;
        writer.write(&out).context("failed to write record")?;
        written += 1;
    }
    Ok(written)
}

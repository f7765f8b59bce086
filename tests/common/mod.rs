#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use ga4gh_sam::model::{
    CigarUnit, Experiment, Program, ReadGroup, ReadGroupSet, ReadsetMetadata, Reference, RestRead,
};
use ga4gh_sam::source::InMemorySource;

pub const READSET: &str = "rgs-1";

fn snapshot_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("snapshots")
}

pub fn assert_snapshot(name: &str, actual: &str) {
    let path = snapshot_root().join(name);
    if std::env::var("GA4GH_SAM_UPDATE_SNAPSHOTS").is_ok() {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create snapshot directory");
        }
        fs::write(&path, actual).expect("write snapshot");
        return;
    }

    let expected =
        fs::read_to_string(&path).unwrap_or_else(|_| panic!("snapshot {:?} not found", path));
    if normalize(&expected) != normalize(actual) {
        panic!(
            "Snapshot mismatch for {:?}. Set GA4GH_SAM_UPDATE_SNAPSHOTS=1 to regenerate.\nExpected:\n{}\nActual:\n{}",
            path,
            expected,
            actual
        );
    }
}

fn normalize(input: &str) -> String {
    input.replace("\r\n", "\n")
}

pub fn metadata() -> ReadsetMetadata {
    ReadsetMetadata {
        read_group_set: ReadGroupSet {
            id: Some(READSET.into()),
            name: Some("NA12878 exome".into()),
            read_groups: vec![ReadGroup {
                id: Some("svc-rg-1".into()),
                name: Some("NA12878.L1".into()),
                sample_id: Some("NA12878".into()),
                predicted_insert_size: Some(300),
                experiment: Some(Experiment {
                    library_id: Some("lib-A".into()),
                    sequencing_center: Some("BI".into()),
                    instrument_model: Some("ILLUMINA".into()),
                    platform_unit: Some("H0164.1".into()),
                }),
                programs: vec![
                    Program {
                        id: Some("bwa".into()),
                        name: Some("bwa".into()),
                        version: Some("0.7.17".into()),
                        command_line: Some("bwa mem ref.fa r1.fq r2.fq".into()),
                        ..Program::default()
                    },
                    Program {
                        id: Some("markdup".into()),
                        prev_program_id: Some("bwa".into()),
                        ..Program::default()
                    },
                ],
                ..ReadGroup::default()
            }],
            ..ReadGroupSet::default()
        },
        references: vec![Reference::new("chr1", 10_000), Reference::new("chr2", 5_000)],
    }
}

/// Mapped read with a 10M alignment at a 0-based position.
pub fn mapped(name: &str, reference: &str, pos: i64) -> RestRead {
    let mut read = RestRead::new(name)
        .with_alignment(
            reference,
            pos,
            false,
            vec![CigarUnit::new("ALIGNMENT_MATCH", 10)],
        )
        .with_mapping_quality(60)
        .with_sequence("ACGTACGTAC", vec![30; 10]);
    read.read_group_id = Some("svc-rg-1".into());
    read
}

/// One end of a pair.
pub fn pair_end(read: RestRead, read_number: i32) -> RestRead {
    read.with_read_number(read_number, 2)
}

/// Coordinate-sorted readset with unmapped reads last:
///
/// - `F1`: both ends mapped on chr1 (100 and 300)
/// - `F2`: first end mapped on chr1 at 500, second end unmapped
/// - `S1`: unpaired read on chr1 at 2000
/// - `C1`: unpaired read on chr2 at 100
/// - `U1`: both ends unmapped
pub fn reads() -> Vec<RestRead> {
    let mut f2_unmapped = RestRead::new("F2")
        .with_read_number(1, 2)
        .with_mate("chr1", 499, false)
        .with_sequence("TTTTTTTTTT", vec![20; 10]);
    f2_unmapped.read_group_id = Some("svc-rg-1".into());

    vec![
        pair_end(mapped("F1", "chr1", 99), 0).with_mate("chr1", 299, true),
        pair_end(mapped("F1", "chr1", 299), 1).with_mate("chr1", 99, false),
        pair_end(mapped("F2", "chr1", 499), 0),
        mapped("S1", "chr1", 1_999).with_read_number(0, 1),
        mapped("C1", "chr2", 99).with_read_number(0, 1),
        f2_unmapped,
        pair_end(RestRead::new("U1"), 0),
        pair_end(RestRead::new("U1"), 1),
    ]
}

pub fn source() -> InMemorySource<RestRead> {
    InMemorySource::new(READSET, metadata(), reads())
}

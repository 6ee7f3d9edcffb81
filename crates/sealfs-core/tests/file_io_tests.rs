//! Random-access I/O properties: round trips, truncation semantics and
//! tamper detection, exercised through the full volume stack.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

use proptest::prelude::*;
use tempfile::TempDir;

use sealfs_core::error::VolumeError;
use sealfs_core::fs::BLOCK_SIZE;
use sealfs_core::vault::operations::FILE_MODE;
use sealfs_core::vault::Volume;
use sealfs_core::{CreateOptions, Credential, FilenameMode, create_volume};

fn test_options() -> CreateOptions {
    CreateOptions {
        kdf_log_n: 10,
        ..CreateOptions::default()
    }
}

fn open_volume(options: &CreateOptions) -> (TempDir, Volume, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().join("vol");
    create_volume(&root, "pw", options).unwrap();
    let (volume, _) = Volume::open(&root, Credential::Passphrase("pw")).unwrap();
    (tmp, volume, root)
}

fn write_all(volume: &Volume, path: &str, offset: u64, data: &[u8]) {
    let handle = volume.open_write(path, FILE_MODE).unwrap();
    volume.write_at(handle, offset, data).unwrap();
    volume.close_file(handle).unwrap();
}

fn read_range(volume: &Volume, path: &str, offset: u64, length: usize) -> Vec<u8> {
    let handle = volume.open_read(path).unwrap();
    let mut out = Vec::new();
    // Loop to cover spans larger than a single engine read.
    while out.len() < length {
        let chunk = volume
            .read_at(handle, offset + out.len() as u64, length - out.len())
            .unwrap();
        if chunk.is_empty() {
            break;
        }
        out.extend_from_slice(&chunk);
    }
    volume.close_file(handle).unwrap();
    out
}

#[test]
fn round_trip_at_awkward_offsets() {
    let (_tmp, volume, _root) = open_volume(&test_options());
    let cases: &[(u64, usize)] = &[
        (0, 1),
        (0, BLOCK_SIZE),
        (1, BLOCK_SIZE),
        (BLOCK_SIZE as u64 - 1, 2),
        (BLOCK_SIZE as u64, BLOCK_SIZE + 1),
        (3 * BLOCK_SIZE as u64 + 17, 2 * BLOCK_SIZE + 3),
    ];
    for (i, &(offset, len)) in cases.iter().enumerate() {
        let path = format!("/case-{i}");
        let data: Vec<u8> = (0..len).map(|j| (j * 31 % 251) as u8).collect();
        write_all(&volume, &path, offset, &data);
        assert_eq!(
            read_range(&volume, &path, offset, len),
            data,
            "case {i}: offset {offset}, len {len}"
        );
        assert_eq!(
            volume.get_attrs(&path).unwrap().size,
            offset + len as u64,
            "case {i} size"
        );
        // The gap before the write reads as zeros.
        if offset > 0 {
            let gap = read_range(&volume, &path, 0, offset as usize);
            assert!(gap.iter().all(|&b| b == 0), "case {i} gap not zeroed");
        }
    }
}

#[test]
fn overwrites_are_read_back_exactly() {
    let (_tmp, volume, _root) = open_volume(&test_options());
    let base: Vec<u8> = (0..3 * BLOCK_SIZE).map(|i| (i % 256) as u8).collect();
    write_all(&volume, "/f", 0, &base);

    let handle = volume.open_write("/f", FILE_MODE).unwrap();
    volume.write_at(handle, 100, &[0xEE; 50]).unwrap();
    volume
        .write_at(handle, BLOCK_SIZE as u64 - 10, &[0xDD; 20])
        .unwrap();
    volume.close_file(handle).unwrap();

    let mut expected = base;
    expected[100..150].fill(0xEE);
    expected[BLOCK_SIZE - 10..BLOCK_SIZE + 10].fill(0xDD);
    assert_eq!(read_range(&volume, "/f", 0, expected.len()), expected);
}

#[test]
fn truncate_semantics() {
    let (_tmp, volume, _root) = open_volume(&test_options());
    let data: Vec<u8> = (0..2 * BLOCK_SIZE + 100).map(|i| (i % 256) as u8).collect();
    write_all(&volume, "/t", 0, &data);

    // Truncating to the current length is observably a no-op.
    volume.truncate("/t", data.len() as u64).unwrap();
    assert_eq!(read_range(&volume, "/t", 0, data.len()), data);

    // Shrink to a partial block.
    volume.truncate("/t", BLOCK_SIZE as u64 + 5).unwrap();
    assert_eq!(volume.get_attrs("/t").unwrap().size, BLOCK_SIZE as u64 + 5);
    assert_eq!(
        read_range(&volume, "/t", 0, BLOCK_SIZE + 5),
        &data[..BLOCK_SIZE + 5]
    );

    // Grow sparsely: the extension reads as zeros, not garbage.
    volume.truncate("/t", 4 * BLOCK_SIZE as u64).unwrap();
    let grown = read_range(&volume, "/t", 0, 4 * BLOCK_SIZE);
    assert_eq!(grown.len(), 4 * BLOCK_SIZE);
    assert_eq!(&grown[..BLOCK_SIZE + 5], &data[..BLOCK_SIZE + 5]);
    assert!(grown[BLOCK_SIZE + 5..].iter().all(|&b| b == 0));

    // Truncate to zero, then rewrite.
    volume.truncate("/t", 0).unwrap();
    assert_eq!(volume.get_attrs("/t").unwrap().size, 0);
    write_all(&volume, "/t", 0, b"fresh");
    assert_eq!(read_range(&volume, "/t", 0, 5), b"fresh");
}

#[test]
fn truncate_creates_missing_files() {
    let (_tmp, volume, _root) = open_volume(&test_options());
    volume.truncate("/new", 1000).unwrap();
    let attrs = volume.get_attrs("/new").unwrap();
    assert_eq!(attrs.size, 1000);
    assert!(read_range(&volume, "/new", 0, 1000).iter().all(|&b| b == 0));
}

#[test]
fn zero_length_io_succeeds() {
    let (_tmp, volume, _root) = open_volume(&test_options());
    let handle = volume.open_write("/z", FILE_MODE).unwrap();
    assert_eq!(volume.write_at(handle, 0, b"").unwrap(), 0);
    assert!(volume.read_at(handle, 0, 0).unwrap().is_empty());
    assert!(volume.read_at(handle, 12345, 0).unwrap().is_empty());
    volume.close_file(handle).unwrap();
    assert_eq!(volume.get_attrs("/z").unwrap().size, 0);
}

#[test]
fn bit_flip_in_ciphertext_is_detected() {
    // Plaintext names make the backing file trivial to locate.
    let options = CreateOptions {
        filename_mode: FilenameMode::Plaintext,
        ..test_options()
    };
    let (_tmp, volume, root) = open_volume(&options);
    let data = vec![0x42u8; 2 * BLOCK_SIZE];
    write_all(&volume, "/victim", 0, &data);

    let backing = root.join("victim");
    let original = std::fs::read(&backing).unwrap();

    // Flip one bit at a sample of positions across the ciphertext; every
    // read covering the damaged block must fail, never return altered
    // plaintext.
    for position in [20, 100, original.len() / 2, original.len() - 1] {
        let mut tampered = original.clone();
        tampered[position] ^= 0x01;
        std::fs::write(&backing, &tampered).unwrap();

        let handle = volume.open_read("/victim").unwrap();
        let result = volume.read_at(handle, 0, data.len());
        volume.close_file(handle).unwrap();
        assert!(
            matches!(result, Err(VolumeError::IntegrityViolation { .. })),
            "bit flip at byte {position} went undetected: {result:?}"
        );
    }

    // Restored ciphertext reads cleanly again.
    std::fs::write(&backing, &original).unwrap();
    assert_eq!(read_range(&volume, "/victim", 0, data.len()), data);
}

#[test]
fn truncating_backing_file_is_detected_or_shortened_consistently() {
    let options = CreateOptions {
        filename_mode: FilenameMode::Plaintext,
        ..test_options()
    };
    let (_tmp, volume, root) = open_volume(&options);
    write_all(&volume, "/victim", 0, &[1u8; BLOCK_SIZE + 100]);

    // Chop the backing file mid-block: the damaged block must not decrypt.
    let backing = root.join("victim");
    let raw = std::fs::read(&backing).unwrap();
    std::fs::write(&backing, &raw[..raw.len() - 10]).unwrap();

    let handle = volume.open_read("/victim").unwrap();
    let result = volume.read_at(handle, BLOCK_SIZE as u64, 100);
    volume.close_file(handle).unwrap();
    assert!(result.is_err(), "truncated tail decrypted: {result:?}");
}

/// Model-based random testing: a sequence of writes and truncates against
/// an in-memory reference file must read back identically.
#[derive(Debug, Clone)]
enum Op {
    Write { offset: u64, data: Vec<u8> },
    Truncate { len: u64 },
}

fn op_strategy() -> impl Strategy<Value = Op> {
    let max = 4 * BLOCK_SIZE as u64;
    prop_oneof![
        (0..max, proptest::collection::vec(any::<u8>(), 1..2000))
            .prop_map(|(offset, data)| Op::Write { offset, data }),
        (0..max).prop_map(|len| Op::Truncate { len }),
    ]
}

static CASE_COUNTER: AtomicUsize = AtomicUsize::new(0);

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn random_ops_match_reference_model(ops in proptest::collection::vec(op_strategy(), 1..12)) {
        // One volume per process would be ideal, but proptest cases are
        // independent; a cheap KDF keeps per-case setup tolerable.
        static VOLUME: std::sync::OnceLock<(TempDir, Volume)> = std::sync::OnceLock::new();
        let (_, volume) = VOLUME.get_or_init(|| {
            let (tmp, volume, _) = open_volume(&test_options());
            (tmp, volume)
        });

        let case = CASE_COUNTER.fetch_add(1, Ordering::Relaxed);
        let path = format!("/model-{case}");
        let mut model: Vec<u8> = Vec::new();

        for op in &ops {
            match op {
                Op::Write { offset, data } => {
                    write_all(volume, &path, *offset, data);
                    let end = *offset as usize + data.len();
                    if model.len() < end {
                        model.resize(end, 0);
                    }
                    model[*offset as usize..end].copy_from_slice(data);
                }
                Op::Truncate { len } => {
                    volume.truncate(&path, *len).unwrap();
                    model.resize(*len as usize, 0);
                }
            }
        }

        prop_assert_eq!(volume.get_attrs(&path).unwrap().size, model.len() as u64);
        let read = read_range(volume, &path, 0, model.len());
        prop_assert_eq!(read, model);
    }
}

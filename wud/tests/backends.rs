use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, LazyLock};

use wud::Error;
use wud::address::{AddressSpace, SECTOR_SIZE};
use wud::store::{LinearStore, SplitStore, WuxStore};

const SHARD_SIZE: u64 = 0x18000;
const IMAGE_SIZE: usize = 3 * SHARD_SIZE as usize;

static FIXTURE_DIR: LazyLock<PathBuf> = LazyLock::new(|| {
    let dir = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../target/wud-tests");
    fs::create_dir_all(&dir).ok();
    dir
});

/// Deterministic image bytes (LCG), so every backend fixture agrees.
fn pattern(len: usize, seed: u32) -> Vec<u8> {
    let mut state = seed;
    (0..len)
        .map(|_| {
            state = state.wrapping_mul(1664525).wrapping_add(1013904223);
            (state >> 24) as u8
        })
        .collect()
}

fn write_linear(name: &str, data: &[u8]) -> PathBuf {
    let path = FIXTURE_DIR.join(name);
    fs::write(&path, data).unwrap();
    path
}

fn write_shards(prefix: &str, data: &[u8], shard_size: usize) -> Vec<PathBuf> {
    data.chunks(shard_size)
        .enumerate()
        .map(|(i, chunk)| {
            let path = FIXTURE_DIR.join(format!("{prefix}{i}.part"));
            fs::write(&path, chunk).unwrap();
            path
        })
        .collect()
}

/// Build a WUX container holding `data`, with logical sector `i` stored at
/// physical sector `index[i]` (`u32::MAX` = hole, logical zeros).
fn write_wux(name: &str, data: &[u8], sector_size: u32, index: &[u32]) -> PathBuf {
    let ss = sector_size as usize;
    let mut out = Vec::new();
    out.extend_from_slice(&wud::store::WUX_MAGIC_0.to_le_bytes());
    out.extend_from_slice(&wud::store::WUX_MAGIC_1.to_le_bytes());
    out.extend_from_slice(&sector_size.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes()); // flags
    out.extend_from_slice(&(data.len() as u64).to_le_bytes());
    out.extend_from_slice(&[0u8; 8]);
    for &entry in index {
        out.extend_from_slice(&entry.to_le_bytes());
    }

    let data_offset = out.len().div_ceil(ss) * ss;
    let physical_sectors = index
        .iter()
        .filter(|&&e| e != u32::MAX)
        .map(|&e| e as usize + 1)
        .max()
        .unwrap_or(0);
    out.resize(data_offset + physical_sectors * ss, 0);

    for (i, &entry) in index.iter().enumerate() {
        if entry == u32::MAX {
            continue;
        }
        let chunk = &data[i * ss..((i + 1) * ss).min(data.len())];
        let at = data_offset + entry as usize * ss;
        out[at..at + chunk.len()].copy_from_slice(chunk);
    }

    let path = FIXTURE_DIR.join(name);
    fs::write(&path, out).unwrap();
    path
}

fn reversed_index(sectors: usize) -> Vec<u32> {
    (0..sectors as u32).rev().collect()
}

#[test]
fn backends_agree_on_unaligned_windows() {
    let data = pattern(IMAGE_SIZE, 0x1001);
    let linear = write_linear("agree.img", &data);
    let shards = write_shards("agree_", &data, SHARD_SIZE as usize);
    let sectors = IMAGE_SIZE.div_ceil(SECTOR_SIZE);
    let wux = write_wux("agree.wux", &data, SECTOR_SIZE as u32, &reversed_index(sectors));

    let spaces = [
        AddressSpace::new(Arc::new(LinearStore::open(&linear).unwrap())),
        AddressSpace::new(Arc::new(SplitStore::open(shards, SHARD_SIZE).unwrap())),
        AddressSpace::new(Arc::new(WuxStore::open(&wux).unwrap())),
    ];

    let windows: [(u64, usize); 6] = [
        (0, 1),
        (0x7FFF, 2),
        (5, SECTOR_SIZE),
        (0x10000, 0x20000),
        (IMAGE_SIZE as u64 - 0x10, 0x10),
        (0, IMAGE_SIZE),
    ];
    for space in &spaces {
        assert_eq!(space.size(), IMAGE_SIZE as u64);
        for &(offset, length) in &windows {
            let got = space.read(offset, length).unwrap();
            assert_eq!(
                got,
                &data[offset as usize..offset as usize + length],
                "window {offset:#x}+{length:#x}"
            );
        }
    }
}

#[test]
fn sector_reads_concatenate_like_one_large_read() {
    let data = pattern(IMAGE_SIZE, 0x2002);
    let path = write_linear("concat.img", &data);
    let space = AddressSpace::new(Arc::new(LinearStore::open(&path).unwrap()));

    let whole = space.read(0, IMAGE_SIZE).unwrap();
    let mut pieced = Vec::new();
    let mut offset = 0;
    while offset < IMAGE_SIZE {
        let length = SECTOR_SIZE.min(IMAGE_SIZE - offset);
        pieced.extend_from_slice(&space.read(offset as u64, length).unwrap());
        offset += length;
    }
    assert_eq!(whole, pieced);
}

#[test]
fn wux_remap_places_sectors_physically() {
    let ss = SECTOR_SIZE;
    let data = pattern(3 * ss, 0x3003);
    let path = write_wux("remap.wux", &data, ss as u32, &[2, 0, 1]);

    // Logical reads resolve through the table.
    let space = AddressSpace::new(Arc::new(WuxStore::open(&path).unwrap()));
    assert_eq!(space.read(0, ss).unwrap(), &data[..ss]);
    assert_eq!(space.read(0x10000, ss).unwrap(), &data[2 * ss..]);

    // And the raw file really holds logical sector 0 at physical sector 2
    // and logical sector 2 at physical sector 1.
    let raw = fs::read(&path).unwrap();
    let data_offset = ss; // header + 3 entries, aligned up to one sector
    assert_eq!(&raw[data_offset + 2 * ss..data_offset + 3 * ss], &data[..ss]);
    assert_eq!(
        &raw[data_offset + ss..data_offset + 2 * ss],
        &data[2 * ss..]
    );
}

#[test]
fn wux_unmapped_sectors_read_as_zeros() {
    let ss = SECTOR_SIZE;
    let mut data = pattern(3 * ss, 0x4004);
    data[ss..2 * ss].fill(0);
    let path = write_wux("holes.wux", &data, ss as u32, &[1, u32::MAX, 0]);

    let space = AddressSpace::new(Arc::new(WuxStore::open(&path).unwrap()));
    assert_eq!(space.read(0, 3 * ss).unwrap(), data);
    assert_eq!(space.read(ss as u64 + 7, 0x100).unwrap(), vec![0u8; 0x100]);
}

#[test]
fn wux_rejects_bad_magic() {
    let path = FIXTURE_DIR.join("badmagic.wux");
    fs::write(&path, vec![0u8; 0x40]).unwrap();
    assert!(matches!(
        WuxStore::open(&path).unwrap_err(),
        Error::BadMagic { .. }
    ));
}

#[test]
fn wux_rejects_truncated_index_table() {
    let ss = SECTOR_SIZE;
    let data = pattern(2 * ss, 0x5005);
    let path = write_wux("truncated.wux", &data, ss as u32, &[0, 1]);
    let full = fs::read(&path).unwrap();
    // Cut the file inside the index table.
    fs::write(&path, &full[..0x24]).unwrap();

    assert!(matches!(
        WuxStore::open(&path).unwrap_err(),
        Error::InvalidHeader(_)
    ));
}

#[test]
fn split_read_crosses_shard_boundary() {
    let data = pattern(IMAGE_SIZE, 0x6006);
    let shards = write_shards("cross_", &data, SHARD_SIZE as usize);
    let space = AddressSpace::new(Arc::new(SplitStore::open(shards, SHARD_SIZE).unwrap()));

    // 0x10000 + 0x20000 ends at 0x30000, past the first shard's 0x18000.
    let got = space.read(0x10000, 0x20000).unwrap();
    assert_eq!(got, &data[0x10000..0x30000]);
}

#[test]
fn split_missing_shard_is_fatal() {
    let data = pattern(SHARD_SIZE as usize, 0x7007);
    let mut shards = write_shards("gone_", &data, SHARD_SIZE as usize);
    shards.push(FIXTURE_DIR.join("gone_does_not_exist.part"));

    assert!(matches!(
        SplitStore::open(shards, SHARD_SIZE).unwrap_err(),
        Error::MissingShard(_)
    ));
}

#[test]
fn repeated_reads_return_identical_bytes() {
    let data = pattern(IMAGE_SIZE, 0x8008);
    let sectors = IMAGE_SIZE.div_ceil(SECTOR_SIZE);
    let path = write_wux("repeat.wux", &data, SECTOR_SIZE as u32, &reversed_index(sectors));
    let space = AddressSpace::new(Arc::new(WuxStore::open(&path).unwrap()));

    let first = space.read(0x1234, 0x9000).unwrap();
    for _ in 0..3 {
        assert_eq!(space.read(0x1234, 0x9000).unwrap(), first);
    }
}

#[test]
fn reads_past_declared_size_are_rejected() {
    let data = pattern(SECTOR_SIZE, 0x9009);
    let path = write_linear("bounds.img", &data);
    let space = AddressSpace::new(Arc::new(LinearStore::open(&path).unwrap()));

    assert!(space.read(0, SECTOR_SIZE).is_ok());
    assert!(matches!(
        space.read(1, SECTOR_SIZE).unwrap_err(),
        Error::OutOfBounds { .. }
    ));
    assert!(matches!(
        space.read(u64::MAX, 2).unwrap_err(),
        Error::OutOfBounds { .. }
    ));
}

#[test]
fn narrow_scopes_a_window() {
    let data = pattern(IMAGE_SIZE, 0xA00A);
    let path = write_linear("narrow.img", &data);
    // A coarser physical granularity must not change what callers see.
    let space =
        AddressSpace::new(Arc::new(LinearStore::open(&path).unwrap())).with_sector_size(0x10000);

    let inner = space.narrow(SHARD_SIZE, SHARD_SIZE).unwrap();
    assert_eq!(inner.size(), SHARD_SIZE);
    assert_eq!(
        inner.read(0x10, 0x100).unwrap(),
        &data[SHARD_SIZE as usize + 0x10..SHARD_SIZE as usize + 0x110]
    );
    assert!(inner.read(SHARD_SIZE - 1, 2).is_err());
}

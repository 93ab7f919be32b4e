//! Map workload.

use super::{resident, CliResult, Report, StoreTarget, WorkloadArgs};
use lazyseg_core::{
    BackedPayloads, Config, FixedState, LazyMap, MapEntry, MapManifest, MapSegmentInfo,
    MemoryPayloads, NeverPolicy, PayloadStore,
};
use lazyseg_storage::FileStore;
use std::fs;
use std::path::Path;
use tracing::info;

/// Manifest file written next to the blob log.
pub const MAP_MANIFEST: &str = "map.manifest";

type Payload = Vec<MapEntry<String, u64>>;

fn key(n: u64) -> String {
    format!("key-{n:08}")
}

/// Runs the map workload.
///
/// Stores `key-N -> N` for `0..count`, looks every key up, then removes
/// entries with a value divisible by three through a cursor. With a
/// directory store, the map of a previous run is released first and the
/// new manifest is saved.
pub fn run(store: &StoreTarget, args: &WorkloadArgs) -> CliResult<()> {
    let report = match store {
        StoreTarget::Memory => workload(MemoryPayloads::new(), store, args)?.0,
        StoreTarget::Directory(path) => {
            let payloads = BackedPayloads::new(FileStore::open(path)?);
            release_previous(path, payloads.clone())?;
            let (report, manifest) = workload(payloads, store, args)?;
            fs::write(path.join(MAP_MANIFEST), manifest.encode()?)?;
            report
        }
    };
    report.print(args.format, args.segments)
}

fn release_previous(path: &Path, payloads: BackedPayloads<FileStore>) -> CliResult<()> {
    let manifest_path = path.join(MAP_MANIFEST);
    if !manifest_path.exists() {
        return Ok(());
    }
    let manifest = MapManifest::decode(&fs::read(&manifest_path)?)?;
    let mut previous: LazyMap<String, u64, _> = LazyMap::open(
        &manifest,
        payloads,
        Box::new(NeverPolicy),
        FixedState::default(),
    )?;
    info!(
        segments = previous.segment_count(),
        len = previous.len(),
        "releasing previous map"
    );
    previous.clear();
    fs::remove_file(manifest_path)?;
    Ok(())
}

fn workload<S>(
    payloads: S,
    store: &StoreTarget,
    args: &WorkloadArgs,
) -> CliResult<(Report<MapSegmentInfo>, MapManifest)>
where
    S: PayloadStore<Payload>,
{
    let config = Config::for_map()
        .max_segment_size(args.segment_size)
        .eviction(args.policy);
    let mut map: LazyMap<String, u64, S> = LazyMap::with_store(config, payloads)?;

    let count = args.count as u64;
    let inserted = map.put_all((0..count).map(|n| (key(n), n)))?;
    let persisted = map.flush()?;
    info!(inserted, persisted, segments = map.segment_count(), "filled map");

    let mut checksum = 0u64;
    for n in 0..count {
        if let Some(value) = map.get(key(n).as_str())? {
            checksum = checksum.wrapping_add(*value);
        }
    }

    let mut removed = 0;
    let mut cursor = map.value_cursor();
    while let Some(value) = cursor.next(&mut map) {
        if value? % 3 == 0 {
            cursor.remove(&mut map)?;
            removed += 1;
        }
    }
    info!(removed, segments = map.segment_count(), "thinned map");

    let manifest = map.checkpoint()?;
    map.verify()?;

    let segments = map.segments();
    let report = Report {
        container: "map",
        store: store.to_string(),
        policy: args.policy.to_string(),
        inserted,
        removed,
        len: map.len(),
        checksum,
        resident: resident(&segments),
        segments,
        stats: map.stats().snapshot(),
    };
    Ok((report, manifest))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::OutputFormat;
    use lazyseg_core::EvictionConfig;
    use tempfile::tempdir;

    fn args(count: usize) -> WorkloadArgs {
        WorkloadArgs {
            count,
            segment_size: 8,
            policy: EvictionConfig::Recency { resident: 3 },
            format: OutputFormat::Json,
            segments: false,
        }
    }

    #[test]
    fn memory_workload_thins_map() {
        let (report, manifest) =
            workload(MemoryPayloads::new(), &StoreTarget::Memory, &args(90)).unwrap();
        assert_eq!(report.inserted, 90);
        assert_eq!(report.removed, 30);
        assert_eq!(report.len, 60);
        assert_eq!(report.checksum, (0..90u64).sum::<u64>());
        assert_eq!(manifest.len(), 60);
        assert!(report.segments.len() > 1);
        assert!(report.stats.splits > 0);
    }

    #[test]
    fn directory_runs_replace_each_other() {
        let dir = tempdir().unwrap();
        let target = StoreTarget::Directory(dir.path().to_path_buf());

        run(&target, &args(40)).unwrap();
        run(&target, &args(40)).unwrap();

        let store = FileStore::open(dir.path()).unwrap();
        let manifest =
            MapManifest::decode(&fs::read(dir.path().join(MAP_MANIFEST)).unwrap()).unwrap();
        assert_eq!(
            lazyseg_storage::SegmentStore::len(&store),
            manifest.segments.len()
        );
    }
}

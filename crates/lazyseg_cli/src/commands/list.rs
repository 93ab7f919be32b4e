//! List workload.

use super::{resident, CliResult, Report, StoreTarget, WorkloadArgs};
use lazyseg_core::{
    BackedPayloads, Config, LazyList, ListManifest, MemoryPayloads, NeverPolicy, PayloadStore,
    SegmentInfo,
};
use lazyseg_storage::FileStore;
use std::fs;
use std::path::Path;
use tracing::info;

/// Manifest file written next to the blob log.
pub const LIST_MANIFEST: &str = "list.manifest";

/// Runs the list workload.
///
/// Fills a list with `0..count`, reads it back in order, removes every
/// multiple of three and consolidates. With a directory store, the list
/// of a previous run is released first and the new manifest is saved.
pub fn run(store: &StoreTarget, args: &WorkloadArgs) -> CliResult<()> {
    let report = match store {
        StoreTarget::Memory => workload(MemoryPayloads::new(), store, args)?.0,
        StoreTarget::Directory(path) => {
            let payloads = BackedPayloads::new(FileStore::open(path)?);
            release_previous(path, payloads.clone())?;
            let (report, manifest) = workload(payloads, store, args)?;
            fs::write(path.join(LIST_MANIFEST), manifest.encode()?)?;
            report
        }
    };
    report.print(args.format, args.segments)
}

fn release_previous(path: &Path, payloads: BackedPayloads<FileStore>) -> CliResult<()> {
    let manifest_path = path.join(LIST_MANIFEST);
    if !manifest_path.exists() {
        return Ok(());
    }
    let manifest = ListManifest::decode(&fs::read(&manifest_path)?)?;
    let mut previous: LazyList<u64, _> =
        LazyList::open(&manifest, payloads, Box::new(NeverPolicy))?;
    info!(
        segments = previous.segment_count(),
        len = previous.len(),
        "releasing previous list"
    );
    previous.clear();
    fs::remove_file(manifest_path)?;
    Ok(())
}

fn workload<S>(
    payloads: S,
    store: &StoreTarget,
    args: &WorkloadArgs,
) -> CliResult<(Report<SegmentInfo>, ListManifest)>
where
    S: PayloadStore<Vec<u64>>,
{
    let config = Config::for_list()
        .max_segment_size(args.segment_size)
        .eviction(args.policy);
    let mut list = LazyList::with_store(config, payloads)?;

    let inserted = list.extend(0..args.count as u64)?;
    let persisted = list.flush()?;
    info!(inserted, persisted, segments = list.segment_count(), "filled list");

    let mut checksum = 0u64;
    for index in 0..list.len() {
        checksum = checksum.wrapping_add(*list.get(index)?);
    }

    let removed = list.remove_if(|value| value % 3 == 0)?;
    let merged = list.consolidate()?;
    info!(removed, merged, segments = list.segment_count(), "thinned list");

    let manifest = list.checkpoint()?;
    list.verify()?;

    let segments = list.segments();
    let report = Report {
        container: "list",
        store: store.to_string(),
        policy: args.policy.to_string(),
        inserted,
        removed,
        len: list.len(),
        checksum,
        resident: resident(&segments),
        segments,
        stats: list.stats().snapshot(),
    };
    Ok((report, manifest))
}

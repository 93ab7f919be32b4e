//! Compact command implementation.

use super::CliResult;
use lazyseg_storage::FileStore;
use std::path::Path;

/// Runs the compact command.
pub fn run(path: &Path, dry_run: bool) -> CliResult<()> {
    let store = FileStore::open(path)?;

    println!("Compacting file store at {:?}", path);
    if dry_run {
        println!("(dry run - no changes will be made)");
    }
    println!();
    println!("  Live payloads: {}", store.live_keys().len());
    println!("  Log size:      {} bytes", store.log_size());

    if dry_run {
        return Ok(());
    }

    let reclaimed = store.compact()?;
    println!("  Reclaimed:     {} bytes", reclaimed);
    println!();
    println!("✓ Compaction complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lazyseg_storage::SegmentStore;
    use tempfile::tempdir;

    #[test]
    fn compact_reclaims_overwritten_payloads() {
        let dir = tempdir().unwrap();
        {
            let store = FileStore::open(dir.path()).unwrap();
            for round in 0..3u8 {
                store.write(&[1; 16], &[round; 64]).unwrap();
            }
        }

        run(dir.path(), true).unwrap();
        let before = FileStore::open(dir.path()).unwrap().log_size();

        run(dir.path(), false).unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        assert!(store.log_size() < before);
        assert_eq!(store.read(&[1; 16]).unwrap(), Some(vec![2; 64]));
    }
}

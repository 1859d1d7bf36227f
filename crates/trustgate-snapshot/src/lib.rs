//! # trustgate-snapshot
//!
//! Pre-execution snapshots and exact rollback for the TRUSTGATE trust layer.
//!
//! ## Overview
//!
//! Before a run executes, [`DirSnapshotStore`] captures every path the plan
//! names (plus ancestors, plus the contents of named directories) as file
//! bytes, a directory, or "absent". Restoring the snapshot puts each of
//! those paths back exactly: files the run created are removed, files it
//! changed or deleted get their old bytes back.
//!
//! ```rust,ignore
//! use trustgate_snapshot::DirSnapshotStore;
//!
//! let store = DirSnapshotStore::open(".trustgate/snapshots")?;
//! store.capture(run_id, &sandbox, Environment::Dev, &plan.touched_paths())?;
//! // ... execute ...
//! store.restore(run_id, &sandbox)?;
//! ```

pub mod capture;
pub mod restore;
pub mod store;

pub use store::{DirSnapshotStore, SnapshotSummary};

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::fs;
    use std::path::Path;

    use tempfile::{tempdir, TempDir};

    use trustgate_contracts::{
        action::Environment,
        error::TrustError,
        plan::{Plan, RunId},
        snapshot::CapturedState,
    };
    use trustgate_core::{parse_plan, traits::SnapshotStore, Executor, Sandbox};

    use super::DirSnapshotStore;

    // ── Helpers ───────────────────────────────────────────────────────────────

    struct Fixture {
        _dir: TempDir,
        sandbox: Sandbox,
        store: DirSnapshotStore,
        executor: Executor,
    }

    fn fixture() -> Fixture {
        let dir = tempdir().unwrap();
        let sandbox = Sandbox::open(dir.path().join("sandbox")).unwrap();
        let store = DirSnapshotStore::open(dir.path().join("snapshots")).unwrap();
        let executor = Executor::new(sandbox.clone());
        Fixture { _dir: dir, sandbox, store, executor }
    }

    /// Every file (with bytes) and directory (with `None`) under `root`.
    fn tree(root: &Path) -> BTreeMap<String, Option<Vec<u8>>> {
        fn walk(root: &Path, dir: &Path, out: &mut BTreeMap<String, Option<Vec<u8>>>) {
            for entry in fs::read_dir(dir).unwrap() {
                let path = entry.unwrap().path();
                let rel = path.strip_prefix(root).unwrap().to_string_lossy().replace('\\', "/");
                if path.is_dir() {
                    out.insert(rel, None);
                    walk(root, &path, out);
                } else {
                    out.insert(rel, Some(fs::read(&path).unwrap()));
                }
            }
        }
        let mut out = BTreeMap::new();
        walk(root, root, &mut out);
        out
    }

    fn seed(f: &Fixture) {
        let ws = f.sandbox.workspace(Environment::Dev);
        fs::create_dir_all(ws.join("tmp")).unwrap();
        fs::create_dir_all(ws.join("old")).unwrap();
        fs::create_dir_all(ws.join("docs/api")).unwrap();
        fs::write(ws.join("tmp/output.txt"), "hello").unwrap();
        fs::write(ws.join("old/legacy.sql"), "").unwrap();
        fs::write(ws.join("docs/api/index.md"), "# API").unwrap();
    }

    /// Capture, apply every action (ignoring failures), restore, and check
    /// the workspace is byte-identical to before.
    fn round_trip(text: &str) {
        let f = fixture();
        seed(&f);
        let ws = f.sandbox.workspace(Environment::Dev);
        let before = tree(&ws);

        let actions = parse_plan(text, Environment::Dev).unwrap();
        let plan = Plan::new(Environment::Dev, actions, None);
        f.store
            .capture(plan.run_id, &f.sandbox, Environment::Dev, &plan.touched_paths())
            .unwrap();
        for action in &plan.actions {
            let _ = f.executor.apply(action);
        }
        assert_ne!(tree(&ws), before, "plan should have changed the workspace: {}", text);

        f.store.restore(plan.run_id, &f.sandbox).unwrap();
        assert_eq!(tree(&ws), before, "restore of: {}", text);

        // Idempotent.
        let again = f.store.restore(plan.run_id, &f.sandbox).unwrap();
        assert_eq!(tree(&ws), before);
        assert!(again.rewritten.is_empty() && again.removed.is_empty() && again.recreated_dirs.is_empty());
    }

    // ── Per-kind rollback ─────────────────────────────────────────────────────

    #[test]
    fn restores_overwritten_file() {
        round_trip("write tmp/output.txt | goodbye");
    }

    #[test]
    fn restores_write_into_new_directories() {
        round_trip("write releases/v1/notes.md | notes");
    }

    #[test]
    fn restores_append() {
        round_trip("append tmp/output.txt |  world\nappend tmp/new.log | first");
    }

    #[test]
    fn restores_deleted_file() {
        round_trip("delete_file old/legacy.sql");
    }

    #[test]
    fn restores_moved_file() {
        round_trip("move tmp/output.txt archive/2024/output.txt");
    }

    #[test]
    fn restores_moved_directory() {
        round_trip("move docs archive/docs");
    }

    #[test]
    fn restores_moved_directory_first_seen_as_ancestor() {
        round_trip("write docs/new.md | x\nmove docs archive");
    }

    #[test]
    fn restores_make_dir() {
        round_trip("make_dir build/cache/objects");
    }

    #[test]
    fn restores_mixed_plan() {
        round_trip(
            "make_dir releases\n\
             write releases/notes.md | v1.2\n\
             move tmp/output.txt releases/output.txt\n\
             delete_file old/legacy.sql\n\
             append README.md | docs",
        );
    }

    // ── Capture details ───────────────────────────────────────────────────────

    #[test]
    fn capture_records_ancestors_and_absence() {
        let f = fixture();
        seed(&f);
        let snapshot = f
            .store
            .capture(RunId::new(), &f.sandbox, Environment::Dev, &["tmp/new/deep.txt", "tmp/output.txt"])
            .unwrap();

        assert_eq!(snapshot.entries["tmp"], CapturedState::Directory);
        assert_eq!(snapshot.entries["tmp/new"], CapturedState::Absent);
        assert_eq!(snapshot.entries["tmp/new/deep.txt"], CapturedState::Absent);
        assert_eq!(snapshot.entries["tmp/output.txt"], CapturedState::File(b"hello".to_vec()));
    }

    #[test]
    fn named_directory_is_recursed_even_after_ancestor_capture() {
        let f = fixture();
        seed(&f);
        let snapshot = f
            .store
            .capture(RunId::new(), &f.sandbox, Environment::Dev, &["docs/new.md", "docs"])
            .unwrap();

        assert_eq!(snapshot.entries["docs"], CapturedState::Directory);
        assert_eq!(snapshot.entries["docs/api"], CapturedState::Directory);
        assert_eq!(snapshot.entries["docs/api/index.md"], CapturedState::File(b"# API".to_vec()));
        assert_eq!(snapshot.entries["docs/new.md"], CapturedState::Absent);
    }

    #[test]
    fn stored_snapshot_loads_back_identically() {
        let f = fixture();
        seed(&f);
        let run_id = RunId::new();
        let captured = f
            .store
            .capture(run_id, &f.sandbox, Environment::Dev, &["docs", "tmp/output.txt"])
            .unwrap();

        let loaded = f.store.load(run_id).unwrap();
        assert_eq!(loaded, captured);
        assert!(f.store.dir().join(run_id.to_string()).join("manifest.json").is_file());
    }

    #[test]
    fn second_capture_for_a_run_keeps_the_first() {
        let f = fixture();
        seed(&f);
        let ws = f.sandbox.workspace(Environment::Dev);
        let run_id = RunId::new();
        f.store
            .capture(run_id, &f.sandbox, Environment::Dev, &["tmp/output.txt"])
            .unwrap();

        fs::write(ws.join("tmp/output.txt"), "half applied").unwrap();
        let err = f
            .store
            .capture(run_id, &f.sandbox, Environment::Dev, &["tmp/output.txt"])
            .unwrap_err();
        assert!(matches!(err, TrustError::Conflict { action_index: None, .. }));

        f.store.restore(run_id, &f.sandbox).unwrap();
        assert_eq!(fs::read(ws.join("tmp/output.txt")).unwrap(), b"hello");
    }

    #[test]
    fn corrupt_blob_is_a_snapshot_error() {
        let f = fixture();
        seed(&f);
        let run_id = RunId::new();
        f.store
            .capture(run_id, &f.sandbox, Environment::Dev, &["tmp/output.txt"])
            .unwrap();
        let blobs = f.store.dir().join(run_id.to_string()).join("blobs");
        for blob in fs::read_dir(&blobs).unwrap() {
            fs::write(blob.unwrap().path(), "tampered").unwrap();
        }

        assert!(matches!(f.store.load(run_id).unwrap_err(), TrustError::Snapshot { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_path_fails_the_whole_capture() {
        use std::os::unix::fs::PermissionsExt;

        let f = fixture();
        seed(&f);
        let secret = f.sandbox.workspace(Environment::Dev).join("tmp/output.txt");
        fs::set_permissions(&secret, fs::Permissions::from_mode(0o000)).unwrap();
        // Root ignores permission bits; nothing to test there.
        if fs::read(&secret).is_ok() {
            return;
        }

        let run_id = RunId::new();
        let err = f
            .store
            .capture(run_id, &f.sandbox, Environment::Dev, &["tmp/output.txt"])
            .unwrap_err();

        assert!(matches!(err, TrustError::Snapshot { .. }));
        assert!(f.store.list().unwrap().is_empty());
    }

    // ── Store management ──────────────────────────────────────────────────────

    #[test]
    fn unknown_run_is_not_found() {
        let f = fixture();
        let id = RunId::new();
        assert!(matches!(f.store.restore(id, &f.sandbox).unwrap_err(), TrustError::NotFound { .. }));
        assert!(matches!(f.store.prune(id).unwrap_err(), TrustError::NotFound { .. }));
    }

    #[test]
    fn list_and_prune() {
        let f = fixture();
        seed(&f);
        let first = RunId::new();
        let second = RunId::new();
        f.store.capture(first, &f.sandbox, Environment::Dev, &["tmp/output.txt"]).unwrap();
        f.store.capture(second, &f.sandbox, Environment::Dev, &["a", "b"]).unwrap();

        let listed = f.store.list().unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].run_id, first);
        assert_eq!(listed[1].entries, 2);

        f.store.prune(first).unwrap();
        let listed = f.store.list().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].run_id, second);
    }
}

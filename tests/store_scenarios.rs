//! Store integration tests
//!
//! Exercise the task tree store against real directories: persistence
//! round-trips, structural operations and lock handling.

use std::fs;
use std::path::Path;

use tasktree::storage::{INDEX_FILE, LOCK_FILE, META_FILE, TEXT_FILE, TREE_META_FILE};
use tasktree::{NodeId, StoreError, TaskStatus, TaskTreeStore};
use tempfile::TempDir;

fn open(path: &Path) -> TaskTreeStore {
    TaskTreeStore::open(path, false).unwrap()
}

fn names(store: &TaskTreeStore, parent: NodeId) -> Vec<String> {
    store
        .children(parent)
        .unwrap()
        .iter()
        .map(|id| store.node(*id).unwrap().name().to_string())
        .collect()
}

fn find(store: &TaskTreeStore, path: &str) -> NodeId {
    store
        .find_by_path(path)
        .unwrap()
        .unwrap_or_else(|| panic!("no task at {path}"))
}

// =============================================================================
// Scenarios
// =============================================================================

#[test]
fn scenario_add_and_write_out() {
    let dir = TempDir::new().unwrap();
    let mut store = open(dir.path());
    let root = store.root();
    assert!(store.is_empty());

    let id = store.add(root, "Groceries").unwrap();
    assert!(store.node(id).unwrap().is_dirty());
    assert_eq!(store.path_of(id).unwrap(), "groceries");

    assert_eq!(store.write_out().unwrap(), 1);

    let task_dir = dir.path().join("groceries");
    assert!(task_dir.join(META_FILE).is_file());
    assert!(task_dir.join(TEXT_FILE).is_file());
    assert_eq!(
        fs::read_to_string(dir.path().join(INDEX_FILE)).unwrap(),
        "groceries\n"
    );
    assert!(!store.node(id).unwrap().is_dirty());
}

#[test]
fn scenario_remove() {
    let dir = TempDir::new().unwrap();
    let mut store = open(dir.path());
    let root = store.root();
    let id = store.add(root, "Groceries").unwrap();
    let child = store.add(id, "Milk").unwrap();
    store.write_out().unwrap();

    store.remove(id).unwrap();

    assert!(!dir.path().join("groceries").exists());
    assert!(store.children(root).unwrap().is_empty());
    assert!(store.node(root).unwrap().is_dirty());
    assert!(matches!(store.node(child), Err(StoreError::UnknownNode(_))));

    store.close().unwrap();
    assert_eq!(fs::read_to_string(dir.path().join(INDEX_FILE)).unwrap(), "");
}

#[test]
fn scenario_move_subtree() {
    let dir = TempDir::new().unwrap();
    let mut store = open(dir.path());
    let root = store.root();
    let home = store.add(root, "Home").unwrap();
    let garden = store.add(root, "Garden").unwrap();
    let paint = store.add(home, "Paint").unwrap();
    let brush = store.add(paint, "Brush").unwrap();
    store.write_out().unwrap();

    assert!(store.move_node(garden, paint).unwrap());

    assert!(store.node(home).unwrap().is_dirty());
    assert!(store.node(garden).unwrap().is_dirty());
    assert_eq!(store.path_of(brush).unwrap(), "garden/paint/brush");
    assert!(dir.path().join("garden/paint/brush").join(META_FILE).is_file());
    assert!(!dir.path().join("home/paint").exists());

    store.close().unwrap();

    let store = open(dir.path());
    let garden = find(&store, "garden");
    assert_eq!(names(&store, garden), vec!["Paint"]);
    assert!(names(&store, find(&store, "home")).is_empty());
    assert_eq!(
        store.node(find(&store, "garden/paint/brush")).unwrap().name(),
        "Brush"
    );
}

// =============================================================================
// Persistence
// =============================================================================

#[test]
fn round_trip_preserves_everything() {
    let dir = TempDir::new().unwrap();
    {
        let mut store = open(dir.path());
        let root = store.root();
        let b = store.add(root, "Zebra \"quoted\" task").unwrap();
        let a = store.add(root, "Apple").unwrap();
        let a1 = store.add(a, "Core").unwrap();

        store
            .set_text(b, Some("first line\nsecond \\ line\n".to_string()))
            .unwrap();
        store.set_status(a, TaskStatus::Done).unwrap();
        store.set_status(a1, TaskStatus::Undone).unwrap();
        store.close().unwrap();
    }

    let store = open(dir.path());
    let root = store.root();

    // Insertion order survives even though it is not alphabetical
    assert_eq!(names(&store, root), vec!["Zebra \"quoted\" task", "Apple"]);

    let zebra = find(&store, "zebraquotedt");
    let node = store.node(zebra).unwrap();
    assert_eq!(node.text(), Some("first line\nsecond \\ line\n"));
    assert_eq!(node.status(), TaskStatus::Default);
    assert!(!node.is_dirty());

    let apple = find(&store, "apple");
    assert_eq!(store.node(apple).unwrap().status(), TaskStatus::Done);
    let core = find(&store, "apple/core");
    assert_eq!(store.node(core).unwrap().status(), TaskStatus::Undone);
}

#[test]
fn creation_time_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let (created, tree_created) = {
        let mut store = open(dir.path());
        let id = store.add(store.root(), "Task").unwrap();
        let created = store.node(id).unwrap().creation_time();
        let tree_created = store.creation_time();
        store.close().unwrap();
        (created, tree_created)
    };

    let store = open(dir.path());
    assert_eq!(store.node(find(&store, "task")).unwrap().creation_time(), created);
    assert_eq!(store.creation_time(), tree_created);
}

#[test]
fn second_write_out_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let mut store = open(dir.path());
    let root = store.root();
    let a = store.add(root, "A").unwrap();
    store.add(a, "B").unwrap();

    assert_eq!(store.write_out().unwrap(), 2);
    assert_eq!(store.write_out().unwrap(), 0);

    store.set_text(a, Some("changed".to_string())).unwrap();
    assert_eq!(store.write_out().unwrap(), 1);
}

#[test]
fn write_out_from_subtree() {
    let dir = TempDir::new().unwrap();
    let mut store = open(dir.path());
    let root = store.root();
    let a = store.add(root, "A").unwrap();
    store.add(a, "A1").unwrap();
    store.add(root, "B").unwrap();

    assert_eq!(store.write_out_from(a).unwrap(), 2);
    assert!(dir.path().join("a/a1").join(META_FILE).is_file());
    assert!(!dir.path().join("b").exists());
}

#[test]
fn freshly_opened_tree_is_clean() {
    let dir = TempDir::new().unwrap();
    {
        let mut store = open(dir.path());
        let root = store.root();
        store.add(root, "A").unwrap();
        store.close().unwrap();
    }

    let mut store = open(dir.path());
    assert_eq!(store.write_out().unwrap(), 0);
}

#[test]
fn legacy_metadata_is_loaded() {
    let dir = TempDir::new().unwrap();
    let old = dir.path().join("oldtask");
    fs::create_dir_all(&old).unwrap();
    fs::write(old.join("meta.txt"), "Old task\n1352203432000\n").unwrap();

    let mut store = open(dir.path());
    let id = find(&store, "oldtask");
    assert_eq!(store.node(id).unwrap().name(), "Old task");
    assert_eq!(store.node(id).unwrap().creation_time(), 1_352_203_432_000);
    assert_eq!(store.write_out().unwrap(), 0);

    store.set_status(id, TaskStatus::Done).unwrap();
    assert_eq!(store.write_out().unwrap(), 1);
    assert!(old.join(META_FILE).is_file());
}

#[test]
fn non_task_directories_are_ignored() {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join("photos")).unwrap();

    let store = open(dir.path());
    assert!(store.is_empty());
}

// =============================================================================
// Plain names
// =============================================================================

#[test]
fn sibling_plain_names_are_unique() {
    let dir = TempDir::new().unwrap();
    let mut store = open(dir.path());
    let root = store.root();
    let first = store.add(root, "Shopping").unwrap();
    let second = store.add(root, "Shopping").unwrap();

    assert_eq!(store.path_of(first).unwrap(), "shopping");
    assert_eq!(store.path_of(second).unwrap(), "shopping0");

    store.close().unwrap();
    assert!(dir.path().join("shopping").join(META_FILE).is_file());
    assert!(dir.path().join("shopping0").join(META_FILE).is_file());
}

#[test]
fn plain_name_avoids_foreign_entries() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("notes"), "not a task").unwrap();

    let mut store = open(dir.path());
    let id = store.add(store.root(), "Notes").unwrap();
    assert_eq!(store.path_of(id).unwrap(), "notes0");
}

#[test]
fn rename_keeps_children_on_disk() {
    let dir = TempDir::new().unwrap();
    let mut store = open(dir.path());
    let root = store.root();
    let parent = store.add(root, "Groceries").unwrap();
    let child = store.add(parent, "Milk").unwrap();
    store.write_out().unwrap();

    assert!(store.rename(parent, Some("Hardware")).unwrap());
    assert_eq!(store.path_of(child).unwrap(), "hardware/milk");
    assert!(dir.path().join("hardware/milk").join(META_FILE).is_file());

    store.close().unwrap();
    let store = open(dir.path());
    assert_eq!(store.node(find(&store, "hardware")).unwrap().name(), "Hardware");
    assert!(store.find_by_path("groceries").unwrap().is_none());
}

#[test]
fn rename_to_same_plain_name_keeps_directory() {
    let dir = TempDir::new().unwrap();
    let mut store = open(dir.path());
    let id = store.add(store.root(), "Groceries").unwrap();
    store.write_out().unwrap();

    assert!(store.rename(id, Some("GROCERIES!")).unwrap());
    assert!(!store.node(store.root()).unwrap().is_dirty());
    assert!(store.node(id).unwrap().is_dirty());
    assert_eq!(store.path_of(id).unwrap(), "groceries");
}

// =============================================================================
// Moves
// =============================================================================

#[test]
fn move_under_descendant_is_rejected() {
    let dir = TempDir::new().unwrap();
    let mut store = open(dir.path());
    let root = store.root();
    let a = store.add(root, "A").unwrap();
    let b = store.add(a, "B").unwrap();
    let c = store.add(b, "C").unwrap();
    store.write_out().unwrap();

    for dest in [b, c, a] {
        let err = store.move_node(dest, a).unwrap_err();
        assert!(matches!(err, StoreError::InvalidMove(_)), "{err}");
    }
    assert!(matches!(
        store.move_node(a, root),
        Err(StoreError::InvalidMove(_))
    ));

    assert_eq!(store.children(root).unwrap(), &[a]);
    assert_eq!(store.parent(c).unwrap(), Some(b));
    assert!(!store.node(root).unwrap().is_dirty());
    assert!(dir.path().join("a/b/c").join(META_FILE).is_file());
}

#[test]
fn move_unsaved_task() {
    let dir = TempDir::new().unwrap();
    let mut store = open(dir.path());
    let root = store.root();
    let a = store.add(root, "A").unwrap();
    let b = store.add(root, "B").unwrap();
    store.write_out().unwrap();

    let fresh = store.add(a, "Fresh").unwrap();
    assert!(store.move_node(b, fresh).unwrap());
    store.close().unwrap();

    let store = open(dir.path());
    assert_eq!(names(&store, find(&store, "b")), vec!["Fresh"]);
    assert!(names(&store, find(&store, "a")).is_empty());
}

#[test]
fn move_to_index_persists_order() {
    let dir = TempDir::new().unwrap();
    let mut store = open(dir.path());
    let root = store.root();
    let a = store.add(root, "A").unwrap();
    store.add(root, "B").unwrap();
    let c = store.add(a, "C").unwrap();
    store.write_out().unwrap();

    assert!(store.move_to(root, Some(0), c).unwrap());
    store.close().unwrap();

    let store = open(dir.path());
    assert_eq!(names(&store, store.root()), vec!["C", "A", "B"]);
}

#[test]
fn move_into_unsaved_parent() {
    let dir = TempDir::new().unwrap();
    let mut store = open(dir.path());
    let root = store.root();
    let a = store.add(root, "A").unwrap();
    store.write_out().unwrap();

    let box_id = store.add(root, "Box").unwrap();
    assert!(store.move_node(box_id, a).unwrap());
    assert!(dir.path().join("box/a").join(META_FILE).is_file());

    store.close().unwrap();
    let store = open(dir.path());
    assert_eq!(names(&store, find(&store, "box")), vec!["A"]);
}

#[test]
fn move_after_partial_write_out() {
    let dir = TempDir::new().unwrap();
    let mut store = open(dir.path());
    let root = store.root();
    let a = store.add(root, "A").unwrap();
    let b = store.add(a, "B").unwrap();
    assert_eq!(store.write_out_from(b).unwrap(), 1);

    assert!(store.move_node(root, b).unwrap());
    assert!(!dir.path().join("a/b").exists());
    assert!(dir.path().join("b").join(META_FILE).is_file());

    store.close().unwrap();
    let store = open(dir.path());
    assert_eq!(names(&store, store.root()), vec!["A", "B"]);
    assert!(names(&store, find(&store, "a")).is_empty());
}

// =============================================================================
// Removal
// =============================================================================

#[test]
fn remove_keeps_foreign_files() {
    let dir = TempDir::new().unwrap();
    let mut store = open(dir.path());
    let id = store.add(store.root(), "Project").unwrap();
    store.write_out().unwrap();
    fs::write(dir.path().join("project/notes.md"), "mine").unwrap();

    store.remove(id).unwrap();
    assert!(dir.path().join("project/notes.md").is_file());
    assert!(!dir.path().join("project").join(META_FILE).exists());

    // The leftover directory is not a task and blocks its plain name
    let again = store.add(store.root(), "Project").unwrap();
    assert_eq!(store.path_of(again).unwrap(), "project0");
}

#[test]
fn remove_after_partial_write_out() {
    let dir = TempDir::new().unwrap();
    let mut store = open(dir.path());
    let root = store.root();
    let a = store.add(root, "A").unwrap();
    let b = store.add(a, "B").unwrap();
    assert_eq!(store.write_out_from(b).unwrap(), 1);
    assert!(dir.path().join("a/b").join(META_FILE).is_file());

    store.remove(b).unwrap();
    assert!(!dir.path().join("a/b").exists());

    store.close().unwrap();
    let store = open(dir.path());
    assert_eq!(names(&store, store.root()), vec!["A"]);
    assert!(names(&store, find(&store, "a")).is_empty());
}

#[test]
fn removing_root_is_a_noop() {
    let dir = TempDir::new().unwrap();
    let mut store = open(dir.path());
    let root = store.root();
    store.add(root, "A").unwrap();

    store.remove(root).unwrap();
    assert_eq!(store.len(), 1);
}

// =============================================================================
// Locking and lifecycle
// =============================================================================

#[test]
fn second_open_is_locked() {
    let dir = TempDir::new().unwrap();
    let mut store = open(dir.path());
    assert!(dir.path().join(LOCK_FILE).is_file());

    let err = TaskTreeStore::open(dir.path(), false).unwrap_err();
    assert!(matches!(err, StoreError::Locked(_)));
    assert!(err.is_recoverable());

    store.close().unwrap();
    assert!(!dir.path().join(LOCK_FILE).exists());

    let mut again = open(dir.path());
    again.close().unwrap();
}

#[test]
fn stale_lock_can_be_ignored() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join(LOCK_FILE), "").unwrap();

    let mut store = TaskTreeStore::open(dir.path(), true).unwrap();
    store.close().unwrap();
    assert!(!dir.path().join(LOCK_FILE).exists());
}

#[test]
fn dropping_an_open_store_releases_the_lock() {
    let dir = TempDir::new().unwrap();
    {
        let _store = open(dir.path());
    }
    assert!(!dir.path().join(LOCK_FILE).exists());
}

#[test]
fn close_failure_is_retryable_after_relocate() {
    let base = TempDir::new().unwrap();
    let first = base.path().join("first");
    let second = base.path().join("second");

    let mut store = open(&first);
    let root = store.root();
    let a = store.add(root, "A").unwrap();
    store.add(a, "A1").unwrap();
    store.write_out().unwrap();

    // Pull the backing directory out from under the store
    fs::remove_dir_all(&first).unwrap();
    fs::write(&first, "in the way").unwrap();

    assert!(store.close().is_err());
    assert!(store.is_open());

    store.relocate(&second).unwrap();
    store.close().unwrap();
    assert!(!store.is_open());

    assert!(second.join(TREE_META_FILE).is_file());
    assert!(second.join("a/a1").join(META_FILE).is_file());
    assert!(!second.join(LOCK_FILE).exists());

    let store = open(&second);
    assert_eq!(names(&store, find(&store, "a")), vec!["A1"]);
}

#[test]
fn close_failure_is_retryable_in_place() {
    let dir = TempDir::new().unwrap();
    let mut store = open(dir.path());
    let root = store.root();
    let a = store.add(root, "A").unwrap();
    let b = store.add(root, "B").unwrap();
    store.set_text(a, Some("first".to_string())).unwrap();
    store.set_text(b, Some("second".to_string())).unwrap();
    assert_eq!(store.path_of(a).unwrap(), "a");
    assert_eq!(store.path_of(b).unwrap(), "b");

    // A plain file where B's directory belongs fails the write after A
    let blocker = dir.path().join("b");
    fs::write(&blocker, "in the way").unwrap();

    assert!(store.close().is_err());
    assert!(store.is_open());
    assert!(dir.path().join("a").join(META_FILE).is_file());
    assert!(!store.node(a).unwrap().is_dirty());
    assert!(store.node(b).unwrap().is_dirty());

    fs::remove_file(&blocker).unwrap();
    store.close().unwrap();
    assert!(!store.is_open());
    assert!(!dir.path().join(LOCK_FILE).exists());

    assert!(fs::read_to_string(dir.path().join("a").join(META_FILE))
        .unwrap()
        .contains("name \"A\""));
    assert!(fs::read_to_string(dir.path().join("b").join(META_FILE))
        .unwrap()
        .contains("name \"B\""));
    assert_eq!(fs::read_to_string(dir.path().join("a").join(TEXT_FILE)).unwrap(), "first");
    assert_eq!(fs::read_to_string(dir.path().join("b").join(TEXT_FILE)).unwrap(), "second");

    let store = open(dir.path());
    assert_eq!(names(&store, store.root()), vec!["A", "B"]);
}

#[test]
fn closed_store_rejects_changes() {
    let dir = TempDir::new().unwrap();
    let mut store = open(dir.path());
    let id = store.add(store.root(), "A").unwrap();
    store.close().unwrap();

    assert!(matches!(store.remove(id), Err(StoreError::Closed)));
    assert!(matches!(store.rename(id, Some("B")), Err(StoreError::Closed)));
    assert!(matches!(store.move_node(store.root(), id), Err(StoreError::Closed)));
    assert!(matches!(store.relocate(dir.path()), Err(StoreError::Closed)));
}

#[test]
fn malformed_metadata_aborts_open() {
    let dir = TempDir::new().unwrap();
    let task = dir.path().join("broken");
    fs::create_dir_all(&task).unwrap();
    fs::write(task.join(META_FILE), "name \"unterminated\n").unwrap();

    let err = TaskTreeStore::open(dir.path(), false).unwrap_err();
    let message = err.to_string();
    assert!(message.contains("line 1"), "{message}");
    assert!(!dir.path().join(LOCK_FILE).exists());
}

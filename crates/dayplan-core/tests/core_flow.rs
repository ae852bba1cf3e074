use chrono::{Local, NaiveTime, TimeZone};
use dayplan_core::store::Store;
use dayplan_core::task::{Priority, Task};
use tempfile::tempdir;

fn sample_task(name: &str, hour: u32, minute: u32, priority: Priority) -> Task {
    let now = Local
        .with_ymd_and_hms(2026, 8, 6, 7, 30, 0)
        .single()
        .expect("valid now");
    Task::new(
        name.to_string(),
        Some("from test".to_string()),
        NaiveTime::from_hms_opt(hour, minute, 0).expect("valid time"),
        45,
        priority,
        now,
    )
}

#[test]
fn snapshot_roundtrip_preserves_every_field() {
    let temp = tempdir().expect("tempdir");
    let mut store = Store::open(temp.path()).expect("open store");

    let task = sample_task("Write parity notes", 9, 30, Priority::High);
    let id = store.append(task.clone()).expect("append task");

    let reopened = Store::open(temp.path()).expect("reopen store");
    assert_eq!(reopened.tasks().len(), 1);

    let loaded = reopened.get(id).expect("task present after reload");
    assert_eq!(loaded, &task);
}

#[test]
fn remove_drops_only_the_requested_id() {
    let temp = tempdir().expect("tempdir");
    let mut store = Store::open(temp.path()).expect("open store");

    let first = store
        .append(sample_task("first", 9, 0, Priority::Low))
        .expect("append first");
    let second = store
        .append(sample_task("second", 10, 0, Priority::Medium))
        .expect("append second");

    store.remove(first).expect("remove first");

    let reopened = Store::open(temp.path()).expect("reopen store");
    assert!(reopened.get(first).is_none());
    assert!(reopened.get(second).is_some());
    assert_eq!(reopened.tasks().len(), 1);

    assert!(store.remove(first).is_err(), "second remove must fail");
}

#[test]
fn completing_is_one_way_and_idempotent() {
    let temp = tempdir().expect("tempdir");
    let mut store = Store::open(temp.path()).expect("open store");

    let id = store
        .append(sample_task("finish review", 11, 0, Priority::Medium))
        .expect("append task");

    assert!(store.mark_completed(id).expect("first completion"));
    assert!(!store.mark_completed(id).expect("second completion is a no-op"));

    let reopened = Store::open(temp.path()).expect("reopen store");
    assert!(reopened.get(id).expect("task present").completed);
}

#[test]
fn same_instant_appends_get_distinct_ids() {
    let temp = tempdir().expect("tempdir");
    let mut store = Store::open(temp.path()).expect("open store");

    let task = sample_task("twin", 9, 0, Priority::Low);
    let first = store.append(task.clone()).expect("append first twin");
    let second = store.append(task).expect("append second twin");

    assert_ne!(first, second);
    assert_eq!(store.tasks().len(), 2);
}

#[test]
fn clear_empties_the_snapshot() {
    let temp = tempdir().expect("tempdir");
    let mut store = Store::open(temp.path()).expect("open store");

    store
        .append(sample_task("a", 9, 0, Priority::Low))
        .expect("append a");
    store
        .append(sample_task("b", 10, 0, Priority::High))
        .expect("append b");

    assert_eq!(store.clear().expect("clear"), 2);

    let reopened = Store::open(temp.path()).expect("reopen store");
    assert!(reopened.tasks().is_empty());
}

#[test]
fn malformed_snapshot_line_fails_the_load_with_context() {
    let temp = tempdir().expect("tempdir");
    {
        let mut store = Store::open(temp.path()).expect("open store");
        store
            .append(sample_task("good", 9, 0, Priority::Low))
            .expect("append");
    }

    let snapshot = temp.path().join("tasks.data");
    let mut contents = std::fs::read_to_string(&snapshot).expect("read snapshot");
    contents.push_str("{not json\n");
    std::fs::write(&snapshot, contents).expect("corrupt snapshot");

    let err = Store::open(temp.path()).expect_err("corrupt snapshot must fail");
    let message = format!("{err:#}");
    assert!(message.contains("line 2"), "unexpected error: {message}");
}

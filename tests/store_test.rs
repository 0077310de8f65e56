// tests/store_test.rs — Integration test: SQLite round-trip (store CRUD)

use chrono::NaiveDate;
use tasktrack::infra::errors::TrackError;
use tasktrack::store::schema;
use tasktrack::store::types::TaskStatus;
use tasktrack::store::Store;
use tempfile::TempDir;

/// Store with one user, one project and one task.
fn seeded() -> (Store, String) {
    let store = Store::open_in_memory().unwrap();
    let user = store
        .insert_user("Marie", "Curie", "marie@example.com")
        .unwrap();
    let project = store.insert_project(&user.id, "Radium Notes").unwrap();
    let task = store
        .insert_task(&project.id, "Measure samples", None, None, None)
        .unwrap();
    (store, task.id)
}

#[test]
fn test_intervals_keep_recording_order() {
    let (store, task) = seeded();
    for seconds in [60, 120, 10] {
        store.append_interval(&task, seconds).unwrap();
    }
    let seconds: Vec<u64> = store
        .fetch_intervals(&task)
        .unwrap()
        .iter()
        .map(|i| i.seconds)
        .collect();
    assert_eq!(seconds, vec![60, 120, 10]);
    assert_eq!(store.total_seconds(&task).unwrap(), 190);
}

#[test]
fn test_remove_by_id_with_duplicate_values() {
    let (store, task) = seeded();
    let first = store.append_interval(&task, 30).unwrap();
    let middle = store.append_interval(&task, 90).unwrap();
    let last = store.append_interval(&task, 30).unwrap();

    assert!(store.remove_interval(&task, &last.id).unwrap());
    let remaining: Vec<String> = store
        .fetch_intervals(&task)
        .unwrap()
        .into_iter()
        .map(|i| i.id)
        .collect();
    assert_eq!(remaining, vec![first.id, middle.id]);

    // Unknown or already-removed ids are a no-op
    assert!(!store.remove_interval(&task, &last.id).unwrap());
}

#[test]
fn test_append_to_unknown_task_is_typed() {
    let (store, _) = seeded();
    let err = store.append_interval("missing", 5).unwrap_err();
    let typed = err.downcast::<TrackError>().unwrap();
    assert!(matches!(typed, TrackError::TaskNotFound { .. }));
}

#[test]
fn test_tasks_for_user_only_sees_own_projects() {
    let store = Store::open_in_memory().unwrap();
    let a = store.insert_user("A", "One", "a@example.com").unwrap();
    let b = store.insert_user("B", "Two", "b@example.com").unwrap();
    let pa = store.insert_project(&a.id, "Alpha").unwrap();
    let pb = store.insert_project(&b.id, "Beta").unwrap();
    store
        .insert_task(
            &pa.id,
            "Dated",
            Some("desc"),
            NaiveDate::from_ymd_opt(2026, 4, 1),
            NaiveDate::from_ymd_opt(2026, 4, 2),
        )
        .unwrap();
    store.insert_task(&pb.id, "Other", None, None, None).unwrap();

    let tasks = store.tasks_for_user(&a.id).unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].title, "Dated");
    assert_eq!(tasks[0].start_date, NaiveDate::from_ymd_opt(2026, 4, 1));

    let found = store
        .find_user_by_calendar_token(&b.calendar_token)
        .unwrap()
        .unwrap();
    assert_eq!(found.id, b.id);
    assert!(store.find_user_by_calendar_token("nope").unwrap().is_none());
}

#[test]
fn test_task_status_update() {
    let (store, task) = seeded();
    assert!(store.update_task_status(&task, TaskStatus::Done).unwrap());
    assert_eq!(
        store.get_task(&task).unwrap().unwrap().status,
        TaskStatus::Done
    );
    assert!(!store
        .update_task_status("missing", TaskStatus::Done)
        .unwrap());
}

#[test]
fn test_file_database_reopens_migrated() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("data").join("tasktrack.db");

    let task_id = {
        let store = Store::open(&path).unwrap();
        let user = store.insert_user("A", "B", "ab@example.com").unwrap();
        let project = store.insert_project(&user.id, "P").unwrap();
        let task = store.insert_task(&project.id, "T", None, None, None).unwrap();
        store.append_interval(&task.id, 12).unwrap();
        task.id
    };

    let store = Store::open(&path).unwrap();
    assert_eq!(store.total_seconds(&task_id).unwrap(), 12);

    let conn = rusqlite::Connection::open(&path).unwrap();
    assert_eq!(schema::current_version(&conn).unwrap(), schema::latest_version());
}

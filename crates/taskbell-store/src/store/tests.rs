use super::{from_db_time, to_db_time, Store};
use chrono::{DateTime, Duration, TimeZone, Utc};
use taskbell_core::config::StoreConfig;
use taskbell_core::deadline::Thresholds;
use taskbell_core::error::TaskbellError;
use taskbell_core::model::{NewTask, TaskUpdate, Threshold};

/// Create an in-memory store for testing.
async fn test_store() -> Store {
    let config = StoreConfig {
        db_path: ":memory:".to_string(),
    };
    Store::new(&config, Thresholds::default()).await.unwrap()
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 6, 1, 12, 0, 0).unwrap()
}

fn due_at(title: &str, end: Option<DateTime<Utc>>) -> NewTask {
    NewTask {
        title: title.to_string(),
        end_time: end,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_create_user_is_idempotent() {
    let store = test_store().await;
    let first = store.create_user_if_absent("alice").await.unwrap();
    store.set_messaging_handle("alice", 77).await.unwrap();
    let second = store.create_user_if_absent("alice").await.unwrap();

    assert_eq!(first.id, "alice");
    assert!(first.messaging_handle.is_none());
    assert_eq!(second.messaging_handle, Some(77));
    assert!(store.create_user_if_absent("  ").await.is_err());
}

#[tokio::test]
async fn test_set_messaging_handle_missing_user() {
    let store = test_store().await;
    let err = store.set_messaging_handle("ghost", 1).await.unwrap_err();
    assert!(matches!(err, TaskbellError::NotFound(_)));
}

#[tokio::test]
async fn test_messaging_handle_moves_between_users() {
    let store = test_store().await;
    store.create_user_if_absent("alice").await.unwrap();
    store.create_user_if_absent("bob").await.unwrap();
    store.set_messaging_handle("alice", 500).await.unwrap();
    store.set_messaging_handle("bob", 500).await.unwrap();

    let alice = store.get_user("alice").await.unwrap().unwrap();
    assert!(alice.messaging_handle.is_none());
    let linked = store.get_user_by_messaging_handle(500).await.unwrap().unwrap();
    assert_eq!(linked.id, "bob");
    assert!(store.get_user_by_messaging_handle(501).await.unwrap().is_none());
}

#[tokio::test]
async fn test_create_task_initializes_notifications() {
    let store = test_store().await;
    store.create_user_if_absent("alice").await.unwrap();
    let task = store
        .create_task("alice", due_at("Report", Some(now())))
        .await
        .unwrap();

    assert!(!task.id.is_empty());
    assert!(!task.completed);
    let keys: Vec<&str> = task.notifications_sent.keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["10", "30", "60"]);
    assert!(task.notifications_sent.values().all(|sent| !sent));

    let loaded = store.get_task(&task.id).await.unwrap().unwrap();
    assert_eq!(loaded, task);
}

#[tokio::test]
async fn test_create_task_missing_owner() {
    let store = test_store().await;
    let err = store
        .create_task("nobody", due_at("Orphan", None))
        .await
        .unwrap_err();
    assert!(matches!(err, TaskbellError::NotFound(_)));
}

#[tokio::test]
async fn test_create_task_duplicate_id_rejected() {
    let store = test_store().await;
    store.create_user_if_absent("alice").await.unwrap();
    let new = NewTask {
        id: Some("fixed".into()),
        title: "One".into(),
        ..Default::default()
    };
    store.create_task("alice", new.clone()).await.unwrap();
    let err = store.create_task("alice", new).await.unwrap_err();
    assert!(matches!(err, TaskbellError::Validation(_)));
}

#[tokio::test]
async fn test_create_tasks_is_all_or_nothing() {
    let store = test_store().await;
    store.create_user_if_absent("alice").await.unwrap();

    let created = store
        .create_tasks(
            "alice",
            vec![due_at("First", Some(now())), due_at("Second", None)],
        )
        .await
        .unwrap();
    assert_eq!(created.len(), 2);
    assert_eq!(store.list_user_tasks("alice").await.unwrap().len(), 2);

    let clash = NewTask {
        id: Some("same".into()),
        title: "Clash".into(),
        ..Default::default()
    };
    let err = store
        .create_tasks(
            "alice",
            vec![due_at("Third", None), clash.clone(), clash],
        )
        .await
        .unwrap_err();
    assert!(matches!(err, TaskbellError::Validation(_)));
    assert_eq!(store.list_user_tasks("alice").await.unwrap().len(), 2);
    assert!(store.get_task("same").await.unwrap().is_none());
}

#[tokio::test]
async fn test_get_user_task_requires_ownership() {
    let store = test_store().await;
    store.create_user_if_absent("alice").await.unwrap();
    store.create_user_if_absent("bob").await.unwrap();
    let task = store.create_task("alice", due_at("Mine", None)).await.unwrap();

    assert!(store.get_user_task(&task.id, "alice").await.unwrap().is_some());
    assert!(store.get_user_task(&task.id, "bob").await.unwrap().is_none());
}

#[tokio::test]
async fn test_update_task_partial_fields() {
    let store = test_store().await;
    store.create_user_if_absent("alice").await.unwrap();
    let task = store
        .create_task(
            "alice",
            NewTask {
                title: "Draft".into(),
                description: Some("first pass".into()),
                difficulty: Some(2),
                end_time: Some(now()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let update: TaskUpdate =
        serde_json::from_str(r#"{"title": "Final", "description": null, "bogus": 1}"#).unwrap();
    let updated = store.update_task(&task.id, "alice", &update).await.unwrap();
    assert_eq!(updated.title, "Final");
    assert!(updated.description.is_none());
    assert_eq!(updated.difficulty, Some(2));
    assert_eq!(updated.end_time, Some(now()));

    let loaded = store.get_task(&task.id).await.unwrap().unwrap();
    assert_eq!(loaded, updated);
}

#[tokio::test]
async fn test_update_task_not_owned() {
    let store = test_store().await;
    store.create_user_if_absent("alice").await.unwrap();
    store.create_user_if_absent("bob").await.unwrap();
    let task = store.create_task("alice", due_at("Mine", None)).await.unwrap();

    let update = TaskUpdate {
        completed: Some(true),
        ..Default::default()
    };
    let err = store.update_task(&task.id, "bob", &update).await.unwrap_err();
    assert!(matches!(err, TaskbellError::NotFound(_)));
    assert!(!store.get_task(&task.id).await.unwrap().unwrap().completed);
}

#[tokio::test]
async fn test_update_task_validation_failure_keeps_row() {
    let store = test_store().await;
    store.create_user_if_absent("alice").await.unwrap();
    let task = store.create_task("alice", due_at("Keep", None)).await.unwrap();

    let update = TaskUpdate {
        title: Some(String::new()),
        ..Default::default()
    };
    let err = store.update_task(&task.id, "alice", &update).await.unwrap_err();
    assert!(matches!(err, TaskbellError::Validation(_)));
    assert_eq!(store.get_task(&task.id).await.unwrap().unwrap().title, "Keep");
}

#[tokio::test]
async fn test_delete_task_cascades_owners() {
    let store = test_store().await;
    store.create_user_if_absent("alice").await.unwrap();
    store.create_user_if_absent("bob").await.unwrap();
    let task = store.create_task("alice", due_at("Shared", None)).await.unwrap();
    store.share_task(&task.id, "bob").await.unwrap();

    assert!(!store.delete_task(&task.id, "carol").await.unwrap());
    assert!(store.delete_task(&task.id, "bob").await.unwrap());
    assert!(store.get_task(&task.id).await.unwrap().is_none());
    assert!(store.task_owners(&task.id).await.unwrap().is_empty());
    assert!(store.list_user_tasks("alice").await.unwrap().is_empty());
    assert!(!store.delete_task(&task.id, "alice").await.unwrap());
}

#[tokio::test]
async fn test_share_task_twice_keeps_owner_count() {
    let store = test_store().await;
    store.create_user_if_absent("alice").await.unwrap();
    store.create_user_if_absent("bob").await.unwrap();
    let task = store.create_task("alice", due_at("Pair", None)).await.unwrap();

    assert!(store.share_task(&task.id, "bob").await.unwrap());
    let after_first = store.task_owners(&task.id).await.unwrap();
    assert!(!store.share_task(&task.id, "bob").await.unwrap());
    let after_second = store.task_owners(&task.id).await.unwrap();

    assert_eq!(after_first.len(), 2);
    assert_eq!(after_first, after_second);
    let ids: Vec<&str> = after_second.iter().map(|u| u.id.as_str()).collect();
    assert_eq!(ids, vec!["alice", "bob"]);
}

#[tokio::test]
async fn test_share_task_missing_entities() {
    let store = test_store().await;
    store.create_user_if_absent("alice").await.unwrap();
    let task = store.create_task("alice", due_at("Solo", None)).await.unwrap();

    assert!(matches!(
        store.share_task(&task.id, "ghost").await.unwrap_err(),
        TaskbellError::NotFound(_)
    ));
    assert!(matches!(
        store.share_task("missing", "alice").await.unwrap_err(),
        TaskbellError::NotFound(_)
    ));
}

#[tokio::test]
async fn test_list_user_tasks_order_nulls_last() {
    let store = test_store().await;
    store.create_user_if_absent("alice").await.unwrap();
    store.create_task("alice", due_at("none", None)).await.unwrap();
    store
        .create_task("alice", due_at("late", Some(now() + Duration::hours(5))))
        .await
        .unwrap();
    store
        .create_task(
            "alice",
            NewTask {
                title: "early-started".into(),
                start_time: Some(now() - Duration::hours(1)),
                end_time: Some(now() + Duration::hours(1)),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    store
        .create_task("alice", due_at("early-unstarted", Some(now() + Duration::hours(1))))
        .await
        .unwrap();

    let titles: Vec<String> = store
        .list_user_tasks("alice")
        .await
        .unwrap()
        .into_iter()
        .map(|t| t.title)
        .collect();
    assert_eq!(
        titles,
        vec!["early-started", "early-unstarted", "late", "none"]
    );
}

#[tokio::test]
async fn test_pending_notifications_window() {
    let store = test_store().await;
    store.create_user_if_absent("alice").await.unwrap();
    store.create_user_if_absent("bob").await.unwrap();
    store.set_messaging_handle("bob", 9).await.unwrap();

    let soon = store
        .create_task("alice", due_at("soon", Some(now() + Duration::minutes(20))))
        .await
        .unwrap();
    store.share_task(&soon.id, "bob").await.unwrap();
    store
        .create_task("alice", due_at("later", Some(now() + Duration::hours(2))))
        .await
        .unwrap();
    store
        .create_task("alice", due_at("past", Some(now() - Duration::minutes(1))))
        .await
        .unwrap();
    store.create_task("alice", due_at("undated", None)).await.unwrap();
    let done = store
        .create_task("alice", due_at("done", Some(now() + Duration::minutes(15))))
        .await
        .unwrap();
    let complete = TaskUpdate {
        completed: Some(true),
        ..Default::default()
    };
    store.update_task(&done.id, "alice", &complete).await.unwrap();

    let pending = store
        .list_pending_notification_tasks(now(), Duration::minutes(65))
        .await
        .unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].task.id, soon.id);
    let owners: Vec<(&str, Option<i64>)> = pending[0]
        .owners
        .iter()
        .map(|u| (u.id.as_str(), u.messaging_handle))
        .collect();
    assert_eq!(owners, vec![("alice", None), ("bob", Some(9))]);
}

#[tokio::test]
async fn test_mark_notification_sent_idempotent_and_isolated() {
    let store = test_store().await;
    store.create_user_if_absent("alice").await.unwrap();
    let task = store
        .create_task("alice", due_at("Flip", Some(now())))
        .await
        .unwrap();

    store
        .mark_notification_sent(&task.id, Threshold::new(30))
        .await
        .unwrap();
    let once = store.get_task(&task.id).await.unwrap().unwrap();
    store
        .mark_notification_sent(&task.id, Threshold::new(30))
        .await
        .unwrap();
    let twice = store.get_task(&task.id).await.unwrap().unwrap();

    assert_eq!(once.notifications_sent, twice.notifications_sent);
    assert!(twice.notification_sent(Threshold::new(30)));
    assert!(!twice.notification_sent(Threshold::new(60)));
    assert!(!twice.notification_sent(Threshold::new(10)));
    assert_eq!(twice.notifications_sent.len(), 3);
}

#[tokio::test]
async fn test_mark_sent_survives_updates() {
    let store = test_store().await;
    store.create_user_if_absent("alice").await.unwrap();
    let task = store
        .create_task("alice", due_at("Sticky", Some(now())))
        .await
        .unwrap();
    store
        .mark_notification_sent(&task.id, Threshold::new(60))
        .await
        .unwrap();

    let update: TaskUpdate = serde_json::from_str(
        r#"{"title": "Sticky v2", "end_datetime": "2026-06-02T08:00:00Z", "notifications_sent": {"60": false}}"#,
    )
    .unwrap();
    let updated = store.update_task(&task.id, "alice", &update).await.unwrap();
    assert!(updated.notification_sent(Threshold::new(60)));
    let loaded = store.get_task(&task.id).await.unwrap().unwrap();
    assert!(loaded.notification_sent(Threshold::new(60)));
    assert_eq!(loaded.title, "Sticky v2");
}

#[tokio::test]
async fn test_mark_sent_missing_task() {
    let store = test_store().await;
    let err = store
        .mark_notification_sent("nope", Threshold::new(10))
        .await
        .unwrap_err();
    assert!(matches!(err, TaskbellError::NotFound(_)));
}

#[tokio::test]
async fn test_active_users_and_random_task() {
    let store = test_store().await;
    for user in ["alice", "bob", "carol"] {
        store.create_user_if_absent(user).await.unwrap();
    }
    let active = store
        .create_task("alice", due_at("active", Some(now() + Duration::days(1))))
        .await
        .unwrap();
    store
        .create_task("bob", due_at("expired", Some(now() - Duration::hours(1))))
        .await
        .unwrap();
    store.create_task("carol", due_at("undated", None)).await.unwrap();

    let users = store.list_active_task_users(now()).await.unwrap();
    let ids: Vec<&str> = users.iter().map(|u| u.id.as_str()).collect();
    assert_eq!(ids, vec!["alice"]);

    let picked = store
        .pick_random_active_task("alice", now())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(picked.id, active.id);
    assert!(store
        .pick_random_active_task("bob", now())
        .await
        .unwrap()
        .is_none());
    assert!(store
        .pick_random_active_task("carol", now())
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_find_open_task_by_slug() {
    let store = test_store().await;
    store.create_user_if_absent("alice").await.unwrap();
    let task = store
        .create_task("alice", due_at("Buy milk", Some(now())))
        .await
        .unwrap();

    let found = store
        .find_open_task_by_slug("alice", "Buy_milk")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id, task.id);
    assert!(store
        .find_open_task_by_slug("alice", "Buy_bread")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_stats() {
    let store = test_store().await;
    store.create_user_if_absent("alice").await.unwrap();
    store.create_task("alice", due_at("a", Some(now()))).await.unwrap();
    store.create_task("alice", due_at("b", None)).await.unwrap();
    assert_eq!(store.stats().await.unwrap(), (1, 2, 1));
}

#[test]
fn test_db_time_round_trip_keeps_millis() {
    let t = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap() + Duration::milliseconds(678);
    let stored = to_db_time(t);
    assert_eq!(stored, "2026-01-02 03:04:05.678");
    assert_eq!(from_db_time(&stored).unwrap(), t);
    assert_eq!(
        from_db_time("2026-01-02 03:04:05").unwrap(),
        Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap()
    );
    assert!(from_db_time("yesterday").is_err());
}

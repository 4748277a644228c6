//! Turn a free-form goal into scheduled tasks via a [`TaskBreakdown`] provider.

use chrono::{DateTime, Duration, Utc};
use taskbell_core::{
    error::TaskbellError,
    model::{NewTask, Task},
    traits::TaskBreakdown,
};
use taskbell_store::Store;
use tracing::info;

/// Ask `generator` for subtasks and store them for `owner_id`, scheduled
/// back-to-back starting at `now`. The owner is created if absent.
pub async fn plan_tasks(
    store: &Store,
    generator: &dyn TaskBreakdown,
    owner_id: &str,
    prompt: &str,
    now: DateTime<Utc>,
) -> Result<Vec<Task>, TaskbellError> {
    if prompt.trim().is_empty() {
        return Err(TaskbellError::Validation("prompt must not be empty".into()));
    }

    let items = generator.breakdown(prompt).await?;
    info!(
        "{} produced {} tasks for {owner_id}",
        generator.name(),
        items.len()
    );

    let mut cursor = now;
    let mut batch = Vec::with_capacity(items.len());
    for item in items {
        let end = hours(item.estimated_hours)
            .and_then(|d| cursor.checked_add_signed(d))
            .ok_or_else(|| {
                TaskbellError::Provider(format!(
                    "estimate of {} hours for \"{}\" is out of range",
                    item.estimated_hours, item.title
                ))
            })?;
        batch.push(NewTask {
            title: item.title,
            description: Some(item.description).filter(|d| !d.is_empty()),
            start_time: Some(cursor),
            end_time: Some(end),
            ..Default::default()
        });
        cursor = end;
    }

    store.create_user_if_absent(owner_id).await?;
    store.create_tasks(owner_id, batch).await
}

/// Fractional hours as a duration, to the millisecond. `None` when out of range.
fn hours(h: f64) -> Option<Duration> {
    let millis = (h * 3_600_000.0).round();
    if !millis.is_finite() || millis.abs() >= i64::MAX as f64 {
        return None;
    }
    Duration::try_milliseconds(millis as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use taskbell_core::config::StoreConfig;
    use taskbell_core::deadline::Thresholds;
    use taskbell_core::traits::BreakdownItem;

    struct FixedBreakdown(Result<Vec<BreakdownItem>, String>);

    #[async_trait]
    impl TaskBreakdown for FixedBreakdown {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn breakdown(&self, _prompt: &str) -> Result<Vec<BreakdownItem>, TaskbellError> {
            self.0.clone().map_err(TaskbellError::Provider)
        }
    }

    fn item(title: &str, description: &str, estimated_hours: f64) -> BreakdownItem {
        BreakdownItem {
            title: title.into(),
            description: description.into(),
            estimated_hours,
        }
    }

    async fn test_store() -> Store {
        let config = StoreConfig {
            db_path: ":memory:".to_string(),
        };
        Store::new(&config, Thresholds::default()).await.unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 9, 1, 9, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_plan_schedules_back_to_back() {
        let store = test_store().await;
        let generator = FixedBreakdown(Ok(vec![
            item("Outline", "Headings only", 1.5),
            item("Draft", "", 2.0),
        ]));

        let tasks = plan_tasks(&store, &generator, "carol", "Write the essay", now())
            .await
            .unwrap();

        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].start_time, Some(now()));
        assert_eq!(tasks[0].end_time, Some(now() + Duration::minutes(90)));
        assert_eq!(tasks[1].start_time, tasks[0].end_time);
        assert_eq!(tasks[1].end_time, Some(now() + Duration::minutes(210)));
        assert_eq!(tasks[0].description.as_deref(), Some("Headings only"));
        assert!(tasks[1].description.is_none());
        assert_eq!(tasks[0].notifications_sent.len(), 3);

        assert!(store.get_user("carol").await.unwrap().is_some());
        let stored = store.list_user_tasks("carol").await.unwrap();
        assert_eq!(stored, tasks);
    }

    #[tokio::test]
    async fn test_plan_rejects_empty_prompt() {
        let store = test_store().await;
        let generator = FixedBreakdown(Ok(vec![item("x", "", 1.0)]));
        let err = plan_tasks(&store, &generator, "carol", "   ", now())
            .await
            .unwrap_err();
        assert!(matches!(err, TaskbellError::Validation(_)));
        assert!(store.get_user("carol").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_plan_provider_error_creates_nothing() {
        let store = test_store().await;
        let generator = FixedBreakdown(Err("quota exceeded".into()));
        let err = plan_tasks(&store, &generator, "carol", "Plan my week", now())
            .await
            .unwrap_err();
        assert!(matches!(err, TaskbellError::Provider(_)));
        assert!(store.list_user_tasks("carol").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_plan_huge_estimate_is_an_error() {
        let store = test_store().await;
        let generator = FixedBreakdown(Ok(vec![
            item("Warm up", "", 1.0),
            item("Forever", "", 1e12),
        ]));
        let err = plan_tasks(&store, &generator, "carol", "Plan my life", now())
            .await
            .unwrap_err();
        assert!(matches!(err, TaskbellError::Provider(_)));
        assert!(err.to_string().contains("Forever"));
        assert!(store.list_user_tasks("carol").await.unwrap().is_empty());
    }
}

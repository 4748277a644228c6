//! Reminder and bot reply texts.

use chrono::{DateTime, Utc};
use taskbell_core::deadline::{in_window, minutes_until};
use taskbell_core::model::{Task, Threshold};

/// Emoji and human timeframe for a threshold.
fn threshold_style(threshold: Threshold) -> (&'static str, String) {
    match threshold.minutes() {
        60 => ("⚠️", "1 hour".to_string()),
        30 => ("⏰", "30 minutes".to_string()),
        10 => ("🚨", "10 minutes".to_string()),
        m if m % 60 == 0 => ("⏰", plural(i64::from(m / 60), "hour")),
        m => ("⏰", plural(i64::from(m), "minute")),
    }
}

fn plural(n: i64, unit: &str) -> String {
    if n == 1 {
        format!("1 {unit}")
    } else {
        format!("{n} {unit}s")
    }
}

/// Command hint for completing a task from the chat.
pub fn complete_command(title: &str) -> String {
    format!("/complete_{}", title.replace(' ', "_"))
}

/// Deadline reminder sent when `threshold` fires for a task at `now`.
///
/// A catch-up fire outside the threshold's window states the real time left.
pub fn deadline_message(
    title: &str,
    deadline: DateTime<Utc>,
    threshold: Threshold,
    now: DateTime<Utc>,
) -> String {
    let (emoji, label) = threshold_style(threshold);
    let timeframe = if in_window(threshold, minutes_until(deadline, now)) {
        label
    } else {
        format_time_until(deadline, now)
    };
    format!(
        "{emoji} Deadline Reminder {emoji}\n\
         Task: {title}\n\
         Due in {timeframe} (at {})\n\
         Status: {}",
        deadline.format("%H:%M"),
        complete_command(title)
    )
}

/// Periodic nudge about a random active task.
///
/// `None` when the task has no deadline.
pub fn random_reminder_message(task: &Task, now: DateTime<Utc>) -> Option<String> {
    let deadline = task.end_time?;
    let mut message = format!(
        "🎲 Random Task Reminder 🎲\n\
         Don't forget about: {}\n\
         Due in: {}\n\
         Deadline: {}",
        task.title,
        format_time_until(deadline, now),
        deadline.format("%Y-%m-%d %H:%M")
    );
    if let Some(description) = task.description.as_deref().filter(|d| !d.is_empty()) {
        message.push_str(&format!("\nDescription: {description}"));
    }
    Some(message)
}

/// Reply to `/next`.
pub fn next_task_message(task: &Task, now: DateTime<Utc>) -> Option<String> {
    let deadline = task.end_time?;
    Some(format!(
        "🎲 Random Task:\n{}\nDue in: {}\nDeadline: {}",
        task.title,
        format_time_until(deadline, now),
        deadline.format("%Y-%m-%d %H:%M")
    ))
}

/// "2 days and 3 hours and 5 minutes"; zero parts are omitted.
pub fn format_time_until(target: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let total_minutes = (target - now).num_minutes();
    if total_minutes <= 0 {
        return "less than a minute".to_string();
    }

    let days = total_minutes / (24 * 60);
    let hours = (total_minutes % (24 * 60)) / 60;
    let minutes = total_minutes % 60;

    let parts: Vec<String> = [(days, "days"), (hours, "hours"), (minutes, "minutes")]
        .into_iter()
        .filter(|(n, _)| *n > 0)
        .map(|(n, unit)| format!("{n} {unit}"))
        .collect();
    parts.join(" and ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use std::collections::BTreeMap;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 4, 10, 8, 0, 0).unwrap()
    }

    fn task(description: Option<&str>) -> Task {
        Task {
            id: "t1".into(),
            title: "Buy milk".into(),
            description: description.map(String::from),
            difficulty: None,
            completed: false,
            start_time: None,
            end_time: Some(now() + Duration::days(1) + Duration::hours(2) + Duration::minutes(5)),
            notifications_sent: BTreeMap::new(),
        }
    }

    #[test]
    fn test_deadline_message_per_threshold() {
        let deadline = Utc.with_ymd_and_hms(2026, 4, 10, 14, 30, 0).unwrap();
        let at = |m: i64| deadline - Duration::minutes(m);
        let msg = deadline_message("Buy milk", deadline, Threshold::new(60), at(60));
        assert_eq!(
            msg,
            "⚠️ Deadline Reminder ⚠️\nTask: Buy milk\nDue in 1 hour (at 14:30)\nStatus: /complete_Buy_milk"
        );
        let half = deadline_message("x", deadline, Threshold::new(30), at(30));
        assert!(half.starts_with("⏰"));
        assert!(half.contains("Due in 30 minutes"));
        assert!(deadline_message("x", deadline, Threshold::new(10), at(10)).starts_with("🚨"));
    }

    #[test]
    fn test_deadline_message_custom_thresholds() {
        let deadline = now();
        let at = |m: i64| deadline - Duration::minutes(m);
        let two_hours = deadline_message("x", deadline, Threshold::new(120), at(120));
        assert!(two_hours.contains("Due in 2 hours"));
        let one = deadline_message("x", deadline, Threshold::new(1), at(1));
        assert!(one.contains("Due in 1 minute "));
        let odd = deadline_message("x", deadline, Threshold::new(45), at(45));
        assert!(odd.contains("Due in 45 minutes"));
    }

    #[test]
    fn test_deadline_message_outside_window_states_time_left() {
        let deadline = Utc.with_ymd_and_hms(2026, 4, 10, 8, 45, 0).unwrap();
        let msg = deadline_message("Mid", deadline, Threshold::new(60), now());
        assert!(msg.starts_with("⚠️"));
        assert!(msg.contains("Due in 45 minutes (at 08:45)"));
        assert!(!msg.contains("1 hour"));
    }

    #[test]
    fn test_format_time_until() {
        assert_eq!(
            format_time_until(now() + Duration::minutes(3 * 24 * 60 + 65), now()),
            "3 days and 1 hours and 5 minutes"
        );
        assert_eq!(format_time_until(now() + Duration::hours(2), now()), "2 hours");
        assert_eq!(
            format_time_until(now() + Duration::seconds(30), now()),
            "less than a minute"
        );
        assert_eq!(
            format_time_until(now() - Duration::hours(1), now()),
            "less than a minute"
        );
    }

    #[test]
    fn test_random_reminder_message() {
        let msg = random_reminder_message(&task(Some("2 liters")), now()).unwrap();
        assert_eq!(
            msg,
            "🎲 Random Task Reminder 🎲\nDon't forget about: Buy milk\n\
             Due in: 1 days and 2 hours and 5 minutes\nDeadline: 2026-04-11 10:05\n\
             Description: 2 liters"
        );
        let plain = random_reminder_message(&task(None), now()).unwrap();
        assert!(!plain.contains("Description"));

        let undated = Task {
            end_time: None,
            ..task(None)
        };
        assert!(random_reminder_message(&undated, now()).is_none());
    }

    #[test]
    fn test_next_task_message() {
        let msg = next_task_message(&task(None), now()).unwrap();
        assert!(msg.starts_with("🎲 Random Task:\nBuy milk\n"));
        assert!(msg.ends_with("Deadline: 2026-04-11 10:05"));
    }
}

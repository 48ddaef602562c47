use crate::application::{next_id, require_user};
use crate::domain::clock::{parse_date, today_in};
use crate::domain::models::{
    DailyGoal, LifeGoal, SessionType, StudySession, Subject, UserProfile,
};
use crate::infrastructure::error::AppError;
use crate::infrastructure::store::{self, SqliteStore};
use chrono::{Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use rusqlite::Connection;

const WEEKLY_WINDOW_DAYS: i64 = 7;
const MAX_TIMER_DURATION_MINUTES: u32 = 240;

/// Streak badges, awarded when the current streak first reaches a threshold.
const BADGE_THRESHOLDS: [(u32, &str); 4] =
    [(7, "bronze"), (14, "silver"), (21, "gold"), (30, "diamond")];

#[derive(Debug, Clone)]
pub struct CreateSessionArgs {
    pub duration: u32,
    pub session_type: SessionType,
    pub subject: Option<String>,
    pub notes: Option<String>,
    pub completed: bool,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateLifeGoalArgs {
    pub title: Option<String>,
    pub description: Option<String>,
    pub target_date: Option<String>,
}

pub fn create_session(
    sqlite: &SqliteStore,
    tz: Tz,
    user_id: &str,
    args: CreateSessionArgs,
) -> Result<String, AppError> {
    let user_id = require_user(user_id)?;
    let today = today_in(tz);
    let mut conn = sqlite.connect()?;
    let tx = conn.transaction()?;
    let session_id = record_session(&tx, user_id, today, true, args)?;
    tx.commit()?;
    Ok(session_id)
}

/// Manual backfill for a past (or current) date. Totals are updated for
/// completed focus sessions regardless of date; goal counters and the streak
/// only move when the session lands on today.
pub fn create_manual_session(
    sqlite: &SqliteStore,
    tz: Tz,
    user_id: &str,
    date: &str,
    args: CreateSessionArgs,
) -> Result<String, AppError> {
    let user_id = require_user(user_id)?;
    let date = parse_date(date)?;
    let is_today = date == today_in(tz);
    let mut conn = sqlite.connect()?;
    let tx = conn.transaction()?;
    let session_id = record_session(&tx, user_id, date, is_today, args)?;
    tx.commit()?;
    Ok(session_id)
}

fn record_session(
    conn: &Connection,
    user_id: &str,
    date: NaiveDate,
    is_today: bool,
    args: CreateSessionArgs,
) -> Result<String, AppError> {
    let session = StudySession {
        id: next_id("ses"),
        user_id: user_id.to_string(),
        duration: args.duration,
        session_type: args.session_type,
        subject: args.subject,
        notes: args.notes,
        completed: args.completed,
        date: date.format("%Y-%m-%d").to_string(),
        created_at: Utc::now(),
    };
    session.validate()?;
    store::insert_session(conn, &session)?;

    if session.completed && session.session_type == SessionType::Focus {
        let mut profile = store::ensure_profile(conn, user_id)?;
        profile.total_study_time += session.duration;

        if is_today {
            if let Some(goal) = store::goal_on_date(conn, user_id, &session.date)? {
                store::bump_goal_progress(conn, &goal.id, session.duration)?;
            }
            apply_streak(&mut profile, date);
        }
        store::save_profile(conn, &profile)?;
    }

    Ok(session.id)
}

/// Streak transition, applied on the first completed focus session of a day:
/// consecutive days extend the streak, a gap resets it to 1, and repeat
/// activity on the same day is a no-op.
pub(crate) fn apply_streak(profile: &mut UserProfile, date: NaiveDate) {
    let last_active = profile
        .last_active_date
        .as_deref()
        .and_then(|raw| NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok());

    if last_active == Some(date) {
        return;
    }

    profile.current_streak = match last_active {
        Some(last) if date - last == Duration::days(1) => profile.current_streak + 1,
        _ => 1,
    };
    profile.longest_streak = profile.longest_streak.max(profile.current_streak);
    profile.last_active_date = Some(date.format("%Y-%m-%d").to_string());

    for (threshold, badge) in BADGE_THRESHOLDS {
        if profile.current_streak >= threshold && !profile.badges.iter().any(|b| b == badge) {
            profile.badges.push(badge.to_string());
        }
    }
}

pub fn list_today_sessions(
    sqlite: &SqliteStore,
    tz: Tz,
    user_id: &str,
) -> Result<Vec<StudySession>, AppError> {
    let user_id = require_user(user_id)?;
    let today = today_in(tz).format("%Y-%m-%d").to_string();
    let conn = sqlite.connect()?;
    store::sessions_on_date(&conn, user_id, &today)
}

pub fn list_weekly_sessions(
    sqlite: &SqliteStore,
    tz: Tz,
    user_id: &str,
) -> Result<Vec<StudySession>, AppError> {
    let user_id = require_user(user_id)?;
    let week_ago = (today_in(tz) - Duration::days(WEEKLY_WINDOW_DAYS))
        .format("%Y-%m-%d")
        .to_string();
    let conn = sqlite.connect()?;
    store::sessions_since(&conn, user_id, &week_ago)
}

pub fn upsert_daily_goal(
    sqlite: &SqliteStore,
    tz: Tz,
    user_id: &str,
    target_sessions: u32,
    target_minutes: u32,
) -> Result<String, AppError> {
    let user_id = require_user(user_id)?;
    let today = today_in(tz).format("%Y-%m-%d").to_string();
    let mut conn = sqlite.connect()?;
    let tx = conn.transaction()?;

    let goal_id = if let Some(existing) = store::goal_on_date(&tx, user_id, &today)? {
        let updated = DailyGoal {
            target_sessions,
            target_minutes,
            ..existing
        };
        updated.validate()?;
        store::update_goal_targets(&tx, &updated.id, target_sessions, target_minutes)?;
        updated.id
    } else {
        let goal = DailyGoal {
            id: next_id("goal"),
            user_id: user_id.to_string(),
            date: today,
            target_sessions,
            target_minutes,
            completed_sessions: 0,
            completed_minutes: 0,
        };
        goal.validate()?;
        store::insert_goal(&tx, &goal)?;
        goal.id
    };

    tx.commit()?;
    Ok(goal_id)
}

pub fn get_today_goal(
    sqlite: &SqliteStore,
    tz: Tz,
    user_id: &str,
) -> Result<Option<DailyGoal>, AppError> {
    let user_id = require_user(user_id)?;
    let today = today_in(tz).format("%Y-%m-%d").to_string();
    let conn = sqlite.connect()?;
    store::goal_on_date(&conn, user_id, &today)
}

pub fn create_subject(
    sqlite: &SqliteStore,
    user_id: &str,
    name: String,
    color: String,
) -> Result<String, AppError> {
    let user_id = require_user(user_id)?;
    let subject = Subject {
        id: next_id("sub"),
        user_id: user_id.to_string(),
        name,
        color,
        total_time: 0,
    };
    subject.validate()?;
    let conn = sqlite.connect()?;
    store::insert_subject(&conn, &subject)?;
    Ok(subject.id)
}

pub fn list_subjects(sqlite: &SqliteStore, user_id: &str) -> Result<Vec<Subject>, AppError> {
    let user_id = require_user(user_id)?;
    let conn = sqlite.connect()?;
    store::subjects_for_user(&conn, user_id)
}

pub fn create_life_goal(
    sqlite: &SqliteStore,
    user_id: &str,
    title: String,
    description: Option<String>,
    target_date: Option<String>,
) -> Result<String, AppError> {
    let user_id = require_user(user_id)?;
    let goal = LifeGoal {
        id: next_id("lg"),
        user_id: user_id.to_string(),
        title,
        description,
        target_date,
        completed: false,
        created_at: Utc::now(),
    };
    goal.validate()?;
    let conn = sqlite.connect()?;
    store::insert_life_goal(&conn, &goal)?;
    Ok(goal.id)
}

pub fn update_life_goal(
    sqlite: &SqliteStore,
    user_id: &str,
    goal_id: &str,
    args: UpdateLifeGoalArgs,
) -> Result<(), AppError> {
    let user_id = require_user(user_id)?;
    let conn = sqlite.connect()?;
    let mut goal = owned_life_goal(&conn, user_id, goal_id)?;

    if let Some(title) = args.title {
        goal.title = title;
    }
    if let Some(description) = args.description {
        goal.description = Some(description);
    }
    if let Some(target_date) = args.target_date {
        goal.target_date = Some(target_date);
    }
    goal.validate()?;
    store::update_life_goal(&conn, &goal)
}

pub fn set_life_goal_completed(
    sqlite: &SqliteStore,
    user_id: &str,
    goal_id: &str,
    completed: bool,
) -> Result<(), AppError> {
    let user_id = require_user(user_id)?;
    let conn = sqlite.connect()?;
    let mut goal = owned_life_goal(&conn, user_id, goal_id)?;
    goal.completed = completed;
    store::update_life_goal(&conn, &goal)
}

/// Incomplete goals first, then soonest target date (dateless ones last),
/// then oldest creation time.
pub fn list_life_goals(sqlite: &SqliteStore, user_id: &str) -> Result<Vec<LifeGoal>, AppError> {
    let user_id = require_user(user_id)?;
    let conn = sqlite.connect()?;
    let mut goals = store::life_goals_for_user(&conn, user_id)?;
    goals.sort_by(|a, b| {
        (a.completed)
            .cmp(&b.completed)
            .then_with(|| match (a.target_date.as_deref(), b.target_date.as_deref()) {
                (Some(a_date), Some(b_date)) => a_date.cmp(b_date),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => std::cmp::Ordering::Equal,
            })
            .then_with(|| a.created_at.cmp(&b.created_at))
    });
    Ok(goals)
}

pub fn get_profile(sqlite: &SqliteStore, user_id: &str) -> Result<UserProfile, AppError> {
    let user_id = require_user(user_id)?;
    let conn = sqlite.connect()?;
    store::ensure_profile(&conn, user_id)
}

pub fn update_user_settings(
    sqlite: &SqliteStore,
    user_id: &str,
    focus_duration: Option<u32>,
    break_duration: Option<u32>,
) -> Result<UserProfile, AppError> {
    let user_id = require_user(user_id)?;
    for (value, field) in [(focus_duration, "focusDuration"), (break_duration, "breakDuration")] {
        if let Some(minutes) = value {
            if minutes == 0 || minutes > MAX_TIMER_DURATION_MINUTES {
                return Err(AppError::Validation(format!(
                    "{field} must be between 1 and {MAX_TIMER_DURATION_MINUTES} minutes"
                )));
            }
        }
    }

    let conn = sqlite.connect()?;
    let mut profile = store::ensure_profile(&conn, user_id)?;
    if let Some(focus_duration) = focus_duration {
        profile.focus_duration = focus_duration;
    }
    if let Some(break_duration) = break_duration {
        profile.break_duration = break_duration;
    }
    store::save_profile(&conn, &profile)?;
    Ok(profile)
}

fn owned_life_goal(conn: &Connection, user_id: &str, goal_id: &str) -> Result<LifeGoal, AppError> {
    store::life_goal_by_id(conn, goal_id)?
        .filter(|goal| goal.user_id == user_id)
        .ok_or_else(|| AppError::NotFound(format!("life goal not found: {goal_id}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::storage::initialize_database;
    use std::fs;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static NEXT_TEMP_DB: AtomicUsize = AtomicUsize::new(0);

    struct TempDb {
        dir: PathBuf,
        store: SqliteStore,
    }

    impl TempDb {
        fn new() -> Self {
            let sequence = NEXT_TEMP_DB.fetch_add(1, Ordering::Relaxed);
            let dir = std::env::temp_dir().join(format!(
                "studytrack-session-tests-{}-{}",
                std::process::id(),
                sequence
            ));
            fs::create_dir_all(&dir).expect("create temp dir");
            let db_path = dir.join("sessions.sqlite");
            initialize_database(&db_path).expect("initialize database");
            Self {
                dir,
                store: SqliteStore::new(db_path),
            }
        }
    }

    impl Drop for TempDb {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.dir);
        }
    }

    const TZ: Tz = Tz::UTC;

    fn focus_session(duration: u32) -> CreateSessionArgs {
        CreateSessionArgs {
            duration,
            session_type: SessionType::Focus,
            subject: Some("Mathematics".to_string()),
            notes: None,
            completed: true,
        }
    }

    fn date(value: &str) -> NaiveDate {
        NaiveDate::parse_from_str(value, "%Y-%m-%d").expect("valid date")
    }

    #[test]
    fn completed_focus_session_updates_goal_and_totals() {
        let db = TempDb::new();
        upsert_daily_goal(&db.store, TZ, "user-1", 4, 120).expect("goal");

        create_session(&db.store, TZ, "user-1", focus_session(25)).expect("session");

        let goal = get_today_goal(&db.store, TZ, "user-1").expect("query").expect("exists");
        assert_eq!(goal.completed_sessions, 1);
        assert_eq!(goal.completed_minutes, 25);
        assert_eq!(goal.target_sessions, 4);

        let profile = get_profile(&db.store, "user-1").expect("profile");
        assert_eq!(profile.total_study_time, 25);
        assert_eq!(profile.current_streak, 1);
    }

    #[test]
    fn break_and_abandoned_sessions_leave_derived_state_alone() {
        let db = TempDb::new();
        upsert_daily_goal(&db.store, TZ, "user-1", 4, 120).expect("goal");

        create_session(
            &db.store,
            TZ,
            "user-1",
            CreateSessionArgs {
                session_type: SessionType::Break,
                ..focus_session(5)
            },
        )
        .expect("break session");
        create_session(
            &db.store,
            TZ,
            "user-1",
            CreateSessionArgs {
                completed: false,
                ..focus_session(25)
            },
        )
        .expect("abandoned session");

        let goal = get_today_goal(&db.store, TZ, "user-1").expect("query").expect("exists");
        assert_eq!(goal.completed_sessions, 0);
        assert_eq!(goal.completed_minutes, 0);

        let profile = get_profile(&db.store, "user-1").expect("profile");
        assert_eq!(profile.total_study_time, 0);
        assert_eq!(profile.current_streak, 0);
    }

    #[test]
    fn manual_backfill_updates_totals_but_not_todays_goal() {
        let db = TempDb::new();
        upsert_daily_goal(&db.store, TZ, "user-1", 4, 120).expect("goal");

        create_manual_session(&db.store, TZ, "user-1", "2026-01-10", focus_session(40))
            .expect("backfill");

        let goal = get_today_goal(&db.store, TZ, "user-1").expect("query").expect("exists");
        assert_eq!(goal.completed_sessions, 0);

        let profile = get_profile(&db.store, "user-1").expect("profile");
        assert_eq!(profile.total_study_time, 40);
        assert_eq!(profile.current_streak, 0);
    }

    #[test]
    fn session_duration_is_validated() {
        let db = TempDb::new();
        let zero = create_session(&db.store, TZ, "user-1", focus_session(0));
        assert!(matches!(zero, Err(AppError::Validation(_))));

        let oversized = create_session(&db.store, TZ, "user-1", focus_session(24 * 60 + 1));
        assert!(matches!(oversized, Err(AppError::Validation(_))));
    }

    #[test]
    fn daily_goal_upsert_patches_targets_in_place() {
        let db = TempDb::new();
        let first = upsert_daily_goal(&db.store, TZ, "user-1", 4, 120).expect("insert");
        let second = upsert_daily_goal(&db.store, TZ, "user-1", 6, 180).expect("update");
        assert_eq!(first, second);

        let goal = get_today_goal(&db.store, TZ, "user-1").expect("query").expect("exists");
        assert_eq!(goal.target_sessions, 6);
        assert_eq!(goal.target_minutes, 180);

        let invalid = upsert_daily_goal(&db.store, TZ, "user-1", 0, 120);
        assert!(matches!(invalid, Err(AppError::Validation(_))));
    }

    #[test]
    fn streak_extends_on_consecutive_days_and_resets_after_gap() {
        let mut profile = UserProfile::new("user-1");

        apply_streak(&mut profile, date("2026-08-01"));
        assert_eq!(profile.current_streak, 1);

        apply_streak(&mut profile, date("2026-08-02"));
        assert_eq!(profile.current_streak, 2);
        assert_eq!(profile.longest_streak, 2);

        // Second session on the same day is a no-op.
        apply_streak(&mut profile, date("2026-08-02"));
        assert_eq!(profile.current_streak, 2);

        apply_streak(&mut profile, date("2026-08-05"));
        assert_eq!(profile.current_streak, 1);
        assert_eq!(profile.longest_streak, 2);
        assert_eq!(profile.last_active_date.as_deref(), Some("2026-08-05"));
    }

    #[test]
    fn streak_badges_are_awarded_once_at_thresholds() {
        let mut profile = UserProfile::new("user-1");
        for offset in 0..7 {
            apply_streak(&mut profile, date("2026-08-01") + Duration::days(offset));
        }
        assert_eq!(profile.current_streak, 7);
        assert_eq!(profile.badges, vec!["bronze".to_string()]);

        for offset in 7..14 {
            apply_streak(&mut profile, date("2026-08-01") + Duration::days(offset));
        }
        assert_eq!(profile.badges, vec!["bronze".to_string(), "silver".to_string()]);
    }

    #[test]
    fn life_goals_sort_incomplete_then_soonest_then_oldest() {
        let db = TempDb::new();
        let done = create_life_goal(&db.store, "user-1", "Done".to_string(), None, None)
            .expect("goal");
        set_life_goal_completed(&db.store, "user-1", &done, true).expect("complete");

        let later = create_life_goal(
            &db.store,
            "user-1",
            "Later".to_string(),
            None,
            Some("2026-12-01".to_string()),
        )
        .expect("goal");
        let soon = create_life_goal(
            &db.store,
            "user-1",
            "Soon".to_string(),
            None,
            Some("2026-09-01".to_string()),
        )
        .expect("goal");
        let dateless = create_life_goal(&db.store, "user-1", "Someday".to_string(), None, None)
            .expect("goal");

        let listed = list_life_goals(&db.store, "user-1").expect("list");
        let ids: Vec<&str> = listed.iter().map(|goal| goal.id.as_str()).collect();
        assert_eq!(ids, vec![soon.as_str(), later.as_str(), dateless.as_str(), done.as_str()]);
    }

    #[test]
    fn settings_update_is_validated_and_persisted() {
        let db = TempDb::new();
        let profile = update_user_settings(&db.store, "user-1", Some(50), Some(10))
            .expect("update settings");
        assert_eq!(profile.focus_duration, 50);
        assert_eq!(profile.break_duration, 10);

        let invalid = update_user_settings(&db.store, "user-1", Some(0), None);
        assert!(matches!(invalid, Err(AppError::Validation(_))));
        let oversized = update_user_settings(&db.store, "user-1", None, Some(500));
        assert!(matches!(oversized, Err(AppError::Validation(_))));
    }

    #[test]
    fn life_goal_updates_are_ownership_checked() {
        let db = TempDb::new();
        let goal = create_life_goal(&db.store, "user-1", "Mine".to_string(), None, None)
            .expect("goal");

        let foreign = set_life_goal_completed(&db.store, "user-2", &goal, true);
        assert!(matches!(foreign, Err(AppError::NotFound(_))));
    }
}

use crate::domain::models::{
    BlockKind, DailyGoal, DayOfWeek, DayScope, FixedEvent, LifeGoal, SessionType, StudySession,
    Subject, Timetable, TimetableBlock, UserProfile,
};
use crate::infrastructure::error::AppError;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};

/// Handle to the SQLite database. Queries are free functions over a
/// `Connection` so that services can run several of them inside one
/// transaction; the handle only knows how to connect.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    db_path: PathBuf,
}

impl SqliteStore {
    pub fn new(db_path: impl AsRef<Path>) -> Self {
        Self {
            db_path: db_path.as_ref().to_path_buf(),
        }
    }

    pub fn connect(&self) -> Result<Connection, AppError> {
        Connection::open(&self.db_path).map_err(AppError::from)
    }
}

// ---- profiles ----

pub fn load_profile(conn: &Connection, user_id: &str) -> Result<Option<UserProfile>, AppError> {
    let row = conn
        .query_row(
            "SELECT user_id, current_streak, longest_streak, last_active_date,
                    total_study_time, level, badges, focus_duration, break_duration
             FROM profiles WHERE user_id = ?1",
            params![user_id],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, u32>(1)?,
                    row.get::<_, u32>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, u32>(4)?,
                    row.get::<_, u32>(5)?,
                    row.get::<_, String>(6)?,
                    row.get::<_, u32>(7)?,
                    row.get::<_, u32>(8)?,
                ))
            },
        )
        .optional()?;

    let Some((
        user_id,
        current_streak,
        longest_streak,
        last_active_date,
        total_study_time,
        level,
        badges_raw,
        focus_duration,
        break_duration,
    )) = row
    else {
        return Ok(None);
    };

    let badges: Vec<String> = serde_json::from_str(&badges_raw)
        .map_err(|error| AppError::InvalidConfig(format!("invalid stored badges: {error}")))?;

    Ok(Some(UserProfile {
        user_id,
        current_streak,
        longest_streak,
        last_active_date,
        total_study_time,
        level,
        badges,
        focus_duration,
        break_duration,
    }))
}

pub fn save_profile(conn: &Connection, profile: &UserProfile) -> Result<(), AppError> {
    let badges = serde_json::to_string(&profile.badges)?;
    conn.execute(
        "INSERT INTO profiles (user_id, current_streak, longest_streak, last_active_date,
                               total_study_time, level, badges, focus_duration, break_duration)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
         ON CONFLICT(user_id) DO UPDATE SET
           current_streak = excluded.current_streak,
           longest_streak = excluded.longest_streak,
           last_active_date = excluded.last_active_date,
           total_study_time = excluded.total_study_time,
           level = excluded.level,
           badges = excluded.badges,
           focus_duration = excluded.focus_duration,
           break_duration = excluded.break_duration",
        params![
            profile.user_id,
            profile.current_streak,
            profile.longest_streak,
            profile.last_active_date,
            profile.total_study_time,
            profile.level,
            badges,
            profile.focus_duration,
            profile.break_duration,
        ],
    )?;
    Ok(())
}

/// Load the profile for a user, creating the default row on first touch.
pub fn ensure_profile(conn: &Connection, user_id: &str) -> Result<UserProfile, AppError> {
    if let Some(profile) = load_profile(conn, user_id)? {
        return Ok(profile);
    }
    let profile = UserProfile::new(user_id);
    save_profile(conn, &profile)?;
    Ok(profile)
}

// ---- study sessions ----

fn session_from_row(row: &Row<'_>) -> rusqlite::Result<(StudySession, String, String)> {
    Ok((
        StudySession {
            id: row.get(0)?,
            user_id: row.get(1)?,
            duration: row.get(2)?,
            session_type: SessionType::Focus,
            subject: row.get(4)?,
            notes: row.get(5)?,
            completed: row.get(6)?,
            date: row.get(7)?,
            created_at: Utc::now(),
        },
        row.get::<_, String>(3)?,
        row.get::<_, String>(8)?,
    ))
}

fn finish_session(
    (mut session, type_raw, created_raw): (StudySession, String, String),
) -> Result<StudySession, AppError> {
    session.session_type = SessionType::parse(&type_raw)
        .map_err(|_| AppError::InvalidConfig(format!("invalid stored session type: {type_raw}")))?;
    session.created_at = parse_stored_timestamp(&created_raw)?;
    Ok(session)
}

const SESSION_COLUMNS: &str = "id, user_id, duration, session_type, subject, notes, completed, \
                               date, created_at";

pub fn insert_session(conn: &Connection, session: &StudySession) -> Result<(), AppError> {
    conn.execute(
        "INSERT INTO study_sessions (id, user_id, duration, session_type, subject, notes,
                                     completed, date, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            session.id,
            session.user_id,
            session.duration,
            session.session_type.as_str(),
            session.subject,
            session.notes,
            session.completed,
            session.date,
            session.created_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

pub fn sessions_on_date(
    conn: &Connection,
    user_id: &str,
    date: &str,
) -> Result<Vec<StudySession>, AppError> {
    let mut statement = conn.prepare(&format!(
        "SELECT {SESSION_COLUMNS} FROM study_sessions
         WHERE user_id = ?1 AND date = ?2 ORDER BY created_at"
    ))?;
    let rows = statement.query_map(params![user_id, date], session_from_row)?;
    rows.collect::<rusqlite::Result<Vec<_>>>()?
        .into_iter()
        .map(finish_session)
        .collect()
}

pub fn sessions_since(
    conn: &Connection,
    user_id: &str,
    date: &str,
) -> Result<Vec<StudySession>, AppError> {
    let mut statement = conn.prepare(&format!(
        "SELECT {SESSION_COLUMNS} FROM study_sessions
         WHERE user_id = ?1 AND date >= ?2 ORDER BY date, created_at"
    ))?;
    let rows = statement.query_map(params![user_id, date], session_from_row)?;
    rows.collect::<rusqlite::Result<Vec<_>>>()?
        .into_iter()
        .map(finish_session)
        .collect()
}

// ---- daily goals ----

fn goal_from_row(row: &Row<'_>) -> rusqlite::Result<DailyGoal> {
    Ok(DailyGoal {
        id: row.get(0)?,
        user_id: row.get(1)?,
        date: row.get(2)?,
        target_sessions: row.get(3)?,
        target_minutes: row.get(4)?,
        completed_sessions: row.get(5)?,
        completed_minutes: row.get(6)?,
    })
}

pub fn goal_on_date(
    conn: &Connection,
    user_id: &str,
    date: &str,
) -> Result<Option<DailyGoal>, AppError> {
    conn.query_row(
        "SELECT id, user_id, date, target_sessions, target_minutes,
                completed_sessions, completed_minutes
         FROM daily_goals WHERE user_id = ?1 AND date = ?2",
        params![user_id, date],
        goal_from_row,
    )
    .optional()
    .map_err(AppError::from)
}

pub fn insert_goal(conn: &Connection, goal: &DailyGoal) -> Result<(), AppError> {
    conn.execute(
        "INSERT INTO daily_goals (id, user_id, date, target_sessions, target_minutes,
                                  completed_sessions, completed_minutes)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            goal.id,
            goal.user_id,
            goal.date,
            goal.target_sessions,
            goal.target_minutes,
            goal.completed_sessions,
            goal.completed_minutes,
        ],
    )?;
    Ok(())
}

pub fn update_goal_targets(
    conn: &Connection,
    goal_id: &str,
    target_sessions: u32,
    target_minutes: u32,
) -> Result<(), AppError> {
    conn.execute(
        "UPDATE daily_goals SET target_sessions = ?2, target_minutes = ?3 WHERE id = ?1",
        params![goal_id, target_sessions, target_minutes],
    )?;
    Ok(())
}

pub fn bump_goal_progress(conn: &Connection, goal_id: &str, minutes: u32) -> Result<(), AppError> {
    conn.execute(
        "UPDATE daily_goals
         SET completed_sessions = completed_sessions + 1,
             completed_minutes = completed_minutes + ?2
         WHERE id = ?1",
        params![goal_id, minutes],
    )?;
    Ok(())
}

// ---- subjects ----

fn subject_from_row(row: &Row<'_>) -> rusqlite::Result<Subject> {
    Ok(Subject {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        color: row.get(3)?,
        total_time: row.get(4)?,
    })
}

pub fn insert_subject(conn: &Connection, subject: &Subject) -> Result<(), AppError> {
    conn.execute(
        "INSERT INTO subjects (id, user_id, name, color, total_time)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            subject.id,
            subject.user_id,
            subject.name,
            subject.color,
            subject.total_time
        ],
    )?;
    Ok(())
}

pub fn subjects_for_user(conn: &Connection, user_id: &str) -> Result<Vec<Subject>, AppError> {
    let mut statement = conn.prepare(
        "SELECT id, user_id, name, color, total_time FROM subjects
         WHERE user_id = ?1 ORDER BY rowid",
    )?;
    let rows = statement.query_map(params![user_id], subject_from_row)?;
    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(AppError::from)
}

pub fn subject_by_id(conn: &Connection, subject_id: &str) -> Result<Option<Subject>, AppError> {
    conn.query_row(
        "SELECT id, user_id, name, color, total_time FROM subjects WHERE id = ?1",
        params![subject_id],
        subject_from_row,
    )
    .optional()
    .map_err(AppError::from)
}

// ---- life goals ----

fn life_goal_from_row(row: &Row<'_>) -> rusqlite::Result<(LifeGoal, String)> {
    Ok((
        LifeGoal {
            id: row.get(0)?,
            user_id: row.get(1)?,
            title: row.get(2)?,
            description: row.get(3)?,
            target_date: row.get(4)?,
            completed: row.get(5)?,
            created_at: Utc::now(),
        },
        row.get::<_, String>(6)?,
    ))
}

fn finish_life_goal((mut goal, created_raw): (LifeGoal, String)) -> Result<LifeGoal, AppError> {
    goal.created_at = parse_stored_timestamp(&created_raw)?;
    Ok(goal)
}

pub fn insert_life_goal(conn: &Connection, goal: &LifeGoal) -> Result<(), AppError> {
    conn.execute(
        "INSERT INTO life_goals (id, user_id, title, description, target_date, completed,
                                 created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            goal.id,
            goal.user_id,
            goal.title,
            goal.description,
            goal.target_date,
            goal.completed,
            goal.created_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

pub fn life_goal_by_id(conn: &Connection, goal_id: &str) -> Result<Option<LifeGoal>, AppError> {
    let row = conn
        .query_row(
            "SELECT id, user_id, title, description, target_date, completed, created_at
             FROM life_goals WHERE id = ?1",
            params![goal_id],
            life_goal_from_row,
        )
        .optional()?;
    row.map(finish_life_goal).transpose()
}

pub fn update_life_goal(conn: &Connection, goal: &LifeGoal) -> Result<(), AppError> {
    conn.execute(
        "UPDATE life_goals
         SET title = ?2, description = ?3, target_date = ?4, completed = ?5
         WHERE id = ?1",
        params![
            goal.id,
            goal.title,
            goal.description,
            goal.target_date,
            goal.completed
        ],
    )?;
    Ok(())
}

pub fn life_goals_for_user(conn: &Connection, user_id: &str) -> Result<Vec<LifeGoal>, AppError> {
    let mut statement = conn.prepare(
        "SELECT id, user_id, title, description, target_date, completed, created_at
         FROM life_goals WHERE user_id = ?1",
    )?;
    let rows = statement.query_map(params![user_id], life_goal_from_row)?;
    rows.collect::<rusqlite::Result<Vec<_>>>()?
        .into_iter()
        .map(finish_life_goal)
        .collect()
}

// ---- timetables ----

fn timetable_from_row(row: &Row<'_>) -> rusqlite::Result<(Timetable, String)> {
    Ok((
        Timetable {
            id: row.get(0)?,
            user_id: row.get(1)?,
            title: row.get(2)?,
            day_start: row.get(3)?,
            day_end: row.get(4)?,
            break_default_minutes: row.get(5)?,
            rotate_last_block: row.get(6)?,
            weak_subject_ids: Vec::new(),
        },
        row.get::<_, String>(7)?,
    ))
}

fn finish_timetable(
    (mut timetable, weak_raw): (Timetable, String),
) -> Result<Timetable, AppError> {
    timetable.weak_subject_ids = serde_json::from_str(&weak_raw).map_err(|error| {
        AppError::InvalidConfig(format!("invalid stored weak_subject_ids: {error}"))
    })?;
    Ok(timetable)
}

const TIMETABLE_COLUMNS: &str = "id, user_id, title, day_start, day_end, break_default_minutes, \
                                 rotate_last_block, weak_subject_ids";

pub fn first_timetable_for_user(
    conn: &Connection,
    user_id: &str,
) -> Result<Option<Timetable>, AppError> {
    let row = conn
        .query_row(
            &format!(
                "SELECT {TIMETABLE_COLUMNS} FROM timetables
                 WHERE user_id = ?1 ORDER BY rowid LIMIT 1"
            ),
            params![user_id],
            timetable_from_row,
        )
        .optional()?;
    row.map(finish_timetable).transpose()
}

pub fn timetable_by_id(
    conn: &Connection,
    timetable_id: &str,
) -> Result<Option<Timetable>, AppError> {
    let row = conn
        .query_row(
            &format!("SELECT {TIMETABLE_COLUMNS} FROM timetables WHERE id = ?1"),
            params![timetable_id],
            timetable_from_row,
        )
        .optional()?;
    row.map(finish_timetable).transpose()
}

pub fn insert_timetable(conn: &Connection, timetable: &Timetable) -> Result<(), AppError> {
    let weak_subject_ids = serde_json::to_string(&timetable.weak_subject_ids)?;
    conn.execute(
        "INSERT INTO timetables (id, user_id, title, day_start, day_end,
                                 break_default_minutes, rotate_last_block, weak_subject_ids)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            timetable.id,
            timetable.user_id,
            timetable.title,
            timetable.day_start,
            timetable.day_end,
            timetable.break_default_minutes,
            timetable.rotate_last_block,
            weak_subject_ids,
        ],
    )?;
    Ok(())
}

pub fn update_timetable(conn: &Connection, timetable: &Timetable) -> Result<(), AppError> {
    let weak_subject_ids = serde_json::to_string(&timetable.weak_subject_ids)?;
    conn.execute(
        "UPDATE timetables
         SET title = ?2, day_start = ?3, day_end = ?4, break_default_minutes = ?5,
             rotate_last_block = ?6, weak_subject_ids = ?7
         WHERE id = ?1",
        params![
            timetable.id,
            timetable.title,
            timetable.day_start,
            timetable.day_end,
            timetable.break_default_minutes,
            timetable.rotate_last_block,
            weak_subject_ids,
        ],
    )?;
    Ok(())
}

// ---- timetable blocks ----

fn block_from_row(row: &Row<'_>) -> rusqlite::Result<(TimetableBlock, String, Option<String>)> {
    Ok((
        TimetableBlock {
            id: row.get(0)?,
            timetable_id: row.get(1)?,
            kind: BlockKind::Study,
            subject_id: row.get(3)?,
            label: row.get(4)?,
            color: row.get(5)?,
            start: row.get(6)?,
            end: row.get(7)?,
            day_scope: DayScope::Any,
            locked: row.get(9)?,
        },
        row.get::<_, String>(2)?,
        row.get::<_, Option<String>>(8)?,
    ))
}

fn finish_block(
    (mut block, kind_raw, day_raw): (TimetableBlock, String, Option<String>),
) -> Result<TimetableBlock, AppError> {
    block.kind = BlockKind::parse(&kind_raw)
        .map_err(|_| AppError::InvalidConfig(format!("invalid stored block kind: {kind_raw}")))?;
    block.day_scope = parse_stored_day(day_raw.as_deref())?;
    Ok(block)
}

const BLOCK_COLUMNS: &str = "id, timetable_id, kind, subject_id, label, color, start_time, \
                             end_time, day_of_week, locked";

pub fn blocks_in_timetable(
    conn: &Connection,
    timetable_id: &str,
) -> Result<Vec<TimetableBlock>, AppError> {
    let mut statement = conn.prepare(&format!(
        "SELECT {BLOCK_COLUMNS} FROM timetable_blocks
         WHERE timetable_id = ?1 ORDER BY start_time"
    ))?;
    let rows = statement.query_map(params![timetable_id], block_from_row)?;
    rows.collect::<rusqlite::Result<Vec<_>>>()?
        .into_iter()
        .map(finish_block)
        .collect()
}

pub fn block_by_id(conn: &Connection, block_id: &str) -> Result<Option<TimetableBlock>, AppError> {
    let row = conn
        .query_row(
            &format!("SELECT {BLOCK_COLUMNS} FROM timetable_blocks WHERE id = ?1"),
            params![block_id],
            block_from_row,
        )
        .optional()?;
    row.map(finish_block).transpose()
}

pub fn insert_block(conn: &Connection, block: &TimetableBlock) -> Result<(), AppError> {
    conn.execute(
        "INSERT INTO timetable_blocks (id, timetable_id, kind, subject_id, label, color,
                                       start_time, end_time, day_of_week, locked)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            block.id,
            block.timetable_id,
            block.kind.as_str(),
            block.subject_id,
            block.label,
            block.color,
            block.start,
            block.end,
            block.day_scope.day().map(DayOfWeek::as_str),
            block.locked,
        ],
    )?;
    Ok(())
}

pub fn update_block(conn: &Connection, block: &TimetableBlock) -> Result<(), AppError> {
    conn.execute(
        "UPDATE timetable_blocks
         SET kind = ?2, subject_id = ?3, label = ?4, color = ?5, start_time = ?6,
             end_time = ?7, day_of_week = ?8, locked = ?9
         WHERE id = ?1",
        params![
            block.id,
            block.kind.as_str(),
            block.subject_id,
            block.label,
            block.color,
            block.start,
            block.end,
            block.day_scope.day().map(DayOfWeek::as_str),
            block.locked,
        ],
    )?;
    Ok(())
}

pub fn delete_block(conn: &Connection, block_id: &str) -> Result<bool, AppError> {
    let removed = conn.execute("DELETE FROM timetable_blocks WHERE id = ?1", params![block_id])?;
    Ok(removed > 0)
}

// ---- fixed events ----

fn event_from_row(row: &Row<'_>) -> rusqlite::Result<(FixedEvent, Option<String>)> {
    Ok((
        FixedEvent {
            id: row.get(0)?,
            user_id: row.get(1)?,
            label: row.get(2)?,
            start: row.get(3)?,
            end: row.get(4)?,
            color: row.get(5)?,
            day_scope: DayScope::Any,
        },
        row.get::<_, Option<String>>(6)?,
    ))
}

fn finish_event((mut event, day_raw): (FixedEvent, Option<String>)) -> Result<FixedEvent, AppError> {
    event.day_scope = parse_stored_day(day_raw.as_deref())?;
    Ok(event)
}

const EVENT_COLUMNS: &str = "id, user_id, label, start_time, end_time, color, day_of_week";

pub fn events_for_user(conn: &Connection, user_id: &str) -> Result<Vec<FixedEvent>, AppError> {
    let mut statement = conn.prepare(&format!(
        "SELECT {EVENT_COLUMNS} FROM fixed_events WHERE user_id = ?1 ORDER BY start_time"
    ))?;
    let rows = statement.query_map(params![user_id], event_from_row)?;
    rows.collect::<rusqlite::Result<Vec<_>>>()?
        .into_iter()
        .map(finish_event)
        .collect()
}

pub fn event_by_id(conn: &Connection, event_id: &str) -> Result<Option<FixedEvent>, AppError> {
    let row = conn
        .query_row(
            &format!("SELECT {EVENT_COLUMNS} FROM fixed_events WHERE id = ?1"),
            params![event_id],
            event_from_row,
        )
        .optional()?;
    row.map(finish_event).transpose()
}

pub fn insert_event(conn: &Connection, event: &FixedEvent) -> Result<(), AppError> {
    conn.execute(
        "INSERT INTO fixed_events (id, user_id, label, start_time, end_time, color, day_of_week)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            event.id,
            event.user_id,
            event.label,
            event.start,
            event.end,
            event.color,
            event.day_scope.day().map(DayOfWeek::as_str),
        ],
    )?;
    Ok(())
}

pub fn update_event(conn: &Connection, event: &FixedEvent) -> Result<(), AppError> {
    conn.execute(
        "UPDATE fixed_events
         SET label = ?2, start_time = ?3, end_time = ?4, color = ?5, day_of_week = ?6
         WHERE id = ?1",
        params![
            event.id,
            event.label,
            event.start,
            event.end,
            event.color,
            event.day_scope.day().map(DayOfWeek::as_str),
        ],
    )?;
    Ok(())
}

pub fn delete_event(conn: &Connection, event_id: &str) -> Result<bool, AppError> {
    let removed = conn.execute("DELETE FROM fixed_events WHERE id = ?1", params![event_id])?;
    Ok(removed > 0)
}

// ---- shared parsing ----

fn parse_stored_timestamp(raw: &str) -> Result<DateTime<Utc>, AppError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|value| value.with_timezone(&Utc))
        .map_err(|error| AppError::InvalidConfig(format!("invalid stored timestamp '{raw}': {error}")))
}

fn parse_stored_day(raw: Option<&str>) -> Result<DayScope, AppError> {
    match raw {
        None => Ok(DayScope::Any),
        Some(value) => DayOfWeek::parse(value)
            .map(DayScope::On)
            .map_err(|_| AppError::InvalidConfig(format!("invalid stored day_of_week: {value}"))),
    }
}

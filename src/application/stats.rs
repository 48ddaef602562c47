use crate::application::sessions::{get_today_goal, list_today_sessions, list_weekly_sessions};
use crate::domain::models::{SessionType, StudySession};
use crate::infrastructure::error::AppError;
use crate::infrastructure::store::SqliteStore;
use chrono_tz::Tz;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DailyProgress {
    pub target_sessions: u32,
    pub target_minutes: u32,
    pub completed_sessions: u32,
    pub completed_minutes: u32,
    pub session_ratio: f64,
    pub minute_ratio: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StudyBreakRatio {
    pub focus_minutes: u32,
    pub break_minutes: u32,
    pub focus_percentage: f64,
    pub break_percentage: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct BestDay {
    pub date: String,
    pub focus_minutes: u32,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct WeeklyInsights {
    pub total_focus_minutes: u32,
    pub total_break_minutes: u32,
    pub focus_session_count: u32,
    pub average_focus_minutes: u32,
    pub best_day: Option<BestDay>,
}

/// Today's goal progress. A missing goal reports zero targets, and a zero
/// target yields a 0 ratio by convention rather than an error.
pub fn daily_progress(sqlite: &SqliteStore, tz: Tz, user_id: &str) -> Result<DailyProgress, AppError> {
    let goal = get_today_goal(sqlite, tz, user_id)?;

    let (target_sessions, target_minutes, completed_sessions, completed_minutes) = goal
        .map(|goal| {
            (
                goal.target_sessions,
                goal.target_minutes,
                goal.completed_sessions,
                goal.completed_minutes,
            )
        })
        .unwrap_or_default();

    Ok(DailyProgress {
        target_sessions,
        target_minutes,
        completed_sessions,
        completed_minutes,
        session_ratio: guarded_ratio(completed_sessions, target_sessions),
        minute_ratio: guarded_ratio(completed_minutes, target_minutes),
    })
}

/// Completed focus vs. break minutes for today, as percentages of the total
/// tracked time. Both percentages are 0 when nothing is tracked yet.
pub fn today_ratio(sqlite: &SqliteStore, tz: Tz, user_id: &str) -> Result<StudyBreakRatio, AppError> {
    let sessions = list_today_sessions(sqlite, tz, user_id)?;
    Ok(study_break_ratio(&sessions))
}

pub fn weekly_insights(sqlite: &SqliteStore, tz: Tz, user_id: &str) -> Result<WeeklyInsights, AppError> {
    let sessions = list_weekly_sessions(sqlite, tz, user_id)?;
    Ok(summarize_week(&sessions))
}

fn guarded_ratio(completed: u32, target: u32) -> f64 {
    if target == 0 {
        return 0.0;
    }
    completed as f64 / target as f64
}

fn study_break_ratio(sessions: &[StudySession]) -> StudyBreakRatio {
    let focus_minutes = completed_minutes(sessions, SessionType::Focus);
    let break_minutes = completed_minutes(sessions, SessionType::Break);
    let total = focus_minutes + break_minutes;

    let (focus_percentage, break_percentage) = if total == 0 {
        (0.0, 0.0)
    } else {
        (
            focus_minutes as f64 / total as f64 * 100.0,
            break_minutes as f64 / total as f64 * 100.0,
        )
    };

    StudyBreakRatio {
        focus_minutes,
        break_minutes,
        focus_percentage,
        break_percentage,
    }
}

fn summarize_week(sessions: &[StudySession]) -> WeeklyInsights {
    let total_focus_minutes = completed_minutes(sessions, SessionType::Focus);
    let total_break_minutes = completed_minutes(sessions, SessionType::Break);
    let focus_session_count = sessions
        .iter()
        .filter(|session| session.completed && session.session_type == SessionType::Focus)
        .count() as u32;
    let average_focus_minutes = if focus_session_count == 0 {
        0
    } else {
        total_focus_minutes / focus_session_count
    };

    // BTreeMap keeps dates ordered, so the max scan naturally breaks ties in
    // favor of the earliest date.
    let mut focus_by_day: BTreeMap<&str, u32> = BTreeMap::new();
    for session in sessions {
        if session.completed && session.session_type == SessionType::Focus {
            *focus_by_day.entry(session.date.as_str()).or_default() += session.duration;
        }
    }
    let best_day = focus_by_day
        .into_iter()
        .fold(None::<BestDay>, |best, (date, focus_minutes)| match best {
            Some(current) if current.focus_minutes >= focus_minutes => Some(current),
            _ => Some(BestDay {
                date: date.to_string(),
                focus_minutes,
            }),
        });

    WeeklyInsights {
        total_focus_minutes,
        total_break_minutes,
        focus_session_count,
        average_focus_minutes,
        best_day,
    }
}

fn completed_minutes(sessions: &[StudySession], session_type: SessionType) -> u32 {
    sessions
        .iter()
        .filter(|session| session.completed && session.session_type == session_type)
        .map(|session| session.duration)
        .sum()
}

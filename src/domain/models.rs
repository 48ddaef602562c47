use crate::domain::clock::{parse_date, parse_time};
use crate::infrastructure::error::AppError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const MAX_SESSION_MINUTES: u32 = 24 * 60;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionType {
    Focus,
    Break,
}

impl SessionType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Focus => "focus",
            Self::Break => "break",
        }
    }

    pub fn parse(value: &str) -> Result<Self, AppError> {
        match value.trim() {
            "focus" => Ok(Self::Focus),
            "break" => Ok(Self::Break),
            other => Err(AppError::Validation(format!("unsupported session type: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    Study,
    Break,
    Fixed,
}

impl BlockKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Study => "study",
            Self::Break => "break",
            Self::Fixed => "fixed",
        }
    }

    pub fn parse(value: &str) -> Result<Self, AppError> {
        match value.trim() {
            "study" => Ok(Self::Study),
            "break" => Ok(Self::Break),
            "fixed" => Ok(Self::Fixed),
            other => Err(AppError::Validation(format!("unsupported block kind: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DayOfWeek {
    Mon,
    Tue,
    Wed,
    Thu,
    Fri,
    Sat,
    Sun,
}

impl DayOfWeek {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mon => "mon",
            Self::Tue => "tue",
            Self::Wed => "wed",
            Self::Thu => "thu",
            Self::Fri => "fri",
            Self::Sat => "sat",
            Self::Sun => "sun",
        }
    }

    pub fn parse(value: &str) -> Result<Self, AppError> {
        match value.trim() {
            "mon" => Ok(Self::Mon),
            "tue" => Ok(Self::Tue),
            "wed" => Ok(Self::Wed),
            "thu" => Ok(Self::Thu),
            "fri" => Ok(Self::Fri),
            "sat" => Ok(Self::Sat),
            "sun" => Ok(Self::Sun),
            other => Err(AppError::Validation(format!("unsupported day of week: {other}"))),
        }
    }
}

/// Day applicability of a block or fixed event. `Any` means the entry is not
/// pinned to a weekday: a fixed event applies on every day, and a block
/// collides with every day during overlap validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Option<DayOfWeek>", into = "Option<DayOfWeek>")]
pub enum DayScope {
    Any,
    On(DayOfWeek),
}

impl DayScope {
    /// Collision rule for overlap validation: an unpinned entry collides with
    /// everything; two pinned entries collide only on the same weekday.
    pub fn collides_with(self, other: DayScope) -> bool {
        match (self, other) {
            (DayScope::Any, _) | (_, DayScope::Any) => true,
            (DayScope::On(a), DayScope::On(b)) => a == b,
        }
    }

    pub fn day(self) -> Option<DayOfWeek> {
        match self {
            DayScope::Any => None,
            DayScope::On(day) => Some(day),
        }
    }
}

impl From<Option<DayOfWeek>> for DayScope {
    fn from(value: Option<DayOfWeek>) -> Self {
        match value {
            None => DayScope::Any,
            Some(day) => DayScope::On(day),
        }
    }
}

impl From<DayScope> for Option<DayOfWeek> {
    fn from(value: DayScope) -> Self {
        value.day()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserProfile {
    pub user_id: String,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub last_active_date: Option<String>,
    pub total_study_time: u32,
    pub level: u32,
    pub badges: Vec<String>,
    pub focus_duration: u32,
    pub break_duration: u32,
}

impl UserProfile {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            current_streak: 0,
            longest_streak: 0,
            last_active_date: None,
            total_study_time: 0,
            level: 1,
            badges: Vec::new(),
            focus_duration: 25,
            break_duration: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StudySession {
    pub id: String,
    pub user_id: String,
    pub duration: u32,
    pub session_type: SessionType,
    pub subject: Option<String>,
    pub notes: Option<String>,
    pub completed: bool,
    pub date: String,
    pub created_at: DateTime<Utc>,
}

impl StudySession {
    pub fn validate(&self) -> Result<(), AppError> {
        validate_non_empty(&self.id, "session.id")?;
        validate_non_empty(&self.user_id, "session.user_id")?;
        parse_date(&self.date)?;
        if self.duration == 0 || self.duration > MAX_SESSION_MINUTES {
            return Err(AppError::Validation(format!(
                "session.duration must be between 1 and {MAX_SESSION_MINUTES} minutes"
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DailyGoal {
    pub id: String,
    pub user_id: String,
    pub date: String,
    pub target_sessions: u32,
    pub target_minutes: u32,
    pub completed_sessions: u32,
    pub completed_minutes: u32,
}

impl DailyGoal {
    pub fn validate(&self) -> Result<(), AppError> {
        validate_non_empty(&self.id, "goal.id")?;
        validate_non_empty(&self.user_id, "goal.user_id")?;
        parse_date(&self.date)?;
        if self.target_sessions == 0 {
            return Err(AppError::Validation(
                "goal.target_sessions must be at least 1".to_string(),
            ));
        }
        if self.target_minutes == 0 {
            return Err(AppError::Validation(
                "goal.target_minutes must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Subject {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub color: String,
    pub total_time: u32,
}

impl Subject {
    pub fn validate(&self) -> Result<(), AppError> {
        validate_non_empty(&self.id, "subject.id")?;
        validate_non_empty(&self.user_id, "subject.user_id")?;
        validate_non_empty(&self.name, "subject.name")?;
        validate_hex_color(&self.color, "subject.color")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LifeGoal {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub description: Option<String>,
    pub target_date: Option<String>,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
}

impl LifeGoal {
    pub fn validate(&self) -> Result<(), AppError> {
        validate_non_empty(&self.id, "life_goal.id")?;
        validate_non_empty(&self.user_id, "life_goal.user_id")?;
        validate_non_empty(&self.title, "life_goal.title")?;
        if let Some(target_date) = self.target_date.as_deref() {
            parse_date(target_date)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Timetable {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub day_start: String,
    pub day_end: String,
    pub break_default_minutes: u32,
    pub rotate_last_block: bool,
    pub weak_subject_ids: Vec<String>,
}

impl Timetable {
    pub fn validate(&self) -> Result<(), AppError> {
        validate_non_empty(&self.id, "timetable.id")?;
        validate_non_empty(&self.user_id, "timetable.user_id")?;
        let start = parse_time(&self.day_start)?;
        let end = parse_time(&self.day_end)?;
        if end <= start {
            return Err(AppError::Validation(
                "timetable.day_end must be after timetable.day_start".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimetableBlock {
    pub id: String,
    pub timetable_id: String,
    pub kind: BlockKind,
    pub subject_id: Option<String>,
    pub label: Option<String>,
    pub color: Option<String>,
    pub start: String,
    pub end: String,
    pub day_scope: DayScope,
    pub locked: bool,
}

impl TimetableBlock {
    pub fn validate(&self) -> Result<(), AppError> {
        validate_non_empty(&self.id, "block.id")?;
        validate_non_empty(&self.timetable_id, "block.timetable_id")?;
        let start = parse_time(&self.start)?;
        let end = parse_time(&self.end)?;
        if end <= start {
            return Err(AppError::Validation(
                "block.end must be after block.start".to_string(),
            ));
        }
        if let Some(color) = self.color.as_deref() {
            validate_hex_color(color, "block.color")?;
        }
        Ok(())
    }

    pub fn start_minutes(&self) -> Result<u32, AppError> {
        parse_time(&self.start)
    }

    pub fn end_minutes(&self) -> Result<u32, AppError> {
        parse_time(&self.end)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FixedEvent {
    pub id: String,
    pub user_id: String,
    pub label: String,
    pub start: String,
    pub end: String,
    pub color: String,
    pub day_scope: DayScope,
}

impl FixedEvent {
    pub fn validate(&self) -> Result<(), AppError> {
        validate_non_empty(&self.id, "event.id")?;
        validate_non_empty(&self.user_id, "event.user_id")?;
        validate_non_empty(&self.label, "event.label")?;
        let start = parse_time(&self.start)?;
        let end = parse_time(&self.end)?;
        if end <= start {
            return Err(AppError::Validation(
                "event.end must be after event.start".to_string(),
            ));
        }
        validate_hex_color(&self.color, "event.color")
    }
}

pub fn validate_non_empty(value: &str, field_name: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{field_name} must not be empty")));
    }
    Ok(())
}

pub fn validate_hex_color(value: &str, field_name: &str) -> Result<(), AppError> {
    let valid = value
        .strip_prefix('#')
        .is_some_and(|rest| rest.len() == 6 && rest.chars().all(|c| c.is_ascii_hexdigit()));
    if !valid {
        return Err(AppError::Validation(format!(
            "{field_name} must be a #rrggbb color, got '{value}'"
        )));
    }
    Ok(())
}

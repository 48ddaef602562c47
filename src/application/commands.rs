use crate::application::bootstrap::bootstrap_workspace;
use crate::application::timer::{TimerState, TimerStateResponse};
use crate::application::{require_user, sessions, stats, timetable};
use crate::domain::clock::today_in;
use crate::domain::models::{
    BlockKind, DailyGoal, DayOfWeek, DayScope, FixedEvent, LifeGoal, SessionType, StudySession,
    Subject, Timetable, TimetableBlock, UserProfile,
};
use crate::infrastructure::assistant_client::{
    AssistantClient, ChatMessage, ChatReply, ChatRequest, ReqwestAssistantClient,
};
use crate::infrastructure::config::{read_assistant_settings, read_timezone};
use crate::infrastructure::error::AppError;
use crate::infrastructure::secret_store::{KeyringSecretStore, SecretStore};
use crate::infrastructure::store::SqliteStore;
use chrono::Utc;
use chrono_tz::Tz;
use serde::Serialize;
use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

const API_KEY_ENV_VARS: [&str; 2] = ["STUDYTRACK_OPENROUTER_API_KEY", "OPENROUTER_API_KEY"];

pub struct AppState {
    config_dir: PathBuf,
    database_path: PathBuf,
    logs_dir: PathBuf,
    store: SqliteStore,
    secret_store: Arc<dyn SecretStore>,
    assistant_client: Arc<dyn AssistantClient>,
    runtime: Mutex<RuntimeState>,
    log_guard: Mutex<()>,
}

#[derive(Debug, Default)]
struct RuntimeState {
    timers: HashMap<String, TimerState>,
}

impl AppState {
    pub fn new(workspace_root: PathBuf) -> Result<Self, AppError> {
        let bootstrap = bootstrap_workspace(&workspace_root)?;
        let config_dir = workspace_root.join("config");
        let logs_dir = workspace_root.join("logs");
        let store = SqliteStore::new(&bootstrap.database_path);

        Ok(Self {
            config_dir,
            database_path: bootstrap.database_path,
            logs_dir,
            store,
            secret_store: Arc::new(KeyringSecretStore::default()),
            assistant_client: Arc::new(ReqwestAssistantClient::new()),
            runtime: Mutex::new(RuntimeState::default()),
            log_guard: Mutex::new(()),
        })
    }

    pub fn with_secret_store(mut self, secret_store: Arc<dyn SecretStore>) -> Self {
        self.secret_store = secret_store;
        self
    }

    pub fn with_assistant_client(mut self, assistant_client: Arc<dyn AssistantClient>) -> Self {
        self.assistant_client = assistant_client;
        self
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn database_path(&self) -> &Path {
        &self.database_path
    }

    pub fn store(&self) -> &SqliteStore {
        &self.store
    }

    fn timezone(&self) -> Tz {
        read_timezone(&self.config_dir)
    }

    pub fn command_error(&self, command: &str, error: &AppError) -> String {
        self.log_error(command, &error.to_string());
        error.to_string()
    }

    pub fn log_info(&self, command: &str, message: &str) {
        self.append_log("info", command, message);
    }

    pub fn log_error(&self, command: &str, message: &str) {
        self.append_log("error", command, message);
    }

    fn append_log(&self, level: &str, command: &str, message: &str) {
        let Ok(_guard) = self.log_guard.lock() else {
            return;
        };
        let path = self.logs_dir.join("commands.log");
        let payload = serde_json::json!({
            "timestamp": Utc::now().to_rfc3339(),
            "level": level,
            "command": command,
            "message": message,
        });

        if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) {
            let _ = writeln!(file, "{}", payload);
        }
    }

    fn lock_runtime(&self) -> Result<MutexGuard<'_, RuntimeState>, AppError> {
        self.runtime
            .lock()
            .map_err(|error| AppError::InvalidConfig(format!("runtime lock poisoned: {error}")))
    }
}

// ---- timetable ----

pub fn ensure_default_timetable_impl(state: &AppState, user_id: String) -> Result<String, AppError> {
    let timetable_id = timetable::ensure_default_timetable(state.store(), &user_id)?;
    state.log_info(
        "ensure_default_timetable",
        &format!("timetable_id={timetable_id}"),
    );
    Ok(timetable_id)
}

pub fn get_user_timetable_impl(
    state: &AppState,
    user_id: String,
) -> Result<Option<Timetable>, AppError> {
    timetable::get_user_timetable(state.store(), &user_id)
}

#[allow(clippy::too_many_arguments)]
pub fn upsert_timetable_impl(
    state: &AppState,
    user_id: String,
    timetable_id: Option<String>,
    title: Option<String>,
    day_start: Option<String>,
    day_end: Option<String>,
    break_default_minutes: Option<u32>,
    rotate_last_block: Option<bool>,
    weak_subject_ids: Option<Vec<String>>,
) -> Result<String, AppError> {
    let timetable_id = timetable::upsert_timetable(
        state.store(),
        &user_id,
        timetable::UpsertTimetableArgs {
            timetable_id,
            title,
            day_start,
            day_end,
            break_default_minutes,
            rotate_last_block,
            weak_subject_ids,
        },
    )?;
    state.log_info("upsert_timetable", &format!("timetable_id={timetable_id}"));
    Ok(timetable_id)
}

pub fn list_blocks_impl(
    state: &AppState,
    user_id: String,
    timetable_id: String,
) -> Result<Vec<TimetableBlock>, AppError> {
    timetable::list_blocks(state.store(), &user_id, &timetable_id)
}

#[allow(clippy::too_many_arguments)]
pub fn create_block_impl(
    state: &AppState,
    user_id: String,
    timetable_id: String,
    kind: String,
    subject_id: Option<String>,
    label: Option<String>,
    color: Option<String>,
    start: String,
    end: String,
    day_of_week: Option<String>,
) -> Result<String, AppError> {
    let args = timetable::CreateBlockArgs {
        timetable_id,
        kind: BlockKind::parse(&kind)?,
        subject_id,
        label,
        color,
        start,
        end,
        day_scope: parse_day_scope(day_of_week)?,
    };
    let block_id = timetable::create_block(state.store(), &user_id, args)?;
    state.log_info("create_block", &format!("block_id={block_id}"));
    Ok(block_id)
}

#[derive(Debug, Clone, Serialize)]
pub struct BlockWithSubjectResponse {
    pub subject_id: String,
    pub block_id: String,
}

#[allow(clippy::too_many_arguments)]
pub fn create_block_with_subject_impl(
    state: &AppState,
    user_id: String,
    timetable_id: String,
    subject_name: String,
    subject_color: String,
    label: Option<String>,
    start: String,
    end: String,
    day_of_week: Option<String>,
) -> Result<BlockWithSubjectResponse, AppError> {
    let args = timetable::CreateBlockArgs {
        timetable_id,
        kind: BlockKind::Study,
        subject_id: None,
        label,
        color: None,
        start,
        end,
        day_scope: parse_day_scope(day_of_week)?,
    };
    let (subject_id, block_id) = timetable::create_block_with_new_subject(
        state.store(),
        &user_id,
        subject_name,
        subject_color,
        args,
    )?;
    state.log_info(
        "create_block_with_subject",
        &format!("subject_id={subject_id} block_id={block_id}"),
    );
    Ok(BlockWithSubjectResponse {
        subject_id,
        block_id,
    })
}

#[allow(clippy::too_many_arguments)]
pub fn update_block_impl(
    state: &AppState,
    user_id: String,
    block_id: String,
    subject_id: Option<String>,
    label: Option<String>,
    color: Option<String>,
    start: Option<String>,
    end: Option<String>,
    day_of_week: Option<String>,
    locked: Option<bool>,
) -> Result<(), AppError> {
    let day_scope = day_of_week
        .map(|raw| DayOfWeek::parse(&raw).map(DayScope::On))
        .transpose()?;
    timetable::update_block(
        state.store(),
        &user_id,
        &block_id,
        timetable::UpdateBlockArgs {
            subject_id,
            label,
            color,
            start,
            end,
            day_scope,
            locked,
        },
    )?;
    state.log_info("update_block", &format!("block_id={block_id}"));
    Ok(())
}

pub fn delete_block_impl(state: &AppState, user_id: String, block_id: String) -> Result<(), AppError> {
    timetable::delete_block(state.store(), &user_id, &block_id)?;
    state.log_info("delete_block", &format!("block_id={block_id}"));
    Ok(())
}

pub fn list_fixed_events_impl(
    state: &AppState,
    user_id: String,
) -> Result<Vec<FixedEvent>, AppError> {
    timetable::list_fixed_events(state.store(), &user_id)
}

#[allow(clippy::too_many_arguments)]
pub fn upsert_fixed_event_impl(
    state: &AppState,
    user_id: String,
    event_id: Option<String>,
    label: String,
    start: String,
    end: String,
    color: Option<String>,
    day_of_week: Option<String>,
) -> Result<String, AppError> {
    let event_id = timetable::upsert_fixed_event(
        state.store(),
        &user_id,
        timetable::UpsertFixedEventArgs {
            event_id,
            label,
            start,
            end,
            color,
            day_scope: parse_day_scope(day_of_week)?,
        },
    )?;
    state.log_info("upsert_fixed_event", &format!("event_id={event_id}"));
    Ok(event_id)
}

pub fn delete_fixed_event_impl(
    state: &AppState,
    user_id: String,
    event_id: String,
) -> Result<(), AppError> {
    timetable::delete_fixed_event(state.store(), &user_id, &event_id)?;
    state.log_info("delete_fixed_event", &format!("event_id={event_id}"));
    Ok(())
}

pub fn preview_for_today_impl(
    state: &AppState,
    user_id: String,
    timetable_id: String,
) -> Result<Vec<timetable::PreviewItem>, AppError> {
    let today = today_in(state.timezone());
    timetable::preview_for_date(state.store(), &user_id, &timetable_id, today)
}

// ---- sessions & goals ----

pub fn create_session_impl(
    state: &AppState,
    user_id: String,
    duration: u32,
    session_type: String,
    subject: Option<String>,
    notes: Option<String>,
    completed: bool,
) -> Result<String, AppError> {
    let session_id = sessions::create_session(
        state.store(),
        state.timezone(),
        &user_id,
        sessions::CreateSessionArgs {
            duration,
            session_type: SessionType::parse(&session_type)?,
            subject,
            notes,
            completed,
        },
    )?;
    state.log_info("create_session", &format!("session_id={session_id}"));
    Ok(session_id)
}

#[allow(clippy::too_many_arguments)]
pub fn create_manual_session_impl(
    state: &AppState,
    user_id: String,
    duration: u32,
    date: String,
    session_type: String,
    subject: Option<String>,
    notes: Option<String>,
    completed: bool,
) -> Result<String, AppError> {
    let session_id = sessions::create_manual_session(
        state.store(),
        state.timezone(),
        &user_id,
        &date,
        sessions::CreateSessionArgs {
            duration,
            session_type: SessionType::parse(&session_type)?,
            subject,
            notes,
            completed,
        },
    )?;
    state.log_info("create_manual_session", &format!("session_id={session_id}"));
    Ok(session_id)
}

pub fn list_today_sessions_impl(
    state: &AppState,
    user_id: String,
) -> Result<Vec<StudySession>, AppError> {
    sessions::list_today_sessions(state.store(), state.timezone(), &user_id)
}

pub fn list_weekly_sessions_impl(
    state: &AppState,
    user_id: String,
) -> Result<Vec<StudySession>, AppError> {
    sessions::list_weekly_sessions(state.store(), state.timezone(), &user_id)
}

pub fn upsert_daily_goal_impl(
    state: &AppState,
    user_id: String,
    target_sessions: u32,
    target_minutes: u32,
) -> Result<String, AppError> {
    let goal_id = sessions::upsert_daily_goal(
        state.store(),
        state.timezone(),
        &user_id,
        target_sessions,
        target_minutes,
    )?;
    state.log_info("upsert_daily_goal", &format!("goal_id={goal_id}"));
    Ok(goal_id)
}

pub fn get_today_goal_impl(
    state: &AppState,
    user_id: String,
) -> Result<Option<DailyGoal>, AppError> {
    sessions::get_today_goal(state.store(), state.timezone(), &user_id)
}

pub fn create_subject_impl(
    state: &AppState,
    user_id: String,
    name: String,
    color: String,
) -> Result<String, AppError> {
    let subject_id = sessions::create_subject(state.store(), &user_id, name, color)?;
    state.log_info("create_subject", &format!("subject_id={subject_id}"));
    Ok(subject_id)
}

pub fn list_subjects_impl(state: &AppState, user_id: String) -> Result<Vec<Subject>, AppError> {
    sessions::list_subjects(state.store(), &user_id)
}

pub fn create_life_goal_impl(
    state: &AppState,
    user_id: String,
    title: String,
    description: Option<String>,
    target_date: Option<String>,
) -> Result<String, AppError> {
    let goal_id = sessions::create_life_goal(state.store(), &user_id, title, description, target_date)?;
    state.log_info("create_life_goal", &format!("goal_id={goal_id}"));
    Ok(goal_id)
}

pub fn update_life_goal_impl(
    state: &AppState,
    user_id: String,
    goal_id: String,
    title: Option<String>,
    description: Option<String>,
    target_date: Option<String>,
) -> Result<(), AppError> {
    sessions::update_life_goal(
        state.store(),
        &user_id,
        &goal_id,
        sessions::UpdateLifeGoalArgs {
            title,
            description,
            target_date,
        },
    )?;
    state.log_info("update_life_goal", &format!("goal_id={goal_id}"));
    Ok(())
}

pub fn set_life_goal_completed_impl(
    state: &AppState,
    user_id: String,
    goal_id: String,
    completed: bool,
) -> Result<(), AppError> {
    sessions::set_life_goal_completed(state.store(), &user_id, &goal_id, completed)?;
    state.log_info(
        "set_life_goal_completed",
        &format!("goal_id={goal_id} completed={completed}"),
    );
    Ok(())
}

pub fn list_life_goals_impl(state: &AppState, user_id: String) -> Result<Vec<LifeGoal>, AppError> {
    sessions::list_life_goals(state.store(), &user_id)
}

pub fn get_profile_impl(state: &AppState, user_id: String) -> Result<UserProfile, AppError> {
    sessions::get_profile(state.store(), &user_id)
}

pub fn update_user_settings_impl(
    state: &AppState,
    user_id: String,
    focus_duration: Option<u32>,
    break_duration: Option<u32>,
) -> Result<UserProfile, AppError> {
    let profile =
        sessions::update_user_settings(state.store(), &user_id, focus_duration, break_duration)?;
    state.log_info("update_user_settings", &format!("user_id={}", profile.user_id));
    Ok(profile)
}

// ---- stats ----

pub fn daily_progress_impl(
    state: &AppState,
    user_id: String,
) -> Result<stats::DailyProgress, AppError> {
    stats::daily_progress(state.store(), state.timezone(), &user_id)
}

pub fn today_ratio_impl(
    state: &AppState,
    user_id: String,
) -> Result<stats::StudyBreakRatio, AppError> {
    stats::today_ratio(state.store(), state.timezone(), &user_id)
}

pub fn weekly_insights_impl(
    state: &AppState,
    user_id: String,
) -> Result<stats::WeeklyInsights, AppError> {
    stats::weekly_insights(state.store(), state.timezone(), &user_id)
}

// ---- timer ----

fn timer_durations(state: &AppState, user_id: &str) -> Result<(u32, u32), AppError> {
    let profile = sessions::get_profile(state.store(), user_id)?;
    Ok((profile.focus_duration, profile.break_duration))
}

pub fn get_timer_state_impl(
    state: &AppState,
    user_id: String,
) -> Result<TimerStateResponse, AppError> {
    let user_id = require_user(&user_id)?.to_string();
    let (focus_minutes, _) = timer_durations(state, &user_id)?;
    let mut runtime = state.lock_runtime()?;
    let timer = runtime
        .timers
        .entry(user_id)
        .or_insert_with(|| TimerState::armed(focus_minutes));
    Ok(timer.to_response())
}

pub fn start_timer_impl(state: &AppState, user_id: String) -> Result<TimerStateResponse, AppError> {
    let user_id = require_user(&user_id)?.to_string();
    let (focus_minutes, _) = timer_durations(state, &user_id)?;
    let mut runtime = state.lock_runtime()?;
    let timer = runtime
        .timers
        .entry(user_id)
        .or_insert_with(|| TimerState::armed(focus_minutes));
    timer.start(Utc::now());
    state.log_info("start_timer", &format!("mode={}", timer.mode.as_str()));
    Ok(timer.to_response())
}

pub fn pause_timer_impl(state: &AppState, user_id: String) -> Result<TimerStateResponse, AppError> {
    let user_id = require_user(&user_id)?.to_string();
    let (focus_minutes, _) = timer_durations(state, &user_id)?;
    let mut runtime = state.lock_runtime()?;
    let timer = runtime
        .timers
        .entry(user_id)
        .or_insert_with(|| TimerState::armed(focus_minutes));
    timer.pause();
    Ok(timer.to_response())
}

pub fn reset_timer_impl(state: &AppState, user_id: String) -> Result<TimerStateResponse, AppError> {
    let user_id = require_user(&user_id)?.to_string();
    let (focus_minutes, break_minutes) = timer_durations(state, &user_id)?;
    let mut runtime = state.lock_runtime()?;
    let timer = runtime
        .timers
        .entry(user_id)
        .or_insert_with(|| TimerState::armed(focus_minutes));
    timer.reset(focus_minutes, break_minutes);
    Ok(timer.to_response())
}

/// Countdown reached zero: log the finished interval as a completed session,
/// then flip mode and rearm for the new mode's configured duration.
pub fn complete_timer_impl(
    state: &AppState,
    user_id: String,
    subject: Option<String>,
) -> Result<TimerStateResponse, AppError> {
    let user_id = require_user(&user_id)?.to_string();
    let (focus_minutes, break_minutes) = timer_durations(state, &user_id)?;

    let (finished_mode, finished_minutes, response) = {
        let mut runtime = state.lock_runtime()?;
        let timer = runtime
            .timers
            .entry(user_id.clone())
            .or_insert_with(|| TimerState::armed(focus_minutes));
        let (finished_mode, finished_minutes) = timer.complete(focus_minutes, break_minutes);
        (finished_mode, finished_minutes, timer.to_response())
    };

    let session_id = sessions::create_session(
        state.store(),
        state.timezone(),
        &user_id,
        sessions::CreateSessionArgs {
            duration: finished_minutes,
            session_type: finished_mode,
            subject,
            notes: None,
            completed: true,
        },
    )?;
    state.log_info(
        "complete_timer",
        &format!("session_id={session_id} mode={}", finished_mode.as_str()),
    );
    Ok(response)
}

// ---- assistant ----

#[derive(Debug, Clone, Serialize)]
pub struct ChatResponse {
    pub content: String,
}

fn resolve_api_key(state: &AppState) -> Result<String, AppError> {
    if let Some(api_key) = state.secret_store.load_api_key()? {
        return Ok(api_key);
    }
    for key in API_KEY_ENV_VARS {
        if let Ok(value) = std::env::var(key) {
            let value = value.trim().to_string();
            if !value.is_empty() {
                return Ok(value);
            }
        }
    }
    Err(AppError::Assistant(format!(
        "Assistant API key is not configured. Set one of: {}.",
        API_KEY_ENV_VARS.join(", ")
    )))
}

pub async fn chat_impl(
    state: &AppState,
    user_id: String,
    messages: Vec<ChatMessage>,
    model: Option<String>,
    max_tokens: Option<u32>,
) -> Result<ChatResponse, AppError> {
    require_user(&user_id)?;
    let api_key = resolve_api_key(state)?;
    let settings = read_assistant_settings(state.config_dir())?;

    let request = ChatRequest {
        messages,
        model: model
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or(settings.model),
        max_tokens: max_tokens.unwrap_or(settings.max_tokens),
        referer: settings.referer,
        title: settings.title,
    };

    let ChatReply { content } = state.assistant_client.chat(&api_key, request).await?;
    state.log_info("chat", &format!("reply_chars={}", content.chars().count()));
    Ok(ChatResponse { content })
}

pub fn set_assistant_api_key_impl(state: &AppState, api_key: String) -> Result<(), AppError> {
    state.secret_store.save_api_key(&api_key)?;
    state.log_info("set_assistant_api_key", "stored assistant api key");
    Ok(())
}

pub fn clear_assistant_api_key_impl(state: &AppState) -> Result<(), AppError> {
    state.secret_store.delete_api_key()?;
    state.log_info("clear_assistant_api_key", "removed assistant api key");
    Ok(())
}

fn parse_day_scope(day_of_week: Option<String>) -> Result<DayScope, AppError> {
    match day_of_week {
        None => Ok(DayScope::Any),
        Some(raw) => DayOfWeek::parse(&raw).map(DayScope::On),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::assistant_client::ChatRole;
    use crate::infrastructure::secret_store::InMemorySecretStore;
    use async_trait::async_trait;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static NEXT_TEMP_WORKSPACE: AtomicUsize = AtomicUsize::new(0);

    struct TempWorkspace {
        path: PathBuf,
    }

    impl TempWorkspace {
        fn new() -> Self {
            let sequence = NEXT_TEMP_WORKSPACE.fetch_add(1, Ordering::Relaxed);
            let path = std::env::temp_dir().join(format!(
                "studytrack-command-tests-{}-{}",
                std::process::id(),
                sequence
            ));
            fs::create_dir_all(&path).expect("create temp workspace");
            Self { path }
        }

        fn app_state(&self) -> AppState {
            AppState::new(self.path.clone())
                .expect("initialize app state")
                .with_secret_store(Arc::new(InMemorySecretStore::default()))
        }
    }

    impl Drop for TempWorkspace {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.path);
        }
    }

    #[derive(Debug, Default)]
    struct FakeAssistantClient {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl AssistantClient for FakeAssistantClient {
        async fn chat(&self, _api_key: &str, request: ChatRequest) -> Result<ChatReply, AppError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(ChatReply {
                content: format!("echo: {}", request.messages.len()),
            })
        }
    }

    #[test]
    fn seeding_and_preview_flow() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();

        let timetable_id =
            ensure_default_timetable_impl(&state, "user-1".to_string()).expect("seed");
        let preview = preview_for_today_impl(&state, "user-1".to_string(), timetable_id.clone())
            .expect("preview");
        assert_eq!(preview.len(), 5);

        let blocks = list_blocks_impl(&state, "user-1".to_string(), timetable_id).expect("blocks");
        assert_eq!(blocks.len(), 4);
    }

    #[test]
    fn blank_user_is_rejected_before_any_work() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        let result = ensure_default_timetable_impl(&state, "   ".to_string());
        assert!(matches!(result, Err(AppError::Authentication)));
    }

    #[test]
    fn timer_completion_records_a_session_and_flips_mode() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();

        let started = start_timer_impl(&state, "user-1".to_string()).expect("start");
        assert_eq!(started.mode, "focus");
        assert!(started.running);
        assert_eq!(started.remaining_seconds, 25 * 60);

        let flipped =
            complete_timer_impl(&state, "user-1".to_string(), None).expect("complete");
        assert_eq!(flipped.mode, "break");
        assert_eq!(flipped.remaining_seconds, 5 * 60);

        let sessions = list_today_sessions_impl(&state, "user-1".to_string()).expect("sessions");
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].duration, 25);
        assert!(sessions[0].completed);

        let profile = get_profile_impl(&state, "user-1".to_string()).expect("profile");
        assert_eq!(profile.total_study_time, 25);
    }

    #[test]
    fn timer_uses_configured_durations() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();

        update_user_settings_impl(&state, "user-1".to_string(), Some(50), Some(10))
            .expect("settings");
        let timer = get_timer_state_impl(&state, "user-1".to_string()).expect("state");
        assert_eq!(timer.remaining_seconds, 50 * 60);

        let flipped = complete_timer_impl(&state, "user-1".to_string(), None).expect("complete");
        assert_eq!(flipped.remaining_seconds, 10 * 60);
    }

    #[test]
    fn goal_progress_scenario_matches_session_flow() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();

        upsert_daily_goal_impl(&state, "user-1".to_string(), 4, 120).expect("goal");
        create_session_impl(
            &state,
            "user-1".to_string(),
            25,
            "focus".to_string(),
            None,
            None,
            true,
        )
        .expect("session");

        let progress = daily_progress_impl(&state, "user-1".to_string()).expect("progress");
        assert_eq!(progress.completed_sessions, 1);
        assert_eq!(progress.completed_minutes, 25);
        assert!((progress.session_ratio - 0.25).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn chat_requires_a_configured_api_key() {
        let workspace = TempWorkspace::new();
        let state = workspace
            .app_state()
            .with_assistant_client(Arc::new(FakeAssistantClient::default()));

        for key in API_KEY_ENV_VARS {
            // SAFETY: no other test touches these variables.
            unsafe { std::env::remove_var(key) };
        }

        let messages = vec![ChatMessage {
            role: ChatRole::User,
            content: "How do I plan my evening?".to_string(),
        }];
        let missing = chat_impl(&state, "user-1".to_string(), messages.clone(), None, None).await;
        assert!(matches!(missing, Err(AppError::Assistant(_))));

        set_assistant_api_key_impl(&state, "sk-or-test".to_string()).expect("store key");
        let reply = chat_impl(&state, "user-1".to_string(), messages, None, None)
            .await
            .expect("chat");
        assert_eq!(reply.content, "echo: 1");
    }

    #[test]
    fn invalid_day_of_week_is_rejected_at_the_boundary() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        let timetable_id =
            ensure_default_timetable_impl(&state, "user-1".to_string()).expect("seed");

        let result = create_block_impl(
            &state,
            "user-1".to_string(),
            timetable_id,
            "study".to_string(),
            None,
            None,
            None,
            "08:00".to_string(),
            "09:00".to_string(),
            Some("monday".to_string()),
        );
        assert!(matches!(result, Err(AppError::Validation(_))));
    }
}

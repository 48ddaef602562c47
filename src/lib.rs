mod application;
mod domain;
mod infrastructure;

use application::bootstrap::bootstrap_workspace;
use application::commands::{
    chat_impl, clear_assistant_api_key_impl, complete_timer_impl, create_block_impl,
    create_block_with_subject_impl, create_life_goal_impl, create_manual_session_impl,
    create_session_impl, create_subject_impl, daily_progress_impl, delete_block_impl,
    delete_fixed_event_impl, ensure_default_timetable_impl, get_profile_impl,
    get_timer_state_impl, get_today_goal_impl, get_user_timetable_impl, list_blocks_impl,
    list_fixed_events_impl, list_life_goals_impl, list_subjects_impl, list_today_sessions_impl,
    list_weekly_sessions_impl, pause_timer_impl, preview_for_today_impl, reset_timer_impl,
    set_assistant_api_key_impl, set_life_goal_completed_impl, start_timer_impl, today_ratio_impl,
    update_block_impl, update_life_goal_impl, update_user_settings_impl, upsert_daily_goal_impl,
    upsert_fixed_event_impl, upsert_timetable_impl, weekly_insights_impl, AppState,
    BlockWithSubjectResponse, ChatResponse,
};
use application::stats::{DailyProgress, StudyBreakRatio, WeeklyInsights};
use application::timer::TimerStateResponse;
use application::timetable::PreviewItem;
use domain::models::{
    DailyGoal, FixedEvent, LifeGoal, StudySession, Subject, Timetable, TimetableBlock, UserProfile,
};
use infrastructure::assistant_client::ChatMessage;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Debug, Serialize)]
struct BootstrapResponse {
    workspace_root: String,
    database_path: String,
}

#[tauri::command]
fn bootstrap(root: Option<String>) -> Result<BootstrapResponse, String> {
    let workspace_root = match root {
        Some(path) => PathBuf::from(path),
        None => std::env::current_dir().map_err(|error| error.to_string())?,
    };

    let result = bootstrap_workspace(&workspace_root).map_err(|error| error.to_string())?;
    Ok(BootstrapResponse {
        workspace_root: result.workspace_root.display().to_string(),
        database_path: result.database_path.display().to_string(),
    })
}

#[tauri::command]
fn ping() -> &'static str {
    "pong"
}

#[tauri::command]
fn ensure_default_timetable(
    state: tauri::State<'_, AppState>,
    user_id: String,
) -> Result<String, String> {
    ensure_default_timetable_impl(state.inner(), user_id)
        .map_err(|error| state.command_error("ensure_default_timetable", &error))
}

#[tauri::command]
fn get_user_timetable(
    state: tauri::State<'_, AppState>,
    user_id: String,
) -> Result<Option<Timetable>, String> {
    get_user_timetable_impl(state.inner(), user_id)
        .map_err(|error| state.command_error("get_user_timetable", &error))
}

#[tauri::command]
#[allow(clippy::too_many_arguments)]
fn upsert_timetable(
    state: tauri::State<'_, AppState>,
    user_id: String,
    timetable_id: Option<String>,
    title: Option<String>,
    day_start: Option<String>,
    day_end: Option<String>,
    break_default_minutes: Option<u32>,
    rotate_last_block: Option<bool>,
    weak_subject_ids: Option<Vec<String>>,
) -> Result<String, String> {
    upsert_timetable_impl(
        state.inner(),
        user_id,
        timetable_id,
        title,
        day_start,
        day_end,
        break_default_minutes,
        rotate_last_block,
        weak_subject_ids,
    )
    .map_err(|error| state.command_error("upsert_timetable", &error))
}

#[tauri::command]
fn list_blocks(
    state: tauri::State<'_, AppState>,
    user_id: String,
    timetable_id: String,
) -> Result<Vec<TimetableBlock>, String> {
    list_blocks_impl(state.inner(), user_id, timetable_id)
        .map_err(|error| state.command_error("list_blocks", &error))
}

#[tauri::command]
#[allow(clippy::too_many_arguments)]
fn create_block(
    state: tauri::State<'_, AppState>,
    user_id: String,
    timetable_id: String,
    kind: String,
    subject_id: Option<String>,
    label: Option<String>,
    color: Option<String>,
    start: String,
    end: String,
    day_of_week: Option<String>,
) -> Result<String, String> {
    create_block_impl(
        state.inner(),
        user_id,
        timetable_id,
        kind,
        subject_id,
        label,
        color,
        start,
        end,
        day_of_week,
    )
    .map_err(|error| state.command_error("create_block", &error))
}

#[tauri::command]
#[allow(clippy::too_many_arguments)]
fn create_block_with_subject(
    state: tauri::State<'_, AppState>,
    user_id: String,
    timetable_id: String,
    subject_name: String,
    subject_color: String,
    label: Option<String>,
    start: String,
    end: String,
    day_of_week: Option<String>,
) -> Result<BlockWithSubjectResponse, String> {
    create_block_with_subject_impl(
        state.inner(),
        user_id,
        timetable_id,
        subject_name,
        subject_color,
        label,
        start,
        end,
        day_of_week,
    )
    .map_err(|error| state.command_error("create_block_with_subject", &error))
}

#[tauri::command]
#[allow(clippy::too_many_arguments)]
fn update_block(
    state: tauri::State<'_, AppState>,
    user_id: String,
    block_id: String,
    subject_id: Option<String>,
    label: Option<String>,
    color: Option<String>,
    start: Option<String>,
    end: Option<String>,
    day_of_week: Option<String>,
    locked: Option<bool>,
) -> Result<(), String> {
    update_block_impl(
        state.inner(),
        user_id,
        block_id,
        subject_id,
        label,
        color,
        start,
        end,
        day_of_week,
        locked,
    )
    .map_err(|error| state.command_error("update_block", &error))
}

#[tauri::command]
fn delete_block(
    state: tauri::State<'_, AppState>,
    user_id: String,
    block_id: String,
) -> Result<(), String> {
    delete_block_impl(state.inner(), user_id, block_id)
        .map_err(|error| state.command_error("delete_block", &error))
}

#[tauri::command]
fn list_fixed_events(
    state: tauri::State<'_, AppState>,
    user_id: String,
) -> Result<Vec<FixedEvent>, String> {
    list_fixed_events_impl(state.inner(), user_id)
        .map_err(|error| state.command_error("list_fixed_events", &error))
}

#[tauri::command]
#[allow(clippy::too_many_arguments)]
fn upsert_fixed_event(
    state: tauri::State<'_, AppState>,
    user_id: String,
    event_id: Option<String>,
    label: String,
    start: String,
    end: String,
    color: Option<String>,
    day_of_week: Option<String>,
) -> Result<String, String> {
    upsert_fixed_event_impl(
        state.inner(),
        user_id,
        event_id,
        label,
        start,
        end,
        color,
        day_of_week,
    )
    .map_err(|error| state.command_error("upsert_fixed_event", &error))
}

#[tauri::command]
fn delete_fixed_event(
    state: tauri::State<'_, AppState>,
    user_id: String,
    event_id: String,
) -> Result<(), String> {
    delete_fixed_event_impl(state.inner(), user_id, event_id)
        .map_err(|error| state.command_error("delete_fixed_event", &error))
}

#[tauri::command]
fn preview_for_today(
    state: tauri::State<'_, AppState>,
    user_id: String,
    timetable_id: String,
) -> Result<Vec<PreviewItem>, String> {
    preview_for_today_impl(state.inner(), user_id, timetable_id)
        .map_err(|error| state.command_error("preview_for_today", &error))
}

#[tauri::command]
fn create_session(
    state: tauri::State<'_, AppState>,
    user_id: String,
    duration: u32,
    session_type: String,
    subject: Option<String>,
    notes: Option<String>,
    completed: bool,
) -> Result<String, String> {
    create_session_impl(
        state.inner(),
        user_id,
        duration,
        session_type,
        subject,
        notes,
        completed,
    )
    .map_err(|error| state.command_error("create_session", &error))
}

#[tauri::command]
#[allow(clippy::too_many_arguments)]
fn create_manual_session(
    state: tauri::State<'_, AppState>,
    user_id: String,
    duration: u32,
    date: String,
    session_type: String,
    subject: Option<String>,
    notes: Option<String>,
    completed: bool,
) -> Result<String, String> {
    create_manual_session_impl(
        state.inner(),
        user_id,
        duration,
        date,
        session_type,
        subject,
        notes,
        completed,
    )
    .map_err(|error| state.command_error("create_manual_session", &error))
}

#[tauri::command]
fn list_today_sessions(
    state: tauri::State<'_, AppState>,
    user_id: String,
) -> Result<Vec<StudySession>, String> {
    list_today_sessions_impl(state.inner(), user_id)
        .map_err(|error| state.command_error("list_today_sessions", &error))
}

#[tauri::command]
fn list_weekly_sessions(
    state: tauri::State<'_, AppState>,
    user_id: String,
) -> Result<Vec<StudySession>, String> {
    list_weekly_sessions_impl(state.inner(), user_id)
        .map_err(|error| state.command_error("list_weekly_sessions", &error))
}

#[tauri::command]
fn upsert_daily_goal(
    state: tauri::State<'_, AppState>,
    user_id: String,
    target_sessions: u32,
    target_minutes: u32,
) -> Result<String, String> {
    upsert_daily_goal_impl(state.inner(), user_id, target_sessions, target_minutes)
        .map_err(|error| state.command_error("upsert_daily_goal", &error))
}

#[tauri::command]
fn get_today_goal(
    state: tauri::State<'_, AppState>,
    user_id: String,
) -> Result<Option<DailyGoal>, String> {
    get_today_goal_impl(state.inner(), user_id)
        .map_err(|error| state.command_error("get_today_goal", &error))
}

#[tauri::command]
fn create_subject(
    state: tauri::State<'_, AppState>,
    user_id: String,
    name: String,
    color: String,
) -> Result<String, String> {
    create_subject_impl(state.inner(), user_id, name, color)
        .map_err(|error| state.command_error("create_subject", &error))
}

#[tauri::command]
fn list_subjects(
    state: tauri::State<'_, AppState>,
    user_id: String,
) -> Result<Vec<Subject>, String> {
    list_subjects_impl(state.inner(), user_id)
        .map_err(|error| state.command_error("list_subjects", &error))
}

#[tauri::command]
fn create_life_goal(
    state: tauri::State<'_, AppState>,
    user_id: String,
    title: String,
    description: Option<String>,
    target_date: Option<String>,
) -> Result<String, String> {
    create_life_goal_impl(state.inner(), user_id, title, description, target_date)
        .map_err(|error| state.command_error("create_life_goal", &error))
}

#[tauri::command]
fn update_life_goal(
    state: tauri::State<'_, AppState>,
    user_id: String,
    goal_id: String,
    title: Option<String>,
    description: Option<String>,
    target_date: Option<String>,
) -> Result<(), String> {
    update_life_goal_impl(state.inner(), user_id, goal_id, title, description, target_date)
        .map_err(|error| state.command_error("update_life_goal", &error))
}

#[tauri::command]
fn set_life_goal_completed(
    state: tauri::State<'_, AppState>,
    user_id: String,
    goal_id: String,
    completed: bool,
) -> Result<(), String> {
    set_life_goal_completed_impl(state.inner(), user_id, goal_id, completed)
        .map_err(|error| state.command_error("set_life_goal_completed", &error))
}

#[tauri::command]
fn list_life_goals(
    state: tauri::State<'_, AppState>,
    user_id: String,
) -> Result<Vec<LifeGoal>, String> {
    list_life_goals_impl(state.inner(), user_id)
        .map_err(|error| state.command_error("list_life_goals", &error))
}

#[tauri::command]
fn get_profile(
    state: tauri::State<'_, AppState>,
    user_id: String,
) -> Result<UserProfile, String> {
    get_profile_impl(state.inner(), user_id)
        .map_err(|error| state.command_error("get_profile", &error))
}

#[tauri::command]
fn update_user_settings(
    state: tauri::State<'_, AppState>,
    user_id: String,
    focus_duration: Option<u32>,
    break_duration: Option<u32>,
) -> Result<UserProfile, String> {
    update_user_settings_impl(state.inner(), user_id, focus_duration, break_duration)
        .map_err(|error| state.command_error("update_user_settings", &error))
}

#[tauri::command]
fn daily_progress(
    state: tauri::State<'_, AppState>,
    user_id: String,
) -> Result<DailyProgress, String> {
    daily_progress_impl(state.inner(), user_id)
        .map_err(|error| state.command_error("daily_progress", &error))
}

#[tauri::command]
fn today_ratio(
    state: tauri::State<'_, AppState>,
    user_id: String,
) -> Result<StudyBreakRatio, String> {
    today_ratio_impl(state.inner(), user_id)
        .map_err(|error| state.command_error("today_ratio", &error))
}

#[tauri::command]
fn weekly_insights(
    state: tauri::State<'_, AppState>,
    user_id: String,
) -> Result<WeeklyInsights, String> {
    weekly_insights_impl(state.inner(), user_id)
        .map_err(|error| state.command_error("weekly_insights", &error))
}

#[tauri::command]
fn get_timer_state(
    state: tauri::State<'_, AppState>,
    user_id: String,
) -> Result<TimerStateResponse, String> {
    get_timer_state_impl(state.inner(), user_id)
        .map_err(|error| state.command_error("get_timer_state", &error))
}

#[tauri::command]
fn start_timer(
    state: tauri::State<'_, AppState>,
    user_id: String,
) -> Result<TimerStateResponse, String> {
    start_timer_impl(state.inner(), user_id)
        .map_err(|error| state.command_error("start_timer", &error))
}

#[tauri::command]
fn pause_timer(
    state: tauri::State<'_, AppState>,
    user_id: String,
) -> Result<TimerStateResponse, String> {
    pause_timer_impl(state.inner(), user_id)
        .map_err(|error| state.command_error("pause_timer", &error))
}

#[tauri::command]
fn reset_timer(
    state: tauri::State<'_, AppState>,
    user_id: String,
) -> Result<TimerStateResponse, String> {
    reset_timer_impl(state.inner(), user_id)
        .map_err(|error| state.command_error("reset_timer", &error))
}

#[tauri::command]
fn complete_timer(
    state: tauri::State<'_, AppState>,
    user_id: String,
    subject: Option<String>,
) -> Result<TimerStateResponse, String> {
    complete_timer_impl(state.inner(), user_id, subject)
        .map_err(|error| state.command_error("complete_timer", &error))
}

#[tauri::command]
async fn chat(
    state: tauri::State<'_, AppState>,
    user_id: String,
    messages: Vec<ChatMessage>,
    model: Option<String>,
    max_tokens: Option<u32>,
) -> Result<ChatResponse, String> {
    chat_impl(state.inner(), user_id, messages, model, max_tokens)
        .await
        .map_err(|error| state.command_error("chat", &error))
}

#[tauri::command]
fn set_assistant_api_key(
    state: tauri::State<'_, AppState>,
    api_key: String,
) -> Result<(), String> {
    set_assistant_api_key_impl(state.inner(), api_key)
        .map_err(|error| state.command_error("set_assistant_api_key", &error))
}

#[tauri::command]
fn clear_assistant_api_key(state: tauri::State<'_, AppState>) -> Result<(), String> {
    clear_assistant_api_key_impl(state.inner())
        .map_err(|error| state.command_error("clear_assistant_api_key", &error))
}

pub fn run() {
    let workspace_root = std::env::current_dir().expect("failed to resolve current directory");
    let app_state = AppState::new(workspace_root).expect("failed to initialize app state");

    tauri::Builder::default()
        .manage(app_state)
        .invoke_handler(tauri::generate_handler![
            ping,
            bootstrap,
            ensure_default_timetable,
            get_user_timetable,
            upsert_timetable,
            list_blocks,
            create_block,
            create_block_with_subject,
            update_block,
            delete_block,
            list_fixed_events,
            upsert_fixed_event,
            delete_fixed_event,
            preview_for_today,
            create_session,
            create_manual_session,
            list_today_sessions,
            list_weekly_sessions,
            upsert_daily_goal,
            get_today_goal,
            create_subject,
            list_subjects,
            create_life_goal,
            update_life_goal,
            set_life_goal_completed,
            list_life_goals,
            get_profile,
            update_user_settings,
            daily_progress,
            today_ratio,
            weekly_insights,
            get_timer_state,
            start_timer,
            pause_timer,
            reset_timer,
            complete_timer,
            chat,
            set_assistant_api_key,
            clear_assistant_api_key
        ])
        .run(tauri::generate_context!())
        .expect("failed to run tauri app");
}

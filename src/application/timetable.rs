use crate::application::{next_id, require_user};
use crate::domain::clock::{format_time, overlaps, parse_time, rotation_index, snap_to_five};
use crate::domain::models::{
    BlockKind, DayScope, FixedEvent, Subject, Timetable, TimetableBlock,
};
use crate::infrastructure::error::AppError;
use crate::infrastructure::store::{self, SqliteStore};
use chrono::NaiveDate;
use rusqlite::Connection;
use serde::Serialize;

const DEFAULT_TITLE: &str = "My Study Schedule";
const DEFAULT_DAY_START: &str = "06:30";
const DEFAULT_DAY_END: &str = "24:00";
const DEFAULT_BREAK_MINUTES: u32 = 30;
const DEFAULT_BLOCK_COLOR: &str = "#6b7280";
const DEFAULT_EVENT_COLOR: &str = "#8b5cf6";

const SEED_SUBJECTS: [(&str, &str); 3] = [
    ("Mathematics", "#3b82f6"),
    ("Physics", "#10b981"),
    ("English", "#f59e0b"),
];
const SEED_STUDY_SLOTS: [(&str, &str); 3] = [("18:30", "20:00"), ("20:30", "22:00"), ("22:00", "23:30")];

#[derive(Debug, Clone)]
pub struct CreateBlockArgs {
    pub timetable_id: String,
    pub kind: BlockKind,
    pub subject_id: Option<String>,
    pub label: Option<String>,
    pub color: Option<String>,
    pub start: String,
    pub end: String,
    pub day_scope: DayScope,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateBlockArgs {
    pub subject_id: Option<String>,
    pub label: Option<String>,
    pub color: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
    pub day_scope: Option<DayScope>,
    pub locked: Option<bool>,
}

#[derive(Debug, Clone, Default)]
pub struct UpsertTimetableArgs {
    pub timetable_id: Option<String>,
    pub title: Option<String>,
    pub day_start: Option<String>,
    pub day_end: Option<String>,
    pub break_default_minutes: Option<u32>,
    pub rotate_last_block: Option<bool>,
    pub weak_subject_ids: Option<Vec<String>>,
}

#[derive(Debug, Clone)]
pub struct UpsertFixedEventArgs {
    pub event_id: Option<String>,
    pub label: String,
    pub start: String,
    pub end: String,
    pub color: Option<String>,
    pub day_scope: DayScope,
}

/// One row of the merged daily preview: a timetable block or a fixed event,
/// tagged so the overlay can tell them apart.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PreviewItem {
    Block(TimetableBlock),
    Event(FixedEvent),
}

impl PreviewItem {
    fn start_minutes(&self) -> Result<u32, AppError> {
        match self {
            PreviewItem::Block(block) => parse_time(&block.start),
            PreviewItem::Event(event) => parse_time(&event.start),
        }
    }
}

pub fn get_user_timetable(
    sqlite: &SqliteStore,
    user_id: &str,
) -> Result<Option<Timetable>, AppError> {
    let user_id = require_user(user_id)?;
    let conn = sqlite.connect()?;
    store::first_timetable_for_user(&conn, user_id)
}

pub fn upsert_timetable(
    sqlite: &SqliteStore,
    user_id: &str,
    args: UpsertTimetableArgs,
) -> Result<String, AppError> {
    let user_id = require_user(user_id)?;
    let mut conn = sqlite.connect()?;
    let tx = conn.transaction()?;

    let timetable_id = if let Some(timetable_id) = args.timetable_id {
        let mut timetable = owned_timetable(&tx, user_id, &timetable_id)?;
        if let Some(title) = args.title {
            timetable.title = title;
        }
        if let Some(day_start) = args.day_start {
            timetable.day_start = day_start;
        }
        if let Some(day_end) = args.day_end {
            timetable.day_end = day_end;
        }
        if let Some(break_default_minutes) = args.break_default_minutes {
            timetable.break_default_minutes = break_default_minutes;
        }
        if let Some(rotate_last_block) = args.rotate_last_block {
            timetable.rotate_last_block = rotate_last_block;
        }
        if let Some(weak_subject_ids) = args.weak_subject_ids {
            timetable.weak_subject_ids = weak_subject_ids;
        }
        timetable.validate()?;
        store::update_timetable(&tx, &timetable)?;
        timetable.id
    } else {
        let timetable = Timetable {
            id: next_id("tt"),
            user_id: user_id.to_string(),
            title: args.title.unwrap_or_else(|| DEFAULT_TITLE.to_string()),
            day_start: args.day_start.unwrap_or_else(|| DEFAULT_DAY_START.to_string()),
            day_end: args.day_end.unwrap_or_else(|| DEFAULT_DAY_END.to_string()),
            break_default_minutes: args.break_default_minutes.unwrap_or(DEFAULT_BREAK_MINUTES),
            rotate_last_block: args.rotate_last_block.unwrap_or(true),
            weak_subject_ids: args.weak_subject_ids.unwrap_or_default(),
        };
        timetable.validate()?;
        store::insert_timetable(&tx, &timetable)?;
        timetable.id
    };

    tx.commit()?;
    Ok(timetable_id)
}

/// One-time bootstrap: seed the default timetable, illustrative subjects,
/// sample blocks and a sample fixed event. Returns the existing timetable id
/// untouched when the user already has one.
pub fn ensure_default_timetable(sqlite: &SqliteStore, user_id: &str) -> Result<String, AppError> {
    let user_id = require_user(user_id)?;
    let mut conn = sqlite.connect()?;
    let tx = conn.transaction()?;

    if let Some(existing) = store::first_timetable_for_user(&tx, user_id)? {
        tx.commit()?;
        return Ok(existing.id);
    }

    let timetable = Timetable {
        id: next_id("tt"),
        user_id: user_id.to_string(),
        title: DEFAULT_TITLE.to_string(),
        day_start: DEFAULT_DAY_START.to_string(),
        day_end: DEFAULT_DAY_END.to_string(),
        break_default_minutes: DEFAULT_BREAK_MINUTES,
        rotate_last_block: true,
        weak_subject_ids: Vec::new(),
    };
    store::insert_timetable(&tx, &timetable)?;

    let mut subjects = store::subjects_for_user(&tx, user_id)?;
    if subjects.is_empty() {
        for (name, color) in SEED_SUBJECTS {
            let subject = Subject {
                id: next_id("sub"),
                user_id: user_id.to_string(),
                name: name.to_string(),
                color: color.to_string(),
                total_time: 0,
            };
            store::insert_subject(&tx, &subject)?;
            subjects.push(subject);
        }
    }

    for (subject, (start, end)) in subjects.iter().zip(SEED_STUDY_SLOTS) {
        let block = TimetableBlock {
            id: next_id("blk"),
            timetable_id: timetable.id.clone(),
            kind: BlockKind::Study,
            subject_id: Some(subject.id.clone()),
            label: Some(subject.name.clone()),
            color: Some(subject.color.clone()),
            start: start.to_string(),
            end: end.to_string(),
            day_scope: DayScope::Any,
            locked: false,
        };
        store::insert_block(&tx, &block)?;
    }

    let break_block = TimetableBlock {
        id: next_id("blk"),
        timetable_id: timetable.id.clone(),
        kind: BlockKind::Break,
        subject_id: None,
        label: Some("Break".to_string()),
        color: Some(DEFAULT_BLOCK_COLOR.to_string()),
        start: "20:00".to_string(),
        end: "20:30".to_string(),
        day_scope: DayScope::Any,
        locked: false,
    };
    store::insert_block(&tx, &break_block)?;

    if store::events_for_user(&tx, user_id)?.is_empty() {
        let event = FixedEvent {
            id: next_id("evt"),
            user_id: user_id.to_string(),
            label: "Isha Namaz".to_string(),
            start: "20:00".to_string(),
            end: "20:15".to_string(),
            color: DEFAULT_EVENT_COLOR.to_string(),
            day_scope: DayScope::Any,
        };
        store::insert_event(&tx, &event)?;
    }

    tx.commit()?;
    Ok(timetable.id)
}

pub fn list_blocks(
    sqlite: &SqliteStore,
    user_id: &str,
    timetable_id: &str,
) -> Result<Vec<TimetableBlock>, AppError> {
    let user_id = require_user(user_id)?;
    let conn = sqlite.connect()?;
    let timetable = owned_timetable(&conn, user_id, timetable_id)?;
    let blocks = store::blocks_in_timetable(&conn, &timetable.id)?;
    sort_by_start(blocks, |block| parse_time(&block.start))
}

pub fn create_block(
    sqlite: &SqliteStore,
    user_id: &str,
    args: CreateBlockArgs,
) -> Result<String, AppError> {
    let user_id = require_user(user_id)?;
    let mut conn = sqlite.connect()?;
    let tx = conn.transaction()?;
    let block_id = create_block_in_tx(&tx, user_id, args)?;
    tx.commit()?;
    Ok(block_id)
}

/// Inline subject creation from the timetable editor: the subject insert and
/// the block referencing it land in one transaction.
pub fn create_block_with_new_subject(
    sqlite: &SqliteStore,
    user_id: &str,
    subject_name: String,
    subject_color: String,
    mut args: CreateBlockArgs,
) -> Result<(String, String), AppError> {
    let user_id = require_user(user_id)?;
    let mut conn = sqlite.connect()?;
    let tx = conn.transaction()?;

    let subject = Subject {
        id: next_id("sub"),
        user_id: user_id.to_string(),
        name: subject_name,
        color: subject_color,
        total_time: 0,
    };
    subject.validate()?;
    store::insert_subject(&tx, &subject)?;

    args.subject_id = Some(subject.id.clone());
    let block_id = create_block_in_tx(&tx, user_id, args)?;
    tx.commit()?;
    Ok((subject.id, block_id))
}

fn create_block_in_tx(
    conn: &Connection,
    user_id: &str,
    args: CreateBlockArgs,
) -> Result<String, AppError> {
    let timetable = owned_timetable(conn, user_id, &args.timetable_id)?;
    let (start, end) = snap_range(&args.start, &args.end)?;

    let existing = store::blocks_in_timetable(conn, &timetable.id)?;
    reject_overlaps(&existing, None, &start, &end, args.day_scope)?;

    let subject = match args.subject_id.as_deref() {
        Some(subject_id) => Some(owned_subject(conn, user_id, subject_id)?),
        None => None,
    };

    let label = args.label.or_else(|| match args.kind {
        BlockKind::Break => Some("Break".to_string()),
        BlockKind::Study | BlockKind::Fixed => subject.as_ref().map(|s| s.name.clone()),
    });
    let color = args
        .color
        .or_else(|| subject.as_ref().map(|s| s.color.clone()))
        .unwrap_or_else(|| DEFAULT_BLOCK_COLOR.to_string());

    let block = TimetableBlock {
        id: next_id("blk"),
        timetable_id: timetable.id,
        kind: args.kind,
        subject_id: args.subject_id,
        label,
        color: Some(color),
        start,
        end,
        day_scope: args.day_scope,
        locked: false,
    };
    block.validate()?;
    store::insert_block(conn, &block)?;
    Ok(block.id)
}

pub fn update_block(
    sqlite: &SqliteStore,
    user_id: &str,
    block_id: &str,
    args: UpdateBlockArgs,
) -> Result<(), AppError> {
    let user_id = require_user(user_id)?;
    let mut conn = sqlite.connect()?;
    let tx = conn.transaction()?;

    let mut block = store::block_by_id(&tx, block_id)?
        .ok_or_else(|| AppError::NotFound(format!("block not found: {block_id}")))?;
    owned_timetable(&tx, user_id, &block.timetable_id)?;

    let times_change =
        args.start.is_some() || args.end.is_some() || args.day_scope.is_some();

    if let Some(start) = args.start {
        block.start = format_time(snap_to_five(parse_time(&start)?));
    }
    if let Some(end) = args.end {
        block.end = format_time(snap_to_five(parse_time(&end)?));
    }
    if let Some(day_scope) = args.day_scope {
        block.day_scope = day_scope;
    }

    if times_change {
        let existing = store::blocks_in_timetable(&tx, &block.timetable_id)?;
        reject_overlaps(&existing, Some(&block.id), &block.start, &block.end, block.day_scope)?;
    }

    let subject_changed = args.subject_id.is_some();
    if let Some(subject_id) = args.subject_id {
        owned_subject(&tx, user_id, &subject_id)?;
        block.subject_id = Some(subject_id);
    }
    if let Some(label) = args.label {
        block.label = Some(label);
    }
    if let Some(locked) = args.locked {
        block.locked = locked;
    }

    match args.color {
        Some(color) => block.color = Some(color),
        None if subject_changed => {
            if let Some(subject_id) = block.subject_id.as_deref() {
                if let Some(subject) = store::subject_by_id(&tx, subject_id)? {
                    block.color = Some(subject.color);
                }
            }
        }
        None => {}
    }

    block.validate()?;
    store::update_block(&tx, &block)?;
    tx.commit()?;
    Ok(())
}

pub fn delete_block(sqlite: &SqliteStore, user_id: &str, block_id: &str) -> Result<(), AppError> {
    let user_id = require_user(user_id)?;
    let conn = sqlite.connect()?;
    let block = store::block_by_id(&conn, block_id)?
        .ok_or_else(|| AppError::NotFound(format!("block not found: {block_id}")))?;
    owned_timetable(&conn, user_id, &block.timetable_id)?;
    store::delete_block(&conn, block_id)?;
    Ok(())
}

pub fn list_fixed_events(sqlite: &SqliteStore, user_id: &str) -> Result<Vec<FixedEvent>, AppError> {
    let user_id = require_user(user_id)?;
    let conn = sqlite.connect()?;
    let events = store::events_for_user(&conn, user_id)?;
    sort_by_start(events, |event| parse_time(&event.start))
}

/// Fixed events are deliberately not overlap-checked: they describe external
/// commitments that may coincide with flexible blocks in the overlay.
pub fn upsert_fixed_event(
    sqlite: &SqliteStore,
    user_id: &str,
    args: UpsertFixedEventArgs,
) -> Result<String, AppError> {
    let user_id = require_user(user_id)?;
    let mut conn = sqlite.connect()?;
    let tx = conn.transaction()?;

    let (start, end) = snap_range(&args.start, &args.end)?;
    let color = args.color.unwrap_or_else(|| DEFAULT_EVENT_COLOR.to_string());

    let event_id = if let Some(event_id) = args.event_id {
        let mut event = owned_event(&tx, user_id, &event_id)?;
        event.label = args.label;
        event.start = start;
        event.end = end;
        event.color = color;
        event.day_scope = args.day_scope;
        event.validate()?;
        store::update_event(&tx, &event)?;
        event.id
    } else {
        let event = FixedEvent {
            id: next_id("evt"),
            user_id: user_id.to_string(),
            label: args.label,
            start,
            end,
            color,
            day_scope: args.day_scope,
        };
        event.validate()?;
        store::insert_event(&tx, &event)?;
        event.id
    };

    tx.commit()?;
    Ok(event_id)
}

pub fn delete_fixed_event(
    sqlite: &SqliteStore,
    user_id: &str,
    event_id: &str,
) -> Result<(), AppError> {
    let user_id = require_user(user_id)?;
    let conn = sqlite.connect()?;
    owned_event(&conn, user_id, event_id)?;
    store::delete_event(&conn, event_id)?;
    Ok(())
}

/// Merged projection of blocks and fixed events for one calendar date, with
/// the weak-subject rotation applied to the projection only. Pure read.
pub fn preview_for_date(
    sqlite: &SqliteStore,
    user_id: &str,
    timetable_id: &str,
    date: NaiveDate,
) -> Result<Vec<PreviewItem>, AppError> {
    let user_id = require_user(user_id)?;
    let conn = sqlite.connect()?;
    let timetable = owned_timetable(&conn, user_id, timetable_id)?;

    let mut blocks = store::blocks_in_timetable(&conn, &timetable.id)?;
    let events = store::events_for_user(&conn, user_id)?;

    if timetable.rotate_last_block && !timetable.weak_subject_ids.is_empty() {
        let last_study = blocks
            .iter()
            .enumerate()
            .filter(|(_, block)| block.kind == BlockKind::Study)
            .map(|(index, block)| Ok::<_, AppError>((index, block.start_minutes()?)))
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .max_by_key(|(_, start)| *start)
            .map(|(index, _)| index);

        if let Some(index) = last_study {
            let slot = rotation_index(date, timetable.weak_subject_ids.len());
            let weak_subject_id = &timetable.weak_subject_ids[slot];
            if let Some(subject) = store::subject_by_id(&conn, weak_subject_id)? {
                if subject.user_id == user_id {
                    let block = &mut blocks[index];
                    block.subject_id = Some(subject.id.clone());
                    block.label = Some(format!("{} (Rotation)", subject.name));
                    block.color = Some(subject.color);
                }
            }
        }
    }

    let items: Vec<PreviewItem> = blocks
        .into_iter()
        .map(PreviewItem::Block)
        .chain(events.into_iter().map(PreviewItem::Event))
        .collect();
    sort_by_start(items, PreviewItem::start_minutes)
}

fn snap_range(start: &str, end: &str) -> Result<(String, String), AppError> {
    let start_minutes = snap_to_five(parse_time(start)?);
    let end_minutes = snap_to_five(parse_time(end)?);
    if end_minutes <= start_minutes {
        return Err(AppError::Validation(
            "end must be after start once snapped to 5-minute boundaries".to_string(),
        ));
    }
    Ok((format_time(start_minutes), format_time(end_minutes)))
}

fn reject_overlaps(
    existing: &[TimetableBlock],
    skip_block_id: Option<&str>,
    start: &str,
    end: &str,
    day_scope: DayScope,
) -> Result<(), AppError> {
    let start_minutes = parse_time(start)?;
    let end_minutes = parse_time(end)?;

    for other in existing {
        if skip_block_id == Some(other.id.as_str()) {
            continue;
        }
        if !day_scope.collides_with(other.day_scope) {
            continue;
        }
        if overlaps(start_minutes, end_minutes, other.start_minutes()?, other.end_minutes()?) {
            return Err(AppError::Conflict("Block overlaps with existing block".to_string()));
        }
    }
    Ok(())
}

// Keys are computed up front so a malformed stored time fails the read
// instead of panicking inside the comparator.
fn sort_by_start<T>(
    items: Vec<T>,
    start_minutes: impl Fn(&T) -> Result<u32, AppError>,
) -> Result<Vec<T>, AppError> {
    let mut keyed = items
        .into_iter()
        .map(|item| Ok((start_minutes(&item)?, item)))
        .collect::<Result<Vec<_>, AppError>>()?;
    keyed.sort_by_key(|(minutes, _)| *minutes);
    Ok(keyed.into_iter().map(|(_, item)| item).collect())
}

fn owned_timetable(
    conn: &Connection,
    user_id: &str,
    timetable_id: &str,
) -> Result<Timetable, AppError> {
    store::timetable_by_id(conn, timetable_id)?
        .filter(|timetable| timetable.user_id == user_id)
        .ok_or_else(|| AppError::NotFound(format!("timetable not found: {timetable_id}")))
}

fn owned_subject(conn: &Connection, user_id: &str, subject_id: &str) -> Result<Subject, AppError> {
    store::subject_by_id(conn, subject_id)?
        .filter(|subject| subject.user_id == user_id)
        .ok_or_else(|| AppError::NotFound(format!("subject not found: {subject_id}")))
}

fn owned_event(conn: &Connection, user_id: &str, event_id: &str) -> Result<FixedEvent, AppError> {
    store::event_by_id(conn, event_id)?
        .filter(|event| event.user_id == user_id)
        .ok_or_else(|| AppError::NotFound(format!("event not found: {event_id}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::DayOfWeek;
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
                "studytrack-timetable-tests-{}-{}",
                std::process::id(),
                sequence
            ));
            fs::create_dir_all(&dir).expect("create temp dir");
            let db_path = dir.join("timetable.sqlite");
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

    fn empty_timetable(db: &TempDb, user_id: &str) -> String {
        upsert_timetable(&db.store, user_id, UpsertTimetableArgs::default())
            .expect("create timetable")
    }

    fn block_args(timetable_id: &str, start: &str, end: &str) -> CreateBlockArgs {
        CreateBlockArgs {
            timetable_id: timetable_id.to_string(),
            kind: BlockKind::Study,
            subject_id: None,
            label: Some("Revision".to_string()),
            color: None,
            start: start.to_string(),
            end: end.to_string(),
            day_scope: DayScope::Any,
        }
    }

    #[test]
    fn default_seeding_creates_expected_records_once() {
        let db = TempDb::new();
        let timetable_id = ensure_default_timetable(&db.store, "user-1").expect("seed");

        let conn = db.store.connect().expect("connect");
        let subjects = store::subjects_for_user(&conn, "user-1").expect("subjects");
        let blocks = store::blocks_in_timetable(&conn, &timetable_id).expect("blocks");
        let events = store::events_for_user(&conn, "user-1").expect("events");

        assert_eq!(subjects.len(), 3);
        assert_eq!(blocks.len(), 4);
        assert_eq!(
            blocks.iter().filter(|b| b.kind == BlockKind::Study).count(),
            3
        );
        assert_eq!(
            blocks.iter().filter(|b| b.kind == BlockKind::Break).count(),
            1
        );
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].label, "Isha Namaz");

        let again = ensure_default_timetable(&db.store, "user-1").expect("idempotent");
        assert_eq!(again, timetable_id);
        let subjects_again = store::subjects_for_user(&conn, "user-1").expect("subjects");
        assert_eq!(subjects_again.len(), 3);
    }

    #[test]
    fn overlapping_block_is_rejected_and_adjacent_is_accepted() {
        let db = TempDb::new();
        let timetable_id = empty_timetable(&db, "user-1");

        create_block(&db.store, "user-1", block_args(&timetable_id, "18:00", "19:00"))
            .expect("first block");

        let conflict = create_block(&db.store, "user-1", block_args(&timetable_id, "18:30", "19:30"));
        assert!(matches!(conflict, Err(AppError::Conflict(_))));

        create_block(&db.store, "user-1", block_args(&timetable_id, "19:00", "20:00"))
            .expect("touching block is allowed");
    }

    #[test]
    fn blocks_on_different_days_do_not_conflict_but_unpinned_does() {
        let db = TempDb::new();
        let timetable_id = empty_timetable(&db, "user-1");

        let mut monday = block_args(&timetable_id, "18:00", "19:00");
        monday.day_scope = DayScope::On(DayOfWeek::Mon);
        create_block(&db.store, "user-1", monday).expect("monday block");

        let mut tuesday = block_args(&timetable_id, "18:00", "19:00");
        tuesday.day_scope = DayScope::On(DayOfWeek::Tue);
        create_block(&db.store, "user-1", tuesday).expect("tuesday block");

        let unpinned = create_block(&db.store, "user-1", block_args(&timetable_id, "18:30", "19:30"));
        assert!(matches!(unpinned, Err(AppError::Conflict(_))));
    }

    #[test]
    fn times_are_snapped_before_storage() {
        let db = TempDb::new();
        let timetable_id = empty_timetable(&db, "user-1");

        let block_id = create_block(&db.store, "user-1", block_args(&timetable_id, "18:32", "19:58"))
            .expect("create block");

        let conn = db.store.connect().expect("connect");
        let block = store::block_by_id(&conn, &block_id).expect("query").expect("exists");
        assert_eq!(block.start, "18:30");
        assert_eq!(block.end, "20:00");
    }

    #[test]
    fn snapping_to_an_empty_range_is_rejected() {
        let db = TempDb::new();
        let timetable_id = empty_timetable(&db, "user-1");
        let result = create_block(&db.store, "user-1", block_args(&timetable_id, "10:01", "10:02"));
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[test]
    fn update_block_revalidates_prospective_times() {
        let db = TempDb::new();
        let timetable_id = empty_timetable(&db, "user-1");

        create_block(&db.store, "user-1", block_args(&timetable_id, "18:00", "19:00"))
            .expect("first block");
        let second = create_block(&db.store, "user-1", block_args(&timetable_id, "19:00", "20:00"))
            .expect("second block");

        let shifted = update_block(
            &db.store,
            "user-1",
            &second,
            UpdateBlockArgs {
                start: Some("18:30".to_string()),
                ..Default::default()
            },
        );
        assert!(matches!(shifted, Err(AppError::Conflict(_))));

        update_block(
            &db.store,
            "user-1",
            &second,
            UpdateBlockArgs {
                start: Some("19:30".to_string()),
                end: Some("20:30".to_string()),
                ..Default::default()
            },
        )
        .expect("non-overlapping shift");
    }

    #[test]
    fn update_block_refreshes_color_from_new_subject() {
        let db = TempDb::new();
        let timetable_id = ensure_default_timetable(&db.store, "user-1").expect("seed");

        let conn = db.store.connect().expect("connect");
        let subjects = store::subjects_for_user(&conn, "user-1").expect("subjects");
        let blocks = store::blocks_in_timetable(&conn, &timetable_id).expect("blocks");
        let study = blocks.iter().find(|b| b.kind == BlockKind::Study).expect("study block");
        let other_subject = subjects
            .iter()
            .find(|s| Some(&s.id) != study.subject_id.as_ref())
            .expect("another subject");

        update_block(
            &db.store,
            "user-1",
            &study.id,
            UpdateBlockArgs {
                subject_id: Some(other_subject.id.clone()),
                ..Default::default()
            },
        )
        .expect("update subject");

        let updated = store::block_by_id(&conn, &study.id).expect("query").expect("exists");
        assert_eq!(updated.color.as_deref(), Some(other_subject.color.as_str()));
    }

    #[test]
    fn fixed_events_are_not_overlap_checked() {
        let db = TempDb::new();
        let timetable_id = empty_timetable(&db, "user-1");
        create_block(&db.store, "user-1", block_args(&timetable_id, "20:00", "21:00"))
            .expect("block");

        upsert_fixed_event(
            &db.store,
            "user-1",
            UpsertFixedEventArgs {
                event_id: None,
                label: "Isha Namaz".to_string(),
                start: "20:00".to_string(),
                end: "20:15".to_string(),
                color: None,
                day_scope: DayScope::Any,
            },
        )
        .expect("overlapping fixed event is allowed");
    }

    #[test]
    fn preview_rotation_is_deterministic_and_does_not_persist() {
        let db = TempDb::new();
        let timetable_id = ensure_default_timetable(&db.store, "user-1").expect("seed");

        let conn = db.store.connect().expect("connect");
        let subjects = store::subjects_for_user(&conn, "user-1").expect("subjects");
        let weak_ids: Vec<String> = subjects.iter().map(|s| s.id.clone()).collect();
        upsert_timetable(
            &db.store,
            "user-1",
            UpsertTimetableArgs {
                timetable_id: Some(timetable_id.clone()),
                weak_subject_ids: Some(weak_ids.clone()),
                ..Default::default()
            },
        )
        .expect("set weak subjects");

        let date = NaiveDate::from_ymd_opt(2026, 8, 5).expect("valid date");
        let first = preview_for_date(&db.store, "user-1", &timetable_id, date).expect("preview");
        let second = preview_for_date(&db.store, "user-1", &timetable_id, date).expect("preview");
        assert_eq!(first, second);

        let rotated: Vec<&TimetableBlock> = first
            .iter()
            .filter_map(|item| match item {
                PreviewItem::Block(block) => Some(block),
                PreviewItem::Event(_) => None,
            })
            .filter(|block| block.label.as_deref().is_some_and(|l| l.ends_with("(Rotation)")))
            .collect();
        assert_eq!(rotated.len(), 1);
        // The 22:00 study block is the latest one and carries the rotation.
        assert_eq!(rotated[0].start, "22:00");

        let expected_slot = rotation_index(date, weak_ids.len());
        assert_eq!(rotated[0].subject_id.as_ref(), Some(&weak_ids[expected_slot]));

        // Projection only: the stored block keeps its original subject.
        let stored = store::blocks_in_timetable(&conn, &timetable_id).expect("blocks");
        assert!(stored
            .iter()
            .all(|block| !block.label.as_deref().unwrap_or_default().ends_with("(Rotation)")));
    }

    #[test]
    fn preview_cycles_through_weak_subjects_over_three_days() {
        let db = TempDb::new();
        let timetable_id = ensure_default_timetable(&db.store, "user-1").expect("seed");
        let conn = db.store.connect().expect("connect");
        let subjects = store::subjects_for_user(&conn, "user-1").expect("subjects");
        let weak_ids: Vec<String> = subjects.iter().map(|s| s.id.clone()).collect();
        upsert_timetable(
            &db.store,
            "user-1",
            UpsertTimetableArgs {
                timetable_id: Some(timetable_id.clone()),
                weak_subject_ids: Some(weak_ids.clone()),
                ..Default::default()
            },
        )
        .expect("set weak subjects");

        // Ordinal 3 of the year: day-of-year % 3 == 0 boundary.
        let base = NaiveDate::from_yo_opt(2026, 3).expect("valid ordinal");
        let mut seen = Vec::new();
        for offset in 0..3 {
            let date = base + chrono::Duration::days(offset);
            let items = preview_for_date(&db.store, "user-1", &timetable_id, date).expect("preview");
            let rotated_subject = items
                .iter()
                .find_map(|item| match item {
                    PreviewItem::Block(block)
                        if block.label.as_deref().is_some_and(|l| l.ends_with("(Rotation)")) =>
                    {
                        block.subject_id.clone()
                    }
                    _ => None,
                })
                .expect("rotated block present");
            seen.push(rotated_subject);
        }
        assert_eq!(seen, weak_ids);
    }

    #[test]
    fn preview_merges_events_and_sorts_by_start() {
        let db = TempDb::new();
        let timetable_id = ensure_default_timetable(&db.store, "user-1").expect("seed");

        let date = NaiveDate::from_ymd_opt(2026, 8, 5).expect("valid date");
        let items = preview_for_date(&db.store, "user-1", &timetable_id, date).expect("preview");
        assert_eq!(items.len(), 5);

        let starts: Vec<u32> = items
            .iter()
            .map(|item| item.start_minutes().expect("valid start"))
            .collect();
        let mut sorted = starts.clone();
        sorted.sort_unstable();
        assert_eq!(starts, sorted);
    }

    #[test]
    fn operations_reject_foreign_records() {
        let db = TempDb::new();
        let timetable_id = empty_timetable(&db, "user-1");

        let foreign = create_block(&db.store, "user-2", block_args(&timetable_id, "18:00", "19:00"));
        assert!(matches!(foreign, Err(AppError::NotFound(_))));

        let blank = create_block(&db.store, "  ", block_args(&timetable_id, "18:00", "19:00"));
        assert!(matches!(blank, Err(AppError::Authentication)));
    }

    #[test]
    fn composite_create_with_new_subject_links_block_and_subject() {
        let db = TempDb::new();
        let timetable_id = empty_timetable(&db, "user-1");

        let mut args = block_args(&timetable_id, "18:00", "19:00");
        args.label = None;
        let (subject_id, block_id) = create_block_with_new_subject(
            &db.store,
            "user-1",
            "Chemistry".to_string(),
            "#ef4444".to_string(),
            args,
        )
        .expect("composite create");

        let conn = db.store.connect().expect("connect");
        let block = store::block_by_id(&conn, &block_id).expect("query").expect("exists");
        assert_eq!(block.subject_id.as_ref(), Some(&subject_id));
        assert_eq!(block.label.as_deref(), Some("Chemistry"));
        assert_eq!(block.color.as_deref(), Some("#ef4444"));
    }
}

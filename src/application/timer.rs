use crate::domain::models::SessionType;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// In-process countdown for one user. The frontend drives the visible
/// one-second tick; this state machine owns the mode, the armed duration and
/// the focus/break flip on completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerState {
    pub mode: SessionType,
    pub running: bool,
    pub remaining_seconds: u32,
    pub started_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TimerStateResponse {
    pub mode: String,
    pub running: bool,
    pub remaining_seconds: u32,
    pub started_at: Option<String>,
}

impl TimerState {
    pub fn armed(focus_minutes: u32) -> Self {
        Self {
            mode: SessionType::Focus,
            running: false,
            remaining_seconds: focus_minutes * 60,
            started_at: None,
        }
    }

    fn mode_minutes(&self, focus_minutes: u32, break_minutes: u32) -> u32 {
        match self.mode {
            SessionType::Focus => focus_minutes,
            SessionType::Break => break_minutes,
        }
    }

    pub fn start(&mut self, now: DateTime<Utc>) {
        self.running = true;
        self.started_at = Some(now);
    }

    pub fn pause(&mut self) {
        self.running = false;
    }

    /// Rearm the current mode without recording anything.
    pub fn reset(&mut self, focus_minutes: u32, break_minutes: u32) {
        self.running = false;
        self.started_at = None;
        self.remaining_seconds = self.mode_minutes(focus_minutes, break_minutes) * 60;
    }

    /// The countdown reached zero: report the finished mode and its configured
    /// length, then flip to the other mode and rearm.
    pub fn complete(&mut self, focus_minutes: u32, break_minutes: u32) -> (SessionType, u32) {
        let finished_mode = self.mode;
        let finished_minutes = self.mode_minutes(focus_minutes, break_minutes);

        self.mode = match self.mode {
            SessionType::Focus => SessionType::Break,
            SessionType::Break => SessionType::Focus,
        };
        self.running = false;
        self.started_at = None;
        self.remaining_seconds = self.mode_minutes(focus_minutes, break_minutes) * 60;

        (finished_mode, finished_minutes)
    }

    pub fn to_response(&self) -> TimerStateResponse {
        TimerStateResponse {
            mode: self.mode.as_str().to_string(),
            running: self.running,
            remaining_seconds: self.remaining_seconds,
            started_at: self.started_at.map(|value| value.to_rfc3339()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn armed_timer_starts_in_focus_mode() {
        let timer = TimerState::armed(25);
        assert_eq!(timer.mode, SessionType::Focus);
        assert!(!timer.running);
        assert_eq!(timer.remaining_seconds, 25 * 60);
    }

    #[test]
    fn completion_flips_mode_and_rearms_the_new_duration() {
        let mut timer = TimerState::armed(25);
        timer.start(Utc::now());

        let (finished_mode, finished_minutes) = timer.complete(25, 5);
        assert_eq!(finished_mode, SessionType::Focus);
        assert_eq!(finished_minutes, 25);
        assert_eq!(timer.mode, SessionType::Break);
        assert!(!timer.running);
        assert_eq!(timer.remaining_seconds, 5 * 60);

        let (finished_mode, finished_minutes) = timer.complete(25, 5);
        assert_eq!(finished_mode, SessionType::Break);
        assert_eq!(finished_minutes, 5);
        assert_eq!(timer.mode, SessionType::Focus);
        assert_eq!(timer.remaining_seconds, 25 * 60);
    }

    #[test]
    fn reset_rearms_current_mode_without_flipping() {
        let mut timer = TimerState::armed(25);
        timer.start(Utc::now());
        timer.remaining_seconds = 17;

        timer.reset(25, 5);
        assert_eq!(timer.mode, SessionType::Focus);
        assert!(!timer.running);
        assert_eq!(timer.remaining_seconds, 25 * 60);
        assert_eq!(timer.started_at, None);
    }

    #[test]
    fn pause_keeps_remaining_time() {
        let mut timer = TimerState::armed(25);
        timer.start(Utc::now());
        timer.remaining_seconds = 900;
        timer.pause();
        assert!(!timer.running);
        assert_eq!(timer.remaining_seconds, 900);
    }
}

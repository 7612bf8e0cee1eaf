use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub const XP_PER_LEVEL: u64 = 1000;
pub const XP_HISTORY_DAYS: usize = 7;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GamificationState {
    /// XP toward the next level, always below `XP_PER_LEVEL`.
    pub xp: u64,
    pub level: u32,
    /// Consecutive active days.
    pub streak: u32,
    pub xp_history: Vec<u64>,
    pub last_active_day: Option<NaiveDate>,
}

impl Default for GamificationState {
    fn default() -> Self {
        Self {
            xp: 0,
            level: 1,
            streak: 0,
            xp_history: Vec::new(),
            last_active_day: None,
        }
    }
}

impl GamificationState {
    /// Adds XP and returns how many levels were gained.
    pub fn gain(&mut self, amount: u64, today: NaiveDate) -> u32 {
        self.xp += amount;
        let mut level_ups = 0;
        while self.xp >= XP_PER_LEVEL {
            self.xp -= XP_PER_LEVEL;
            level_ups += 1;
        }
        self.level += level_ups;

        match self.xp_history.last_mut() {
            Some(last) => *last += amount,
            None => self.xp_history.push(amount),
        }
        if self.xp_history.len() > XP_HISTORY_DAYS {
            let excess = self.xp_history.len() - XP_HISTORY_DAYS;
            self.xp_history.drain(..excess);
        }

        self.mark_active(today);
        level_ups
    }

    /// Takes XP back. Levels are never lost.
    pub fn lose(&mut self, amount: u64) {
        self.xp = self.xp.saturating_sub(amount);
        if let Some(last) = self.xp_history.last_mut() {
            *last = last.saturating_sub(amount);
        }
    }

    fn mark_active(&mut self, today: NaiveDate) {
        self.streak = match self.last_active_day {
            Some(day) if day == today => self.streak,
            Some(day) if day.succ_opt() == Some(today) => self.streak + 1,
            _ => 1,
        };
        self.last_active_day = Some(today);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
    }

    #[test]
    fn gains_roll_over_into_levels() {
        let mut state = GamificationState {
            xp: 950,
            ..GamificationState::default()
        };
        assert_eq!(state.gain(100, day(1)), 1);
        assert_eq!(state.xp, 50);
        assert_eq!(state.level, 2);

        assert_eq!(state.gain(2000, day(1)), 2);
        assert_eq!(state.level, 4);
        assert_eq!(state.xp, 50);
    }

    #[test]
    fn history_accumulates_on_last_entry() {
        let mut state = GamificationState::default();
        state.gain(25, day(1));
        assert_eq!(state.xp_history, vec![25]);
        state.gain(50, day(1));
        assert_eq!(state.xp_history, vec![75]);

        state.xp_history = vec![1, 2, 3, 4, 5, 6, 7];
        state.gain(10, day(1));
        assert_eq!(state.xp_history, vec![1, 2, 3, 4, 5, 6, 17]);

        state.lose(100);
        assert_eq!(state.xp_history, vec![1, 2, 3, 4, 5, 6, 0]);
        assert_eq!(state.xp, 0);
        assert_eq!(state.level, 1);
    }

    #[test]
    fn streak_counts_consecutive_days() {
        let mut state = GamificationState::default();
        state.gain(10, day(1));
        assert_eq!(state.streak, 1);
        state.gain(10, day(1));
        assert_eq!(state.streak, 1);
        state.gain(10, day(2));
        assert_eq!(state.streak, 2);
        state.gain(10, day(5));
        assert_eq!(state.streak, 1);
    }
}

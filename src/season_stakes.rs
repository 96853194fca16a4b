use serde::{Deserialize, Serialize};

use crate::team_quality::{TeamQuality, Tier};

pub const DEFAULT_TEAM_COUNT: u32 = 20;

const SIX_POINTER_MIN_MOTIVATION: f64 = 55.0;
const SIX_POINTER_MAX_GAP: f64 = 25.0;
const GOALS_BOUND: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StakeZone {
    TitleRace,
    ChampionsLeague,
    Europe,
    MidTable,
    RelegationFight,
    RelegationZone,
}

impl StakeZone {
    pub fn from_position(position: u32, team_count: u32) -> StakeZone {
        let n = team_count.max(4);
        let pos = position.clamp(1, n);
        if pos <= 2 {
            StakeZone::TitleRace
        } else if pos <= 4 {
            StakeZone::ChampionsLeague
        } else if pos <= 7 {
            StakeZone::Europe
        } else if pos + 3 > n {
            StakeZone::RelegationZone
        } else if pos + 6 > n {
            StakeZone::RelegationFight
        } else {
            StakeZone::MidTable
        }
    }

    pub fn base_motivation(self) -> f64 {
        match self {
            StakeZone::TitleRace => 90.0,
            StakeZone::ChampionsLeague => 75.0,
            StakeZone::Europe => 55.0,
            StakeZone::MidTable => 20.0,
            StakeZone::RelegationFight => 70.0,
            StakeZone::RelegationZone => 95.0,
        }
    }

    fn family(self) -> u8 {
        match self {
            StakeZone::TitleRace | StakeZone::ChampionsLeague => 0,
            StakeZone::Europe => 1,
            StakeZone::MidTable => 2,
            StakeZone::RelegationFight | StakeZone::RelegationZone => 3,
        }
    }

    fn is_relegation(self) -> bool {
        self.family() == 3
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TeamStakes {
    pub zone: StakeZone,
    /// 0..100
    pub motivation: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeasonStakes {
    pub home: TeamStakes,
    pub away: TeamStakes,
    /// Home minus away motivation, -100..100.
    pub motivation_gap: f64,
    pub is_six_pointer: bool,
    /// Goal expectation nudge in percentage points.
    pub goals_adjustment: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct StakesInput<'a> {
    pub home_position: u32,
    pub away_position: u32,
    pub team_count: Option<u32>,
    pub rounds_remaining: Option<u32>,
    pub home_quality: &'a TeamQuality,
    pub away_quality: &'a TeamQuality,
}

pub fn team_stakes(
    position: u32,
    team_count: u32,
    rounds_remaining: Option<u32>,
    quality: &TeamQuality,
) -> TeamStakes {
    let zone = StakeZone::from_position(position, team_count);
    // Fewer rounds left sharpens whatever is at stake.
    let urgency = match rounds_remaining {
        Some(r) => 1.0 + (5u32.saturating_sub(r.min(5))) as f64 * 0.04,
        None => 1.0,
    };
    let mut motivation = if zone == StakeZone::MidTable {
        zone.base_motivation()
    } else {
        zone.base_motivation() * urgency
    };
    if zone.is_relegation() && quality.mood.tier == Tier::Weak {
        motivation += 5.0;
    }
    TeamStakes {
        zone,
        motivation: motivation.clamp(0.0, 100.0),
    }
}

pub fn evaluate(input: &StakesInput<'_>) -> SeasonStakes {
    let n = input.team_count.unwrap_or(DEFAULT_TEAM_COUNT);
    let home = team_stakes(
        input.home_position,
        n,
        input.rounds_remaining,
        input.home_quality,
    );
    let away = team_stakes(
        input.away_position,
        n,
        input.rounds_remaining,
        input.away_quality,
    );
    let gap = (home.motivation - away.motivation).clamp(-100.0, 100.0);

    let is_six_pointer = home.motivation >= SIX_POINTER_MIN_MOTIVATION
        && away.motivation >= SIX_POINTER_MIN_MOTIVATION
        && home.zone.family() == away.zone.family()
        && gap.abs() <= SIX_POINTER_MAX_GAP;

    let home_idle = home.zone == StakeZone::MidTable;
    let away_idle = away.zone == StakeZone::MidTable;
    let mut goals: f64 = if is_six_pointer {
        -2.0
    } else if home_idle && away_idle {
        3.0
    } else if home_idle || away_idle {
        1.0
    } else {
        0.0
    };
    if is_six_pointer
        && input.home_quality.mood.tier == Tier::Weak
        && input.away_quality.mood.tier == Tier::Weak
    {
        goals -= 1.0;
    }

    SeasonStakes {
        home,
        away,
        motivation_gap: gap,
        is_six_pointer,
        goals_adjustment: goals.clamp(-GOALS_BOUND, GOALS_BOUND),
    }
}

/// Motivation tweak from table positions alone, for when the full stakes
/// model cannot run. Bounded to [-0.1, 0.3].
pub fn position_heuristic(
    home_position: Option<u32>,
    away_position: Option<u32>,
    team_count: Option<u32>,
) -> f64 {
    let n = team_count.unwrap_or(DEFAULT_TEAM_COUNT);
    let top = [home_position, away_position]
        .into_iter()
        .flatten()
        .map(|p| StakeZone::from_position(p, n).base_motivation())
        .fold(None, |acc: Option<f64>, m| Some(acc.map_or(m, |a| a.max(m))));
    match top {
        Some(m) => ((m - 50.0) / 100.0 * 0.6).clamp(-0.1, 0.3),
        None => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::team_quality::assess_team;

    fn neutral_quality() -> TeamQuality {
        assess_team(&[], 5, None)
    }

    #[test]
    fn zones_follow_table_position() {
        assert_eq!(StakeZone::from_position(1, 20), StakeZone::TitleRace);
        assert_eq!(StakeZone::from_position(4, 20), StakeZone::ChampionsLeague);
        assert_eq!(StakeZone::from_position(6, 20), StakeZone::Europe);
        assert_eq!(StakeZone::from_position(10, 20), StakeZone::MidTable);
        assert_eq!(StakeZone::from_position(16, 20), StakeZone::RelegationFight);
        assert_eq!(StakeZone::from_position(18, 20), StakeZone::RelegationZone);
        assert_eq!(StakeZone::from_position(20, 20), StakeZone::RelegationZone);
    }

    #[test]
    fn relegation_clash_is_six_pointer() {
        let q = neutral_quality();
        let s = evaluate(&StakesInput {
            home_position: 17,
            away_position: 18,
            team_count: Some(20),
            rounds_remaining: Some(3),
            home_quality: &q,
            away_quality: &q,
        });
        assert!(s.is_six_pointer);
        assert!(s.goals_adjustment < 0.0);
        assert!(s.motivation_gap.abs() <= 25.0);
    }

    #[test]
    fn title_chaser_against_midtable_has_gap() {
        let q = neutral_quality();
        let s = evaluate(&StakesInput {
            home_position: 1,
            away_position: 11,
            team_count: None,
            rounds_remaining: Some(2),
            home_quality: &q,
            away_quality: &q,
        });
        assert!(!s.is_six_pointer);
        assert!(s.motivation_gap > 60.0);
        assert_eq!(s.goals_adjustment, 1.0);
    }

    #[test]
    fn heuristic_is_bounded() {
        assert_eq!(position_heuristic(None, None, None), 0.0);
        let h = position_heuristic(Some(19), Some(10), Some(20));
        assert!(h > 0.0 && h <= 0.3);
        assert_eq!(position_heuristic(Some(10), Some(11), Some(20)), -0.1);
    }
}

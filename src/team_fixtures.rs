use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::h2h::H2HAggregate;
use crate::team_quality::{MindLayer, MoodLayer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchResult {
    #[serde(rename = "W")]
    Win,
    #[serde(rename = "D")]
    Draw,
    #[serde(rename = "L")]
    Loss,
}

impl MatchResult {
    pub fn points(self) -> u32 {
        match self {
            MatchResult::Win => 3,
            MatchResult::Draw => 1,
            MatchResult::Loss => 0,
        }
    }

    pub fn letter(self) -> char {
        match self {
            MatchResult::Win => 'W',
            MatchResult::Draw => 'D',
            MatchResult::Loss => 'L',
        }
    }
}

/// One settled match seen from a single team's side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchRecord {
    pub date: NaiveDate,
    #[serde(default)]
    pub opponent: Option<String>,
    pub is_home: bool,
    pub goals_for: u8,
    pub goals_against: u8,
}

impl MatchRecord {
    pub fn result(&self) -> MatchResult {
        if self.goals_for > self.goals_against {
            MatchResult::Win
        } else if self.goals_for < self.goals_against {
            MatchResult::Loss
        } else {
            MatchResult::Draw
        }
    }

    pub fn goal_difference(&self) -> i32 {
        self.goals_for as i32 - self.goals_against as i32
    }
}

/// Most recent first. Ties keep their input order.
pub fn recent_first(matches: &[MatchRecord]) -> Vec<&MatchRecord> {
    let mut out: Vec<&MatchRecord> = matches.iter().collect();
    out.sort_by(|a, b| b.date.cmp(&a.date));
    out
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TeamRating {
    pub rating: f64,
    #[serde(default)]
    pub games_played: Option<u32>,
    #[serde(default)]
    pub confidence: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TeamRecord {
    #[serde(default)]
    pub id: Option<u32>,
    pub name: String,
    #[serde(default)]
    pub matches: Vec<MatchRecord>,
    #[serde(default)]
    pub mind: Option<MindLayer>,
    #[serde(default)]
    pub mood: Option<MoodLayer>,
    #[serde(default)]
    pub rating: Option<TeamRating>,
    #[serde(default)]
    pub home_matches: Option<Vec<MatchRecord>>,
    #[serde(default)]
    pub away_matches: Option<Vec<MatchRecord>>,
    #[serde(default)]
    pub days_since_last_match: Option<u32>,
    #[serde(default)]
    pub seasons_in_league: Option<u32>,
}

impl TeamRecord {
    /// Explicit value wins; otherwise derived from the latest match when the
    /// fixture date is known.
    pub fn rest_days(&self, fixture_date: Option<NaiveDate>) -> Option<u32> {
        if let Some(days) = self.days_since_last_match {
            return Some(days);
        }
        let date = fixture_date?;
        let last = self.matches.iter().map(|m| m.date).filter(|d| *d < date).max()?;
        u32::try_from((date - last).num_days()).ok()
    }

    /// Venue-specific list if supplied, otherwise filtered from the full history.
    pub fn venue_matches(&self, home: bool) -> Vec<MatchRecord> {
        let explicit = if home {
            self.home_matches.as_ref()
        } else {
            self.away_matches.as_ref()
        };
        match explicit {
            Some(list) => list.clone(),
            None => self
                .matches
                .iter()
                .filter(|m| m.is_home == home)
                .cloned()
                .collect(),
        }
    }
}

/// A past meeting between the two sides, in the orientation it was played.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct H2HMatch {
    #[serde(default)]
    pub date: Option<NaiveDate>,
    pub home_team: String,
    pub away_team: String,
    pub home_goals: u8,
    pub away_goals: u8,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct H2HRecord {
    #[serde(default)]
    pub overall: Option<H2HAggregate>,
    #[serde(default)]
    pub matches: Vec<H2HMatch>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MatchMetadata {
    pub league_name: String,
    #[serde(default)]
    pub league_id: Option<u32>,
    #[serde(default)]
    pub round: Option<String>,
    #[serde(default)]
    pub round_number: Option<u32>,
    #[serde(default)]
    pub season: Option<i32>,
    #[serde(default)]
    pub total_rounds: Option<u32>,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub venue: Option<String>,
    #[serde(default)]
    pub neutral_venue: Option<bool>,
    #[serde(default)]
    pub home_position: Option<u32>,
    #[serde(default)]
    pub away_position: Option<u32>,
    #[serde(default)]
    pub team_count: Option<u32>,
    #[serde(default)]
    pub after_international_break: Option<bool>,
}

impl MatchMetadata {
    /// Explicit round number, else trailing digits of the round label
    /// ("Regular Season - 12" -> 12).
    pub fn resolved_round(&self) -> Option<u32> {
        if self.round_number.is_some() {
            return self.round_number;
        }
        let label = self.round.as_deref()?.trim();
        let digits: String = label
            .chars()
            .rev()
            .take_while(|c| c.is_ascii_digit())
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        digits.parse::<u32>().ok()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixtureInput {
    pub metadata: MatchMetadata,
    pub home: TeamRecord,
    pub away: TeamRecord,
    #[serde(default)]
    pub h2h: Option<H2HRecord>,
}

pub fn parse_fixture_json(raw: &str) -> serde_json::Result<FixtureInput> {
    serde_json::from_str(raw.trim())
}

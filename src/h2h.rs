use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::team_fixtures::{H2HMatch, H2HRecord};

pub const H2H_MAX_MATCHES: usize = 5;

/// Percentages are 0..100 and `None` when no meetings qualify.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct H2HAggregate {
    pub matches: usize,
    #[serde(default)]
    pub home_win_pct: Option<f64>,
    #[serde(default)]
    pub away_win_pct: Option<f64>,
    #[serde(default)]
    pub draw_pct: Option<f64>,
    #[serde(default)]
    pub avg_goals: Option<f64>,
    #[serde(default)]
    pub btts_pct: Option<f64>,
    #[serde(default)]
    pub over_2_5_pct: Option<f64>,
}

impl H2HAggregate {
    pub fn empty() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct H2HSummary {
    pub overall: H2HAggregate,
    pub venue: H2HAggregate,
}

pub fn normalize_team_name(raw: &str) -> String {
    const STOP_WORDS: &[&str] = &["fc", "cf", "sc", "afc", "ac", "ss", "cd", "ud", "de", "al", "the"];
    let folded: String = raw
        .trim()
        .to_lowercase()
        .chars()
        .map(fold_accent)
        .map(|c| if c.is_alphanumeric() || c.is_whitespace() { c } else { ' ' })
        .collect();
    folded
        .split_whitespace()
        .filter(|p| !STOP_WORDS.contains(p))
        .collect::<Vec<_>>()
        .join(" ")
}

fn fold_accent(c: char) -> char {
    match c {
        'á' | 'à' | 'â' | 'ã' | 'ä' => 'a',
        'é' | 'è' | 'ê' | 'ë' => 'e',
        'í' | 'ì' | 'î' | 'ï' => 'i',
        'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
        'ú' | 'ù' | 'û' | 'ü' => 'u',
        'ç' => 'c',
        'ñ' => 'n',
        other => other,
    }
}

/// Aggregates the latest meetings before `before` from the current home
/// side's perspective. With `venue_only`, only meetings where the current
/// home side also hosted count.
pub fn compute_h2h(
    matches: &[H2HMatch],
    current_home: &str,
    current_away: &str,
    before: Option<NaiveDate>,
    venue_only: bool,
) -> H2HAggregate {
    let home_key = normalize_team_name(current_home);
    let away_key = normalize_team_name(current_away);

    let mut eligible: Vec<&H2HMatch> = matches
        .iter()
        .filter(|m| match (before, m.date) {
            (Some(cutoff), Some(d)) => d < cutoff,
            (Some(_), None) => false,
            (None, _) => true,
        })
        .filter(|m| {
            let h = normalize_team_name(&m.home_team);
            let a = normalize_team_name(&m.away_team);
            if venue_only {
                h == home_key && a == away_key
            } else {
                (h == home_key && a == away_key) || (h == away_key && a == home_key)
            }
        })
        .collect();
    // undated meetings sort as oldest
    eligible.sort_by(|a, b| b.date.cmp(&a.date));
    eligible.truncate(H2H_MAX_MATCHES);

    if eligible.is_empty() {
        return H2HAggregate::empty();
    }

    let mut home_wins = 0usize;
    let mut away_wins = 0usize;
    let mut draws = 0usize;
    let mut total_goals = 0u32;
    let mut btts = 0usize;
    let mut over = 0usize;

    for m in &eligible {
        let (hg, ag) = if normalize_team_name(&m.home_team) == home_key {
            (m.home_goals, m.away_goals)
        } else {
            (m.away_goals, m.home_goals)
        };
        if hg > ag {
            home_wins += 1;
        } else if ag > hg {
            away_wins += 1;
        } else {
            draws += 1;
        }
        let total = hg as u32 + ag as u32;
        total_goals += total;
        if hg > 0 && ag > 0 {
            btts += 1;
        }
        if total as f64 > 2.5 {
            over += 1;
        }
    }

    let n = eligible.len();
    let pct = |k: usize| Some(k as f64 / n as f64 * 100.0);
    H2HAggregate {
        matches: n,
        home_win_pct: pct(home_wins),
        away_win_pct: pct(away_wins),
        draw_pct: pct(draws),
        avg_goals: Some(total_goals as f64 / n as f64),
        btts_pct: pct(btts),
        over_2_5_pct: pct(over),
    }
}

/// Raw meetings are recomputed when present; otherwise the supplied overall
/// aggregate is used and the venue set stays empty.
pub fn summarize(
    record: Option<&H2HRecord>,
    current_home: &str,
    current_away: &str,
    before: Option<NaiveDate>,
) -> H2HSummary {
    let Some(record) = record else {
        return H2HSummary::default();
    };
    if record.matches.is_empty() {
        return H2HSummary {
            overall: record.overall.clone().unwrap_or_default(),
            venue: H2HAggregate::empty(),
        };
    }
    H2HSummary {
        overall: compute_h2h(&record.matches, current_home, current_away, before, false),
        venue: compute_h2h(&record.matches, current_home, current_away, before, true),
    }
}

//! Difficulty profiles and the engine options they translate to
//!
//! A [`DifficultyProfile`] is plain value data. It is clamped, never
//! rejected, when configuration is derived from it, and it is copied into
//! each move request rather than mutated.
//!
//! # Profile → engine
//!
//! | Profile field | Goes to                         |
//! |---------------|---------------------------------|
//! | `skill`       | `setoption Skill Level`         |
//! | `depth`       | `setoption Depth Limit` + `go depth` |
//! | `threads`     | `setoption Threads`             |
//! | `multi_pv`    | `setoption MultiPV`             |
//! | `time_ms`     | `go movetime`                   |
//! | `kids_mode`   | hints only (threats, candidates)|
//!
//! # Preset ladder
//!
//! | Id       | Skill | Depth | Time   | MultiPV | Kids |
//! |----------|-------|-------|--------|---------|------|
//! | `pawn`   | 0     | 1     | 300ms  | 3       | yes  |
//! | `knight` | 2     | 2     | 400ms  | 3       | yes  |
//! | `bishop` | 5     | 4     | 600ms  | 2       | yes  |
//! | `rook`   | 8     | 6     | 800ms  | 1       | no   |
//! | `queen`  | 13    | 10    | 1200ms | 1       | no   |
//! | `king`   | 20    | 18    | 2000ms | 1       | no   |

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::protocol::SearchConstraints;

pub const SKILL_RANGE: (i32, i32) = (0, 20);
pub const DEPTH_RANGE: (u32, u32) = (1, 20);
pub const MULTI_PV_RANGE: (u32, u32) = (1, 5);
/// Shortest think time handed to the engine
pub const MIN_TIME_MS: u64 = 50;

pub const OPT_SKILL_LEVEL: &str = "Skill Level";
pub const OPT_DEPTH_LIMIT: &str = "Depth Limit";
pub const OPT_THREADS: &str = "Threads";
pub const OPT_MULTI_PV: &str = "MultiPV";

/// How strong the computer plays and which hints accompany its moves
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DifficultyProfile {
    pub id: String,
    pub skill: i32,
    pub depth: u32,
    pub time_ms: u64,
    pub multi_pv: u32,
    pub threads: u32,
    pub kids_mode: bool,
}

impl Default for DifficultyProfile {
    fn default() -> Self {
        Self::presets().remove(0)
    }
}

fn preset_row(
    id: &str,
    skill: i32,
    depth: u32,
    time_ms: u64,
    multi_pv: u32,
    kids: bool,
) -> DifficultyProfile {
    DifficultyProfile {
        id: id.to_string(),
        skill,
        depth,
        time_ms,
        multi_pv,
        threads: 1,
        kids_mode: kids,
    }
}

impl DifficultyProfile {
    /// The built-in ladder, weakest first
    pub fn presets() -> Vec<DifficultyProfile> {
        vec![
            preset_row("pawn", 0, 1, 300, 3, true),
            preset_row("knight", 2, 2, 400, 3, true),
            preset_row("bishop", 5, 4, 600, 2, true),
            preset_row("rook", 8, 6, 800, 1, false),
            preset_row("queen", 13, 10, 1200, 1, false),
            preset_row("king", 20, 18, 2000, 1, false),
        ]
    }

    /// Look up a built-in profile by id (case-insensitive)
    pub fn preset(id: &str) -> Option<DifficultyProfile> {
        Self::presets()
            .into_iter()
            .find(|p| p.id.eq_ignore_ascii_case(id.trim()))
    }

    /// Copy with every field pulled into its documented range
    pub fn clamped(&self) -> DifficultyProfile {
        DifficultyProfile {
            id: self.id.clone(),
            skill: self.skill.clamp(SKILL_RANGE.0, SKILL_RANGE.1),
            depth: self.depth.clamp(DEPTH_RANGE.0, DEPTH_RANGE.1),
            time_ms: self.time_ms.max(MIN_TIME_MS),
            multi_pv: self.multi_pv.clamp(MULTI_PV_RANGE.0, MULTI_PV_RANGE.1),
            threads: self.threads.max(1),
            kids_mode: self.kids_mode,
        }
    }

    /// Per-move search limits derived from the clamped profile
    pub fn constraints(&self) -> SearchConstraints {
        let p = self.clamped();
        SearchConstraints::bounded(p.depth, Duration::from_millis(p.time_ms), p.multi_pv)
    }
}

/// Engine options for a profile, in the order they must be sent
///
/// Deterministic: the same profile always yields the same list, so it is
/// safe to apply before every move.
pub fn build_options(profile: &DifficultyProfile) -> Vec<(String, String)> {
    let p = profile.clamped();
    vec![
        (OPT_SKILL_LEVEL.to_string(), p.skill.to_string()),
        (OPT_DEPTH_LIMIT.to_string(), p.depth.to_string()),
        (OPT_THREADS.to_string(), p.threads.to_string()),
        (OPT_MULTI_PV.to_string(), p.multi_pv.to_string()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wild() -> DifficultyProfile {
        DifficultyProfile {
            id: "wild".to_string(),
            skill: 99,
            depth: 0,
            time_ms: 0,
            multi_pv: 12,
            threads: 0,
            kids_mode: true,
        }
    }

    #[test]
    fn test_out_of_range_values_are_clamped() {
        let p = wild().clamped();
        assert_eq!(p.skill, 20);
        assert_eq!(p.depth, 1);
        assert_eq!(p.time_ms, MIN_TIME_MS);
        assert_eq!(p.multi_pv, 5);
        assert_eq!(p.threads, 1);

        let low = DifficultyProfile {
            skill: -4,
            ..wild()
        }
        .clamped();
        assert_eq!(low.skill, 0);
    }

    #[test]
    fn test_build_options_order_and_values() {
        let options = build_options(&DifficultyProfile::preset("bishop").unwrap());
        let names: Vec<&str> = options.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["Skill Level", "Depth Limit", "Threads", "MultiPV"]);
        assert_eq!(options[0].1, "5");
        assert_eq!(options[3].1, "2");
    }

    #[test]
    fn test_build_options_is_deterministic() {
        let profile = wild();
        assert_eq!(build_options(&profile), build_options(&profile));
    }

    #[test]
    fn test_time_and_depth_become_constraints_not_options() {
        let profile = DifficultyProfile::preset("pawn").unwrap();
        let constraints = profile.constraints();
        assert_eq!(constraints.depth(), Some(1));
        assert_eq!(constraints.movetime(), Some(Duration::from_millis(300)));
        assert_eq!(constraints.multi_pv(), 3);
        assert!(build_options(&profile)
            .iter()
            .all(|(name, _)| !name.to_lowercase().contains("time")));
    }

    #[test]
    fn test_presets_ordered_by_strength() {
        let presets = DifficultyProfile::presets();
        assert!(presets.windows(2).all(|w| w[0].skill < w[1].skill));
        assert!(presets.iter().all(|p| p.clamped() == *p));
    }

    #[test]
    fn test_preset_lookup_is_case_insensitive() {
        assert_eq!(DifficultyProfile::preset(" Knight ").unwrap().id, "knight");
        assert!(DifficultyProfile::preset("dragon").is_none());
        assert_eq!(DifficultyProfile::default().id, "pawn");
    }
}

//! Letter grades for subject totals and term percentages.
//!
//! The scale is a table of bands, each an inclusive lower bound with a letter and
//! remark. Bands are ordered from the highest bound down and the last band starts
//! at 0, so every non-negative score falls in exactly one band. Workspaces start
//! from [`GradingScale::default`] and may store their own table under
//! [`SCALE_SETTINGS_KEY`].

use crate::db;
use crate::error::{ResultsError, ResultsResult};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use serde_json::json;

pub const SCALE_SETTINGS_KEY: &str = "grading.scale";

const DEFAULT_BANDS: [(f64, &str, &str); 6] = [
    (70.0, "A", "Excellent"),
    (60.0, "B", "Very Good"),
    (50.0, "C", "Good"),
    (45.0, "D", "Fair"),
    (40.0, "E", "Poor"),
    (0.0, "F", "Fail"),
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeBand {
    pub min_score: f64,
    pub letter: String,
    pub remark: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grade {
    pub letter: String,
    pub remark: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradingScale {
    bands: Vec<GradeBand>,
}

impl Default for GradingScale {
    fn default() -> Self {
        Self {
            bands: DEFAULT_BANDS
                .iter()
                .map(|(min, letter, remark)| GradeBand {
                    min_score: *min,
                    letter: letter.to_string(),
                    remark: remark.to_string(),
                })
                .collect(),
        }
    }
}

impl GradingScale {
    pub fn new(bands: Vec<GradeBand>) -> ResultsResult<Self> {
        if bands.is_empty() {
            return Err(ResultsError::validation("grading scale needs at least one band"));
        }
        for (i, band) in bands.iter().enumerate() {
            if !band.min_score.is_finite() || !(0.0..=100.0).contains(&band.min_score) {
                return Err(ResultsError::validation_with(
                    "band minScore must be between 0 and 100",
                    json!({ "index": i, "minScore": band.min_score }),
                ));
            }
            if band.letter.trim().is_empty() {
                return Err(ResultsError::validation_with(
                    "band letter must not be empty",
                    json!({ "index": i }),
                ));
            }
            if i > 0 && band.min_score >= bands[i - 1].min_score {
                return Err(ResultsError::validation_with(
                    "band minScore values must be strictly descending",
                    json!({ "index": i, "minScore": band.min_score }),
                ));
            }
        }
        if bands.last().map(|b| b.min_score) != Some(0.0) {
            return Err(ResultsError::validation(
                "the last band must start at 0 so every score is graded",
            ));
        }
        Ok(Self {
            bands: bands
                .into_iter()
                .map(|b| GradeBand {
                    min_score: b.min_score,
                    letter: b.letter.trim().to_string(),
                    remark: b.remark.trim().to_string(),
                })
                .collect(),
        })
    }

    pub fn bands(&self) -> &[GradeBand] {
        &self.bands
    }

    pub fn grade(&self, score: f64) -> Grade {
        let band = self
            .bands
            .iter()
            .find(|b| score >= b.min_score)
            .or_else(|| self.bands.last());
        match band {
            Some(b) => Grade {
                letter: b.letter.clone(),
                remark: b.remark.clone(),
            },
            None => Grade {
                letter: String::new(),
                remark: String::new(),
            },
        }
    }
}

/// The workspace scale, falling back to the default when none (or an unreadable one)
/// is stored.
pub fn load_scale(conn: &Connection) -> ResultsResult<GradingScale> {
    let Some(raw) = db::settings_get_json(conn, SCALE_SETTINGS_KEY)? else {
        return Ok(GradingScale::default());
    };
    let parsed = serde_json::from_value::<Vec<GradeBand>>(raw)
        .map_err(|e| e.to_string())
        .and_then(|bands| GradingScale::new(bands).map_err(|e| e.to_string()));
    match parsed {
        Ok(scale) => Ok(scale),
        Err(e) => {
            tracing::warn!(error = %e, "stored grading scale is invalid; using default");
            Ok(GradingScale::default())
        }
    }
}

pub fn save_scale(conn: &Connection, scale: &GradingScale) -> ResultsResult<()> {
    db::settings_set_json(conn, SCALE_SETTINGS_KEY, &json!(scale.bands()))?;
    tracing::info!(bands = scale.bands().len(), "grading scale updated");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn letter(scale: &GradingScale, score: f64) -> String {
        scale.grade(score).letter
    }

    #[test]
    fn default_boundaries_are_inclusive_lower_bounds() {
        let s = GradingScale::default();
        assert_eq!(letter(&s, 100.0), "A");
        assert_eq!(letter(&s, 70.0), "A");
        assert_eq!(letter(&s, 69.0), "B");
        assert_eq!(letter(&s, 69.99), "B");
        assert_eq!(letter(&s, 60.0), "B");
        assert_eq!(letter(&s, 59.0), "C");
        assert_eq!(letter(&s, 50.0), "C");
        assert_eq!(letter(&s, 49.0), "D");
        assert_eq!(letter(&s, 45.0), "D");
        assert_eq!(letter(&s, 44.0), "E");
        assert_eq!(letter(&s, 40.0), "E");
        assert_eq!(letter(&s, 39.0), "F");
        assert_eq!(letter(&s, 0.0), "F");
        assert_eq!(s.grade(70.0).remark, "Excellent");
        assert_eq!(s.grade(39.0).remark, "Fail");
    }

    #[test]
    fn rejects_unsorted_or_open_ended_scales() {
        let band = |min: f64, letter: &str| GradeBand {
            min_score: min,
            letter: letter.to_string(),
            remark: String::new(),
        };
        assert!(GradingScale::new(vec![]).is_err());
        assert!(GradingScale::new(vec![band(50.0, "P"), band(60.0, "Q"), band(0.0, "F")]).is_err());
        assert!(GradingScale::new(vec![band(50.0, "P"), band(10.0, "F")]).is_err());
        assert!(GradingScale::new(vec![band(50.0, " "), band(0.0, "F")]).is_err());
        let ok = GradingScale::new(vec![band(50.0, "Pass"), band(0.0, "Fail")]).unwrap();
        assert_eq!(letter(&ok, 50.0), "Pass");
        assert_eq!(letter(&ok, 49.5), "Fail");
    }

    #[test]
    fn stored_scale_replaces_default_and_bad_json_falls_back() {
        let conn = db::open_in_memory();
        assert_eq!(load_scale(&conn).unwrap(), GradingScale::default());

        let custom = GradingScale::new(vec![
            GradeBand {
                min_score: 75.0,
                letter: "A1".into(),
                remark: "Distinction".into(),
            },
            GradeBand {
                min_score: 0.0,
                letter: "F9".into(),
                remark: "Fail".into(),
            },
        ])
        .unwrap();
        save_scale(&conn, &custom).unwrap();
        assert_eq!(load_scale(&conn).unwrap(), custom);

        db::settings_set_json(&conn, SCALE_SETTINGS_KEY, &json!({ "nope": true })).unwrap();
        assert_eq!(load_scale(&conn).unwrap(), GradingScale::default());
    }
}

/// Winner selection among visually overlapping templates
///
/// Template sets are not exclusive in pixel space: "I" is contained in "II"
/// and "III", and "II" in "III", so shorter symbols score high against longer
/// ones. Two thresholds decide:
///
/// - superset lead: members of the containment chain are tried shortest
///   first, and each only wins when it leads every member still in play by
///   more than `superset_lead`; otherwise it drops out
/// - confidence gap: the best remaining member must lead the remaining
///   runner-up by at least `min_confidence_gap`, otherwise the region is
///   ambiguous
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DisambiguationPolicy {
    pub min_confidence_gap: f64,
    pub superset_lead: f64,
}

impl Default for DisambiguationPolicy {
    fn default() -> Self {
        Self {
            min_confidence_gap: 0.02,
            superset_lead: 0.05,
        }
    }
}

/// Outcome of scoring every template of a set against one region
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Verdict {
    Winner(usize),
    /// Best candidate did not lead the runner-up by the required gap
    Ambiguous { best: usize, runner_up: usize },
    BelowThreshold,
}

impl DisambiguationPolicy {
    /// Pick a winner from per-template `scores`.
    ///
    /// `containment` lists the contained members shortest first; an empty
    /// slice means the set has no overlap rule.
    pub fn decide(&self, scores: &[f64], containment: &[usize], threshold: f64) -> Verdict {
        let mut dropped = vec![false; scores.len()];

        for &member in containment.iter().filter(|&&i| i < scores.len()) {
            if dropped[member] {
                continue;
            }
            // last member in play competes on the plain gap rule
            let Some((_, rival)) = best_remaining(scores, &dropped, Some(member)) else {
                break;
            };
            let lead = scores[member] - rival;
            if scores[member] >= threshold
                && lead > self.superset_lead
                && lead >= self.min_confidence_gap
            {
                return Verdict::Winner(member);
            }
            dropped[member] = true;
        }

        let Some((best, best_score)) = best_remaining(scores, &dropped, None) else {
            return Verdict::BelowThreshold;
        };
        if best_score < threshold {
            return Verdict::BelowThreshold;
        }

        match best_remaining(scores, &dropped, Some(best)) {
            Some((runner, runner_score)) if best_score - runner_score < self.min_confidence_gap => {
                Verdict::Ambiguous {
                    best,
                    runner_up: runner,
                }
            }
            _ => Verdict::Winner(best),
        }
    }
}

/// Highest score (first index on ties) among members not dropped, skipping `skip`
fn best_remaining(scores: &[f64], dropped: &[bool], skip: Option<usize>) -> Option<(usize, f64)> {
    scores
        .iter()
        .enumerate()
        .filter(|&(i, _)| !dropped[i] && Some(i) != skip)
        .fold(None, |acc: Option<(usize, f64)>, (i, &v)| match acc {
            Some((_, w)) if w >= v => acc,
            _ => Some((i, v)),
        })
}

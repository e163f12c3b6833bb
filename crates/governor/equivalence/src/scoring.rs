//! Output comparison and score bucketing.

use std::time::Duration;

use maple_governor_types::EquivalenceLevel;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::EquivalenceConfig;

/// How a candidate's output is compared with the expectation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationType {
    /// Equal or not.
    Exact,
    /// Partial credit by shape: maps, sequences, text, numbers.
    #[default]
    Structural,
    /// Scored on response time against the case's bound.
    Performance,
}

/// 1.0 for equal values, 0.0 otherwise.
pub fn score_exact(expected: &Value, actual: &Value) -> f64 {
    if expected == actual {
        1.0
    } else {
        0.0
    }
}

/// Partial-credit comparison.
///
/// Maps score the fraction of expected keys present with equal values;
/// sequences of equal length score the fraction of equal positions (a length
/// mismatch scores 0); text uses normalized edit similarity; numbers score
/// by relative difference. Anything else is 0 unless equal.
pub fn score_structural(expected: &Value, actual: &Value) -> f64 {
    if expected == actual {
        return 1.0;
    }

    match (expected, actual) {
        (Value::Object(exp), Value::Object(act)) => {
            if exp.is_empty() {
                return 1.0;
            }
            let matched = exp
                .iter()
                .filter(|(k, v)| act.get(k.as_str()) == Some(*v))
                .count();
            matched as f64 / exp.len() as f64
        }
        (Value::Array(exp), Value::Array(act)) => {
            if exp.len() != act.len() {
                return 0.0;
            }
            let matched = exp.iter().zip(act).filter(|(e, a)| e == a).count();
            matched as f64 / exp.len() as f64
        }
        (Value::String(exp), Value::String(act)) => text_similarity(exp, act),
        (Value::Number(exp), Value::Number(act)) => match (exp.as_f64(), act.as_f64()) {
            (Some(e), Some(a)) => number_similarity(e, a),
            _ => 0.0,
        },
        _ => 0.0,
    }
}

/// 1.0 within the bound, then linear decay to 0.0 at twice the bound.
pub fn score_performance(elapsed: Duration, max_response_time: Duration) -> f64 {
    if elapsed <= max_response_time {
        return 1.0;
    }
    let max = max_response_time.as_secs_f64();
    if max <= 0.0 {
        return 0.0;
    }
    let over = elapsed.as_secs_f64() - max;
    (1.0 - over / max).max(0.0)
}

/// Normalized Levenshtein similarity after case folding and whitespace
/// collapsing. Two empty strings are identical.
pub fn text_similarity(a: &str, b: &str) -> f64 {
    let a = normalize(a);
    let b = normalize(b);
    if a == b {
        return 1.0;
    }

    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let longest = a.len().max(b.len());
    if longest == 0 {
        return 1.0;
    }

    1.0 - levenshtein(&a, &b) as f64 / longest as f64
}

fn normalize(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn levenshtein(a: &[char], b: &[char]) -> usize {
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

fn number_similarity(expected: f64, actual: f64) -> f64 {
    let scale = expected.abs().max(actual.abs());
    if scale == 0.0 {
        return 1.0;
    }
    (1.0 - (expected - actual).abs() / scale).clamp(0.0, 1.0)
}

/// Map a score onto its bucket. Thresholds are inclusive lower bounds.
pub fn bucket(score: f64, config: &EquivalenceConfig) -> EquivalenceLevel {
    if score >= config.exact_threshold {
        EquivalenceLevel::Exact
    } else if score >= config.high_threshold {
        EquivalenceLevel::High
    } else if score >= config.medium_threshold {
        EquivalenceLevel::Medium
    } else if score >= config.low_threshold {
        EquivalenceLevel::Low
    } else {
        EquivalenceLevel::Insufficient
    }
}

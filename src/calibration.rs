use crate::pipeline::AugmentedMatch;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Metrics {
    pub samples: usize,
    pub brier: f64,
    pub log_loss: f64,
    pub accuracy: f64,
}

impl Metrics {
    fn empty() -> Self {
        Self {
            samples: 0,
            brier: 0.0,
            log_loss: 0.0,
            accuracy: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationBin {
    pub bucket_start: f64,
    pub bucket_end: f64,
    pub count: usize,
    pub avg_pred: f64,
    pub actual_rate: f64,
}

/// `(probability, won)` pairs from the pre-match Elo of every match, seen
/// from both sides, skipping the first `warmup` matches.
pub fn elo_baseline(matches: &[AugmentedMatch], warmup: usize) -> (Vec<f64>, Vec<bool>) {
    let mut preds = Vec::with_capacity(matches.len().saturating_sub(warmup) * 2);
    let mut outcomes = Vec::with_capacity(preds.capacity());
    for m in matches.iter().skip(warmup) {
        let p = m.pre.winner_expected();
        preds.push(p);
        outcomes.push(true);
        preds.push(1.0 - p);
        outcomes.push(false);
    }
    (preds, outcomes)
}

pub fn evaluate_probs(predictions: &[f64], outcomes: &[bool]) -> Metrics {
    if predictions.is_empty() || predictions.len() != outcomes.len() {
        return Metrics::empty();
    }

    let mut brier_sum = 0.0_f64;
    let mut log_loss_sum = 0.0_f64;
    let mut correct = 0usize;

    for (p, won) in predictions.iter().zip(outcomes) {
        let p = p.clamp(0.0, 1.0);
        let y = if *won { 1.0 } else { 0.0 };
        brier_sum += (p - y).powi(2);

        let actual_prob = if *won { p } else { 1.0 - p }.clamp(1e-12, 1.0);
        log_loss_sum += -actual_prob.ln();

        // a coin flip counts as a miss
        if (p > 0.5 && *won) || (p < 0.5 && !*won) {
            correct += 1;
        }
    }

    let n = predictions.len() as f64;
    Metrics {
        samples: predictions.len(),
        brier: brier_sum / n,
        log_loss: log_loss_sum / n,
        accuracy: correct as f64 / n,
    }
}

pub fn apply_logit_scale(prob: f64, logit_scale: f64) -> f64 {
    let s = logit_scale.clamp(0.50, 1.80);
    let p = prob.clamp(1e-9, 1.0 - 1e-9);
    let logit = (p / (1.0 - p)).ln() * s;
    1.0 / (1.0 + (-logit).exp())
}

/// Grid search for the logit temperature minimizing log loss.
pub fn fit_logit_scale(predictions: &[f64], outcomes: &[bool]) -> (f64, Metrics) {
    if predictions.is_empty() || predictions.len() != outcomes.len() {
        return (1.0, Metrics::empty());
    }

    let mut best_scale = 1.0;
    let mut best_metrics = evaluate_probs(predictions, outcomes);

    for scale_step in 35..=65 {
        let scale = scale_step as f64 / 50.0; // 0.70..1.30
        let calibrated: Vec<f64> = predictions
            .iter()
            .map(|p| apply_logit_scale(*p, scale))
            .collect();
        let metrics = evaluate_probs(&calibrated, outcomes);
        if metrics.log_loss < best_metrics.log_loss {
            best_metrics = metrics;
            best_scale = scale;
        }
    }

    (best_scale, best_metrics)
}

pub fn calibration_bins(predictions: &[f64], outcomes: &[bool], bins: usize) -> Vec<CalibrationBin> {
    let bins = bins.max(2);
    let mut counts = vec![0usize; bins];
    let mut pred_sum = vec![0.0_f64; bins];
    let mut actual_sum = vec![0.0_f64; bins];

    for (p, won) in predictions.iter().zip(outcomes) {
        let p = p.clamp(0.0, 1.0);
        let idx = ((p * bins as f64).floor() as usize).min(bins - 1);
        counts[idx] += 1;
        pred_sum[idx] += p;
        if *won {
            actual_sum[idx] += 1.0;
        }
    }

    let mut out = Vec::with_capacity(bins);
    for i in 0..bins {
        let start = i as f64 / bins as f64;
        let end = (i + 1) as f64 / bins as f64;
        let count = counts[i];
        let (avg_pred, actual_rate) = if count > 0 {
            (pred_sum[i] / count as f64, actual_sum[i] / count as f64)
        } else {
            (0.0, 0.0)
        };
        out.push(CalibrationBin {
            bucket_start: start,
            bucket_end: end,
            count,
            avg_pred,
            actual_rate,
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perfect_predictions_have_zero_brier() {
        let m = evaluate_probs(&[1.0, 0.0, 1.0], &[true, false, true]);
        assert_eq!(m.samples, 3);
        assert!(m.brier < 1e-12);
        assert_eq!(m.accuracy, 1.0);
    }

    #[test]
    fn coin_flip_has_quarter_brier() {
        let m = evaluate_probs(&[0.5, 0.5], &[true, false]);
        assert!((m.brier - 0.25).abs() < 1e-12);
        assert!((m.log_loss - std::f64::consts::LN_2).abs() < 1e-12);
        assert_eq!(m.accuracy, 0.0);
    }

    #[test]
    fn unit_scale_is_identity() {
        assert!((apply_logit_scale(0.73, 1.0) - 0.73).abs() < 1e-9);
    }

    #[test]
    fn bins_cover_unit_interval() {
        let bins = calibration_bins(&[0.05, 0.95, 0.95], &[false, true, false], 10);
        assert_eq!(bins.len(), 10);
        assert_eq!(bins[0].count, 1);
        assert_eq!(bins[9].count, 2);
        assert!((bins[9].actual_rate - 0.5).abs() < 1e-12);
    }
}

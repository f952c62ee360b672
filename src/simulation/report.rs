//! Read-only aggregation over the target record set.

use serde::{Deserialize, Serialize};

use crate::store::{Intent, TargetRecord, TargetStatus};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentBreakdown {
    pub worried_curious: usize,
    pub unbothered_dismissive: usize,
}

/// Simulation statistics.
///
/// `pending + responded + max_retries_reached == total_targets` always holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub total_targets: usize,
    pub responded: usize,
    pub max_retries_reached: usize,
    pub pending: usize,
    pub intent_breakdown: IntentBreakdown,
    /// Share of targets that responded, e.g. `"33.3%"`; `"0%"` with no targets.
    pub response_rate: String,
}

impl Report {
    pub fn from_records<'a, I>(records: I) -> Self
    where
        I: IntoIterator<Item = &'a TargetRecord>,
    {
        let mut total_targets = 0;
        let mut responded = 0;
        let mut max_retries_reached = 0;
        let mut intent_breakdown = IntentBreakdown::default();

        for record in records {
            total_targets += 1;
            match record.status {
                TargetStatus::Responded => responded += 1,
                TargetStatus::MaxRetriesReached => max_retries_reached += 1,
                TargetStatus::InitialSent => {}
            }
            match record.intent {
                Some(Intent::WorriedCurious) => intent_breakdown.worried_curious += 1,
                Some(Intent::UnbotheredDismissive) => intent_breakdown.unbothered_dismissive += 1,
                None => {}
            }
        }

        Self {
            total_targets,
            responded,
            max_retries_reached,
            pending: total_targets.saturating_sub(responded + max_retries_reached),
            intent_breakdown,
            response_rate: format_rate(responded, total_targets),
        }
    }
}

fn format_rate(responded: usize, total: usize) -> String {
    if total == 0 {
        return "0%".to_string();
    }
    format!("{:.1}%", responded as f64 * 100.0 / total as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(email: &str, status: TargetStatus, intent: Option<Intent>) -> TargetRecord {
        let mut r = TargetRecord::new(email, "m", "t");
        r.status = status;
        r.intent = intent;
        r
    }

    #[test]
    fn empty_set_reports_zero_rate() {
        let report = Report::from_records(std::iter::empty::<&TargetRecord>());
        assert_eq!(report.total_targets, 0);
        assert_eq!(report.pending, 0);
        assert_eq!(report.response_rate, "0%");
    }

    #[test]
    fn counts_partition_the_target_set() {
        let records = vec![
            record("a@x.com", TargetStatus::Responded, Some(Intent::WorriedCurious)),
            record("b@x.com", TargetStatus::Responded, Some(Intent::UnbotheredDismissive)),
            record("c@x.com", TargetStatus::Responded, Some(Intent::WorriedCurious)),
            record("d@x.com", TargetStatus::MaxRetriesReached, None),
            record("e@x.com", TargetStatus::InitialSent, None),
            record("f@x.com", TargetStatus::InitialSent, None),
        ];
        let report = Report::from_records(&records);

        assert_eq!(report.total_targets, 6);
        assert_eq!(report.responded, 3);
        assert_eq!(report.max_retries_reached, 1);
        assert_eq!(report.pending, 2);
        assert_eq!(
            report.pending + report.responded + report.max_retries_reached,
            report.total_targets
        );
        assert_eq!(report.intent_breakdown.worried_curious, 2);
        assert_eq!(report.intent_breakdown.unbothered_dismissive, 1);
        assert_eq!(report.response_rate, "50.0%");
    }

    #[test]
    fn rate_has_one_decimal() {
        assert_eq!(format_rate(1, 3), "33.3%");
        assert_eq!(format_rate(2, 3), "66.7%");
        assert_eq!(format_rate(3, 3), "100.0%");
        assert_eq!(format_rate(0, 4), "0.0%");
    }
}

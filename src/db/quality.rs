//! The data-quality gate, as a pure decision over already-read aggregates.
//!
//! The repository reads `SnapshotStats` and delegates here, so the
//! thresholds are testable without a database. A failed gate is a
//! reporting outcome: nothing written earlier is rolled back.

use chrono::{DateTime, Duration, Utc};

use crate::db::models::SnapshotStats;
use crate::error::DataQualityError;

/// Fail when the latest snapshot covers fewer locations than expected,
/// when no curated observation exists at all, or when the newest
/// observation is older than `max_lag`.
pub fn evaluate(
    stats: &SnapshotStats,
    expected_locations: i64,
    max_lag: Duration,
    now: DateTime<Utc>,
) -> Result<(), DataQualityError> {
    // Even an empty location set must have produced something by now.
    let required = expected_locations.max(1);
    if stats.latest_rows < required {
        return Err(DataQualityError::RowCount {
            actual: stats.latest_rows,
            expected: required,
        });
    }

    let observed_at = stats
        .max_observed_at
        .ok_or(DataQualityError::NoObservations)?;

    let lag = now - observed_at;
    if lag > max_lag {
        return Err(DataQualityError::Stale {
            observed_at,
            lag_minutes: lag.num_minutes(),
            max_lag_minutes: max_lag.num_minutes(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn stats(latest_rows: i64, max_age_minutes: Option<i64>) -> SnapshotStats {
        SnapshotStats {
            latest_rows,
            max_observed_at: max_age_minutes.map(|m| now() - Duration::minutes(m)),
        }
    }

    #[test]
    fn passes_when_fresh_and_complete() {
        let result = evaluate(&stats(3, Some(60)), 3, Duration::minutes(180), now());
        assert_eq!(result, Ok(()));
    }

    #[test]
    fn passes_with_more_rows_than_expected() {
        let result = evaluate(&stats(5, Some(10)), 3, Duration::minutes(180), now());
        assert_eq!(result, Ok(()));
    }

    #[test]
    fn fails_on_missing_rows() {
        let result = evaluate(&stats(2, Some(60)), 3, Duration::minutes(180), now());
        assert_eq!(
            result,
            Err(DataQualityError::RowCount {
                actual: 2,
                expected: 3
            })
        );
    }

    #[test]
    fn expects_at_least_one_row_even_for_zero_locations() {
        let result = evaluate(&stats(0, None), 0, Duration::minutes(180), now());
        assert_eq!(
            result,
            Err(DataQualityError::RowCount {
                actual: 0,
                expected: 1
            })
        );
    }

    #[test]
    fn fails_when_no_observations_exist() {
        let result = evaluate(&stats(3, None), 3, Duration::minutes(180), now());
        assert_eq!(result, Err(DataQualityError::NoObservations));
    }

    #[test]
    fn fails_when_stale() {
        let result = evaluate(&stats(3, Some(181)), 3, Duration::minutes(180), now());
        match result {
            Err(DataQualityError::Stale {
                lag_minutes,
                max_lag_minutes,
                ..
            }) => {
                assert_eq!(lag_minutes, 181);
                assert_eq!(max_lag_minutes, 180);
            }
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn lag_exactly_at_threshold_passes() {
        let result = evaluate(&stats(3, Some(180)), 3, Duration::minutes(180), now());
        assert_eq!(result, Ok(()));
    }
}

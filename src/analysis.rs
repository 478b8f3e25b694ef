//! Analysis helpers for a Prosper account.

use crate::client::ProsperClient;
use crate::errors::{ProsperError, Result};
use crate::models::Payment;
use chrono::{Datelike, NaiveDate, NaiveDateTime};
use futures::future;
use futures::stream::{Stream, TryStreamExt};
use std::collections::HashMap;

/// Total successful payment amount keyed by the first day of the month.
pub type MonthlyTotals = HashMap<NaiveDate, f64>;

/// Width of the offset suffix the server appends to disbursement timestamps.
const OFFSET_SUFFIX_LEN: usize = 5;

/// ISO-8601 local timestamp layouts tried after the `T`-separated default.
const TIMESTAMP_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"];

/// Sums all payments received by the account, by month.
pub async fn total_payments_by_month(client: &ProsperClient) -> Result<MonthlyTotals> {
    let totals = sum_by_month(client.payments()).await?;
    tracing::info!("Aggregated payments into {} months", totals.len());
    Ok(totals)
}

/// Folds a payment stream into monthly totals, skipping unsuccessful payments.
///
/// The first error from the stream aborts the fold.
pub async fn sum_by_month<S>(payments: S) -> Result<MonthlyTotals>
where
    S: Stream<Item = Result<Payment>>,
{
    payments
        .try_fold(MonthlyTotals::new(), |mut totals, payment| {
            future::ready(add_payment(&mut totals, &payment).map(|()| totals))
        })
        .await
}

/// Adds one payment to `totals` if it succeeded.
pub fn add_payment(totals: &mut MonthlyTotals, payment: &Payment) -> Result<()> {
    if !payment.is_successful() {
        return Ok(());
    }

    let month = payment_month(payment)?;
    let amount = payment.payment_amount.ok_or_else(|| {
        ProsperError::MalformedRecord("successful payment has no payment_amount".to_string())
    })?;

    *totals.entry(month).or_insert(0.0) += amount;
    Ok(())
}

/// First day of the month the payment was disbursed in.
pub fn payment_month(payment: &Payment) -> Result<NaiveDate> {
    let raw = payment
        .investor_disbursement_date
        .as_deref()
        .ok_or_else(|| {
            ProsperError::MalformedRecord(
                "successful payment has no investor_disbursement_date".to_string(),
            )
        })?;

    let disbursed = parse_disbursement_date(raw)?;
    month_start(disbursed.date())
}

/// Parses a disbursement timestamp such as `2024-03-05T00:00:00.000+0000`.
///
/// The last five characters are the offset and are dropped unconditionally;
/// the rest is read as a local ISO-8601 timestamp or a bare date.
pub fn parse_disbursement_date(raw: &str) -> Result<NaiveDateTime> {
    let cut = raw
        .char_indices()
        .rev()
        .nth(OFFSET_SUFFIX_LEN - 1)
        .map(|(idx, _)| idx)
        .ok_or_else(|| {
            ProsperError::MalformedRecord(format!("disbursement date too short: {:?}", raw))
        })?;
    let local = &raw[..cut];

    if let Ok(timestamp) = local.parse::<NaiveDateTime>() {
        return Ok(timestamp);
    }
    if let Some(timestamp) = TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(local, format).ok())
    {
        return Ok(timestamp);
    }

    local
        .parse::<NaiveDate>()
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .ok_or_else(|| {
            ProsperError::MalformedRecord(format!("invalid disbursement date {:?}", raw))
        })
}

fn month_start(date: NaiveDate) -> Result<NaiveDate> {
    date.with_day(1).ok_or_else(|| {
        ProsperError::MalformedRecord(format!("no first day of month for {}", date))
    })
}

/// Monthly totals in chronological order.
pub fn sorted_by_month(totals: &MonthlyTotals) -> Vec<(NaiveDate, f64)> {
    let mut months: Vec<(NaiveDate, f64)> = totals.iter().map(|(m, t)| (*m, *t)).collect();
    months.sort_by_key(|(month, _)| *month);
    months
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use serde_json::Map;

    fn payment(status: &str, date: &str, amount: f64) -> Payment {
        Payment {
            payment_status: status.to_string(),
            investor_disbursement_date: Some(date.to_string()),
            payment_amount: Some(amount),
            fields: Map::new(),
        }
    }

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_parse_strips_offset_suffix() {
        let parsed = parse_disbursement_date("2024-03-05T13:45:00.000+0000").unwrap();
        assert_eq!(parsed.date(), ymd(2024, 3, 5));
        assert_eq!(parsed.format("%H:%M").to_string(), "13:45");
    }

    #[test]
    fn test_parse_accepts_space_separator() {
        for raw in ["2024-03-05 13:45:00+0000", "2024-03-05 13:45:00.000+0000"] {
            let parsed = parse_disbursement_date(raw).unwrap();
            assert_eq!(parsed.date(), ymd(2024, 3, 5));
            assert_eq!(parsed.format("%H:%M").to_string(), "13:45");
        }
    }

    #[test]
    fn test_parse_accepts_missing_seconds() {
        for raw in ["2024-03-05T13:45+0000", "2024-03-05 13:45+0000"] {
            let parsed = parse_disbursement_date(raw).unwrap();
            assert_eq!(parsed.date(), ymd(2024, 3, 5));
            assert_eq!(parsed.format("%H:%M:%S").to_string(), "13:45:00");
        }
    }

    #[tokio::test]
    async fn test_space_separated_success_counted() {
        let payments: Vec<Result<Payment>> = vec![
            Ok(payment("Success", "2024-03-05 13:45:00+0000", 40.0)),
            Ok(payment("Success", "2024-03-20T09:00:00.000+0000", 2.0)),
        ];

        let totals = sum_by_month(stream::iter(payments)).await.unwrap();
        assert_eq!(totals[&ymd(2024, 3, 1)], 42.0);
    }

    #[test]
    fn test_parse_accepts_bare_date() {
        // "2024-03-05" followed by a five character suffix
        let parsed = parse_disbursement_date("2024-03-05-0700").unwrap();
        assert_eq!(parsed.date(), ymd(2024, 3, 5));
    }

    #[test]
    fn test_parse_rejects_short_and_garbage() {
        assert!(matches!(
            parse_disbursement_date("+0000"),
            Err(ProsperError::MalformedRecord(_))
        ));
        assert!(matches!(
            parse_disbursement_date("abc"),
            Err(ProsperError::MalformedRecord(_))
        ));
        assert!(matches!(
            parse_disbursement_date("yesterday+0000"),
            Err(ProsperError::MalformedRecord(_))
        ));
    }

    #[test]
    fn test_first_and_last_day_share_month() {
        let first = payment("Success", "2024-02-01T00:00:00.000+0000", 1.0);
        let last = payment("Success", "2024-02-29T23:59:59.000+0000", 1.0);
        assert_eq!(payment_month(&first).unwrap(), ymd(2024, 2, 1));
        assert_eq!(payment_month(&last).unwrap(), ymd(2024, 2, 1));
    }

    #[test]
    fn test_unsuccessful_payment_ignored_even_if_malformed() {
        let mut totals = MonthlyTotals::new();
        let failed = Payment {
            payment_status: "Failed".to_string(),
            investor_disbursement_date: None,
            payment_amount: None,
            fields: Map::new(),
        };
        add_payment(&mut totals, &failed).unwrap();
        assert!(totals.is_empty());
    }

    #[test]
    fn test_successful_payment_without_amount_is_malformed() {
        let mut totals = MonthlyTotals::new();
        let mut p = payment("Success", "2024-03-01T00:00:00.000+0000", 0.0);
        p.payment_amount = None;
        assert!(matches!(
            add_payment(&mut totals, &p),
            Err(ProsperError::MalformedRecord(_))
        ));
    }

    #[tokio::test]
    async fn test_sum_by_month_example() {
        let payments: Vec<Result<Payment>> = vec![
            Ok(payment("Success", "2024-03-01T00:00:00.000+0000", 100.0)),
            Ok(payment("Failed", "2024-03-10T00:00:00.000+0000", 1000.0)),
            Ok(payment("Success", "2024-03-28T00:00:00.000+0000", 50.0)),
        ];

        let totals = sum_by_month(stream::iter(payments)).await.unwrap();

        assert_eq!(totals.len(), 1);
        assert_eq!(totals[&ymd(2024, 3, 1)], 150.0);
    }

    #[tokio::test]
    async fn test_months_without_success_absent() {
        let payments: Vec<Result<Payment>> = vec![
            Ok(payment("Success", "2024-01-15T00:00:00.000+0000", 10.0)),
            Ok(payment("Late", "2024-02-15T00:00:00.000+0000", 10.0)),
            Ok(payment("Success", "2024-03-15T00:00:00.000+0000", 5.0)),
        ];

        let totals = sum_by_month(stream::iter(payments)).await.unwrap();

        assert!(!totals.contains_key(&ymd(2024, 2, 1)));
        assert_eq!(
            sorted_by_month(&totals),
            vec![(ymd(2024, 1, 1), 10.0), (ymd(2024, 3, 1), 5.0)]
        );
    }

    #[tokio::test]
    async fn test_stream_error_aborts() {
        let payments: Vec<Result<Payment>> = vec![
            Ok(payment("Success", "2024-01-15T00:00:00.000+0000", 10.0)),
            Err(ProsperError::NotAuthenticated),
        ];

        let result = sum_by_month(stream::iter(payments)).await;
        assert!(matches!(result, Err(ProsperError::NotAuthenticated)));
    }
}

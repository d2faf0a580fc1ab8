use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::model::DateRange;

use super::EngineError;

/// Total cost of renting for every day in `[start, end]` at `rate` per day,
/// rounded to cents. Fails when `end` precedes `start`.
pub fn price(start: NaiveDate, end: NaiveDate, rate: Decimal) -> Result<Decimal, EngineError> {
    let range = DateRange::new(start, end);
    if !range.is_valid() {
        return Err(EngineError::InvalidDateRange(range));
    }
    let mut total = (Decimal::from(range.days()) * rate).round_dp(2);
    total.rescale(2);
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn three_days_at_fifty() {
        let total = price(d("2024-01-01"), d("2024-01-03"), dec!(50.0)).unwrap();
        assert_eq!(total, dec!(150.00));
        assert_eq!(total.to_string(), "150.00");
    }

    #[test]
    fn same_day_is_one_day() {
        let total = price(d("2024-01-01"), d("2024-01-01"), dec!(89.99)).unwrap();
        assert_eq!(total, dec!(89.99));
    }

    #[test]
    fn end_before_start_rejected() {
        let result = price(d("2024-01-03"), d("2024-01-01"), dec!(50.0));
        assert!(matches!(result, Err(EngineError::InvalidDateRange(_))));
    }

    #[test]
    fn linear_in_day_count() {
        let rate = dec!(74.99);
        let start = d("2024-03-01");
        for n in 0..40i64 {
            let end = start + chrono::Duration::days(n);
            let total = price(start, end, rate).unwrap();
            assert_eq!(total, Decimal::from(n + 1) * rate);
        }
    }

    #[test]
    fn spans_month_and_leap_day() {
        // 2024-02-27 ..= 2024-03-02 is 5 days in a leap year
        let total = price(d("2024-02-27"), d("2024-03-02"), dec!(129.99)).unwrap();
        assert_eq!(total, dec!(649.95));
    }

    #[test]
    fn rounds_to_cents() {
        let total = price(d("2024-01-01"), d("2024-01-03"), dec!(33.333)).unwrap();
        assert_eq!(total, dec!(100.00));
        assert_eq!(total.scale(), 2);
    }
}

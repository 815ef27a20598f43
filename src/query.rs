//! Filtering and sorting of income-statement records.
//!
//! Everything here is a pure function of `(records, query)`. The input slice is
//! never mutated, so the relay's query endpoint and the client can both re-run
//! a query against the full fetched set as often as the criteria change.

use crate::data_structures::IncomeStatementRecord;
use crate::error::QueryError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::str::FromStr;

/// Bounds a record must satisfy. `None` leaves that side unconstrained and
/// every bound is inclusive.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterCriteria {
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub min_revenue: Option<f64>,
    pub max_revenue: Option<f64>,
    pub min_net_income: Option<f64>,
    pub max_net_income: Option<f64>,
}

impl FilterCriteria {
    pub fn is_unconstrained(&self) -> bool {
        *self == Self::default()
    }

    pub fn matches(&self, record: &IncomeStatementRecord) -> bool {
        within(record.date, self.date_from, self.date_to)
            && within(record.revenue, self.min_revenue, self.max_revenue)
            && within(record.net_income, self.min_net_income, self.max_net_income)
    }
}

// NaN never satisfies a present bound
fn within<T: PartialOrd>(value: T, min: Option<T>, max: Option<T>) -> bool {
    min.is_none_or(|m| value >= m) && max.is_none_or(|m| value <= m)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortField {
    Date,
    Revenue,
    NetIncome,
}

impl SortField {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortField::Date => "date",
            SortField::Revenue => "revenue",
            SortField::NetIncome => "netIncome",
        }
    }

    fn compare(&self, a: &IncomeStatementRecord, b: &IncomeStatementRecord) -> Ordering {
        match self {
            SortField::Date => a.date.cmp(&b.date),
            SortField::Revenue => a.revenue.total_cmp(&b.revenue),
            SortField::NetIncome => a.net_income.total_cmp(&b.net_income),
        }
    }
}

impl FromStr for SortField {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "date" => Ok(SortField::Date),
            "revenue" => Ok(SortField::Revenue),
            "netIncome" | "net_income" => Ok(SortField::NetIncome),
            other => Err(QueryError::InvalidSortField(other.to_string())),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn from_ascending(ascending: bool) -> Self {
        if ascending {
            SortDirection::Ascending
        } else {
            SortDirection::Descending
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: SortField,
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn new(field: SortField, direction: SortDirection) -> Self {
        Self { field, direction }
    }

    /// Builds a spec from a raw field name, as received from a query string.
    pub fn parse(field: &str, ascending: bool) -> Result<Self, QueryError> {
        Ok(Self::new(field.parse()?, SortDirection::from_ascending(ascending)))
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct IncomeQuery {
    pub filter: FilterCriteria,
    pub sort: Option<SortSpec>,
}

pub fn filter_records(
    records: &[IncomeStatementRecord],
    criteria: &FilterCriteria,
) -> Vec<IncomeStatementRecord> {
    records
        .iter()
        .filter(|record| criteria.matches(record))
        .cloned()
        .collect()
}

/// Stable sort on a copy of `records`.
///
/// Descending reverses the comparator rather than the output, so records that
/// compare equal keep their original relative order in both directions.
pub fn sort_records(records: &[IncomeStatementRecord], spec: SortSpec) -> Vec<IncomeStatementRecord> {
    let mut sorted = records.to_vec();
    match spec.direction {
        SortDirection::Ascending => sorted.sort_by(|a, b| spec.field.compare(a, b)),
        SortDirection::Descending => sorted.sort_by(|a, b| spec.field.compare(b, a)),
    }
    sorted
}

/// Filter, then sort. Always starts from the full `records` set.
pub fn run_query(records: &[IncomeStatementRecord], query: &IncomeQuery) -> Vec<IncomeStatementRecord> {
    let filtered = filter_records(records, &query.filter);
    match query.sort {
        Some(spec) => sort_records(&filtered, spec),
        None => filtered,
    }
}

// --- Date bounds ---

#[derive(Clone, Copy, Debug)]
enum BoundSide {
    Lower,
    Upper,
}

/// Parses a date bound given either as `YYYY-MM-DD` or as a bare year.
/// A bare year widens to Jan 1 for a lower bound and Dec 31 for an upper one.
fn parse_date_bound(name: &'static str, raw: &str, side: BoundSide) -> Result<NaiveDate, QueryError> {
    let raw = raw.trim();
    let invalid = || QueryError::InvalidBound {
        name,
        value: raw.to_string(),
    };

    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(date);
    }

    if raw.len() != 4 || !raw.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }
    let year: i32 = raw.parse().map_err(|_| invalid())?;
    let date = match side {
        BoundSide::Lower => NaiveDate::from_ymd_opt(year, 1, 1),
        BoundSide::Upper => NaiveDate::from_ymd_opt(year, 12, 31),
    };
    date.ok_or_else(invalid)
}

/// Query parameters as they arrive over the wire, before validation.
///
/// Shared by the relay's query endpoint and the CLI so both tiers accept the
/// same shapes.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct RawIncomeQuery {
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    pub min_revenue: Option<f64>,
    pub max_revenue: Option<f64>,
    pub min_net_income: Option<f64>,
    pub max_net_income: Option<f64>,
    pub sort_field: Option<String>,
    pub ascending: Option<bool>,
}

impl RawIncomeQuery {
    pub fn into_query(self) -> Result<IncomeQuery, QueryError> {
        let date_from = self
            .date_from
            .as_deref()
            .map(|raw| parse_date_bound("date_from", raw, BoundSide::Lower))
            .transpose()?;
        let date_to = self
            .date_to
            .as_deref()
            .map(|raw| parse_date_bound("date_to", raw, BoundSide::Upper))
            .transpose()?;

        let sort = self
            .sort_field
            .as_deref()
            .map(|field| SortSpec::parse(field, self.ascending.unwrap_or(true)))
            .transpose()?;

        Ok(IncomeQuery {
            filter: FilterCriteria {
                date_from,
                date_to,
                min_revenue: self.min_revenue,
                max_revenue: self.max_revenue,
                min_net_income: self.min_net_income,
                max_net_income: self.max_net_income,
            },
            sort,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn record(year: i32, revenue: f64, net_income: f64) -> IncomeStatementRecord {
        IncomeStatementRecord::new("TEST", ymd(year, 12, 31), revenue, net_income, net_income / 10.0)
    }

    fn sample() -> Vec<IncomeStatementRecord> {
        vec![record(2021, 100.0, 10.0), record(2022, 200.0, -5.0), record(2023, 150.0, 20.0)]
    }

    fn years(records: &[IncomeStatementRecord]) -> Vec<i32> {
        use chrono::Datelike;
        records.iter().map(|r| r.date.year()).collect()
    }

    #[test]
    fn test_min_revenue_then_sort_desc() {
        let records = sample();
        let criteria = FilterCriteria {
            min_revenue: Some(120.0),
            ..Default::default()
        };

        let filtered = filter_records(&records, &criteria);
        assert_eq!(years(&filtered), vec![2022, 2023]);

        let sorted = sort_records(&filtered, SortSpec::new(SortField::Revenue, SortDirection::Descending));
        assert_eq!(years(&sorted), vec![2022, 2023]);
        assert_eq!(sorted[0].revenue, 200.0);
        assert_eq!(sorted[1].revenue, 150.0);
    }

    #[test]
    fn test_unconstrained_filter_is_identity() {
        let records = sample();
        let criteria = FilterCriteria::default();
        assert!(criteria.is_unconstrained());
        assert_eq!(filter_records(&records, &criteria), records);
    }

    #[test]
    fn test_filter_is_subset_and_satisfies_bounds() {
        let records = sample();
        let criteria = FilterCriteria {
            date_from: Some(ymd(2022, 1, 1)),
            date_to: Some(ymd(2023, 12, 31)),
            min_net_income: Some(0.0),
            ..Default::default()
        };

        let filtered = filter_records(&records, &criteria);
        assert_eq!(years(&filtered), vec![2023]);
        assert!(filtered.iter().all(|r| records.contains(r)));
        assert!(filtered.iter().all(|r| criteria.matches(r)));
    }

    #[test]
    fn test_filter_is_idempotent() {
        let records = sample();
        let criteria = FilterCriteria {
            min_revenue: Some(120.0),
            max_net_income: Some(15.0),
            ..Default::default()
        };
        let once = filter_records(&records, &criteria);
        let twice = filter_records(&once, &criteria);
        assert_eq!(once, twice);
        assert_eq!(years(&once), vec![2022]);
    }

    #[test]
    fn test_date_bounds_are_inclusive() {
        let records = sample();
        let criteria = FilterCriteria {
            date_from: Some(ymd(2021, 12, 31)),
            date_to: Some(ymd(2022, 12, 31)),
            ..Default::default()
        };
        assert_eq!(years(&filter_records(&records, &criteria)), vec![2021, 2022]);
    }

    #[test]
    fn test_out_of_range_bound_yields_empty() {
        let criteria = FilterCriteria {
            min_revenue: Some(1_000_000.0),
            ..Default::default()
        };
        assert!(filter_records(&sample(), &criteria).is_empty());
    }

    #[test]
    fn test_empty_input_yields_empty() {
        let query = IncomeQuery {
            filter: FilterCriteria {
                min_revenue: Some(1.0),
                ..Default::default()
            },
            sort: Some(SortSpec::new(SortField::Date, SortDirection::Descending)),
        };
        assert!(run_query(&[], &query).is_empty());
    }

    #[test]
    fn test_sort_does_not_touch_input() {
        let records = sample();
        let before = records.clone();
        let _ = sort_records(&records, SortSpec::new(SortField::NetIncome, SortDirection::Descending));
        assert_eq!(records, before);
    }

    #[test]
    fn test_sort_by_each_field() {
        let records = sample();
        let asc = |field| years(&sort_records(&records, SortSpec::new(field, SortDirection::Ascending)));

        assert_eq!(asc(SortField::Date), vec![2021, 2022, 2023]);
        assert_eq!(asc(SortField::Revenue), vec![2021, 2023, 2022]);
        assert_eq!(asc(SortField::NetIncome), vec![2022, 2021, 2023]);
    }

    #[test]
    fn test_ties_keep_original_order_in_both_directions() {
        let mut a = record(2020, 100.0, 1.0);
        a.symbol = "A".into();
        let mut b = record(2021, 100.0, 2.0);
        b.symbol = "B".into();
        let c = record(2022, 300.0, 3.0);
        let mut d = record(2019, 100.0, 4.0);
        d.symbol = "D".into();
        let records = vec![a, b, c, d];

        let asc = sort_records(&records, SortSpec::new(SortField::Revenue, SortDirection::Ascending));
        let desc = sort_records(&records, SortSpec::new(SortField::Revenue, SortDirection::Descending));

        let symbols = |rs: &[IncomeStatementRecord]| rs.iter().map(|r| r.symbol.clone()).collect::<Vec<_>>();
        assert_eq!(symbols(&asc), vec!["A", "B", "D", "TEST"]);
        assert_eq!(symbols(&desc), vec!["TEST", "A", "B", "D"]);
    }

    #[test]
    fn test_asc_is_reverse_of_desc_without_ties() {
        let records = sample();
        for field in [SortField::Date, SortField::Revenue, SortField::NetIncome] {
            let asc = sort_records(&records, SortSpec::new(field, SortDirection::Ascending));
            let mut desc = sort_records(&records, SortSpec::new(field, SortDirection::Descending));
            desc.reverse();
            assert_eq!(asc, desc, "field {}", field.as_str());
        }
    }

    #[test]
    fn test_invalid_sort_field() {
        assert_eq!(
            "foobar".parse::<SortField>(),
            Err(QueryError::InvalidSortField("foobar".to_string()))
        );
        assert_eq!("netIncome".parse::<SortField>(), Ok(SortField::NetIncome));
        assert!(SortSpec::parse("eps", true).is_err());
    }

    #[test]
    fn test_raw_query_accepts_years_and_dates() {
        let raw = RawIncomeQuery {
            date_from: Some("2021".into()),
            date_to: Some("2022-06-30".into()),
            sort_field: Some("revenue".into()),
            ascending: Some(false),
            ..Default::default()
        };
        let query = raw.into_query().unwrap();
        assert_eq!(query.filter.date_from, Some(ymd(2021, 1, 1)));
        assert_eq!(query.filter.date_to, Some(ymd(2022, 6, 30)));
        assert_eq!(query.sort, Some(SortSpec::new(SortField::Revenue, SortDirection::Descending)));

        let upper_year = RawIncomeQuery {
            date_to: Some("2022".into()),
            ..Default::default()
        };
        assert_eq!(upper_year.into_query().unwrap().filter.date_to, Some(ymd(2022, 12, 31)));
    }

    #[test]
    fn test_raw_query_rejects_bad_input() {
        let bad_date = RawIncomeQuery {
            date_from: Some("last year".into()),
            ..Default::default()
        };
        assert!(matches!(
            bad_date.into_query(),
            Err(QueryError::InvalidBound { name: "date_from", .. })
        ));

        let bad_sort = RawIncomeQuery {
            sort_field: Some("foobar".into()),
            ..Default::default()
        };
        assert_eq!(
            bad_sort.into_query(),
            Err(QueryError::InvalidSortField("foobar".into()))
        );
    }

    #[test]
    fn test_run_query_filters_before_sorting() {
        let query = IncomeQuery {
            filter: FilterCriteria {
                min_revenue: Some(120.0),
                ..Default::default()
            },
            sort: Some(SortSpec::new(SortField::Date, SortDirection::Descending)),
        };
        assert_eq!(years(&run_query(&sample(), &query)), vec![2023, 2022]);
    }
}

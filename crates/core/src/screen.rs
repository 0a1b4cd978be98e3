//! Dashboard filtering and sorting over snapshot rows.

use crate::domain::quote::StockQuote;
use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    #[default]
    UpsidePotential,
    NumAnalysts,
    ForwardPe,
    TrailingPe,
}

impl SortKey {
    pub const ALL: [SortKey; 4] = [
        SortKey::UpsidePotential,
        SortKey::NumAnalysts,
        SortKey::ForwardPe,
        SortKey::TrailingPe,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SortKey::UpsidePotential => "upside_potential",
            SortKey::NumAnalysts => "num_analysts",
            SortKey::ForwardPe => "forward_pe",
            SortKey::TrailingPe => "trailing_pe",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SortKey::UpsidePotential => "Upside",
            SortKey::NumAnalysts => "Analysts",
            SortKey::ForwardPe => "Forward P/E",
            SortKey::TrailingPe => "Trailing P/E",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(s))
    }

    /// Valuation ratios read best low-to-high; everything else high-to-low.
    pub fn ascending(self) -> bool {
        matches!(self, SortKey::ForwardPe | SortKey::TrailingPe)
    }

    fn value(self, q: &StockQuote) -> Option<f64> {
        match self {
            SortKey::UpsidePotential => Some(q.upside_potential),
            SortKey::NumAnalysts => Some(f64::from(q.num_analysts)),
            SortKey::ForwardPe => q.forward_pe,
            SortKey::TrailingPe => q.trailing_pe,
        }
    }
}

/// Query key the dashboard form always submits. With it present, a missing `sector` or
/// `rating` key means every box was cleared rather than "no filter".
pub const FORM_MARKER: &str = "filtered";

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScreenParams {
    /// `None` keeps every sector; an empty set keeps none.
    pub sectors: Option<BTreeSet<String>>,
    pub ratings: Option<BTreeSet<String>>,
    pub min_analysts: u32,
    pub min_upside: f64,
    pub min_dividend: f64,
    pub sort: SortKey,
}

impl ScreenParams {
    /// Builds params from decoded query-string pairs. `sector` and `rating` may repeat.
    pub fn from_pairs(pairs: &[(String, String)]) -> anyhow::Result<Self> {
        let mut out = Self::default();
        if pairs.iter().any(|(k, _)| k == FORM_MARKER) {
            out.sectors = Some(BTreeSet::new());
            out.ratings = Some(BTreeSet::new());
        }

        for (key, value) in pairs {
            match key.as_str() {
                "sector" => {
                    out.sectors
                        .get_or_insert_with(BTreeSet::new)
                        .insert(value.trim().to_string());
                }
                "rating" => {
                    out.ratings
                        .get_or_insert_with(BTreeSet::new)
                        .insert(value.trim().to_string());
                }
                "min_analysts" => {
                    out.min_analysts = parse_field(key, value)?.unwrap_or(0);
                }
                "min_upside" => {
                    out.min_upside = parse_float(key, value)?;
                }
                "min_dividend" => {
                    out.min_dividend = parse_float(key, value)?;
                }
                "sort" => {
                    out.sort = SortKey::parse(value)
                        .with_context(|| format!("unknown sort key {value:?}"))?;
                }
                _ => {}
            }
        }

        Ok(out)
    }

    pub fn matches(&self, q: &StockQuote) -> bool {
        q.num_analysts >= self.min_analysts
            && q.upside_potential >= self.min_upside
            && q.dividend_yield >= self.min_dividend
            && self.ratings.as_ref().map_or(true, |r| r.contains(&q.rating))
            && self.sectors.as_ref().map_or(true, |s| s.contains(&q.sector))
    }
}

fn parse_field<T: std::str::FromStr>(key: &str, value: &str) -> anyhow::Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    let v = value.trim();
    if v.is_empty() {
        return Ok(None);
    }
    v.parse::<T>()
        .map(Some)
        .map_err(|e| anyhow::anyhow!("invalid {key}={value:?}: {e}"))
}

fn parse_float(key: &str, value: &str) -> anyhow::Result<f64> {
    let v = parse_field::<f64>(key, value)?.unwrap_or(0.0);
    if !v.is_finite() {
        bail!("invalid {key}={value:?}: must be finite");
    }
    Ok(v)
}

/// Filters then sorts. Rows lacking the sort value go last in either direction.
pub fn apply(rows: &[StockQuote], params: &ScreenParams) -> Vec<StockQuote> {
    let mut out: Vec<StockQuote> = rows.iter().filter(|q| params.matches(q)).cloned().collect();

    let key = params.sort;
    out.sort_by(|a, b| compare(key.value(a), key.value(b), key.ascending()));
    out
}

fn compare(a: Option<f64>, b: Option<f64>, ascending: bool) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => {
            let ord = x.total_cmp(&y);
            if ascending {
                ord
            } else {
                ord.reverse()
            }
        }
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Choices offered by the filter widgets.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScreenOptions {
    pub sectors: Vec<String>,
    /// First-seen order.
    pub ratings: Vec<String>,
    pub max_analysts: u32,
}

impl ScreenOptions {
    pub fn from_rows(rows: &[StockQuote]) -> Self {
        let sectors: BTreeSet<String> = rows
            .iter()
            .map(|q| q.sector.trim())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();

        let mut ratings: Vec<String> = Vec::new();
        for q in rows {
            if !ratings.contains(&q.rating) {
                ratings.push(q.rating.clone());
            }
        }

        Self {
            sectors: sectors.into_iter().collect(),
            ratings,
            max_analysts: rows.iter().map(|q| q.num_analysts).max().unwrap_or(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(ticker: &str, sector: &str, rating: &str, analysts: u32, upside: f64) -> StockQuote {
        StockQuote {
            ticker: ticker.to_string(),
            price: 50.0,
            currency: "USD".to_string(),
            target_price: 50.0 * (1.0 + upside / 100.0),
            upside_potential: upside,
            num_analysts: analysts,
            strong_buy: 0,
            buy: 0,
            hold: 0,
            sell: 0,
            strong_sell: 0,
            rating: rating.to_string(),
            sector: sector.to_string(),
            trailing_pe: None,
            forward_pe: None,
            dividend_yield: 0.0,
        }
    }

    fn universe() -> Vec<StockQuote> {
        let mut a = row("AAA", "Technology", "buy", 30, 25.0);
        a.forward_pe = Some(28.0);
        a.trailing_pe = Some(35.0);
        a.dividend_yield = 0.5;
        let mut b = row("BBB", "Energy", "hold", 12, 4.0);
        b.forward_pe = Some(9.0);
        b.dividend_yield = 4.1;
        let mut c = row("CCC", "Energy", "strong_buy", 5, 60.0);
        c.trailing_pe = Some(11.0);
        let mut d = row("DDD", "Utilities", "underperform", 0, -8.0);
        d.forward_pe = Some(15.0);
        d.dividend_yield = 3.0;
        let e = row("EEE", "Technology", "buy", 18, 12.0);
        vec![a, b, c, d, e]
    }

    fn tickers(rows: &[StockQuote]) -> Vec<&str> {
        rows.iter().map(|q| q.ticker.as_str()).collect()
    }

    fn pairs(v: &[(&str, &str)]) -> Vec<(String, String)> {
        v.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn defaults_drop_negative_upside_and_sort_by_upside_desc() {
        let out = apply(&universe(), &ScreenParams::default());
        assert_eq!(tickers(&out), vec!["CCC", "AAA", "EEE", "BBB"]);
    }

    #[test]
    fn pe_sorts_ascending_with_missing_values_last() {
        let params = ScreenParams {
            min_upside: -100.0,
            sort: SortKey::ForwardPe,
            ..Default::default()
        };
        let out = apply(&universe(), &params);
        assert_eq!(tickers(&out), vec!["BBB", "DDD", "AAA", "CCC", "EEE"]);

        let params = ScreenParams {
            sort: SortKey::TrailingPe,
            ..params
        };
        let out = apply(&universe(), &params);
        assert_eq!(&tickers(&out)[..2], &["CCC", "AAA"]);
    }

    #[test]
    fn analysts_sort_descending() {
        let params = ScreenParams {
            sort: SortKey::NumAnalysts,
            ..Default::default()
        };
        let out = apply(&universe(), &params);
        assert_eq!(tickers(&out), vec!["AAA", "EEE", "BBB", "CCC"]);
    }

    #[test]
    fn raising_a_floor_never_grows_the_result() {
        let rows = universe();
        let mut prev = usize::MAX;
        for floor in [-50.0, -5.0, 0.0, 5.0, 12.0, 30.0, 100.0] {
            let n = apply(&rows, &ScreenParams { min_upside: floor, ..Default::default() }).len();
            assert!(n <= prev, "min_upside={floor} grew result to {n}");
            prev = n;
        }

        let mut prev = usize::MAX;
        for floor in [0, 1, 5, 13, 31] {
            let n = apply(&rows, &ScreenParams { min_analysts: floor, ..Default::default() }).len();
            assert!(n <= prev, "min_analysts={floor} grew result to {n}");
            prev = n;
        }

        let mut prev = usize::MAX;
        for floor in [0.0, 0.4, 1.0, 3.5, 5.0] {
            let params = ScreenParams {
                min_dividend: floor,
                min_upside: -100.0,
                ..Default::default()
            };
            let n = apply(&rows, &params).len();
            assert!(n <= prev, "min_dividend={floor} grew result to {n}");
            prev = n;
        }
    }

    #[test]
    fn sector_and_rating_sets_restrict_membership() {
        let params = ScreenParams {
            sectors: Some(["Energy".to_string()].into_iter().collect()),
            ratings: Some(["hold".to_string(), "buy".to_string()].into_iter().collect()),
            ..Default::default()
        };
        assert_eq!(tickers(&apply(&universe(), &params)), vec!["BBB"]);

        let none_selected = ScreenParams {
            sectors: Some(BTreeSet::new()),
            ..Default::default()
        };
        assert!(apply(&universe(), &none_selected).is_empty());
    }

    #[test]
    fn parses_query_pairs() {
        let p = ScreenParams::from_pairs(&pairs(&[
            ("sector", "Energy"),
            ("sector", "Utilities"),
            ("rating", "buy"),
            ("min_analysts", "3"),
            ("min_upside", "-2.5"),
            ("min_dividend", ""),
            ("sort", "forward_pe"),
            ("unrelated", "x"),
        ]))
        .unwrap();

        assert_eq!(p.sectors.unwrap().len(), 2);
        assert_eq!(p.ratings.unwrap().len(), 1);
        assert_eq!(p.min_analysts, 3);
        assert_eq!(p.min_upside, -2.5);
        assert_eq!(p.min_dividend, 0.0);
        assert_eq!(p.sort, SortKey::ForwardPe);
    }

    #[test]
    fn cleared_form_selects_nothing() {
        let cleared = ScreenParams::from_pairs(&pairs(&[
            ("filtered", "1"),
            ("min_analysts", "0"),
            ("min_upside", "0"),
            ("min_dividend", "0"),
            ("sort", "upside_potential"),
        ]))
        .unwrap();
        assert_eq!(cleared.sectors, Some(BTreeSet::new()));
        assert_eq!(cleared.ratings, Some(BTreeSet::new()));
        assert!(apply(&universe(), &cleared).is_empty());

        let partial = ScreenParams::from_pairs(&pairs(&[("filtered", "1"), ("sector", "Energy")]))
            .unwrap();
        assert_eq!(partial.sectors.map(|s| s.len()), Some(1));
        assert_eq!(partial.ratings, Some(BTreeSet::new()));

        let api = ScreenParams::from_pairs(&pairs(&[("min_upside", "0")])).unwrap();
        assert_eq!(api.sectors, None);
        assert_eq!(api.ratings, None);
    }

    #[test]
    fn nan_pe_values_do_not_break_sorting() {
        let mut rows = universe();
        rows[0].forward_pe = Some(f64::NAN);
        rows[2].forward_pe = Some(f64::NAN);
        let params = ScreenParams {
            min_upside: -100.0,
            sort: SortKey::ForwardPe,
            ..Default::default()
        };
        let out = apply(&rows, &params);
        assert_eq!(out.len(), rows.len());
        assert_eq!(&tickers(&out)[..2], &["BBB", "DDD"]);
        assert_eq!(tickers(&out).last(), Some(&"EEE"));
    }

    #[test]
    fn rejects_bad_numbers_and_sort_keys() {
        assert!(ScreenParams::from_pairs(&pairs(&[("min_upside", "lots")])).is_err());
        assert!(ScreenParams::from_pairs(&pairs(&[("min_upside", "inf")])).is_err());
        assert!(ScreenParams::from_pairs(&pairs(&[("min_analysts", "-1")])).is_err());
        assert!(ScreenParams::from_pairs(&pairs(&[("sort", "price")])).is_err());
    }

    #[test]
    fn options_list_sorted_sectors_and_first_seen_ratings() {
        let opts = ScreenOptions::from_rows(&universe());
        assert_eq!(opts.sectors, vec!["Energy", "Technology", "Utilities"]);
        assert_eq!(opts.ratings, vec!["buy", "hold", "strong_buy", "underperform"]);
        assert_eq!(opts.max_analysts, 30);
        assert_eq!(ScreenOptions::from_rows(&[]), ScreenOptions::default());
    }
}

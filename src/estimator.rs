//! Derives currency, exchange rate and a randomized GDP proxy for one directory record.

use ahash::AHashSet;
use chrono::{DateTime, Utc};
use meridian_schema::{RawCountry, RawRateTable};
use rand::Rng;
use std::{fmt, ops::RangeInclusive};
use tracing::warn;

use crate::db::{CountryCandidate, name_key};

/// Bounds of the GDP multiplier, inclusive on both ends.
pub const GDP_MULTIPLIER_RANGE: RangeInclusive<u32> = 1000..=2000;

/// Source of the per-record GDP multiplier.
pub trait MultiplierSource: Send + Sync {
    fn draw(&self) -> u32;
}

/// Uniform draw from [`GDP_MULTIPLIER_RANGE`] on every call.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRngMultiplier;

impl MultiplierSource for ThreadRngMultiplier {
    fn draw(&self) -> u32 {
        rand::rng().random_range(GDP_MULTIPLIER_RANGE)
    }
}

/// Always the same multiplier, clamped into [`GDP_MULTIPLIER_RANGE`].
#[derive(Debug, Clone, Copy)]
pub struct FixedMultiplier(pub u32);

impl MultiplierSource for FixedMultiplier {
    fn draw(&self) -> u32 {
        self.0
            .clamp(*GDP_MULTIPLIER_RANGE.start(), *GDP_MULTIPLIER_RANGE.end())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    MissingName,
    MissingPopulation,
    NonPositivePopulation,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Rejection::MissingName => "missing name",
            Rejection::MissingPopulation => "missing population",
            Rejection::NonPositivePopulation => "non-positive population",
        })
    }
}

/// Candidates kept from one source list, plus how many records were dropped.
#[derive(Debug, Clone)]
pub struct EstimatedBatch {
    pub candidates: Vec<CountryCandidate>,
    pub rejected: usize,
}

pub struct GdpEstimator {
    multiplier: Box<dyn MultiplierSource>,
}

impl Default for GdpEstimator {
    fn default() -> Self {
        Self::new(ThreadRngMultiplier)
    }
}

impl GdpEstimator {
    pub fn new(multiplier: impl MultiplierSource + 'static) -> Self {
        Self {
            multiplier: Box::new(multiplier),
        }
    }

    /// Estimates one record. `exchange_rate` and `estimated_gdp` are either both set or both
    /// absent.
    pub fn estimate(
        &self,
        raw: &RawCountry,
        rates: &RawRateTable,
        refreshed_at: DateTime<Utc>,
    ) -> Result<CountryCandidate, Rejection> {
        let name = raw
            .name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .ok_or(Rejection::MissingName)?;
        let population = raw.population.ok_or(Rejection::MissingPopulation)?;
        if population <= 0 {
            return Err(Rejection::NonPositivePopulation);
        }

        let currency_code = raw.first_currency_code().map(str::to_string);
        let (exchange_rate, estimated_gdp) = match currency_code
            .as_deref()
            .and_then(|code| rates.rate_for(code))
        {
            Some(rate) => {
                let multiplier = f64::from(self.multiplier.draw());
                #[allow(clippy::cast_precision_loss)]
                let gdp = population as f64 * multiplier / rate;
                (Some(rate), Some(gdp))
            }
            None => (None, None),
        };

        Ok(CountryCandidate {
            name: name.to_string(),
            capital: non_blank(raw.capital.as_deref()),
            region: non_blank(raw.region.as_deref()),
            population,
            currency_code,
            exchange_rate,
            estimated_gdp,
            flag_url: non_blank(raw.flag.as_deref()),
            last_refreshed_at: refreshed_at,
        })
    }

    /// Estimates a whole source list under one timestamp. Rejected records and later
    /// case-insensitive duplicates are dropped with a warning.
    pub fn estimate_batch(
        &self,
        raws: &[RawCountry],
        rates: &RawRateTable,
        refreshed_at: DateTime<Utc>,
    ) -> EstimatedBatch {
        let mut seen: AHashSet<String> = AHashSet::with_capacity(raws.len());
        let mut candidates = Vec::with_capacity(raws.len());
        let mut rejected = 0;

        for raw in raws {
            match self.estimate(raw, rates, refreshed_at) {
                Ok(candidate) => {
                    if seen.insert(name_key(&candidate.name)) {
                        candidates.push(candidate);
                    } else {
                        warn!(
                            name = %candidate.name,
                            "Skipping country: duplicate name in source batch"
                        );
                        rejected += 1;
                    }
                }
                Err(reason) => {
                    warn!(
                        name = raw.name.as_deref().unwrap_or("<none>"),
                        %reason,
                        "Skipping country due to missing required data"
                    );
                    rejected += 1;
                }
            }
        }

        EstimatedBatch {
            candidates,
            rejected,
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use meridian_schema::RawCurrency;
    use std::collections::HashMap;

    fn raw(name: Option<&str>, population: Option<i64>, code: Option<&str>) -> RawCountry {
        RawCountry {
            name: name.map(str::to_string),
            capital: Some("Capital".to_string()),
            region: Some("Region".to_string()),
            population,
            flag: Some("https://flags.test/x.svg".to_string()),
            currencies: code.map(|c| {
                vec![RawCurrency {
                    code: Some(c.to_string()),
                    name: None,
                    symbol: None,
                }]
            }),
        }
    }

    fn rates(pairs: &[(&str, f64)]) -> RawRateTable {
        RawRateTable {
            rates: pairs
                .iter()
                .map(|(k, v)| ((*k).to_string(), *v))
                .collect::<HashMap<_, _>>(),
            ..Default::default()
        }
    }

    #[test]
    fn testland_gdp_falls_in_multiplier_band() {
        let estimator = GdpEstimator::default();
        let table = rates(&[("TST", 10.0)]);
        let now = Utc::now();

        for _ in 0..200 {
            let c = estimator
                .estimate(&raw(Some("Testland"), Some(1000), Some("TST")), &table, now)
                .unwrap();
            assert_eq!(c.currency_code.as_deref(), Some("TST"));
            assert_eq!(c.exchange_rate, Some(10.0));
            let gdp = c.estimated_gdp.unwrap();
            assert!((100_000.0..=200_000.0).contains(&gdp), "gdp {gdp} out of band");
            assert_eq!(c.last_refreshed_at, now);
        }
    }

    #[test]
    fn fixed_multiplier_is_reproducible_and_clamped() {
        let table = rates(&[("TST", 4.0)]);
        let now = Utc::now();

        let c = GdpEstimator::new(FixedMultiplier(1500))
            .estimate(&raw(Some("Testland"), Some(10), Some("TST")), &table, now)
            .unwrap();
        assert_eq!(c.estimated_gdp, Some(3750.0));

        assert_eq!(FixedMultiplier(5).draw(), 1000);
        assert_eq!(FixedMultiplier(9000).draw(), 2000);
    }

    #[test]
    fn rejects_missing_name_and_bad_population() {
        let estimator = GdpEstimator::default();
        let table = rates(&[]);
        let now = Utc::now();

        assert_eq!(
            estimator.estimate(&raw(None, Some(5), None), &table, now),
            Err(Rejection::MissingName)
        );
        assert_eq!(
            estimator.estimate(&raw(Some("  "), Some(5), None), &table, now),
            Err(Rejection::MissingName)
        );
        assert_eq!(
            estimator.estimate(&raw(Some("X"), None, None), &table, now),
            Err(Rejection::MissingPopulation)
        );
        assert_eq!(
            estimator.estimate(&raw(Some("X"), Some(0), None), &table, now),
            Err(Rejection::NonPositivePopulation)
        );
        assert_eq!(
            estimator.estimate(&raw(Some("X"), Some(-3), None), &table, now),
            Err(Rejection::NonPositivePopulation)
        );
    }

    #[test]
    fn unresolvable_currency_leaves_rate_and_gdp_absent() {
        let estimator = GdpEstimator::default();
        let table = rates(&[("EUR", 0.9), ("ZZZ", 0.0)]);
        let now = Utc::now();

        let no_currency = estimator
            .estimate(&raw(Some("A"), Some(5), None), &table, now)
            .unwrap();
        assert_eq!(no_currency.currency_code, None);
        assert_eq!(no_currency.exchange_rate, None);
        assert_eq!(no_currency.estimated_gdp, None);

        let unknown_rate = estimator
            .estimate(&raw(Some("B"), Some(5), Some("XYZ")), &table, now)
            .unwrap();
        assert_eq!(unknown_rate.currency_code.as_deref(), Some("XYZ"));
        assert_eq!(unknown_rate.exchange_rate, None);
        assert_eq!(unknown_rate.estimated_gdp, None);

        let zero_rate = estimator
            .estimate(&raw(Some("C"), Some(5), Some("ZZZ")), &table, now)
            .unwrap();
        assert_eq!(zero_rate.exchange_rate, None);
        assert_eq!(zero_rate.estimated_gdp, None);
    }

    #[test]
    fn currency_code_is_trimmed_but_keeps_its_case() {
        let estimator = GdpEstimator::new(FixedMultiplier(1000));
        let table = rates(&[("TST", 10.0)]);
        let now = Utc::now();

        let padded = estimator
            .estimate(&raw(Some("Testland"), Some(1000), Some(" TST ")), &table, now)
            .unwrap();
        assert_eq!(padded.currency_code.as_deref(), Some("TST"));
        assert_eq!(padded.estimated_gdp, Some(100_000.0));

        let lower = estimator
            .estimate(&raw(Some("Lowland"), Some(1000), Some("tst")), &table, now)
            .unwrap();
        assert_eq!(lower.currency_code.as_deref(), Some("tst"));
        assert_eq!(lower.exchange_rate, None);

        let blank = estimator
            .estimate(&raw(Some("Blankland"), Some(1000), Some("   ")), &table, now)
            .unwrap();
        assert_eq!(blank.currency_code, None);
    }

    #[test]
    fn batch_drops_invalid_and_case_duplicates() {
        let estimator = GdpEstimator::new(FixedMultiplier(1000));
        let table = rates(&[("GHS", 12.0)]);
        let now = Utc::now();
        let raws = vec![
            raw(Some("Ghana"), Some(100), Some("GHS")),
            raw(None, Some(100), None),
            raw(Some("GHANA"), Some(999), Some("GHS")),
            raw(Some("Togo"), Some(0), None),
            raw(Some("Benin"), Some(7), None),
        ];

        let batch = estimator.estimate_batch(&raws, &table, now);

        let names: Vec<&str> = batch.candidates.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Ghana", "Benin"]);
        assert_eq!(batch.candidates[0].population, 100);
        assert_eq!(batch.rejected, 3);
        assert!(batch.candidates.iter().all(|c| c.last_refreshed_at == now));
    }
}

//! Historical UK tax bands
//!
//! One row per tax year (keyed by the calendar year in which the tax year
//! starts on 6 April). Years before the first row use the first row; years
//! after the last row use the last row with thresholds scaled by CPI.

use serde::{Deserialize, Serialize};

/// Bands and rates for a single tax year
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TaxYearBands {
    pub year: i16,
    pub personal_allowance: f64,
    /// Total income at which the higher rate starts
    pub higher_rate_threshold: f64,
    /// Taxable income at which the additional rate starts
    pub additional_rate_threshold: f64,
    pub basic_rate: f64,
    pub higher_rate: f64,
    pub additional_rate: f64,
    pub ni_primary_threshold: f64,
    pub ni_upper_earnings_limit: f64,
    pub ni_main_rate: f64,
    pub ni_upper_rate: f64,
    pub cgt_annual_exempt: f64,
    pub cgt_low_rate: f64,
    pub cgt_high_rate: f64,
}

impl TaxYearBands {
    /// Thresholds multiplied by `factor`; rates unchanged
    #[must_use]
    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            personal_allowance: self.personal_allowance * factor,
            higher_rate_threshold: self.higher_rate_threshold * factor,
            additional_rate_threshold: self.additional_rate_threshold * factor,
            ni_primary_threshold: self.ni_primary_threshold * factor,
            ni_upper_earnings_limit: self.ni_upper_earnings_limit * factor,
            cgt_annual_exempt: self.cgt_annual_exempt * factor,
            ..*self
        }
    }
}

/// Immutable table of historical tax years, injected into the tax engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaxTable {
    pub rows: Vec<TaxYearBands>,
    /// Income above which the personal allowance tapers away
    pub taper_threshold: f64,
    /// Allowance lost per unit of income above the taper threshold
    pub taper_rate: f64,
}

const fn row(
    year: i16,
    personal_allowance: f64,
    higher_rate_threshold: f64,
    additional_rate_threshold: f64,
    ni: (f64, f64, f64),
    cgt: (f64, f64, f64),
) -> TaxYearBands {
    TaxYearBands {
        year,
        personal_allowance,
        higher_rate_threshold,
        additional_rate_threshold,
        basic_rate: 0.20,
        higher_rate: 0.40,
        additional_rate: 0.45,
        ni_primary_threshold: ni.0,
        ni_upper_earnings_limit: ni.1,
        ni_main_rate: ni.2,
        ni_upper_rate: 0.02,
        cgt_annual_exempt: cgt.0,
        cgt_low_rate: cgt.1,
        cgt_high_rate: cgt.2,
    }
}

impl TaxTable {
    /// UK rates for tax years 2016/17 to 2024/25
    #[must_use]
    pub fn uk() -> Self {
        TaxTable {
            rows: vec![
                row(2016, 11_000.0, 43_000.0, 150_000.0, (8_060.0, 43_000.0, 0.12), (11_100.0, 0.10, 0.20)),
                row(2017, 11_500.0, 45_000.0, 150_000.0, (8_164.0, 45_000.0, 0.12), (11_300.0, 0.10, 0.20)),
                row(2018, 11_850.0, 46_350.0, 150_000.0, (8_424.0, 46_350.0, 0.12), (11_700.0, 0.10, 0.20)),
                row(2019, 12_500.0, 50_000.0, 150_000.0, (8_632.0, 50_000.0, 0.12), (12_000.0, 0.10, 0.20)),
                row(2020, 12_500.0, 50_000.0, 150_000.0, (9_500.0, 50_000.0, 0.12), (12_300.0, 0.10, 0.20)),
                row(2021, 12_570.0, 50_270.0, 150_000.0, (9_568.0, 50_270.0, 0.12), (12_300.0, 0.10, 0.20)),
                row(2022, 12_570.0, 50_270.0, 150_000.0, (12_570.0, 50_270.0, 0.12), (12_300.0, 0.10, 0.20)),
                row(2023, 12_570.0, 50_270.0, 125_140.0, (12_570.0, 50_270.0, 0.12), (6_000.0, 0.10, 0.20)),
                row(2024, 12_570.0, 50_270.0, 125_140.0, (12_570.0, 50_270.0, 0.08), (3_000.0, 0.18, 0.24)),
            ],
            taper_threshold: 100_000.0,
            taper_rate: 0.5,
        }
    }

    pub fn last_year(&self) -> i16 {
        self.rows.last().map_or(i16::MIN, |r| r.year)
    }

    /// Row for a tax year, clamped to the table's range
    pub fn bands_for(&self, tax_year: i16) -> Option<&TaxYearBands> {
        self.rows
            .iter()
            .rev()
            .find(|r| r.year <= tax_year)
            .or_else(|| self.rows.first())
    }

    /// True when `tax_year` lies past the last defined row
    pub fn is_beyond(&self, tax_year: i16) -> bool {
        tax_year > self.last_year()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_clamps() {
        let table = TaxTable::uk();
        assert_eq!(table.bands_for(2010).map(|r| r.year), Some(2016));
        assert_eq!(table.bands_for(2019).map(|r| r.personal_allowance), Some(12_500.0));
        assert_eq!(table.bands_for(2040).map(|r| r.year), Some(2024));
        assert!(table.is_beyond(2025));
        assert!(!table.is_beyond(2024));
    }

    #[test]
    fn test_scaled_keeps_rates() {
        let table = TaxTable::uk();
        let row = table.bands_for(2024).copied().unwrap();
        let scaled = row.scaled(2.0);
        assert_eq!(scaled.personal_allowance, 25_140.0);
        assert_eq!(scaled.basic_rate, 0.20);
        assert_eq!(scaled.ni_main_rate, 0.08);
    }
}

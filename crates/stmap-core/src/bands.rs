//! Band to date index and date selector resolution.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde_json::Value;
use stmap_common::{parse_date, DateSelector, StmapError, StmapResult};

/// Calendar date of each indexed band, keyed by 1-based band number.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BandIndex {
    dates: BTreeMap<usize, NaiveDate>,
}

impl BandIndex {
    pub fn new(dates: BTreeMap<usize, NaiveDate>) -> Self {
        Self { dates }
    }

    /// Build from the `band-dates` metadata entry, checking every band
    /// number against `band_count`.
    pub fn from_metadata(value: Option<&Value>, band_count: usize) -> StmapResult<Self> {
        let entries = match value {
            None | Some(Value::Null) => return Ok(Self::default()),
            Some(Value::Object(entries)) => entries,
            Some(other) => {
                return Err(StmapError::InvalidMetadata(format!(
                    "band-dates must be a mapping, got {}",
                    other
                )))
            }
        };

        let mut dates = BTreeMap::new();
        for (key, value) in entries {
            let band: usize = key.trim().parse().map_err(|_| {
                StmapError::InvalidMetadata(format!("band-dates key '{}' is not a band number", key))
            })?;
            if band == 0 || band > band_count {
                return Err(StmapError::InvalidMetadata(format!(
                    "band-dates refers to band {} but the raster has {} bands",
                    band, band_count
                )));
            }
            let text = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            let date = parse_date(&text)
                .map_err(|e| StmapError::InvalidMetadata(format!("band {}: {}", band, e)))?;
            dates.insert(band, date);
        }
        Ok(Self { dates })
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn date(&self, band: usize) -> Option<NaiveDate> {
        self.dates.get(&band).copied()
    }

    /// Entries in band order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, NaiveDate)> + '_ {
        self.dates.iter().map(|(b, d)| (*b, *d))
    }

    /// The index as `{band: "YYYY-MM-DD"}`.
    pub fn to_iso_map(&self) -> serde_json::Map<String, Value> {
        self.dates
            .iter()
            .map(|(b, d)| (b.to_string(), Value::String(d.format("%Y-%m-%d").to_string())))
            .collect()
    }

    /// Indexed bands ordered by ascending date, ties by band number.
    pub fn bands_by_date(&self) -> Vec<usize> {
        let mut entries: Vec<(NaiveDate, usize)> = self.dates.iter().map(|(b, d)| (*d, *b)).collect();
        entries.sort();
        entries.into_iter().map(|(_, b)| b).collect()
    }

    /// Band whose date is nearest `target`. The scan runs in band order and
    /// the first band at the minimum distance wins.
    pub fn nearest(&self, target: NaiveDate) -> Option<usize> {
        let mut best: Option<(i64, usize)> = None;
        for (band, date) in &self.dates {
            let distance = (*date - target).num_days().abs();
            if best.map_or(true, |(d, _)| distance < d) {
                best = Some((distance, *band));
            }
        }
        best.map(|(_, band)| band)
    }

    /// Bands dated within `[start, end]`, ordered by date.
    pub fn in_range(&self, start: NaiveDate, end: NaiveDate) -> Vec<usize> {
        let mut entries: Vec<(NaiveDate, usize)> = self
            .dates
            .iter()
            .filter(|(_, d)| **d >= start && **d <= end)
            .map(|(b, d)| (*d, *b))
            .collect();
        entries.sort();
        entries.into_iter().map(|(_, b)| b).collect()
    }

    /// Bands to read for `selector` from a raster with `band_count` bands.
    ///
    /// Without a selector every indexed band is returned by date, or every
    /// band of the raster when nothing is indexed.
    pub fn resolve(&self, selector: Option<&DateSelector>, band_count: usize) -> StmapResult<Vec<usize>> {
        match selector {
            Some(DateSelector::Band(band)) => {
                if *band == 0 || *band > band_count {
                    return Err(StmapError::invalid_parameter(
                        "date",
                        format!("band {} out of range 1..={}", band, band_count),
                    ));
                }
                Ok(vec![*band])
            }
            Some(DateSelector::Date(target)) => {
                let band = self.nearest(*target).ok_or_else(|| {
                    StmapError::InvalidMetadata("asset has no band-dates to match a date against".into())
                })?;
                Ok(vec![band])
            }
            Some(DateSelector::Range(start, end)) => {
                if self.is_empty() {
                    return Err(StmapError::InvalidMetadata(
                        "asset has no band-dates to match a date range against".into(),
                    ));
                }
                Ok(self.in_range(*start, *end))
            }
            None if self.is_empty() => Ok((1..=band_count).collect()),
            None => Ok(self.bands_by_date()),
        }
    }
}

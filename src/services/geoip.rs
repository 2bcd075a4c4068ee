//! IPv4 country lookup over a sorted range table loaded from CSV

use crate::models::IpLookupResult;
use crate::{Error, Result};
use regex::Regex;
use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use std::path::Path;
use std::sync::LazyLock;

pub const UNKNOWN_CODE: &str = "ZZ";
pub const UNKNOWN_NAME: &str = "Unknown";

/// Columns required per CSV row: start, end, .., .., code, .., name.
const MIN_COLUMNS: usize = 7;

static IPV4_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:\d{1,3}\.){3}\d{1,3}\b").unwrap());

/// Extract IPv4-shaped tokens from free text.
///
/// The token pattern is permissive: `999.999.999.999` is returned as a candidate and
/// only rejected later by [`GeoIpDatabase::lookup`].
#[must_use]
pub fn search_ip_addresses(text: &str) -> Vec<&str> {
    IPV4_TOKEN.find_iter(text).map(|m| m.as_str()).collect()
}

/// One inclusive IPv4 range owned by a country
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeoIpEntry {
    pub start_ip: u32,
    pub end_ip: u32,
    pub country_code: String,
    pub country_name: String,
}

/// In-memory range table, immutable after construction
#[derive(Debug, Clone, Default)]
pub struct GeoIpDatabase {
    entries: Vec<GeoIpEntry>,
}

impl GeoIpDatabase {
    /// Parse CSV rows of the form `start,end,_,_,code,_,name[,...]`.
    ///
    /// Short rows and rows with non-numeric bounds are skipped. Entries are sorted by
    /// start address so lookups never depend on the input order.
    pub fn parse(csv_data: &str) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(csv_data.as_bytes());

        let mut entries = Vec::new();
        let mut skipped = 0usize;

        for record in reader.records() {
            let record =
                record.map_err(|e| Error::InvalidInput(format!("failed to read CSV: {e}")))?;

            if record.len() < MIN_COLUMNS {
                skipped += 1;
                continue;
            }

            let (Ok(start_ip), Ok(end_ip)) = (record[0].parse::<u32>(), record[1].parse::<u32>())
            else {
                log::trace!("Skipping GeoIP row with non-numeric bounds: {record:?}");
                skipped += 1;
                continue;
            };

            entries.push(GeoIpEntry {
                start_ip,
                end_ip,
                country_code: record[4].to_string(),
                country_name: record[6].to_string(),
            });
        }

        entries.sort_by_key(|e| e.start_ip);

        log::debug!(
            "Loaded {} GeoIP ranges ({skipped} rows skipped)",
            entries.len()
        );

        Ok(Self { entries })
    }

    /// Read and parse a CSV file from disk.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        Self::parse(&data)
    }

    #[must_use]
    pub fn entries(&self) -> &[GeoIpEntry] {
        &self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolve a dotted-quad IPv4 address to `(country_code, country_name)`.
    ///
    /// An address outside every range resolves to `("ZZ", "Unknown")`; anything that is
    /// not an IPv4 address is an error.
    pub fn lookup(&self, ip: &str) -> Result<(&str, &str)> {
        let addr: Ipv4Addr = ip
            .parse()
            .map_err(|_| Error::InvalidAddress(ip.to_string()))?;
        let value = u32::from(addr);

        let idx = self.entries.partition_point(|e| e.start_ip <= value);
        if idx > 0 {
            let entry = &self.entries[idx - 1];
            if value <= entry.end_ip {
                return Ok((&entry.country_code, &entry.country_name));
            }
        }

        Ok((UNKNOWN_CODE, UNKNOWN_NAME))
    }

    /// Resolve several addresses; unparsable ones map to the unknown country.
    #[must_use]
    pub fn lookup_many<S: AsRef<str>>(&self, ips: &[S]) -> Vec<IpLookupResult> {
        ips.iter()
            .map(|ip| {
                let ip = ip.as_ref();
                match self.lookup(ip) {
                    Ok((code, name)) => IpLookupResult {
                        ip: ip.to_string(),
                        country_code: code.to_string(),
                        country_name: name.to_string(),
                        error: None,
                    },
                    Err(err) => IpLookupResult {
                        ip: ip.to_string(),
                        country_code: UNKNOWN_CODE.to_string(),
                        country_name: UNKNOWN_NAME.to_string(),
                        error: Some(err.to_string()),
                    },
                }
            })
            .collect()
    }

    /// Count addresses per country name.
    #[must_use]
    pub fn count_by_country<S: AsRef<str>>(&self, ips: &[S]) -> BTreeMap<String, u64> {
        let mut counts = BTreeMap::new();
        for result in self.lookup_many(ips) {
            *counts.entry(result.country_name).or_insert(0) += 1;
        }
        counts
    }
}

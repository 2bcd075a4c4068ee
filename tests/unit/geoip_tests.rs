//! Unit tests for GeoIP table parsing, lookups and address extraction
#[cfg(test)]
mod tests {
    use crate::fixtures::GEOIP_CSV;
    use logscan::Error;
    use logscan::services::geoip::{GeoIpDatabase, search_ip_addresses};

    fn db() -> GeoIpDatabase {
        GeoIpDatabase::parse(GEOIP_CSV).unwrap()
    }

    #[test]
    fn extracts_ipv4_shaped_tokens() {
        assert_eq!(search_ip_addresses("Error from 192.168.1.1"), vec!["192.168.1.1"]);
        assert_eq!(
            search_ip_addresses("Connection from 192.168.1.1 to 10.0.0.1 failed"),
            vec!["192.168.1.1", "10.0.0.1"]
        );
        assert_eq!(
            search_ip_addresses("Not IPs: 999.999.999.999, 1.2.3"),
            vec!["999.999.999.999"]
        );
        assert_eq!(
            search_ip_addresses("IP=[192.168.1.100] connected to [10.0.0.5]"),
            vec!["192.168.1.100", "10.0.0.5"]
        );
        assert!(search_ip_addresses("no addresses here").is_empty());
        assert!(search_ip_addresses("").is_empty());
    }

    #[test]
    fn parse_skips_short_and_non_numeric_rows() {
        let csv = "\
16777216,16777471,AU
invalid,16777471,a,b,AU,c,Australia
16777216,invalid,a,b,AU,c,Australia
16777472,16777727,a,b,CN,c,China";
        let db = GeoIpDatabase::parse(csv).unwrap();
        assert_eq!(db.len(), 1);
        assert_eq!(db.entries()[0].country_code, "CN");

        assert!(GeoIpDatabase::parse("").unwrap().is_empty());
    }

    #[test]
    fn parse_sorts_unordered_input() {
        let csv = "\
134750208,134758399,a,b,US,c,United States
16777216,16777471,a,b,AU,c,Australia";
        let db = GeoIpDatabase::parse(csv).unwrap();
        assert_eq!(db.entries()[0].start_ip, 16_777_216);
        assert_eq!(db.lookup("1.0.0.7").unwrap(), ("AU", "Australia"));
        assert_eq!(db.lookup("8.8.30.1").unwrap(), ("US", "United States"));
    }

    #[test]
    fn range_boundaries_resolve_inclusively() {
        let db = db();
        assert_eq!(db.lookup("1.0.0.0").unwrap(), ("AU", "Australia"));
        assert_eq!(db.lookup("1.0.0.255").unwrap(), ("AU", "Australia"));
        assert_eq!(db.lookup("1.0.1.0").unwrap(), ("CN", "China"));
        assert_eq!(db.lookup("1.0.20.1").unwrap(), ("JP", "Japan"));
        assert_eq!(db.lookup("8.8.8.8").unwrap(), ("AU", "Australia"));
    }

    #[test]
    fn uncovered_address_is_unknown_without_error() {
        let db = GeoIpDatabase::parse("16777216,16777471,a,b,AU,c,Australia").unwrap();
        assert_eq!(db.lookup("1.0.1.0").unwrap(), ("ZZ", "Unknown"));
        assert_eq!(db.lookup("200.200.200.200").unwrap(), ("ZZ", "Unknown"));
        assert_eq!(db.lookup("0.0.0.1").unwrap(), ("ZZ", "Unknown"));
    }

    #[test]
    fn non_ipv4_input_is_an_error() {
        let db = db();
        for bad in ["invalid", "", "2001:4860:4860::8888", "999.999.999.999", "1.2.3"] {
            let err = db.lookup(bad).expect_err("lookup should fail");
            assert!(matches!(err, Error::InvalidAddress(_)), "{bad}");
        }
    }

    #[test]
    fn lookup_many_substitutes_unknown_for_failures() {
        let results = db().lookup_many(&["1.0.0.1", "not-an-ip", "200.1.1.1"]);
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].country_code, "AU");
        assert!(results[0].error.is_none());
        assert_eq!(results[1].country_code, "ZZ");
        assert_eq!(results[1].country_name, "Unknown");
        assert!(results[1].error.is_some());
        assert_eq!(results[2].country_name, "Unknown");
        assert!(results[2].error.is_none());
    }

    #[test]
    fn extracted_addresses_aggregate_by_country_name() {
        let line = "from 1.0.0.1 via 8.8.8.8 to 1.0.20.5 and 300.1.1.1 or 200.1.1.1";
        let ips = search_ip_addresses(line);
        assert_eq!(ips.len(), 5);

        let counts = db().count_by_country(&ips);
        assert_eq!(counts.get("Australia"), Some(&2));
        assert_eq!(counts.get("Japan"), Some(&1));
        assert_eq!(counts.get("Unknown"), Some(&2));
        assert_eq!(counts.values().sum::<u64>(), 5);
    }
}

//! Unit tests for timestamp extraction
#[cfg(test)]
mod tests {
    use logscan::services::dates::extract_date;

    #[test]
    fn recognises_common_shapes() {
        assert_eq!(
            extract_date("2026-03-01 10:30:05 ERROR boom").as_deref(),
            Some("2026-03-01 10:30:05")
        );
        assert_eq!(
            extract_date("ts=2026-03-01T10:30:05.123Z level=error").as_deref(),
            Some("2026-03-01 10:30:05")
        );
        assert_eq!(
            extract_date("[2026/03/01 10:30:05] [error] oops").as_deref(),
            Some("2026-03-01 10:30:05")
        );
        assert_eq!(
            extract_date(r#"1.2.3.4 - - [01/Mar/2026:10:30:05 +0000] "GET / HTTP/1.1" 500"#)
                .as_deref(),
            Some("2026-03-01 10:30:05")
        );
    }

    #[test]
    fn missing_or_impossible_dates_yield_none() {
        assert_eq!(extract_date("error:1"), None);
        assert_eq!(extract_date(""), None);
        assert_eq!(extract_date("2026-13-45 99:99:99"), None);
    }
}

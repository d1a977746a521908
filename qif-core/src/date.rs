use chrono::NaiveDate;

/// Default QIF date layout, day first with a four digit year.
pub const DEFAULT_DATE_FORMAT: &str = "%d/%m/%Y";

/// Renders a date with a dialect's `strftime` layout.
pub fn format_date(date: NaiveDate, format: &str) -> String {
    date.format(format).to_string()
}

/// Parses a date written with a dialect's `strftime` layout. Quicken's
/// habit of padding single digits with spaces (`" 1/ 3'24"`) is tolerated.
pub fn parse_date(s: &str, format: &str) -> Result<NaiveDate, chrono::ParseError> {
    let trimmed = s.trim();
    match NaiveDate::parse_from_str(trimmed, format) {
        Ok(date) => Ok(date),
        Err(err) => {
            let compact: String = trimmed.chars().filter(|c| !c.is_whitespace()).collect();
            if compact.len() == trimmed.len() {
                Err(err)
            } else {
                NaiveDate::parse_from_str(&compact, format)
            }
        }
    }
}

#[test]
fn test_date_round_trip() {
    let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
    assert_eq!(format_date(date, DEFAULT_DATE_FORMAT), "01/03/2024");
    assert_eq!(parse_date("01/03/2024", DEFAULT_DATE_FORMAT).unwrap(), date);
    assert_eq!(parse_date("03/01'24", "%m/%d'%y").unwrap(), date);
    assert!(parse_date("2024-03-01", DEFAULT_DATE_FORMAT).is_err());
}

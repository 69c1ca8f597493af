//! Builders for the two metadata documents that accompany every file pushed
//! to the Virtual Watershed: the watershed JSON record and the FGDC XML
//! record. Both are pure functions of their inputs.

pub mod fgdc;
pub mod template;
pub mod watershed;

use camino::Utf8Path;
use chrono::{NaiveDate, NaiveDateTime};

use crate::error::VwError;

pub use fgdc::make_fgdc_metadatum;
pub use template::TemplateEnv;
pub use watershed::make_watershed_metadatum;

pub(crate) fn required<'a>(
    value: &'a Option<String>,
    section: &str,
    key: &str,
) -> Result<&'a str, VwError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| VwError::missing(section, key))
}

/// Basename and extension of a data file path. The file does not have to
/// exist.
pub(crate) fn file_parts(path: &Utf8Path) -> (&str, &str) {
    let basename = path.file_name().unwrap_or(path.as_str());
    let ext = path.extension().unwrap_or("");
    (basename, ext)
}

pub(crate) fn mimetype_for(ext: &str) -> &'static str {
    match ext.to_ascii_lowercase().as_str() {
        "tif" | "tiff" => "image/tiff",
        "nc" => "application/x-netcdf",
        "json" => "application/json",
        "xml" => "application/xml",
        "csv" => "text/csv",
        "txt" => "text/plain",
        _ => "application/octet-stream",
    }
}

pub(crate) fn parse_date(key: &str, value: &str) -> Result<NaiveDate, VwError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| VwError::InvalidDate {
        key: key.to_string(),
        value: value.to_string(),
    })
}

/// Accepts `YYYY-MM-DD HH:MM:SS` or a bare date (midnight).
pub(crate) fn parse_datetime(key: &str, value: &str) -> Result<NaiveDateTime, VwError> {
    let trimmed = value.trim();
    if let Ok(datetime) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S") {
        return Ok(datetime);
    }
    parse_date(key, trimmed)?
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| VwError::InvalidDate {
            key: key.to_string(),
            value: value.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn file_parts_of_nested_path() {
        let (basename, ext) = file_parts(Utf8Path::new("src/test/data/in.00"));
        assert_eq!(basename, "in.00");
        assert_eq!(ext, "00");
    }

    #[test]
    fn mimetype_falls_back_to_octet_stream() {
        assert_eq!(mimetype_for("TIF"), "image/tiff");
        assert_eq!(mimetype_for("00"), "application/octet-stream");
    }

    #[test]
    fn bare_date_is_midnight() {
        let parsed = parse_datetime("start_datetime", "2010-10-01").unwrap();
        assert_eq!(parsed.to_string(), "2010-10-01 00:00:00");
    }

    #[test]
    fn blank_required_value_is_missing() {
        let err = required(&Some("  ".to_string()), "Watershed", "state").unwrap_err();
        assert_matches!(err, VwError::MissingTemplateField { .. });
    }
}

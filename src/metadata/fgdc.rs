use std::fs;

use camino::Utf8Path;
use serde::Serialize;

use crate::client::dataset_url;
use crate::config::VwConfig;
use crate::domain::ModelRunUuid;
use crate::error::VwError;
use crate::metadata::template::FGDC_TEMPLATE_NAME;
use crate::metadata::{TemplateEnv, file_parts, parse_date, required};

const SECTION: &str = "FGDC";
const DEFAULT_PROGRESS: &str = "Complete";
const DEFAULT_UPDATE_FREQUENCY: &str = "None planned";

/// Variables available to the FGDC template.
#[derive(Debug, Serialize)]
struct FgdcFields<'a> {
    title: &'a str,
    origin: &'a str,
    pubdate: String,
    model_run_uuid: &'a str,
    onlink: String,
    abstract_text: &'a str,
    purpose: &'a str,
    begdate: String,
    enddate: String,
    progress: &'a str,
    update_frequency: &'a str,
    theme_keywords: Vec<String>,
    place_keywords: Vec<String>,
    format_name: &'a str,
    filesize_mb: String,
    contact_org: &'a str,
    contact_name: &'a str,
    contact_email: &'a str,
}

/// Renders the FGDC XML record for `data_file`, which must exist: its size
/// is part of the distribution section.
pub fn make_fgdc_metadatum(
    env: &TemplateEnv,
    data_file: &Utf8Path,
    config: &VwConfig,
    model_run_uuid: &ModelRunUuid,
) -> Result<String, VwError> {
    let size = fs::metadata(data_file.as_std_path())
        .map_err(|err| VwError::Filesystem(format!("stat {data_file}: {err}")))?
        .len();

    let fgdc = &config.fgdc;
    let watershed_name = required(
        &config.watershed.watershed_name,
        "Watershed",
        "watershed_name",
    )?;
    let begin_date = required(&fgdc.begin_date, SECTION, "begin_date")?;
    let end_date = required(&fgdc.end_date, SECTION, "end_date")?;
    let publication_date = required(&fgdc.publication_date, SECTION, "publication_date")?;
    let abstract_text = required(&fgdc.abstract_text, SECTION, "abstract")?;
    let purpose = required(&fgdc.purpose, SECTION, "purpose")?;
    let contact_name = required(&fgdc.contact_name, SECTION, "contact_name")?;
    let contact_org = required(&fgdc.contact_org, SECTION, "contact_org")?;
    let contact_email = required(&fgdc.contact_email, SECTION, "contact_email")?;

    let place_keywords = match &fgdc.place_keywords {
        Some(keywords) => keywords.clone(),
        None => std::iter::once(watershed_name.to_string())
            .chain(config.watershed.state.clone())
            .collect(),
    };

    let (basename, ext) = file_parts(data_file);
    let fields = FgdcFields {
        title: basename,
        origin: fgdc.origin.as_deref().unwrap_or(contact_org),
        pubdate: fgdc_date("publication_date", publication_date)?,
        model_run_uuid: model_run_uuid.as_str(),
        onlink: dataset_url(&config.base_url(), model_run_uuid),
        abstract_text,
        purpose,
        begdate: fgdc_date("begin_date", begin_date)?,
        enddate: fgdc_date("end_date", end_date)?,
        progress: fgdc.progress.as_deref().unwrap_or(DEFAULT_PROGRESS),
        update_frequency: fgdc
            .update_frequency
            .as_deref()
            .unwrap_or(DEFAULT_UPDATE_FREQUENCY),
        theme_keywords: fgdc.theme_keywords.clone().unwrap_or_default(),
        place_keywords,
        format_name: if ext.is_empty() { "binary" } else { ext },
        filesize_mb: format!("{:.6}", size as f64 / 1_000_000.0),
        contact_org,
        contact_name,
        contact_email,
    };

    env.render(FGDC_TEMPLATE_NAME, &fields)
}

/// FGDC calendar dates are `YYYYMMDD`.
fn fgdc_date(key: &str, value: &str) -> Result<String, VwError> {
    Ok(parse_date(key, value)?.format("%Y%m%d").to_string())
}

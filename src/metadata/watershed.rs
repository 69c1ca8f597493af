use camino::Utf8Path;
use serde::Serialize;

use crate::client::{dataset_file_url, dataset_url};
use crate::config::VwConfig;
use crate::domain::{ModelRunUuid, ModelSet};
use crate::error::VwError;
use crate::metadata::{file_parts, mimetype_for, parse_datetime, required};

const SECTION: &str = "Watershed";
const FGDC_STANDARD: &str = "FGDC-STD-001-1998";
const DEFAULT_TAXONOMY: &str = "file";
const DEFAULT_ORIG_EPSG: u32 = 26911;
const DEFAULT_EPSG: u32 = 4326;
const DEFAULT_APP: &str = "my_app";

#[derive(Debug, Serialize)]
struct WatershedMetadatum<'a> {
    description: &'a str,
    taxonomy: &'a str,
    name: &'a str,
    basename: &'a str,
    ext: &'a str,
    mimetype: &'a str,
    model_run_uuid: &'a str,
    parent_model_run_uuid: Option<&'a str>,
    model_set: ModelSet,
    model_vars: &'a str,
    watershed: &'a str,
    state: &'a str,
    model_name: &'a str,
    categories: Vec<Category<'a>>,
    spatial: Spatial,
    temporal: Temporal,
    input_file_path: &'a str,
    metadata: XmlMetadata<'a>,
    apps: Vec<String>,
    standards: Vec<Link>,
    #[serde(skip_serializing_if = "Option::is_none")]
    services: Option<Vec<Link>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    downloads: Option<Vec<DownloadDescriptor<'a>>>,
}

#[derive(Debug, Serialize)]
struct Category<'a> {
    state: &'a str,
    modelname: &'a str,
    location: &'a str,
}

#[derive(Debug, Serialize)]
struct Spatial {
    orig_epsg: u32,
    epsg: u32,
}

#[derive(Debug, Serialize)]
struct Temporal {
    start: Option<String>,
    end: Option<String>,
}

#[derive(Debug, Serialize)]
struct XmlMetadata<'a> {
    xml: &'a str,
}

#[derive(Debug, Serialize)]
struct Link {
    #[serde(rename = "type")]
    kind: &'static str,
    href: String,
}

#[derive(Debug, Serialize)]
struct DownloadDescriptor<'a> {
    name: &'a str,
    bin: String,
}

/// Builds the watershed JSON record for `data_file`.
///
/// `model_set` must be `"inputs"` or `"outputs"`. Output records also carry
/// the OGC services and the binary download descriptor the Virtual Watershed
/// derives for stored datasets; input records carry neither key. The result
/// depends only on the arguments, so identical calls produce identical bytes.
pub fn make_watershed_metadatum(
    data_file: &Utf8Path,
    config: &VwConfig,
    parent_model_run_uuid: Option<&ModelRunUuid>,
    model_run_uuid: &ModelRunUuid,
    model_set: &str,
    description: &str,
    fgdc_xml: &str,
) -> Result<String, VwError> {
    let model_set: ModelSet = model_set.parse()?;
    let section = &config.watershed;

    let watershed = required(&section.watershed_name, SECTION, "watershed_name")?;
    let state = required(&section.state, SECTION, "state")?;
    let model_name = required(&section.model_name, SECTION, "model_name")?;
    let location = section
        .location
        .as_deref()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or(watershed);

    let temporal = Temporal {
        start: format_datetime("start_datetime", section.start_datetime.as_deref())?,
        end: format_datetime("end_datetime", section.end_datetime.as_deref())?,
    };

    let (basename, ext) = file_parts(data_file);
    let base_url = config.base_url();
    let dataset = dataset_url(&base_url, model_run_uuid);

    let (services, downloads) = if model_set.has_services() {
        let services = vec![
            Link {
                kind: "wms",
                href: format!("{dataset}/services/ogc/wms"),
            },
            Link {
                kind: "wcs",
                href: format!("{dataset}/services/ogc/wcs"),
            },
        ];
        let downloads = vec![DownloadDescriptor {
            name: basename,
            bin: dataset_file_url(&base_url, model_run_uuid, basename)?,
        }];
        (Some(services), Some(downloads))
    } else {
        (None, None)
    };

    let document = WatershedMetadatum {
        description,
        taxonomy: section.taxonomy.as_deref().unwrap_or(DEFAULT_TAXONOMY),
        name: basename,
        basename,
        ext,
        mimetype: mimetype_for(ext),
        model_run_uuid: model_run_uuid.as_str(),
        parent_model_run_uuid: parent_model_run_uuid.map(ModelRunUuid::as_str),
        model_set,
        model_vars: section.model_vars.as_deref().unwrap_or(""),
        watershed,
        state,
        model_name,
        categories: vec![Category {
            state,
            modelname: model_name,
            location,
        }],
        spatial: Spatial {
            orig_epsg: section.orig_epsg.unwrap_or(DEFAULT_ORIG_EPSG),
            epsg: section.epsg.unwrap_or(DEFAULT_EPSG),
        },
        temporal,
        input_file_path: data_file.as_str(),
        metadata: XmlMetadata { xml: fgdc_xml },
        apps: section
            .apps
            .clone()
            .unwrap_or_else(|| vec![DEFAULT_APP.to_string()]),
        standards: vec![Link {
            kind: FGDC_STANDARD,
            href: format!("{dataset}/metadata/fgdc.xml"),
        }],
        services,
        downloads,
    };

    serde_json::to_string_pretty(&document).map_err(|err| VwError::TemplateRender(err.to_string()))
}

fn format_datetime(key: &str, value: Option<&str>) -> Result<Option<String>, VwError> {
    match value.map(str::trim).filter(|value| !value.is_empty()) {
        Some(value) => Ok(Some(
            parse_datetime(key, value)?
                .format("%Y-%m-%d %H:%M:%S")
                .to_string(),
        )),
        None => Ok(None),
    }
}

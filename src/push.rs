use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use camino::Utf8Path;
use tracing::info;

use crate::client::TransferClient;
use crate::config::VwConfig;
use crate::domain::ModelRunUuid;
use crate::error::VwError;
use crate::metadata::{TemplateEnv, make_fgdc_metadatum, make_watershed_metadatum};

const FALLBACK_FILE_NAME: &str = "download.bin";

#[derive(Debug, Clone)]
pub struct PushRequest<'a> {
    pub data_file: &'a Utf8Path,
    pub model_run_uuid: &'a ModelRunUuid,
    pub parent_model_run_uuid: Option<&'a ModelRunUuid>,
    pub model_set: &'a str,
    pub description: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushOutcome {
    pub model_run_uuid: ModelRunUuid,
    pub watershed_json: String,
    pub fgdc_xml: String,
    pub insert_response: String,
}

/// Builds both metadata documents for one file, uploads the file, then
/// inserts the metadata. The first failure is returned as is; an upload that
/// succeeded before a rejected insert is left on the server.
pub fn push_file<C: TransferClient + ?Sized>(
    client: &C,
    env: &TemplateEnv,
    config: &VwConfig,
    request: &PushRequest<'_>,
) -> Result<PushOutcome, VwError> {
    let fgdc_xml = make_fgdc_metadatum(env, request.data_file, config, request.model_run_uuid)?;
    let watershed_json = make_watershed_metadatum(
        request.data_file,
        config,
        request.parent_model_run_uuid,
        request.model_run_uuid,
        request.model_set,
        request.description,
        &fgdc_xml,
    )?;

    client.upload(request.model_run_uuid, request.data_file.as_std_path())?;
    let insert_response = client.insert_metadata(&watershed_json, &fgdc_xml)?;
    info!(
        model_run_uuid = %request.model_run_uuid,
        file = %request.data_file,
        "pushed file and metadata"
    );

    Ok(PushOutcome {
        model_run_uuid: request.model_run_uuid.clone(),
        watershed_json,
        fgdc_xml,
        insert_response,
    })
}

/// Downloads every binary referenced by the records of `model_run_uuid`
/// into `dest_dir`, in record order. Returns the written paths, one distinct
/// path per descriptor: a name already taken in this pull gets a numeric
/// prefix (`1_in.00`, `2_in.00`, ...).
pub fn pull_records<C: TransferClient + ?Sized>(
    client: &C,
    model_run_uuid: &str,
    dest_dir: &Path,
) -> Result<Vec<PathBuf>, VwError> {
    let result = client.fetch_records(model_run_uuid)?;
    fs::create_dir_all(dest_dir).map_err(|err| VwError::Filesystem(err.to_string()))?;

    let mut written = Vec::new();
    let mut taken = HashSet::new();
    for record in result.records() {
        for download in record.downloads() {
            let name = download
                .name
                .and_then(safe_file_name)
                .or_else(|| file_name_from_url(download.bin))
                .unwrap_or_else(|| FALLBACK_FILE_NAME.to_string());
            let target = dest_dir.join(unique_name(&mut taken, name));
            client.download(download.bin, &target)?;
            written.push(target);
        }
    }
    info!(model_run_uuid, files = written.len(), "pulled records");
    Ok(written)
}

fn unique_name(taken: &mut HashSet<String>, name: String) -> String {
    let mut candidate = name.clone();
    let mut n = 1;
    while !taken.insert(candidate.clone()) {
        candidate = format!("{n}_{name}");
        n += 1;
    }
    candidate
}

/// Last path component only, so server-provided names cannot escape the
/// destination directory.
fn safe_file_name(name: &str) -> Option<String> {
    Path::new(name)
        .file_name()
        .and_then(|name| name.to_str())
        .filter(|name| !name.is_empty())
        .map(str::to_string)
}

fn file_name_from_url(url: &str) -> Option<String> {
    let without_scheme = url.split_once("://").map_or(url, |(_, rest)| rest);
    let path = without_scheme.split_once('/').map_or("", |(_, path)| path);
    let path = path.split(['?', '#']).next().unwrap_or("");
    path.rsplit('/')
        .find(|segment| !segment.is_empty())
        .and_then(safe_file_name)
}

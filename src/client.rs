use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;

use reqwest::blocking::multipart::Form;
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::Url;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::config::{ClientOptions, ConfigLoader, Credentials, VwConfig, base_url};
use crate::domain::ModelRunUuid;
use crate::error::VwError;
use crate::search::{SearchQuery, SearchResult};

/// Application namespace on the Virtual Watershed host.
pub const APP_PATH: &str = "apps/my_app";

const LOGIN_ROUTE: &str = "apilogin";

/// URL of the dataset collection for a model run, without trailing slash.
pub fn dataset_url(base_url: &str, model_run_uuid: &ModelRunUuid) -> String {
    format!("{base_url}{APP_PATH}/datasets/{model_run_uuid}")
}

/// URL of one stored file of a model run. `file_name` becomes a single
/// percent-encoded path segment.
pub fn dataset_file_url(
    base_url: &str,
    model_run_uuid: &ModelRunUuid,
    file_name: &str,
) -> Result<String, VwError> {
    let invalid = |message: String| VwError::InvalidBaseUrl {
        url: base_url.to_string(),
        message,
    };
    let mut url =
        Url::parse(&dataset_url(base_url, model_run_uuid)).map_err(|err| invalid(err.to_string()))?;
    url.path_segments_mut()
        .map_err(|()| invalid("URL cannot carry a path".to_string()))?
        .push(file_name);
    Ok(url.to_string())
}

/// Operations against the Virtual Watershed. Each call is one blocking
/// round trip and nothing is retried.
pub trait TransferClient: Send + Sync {
    /// Uploads the file at `data_file` under `model_run_uuid`.
    fn upload(&self, model_run_uuid: &ModelRunUuid, data_file: &Path) -> Result<(), VwError>;

    /// Writes the binary at `url` to `out_file`, replacing any existing file.
    ///
    /// Credentials are attached only when `url` names the configured host
    /// and port; the scheme may differ. A record that refers to the server
    /// by another name (a DNS name where the config holds an IP) is fetched
    /// without credentials. A body that breaks off mid-read is a transport
    /// error; a failed write to `out_file` is a filesystem error.
    fn download(&self, url: &str, out_file: &Path) -> Result<(), VwError>;

    fn search(&self, query: &SearchQuery) -> Result<SearchResult, VwError>;

    /// Submits the watershed JSON with the FGDC XML embedded as its
    /// `metadata.xml`. Returns the server's response body.
    ///
    /// Server rejections are transport errors. A `watershed_json` that is not
    /// a JSON object is refused before any request is made and reported as
    /// [`VwError::InvalidMetadata`], a metadata-build failure.
    fn insert_metadata(&self, watershed_json: &str, fgdc_xml: &str) -> Result<String, VwError>;

    /// Registers a new model run and returns the UUID the server assigned.
    fn new_model_run(&self, description: &str) -> Result<ModelRunUuid, VwError>;

    /// Records for exactly one model run. A malformed UUID or an empty
    /// result is a verification failure, not a transport failure.
    fn fetch_records(&self, model_run_uuid: &str) -> Result<SearchResult, VwError> {
        let uuid: ModelRunUuid = model_run_uuid.parse()?;
        let result = self.search(&SearchQuery::new().model_run_uuid(uuid.clone()))?;
        if result.total() == 0 || result.is_empty() {
            return Err(VwError::RecordsNotFound(uuid.to_string()));
        }
        Ok(result)
    }
}

/// Authenticated blocking client. A value of this type only exists after
/// the server accepted the credentials.
#[derive(Debug, Clone)]
pub struct VwHttpClient {
    client: Client,
    base_url: String,
    credentials: Credentials,
}

impl VwHttpClient {
    pub fn connect(
        host: &str,
        credentials: Credentials,
        options: ClientOptions,
    ) -> Result<Self, VwError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("vw-adaptor/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| VwError::Http(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(options.timeout)
            .cookie_store(true)
            .danger_accept_invalid_certs(!options.verify_tls)
            .build()
            .map_err(|err| VwError::Http(err.to_string()))?;

        let vw = Self {
            client,
            base_url: base_url(host),
            credentials,
        };
        vw.authenticate()?;
        Ok(vw)
    }

    pub fn from_config(config: &VwConfig) -> Result<Self, VwError> {
        Self::connect(
            &config.common.watershed_ip,
            config.credentials()?,
            config.client_options(),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn username(&self) -> &str {
        self.credentials.username()
    }

    fn url(&self, route: &str) -> String {
        format!("{}{}", self.base_url, route)
    }

    fn app_url(&self, route: &str) -> String {
        format!("{}{}/{}", self.base_url, APP_PATH, route)
    }

    fn with_auth(&self, request: RequestBuilder) -> RequestBuilder {
        request.basic_auth(
            self.credentials.username(),
            Some(self.credentials.password()),
        )
    }

    fn authenticate(&self) -> Result<(), VwError> {
        let url = self.url(LOGIN_ROUTE);
        debug!(%url, user = self.credentials.username(), "authenticating");
        let response = send(self.with_auth(self.client.post(&url)))?;
        if response.status().is_success() {
            info!(base_url = %self.base_url, "authenticated with Virtual Watershed");
            return Ok(());
        }
        let status = response.status().as_u16();
        let message = response
            .text()
            .unwrap_or_else(|_| "authentication failed".to_string());
        Err(VwError::Authentication { status, message })
    }
}

impl TransferClient for VwHttpClient {
    fn upload(&self, model_run_uuid: &ModelRunUuid, data_file: &Path) -> Result<(), VwError> {
        let name = data_file
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| {
                VwError::Filesystem(format!("no file name in {}", data_file.display()))
            })?
            .to_string();
        let form = Form::new()
            .text("name", name.clone())
            .text("modelid", model_run_uuid.to_string())
            .file("file", data_file)
            .map_err(|err| VwError::Filesystem(format!("open {}: {err}", data_file.display())))?;

        let url = self.app_url("data");
        debug!(%url, %model_run_uuid, file = %name, "uploading");
        let response = send(self.with_auth(self.client.post(&url)).multipart(form))?;
        handle_status(response)?;
        info!(%model_run_uuid, file = %name, "uploaded");
        Ok(())
    }

    fn download(&self, url: &str, out_file: &Path) -> Result<(), VwError> {
        debug!(url, path = %out_file.display(), "downloading");
        let mut request = self.client.get(url);
        if same_host(&self.base_url, url) {
            request = self.with_auth(request);
        }
        let mut response = send(request)?;
        if !response.status().is_success() {
            return Err(VwError::DownloadRejected {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        let mut file =
            File::create(out_file).map_err(|err| VwError::Filesystem(err.to_string()))?;
        let bytes = copy_body(&mut response, &mut file)?;
        if !out_file.is_file() {
            return Err(VwError::DownloadMissing(out_file.to_path_buf()));
        }
        info!(url, path = %out_file.display(), bytes, "downloaded");
        Ok(())
    }

    fn search(&self, query: &SearchQuery) -> Result<SearchResult, VwError> {
        let url = self.app_url("search/datasets.json");
        let params = query.params();
        debug!(%url, ?params, "searching");
        let response = send(self.with_auth(self.client.get(&url)).query(&params))?;
        let response = handle_status(response)?;
        let value: Value = response
            .json()
            .map_err(|err| VwError::Decode(err.to_string()))?;
        let result =
            SearchResult::from_json(value).map_err(|err| VwError::Decode(err.to_string()))?;
        debug!(total = result.total(), returned = result.records().len(), "search done");
        Ok(result)
    }

    fn insert_metadata(&self, watershed_json: &str, fgdc_xml: &str) -> Result<String, VwError> {
        let mut document: Value = serde_json::from_str(watershed_json)
            .map_err(|err| VwError::InvalidMetadata(err.to_string()))?;
        let object = document
            .as_object_mut()
            .ok_or_else(|| VwError::InvalidMetadata("expected a JSON object".to_string()))?;
        let metadata = object.entry("metadata").or_insert_with(|| json!({}));
        if !metadata.is_object() {
            *metadata = json!({});
        }
        if let Some(metadata) = metadata.as_object_mut() {
            metadata.insert("xml".to_string(), Value::String(fgdc_xml.to_string()));
        }

        let model_run_uuid = object
            .get("model_run_uuid")
            .and_then(Value::as_str)
            .unwrap_or("<none>")
            .to_string();
        let url = self.app_url("datasets");
        debug!(%url, %model_run_uuid, "inserting metadata");
        let response = send(self.with_auth(self.client.put(&url)).json(&document))?;
        let response = handle_status(response)?;
        let body = response
            .text()
            .map_err(|err| VwError::Decode(err.to_string()))?;
        info!(%model_run_uuid, "inserted metadata");
        Ok(body)
    }

    fn new_model_run(&self, description: &str) -> Result<ModelRunUuid, VwError> {
        let url = self.app_url("newmodelrun");
        debug!(%url, "creating model run");
        let response = send(
            self.with_auth(self.client.post(&url))
                .json(&json!({ "description": description })),
        )?;
        let response = handle_status(response)?;
        let body = response
            .text()
            .map_err(|err| VwError::Decode(err.to_string()))?;
        let uuid: ModelRunUuid = body.trim().trim_matches('"').parse()?;
        info!(model_run_uuid = %uuid, "created model run");
        Ok(uuid)
    }
}

/// Client built from the config file at `path`, or from the default
/// config locations when `path` is `None`.
pub fn default_vw_client(path: Option<&str>) -> Result<VwHttpClient, VwError> {
    let config = ConfigLoader::resolve(path)?;
    VwHttpClient::from_config(&config)
}

/// Whether `url` points at the host and port of `base_url`.
fn same_host(base_url: &str, url: &str) -> bool {
    match (Url::parse(base_url), Url::parse(url)) {
        (Ok(base), Ok(target)) => {
            base.host_str().is_some()
                && base.host_str() == target.host_str()
                && base.port() == target.port()
        }
        _ => false,
    }
}

/// Streams `body` into `out`, keeping read failures (transport) apart from
/// write failures (filesystem).
fn copy_body<R: Read, W: Write>(body: &mut R, out: &mut W) -> Result<u64, VwError> {
    let mut buf = [0u8; 64 * 1024];
    let mut written = 0u64;
    loop {
        let n = match body.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(VwError::Http(format!("reading response body: {err}"))),
        };
        out.write_all(&buf[..n])
            .map_err(|err| VwError::Filesystem(format!("writing download: {err}")))?;
        written += n as u64;
    }
    out.flush()
        .map_err(|err| VwError::Filesystem(format!("writing download: {err}")))?;
    Ok(written)
}

fn send(request: RequestBuilder) -> Result<Response, VwError> {
    request
        .send()
        .map_err(|err| VwError::Http(err.to_string()))
}

fn handle_status(response: Response) -> Result<Response, VwError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status().as_u16();
    let message = response
        .text()
        .unwrap_or_else(|_| "Virtual Watershed request failed".to_string());
    Err(VwError::Status { status, message })
}

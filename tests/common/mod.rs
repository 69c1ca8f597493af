#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::{Arc, Mutex, mpsc};
use std::thread;

use serde_json::{Value, json};
use tracing_subscriber::EnvFilter;
use warp::Filter;
use warp::Reply;
use warp::http::StatusCode;
use warp::hyper::body::Bytes;
use warp::reply::Response;

use vw_adaptor::{ClientOptions, ConfigLoader, Credentials, VwConfig, VwHttpClient};

pub const USER: &str = "test_user";
pub const PASSWD: &str = "test_pass";
const BASIC_AUTH: &str = "Basic dGVzdF91c2VyOnRlc3RfcGFzcw==";

pub const MODEL_RUN_UUID: &str = "09079630-5ef8-11e4-9803-0800200c9a66";
pub const PARENT_MODEL_RUN_UUID: &str = "373ae181-a0b2-4998-ba32-e27da190f6dd";

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn fixture_config() -> VwConfig {
    ConfigLoader::load(Path::new("tests/fixtures/test.json")).unwrap()
}

/// State of the in-process Virtual Watershed.
#[derive(Default)]
pub struct MockState {
    pub base_url: String,
    pub model_runs: Vec<String>,
    pub records: Vec<Value>,
    pub files: HashMap<String, Vec<u8>>,
    pub inserted: Vec<Value>,
    pub requests: usize,
}

type SharedState = Arc<Mutex<MockState>>;

pub struct MockVw {
    addr: SocketAddr,
    pub state: SharedState,
}

impl MockVw {
    /// Serves the mock API on an ephemeral port from a background thread.
    pub fn start() -> Self {
        init_tracing();
        let state = SharedState::default();
        let server_state = state.clone();
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .worker_threads(1)
                .enable_all()
                .build()
                .unwrap();
            runtime.block_on(async move {
                let (addr, server) =
                    warp::serve(routes(server_state.clone())).bind_ephemeral(([127, 0, 0, 1], 0));
                server_state.lock().unwrap().base_url = format!("http://{addr}/");
                tx.send(addr).unwrap();
                server.await;
            });
        });
        let addr = rx.recv().unwrap();
        Self { addr, state }
    }

    pub fn host(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn base_url(&self) -> String {
        format!("http://{}/", self.addr)
    }

    pub fn client(&self) -> VwHttpClient {
        VwHttpClient::connect(
            &self.host(),
            Credentials::new(USER, PASSWD),
            ClientOptions::default(),
        )
        .unwrap()
    }

    pub fn requests(&self) -> usize {
        self.state.lock().unwrap().requests
    }

    pub fn inserted(&self) -> Vec<Value> {
        self.state.lock().unwrap().inserted.clone()
    }
}

fn with_state(
    state: SharedState,
) -> impl Filter<Extract = (SharedState,), Error = std::convert::Infallible> + Clone {
    warp::any().map(move || {
        state.lock().unwrap().requests += 1;
        state.clone()
    })
}

fn authorized() -> impl Filter<Extract = (bool,), Error = warp::Rejection> + Clone {
    warp::header::optional::<String>("authorization")
        .map(|header: Option<String>| header.as_deref() == Some(BASIC_AUTH))
}

fn status(code: StatusCode, message: &'static str) -> Response {
    warp::reply::with_status(message, code).into_response()
}

fn routes(
    state: SharedState,
) -> impl Filter<Extract = (Response,), Error = warp::Rejection> + Clone {
    let login = warp::path!("apilogin")
        .and(warp::post())
        .and(authorized())
        .and(with_state(state.clone()))
        .map(|ok: bool, _state: SharedState| {
            if ok {
                "logged in".into_response()
            } else {
                status(StatusCode::UNAUTHORIZED, "unauthorized")
            }
        });

    let new_run = warp::path!("apps" / "my_app" / "newmodelrun")
        .and(warp::post())
        .and(authorized())
        .and(warp::body::bytes())
        .and(with_state(state.clone()))
        .map(|ok: bool, body: Bytes, state: SharedState| {
            if !ok {
                return status(StatusCode::UNAUTHORIZED, "unauthorized");
            }
            let has_description = serde_json::from_slice::<Value>(&body)
                .ok()
                .and_then(|value| value.get("description").cloned())
                .is_some_and(|value| value.is_string());
            if !has_description {
                return status(StatusCode::BAD_REQUEST, "description required");
            }
            let mut state = state.lock().unwrap();
            let n = state.model_runs.len() + 1;
            let uuid = format!("{n:08x}-0000-4000-8000-{n:012x}");
            state.model_runs.push(uuid.clone());
            uuid.into_response()
        });

    let upload = warp::path!("apps" / "my_app" / "data")
        .and(warp::post())
        .and(authorized())
        .and(warp::header::<String>("content-type"))
        .and(warp::body::bytes())
        .and(with_state(state.clone()))
        .map(|ok: bool, content_type: String, body: Bytes, state: SharedState| {
            if !ok {
                return status(StatusCode::UNAUTHORIZED, "unauthorized");
            }
            let Some(parts) = parse_multipart(&content_type, &body) else {
                return status(StatusCode::BAD_REQUEST, "malformed multipart body");
            };
            let (Some(model_id), Some(name), Some(file)) =
                (parts.get("modelid"), parts.get("name"), parts.get("file"))
            else {
                return status(StatusCode::BAD_REQUEST, "name, modelid and file required");
            };
            let model_id = String::from_utf8_lossy(model_id).to_string();
            let name = String::from_utf8_lossy(name).to_string();

            let mut state = state.lock().unwrap();
            let bin = format!("{}files/{model_id}/{name}", state.base_url);
            state.files.insert(format!("{model_id}/{name}"), file.clone());
            state.records.push(json!({
                "model_run_uuid": model_id,
                "name": name,
                "downloads": [{ "name": name, "bin": bin }]
            }));
            "uploaded".into_response()
        });

    let insert = warp::path!("apps" / "my_app" / "datasets")
        .and(warp::put())
        .and(authorized())
        .and(warp::body::bytes())
        .and(with_state(state.clone()))
        .map(|ok: bool, body: Bytes, state: SharedState| {
            if !ok {
                return status(StatusCode::UNAUTHORIZED, "unauthorized");
            }
            let Ok(document) = serde_json::from_slice::<Value>(&body) else {
                return status(StatusCode::BAD_REQUEST, "body is not JSON");
            };
            if document.get("model_run_uuid").and_then(Value::as_str).is_none() {
                return status(StatusCode::BAD_REQUEST, "model_run_uuid required");
            }
            let xml = document
                .pointer("/metadata/xml")
                .and_then(Value::as_str)
                .unwrap_or("");
            if !xml.starts_with("<?xml") || !xml.trim_end().ends_with("</metadata>") {
                return status(StatusCode::BAD_REQUEST, "malformed FGDC metadata");
            }
            let mut state = state.lock().unwrap();
            state.inserted.push(document.clone());
            state.records.push(document);
            format!("dataset-{}", state.inserted.len()).into_response()
        });

    let search = warp::path!("apps" / "my_app" / "search" / "datasets.json")
        .and(warp::get())
        .and(authorized())
        .and(warp::query::<HashMap<String, String>>())
        .and(with_state(state.clone()))
        .map(|ok: bool, params: HashMap<String, String>, state: SharedState| {
            if !ok {
                return status(StatusCode::UNAUTHORIZED, "unauthorized");
            }
            if params.get("version").map(String::as_str) != Some("3") {
                return status(StatusCode::BAD_REQUEST, "unsupported search version");
            }
            let state = state.lock().unwrap();
            let matching: Vec<Value> = state
                .records
                .iter()
                .filter(|record| {
                    params.get("model_run_uuid").is_none_or(|uuid| {
                        record.get("model_run_uuid").and_then(Value::as_str) == Some(uuid.as_str())
                    })
                })
                .cloned()
                .collect();
            let total = matching.len();
            let limit = params
                .get("limit")
                .and_then(|limit| limit.parse::<usize>().ok())
                .unwrap_or(total);
            let page: Vec<Value> = matching.into_iter().take(limit).collect();
            warp::reply::json(&json!({
                "total": total,
                "subtotal": page.len(),
                "results": page
            }))
            .into_response()
        });

    let files = warp::path!("files" / String / String)
        .and(warp::get())
        .and(authorized())
        .and(with_state(state.clone()))
        .map(|uuid: String, name: String, ok: bool, state: SharedState| {
            if !ok {
                return status(StatusCode::UNAUTHORIZED, "unauthorized");
            }
            match state.lock().unwrap().files.get(&format!("{uuid}/{name}")) {
                Some(bytes) => bytes.clone().into_response(),
                None => status(StatusCode::NOT_FOUND, "no such file"),
            }
        });

    let status_route = warp::path!("status" / u16)
        .and(with_state(state))
        .map(|code: u16, _state: SharedState| {
            let code = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            status(code, "status")
        });

    login
        .or(new_run)
        .unify()
        .or(upload)
        .unify()
        .or(insert)
        .unify()
        .or(search)
        .unify()
        .or(files)
        .unify()
        .or(status_route)
        .unify()
}

/// Splits a `multipart/form-data` body into named parts. Only handles the
/// text payloads the tests upload.
fn parse_multipart(content_type: &str, body: &[u8]) -> Option<HashMap<String, Vec<u8>>> {
    let boundary = content_type.split("boundary=").nth(1)?.trim_matches('"');
    let delimiter = format!("--{boundary}");
    let text = std::str::from_utf8(body).ok()?;

    let mut parts = HashMap::new();
    for section in text.split(delimiter.as_str()) {
        let section = section.strip_prefix("\r\n").unwrap_or(section);
        if section.is_empty() || section.starts_with("--") {
            continue;
        }
        let (headers, content) = section.split_once("\r\n\r\n")?;
        let name = headers.split("name=\"").nth(1)?.split('"').next()?;
        let content = content.strip_suffix("\r\n").unwrap_or(content);
        parts.insert(name.to_string(), content.as_bytes().to_vec());
    }
    Some(parts)
}

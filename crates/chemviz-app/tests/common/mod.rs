//! Shared fakes for app integration tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use chemviz_app::{Dashboard, ReportTransport};
use chemviz_auth::{AuthToken, AuthTransport, ProbeOutcome};
use chemviz_core::{ApiEndpoints, ThemePreference};
use chemviz_prefs::{FixedAmbient, MemoryPreferenceStore, PreferenceStore, ThemeCell};
use chemviz_upload::{FileRef, UploadError, UploadTransport};
use url::Url;

/// Documented upload response for `equipment.csv`.
#[allow(dead_code)]
pub const UPLOAD_BODY: &str = r#"{
    "message": "File uploaded and processed successfully",
    "statistics": {
        "total_count": 3,
        "average_flowrate": 120.5,
        "average_pressure": 5.25,
        "average_temperature": 110.0,
        "type_distribution": {"Pump": 2, "Valve": 1}
    },
    "batch_id": 42
}"#;

/// Scripted stand-in for the analytics service.
#[derive(Debug)]
pub struct FakeServer {
    probe: ProbeOutcome,
    uploads: Mutex<VecDeque<Result<String, UploadError>>>,
    report: Mutex<Option<Result<Vec<u8>, UploadError>>>,
    seen: Mutex<Vec<String>>,
}

#[allow(dead_code)]
impl FakeServer {
    /// Server answering the login probe with `probe`.
    pub fn new(probe: ProbeOutcome) -> Self {
        Self {
            probe,
            uploads: Mutex::new(VecDeque::new()),
            report: Mutex::new(None),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Server accepting credentials the way the real service does (405).
    pub fn accepting() -> Self {
        Self::new(ProbeOutcome::Status(405))
    }

    /// Queues the next upload reply.
    pub fn push_upload(self, reply: Result<String, UploadError>) -> Self {
        self.uploads.lock().expect("uploads lock").push_back(reply);
        self
    }

    /// Sets the report download reply.
    pub fn with_report(self, reply: Result<Vec<u8>, UploadError>) -> Self {
        *self.report.lock().expect("report lock") = Some(reply);
        self
    }

    /// Requests seen so far, as `"<kind> <url-or-file>"`.
    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().expect("seen lock").clone()
    }

    fn record(&self, entry: String) {
        self.seen.lock().expect("seen lock").push(entry);
    }
}

impl AuthTransport for FakeServer {
    fn probe(&self, _token: &AuthToken) -> ProbeOutcome {
        self.record("probe".to_string());
        self.probe.clone()
    }
}

impl UploadTransport for FakeServer {
    fn upload(&self, file: &FileRef, _token: &AuthToken) -> Result<String, UploadError> {
        self.record(format!("upload {}", file.name()));
        self.uploads
            .lock()
            .expect("uploads lock")
            .pop_front()
            .unwrap_or_else(|| Err(UploadError::Server(500)))
    }
}

impl ReportTransport for FakeServer {
    fn fetch_report(&self, url: &Url, _token: &AuthToken) -> Result<Vec<u8>, UploadError> {
        self.record(format!("report {url}"));
        self.report
            .lock()
            .expect("report lock")
            .clone()
            .unwrap_or(Err(UploadError::Client(404)))
    }
}

/// Endpoints of a local test service.
#[allow(dead_code)]
pub fn endpoints() -> ApiEndpoints {
    ApiEndpoints::parse("http://127.0.0.1:8000/").expect("test base URL should parse")
}

/// Starts a dashboard over `store` with a light ambient theme.
#[allow(dead_code)]
pub fn start(store: &Arc<MemoryPreferenceStore>) -> Dashboard {
    let store: Arc<dyn PreferenceStore> = store.clone();
    Dashboard::start(
        endpoints(),
        store,
        Arc::new(ThemeCell::new()),
        &FixedAmbient(ThemePreference::Light),
    )
}

/// Sample CSV file reference.
#[allow(dead_code)]
pub fn equipment_csv() -> FileRef {
    FileRef::new(
        "equipment.csv",
        "Equipment Name,Type,Flowrate,Pressure,Temperature\nP-1,Pump,120,5,110\n",
    )
}

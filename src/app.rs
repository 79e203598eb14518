use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Request, State},
    http::{StatusCode, header},
    middleware::{self, Next},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tower_http::services::ServeDir;
use uuid::Uuid;

use crate::config::Config;
use crate::document::PDF_FILE_NAME;
use crate::downloader::{CSV_FILE_NAME, XLSX_FILE_NAME};
use crate::error::GroupError;
use crate::google::{self, GoogleClient};
use crate::loader;
use crate::login::{self, SessionStore, UserStore};
use crate::workspace::{Workspace, WorkspaceView};

/// Name of the cookie identifying a browser's workspace
pub const WORKSPACE_COOKIE: &str = "workspace";

const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;
const SWEEP_INTERVAL: Duration = Duration::from_secs(600);

const PDF_CONTENT_TYPE: &str = "application/pdf";
const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
const CSV_CONTENT_TYPE: &str = "text/csv; charset=utf-8";

pub struct AppState {
    pub config: Config,
    pub users: UserStore,
    pub sessions: SessionStore,
    pub workspaces: WorkspaceStore,
    pub google: Option<GoogleClient>,
}

impl AppState {
    /// Build the state and make sure the user file exists
    pub fn new(config: Config) -> std::io::Result<Self> {
        let users = UserStore::new(config.users_file());
        users.init()?;

        let google = config.google().map(GoogleClient::new);
        if google.is_none() {
            log::info!("Google sign-in disabled: client id, secret or redirect URL not set");
        }

        Ok(AppState {
            sessions: SessionStore::new(config.session_lifetime()),
            workspaces: WorkspaceStore::new(config.session_lifetime()),
            users,
            google,
            config,
        })
    }
}

/// A workspace shared between the requests of one browser
pub type SharedWorkspace = Arc<Mutex<Workspace>>;

struct WorkspaceEntry {
    workspace: SharedWorkspace,
    touched: DateTime<Utc>,
}

/// In-memory workspaces keyed by the workspace cookie
///
/// The map lock is only held to look an entry up. Each workspace has its
/// own lock, held for the duration of one action.
pub struct WorkspaceStore {
    entries: Mutex<HashMap<String, WorkspaceEntry>>,
    idle_limit: chrono::Duration,
}

impl WorkspaceStore {
    pub fn new(idle_limit: chrono::Duration) -> Self {
        WorkspaceStore {
            entries: Mutex::new(HashMap::new()),
            idle_limit,
        }
    }

    fn lock_entries(&self) -> MutexGuard<'_, HashMap<String, WorkspaceEntry>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Workspace for `id`, created on first use
    pub fn open(&self, id: &str) -> SharedWorkspace {
        let mut entries = self.lock_entries();
        let entry = entries
            .entry(id.to_string())
            .or_insert_with(|| WorkspaceEntry {
                workspace: Arc::new(Mutex::new(Workspace::new())),
                touched: Utc::now(),
            });
        entry.touched = Utc::now();
        Arc::clone(&entry.workspace)
    }

    /// Existing workspace for `id`; never creates one
    pub fn find(&self, id: &str) -> Option<SharedWorkspace> {
        let mut entries = self.lock_entries();
        let entry = entries.get_mut(id)?;
        entry.touched = Utc::now();
        Some(Arc::clone(&entry.workspace))
    }

    /// Run one action against a workspace, creating it on first use
    pub fn with<T>(&self, id: &str, action: impl FnOnce(&mut Workspace) -> T) -> T {
        let workspace = self.open(id);
        let mut guard = lock_workspace(&workspace);
        action(&mut *guard)
    }

    /// Forget workspaces idle for longer than the limit
    pub fn prune(&self) -> usize {
        let cutoff = Utc::now() - self.idle_limit;
        let mut entries = self.lock_entries();
        let before = entries.len();
        entries.retain(|_, entry| entry.touched > cutoff);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.lock_entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn lock_workspace(workspace: &SharedWorkspace) -> MutexGuard<'_, Workspace> {
    workspace.lock().unwrap_or_else(|e| e.into_inner())
}

#[derive(Deserialize)]
struct GenerateRequest {
    text: String,
    // Accept both "3" and 3; the field is validated like typed input
    #[serde(default)]
    group_size: serde_json::Value,
}

#[derive(Deserialize)]
struct ShuffleRequest {
    #[serde(default)]
    text: Option<String>,
}

impl IntoResponse for GroupError {
    fn into_response(self) -> Response {
        let status = match &self {
            GroupError::EmptyInput
            | GroupError::InvalidGroupSize
            | GroupError::NothingToShuffle => StatusCode::UNPROCESSABLE_ENTITY,
            GroupError::UnsupportedFormat(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            GroupError::ImportFailed(_) => StatusCode::BAD_REQUEST,
            GroupError::NoGroupsToExport => StatusCode::CONFLICT,
            GroupError::ExportFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if let Some(detail) = self.detail() {
            log::debug!("{}: {}", self, detail);
        }
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    let static_dir = ServeDir::new(&state.config.static_dir);

    Router::new()
        .route("/", get(serve_index))
        .route("/login", get(login::serve_login_page))
        .route("/api/workspace", get(get_workspace))
        .route("/api/generate", post(generate_groups))
        .route("/api/shuffle", post(shuffle_items))
        .route("/api/import", post(import_file))
        .route("/api/export/pdf", get(export_pdf))
        .route("/api/export/xlsx", get(export_xlsx))
        .route("/api/export/csv", get(export_csv))
        .route("/api/me", get(login::current_user))
        .route("/auth/signup", post(login::handle_signup))
        .route("/auth/login", post(login::handle_login))
        .route("/auth/logout", post(login::handle_logout))
        .route("/auth/google", get(google::google_start))
        .route("/auth/callback", get(google::google_callback))
        .nest_service("/static", static_dir)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(middleware::from_fn(log_requests))
        .with_state(state)
}

pub async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let state = Arc::new(AppState::new(config)?);
    let app = router(state.clone());

    let sweeper = state.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SWEEP_INTERVAL);
        loop {
            interval.tick().await;
            let sessions = sweeper.sessions.purge_expired();
            let workspaces = sweeper.workspaces.prune();
            if sessions + workspaces > 0 {
                log::debug!(
                    "expired {} sessions and {} idle workspaces",
                    sessions,
                    workspaces
                );
            }
        }
    });

    let listener = TcpListener::bind(state.config.bind).await?;
    log::info!("Listening on http://{}", state.config.bind);
    axum::serve(listener, app).await?;

    Ok(())
}

async fn log_requests(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started = Instant::now();

    let response = next.run(request).await;

    log::info!(
        "{} {} -> {} ({:?})",
        method,
        path,
        response.status().as_u16(),
        started.elapsed()
    );
    response
}

/// Workspace id from the browser's cookie, if it carries a valid one
fn existing_workspace_id(jar: &CookieJar) -> Option<String> {
    jar.get(WORKSPACE_COOKIE)
        .map(|cookie| cookie.value())
        .filter(|value| Uuid::parse_str(value).is_ok())
        .map(str::to_string)
}

/// Reuse the browser's workspace id or issue a new one
fn workspace_id(jar: CookieJar) -> (CookieJar, String) {
    if let Some(id) = existing_workspace_id(&jar) {
        return (jar, id);
    }

    let id = Uuid::new_v4().to_string();
    let cookie = Cookie::build((WORKSPACE_COOKIE, id.clone()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build();
    (jar.add(cookie), id)
}

fn size_field(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(text) => text.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn download(content_type: &'static str, file_name: &str, body: Vec<u8>) -> Response {
    (
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file_name),
            ),
        ],
        body,
    )
        .into_response()
}

async fn serve_index() -> Html<&'static str> {
    Html(include_str!("./static/index.html"))
}

/// Current view; browsers without a workspace see an empty one
async fn get_workspace(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Json<WorkspaceView> {
    let view = existing_workspace_id(&jar)
        .and_then(|id| state.workspaces.find(&id))
        .map(|workspace| {
            let guard = lock_workspace(&workspace);
            guard.view()
        })
        .unwrap_or_else(|| Workspace::new().view());
    Json(view)
}

async fn generate_groups(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(payload): Json<GenerateRequest>,
) -> Response {
    let (jar, id) = workspace_id(jar);
    let result = state.workspaces.with(&id, |workspace| {
        workspace.set_input(payload.text);
        workspace.set_group_size(size_field(&payload.group_size));
        workspace.generate().map(|_| ())?;
        Ok::<_, GroupError>(workspace.view())
    });

    match result {
        Ok(view) => (jar, Json(view)).into_response(),
        Err(e) => (jar, e).into_response(),
    }
}

async fn shuffle_items(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(payload): Json<ShuffleRequest>,
) -> Response {
    let (jar, id) = workspace_id(jar);
    let result = state.workspaces.with(&id, |workspace| {
        if let Some(text) = payload.text {
            workspace.set_input(text);
        }
        workspace.shuffle().map(|_| ())?;
        Ok::<_, GroupError>(workspace.view())
    });

    match result {
        Ok(view) => (jar, Json(view)).into_response(),
        Err(e) => (jar, e).into_response(),
    }
}

async fn import_file(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    multipart: Multipart,
) -> Response {
    let (jar, id) = workspace_id(jar);

    // The whole upload is read before anything is parsed
    let (file_name, bytes) = match read_upload(multipart).await {
        Ok(upload) => upload,
        Err(e) => return (jar, e).into_response(),
    };

    // Parse off the async workers and outside the workspace lock
    let name = file_name.clone();
    let parsed = tokio::task::spawn_blocking(move || loader::import_bytes(&name, bytes))
        .await
        .unwrap_or_else(|e| Err(GroupError::ImportFailed(format!("import task failed: {}", e))));

    let result = state.workspaces.with(&id, |workspace| {
        workspace.apply_import(&file_name, parsed).map(|_| ())?;
        Ok::<_, GroupError>(workspace.view())
    });

    match result {
        Ok(view) => {
            log::info!("imported {} items from {}", view.item_count, file_name);
            (jar, Json(view)).into_response()
        }
        Err(e) => (jar, e).into_response(),
    }
}

async fn read_upload(mut multipart: Multipart) -> Result<(String, Vec<u8>), GroupError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| GroupError::ImportFailed(format!("malformed upload: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| GroupError::ImportFailed(format!("failed to read upload: {}", e)))?;
        return Ok((file_name, bytes.to_vec()));
    }

    Err(GroupError::ImportFailed("no file field in upload".into()))
}

/// Run an export on the browser's existing workspace
///
/// Rendering happens on the blocking pool. A browser without a workspace
/// has no groups to export.
async fn export_with<T: Send + 'static>(
    state: &AppState,
    jar: &CookieJar,
    export: fn(&mut Workspace) -> Result<T, GroupError>,
) -> Result<T, GroupError> {
    let workspace = existing_workspace_id(jar)
        .and_then(|id| state.workspaces.find(&id))
        .ok_or(GroupError::NoGroupsToExport)?;

    tokio::task::spawn_blocking(move || {
        let mut guard = lock_workspace(&workspace);
        export(&mut *guard)
    })
    .await
    .map_err(|e| GroupError::ExportFailed(format!("export task failed: {}", e)))?
}

async fn export_pdf(State(state): State<Arc<AppState>>, jar: CookieJar) -> Response {
    match export_with(&state, &jar, Workspace::export_pdf).await {
        Ok(bytes) => download(PDF_CONTENT_TYPE, PDF_FILE_NAME, bytes),
        Err(e) => e.into_response(),
    }
}

async fn export_xlsx(State(state): State<Arc<AppState>>, jar: CookieJar) -> Response {
    match export_with(&state, &jar, Workspace::export_xlsx).await {
        Ok(bytes) => download(XLSX_CONTENT_TYPE, XLSX_FILE_NAME, bytes),
        Err(e) => e.into_response(),
    }
}

async fn export_csv(State(state): State<Arc<AppState>>, jar: CookieJar) -> Response {
    match export_with(&state, &jar, Workspace::export_csv).await {
        Ok(csv) => download(CSV_CONTENT_TYPE, CSV_FILE_NAME, csv.into_bytes()),
        Err(e) => e.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::thread;

    #[test]
    fn size_field_accepts_strings_and_numbers() {
        assert_eq!(size_field(&serde_json::json!("3")), "3");
        assert_eq!(size_field(&serde_json::json!(4)), "4");
        assert_eq!(size_field(&serde_json::json!(2.5)), "2.5");
        assert_eq!(size_field(&serde_json::Value::Null), "");
    }

    #[test]
    fn workspaces_are_created_on_first_use_and_pruned() {
        let store = WorkspaceStore::new(chrono::Duration::hours(1));
        store.with("a", |ws| ws.set_input("x"));
        assert_eq!(store.with("a", |ws| ws.input().to_string()), "x");
        assert_eq!(store.len(), 1);
        assert_eq!(store.prune(), 0);

        let stale = WorkspaceStore::new(chrono::Duration::seconds(-1));
        stale.with("b", |_| ());
        assert_eq!(stale.prune(), 1);
        assert!(stale.is_empty());
    }

    #[test]
    fn find_never_creates_a_workspace() {
        let store = WorkspaceStore::new(chrono::Duration::hours(1));
        assert!(store.find("missing").is_none());
        assert!(store.is_empty());

        store.with("a", |ws| ws.set_input("x"));
        let found = store.find("a").map(|ws| {
            let guard = lock_workspace(&ws);
            guard.input().to_string()
        });
        assert_eq!(found, Some("x".to_string()));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn busy_workspace_does_not_block_others() {
        let store = Arc::new(WorkspaceStore::new(chrono::Duration::hours(1)));
        let (started_tx, started_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();

        let busy = {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                store.with("a", |ws| {
                    started_tx.send(()).unwrap();
                    let _ = release_rx.recv_timeout(Duration::from_secs(5));
                    ws.set_input("slow");
                })
            })
        };
        started_rx.recv().unwrap();

        let started = Instant::now();
        store.with("b", |ws| ws.set_input("quick"));
        let waited = started.elapsed();

        release_tx.send(()).unwrap();
        busy.join().unwrap();

        assert!(waited < Duration::from_secs(1), "waited {:?}", waited);
        assert_eq!(store.with("a", |ws| ws.input().to_string()), "slow");
        assert_eq!(store.with("b", |ws| ws.input().to_string()), "quick");
    }

    #[test]
    fn workspace_cookie_is_reused_when_valid() {
        let (jar, id) = workspace_id(CookieJar::new());
        assert_eq!(jar.get(WORKSPACE_COOKIE).map(|c| c.value().to_string()), Some(id.clone()));

        let (_, again) = workspace_id(jar);
        assert_eq!(again, id);

        let forged = CookieJar::new().add(Cookie::new(WORKSPACE_COOKIE, "../../etc"));
        let (_, replaced) = workspace_id(forged);
        assert!(Uuid::parse_str(&replaced).is_ok());
    }
}

use std::cell::Cell;
use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

use crate::api::TaskApi;
use crate::dashboard::Dashboard;
use crate::events::{Effect, Event};
use crate::navigation::Route;
use crate::session::{CredentialStatus, Session};
use crate::state::DashboardState;
use crate::storage::{Storage, StorageError};

/// Host services the dashboard needs besides the API.
pub trait DashboardCtx {
    fn load_session(&self) -> Result<Option<Session>, StorageError>;
    fn clear_session(&self) -> Result<(), StorageError>;
    fn navigate(&self, route: Route);
}

/// Credential on disk, navigation recorded for the front-end to act on.
pub struct StorageCtx {
    storage: Storage,
    route: Cell<Route>,
}

impl StorageCtx {
    pub fn new(storage: Storage) -> Self {
        Self {
            storage,
            route: Cell::new(Route::Dashboard),
        }
    }

    pub fn current_route(&self) -> Route {
        self.route.get()
    }
}

impl DashboardCtx for StorageCtx {
    fn load_session(&self) -> Result<Option<Session>, StorageError> {
        self.storage.load_session()
    }

    fn clear_session(&self) -> Result<(), StorageError> {
        self.storage.clear_session()
    }

    fn navigate(&self, route: Route) {
        log::info!("navigate route={route}");
        self.route.set(route);
    }
}

/// Request results waiting to be fed back into the runtime.
pub struct Completions {
    rx: UnboundedReceiver<Event>,
}

impl Completions {
    pub async fn recv(&mut self) -> Option<Event> {
        self.rx.recv().await
    }
}

type Clock = Box<dyn Fn() -> DateTime<Utc>>;

/// Runs the dashboard on one task. Requests run concurrently on tokio, but
/// their results only touch the state through `dispatch`.
pub struct Runtime<A, C> {
    api: Arc<A>,
    ctx: C,
    dashboard: Dashboard,
    session: Option<Session>,
    tx: UnboundedSender<Event>,
    in_flight: usize,
    clock: Clock,
}

impl<A, C> Runtime<A, C>
where
    A: TaskApi + 'static,
    C: DashboardCtx,
{
    pub fn new(api: Arc<A>, ctx: C) -> (Self, Completions) {
        let (tx, rx) = unbounded_channel();
        let runtime = Self {
            api,
            ctx,
            dashboard: Dashboard::new(),
            session: None,
            tx,
            in_flight: 0,
            clock: Box::new(Utc::now),
        };
        (runtime, Completions { rx })
    }

    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Utc> + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn state(&self) -> &DashboardState {
        self.dashboard.state()
    }

    pub fn ctx(&self) -> &C {
        &self.ctx
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// Reads the stored credential and starts the dashboard.
    pub fn mount(&mut self) {
        let session = match self.ctx.load_session() {
            Ok(session) => session,
            Err(err) => {
                log::error!("failed to read stored credential err={err}");
                None
            }
        };
        let status = CredentialStatus::of(session.as_ref(), (self.clock)());
        self.session = session.filter(|_| status == CredentialStatus::Present);
        self.dispatch(Event::Mounted(status));
    }

    pub fn dispatch(&mut self, event: Event) {
        if event.is_completion() {
            self.in_flight = self.in_flight.saturating_sub(1);
        }
        let mut queue = VecDeque::from([event]);
        while let Some(event) = queue.pop_front() {
            for effect in self.dashboard.handle(event) {
                if let Some(follow_up) = self.execute(effect) {
                    queue.push_back(follow_up);
                }
            }
        }
    }

    /// Processes completions until no request is outstanding.
    pub async fn settle(&mut self, completions: &mut Completions) {
        while self.in_flight > 0 {
            match completions.recv().await {
                Some(event) => self.dispatch(event),
                None => break,
            }
        }
    }

    fn execute(&mut self, effect: Effect) -> Option<Event> {
        if effect.needs_session() {
            let Some(session) = self.session.clone() else {
                log::warn!("no session for request effect={effect:?}");
                return None;
            };
            if session.is_expired((self.clock)()) {
                return Some(Event::SessionExpired);
            }
            self.spawn_request(session, effect);
            return None;
        }
        match effect {
            Effect::ClearCredential => {
                self.session = None;
                if let Err(err) = self.ctx.clear_session() {
                    log::error!("failed to clear stored credential err={err}");
                }
            }
            Effect::Navigate(route) => self.ctx.navigate(route),
            other => log::warn!("unhandled effect effect={other:?}"),
        }
        None
    }

    fn spawn_request(&mut self, session: Session, effect: Effect) {
        let api = Arc::clone(&self.api);
        let tx = self.tx.clone();
        self.in_flight += 1;
        tokio::spawn(async move {
            let Some(event) = perform(api.as_ref(), &session, effect).await else {
                return;
            };
            if tx.send(event).is_err() {
                log::debug!("dashboard closed before request finished");
            }
        });
    }
}

async fn perform<A: TaskApi + ?Sized>(api: &A, session: &Session, effect: Effect) -> Option<Event> {
    let event = match effect {
        Effect::FetchProfile => Event::ProfileLoaded(api.get_profile(session).await),
        Effect::FetchTasks { seq, query } => Event::TasksLoaded {
            seq,
            result: api.list_tasks(session, &query).await,
        },
        Effect::CreateTask { title } => Event::TaskCreated(api.create_task(session, &title).await),
        Effect::UpdateTask { id, title } => {
            let result = api.update_task(session, &id, &title).await;
            Event::TaskUpdated { id, result }
        }
        Effect::DeleteTask { id } => {
            let result = api.delete_task(session, &id).await;
            Event::TaskDeleted { id, result }
        }
        Effect::ClearCredential | Effect::Navigate(_) => return None,
    };
    Some(event)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ApiError, ApiResult};
    use crate::models::{Task, UserProfile};
    use crate::state::{EditState, TaskList};
    use crate::view::render;
    use async_trait::async_trait;
    use chrono::{Duration, TimeZone};
    use std::cell::RefCell;
    use std::sync::Mutex;

    /// In-memory credential plus a route log.
    #[derive(Default)]
    struct MemoryCtx {
        session: RefCell<Option<Session>>,
        routes: RefCell<Vec<Route>>,
        clears: Cell<usize>,
    }

    impl MemoryCtx {
        fn with_session(session: Session) -> Self {
            Self {
                session: RefCell::new(Some(session)),
                ..Self::default()
            }
        }

        fn session(&self) -> Option<Session> {
            self.session.borrow().clone()
        }

        fn routes(&self) -> Vec<Route> {
            self.routes.borrow().clone()
        }

        fn clears(&self) -> usize {
            self.clears.get()
        }
    }

    impl DashboardCtx for MemoryCtx {
        fn load_session(&self) -> Result<Option<Session>, StorageError> {
            Ok(self.session.borrow().clone())
        }

        fn clear_session(&self) -> Result<(), StorageError> {
            self.clears.set(self.clears.get() + 1);
            *self.session.borrow_mut() = None;
            Ok(())
        }

        fn navigate(&self, route: Route) {
            self.routes.borrow_mut().push(route);
        }
    }

    /// In-memory backend recording every call in order.
    #[derive(Default)]
    struct FakeApi {
        profile: Option<UserProfile>,
        tasks: Mutex<Vec<Task>>,
        next_id: Mutex<u32>,
        calls: Mutex<Vec<String>>,
        fail_mutations: bool,
    }

    impl FakeApi {
        fn signed_in(name: &str, tasks: Vec<Task>) -> Self {
            Self {
                profile: Some(UserProfile {
                    name: name.to_string(),
                    email: format!("{}@example.com", name.to_lowercase()),
                }),
                tasks: Mutex::new(tasks),
                next_id: Mutex::new(100),
                ..Self::default()
            }
        }

        fn record(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn mutation_result(&self) -> ApiResult<()> {
            if self.fail_mutations {
                return Err(ApiError::Status {
                    status: 500,
                    body: "boom".to_string(),
                });
            }
            Ok(())
        }
    }

    #[async_trait]
    impl TaskApi for FakeApi {
        async fn get_profile(&self, _session: &Session) -> ApiResult<UserProfile> {
            self.record("GET /auth/profile".to_string());
            self.profile.clone().ok_or(ApiError::Unauthorized(401))
        }

        async fn list_tasks(&self, _session: &Session, search: &str) -> ApiResult<Vec<Task>> {
            self.record(format!("GET /tasks?search={search}"));
            let needle = search.to_lowercase();
            Ok(self
                .tasks
                .lock()
                .unwrap()
                .iter()
                .filter(|task| task.title.to_lowercase().contains(&needle))
                .cloned()
                .collect())
        }

        async fn create_task(&self, _session: &Session, title: &str) -> ApiResult<()> {
            self.record(format!("POST /tasks {title}"));
            self.mutation_result()?;
            let mut next_id = self.next_id.lock().unwrap();
            *next_id += 1;
            self.tasks
                .lock()
                .unwrap()
                .push(make_task(&next_id.to_string(), title));
            Ok(())
        }

        async fn update_task(&self, _session: &Session, id: &str, title: &str) -> ApiResult<()> {
            self.record(format!("PUT /tasks/{id} {title}"));
            self.mutation_result()?;
            let mut tasks = self.tasks.lock().unwrap();
            let task = tasks
                .iter_mut()
                .find(|task| task.id == id)
                .ok_or(ApiError::Status {
                    status: 404,
                    body: "not found".to_string(),
                })?;
            task.title = title.to_string();
            Ok(())
        }

        async fn delete_task(&self, _session: &Session, id: &str) -> ApiResult<()> {
            self.record(format!("DELETE /tasks/{id}"));
            self.mutation_result()?;
            self.tasks.lock().unwrap().retain(|task| task.id != id);
            Ok(())
        }
    }

    fn make_task(id: &str, title: &str) -> Task {
        Task {
            id: id.to_string(),
            title: title.to_string(),
            description: None,
        }
    }

    fn start(
        api: FakeApi,
        ctx: MemoryCtx,
    ) -> (Arc<FakeApi>, Runtime<FakeApi, MemoryCtx>, Completions) {
        let api = Arc::new(api);
        let (runtime, completions) = Runtime::new(Arc::clone(&api), ctx);
        (api, runtime, completions)
    }

    fn visible_titles(runtime: &Runtime<FakeApi, MemoryCtx>) -> Vec<String> {
        runtime
            .state()
            .ready()
            .expect("ready")
            .tasks
            .visible()
            .iter()
            .map(|task| task.title.clone())
            .collect()
    }

    #[tokio::test]
    async fn missing_credential_redirects_before_any_request() {
        let (api, mut runtime, mut completions) =
            start(FakeApi::signed_in("Ann", Vec::new()), MemoryCtx::default());

        runtime.mount();
        assert_eq!(runtime.ctx().routes(), vec![Route::Login]);
        assert_eq!(runtime.in_flight(), 0);

        runtime.settle(&mut completions).await;
        assert!(api.calls().is_empty());
        assert!(runtime.state().is_unauthenticated());
    }

    #[tokio::test]
    async fn expired_credential_is_cleared_without_requests() {
        let issued = Utc.timestamp_opt(1_000, 0).single().unwrap();
        let ctx = MemoryCtx::with_session(Session::with_ttl("tok", issued, Duration::minutes(5)));
        let (api, runtime, _completions) = start(FakeApi::signed_in("Ann", Vec::new()), ctx);
        let mut runtime = runtime.with_clock(move || issued + Duration::hours(1));

        runtime.mount();
        assert_eq!(runtime.ctx().clears(), 1);
        assert!(runtime.ctx().session().is_none());
        assert_eq!(runtime.ctx().routes(), vec![Route::Login]);
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn profile_failure_clears_credential_and_redirects_once() {
        let ctx = MemoryCtx::with_session(Session::new("tok"));
        let (api, mut runtime, mut completions) = start(FakeApi::default(), ctx);

        runtime.mount();
        assert!(runtime.ctx().routes().is_empty());
        runtime.settle(&mut completions).await;

        assert_eq!(api.calls(), vec!["GET /auth/profile"]);
        assert_eq!(runtime.ctx().clears(), 1);
        assert!(runtime.ctx().session().is_none());
        assert_eq!(runtime.ctx().routes(), vec![Route::Login]);
    }

    #[tokio::test]
    async fn signed_in_user_sees_welcome_and_tasks() {
        let ctx = MemoryCtx::with_session(Session::new("tok"));
        let (api, mut runtime, mut completions) =
            start(FakeApi::signed_in("Ann", vec![make_task("1", "Buy milk")]), ctx);

        runtime.mount();
        assert_eq!(render(runtime.state()), vec!["Loading..."]);
        runtime.settle(&mut completions).await;

        assert_eq!(api.calls(), vec!["GET /auth/profile", "GET /tasks?search="]);
        let screen = render(runtime.state()).join("\n");
        assert!(screen.contains("Welcome, Ann"));
        assert!(screen.contains("Buy milk  [Edit] [Delete]"));
        assert!(!screen.contains("Loading tasks..."));
        assert!(!screen.contains("No tasks found."));
        assert!(runtime.ctx().routes().is_empty());
    }

    #[tokio::test]
    async fn search_without_matches_shows_empty_message() {
        let ctx = MemoryCtx::with_session(Session::new("tok"));
        let (api, mut runtime, mut completions) =
            start(FakeApi::signed_in("Ann", vec![make_task("1", "Walk dog")]), ctx);
        runtime.mount();
        runtime.settle(&mut completions).await;

        runtime.dispatch(Event::SearchChanged("milk".to_string()));
        assert!(render(runtime.state())
            .iter()
            .any(|line| line == "Loading tasks..."));
        runtime.settle(&mut completions).await;

        assert_eq!(api.calls().last().unwrap(), "GET /tasks?search=milk");
        assert!(render(runtime.state())
            .iter()
            .any(|line| line == "No tasks found."));
    }

    #[tokio::test]
    async fn delete_then_reload_drops_the_task() {
        let ctx = MemoryCtx::with_session(Session::new("tok"));
        let (api, mut runtime, mut completions) = start(
            FakeApi::signed_in("Ann", vec![make_task("1", "Buy milk"), make_task("2", "Walk dog")]),
            ctx,
        );
        runtime.mount();
        runtime.settle(&mut completions).await;
        assert_eq!(visible_titles(&runtime), vec!["Buy milk", "Walk dog"]);

        runtime.dispatch(Event::DeleteRequested("1".to_string()));
        runtime.settle(&mut completions).await;

        assert_eq!(
            api.calls()[2..].to_vec(),
            vec!["DELETE /tasks/1", "GET /tasks?search="]
        );
        assert_eq!(visible_titles(&runtime), vec!["Walk dog"]);
    }

    #[tokio::test]
    async fn create_and_edit_round_through_the_backend() {
        let ctx = MemoryCtx::with_session(Session::new("tok"));
        let (_api, mut runtime, mut completions) =
            start(FakeApi::signed_in("Ann", Vec::new()), ctx);
        runtime.mount();
        runtime.settle(&mut completions).await;

        runtime.dispatch(Event::TitleInputChanged("Buy milk".to_string()));
        runtime.dispatch(Event::CreateRequested);
        runtime.settle(&mut completions).await;
        assert_eq!(visible_titles(&runtime), vec!["Buy milk"]);
        assert!(runtime.state().ready().unwrap().title_input.is_empty());

        let id = runtime.state().ready().unwrap().tasks.visible()[0].id.clone();
        runtime.dispatch(Event::EditRequested(id));
        runtime.dispatch(Event::EditDraftChanged("Buy oat milk".to_string()));
        runtime.dispatch(Event::SaveRequested);
        runtime.settle(&mut completions).await;

        let ready = runtime.state().ready().unwrap();
        assert_eq!(ready.editing, EditState::Idle);
        assert_eq!(visible_titles(&runtime), vec!["Buy oat milk"]);
    }

    #[tokio::test]
    async fn failed_mutations_only_log() {
        let ctx = MemoryCtx::with_session(Session::new("tok"));
        let mut api = FakeApi::signed_in("Ann", vec![make_task("1", "Buy milk")]);
        api.fail_mutations = true;
        let (api, mut runtime, mut completions) = start(api, ctx);
        runtime.mount();
        runtime.settle(&mut completions).await;

        runtime.dispatch(Event::TitleInputChanged("New".to_string()));
        runtime.dispatch(Event::CreateRequested);
        runtime.dispatch(Event::DeleteRequested("1".to_string()));
        runtime.settle(&mut completions).await;

        let ready = runtime.state().ready().unwrap();
        assert_eq!(ready.title_input, "New");
        assert_eq!(ready.tasks, TaskList::Loaded(vec![make_task("1", "Buy milk")]));
        // No reload after the failures.
        assert_eq!(
            api.calls()
                .iter()
                .filter(|call| call.starts_with("GET /tasks"))
                .count(),
            1
        );
        assert!(runtime.ctx().routes().is_empty());
    }

    #[tokio::test]
    async fn logout_clears_credential_without_server_call() {
        let ctx = MemoryCtx::with_session(Session::new("tok"));
        let (api, mut runtime, mut completions) =
            start(FakeApi::signed_in("Ann", Vec::new()), ctx);
        runtime.mount();
        runtime.settle(&mut completions).await;
        let calls_before = api.calls().len();

        runtime.dispatch(Event::LogoutRequested);
        assert_eq!(runtime.ctx().clears(), 1);
        assert_eq!(runtime.ctx().routes(), vec![Route::Login]);
        assert_eq!(api.calls().len(), calls_before);
        assert_eq!(render(runtime.state()), vec!["Redirecting to /login"]);
    }

    #[tokio::test]
    async fn session_expiring_mid_use_ends_the_session() {
        let issued = Utc.timestamp_opt(1_000, 0).single().unwrap();
        let now = Arc::new(Mutex::new(issued));
        let clock_now = Arc::clone(&now);
        let ctx = MemoryCtx::with_session(Session::with_ttl("tok", issued, Duration::minutes(5)));
        let (api, runtime, mut completions) = start(FakeApi::signed_in("Ann", Vec::new()), ctx);
        let mut runtime = runtime.with_clock(move || *clock_now.lock().unwrap());

        runtime.mount();
        runtime.settle(&mut completions).await;
        assert!(runtime.state().ready().is_some());

        *now.lock().unwrap() = issued + Duration::minutes(10);
        runtime.dispatch(Event::SearchChanged("x".to_string()));

        assert!(runtime.state().is_unauthenticated());
        assert_eq!(runtime.ctx().clears(), 1);
        assert_eq!(runtime.ctx().routes(), vec![Route::Login]);
        assert_eq!(runtime.in_flight(), 0);
        assert!(!api.calls().iter().any(|call| call.ends_with("search=x")));
    }

    #[test]
    fn storage_ctx_reads_and_clears_the_credential_file() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::new(dir.path().to_path_buf());
        storage.save_session(&Session::new("tok")).unwrap();

        let ctx = StorageCtx::new(storage.clone());
        assert_eq!(ctx.current_route(), Route::Dashboard);
        assert_eq!(ctx.load_session().unwrap(), Some(Session::new("tok")));

        ctx.clear_session().unwrap();
        assert!(storage.load_session().unwrap().is_none());

        ctx.navigate(Route::Login);
        assert_eq!(ctx.current_route(), Route::Login);
    }

    #[tokio::test]
    async fn rest_client_drives_the_dashboard_end_to_end() {
        use crate::api::RestClient;
        use crate::config::DashboardConfig;
        use wiremock::matchers::{header, method, path, query_param};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/auth/profile"))
            .and(header("authorization", "Bearer tok"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "name": "Ann", "email": "ann@x.io" })),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/tasks"))
            .and(query_param("search", ""))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!([{ "_id": "1", "title": "Buy milk" }])),
            )
            .mount(&server)
            .await;

        let mut config = DashboardConfig::default();
        config.api_base_url = format!("{}/api", server.uri());
        let client = Arc::new(RestClient::new(&config).unwrap());
        let (mut runtime, mut completions) =
            Runtime::new(client, MemoryCtx::with_session(Session::new("tok")));

        runtime.mount();
        runtime.settle(&mut completions).await;

        let screen = render(runtime.state()).join("\n");
        assert!(screen.contains("Welcome, Ann"));
        assert!(screen.contains("Buy milk  [Edit] [Delete]"));
    }

    #[tokio::test]
    async fn bodiless_201_create_clears_input_and_reloads() {
        use crate::api::RestClient;
        use crate::config::DashboardConfig;
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/auth/profile"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "name": "Ann" })),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/tasks"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/tasks"))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let mut config = DashboardConfig::default();
        config.api_base_url = format!("{}/api", server.uri());
        let client = Arc::new(RestClient::new(&config).unwrap());
        let (mut runtime, mut completions) =
            Runtime::new(client, MemoryCtx::with_session(Session::new("tok")));
        runtime.mount();
        runtime.settle(&mut completions).await;

        runtime.dispatch(Event::TitleInputChanged("Buy milk".to_string()));
        runtime.dispatch(Event::CreateRequested);
        runtime.settle(&mut completions).await;

        assert!(runtime.state().ready().unwrap().title_input.is_empty());
        let list_calls = server
            .received_requests()
            .await
            .unwrap()
            .iter()
            .filter(|req| req.method.as_str() == "GET" && req.url.path() == "/api/tasks")
            .count();
        assert_eq!(list_calls, 2);
    }
}

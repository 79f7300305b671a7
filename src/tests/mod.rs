use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::fetcher::{AuthenticatedFetcher, FetchError, HttpResponse, Transport, TransportError};
use crate::frameworks;
use crate::reports::{
    distinct_frameworks, filter, summarize, FilterState, Report, ReportCatalog, ReportStatus,
    ReportSummary, ReportType, ReportView, Selection, Selector,
};
use crate::session::{CredentialStore, Credentials, Session, SessionError};

type Scripted = Result<HttpResponse, TransportError>;

#[derive(Default)]
struct ScriptedTransport {
    gets: Mutex<VecDeque<Scripted>>,
    posts: Mutex<VecDeque<Scripted>>,
    get_calls: Mutex<Vec<(String, String)>>,
    post_calls: Mutex<Vec<(String, serde_json::Value)>>,
    interleave: bool,
}

impl ScriptedTransport {
    fn new(gets: Vec<Scripted>, posts: Vec<Scripted>) -> Self {
        Self {
            gets: Mutex::new(gets.into()),
            posts: Mutex::new(posts.into()),
            ..Self::default()
        }
    }

    fn interleaving(mut self) -> Self {
        self.interleave = true;
        self
    }

    fn get_calls(&self) -> Vec<(String, String)> {
        self.get_calls.lock().unwrap().clone()
    }

    fn post_calls(&self) -> Vec<(String, serde_json::Value)> {
        self.post_calls.lock().unwrap().clone()
    }
}

fn unscripted() -> Scripted {
    Err(TransportError::Connection {
        message: "no scripted response".to_string(),
    })
}

impl Transport for ScriptedTransport {
    async fn get(&self, url: &str, bearer: &str) -> Result<HttpResponse, TransportError> {
        self.get_calls
            .lock()
            .unwrap()
            .push((url.to_string(), bearer.to_string()));
        let next = self.gets.lock().unwrap().pop_front().unwrap_or_else(unscripted);
        if self.interleave {
            tokio::task::yield_now().await;
        }
        next
    }

    async fn post_json(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> Result<HttpResponse, TransportError> {
        self.post_calls
            .lock()
            .unwrap()
            .push((url.to_string(), body.clone()));
        let next = self.posts.lock().unwrap().pop_front().unwrap_or_else(unscripted);
        if self.interleave {
            tokio::task::yield_now().await;
        }
        next
    }
}

const BASE: &str = "https://api.example.com/";
const URL: &str = "https://api.example.com/api/compliance/frameworks/";

fn ok(body: &str) -> Scripted {
    Ok(HttpResponse::new(200, body.as_bytes().to_vec()))
}

fn status(code: u16) -> Scripted {
    Ok(HttpResponse::new(code, Vec::new()))
}

fn fetcher(
    transport: ScriptedTransport,
    credentials: Credentials,
) -> AuthenticatedFetcher<ScriptedTransport> {
    AuthenticatedFetcher::new(transport, Arc::new(Session::in_memory(credentials)), BASE)
}

fn report(
    id: &str,
    status: ReportStatus,
    report_type: ReportType,
    view: ReportView,
    frameworks: &[&str],
    share_count: u64,
) -> Report {
    Report {
        id: id.to_string(),
        report_id: format!("RPT-{}", id.to_uppercase()),
        name: format!("Report {id}"),
        description: None,
        report_type,
        view,
        status,
        template_name: None,
        framework_names: frameworks.iter().map(|s| s.to_string()).collect(),
        share_count,
    }
}

fn collection() -> Vec<Report> {
    let mut soc = report(
        "r1",
        ReportStatus::Ready,
        ReportType::Readiness,
        ReportView::Executive,
        &["SOC 2", "ISO 27001"],
        4,
    );
    soc.name = "SOC 2 Type II Readiness".to_string();
    soc.template_name = Some("Board Pack".to_string());

    let mut gap = report(
        "r2",
        ReportStatus::Generating,
        ReportType::GapAnalysis,
        ReportView::Technical,
        &["HIPAA"],
        0,
    );
    gap.description = Some("Gap analysis against the Security Rule".to_string());

    let monitoring = report(
        "r3",
        ReportStatus::Pending,
        ReportType::ContinuousMonitoring,
        ReportView::Auditor,
        &["ISO 27001", "GDPR"],
        1,
    );
    let failed = report(
        "r4",
        ReportStatus::Failed,
        ReportType::AuditorReport,
        ReportView::Auditor,
        &[],
        0,
    );
    let exec = report(
        "r5",
        ReportStatus::Ready,
        ReportType::ExecutiveSummary,
        ReportView::Executive,
        &["SOC 2"],
        2,
    );
    vec![soc, gap, monitoring, failed, exec]
}

fn ids(reports: &[&Report]) -> Vec<String> {
    reports.iter().map(|r| r.id.clone()).collect()
}

#[test]
fn all_selectors_and_empty_query_return_everything_in_order() {
    let reports = collection();
    let visible = filter(&reports, &FilterState::default());
    assert_eq!(ids(&visible), vec!["r1", "r2", "r3", "r4", "r5"]);
}

#[test]
fn status_filter_admits_only_that_status() {
    let reports = collection();
    for wanted in ReportStatus::ALL {
        let state = FilterState {
            status: Selector::Only(wanted),
            ..FilterState::default()
        };
        let visible = filter(&reports, &state);
        assert!(visible.iter().all(|r| r.status == wanted));
        let expected = reports.iter().filter(|r| r.status == wanted).count();
        assert_eq!(visible.len(), expected);
    }
}

#[test]
fn search_ignores_letter_case() {
    let reports = collection();
    let exact = FilterState {
        query: "SOC 2 Type II".to_string(),
        ..FilterState::default()
    };
    let lowered = FilterState {
        query: "soc 2 type ii".to_string(),
        ..FilterState::default()
    };
    assert_eq!(ids(&filter(&reports, &exact)), vec!["r1"]);
    assert_eq!(ids(&filter(&reports, &exact)), ids(&filter(&reports, &lowered)));
}

#[test]
fn search_covers_every_text_field() {
    let reports = collection();
    let by = |query: &str| {
        let state = FilterState {
            query: query.to_string(),
            ..FilterState::default()
        };
        ids(&filter(&reports, &state))
    };
    assert_eq!(by("rpt-r4"), vec!["r4"]);
    assert_eq!(by("security rule"), vec!["r2"]);
    assert_eq!(by("gdpr"), vec!["r3"]);
    assert_eq!(by("board pack"), vec!["r1"]);
    assert!(by("nothing like this").is_empty());
}

#[test]
fn framework_filter_is_exact_and_case_sensitive() {
    let reports = collection();
    let state = |name: &str| FilterState {
        framework: Selector::Only(name.to_string()),
        ..FilterState::default()
    };
    assert_eq!(ids(&filter(&reports, &state("ISO 27001"))), vec!["r1", "r3"]);
    assert!(filter(&reports, &state("iso 27001")).is_empty());
    assert!(filter(&reports, &state("ISO")).is_empty());
}

#[test]
fn predicates_combine_with_and() {
    let reports = collection();
    let state = FilterState {
        query: "report".to_string(),
        status: Selector::Only(ReportStatus::Ready),
        report_type: Selector::Only(ReportType::ExecutiveSummary),
        view: Selector::Only(ReportView::Executive),
        framework: Selector::Only("SOC 2".to_string()),
    };
    assert_eq!(ids(&filter(&reports, &state)), vec!["r5"]);
}

#[test]
fn summary_ignores_filter_changes() {
    let catalog = ReportCatalog::new(collection());
    let before = catalog.summary();
    let narrowed = FilterState {
        status: Selector::Only(ReportStatus::Failed),
        ..FilterState::default()
    };
    assert_eq!(catalog.filter(&narrowed).len(), 1);
    assert_eq!(catalog.summary(), before);
    assert_eq!(before, summarize(catalog.reports()));
    assert_eq!(
        before,
        ReportSummary {
            total: 5,
            ready: 2,
            generating: 1,
            pending: 1,
            failed: 1,
            total_shares: 7,
        }
    );
}

#[test]
fn distinct_frameworks_are_sorted_and_unique() {
    let names = distinct_frameworks(&collection());
    assert_eq!(names, vec!["GDPR", "HIPAA", "ISO 27001", "SOC 2"]);
    let mut sorted = names.clone();
    sorted.sort();
    sorted.dedup();
    assert_eq!(sorted, names);
}

#[test]
fn empty_collection_yields_zeroes() {
    assert!(filter(&[], &FilterState::default()).is_empty());
    assert!(distinct_frameworks(&[]).is_empty());
    assert_eq!(summarize(&[]), ReportSummary::default());
}

#[test]
fn two_report_scenario_summary_and_status_filter() {
    let reports = vec![
        report(
            "r1",
            ReportStatus::Ready,
            ReportType::Readiness,
            ReportView::Executive,
            &[],
            2,
        ),
        report(
            "r2",
            ReportStatus::Failed,
            ReportType::Readiness,
            ReportView::Executive,
            &[],
            0,
        ),
    ];
    assert_eq!(
        summarize(&reports),
        ReportSummary {
            total: 2,
            ready: 1,
            generating: 0,
            pending: 0,
            failed: 1,
            total_shares: 2,
        }
    );
    let state = FilterState {
        status: Selector::Only(ReportStatus::Ready),
        ..FilterState::default()
    };
    assert_eq!(ids(&filter(&reports, &state)), vec!["r1"]);
}

#[test]
fn toggle_all_selects_visible_then_clears() {
    let reports = collection();
    let visible = filter(&reports, &FilterState::default());
    let mut selection = Selection::default();
    selection.toggle("r2");
    assert!(selection.contains("r2"));
    selection.toggle_all(&visible);
    assert_eq!(selection.ids().len(), 5);
    selection.toggle_all(&visible);
    assert!(selection.ids().is_empty());
    selection.toggle("r3");
    selection.toggle("r3");
    assert!(selection.ids().is_empty());
}

#[tokio::test]
async fn success_needs_no_refresh() {
    let f = fetcher(
        ScriptedTransport::new(vec![ok("[]")], vec![]),
        Credentials::new("a1", "r1"),
    );
    let body = f.get(URL).await.unwrap();
    assert_eq!(body, b"[]".to_vec());
    assert_eq!(f.transport().get_calls(), vec![(URL.to_string(), "a1".to_string())]);
    assert!(f.transport().post_calls().is_empty());
}

#[tokio::test]
async fn unauthorized_refreshes_once_and_retries_once() {
    let f = fetcher(
        ScriptedTransport::new(
            vec![status(401), ok(r#"[{"id": 1}]"#)],
            vec![ok(r#"{"access": "a2"}"#)],
        ),
        Credentials::new("a1", "r1"),
    );
    let body = f.get(URL).await.unwrap();
    assert_eq!(body, br#"[{"id": 1}]"#.to_vec());

    let gets = f.transport().get_calls();
    assert_eq!(gets.len(), 2);
    assert_eq!(gets[0].1, "a1");
    assert_eq!(gets[1].1, "a2");

    let posts = f.transport().post_calls();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].0, "https://api.example.com/api/token/refresh/");
    assert_eq!(posts[0].1, serde_json::json!({ "refresh": "r1" }));

    let creds = f.session().snapshot().unwrap();
    assert_eq!(creds, Credentials::new("a2", "r1"));
}

#[tokio::test]
async fn retried_failure_is_surfaced_without_another_retry() {
    let f = fetcher(
        ScriptedTransport::new(
            vec![status(401), status(401), ok("[]")],
            vec![ok(r#"{"access": "a2"}"#), ok(r#"{"access": "a3"}"#)],
        ),
        Credentials::new("a1", "r1"),
    );
    let err = f.get(URL).await.unwrap_err();
    assert!(matches!(err, FetchError::Unauthorized { .. }));
    assert_eq!(f.transport().get_calls().len(), 2);
    assert_eq!(f.transport().post_calls().len(), 1);
}

#[tokio::test]
async fn retried_server_error_reflects_retry_outcome() {
    let f = fetcher(
        ScriptedTransport::new(vec![status(401), status(503)], vec![ok(r#"{"access": "a2"}"#)]),
        Credentials::new("a1", "r1"),
    );
    let err = f.get(URL).await.unwrap_err();
    assert_eq!(err.status(), Some(503));
}

#[tokio::test]
async fn missing_refresh_token_fails_with_original_unauthorized() {
    let f = fetcher(
        ScriptedTransport::new(vec![status(401), ok("[]")], vec![]),
        Credentials {
            access_token: Some("a1".to_string()),
            refresh_token: None,
        },
    );
    let err = f.get(URL).await.unwrap_err();
    assert!(matches!(err, FetchError::Unauthorized { ref url } if url == URL));
    assert_eq!(f.transport().get_calls().len(), 1);
    assert!(f.transport().post_calls().is_empty());
}

#[tokio::test]
async fn failed_refresh_clears_session_and_keeps_original_error() {
    let f = fetcher(
        ScriptedTransport::new(vec![status(401), ok("[]")], vec![status(400)]),
        Credentials::new("a1", "r1"),
    );
    let err = f.get(URL).await.unwrap_err();
    assert_eq!(err.status(), Some(401));
    assert_eq!(f.transport().get_calls().len(), 1);
    assert!(f.session().snapshot().unwrap().is_empty());
}

#[tokio::test]
async fn refresh_network_error_clears_session() {
    let f = fetcher(
        ScriptedTransport::new(vec![status(401)], vec![unscripted()]),
        Credentials::new("a1", "r1"),
    );
    assert!(f.get(URL).await.is_err());
    assert!(f.session().snapshot().unwrap().is_empty());
}

#[tokio::test]
async fn malformed_refresh_response_counts_as_failure() {
    let f = fetcher(
        ScriptedTransport::new(vec![status(401)], vec![ok(r#"{"token": "a2"}"#)]),
        Credentials::new("a1", "r1"),
    );
    assert_eq!(f.get(URL).await.unwrap_err().status(), Some(401));
    assert!(f.session().snapshot().unwrap().is_empty());
}

#[tokio::test]
async fn rotated_refresh_token_replaces_the_old_one() {
    let f = fetcher(
        ScriptedTransport::new(
            vec![status(401), ok("[]")],
            vec![ok(r#"{"access": "a2", "refresh": "r2"}"#)],
        ),
        Credentials::new("a1", "r1"),
    );
    f.get(URL).await.unwrap();
    assert_eq!(f.session().snapshot().unwrap(), Credentials::new("a2", "r2"));
}

// Loads a fixed pair; every write fails.
struct ReadOnlyStore {
    initial: Credentials,
}

fn read_only_error() -> SessionError {
    SessionError::Write {
        path: "read-only".to_string(),
        source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only store"),
    }
}

impl CredentialStore for ReadOnlyStore {
    fn load(&self) -> Result<Credentials, SessionError> {
        Ok(self.initial.clone())
    }

    fn save(&self, _credentials: &Credentials) -> Result<(), SessionError> {
        Err(read_only_error())
    }

    fn clear(&self) -> Result<(), SessionError> {
        Err(read_only_error())
    }
}

fn read_only_session(credentials: Credentials) -> Session {
    Session::open(Box::new(ReadOnlyStore {
        initial: credentials,
    }))
    .unwrap()
}

#[test]
fn invalidate_forgets_tokens_even_when_store_fails() {
    let session = read_only_session(Credentials::new("a1", "r1"));
    let err = session.invalidate().unwrap_err();
    assert!(matches!(err, SessionError::Write { .. }));
    assert!(session.snapshot().unwrap().is_empty());
    assert_eq!(session.access_token(), None);
    assert_eq!(session.refresh_token(), None);
}

#[test]
fn failed_login_leaves_previous_tokens() {
    let session = read_only_session(Credentials::new("a1", "r1"));
    assert!(session.login("a2", "r2").is_err());
    assert_eq!(session.snapshot().unwrap(), Credentials::new("a1", "r1"));
}

#[tokio::test]
async fn unpersisted_rotation_clears_session_and_keeps_original_error() {
    let session = Arc::new(read_only_session(Credentials::new("a1", "r1")));
    let f = AuthenticatedFetcher::new(
        ScriptedTransport::new(vec![status(401), ok("[]")], vec![ok(r#"{"access": "a2"}"#)]),
        session,
        BASE,
    );
    let err = f.get(URL).await.unwrap_err();
    assert!(matches!(err, FetchError::Unauthorized { .. }));
    assert_eq!(f.transport().get_calls().len(), 1);
    assert_eq!(f.transport().post_calls().len(), 1);
    assert!(f.session().snapshot().unwrap().is_empty());

    let err = f.get(URL).await.unwrap_err();
    assert!(matches!(err, FetchError::MissingAccessToken));
    assert_eq!(f.transport().get_calls().len(), 1);
}

#[test]
fn mixed_case_query_filters_like_single_report_check() {
    let catalog = ReportCatalog::new(collection());
    let state = FilterState {
        query: "IsO 27001".to_string(),
        ..FilterState::default()
    };
    let visible = catalog.filter(&state);
    assert_eq!(ids(&visible), vec!["r1", "r3"]);
    let one_by_one: Vec<&Report> = catalog
        .reports()
        .iter()
        .filter(|r| state.admits(r))
        .collect();
    assert_eq!(visible, one_by_one);
}

#[tokio::test]
async fn other_errors_propagate_without_refresh() {
    let f = fetcher(
        ScriptedTransport::new(vec![status(500)], vec![ok(r#"{"access": "a2"}"#)]),
        Credentials::new("a1", "r1"),
    );
    let err = f.get(URL).await.unwrap_err();
    assert_eq!(err.status(), Some(500));
    assert!(f.transport().post_calls().is_empty());
    assert_eq!(f.session().snapshot().unwrap(), Credentials::new("a1", "r1"));

    let f = fetcher(
        ScriptedTransport::new(vec![unscripted()], vec![]),
        Credentials::new("a1", "r1"),
    );
    assert!(matches!(
        f.get(URL).await.unwrap_err(),
        FetchError::Transport { .. }
    ));
    assert!(f.transport().post_calls().is_empty());
}

#[tokio::test]
async fn get_without_access_token_makes_no_request() {
    let f = fetcher(ScriptedTransport::new(vec![], vec![]), Credentials::default());
    assert!(matches!(
        f.get(URL).await.unwrap_err(),
        FetchError::MissingAccessToken
    ));
    assert!(f.transport().get_calls().is_empty());
}

#[tokio::test]
async fn concurrent_unauthorized_calls_share_one_refresh() {
    let f = fetcher(
        ScriptedTransport::new(
            vec![status(401), status(401), ok("[1]"), ok("[2]")],
            vec![ok(r#"{"access": "a2", "refresh": "r2"}"#)],
        )
        .interleaving(),
        Credentials::new("a1", "r1"),
    );
    let (a, b) = tokio::join!(f.get(URL), f.get(URL));
    assert!(a.is_ok());
    assert!(b.is_ok());
    assert_eq!(f.transport().post_calls().len(), 1);

    let bearers: Vec<_> = f.transport().get_calls().into_iter().map(|(_, t)| t).collect();
    assert_eq!(bearers, vec!["a1", "a1", "a2", "a2"]);
}

#[tokio::test]
async fn frameworks_fetch_maps_records() {
    let f = fetcher(
        ScriptedTransport::new(
            vec![ok(
                r#"[{"id": "soc2", "name": "SOC 2", "code": "SOC2", "compliance_score": 87.5, "total_controls": 64, "passing_controls": 56}]"#,
            )],
            vec![],
        ),
        Credentials::new("a1", "r1"),
    );
    let list = frameworks::fetch_frameworks(&f, BASE).await.unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0].name, "SOC 2");
    assert_eq!(list[0].compliance_score, 87.5);
    assert_eq!(list[0].passing_controls, 56);
    assert_eq!(f.transport().get_calls()[0].0, URL);
}

#[tokio::test]
async fn frameworks_fetch_without_login_is_empty() {
    let f = fetcher(ScriptedTransport::new(vec![], vec![]), Credentials::default());
    assert!(frameworks::fetch_frameworks(&f, BASE).await.unwrap().is_empty());
    assert!(f.transport().get_calls().is_empty());
}

#[tokio::test]
async fn frameworks_fetch_treats_non_array_as_no_data() {
    let f = fetcher(
        ScriptedTransport::new(vec![ok(r#"{"detail": "paginated"}"#)], vec![]),
        Credentials::new("a1", "r1"),
    );
    assert!(frameworks::fetch_frameworks(&f, BASE).await.unwrap().is_empty());
}

#[tokio::test]
async fn load_reports_reads_dashboard_export() {
    let path = std::env::temp_dir().join(format!("compliance-reports-{}.json", std::process::id()));
    std::fs::write(
        &path,
        r#"[{"id":"1","reportId":"RPT-1","name":"Q1","type":"gap_analysis","view":"technical","status":"pending","frameworkNames":["PCI DSS"],"templateName":"Default"}]"#,
    )
    .unwrap();
    let reports = crate::reports::load_reports(&path).await.unwrap();
    std::fs::remove_file(&path).unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].report_type, ReportType::GapAnalysis);
    assert_eq!(reports[0].share_count, 0);
    assert_eq!(reports[0].template_name.as_deref(), Some("Default"));
}

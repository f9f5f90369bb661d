// Member Registry - Web Server
// Read-only REST API over a snapshot, with Axum
// Usage: registry-server [snapshot.json] [config.json]  (or REGISTRY_CONFIG)

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use member_registry::{
    load_snapshot, normalize_region, MatchEngine, Member, MemberStore, RawRecord,
    RegistryConfig, SourceType,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

const DEFAULT_SNAPSHOT: &str = "members.json";
const DEFAULT_ADDR: &str = "0.0.0.0:3000";

/// Shared application state (the store is never mutated after load)
#[derive(Clone)]
struct AppState {
    store: Arc<MemberStore>,
    matcher: Arc<MatchEngine>,
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
            error: None,
        }
    }
}

impl ApiResponse<()> {
    fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: (),
            error: Some(message.into()),
        }
    }
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(ApiResponse::error(message))).into_response()
}

/// Stats response
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatsResponse {
    total_members: usize,
    multi_source_members: usize,
    by_source: BTreeMap<String, usize>,
    by_county: BTreeMap<String, usize>,
    by_party: BTreeMap<String, usize>,
    ambiguous_constituencies: Vec<AmbiguousRegion>,
}

#[derive(Serialize)]
struct AmbiguousRegion {
    constituency: String,
    members: usize,
}

#[derive(Deserialize)]
struct MatchQuery {
    name: Option<String>,
    constituency: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MatchResponse<'a> {
    tier: &'static str,
    score: usize,
    ambiguous: bool,
    member: Option<&'a Member>,
}

fn decode(raw: &str) -> String {
    urlencoding::decode(raw)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| raw.to_string())
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/members - All members, insertion order
async fn get_members(State(state): State<AppState>) -> Response {
    Json(ApiResponse::ok(state.store.members())).into_response()
}

/// GET /api/members/:id - One member by stable id
async fn get_member(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.store.find_by_id(&id) {
        Some(member) => Json(ApiResponse::ok(member)).into_response(),
        None => error_response(StatusCode::NOT_FOUND, format!("No member with id {}", id)),
    }
}

/// GET /api/stats - Counts by source, county and party
async fn get_stats(State(state): State<AppState>) -> Response {
    let mut by_source = BTreeMap::new();
    let mut by_county = BTreeMap::new();
    let mut by_party = BTreeMap::new();
    let mut multi_source_members = 0;

    for member in state.store.all() {
        for source in member.data_sources() {
            *by_source.entry(source.code().to_string()).or_insert(0) += 1;
        }
        if member.data_sources().len() > 1 {
            multi_source_members += 1;
        }
        if let Some(county) = member.county.as_deref() {
            *by_county.entry(county.to_string()).or_insert(0) += 1;
        }
        if let Some(party) = member.party.as_deref() {
            *by_party.entry(party.to_string()).or_insert(0) += 1;
        }
    }

    let stats = StatsResponse {
        total_members: state.store.len(),
        multi_source_members,
        by_source,
        by_county,
        by_party,
        ambiguous_constituencies: state
            .store
            .ambiguous_regions()
            .into_iter()
            .map(|(constituency, members)| AmbiguousRegion { constituency, members })
            .collect(),
    };

    Json(ApiResponse::ok(stats)).into_response()
}

/// GET /api/sources/:source - Members a source contributed to
async fn get_source_members(State(state): State<AppState>, Path(source): Path<String>) -> Response {
    let source = SourceType::parse(&decode(&source));
    let members: Vec<&Member> = state.store.all().filter(|m| m.has_source(&source)).collect();

    Json(ApiResponse::ok(members)).into_response()
}

/// GET /api/constituencies/:name - Members registered under a constituency
async fn get_constituency_members(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Response {
    let key = normalize_region(&decode(&name));
    let members: Vec<&Member> = state
        .store
        .all()
        .filter(|m| m.constituency.as_deref().map(normalize_region).as_deref() == Some(key.as_str()))
        .collect();

    Json(ApiResponse::ok(members)).into_response()
}

/// GET /api/match?name=..&constituency=.. - Run the match cascade without merging
async fn match_member(State(state): State<AppState>, Query(query): Query<MatchQuery>) -> Response {
    let Some(name) = query.name.filter(|n| !n.trim().is_empty()) else {
        return error_response(StatusCode::BAD_REQUEST, "Query parameter 'name' is required");
    };

    let mut candidate = RawRecord::new(name, SourceType::parse("query"));
    candidate.constituency = query.constituency;

    let result = state.matcher.find_match(&candidate, &state.store);
    let response = MatchResponse {
        tier: result.tier.as_str(),
        score: result.score,
        ambiguous: result.ambiguous,
        member: result.index.and_then(|i| state.store.get(i)),
    };

    Json(ApiResponse::ok(response)).into_response()
}

fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/members", get(get_members))
        .route("/members/:id", get(get_member))
        .route("/stats", get(get_stats))
        .route("/sources/:source", get(get_source_members))
        .route("/constituencies/:name", get(get_constituency_members))
        .route("/match", get(match_member))
        .with_state(state);

    Router::new()
        .nest("/api", api_routes)
        .layer(CorsLayer::permissive())
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    println!("🌐 Member Registry - Web Server");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let snapshot_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_SNAPSHOT.to_string());
    let snapshot_path = std::path::Path::new(&snapshot_path);

    if !snapshot_path.exists() {
        eprintln!("❌ Snapshot not found at {:?}", snapshot_path);
        eprintln!("   Run: member-registry merge --snapshot {:?} <inputs...>", snapshot_path);
        eprintln!("   to build one first.");
        std::process::exit(1);
    }

    // Same config the snapshot was merged with, so keys and matching agree
    let config = match std::env::args().nth(2).or_else(|| std::env::var("REGISTRY_CONFIG").ok()) {
        Some(path) => {
            println!("⚙️  Loading config from {:?}", path);
            RegistryConfig::from_file(&path)?
        }
        None => RegistryConfig::default(),
    };
    let store = load_snapshot(snapshot_path)?.into_store(config.normalizer());
    println!("✓ Snapshot loaded: {} members from {:?}", store.len(), snapshot_path);

    let state = AppState {
        store: Arc::new(store),
        matcher: Arc::new(config.match_engine()),
    };
    let app = router(state);

    let addr = std::env::var("REGISTRY_ADDR").unwrap_or_else(|_| DEFAULT_ADDR.to_string());
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    println!("\n🚀 Server running on http://{}", addr);
    println!("   API: http://{}/api/members", addr);
    println!("\n   Press Ctrl+C to stop\n");

    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use member_registry::NameNormalizer;
    use serde_json::Value;
    use tower::ServiceExt;

    fn test_state() -> AppState {
        let normalizer = NameNormalizer::new();
        let mut store = MemberStore::new(normalizer.clone());

        let mut john = Member::new("Hon. John Mwangi", &normalizer);
        john.constituency = Some("Dagoretti North".to_string());
        john.county = Some("Nairobi".to_string());
        john.party = Some("UDA".to_string());
        john.add_source(SourceType::Parliament);
        john.add_source(SourceType::Wikipedia);
        store.insert(john);

        let mut mary = Member::new("Mary Wanjiru", &normalizer);
        mary.constituency = Some("Starehe".to_string());
        mary.county = Some("Nairobi".to_string());
        mary.add_source(SourceType::Scorecard);
        store.insert(mary);

        AppState {
            store: Arc::new(store),
            matcher: Arc::new(MatchEngine::new()),
        }
    }

    async fn get_json(state: AppState, uri: &str) -> (StatusCode, Value) {
        let response = router(state)
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = get_json(test_state(), "/api/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"], "OK");
        assert!(body.get("error").is_none());
    }

    #[tokio::test]
    async fn test_members_and_lookup_by_id() {
        let state = test_state();
        let id = state.store.get(1).unwrap().id.clone();

        let (_, body) = get_json(state.clone(), "/api/members").await;
        assert_eq!(body["data"].as_array().unwrap().len(), 2);
        assert_eq!(body["data"][0]["normalizedName"], "JOHN MWANGI");

        let (status, body) = get_json(state.clone(), &format!("/api/members/{}", id)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["name"], "Mary Wanjiru");

        let (status, body) = get_json(state, "/api/members/nope").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
        assert!(body["error"].as_str().unwrap().contains("nope"));
    }

    #[tokio::test]
    async fn test_stats() {
        let (_, body) = get_json(test_state(), "/api/stats").await;
        assert_eq!(body["data"]["totalMembers"], 2);
        assert_eq!(body["data"]["multiSourceMembers"], 1);
        assert_eq!(body["data"]["bySource"]["parliament"], 1);
        assert_eq!(body["data"]["byCounty"]["Nairobi"], 2);
        assert_eq!(body["data"]["byParty"]["UDA"], 1);
    }

    #[tokio::test]
    async fn test_sources_and_constituencies() {
        let (_, body) = get_json(test_state(), "/api/sources/Wikipedia").await;
        assert_eq!(body["data"].as_array().unwrap().len(), 1);

        let (_, body) = get_json(test_state(), "/api/constituencies/dagoretti%20north").await;
        assert_eq!(body["data"][0]["name"], "Hon. John Mwangi");
    }

    #[tokio::test]
    async fn test_match_endpoint() {
        let (_, body) = get_json(test_state(), "/api/match?name=Dr.%20John%20Mwangi").await;
        assert_eq!(body["data"]["tier"], "exact_name");
        assert_eq!(body["data"]["member"]["name"], "Hon. John Mwangi");

        let (_, body) =
            get_json(test_state(), "/api/match?name=M.%20Wanjiru&constituency=Starehe").await;
        assert_eq!(body["data"]["tier"], "region");

        let (_, body) = get_json(test_state(), "/api/match?name=Nobody%20Here").await;
        assert_eq!(body["data"]["tier"], "none");
        assert!(body["data"]["member"].is_null());

        let (status, _) = get_json(test_state(), "/api/match").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}

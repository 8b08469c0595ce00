//! HTTP integration tests for capex-dashboard.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use capex_common::config::{password_digest, AuthConfig, Config, DataConfig};
use capex_dashboard::artifacts::{LabelEncoder, LinearRoiModel};
use capex_dashboard::pipeline::FEATURE_COUNT;
use capex_dashboard::{build_router, AppState, Artifacts};
use tempfile::TempDir;
use tower::ServiceExt;

const HEADER: &str = "Market,CapEx_Type,Historical_Spend_Million,Projected_Spend_Million,\
Expected_Asset_Lifespan_Years,Predicted_Risk_Percentage,NPV_Million,Priority_Score,\
Revenue_Impact_Million,Cost_Impact_Million,Margin_Impact_Million,Region";

const ROWS: &str = "\
Spain,IT,10,20,5,12.5,3,7,4,2,1.5,EU
Spain,IT,5,8,4,10,2,3,1,1,0.5,EU
France,Network,3,4,10,8,1,2,0.5,0.5,0.25,EU
";

struct Fixture {
    _dir: TempDir,
    app: axum::Router,
}

/// ROI = 1 + 0.1 * projected spend + 0.5 * NPV
fn fixture(rows: &str) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let data_path = dir.path().join("records.csv");
    std::fs::write(&data_path, format!("{HEADER}\n{rows}")).unwrap();

    let mut coefficients = vec![0.0; FEATURE_COUNT];
    coefficients[1] = 0.1;
    coefficients[4] = 0.5;
    let artifacts = Artifacts::new(
        Arc::new(LabelEncoder::from_classes(["Spain", "France"]).unwrap()),
        Arc::new(LinearRoiModel::new(1.0, coefficients).unwrap()),
    );

    let config = Config {
        data: DataConfig {
            source_path: data_path.to_string_lossy().into_owned(),
            delimiter: ',',
        },
        auth: AuthConfig {
            username: Some("planner".into()),
            password_sha256: Some(password_digest("123456")),
            session_timeout_secs: 1800,
        },
        ..Config::default()
    };

    Fixture {
        _dir: dir,
        app: build_router(AppState::new(config, artifacts)),
    }
}

async fn send(
    app: &axum::Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, json)
}

async fn login(app: &axum::Router) -> String {
    let (status, json) = send(
        app,
        "POST",
        "/api/v1/login",
        None,
        Some(serde_json::json!({"username": "planner", "password": "123456"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    json["data"]["token"].as_str().unwrap().to_string()
}

fn approx(value: &serde_json::Value, expected: f64) -> bool {
    value.as_f64().is_some_and(|v| (v - expected).abs() < 1e-9)
}

#[tokio::test]
async fn test_full_dashboard_flow() {
    let fx = fixture(ROWS);
    let app = &fx.app;
    let token = login(app).await;

    // 1. No run yet
    let (status, json) = send(app, "GET", "/api/v1/groups", Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"]["code"], "NO_RUN");

    // 2. Filters come straight from the records
    let (status, json) = send(app, "GET", "/api/v1/filters", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["markets"], serde_json::json!(["Spain", "France"]));
    assert_eq!(json["data"]["capex_types"], serde_json::json!(["IT", "Network"]));

    // 3. Run the pipeline
    let (status, json) = send(app, "POST", "/api/v1/runs", Some(&token), None).await;
    assert_eq!(status, StatusCode::CREATED);
    let groups = json["data"]["groups"].as_array().unwrap();
    assert_eq!(groups.len(), 2);
    assert_eq!(groups[0]["market"], "Spain");
    assert_eq!(groups[0]["capex_type"], "IT");
    assert!(approx(&groups[0]["historical_spend"], 15.0));
    assert!(approx(&groups[0]["projected_spend"], 28.0));
    assert!(approx(&groups[0]["predicted_roi"], 6.3));
    assert!(approx(&groups[1]["predicted_roi"], 1.9));
    assert!(approx(&json["data"]["totals"]["projected_spend"], 32.0));
    assert_eq!(json["data"]["defaulted_features"].as_array().unwrap().len(), 13);

    // 4. Edit one group's spend
    let (status, json) = send(
        app,
        "PUT",
        "/api/v1/groups/spend",
        Some(&token),
        Some(serde_json::json!({"market": "Spain", "capex_type": "IT", "user_input_spend": 2.0})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(approx(&json["data"]["updated_projected_spend"], 30.0));
    assert!(approx(&json["data"]["predicted_roi"], 6.3));

    // 5. Simulate shows the edited table
    let (status, json) = send(app, "POST", "/api/v1/simulate", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    let groups = json["data"]["groups"].as_array().unwrap();
    assert!(approx(&groups[0]["user_input_spend"], 2.0));
    assert!(approx(&groups[0]["updated_projected_spend"], 30.0));
    assert!(approx(&groups[1]["updated_projected_spend"], 4.0));
    assert!(approx(&json["data"]["totals"]["projected_spend"], 32.0));

    // 6. JSON report with a selected market
    let (status, json) = send(
        app,
        "GET",
        "/api/v1/report?format=json&market=France",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["charts"]["npv_vs_risk"]["market"], "France");
    assert_eq!(json["data"]["charts"]["top_markets"][0]["market"], "Spain");

    // 7. Status counts the run
    let (status, json) = send(app, "GET", "/api/v1/status", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["runs"]["run_count"], 1);
    assert_eq!(json["data"]["runs"]["failure_count"], 0);
    assert_eq!(json["data"]["active_sessions"], 1);

    // 8. Logout ends the session
    let (status, _) = send(app, "POST", "/api/v1/logout", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, json) = send(app, "GET", "/api/v1/groups", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["success"], false);
}

#[tokio::test]
async fn test_markdown_report() {
    let fx = fixture(ROWS);
    let token = login(&fx.app).await;
    send(&fx.app, "POST", "/api/v1/runs", Some(&token), None).await;

    let response = fx
        .app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/v1/report?format=markdown")
                .header("authorization", format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()["content-type"]
        .to_str()
        .unwrap()
        .starts_with("text/markdown"));

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.starts_with("# CapEx Dashboard"));
    assert!(text.contains("$32.00 Million"));
}

#[tokio::test]
async fn test_unknown_report_format() {
    let fx = fixture(ROWS);
    let token = login(&fx.app).await;
    let (status, json) = send(&fx.app, "GET", "/api/v1/report?format=xlsx", Some(&token), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "INVALID_REQUEST");
}

#[tokio::test]
async fn test_wrong_password() {
    let fx = fixture(ROWS);
    let (status, json) = send(
        &fx.app,
        "POST",
        "/api/v1/login",
        None,
        Some(serde_json::json!({"username": "planner", "password": "654321"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["error"]["code"], "INVALID_CREDENTIALS");
    assert_eq!(json["error"]["message"], "Incorrect username or password");
}

#[tokio::test]
async fn test_unknown_market_fails_whole_run() {
    let fx = fixture(&format!("{ROWS}Atlantis,IT,1,1,1,1,1,1,1,1,1,EU\n"));
    let token = login(&fx.app).await;

    let (status, json) = send(&fx.app, "POST", "/api/v1/runs", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json["error"]["code"], "UNKNOWN_MARKET");
    assert!(json["error"]["message"].as_str().unwrap().contains("Atlantis"));

    // Nothing from the failed run is kept
    let (status, _) = send(&fx.app, "GET", "/api/v1/groups", Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, json) = send(&fx.app, "GET", "/api/v1/status", None, None).await;
    assert_eq!(json["data"]["runs"]["failure_count"], 1);
}

#[tokio::test]
async fn test_edit_unknown_group() {
    let fx = fixture(ROWS);
    let token = login(&fx.app).await;
    send(&fx.app, "POST", "/api/v1/runs", Some(&token), None).await;

    let (status, json) = send(
        &fx.app,
        "PUT",
        "/api/v1/groups/spend",
        Some(&token),
        Some(serde_json::json!({"market": "France", "capex_type": "IT", "user_input_spend": 1.0})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"]["code"], "GROUP_NOT_FOUND");
}

#[tokio::test]
async fn test_sessions_have_separate_workbenches() {
    let fx = fixture(ROWS);
    let alice = login(&fx.app).await;
    let bob = login(&fx.app).await;

    send(&fx.app, "POST", "/api/v1/runs", Some(&alice), None).await;

    let (status, _) = send(&fx.app, "GET", "/api/v1/groups", Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&fx.app, "GET", "/api/v1/groups", Some(&bob), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

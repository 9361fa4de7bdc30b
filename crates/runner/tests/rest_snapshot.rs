//! Integration test: RestSnapshotSource <-> axum asset API

use axum::Router;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use geotrackr_core::AssetKind;
use geotrackr_ports::{FetchError, SnapshotSource};
use geotrackr_runner::RestSnapshotSource;
use tokio::net::TcpListener;
use url::Url;

async fn assets(headers: HeaderMap) -> impl IntoResponse {
    let authorized = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        == Some("Bearer secret");
    if !authorized {
        return (
            StatusCode::UNAUTHORIZED,
            r#"{"success":false,"message":"Unauthorized","data":null}"#,
        );
    }
    (
        StatusCode::OK,
        r#"{"success":true,"message":"Assets retrieved","data":[
            {"id":1,"name":"Truck 7","type":"VEHICLE","currentLatitude":40.7,
             "currentLongitude":-74.0,"lastUpdate":"2024-05-01T10:15:30","active":true},
            {"id":2,"name":"Parcel","type":"PACKAGE","active":false}
        ]}"#,
    )
}

async fn refused() -> impl IntoResponse {
    (
        StatusCode::OK,
        r#"{"success":false,"message":"User not found","data":null}"#,
    )
}

async fn serve() -> Url {
    let app = Router::new()
        .route("/api/assets", get(assets))
        .route("/broken/assets", get(refused));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    Url::parse(&format!("http://{}/api", addr)).unwrap()
}

#[tokio::test]
async fn test_fetch_assets_with_token() {
    let base = serve().await;
    let source = RestSnapshotSource::new(base, Some("secret".to_string()));

    let rows = source.fetch_assets().await.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].position(), Some((40.7, -74.0)));
    assert_eq!(rows[1].kind, AssetKind::Package);
    assert!(!rows[1].active);
}

#[tokio::test]
async fn test_unauthorized_is_api_error() {
    let base = serve().await;
    let source = RestSnapshotSource::new(base, None);

    assert_eq!(
        source.fetch_assets().await,
        Err(FetchError::Api {
            status: 401,
            message: "Unauthorized".to_string()
        })
    );
}

#[tokio::test]
async fn test_unsuccessful_envelope_is_api_error() {
    let base = serve().await;
    let broken = base.join("/broken").unwrap();
    let source = RestSnapshotSource::new(broken, None);

    assert!(matches!(
        source.fetch_assets().await,
        Err(FetchError::Api { status: 200, .. })
    ));
}

#[tokio::test]
async fn test_unreachable_is_network_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let base = Url::parse(&format!("http://{}/api", addr)).unwrap();
    let source = RestSnapshotSource::new(base, None);
    assert!(matches!(
        source.fetch_assets().await,
        Err(FetchError::Network(_))
    ));
}

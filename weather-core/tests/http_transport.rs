use std::{
    collections::{HashMap, VecDeque},
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use serde_json::{Value as JsonValue, json};
use weather_core::{
    ApiClient, ApiError, ApiTarget, Coordinates, RateLimit, RateLimiter, Units, WeatherProvider,
    WeatherQuery,
    clock::ManualClock,
    provider::openweather::OneCallProvider,
    transport::{HttpTransport, RetryPolicy, RetryingTransport, TransportError, http::PoolOptions},
};

#[derive(Clone)]
struct MockResponse {
    status: StatusCode,
    body: JsonValue,
}

impl MockResponse {
    fn json(status: StatusCode, body: JsonValue) -> Self {
        Self { status, body }
    }
}

#[derive(Clone)]
struct MockState {
    responses: Arc<Mutex<VecDeque<MockResponse>>>,
    queries: Arc<Mutex<Vec<HashMap<String, String>>>>,
    hits: Arc<AtomicUsize>,
}

async fn onecall_handler(
    State(state): State<MockState>,
    Query(query): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    state.hits.fetch_add(1, Ordering::SeqCst);
    state.queries.lock().expect("query log mutex must not be poisoned").push(query);

    let response = {
        let mut queue = state.responses.lock().expect("response queue mutex must not be poisoned");
        queue.pop_front().unwrap_or_else(|| {
            MockResponse::json(
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({"message": "no mock response available"}),
            )
        })
    };

    (response.status, Json(response.body))
}

struct TestServer {
    base_url: String,
    hits: Arc<AtomicUsize>,
    queries: Arc<Mutex<Vec<HashMap<String, String>>>>,
    task: tokio::task::JoinHandle<()>,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl TestServer {
    fn onecall_url(&self) -> String {
        format!("{}/onecall?lat=", self.base_url)
    }

    fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    fn last_query(&self) -> HashMap<String, String> {
        self.queries.lock().expect("query log").last().cloned().unwrap_or_default()
    }
}

async fn spawn_server(responses: Vec<MockResponse>) -> TestServer {
    let state = MockState {
        responses: Arc::new(Mutex::new(responses.into())),
        queries: Arc::new(Mutex::new(Vec::new())),
        hits: Arc::new(AtomicUsize::new(0)),
    };

    let app = Router::new().route("/onecall", get(onecall_handler)).with_state(state.clone());

    let listener =
        tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("must bind test listener");
    let address = listener.local_addr().expect("must have local addr");
    let task = tokio::spawn(async move {
        axum::serve(listener, app).await.expect("mock server must run");
    });

    TestServer {
        base_url: format!("http://{address}"),
        hits: state.hits,
        queries: state.queries,
        task,
    }
}

fn one_call_body() -> JsonValue {
    json!({
        "lat": -33.8688,
        "lon": 151.2093,
        "timezone": "Australia/Sydney",
        "timezone_offset": 36000,
        "current": {
            "dt": 1718000000,
            "temp": 14.5,
            "feels_like": 13.9,
            "pressure": 1019,
            "humidity": 72,
            "dew_point": 9.4,
            "uvi": 0.5,
            "clouds": 40,
            "wind_speed": 4.1,
            "wind_deg": 250,
            "weather": [
                {"id": 802, "main": "Clouds", "description": "scattered clouds", "icon": "03d"}
            ]
        }
    })
}

fn policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy { max_attempts, ..RetryPolicy::default() }
}

fn client(base_url: String, max_attempts: u32, clock: &ManualClock) -> ApiClient {
    let pooled = HttpTransport::new(PoolOptions {
        timeout: Duration::from_secs(5),
        ..PoolOptions::default()
    })
    .expect("must build http transport");
    let transport = RetryingTransport::new(pooled, policy(max_attempts), Arc::new(clock.clone()));
    let limiter = RateLimiter::new(
        RateLimit { threshold: 100, window: Duration::from_secs(60) },
        Arc::new(clock.clone()),
        Arc::new(clock.clone()),
    );
    let target = ApiTarget {
        base_url,
        id_path_parameter: "&appid=".into(),
        api_key: "TEST_KEY".into(),
    };
    ApiClient::new(target, Arc::new(transport), limiter)
}

fn provider(client: ApiClient) -> OneCallProvider {
    OneCallProvider::new(client, "&lon=".into(), Coordinates::new(-33.87, 151.21).expect("valid"))
}

#[tokio::test]
async fn retries_unavailable_then_decodes_weather() {
    let server = spawn_server(vec![
        MockResponse::json(StatusCode::SERVICE_UNAVAILABLE, json!({"message": "busy"})),
        MockResponse::json(StatusCode::OK, one_call_body()),
    ])
    .await;
    let clock = ManualClock::new();
    let provider = provider(client(server.onecall_url(), 3, &clock));

    let weather = provider.get_weather(&WeatherQuery::default()).await.expect("weather");

    assert_eq!(weather.current.temp, 14.5);
    assert_eq!(weather.current_description(), Some("scattered clouds"));
    assert_eq!(server.hits(), 2);
    assert_eq!(clock.sleeps(), vec![Duration::from_millis(500)]);

    let query = server.last_query();
    assert_eq!(query.get("lat").map(String::as_str), Some("-33.87"));
    assert_eq!(query.get("lon").map(String::as_str), Some("151.21"));
    assert_eq!(query.get("appid").map(String::as_str), Some("TEST_KEY"));
    assert_eq!(query.get("units").map(String::as_str), Some("metric"));
}

#[tokio::test]
async fn exhausted_retries_surface_last_response_detail() {
    let server = spawn_server(vec![
        MockResponse::json(StatusCode::TOO_MANY_REQUESTS, json!({"message": "slow down"})),
        MockResponse::json(StatusCode::TOO_MANY_REQUESTS, json!({"message": "still too fast"})),
    ])
    .await;
    let clock = ManualClock::new();
    let provider = provider(client(server.onecall_url(), 2, &clock));

    let err = provider.get_weather(&WeatherQuery::default()).await.unwrap_err();

    let ApiError::Validation { status, detail } = err else { panic!("expected validation error") };
    assert_eq!(status, Some(429));
    assert_eq!(detail.message(), "still too fast");
    assert_eq!(server.hits(), 2);
}

#[tokio::test]
async fn client_error_is_not_retried() {
    let server = spawn_server(vec![MockResponse::json(
        StatusCode::UNPROCESSABLE_ENTITY,
        json!([{"loc": ["query", "lat"], "msg": "out of range", "type": "value_error"}]),
    )])
    .await;
    let clock = ManualClock::new();
    let provider = provider(client(server.onecall_url(), 3, &clock));
    let query = WeatherQuery { coordinates: None, units: Units::Imperial };

    let err = provider.get_weather(&query).await.unwrap_err();

    assert_eq!(err.to_string(), "API validation error: query.lat: out of range");
    assert_eq!(server.hits(), 1);
    assert!(clock.sleeps().is_empty());
}

#[tokio::test]
async fn refused_connection_is_no_response() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("must bind");
    let address = listener.local_addr().expect("must have local addr");
    drop(listener);

    let clock = ManualClock::new();
    let provider = provider(client(format!("http://{address}/onecall?lat="), 2, &clock));

    let err = provider.get_weather(&WeatherQuery::default()).await.unwrap_err();

    assert!(matches!(err, ApiError::NoResponse(TransportError::Connect(_))), "got {err:?}");
    assert!(!err.to_string().contains("TEST_KEY"), "api key leaked: {err}");
    assert_eq!(clock.sleeps(), vec![Duration::from_millis(500)]);
}

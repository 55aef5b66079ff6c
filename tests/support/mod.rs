//! Scripted Pokémon API and helpers shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use pokemon_etl::fetcher::retry::Sleeper;
use pokemon_etl::fetcher::transport::Method;
use pokemon_etl::fetcher::{
    ApiConfig, ApiRequest, ApiResponse, PokemonApi, RetryController, RetryPolicy, Transport,
    TransportError,
};
use pokemon_etl::shutdown::{ShutdownCoordinator, SharedShutdown};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const BASE_URL: &str = "http://fake.api";
pub const USERNAME: &str = "ash";
pub const PASSWORD: &str = "pikachu";

/// Endpoint families served by [`FakeApi`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Login,
    PokemonList,
    PokemonDetail,
    Combats,
    Unknown,
}

/// One request as seen by the fake server
#[derive(Debug, Clone)]
pub struct Recorded {
    pub route: Route,
    pub page: Option<u32>,
    pub bearer: Option<String>,
}

#[derive(Default)]
struct State {
    pokemon: Vec<Value>,
    details: BTreeMap<i64, Value>,
    combats: Vec<Value>,
    logins: u64,
    valid_token: Option<String>,
    reject_all_tokens: bool,
    scripted: HashMap<Route, VecDeque<Result<ApiResponse, TransportError>>>,
    requests: Vec<Recorded>,
}

/// In-process stand-in for the Pokémon API
///
/// Serves `/login`, `/pokemon`, `/pokemon/{id}` and `/combats` with the
/// same JSON shapes as the real service. Scripted responses queued with
/// [`FakeApi::script`] are returned before the normal behavior.
#[derive(Default)]
pub struct FakeApi {
    state: Mutex<State>,
    yield_on_send: bool,
}

impl FakeApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pokémon `1..=pokemon` and `combats` combats between neighbours
    pub fn with_dataset(pokemon: i64, combats: usize) -> Self {
        let api = Self::new();
        for id in 1..=pokemon {
            api.add_pokemon(id, &format!("Poke{id}"), ["Grass/Poison", "Fire", "Water"][(id % 3) as usize]);
        }
        let combats = (0..combats)
            .map(|i| {
                let first = (i as i64 % pokemon) + 1;
                let second = ((i as i64 + 1) % pokemon) + 1;
                let winner = if i % 2 == 0 { first } else { second };
                json!({"first_pokemon": first, "second_pokemon": second, "winner": winner})
            })
            .collect();
        api.set_combats(combats);
        api
    }

    /// Yield to the scheduler inside every request, so concurrent callers interleave
    pub fn interleaved(mut self) -> Self {
        self.yield_on_send = true;
        self
    }

    pub fn add_pokemon(&self, id: i64, name: &str, types: &str) {
        let mut state = self.state.lock().unwrap();
        state.pokemon.push(json!({"id": id, "name": name}));
        state.details.insert(
            id,
            json!({
                "id": id,
                "name": name,
                "types": types,
                "hp": 40 + id,
                "attack": 50 + id,
                "defense": 45,
                "sp_attack": 60,
                "sp_defense": 60,
                "speed": 55,
                "generation": 1,
                "legendary": false,
            }),
        );
    }

    pub fn set_combats(&self, combats: Vec<Value>) {
        self.state.lock().unwrap().combats = combats;
    }

    /// Queue responses returned (in order) by the next requests to `route`
    pub fn script(&self, route: Route, responses: Vec<Result<ApiResponse, TransportError>>) {
        self.state
            .lock()
            .unwrap()
            .scripted
            .entry(route)
            .or_default()
            .extend(responses);
    }

    /// Invalidate the token currently held by clients
    pub fn expire_token(&self) {
        self.state.lock().unwrap().valid_token = None;
    }

    /// Answer every authenticated request with 401
    pub fn reject_all_tokens(&self) {
        self.state.lock().unwrap().reject_all_tokens = true;
    }

    pub fn logins(&self) -> u64 {
        self.state.lock().unwrap().logins
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.state.lock().unwrap().requests.clone()
    }

    pub fn count(&self, route: Route) -> usize {
        self.state
            .lock()
            .unwrap()
            .requests
            .iter()
            .filter(|r| r.route == route)
            .count()
    }

    pub fn total_requests(&self) -> usize {
        self.state.lock().unwrap().requests.len()
    }

    fn route(request: &ApiRequest) -> (Route, Option<i64>) {
        let path = request.url.strip_prefix(BASE_URL).unwrap_or(&request.url);
        match (request.method, path) {
            (Method::Post, "/login") => (Route::Login, None),
            (Method::Get, "/pokemon") => (Route::PokemonList, None),
            (Method::Get, "/combats") => (Route::Combats, None),
            (Method::Get, other) => match other
                .strip_prefix("/pokemon/")
                .and_then(|id| id.parse().ok())
            {
                Some(id) => (Route::PokemonDetail, Some(id)),
                None => (Route::Unknown, None),
            },
            _ => (Route::Unknown, None),
        }
    }

    fn handle(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError> {
        let (route, id) = Self::route(request);
        let page: Option<u32> = request.query_param("page").and_then(|p| p.parse().ok());
        let per_page: u32 = request
            .query_param("per_page")
            .and_then(|p| p.parse().ok())
            .unwrap_or(10);

        let mut state = self.state.lock().unwrap();
        state.requests.push(Recorded {
            route,
            page,
            bearer: request.bearer.clone(),
        });

        if let Some(response) = state.scripted.get_mut(&route).and_then(VecDeque::pop_front) {
            return response;
        }

        if route == Route::Login {
            let body = request.body.clone().unwrap_or(Value::Null);
            if body["username"] != USERNAME || body["password"] != PASSWORD {
                return Ok(ApiResponse::new(401, r#"{"detail":"invalid credentials"}"#));
            }
            state.logins += 1;
            let token = format!("token-{}", state.logins);
            state.valid_token = Some(token.clone());
            return Ok(ApiResponse::json(&json!({"access_token": token, "token_type": "bearer"})));
        }

        let authorized = !state.reject_all_tokens
            && request.bearer.is_some()
            && request.bearer == state.valid_token;
        if !authorized {
            return Ok(ApiResponse::new(401, r#"{"detail":"token expired"}"#));
        }

        let page = page.unwrap_or(1).max(1);
        let list = |key: &str, records: &[Value]| {
            let start = ((page - 1) * per_page) as usize;
            let slice: Vec<Value> = records
                .iter()
                .skip(start)
                .take(per_page as usize)
                .cloned()
                .collect();
            ApiResponse::json(&json!({
                key: slice,
                "page": page,
                "per_page": per_page,
                "total": records.len(),
            }))
        };

        Ok(match (route, id) {
            (Route::PokemonList, _) => list("pokemons", &state.pokemon),
            (Route::Combats, _) => list("combats", &state.combats),
            (Route::PokemonDetail, Some(id)) => match state.details.get(&id) {
                Some(detail) => ApiResponse::json(detail),
                None => ApiResponse::new(404, r#"{"detail":"not found"}"#),
            },
            _ => ApiResponse::new(404, r#"{"detail":"unknown route"}"#),
        })
    }
}

#[async_trait]
impl Transport for FakeApi {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError> {
        if self.yield_on_send {
            tokio::task::yield_now().await;
        }
        let response = self.handle(request);
        if self.yield_on_send {
            tokio::task::yield_now().await;
        }
        response
    }
}

/// Sleeper that records requested delays and returns immediately
#[derive(Default)]
pub struct RecordingSleeper {
    delays: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn delays(&self) -> Vec<Duration> {
        self.delays.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.delays.lock().unwrap().push(duration);
    }
}

/// Backoff that never elapses; only shutdown ends the wait
pub struct StalledSleeper;

#[async_trait]
impl Sleeper for StalledSleeper {
    async fn sleep(&self, _duration: Duration) {
        std::future::pending::<()>().await
    }
}

/// Everything a test needs to drive the API client
pub struct Harness {
    pub fake: Arc<FakeApi>,
    pub sleeper: Arc<RecordingSleeper>,
    pub shutdown: SharedShutdown,
    pub api: Arc<PokemonApi>,
}

pub fn api_config() -> ApiConfig {
    ApiConfig::new(BASE_URL, USERNAME, PASSWORD)
}

pub fn harness(fake: FakeApi, config: ApiConfig, max_retries: u32) -> Harness {
    let fake = Arc::new(fake);
    let sleeper = Arc::new(RecordingSleeper::default());
    let shutdown = ShutdownCoordinator::shared();
    let api = client(
        fake.clone(),
        config,
        max_retries,
        sleeper.clone(),
        shutdown.clone(),
    );
    Harness {
        fake,
        sleeper,
        shutdown,
        api,
    }
}

/// API client over `fake` with an explicit sleeper and shutdown handle
pub fn client(
    fake: Arc<FakeApi>,
    config: ApiConfig,
    max_retries: u32,
    sleeper: Arc<dyn Sleeper>,
    shutdown: SharedShutdown,
) -> Arc<PokemonApi> {
    let retry = RetryController::new(RetryPolicy::default().with_max_retries(max_retries))
        .with_sleeper(sleeper)
        .with_shutdown(shutdown);
    Arc::new(PokemonApi::connect(config, fake, retry, None))
}

pub fn rate_limited() -> Result<ApiResponse, TransportError> {
    Ok(ApiResponse::new(429, r#"{"detail":"slow down"}"#))
}

pub fn unavailable() -> Result<ApiResponse, TransportError> {
    Ok(ApiResponse::new(503, "Service Unavailable"))
}

pub fn connection_reset() -> Result<ApiResponse, TransportError> {
    Err(TransportError::Connect("connection reset by peer".to_string()))
}

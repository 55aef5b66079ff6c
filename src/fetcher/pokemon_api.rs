//! [`DataFetcher`] implementation for the Pokémon API

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use super::api_config::ApiConfig;
use super::api_http::ApiHttpClient;
use super::pagination::paginate;
use super::retry::RetryController;
use super::session::{Credentials, SessionManager};
use super::transport::Transport;
use super::{DataFetcher, FetcherResult, RecordStream};
use crate::pipeline::rate_limit::RateLimiter;
use crate::Resource;

/// Fetches Pokémon, details and combats through one shared session
pub struct PokemonApi {
    http: Arc<ApiHttpClient>,
    config: ApiConfig,
}

impl PokemonApi {
    /// Wrap an existing HTTP client
    pub fn new(http: Arc<ApiHttpClient>, config: ApiConfig) -> Self {
        Self { http, config }
    }

    /// Build the session manager and HTTP client for `config`
    ///
    /// # Arguments
    /// * `config` - API connection settings
    /// * `transport` - Transport shared by login and data requests
    /// * `retry` - Retry controller used for every request
    /// * `detail_limiter` - Optional pacing for `GET /pokemon/{id}`
    pub fn connect(
        config: ApiConfig,
        transport: Arc<dyn Transport>,
        retry: RetryController,
        detail_limiter: Option<Arc<RateLimiter>>,
    ) -> Self {
        let sessions = Arc::new(SessionManager::new(
            Arc::clone(&transport),
            config.login_url(),
            Credentials::new(config.username.clone(), config.password.clone()),
            retry.clone(),
            config.login_timeout,
        ));

        let mut http = ApiHttpClient::new(
            transport,
            config.base_url.clone(),
            sessions,
            retry,
            config.request_timeout,
        );
        if let Some(limiter) = detail_limiter {
            http = http.with_rate_limiter(limiter);
        }

        Self::new(Arc::new(http), config)
    }

    /// Session manager shared by every resource
    pub fn sessions(&self) -> &Arc<SessionManager> {
        self.http.sessions()
    }

    /// API connection settings
    pub fn config(&self) -> &ApiConfig {
        &self.config
    }
}

#[async_trait]
impl DataFetcher for PokemonApi {
    async fn ensure_session(&self) -> FetcherResult<()> {
        self.http.sessions().ensure_valid().await.map(|_| ())
    }

    fn fetch_all(
        &self,
        resource: Resource,
        page_size: u32,
        max_records: Option<usize>,
    ) -> RecordStream {
        let http = Arc::clone(&self.http);
        let endpoint = resource.endpoint();
        debug!(%resource, page_size, ?max_records, "Starting paginated fetch");

        paginate(
            format!("GET {endpoint}"),
            resource.list_key(),
            page_size,
            max_records,
            move |page, per_page| {
                let http = Arc::clone(&http);
                async move {
                    let params = [
                        ("page", page.to_string()),
                        ("per_page", per_page.to_string()),
                    ];
                    http.get::<Value>(endpoint, &params).await
                }
            },
        )
    }

    async fn fetch_one(&self, resource: Resource, id: i64) -> FetcherResult<Value> {
        let endpoint = format!("{}/{id}", resource.endpoint());
        self.http.get_limited::<Value>(&endpoint, &[]).await
    }

    fn page_size(&self, resource: Resource) -> u32 {
        match resource {
            Resource::Pokemon | Resource::PokemonAttributes => self.config.per_page_pokemon,
            Resource::Combats => self.config.per_page_combats,
        }
    }

    fn max_records(&self, resource: Resource) -> Option<usize> {
        match resource {
            Resource::Combats => Some(self.config.max_combats),
            Resource::Pokemon | Resource::PokemonAttributes => None,
        }
    }
}

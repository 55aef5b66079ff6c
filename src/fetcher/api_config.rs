//! API connection configuration
//!
//! Plain inputs handed over by the CLI layer. The core never reads the
//! environment itself; everything it needs to reach the API lives here.

use std::fmt;
use std::time::Duration;

/// Login endpoint path
pub const LOGIN_ENDPOINT: &str = "/login";

/// Default page size for `/pokemon`
pub const DEFAULT_PER_PAGE_POKEMON: u32 = 50;

/// Default page size for `/combats`
pub const DEFAULT_PER_PAGE_COMBATS: u32 = 100;

/// Default cap on combats pulled per extraction
pub const DEFAULT_MAX_COMBATS: usize = 5000;

/// Timeout for list and detail requests
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Timeout for the login request
pub const LOGIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection settings for the Pokémon API
#[derive(Clone)]
pub struct ApiConfig {
    /// Base URL without trailing slash
    pub base_url: String,
    /// Login user name
    pub username: String,
    /// Login password
    pub password: String,
    /// Page size for the Pokémon listing
    pub per_page_pokemon: u32,
    /// Page size for the combat listing
    pub per_page_combats: u32,
    /// Approximate cap on combats to extract
    pub max_combats: usize,
    /// Timeout applied to list and detail requests
    pub request_timeout: Duration,
    /// Timeout applied to the login request
    pub login_timeout: Duration,
}

impl ApiConfig {
    /// Create a configuration with default page sizes and caps
    pub fn new(
        base_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            username: username.into(),
            password: password.into(),
            per_page_pokemon: DEFAULT_PER_PAGE_POKEMON,
            per_page_combats: DEFAULT_PER_PAGE_COMBATS,
            max_combats: DEFAULT_MAX_COMBATS,
            request_timeout: REQUEST_TIMEOUT,
            login_timeout: LOGIN_TIMEOUT,
        }
    }

    /// Override the combat cap
    pub fn with_max_combats(mut self, max_combats: usize) -> Self {
        self.max_combats = max_combats;
        self
    }

    /// Override both page sizes
    pub fn with_page_sizes(mut self, per_page_pokemon: u32, per_page_combats: u32) -> Self {
        self.per_page_pokemon = per_page_pokemon.max(1);
        self.per_page_combats = per_page_combats.max(1);
        self
    }

    /// Full login URL
    pub fn login_url(&self) -> String {
        format!("{}{}", self.base_url, LOGIN_ENDPOINT)
    }

    /// Validate the configuration before any request is made
    pub fn validate(&self) -> Result<(), String> {
        if self.base_url.is_empty() {
            return Err("base URL is not set".to_string());
        }

        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(format!(
                "base URL must start with http:// or https://, got {}",
                self.base_url
            ));
        }

        if self.username.is_empty() {
            return Err("API username is not set".to_string());
        }

        Ok(())
    }
}

impl fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiConfig")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &format_args!("<{} chars>", self.password.len()))
            .field("per_page_pokemon", &self.per_page_pokemon)
            .field("per_page_combats", &self.per_page_combats)
            .field("max_combats", &self.max_combats)
            .finish()
    }
}

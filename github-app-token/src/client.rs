// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! GitHub REST API client authenticating as a GitHub App.

use {
    crate::{
        app_token::{AppTokenEncoder, JwtError, DEFAULT_APP_TOKEN_LIFETIME},
        issuer::{InstallationToken, InstallationTokenOptions},
        RepoTarget,
    },
    reqwest::{
        blocking::{Client, ClientBuilder, RequestBuilder, Response},
        StatusCode,
    },
    serde::{de::DeserializeOwned, Deserialize, Serialize},
    serde_json::Value,
    thiserror::Error,
    url::Url,
};

/// Base URL of the public GitHub API.
pub const GITHUB_API_URL: &str = "https://api.github.com";

const GITHUB_API_VERSION: &str = "2022-11-28";

/// The account an installation belongs to.
#[derive(Clone, Debug, Deserialize, Serialize, Eq, PartialEq)]
pub struct Account {
    pub login: String,
    #[serde(rename = "type")]
    pub account_type: Option<String>,
}

/// An installation of a GitHub App on an organization or user account.
#[derive(Clone, Debug, Deserialize, Serialize, Eq, PartialEq)]
pub struct Installation {
    pub id: u64,
    pub account: Option<Account>,
    pub target_type: Option<String>,
    pub repository_selection: Option<String>,
}

/// Outcome of looking up an installation.
///
/// A missing installation is an expected answer and not folded into the error.
#[derive(Debug)]
pub enum InstallationLookup {
    Found(Installation),
    NotFound,
    Failed(ApiError),
}

/// The subset of the GitHub Apps API needed to mint installation tokens.
pub trait AppsApi {
    /// `GET /orgs/{org}/installation`
    fn find_organization_installation(&self, org: &str) -> InstallationLookup;

    /// `GET /users/{user}/installation`
    fn find_user_installation(&self, user: &str) -> InstallationLookup;

    /// `GET /repos/{owner}/{repo}/installation`
    fn find_repository_installation(&self, owner: &str, repo: &str) -> InstallationLookup;

    /// `POST /app/installations/{installation_id}/access_tokens`
    fn create_installation_token(
        &self,
        installation_id: u64,
        options: &InstallationTokenOptions,
    ) -> Result<InstallationToken, ApiError>;
}

/// A blocking client for the GitHub REST API, authenticated as an App.
pub struct GitHubAppClient {
    client: Client,
    base_url: Url,
    app_token: AppTokenEncoder,
}

impl GitHubAppClient {
    /// Create a client for the public GitHub API.
    pub fn new(app_token: AppTokenEncoder) -> Result<Self, ApiError> {
        Self::with_base_url(app_token, GITHUB_API_URL)
    }

    /// Create a client for the API rooted at `base_url`, e.g. a GitHub Enterprise Server.
    pub fn with_base_url(app_token: AppTokenEncoder, base_url: &str) -> Result<Self, ApiError> {
        let url = Url::parse(base_url).map_err(|source| ApiError::BaseUrl {
            url: base_url.to_string(),
            source,
        })?;

        if url.cannot_be_a_base() {
            return Err(ApiError::CannotBeABase(base_url.to_string()));
        }

        let client = ClientBuilder::default()
            .user_agent(concat!(
                env!("CARGO_PKG_NAME"),
                "/",
                env!("CARGO_PKG_VERSION")
            ))
            .build()?;

        Ok(Self {
            client,
            base_url: url,
            app_token,
        })
    }

    /// Create a client for the API serving `target`.
    pub fn for_target(app_token: AppTokenEncoder, target: &RepoTarget) -> Result<Self, ApiError> {
        match target.enterprise_api_url() {
            Some(url) => Self::with_base_url(app_token, &url),
            None => Self::new(app_token),
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();

        url.path_segments_mut()
            .map_err(|_| ApiError::CannotBeABase(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);

        Ok(url)
    }

    fn authorize(&self, request: RequestBuilder) -> Result<RequestBuilder, ApiError> {
        let jwt = self.app_token.new_token(DEFAULT_APP_TOKEN_LIFETIME)?;

        Ok(request
            .bearer_auth(jwt)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", GITHUB_API_VERSION))
    }

    pub fn send_request(&self, request: RequestBuilder) -> Result<Response, ApiError> {
        let request = request.build()?;
        let method = request.method().to_string();
        let url = request.url().to_string();

        log::debug!("{} {}", request.method(), url);

        let response = self.client.execute(request)?;
        let status = response.status();

        log::debug!("{} {} -> {}", method, url, status);

        if status.is_success() {
            Ok(response)
        } else {
            let body = response.bytes()?;

            let message = serde_json::from_slice::<Value>(body.as_ref())
                .ok()
                .and_then(|value| serde_json::to_string_pretty(&value).ok())
                .unwrap_or_else(|| String::from_utf8_lossy(body.as_ref()).into());

            Err(ApiError::Response {
                method,
                url,
                status: status.as_u16(),
                message,
            })
        }
    }

    fn get_json<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T, ApiError> {
        let req = self.authorize(self.client.get(self.endpoint(segments)?))?;

        Ok(self.send_request(req)?.json()?)
    }

    fn find_installation(&self, segments: &[&str]) -> InstallationLookup {
        match self.get_json::<Installation>(segments) {
            Ok(installation) => InstallationLookup::Found(installation),
            Err(e) if e.is_not_found() => InstallationLookup::NotFound,
            Err(e) => InstallationLookup::Failed(e),
        }
    }
}

impl AppsApi for GitHubAppClient {
    fn find_organization_installation(&self, org: &str) -> InstallationLookup {
        self.find_installation(&["orgs", org, "installation"])
    }

    fn find_user_installation(&self, user: &str) -> InstallationLookup {
        self.find_installation(&["users", user, "installation"])
    }

    fn find_repository_installation(&self, owner: &str, repo: &str) -> InstallationLookup {
        self.find_installation(&["repos", owner, repo, "installation"])
    }

    fn create_installation_token(
        &self,
        installation_id: u64,
        options: &InstallationTokenOptions,
    ) -> Result<InstallationToken, ApiError> {
        let installation_id = installation_id.to_string();
        let url = self.endpoint(&["app", "installations", &installation_id, "access_tokens"])?;

        let req = self
            .authorize(self.client.post(url))?
            .header("Content-Type", "application/json")
            .json(options);

        Ok(self.send_request(req)?.json()?)
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("github api error:\n{method} {url} ({status})\n{message}")]
    Response {
        method: String,
        url: String,
        status: u16,
        message: String,
    },

    #[error("http request failed")]
    Http(#[from] reqwest::Error),

    #[error("invalid API base URL '{url}'")]
    BaseUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("API base URL '{0}' cannot carry a path")]
    CannotBeABase(String),

    #[error("failed to authenticate as app")]
    Jwt(#[from] JwtError),
}

impl ApiError {
    /// Whether the server answered 404 Not Found.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Response { status, .. } if *status == StatusCode::NOT_FOUND.as_u16())
    }
}

#[cfg(test)]
mod test {
    use {super::*, crate::AppPrivateKey};

    const PKCS1: &[u8] = include_bytes!("testdata/rsa-2048-pkcs1.pem");

    fn encoder() -> AppTokenEncoder {
        AppTokenEncoder::new(12345, &AppPrivateKey::from_pem(PKCS1, None).unwrap())
    }

    #[test]
    fn public_endpoints() -> Result<(), ApiError> {
        let client = GitHubAppClient::new(encoder())?;

        assert_eq!(
            client.endpoint(&["orgs", "dayflower", "installation"])?.as_str(),
            "https://api.github.com/orgs/dayflower/installation"
        );
        assert_eq!(
            client
                .endpoint(&["app", "installations", "42", "access_tokens"])?
                .as_str(),
            "https://api.github.com/app/installations/42/access_tokens"
        );

        Ok(())
    }

    #[test]
    fn enterprise_endpoints() -> Result<(), Box<dyn std::error::Error>> {
        let target = RepoTarget::parse("git@enterprise.example.net:dayflower/ghatoken.git")?;
        let client = GitHubAppClient::for_target(encoder(), &target)?;

        assert_eq!(
            client.base_url().as_str(),
            "https://enterprise.example.net/api/v3"
        );
        assert_eq!(
            client
                .endpoint(&["repos", "dayflower", "ghatoken", "installation"])?
                .as_str(),
            "https://enterprise.example.net/api/v3/repos/dayflower/ghatoken/installation"
        );

        let client = GitHubAppClient::with_base_url(encoder(), "https://ghe.example.com/api/v3/")?;
        assert_eq!(
            client.endpoint(&["users", "octocat", "installation"])?.as_str(),
            "https://ghe.example.com/api/v3/users/octocat/installation"
        );

        Ok(())
    }

    #[test]
    fn endpoint_segments_are_escaped() -> Result<(), ApiError> {
        let client = GitHubAppClient::new(encoder())?;

        assert_eq!(
            client.endpoint(&["orgs", "a/b", "installation"])?.as_str(),
            "https://api.github.com/orgs/a%2Fb/installation"
        );

        Ok(())
    }

    #[test]
    fn invalid_base_urls() {
        assert!(matches!(
            GitHubAppClient::with_base_url(encoder(), "not a url"),
            Err(ApiError::BaseUrl { .. })
        ));
        assert!(matches!(
            GitHubAppClient::with_base_url(encoder(), "mailto:admin@example.com"),
            Err(ApiError::CannotBeABase(_))
        ));
    }

    #[test]
    fn not_found_classification() {
        let response = |status| ApiError::Response {
            method: "GET".into(),
            url: "https://api.github.com/orgs/dayflower/installation".into(),
            status,
            message: "{}".into(),
        };

        assert!(response(404).is_not_found());
        assert!(!response(401).is_not_found());
        assert!(!response(500).is_not_found());
        assert!(!ApiError::CannotBeABase("x".into()).is_not_found());
    }

    #[test]
    fn installation_parsing() -> serde_json::Result<()> {
        let installation: Installation = serde_json::from_str(
            r#"{
                "id": 1,
                "account": {"login": "octocat", "id": 1, "type": "User"},
                "target_type": "User",
                "repository_selection": "all",
                "app_id": 1
            }"#,
        )?;

        assert_eq!(installation.id, 1);
        assert_eq!(
            installation.account.map(|a| a.login),
            Some("octocat".to_string())
        );

        Ok(())
    }
}

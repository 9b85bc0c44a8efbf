// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Installation access tokens.
//!
//! See also <https://docs.github.com/en/rest/apps/apps#create-an-installation-access-token-for-an-app>.

use {
    crate::client::{ApiError, AppsApi, Installation},
    serde::{Deserialize, Serialize},
    std::{
        collections::{BTreeMap, BTreeSet},
        fmt::{Debug, Formatter},
    },
    thiserror::Error,
};

/// Body of an installation access token request.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct InstallationTokenOptions {
    /// Repository names the token is restricted to.
    ///
    /// When absent, the token covers every repository the installation can access.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repositories: Option<Vec<String>>,
}

impl InstallationTokenOptions {
    /// Options restricting a token to `repositories`, if any are given.
    pub fn restricted_to(repositories: Option<&BTreeSet<String>>) -> Self {
        Self {
            repositories: repositories
                .filter(|repos| !repos.is_empty())
                .map(|repos| repos.iter().cloned().collect()),
        }
    }
}

/// A short-lived token acting as an installation.
#[derive(Clone, Deserialize, Serialize)]
pub struct InstallationToken {
    pub token: String,
    pub expires_at: Option<String>,
    #[serde(default)]
    pub permissions: BTreeMap<String, String>,
    pub repository_selection: Option<String>,
}

impl Debug for InstallationToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstallationToken")
            .field("token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .field("permissions", &self.permissions)
            .field("repository_selection", &self.repository_selection)
            .finish()
    }
}

/// Request a new token for `installation`.
///
/// The token is limited to `scope_repos` when a non-empty set is given. Otherwise it
/// carries the installation's full scope.
pub fn issue_token(
    api: &impl AppsApi,
    installation: &Installation,
    scope_repos: Option<&BTreeSet<String>>,
) -> Result<InstallationToken, IssueError> {
    let options = InstallationTokenOptions::restricted_to(scope_repos);

    match &options.repositories {
        Some(repos) => log::info!(
            "requesting token for installation {} restricted to {}",
            installation.id,
            repos.join(", ")
        ),
        None => log::info!("requesting token for installation {}", installation.id),
    }

    let token = api
        .create_installation_token(installation.id, &options)
        .map_err(|source| IssueError::TokenRequest {
            installation_id: installation.id,
            source,
        })?;

    if let Some(expires_at) = &token.expires_at {
        log::debug!("installation token expires at {expires_at}");
    }

    Ok(token)
}

#[derive(Debug, Error)]
pub enum IssueError {
    #[error("failed to create installation token for installation {installation_id}")]
    TokenRequest {
        installation_id: u64,
        #[source]
        source: ApiError,
    },
}

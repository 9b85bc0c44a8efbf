// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Mint GitHub App installation access tokens.
//!
//! Deriving a token takes three independent inputs through a short pipeline:
//!
//! 1. A specifier naming an owner or repository is parsed into a [RepoTarget].
//! 2. The App's PEM encoded private key is decoded into an [AppPrivateKey].
//! 3. Using a client authenticated as the App, the installation covering the target is
//!    located and exchanged for an [InstallationToken].
//!
//! ```no_run
//! use github_app_token::{
//!     create_installation_token, AppPrivateKey, AppTokenEncoder, GitHubAppClient, OwnerMode,
//!     RepoTarget,
//! };
//!
//! # fn main() -> github_app_token::Result<()> {
//! let target = RepoTarget::parse("git@github.com:dayflower/ghatoken.git")?;
//! let key = AppPrivateKey::from_pem(std::fs::read("app.pem")?, None)?;
//! let client = GitHubAppClient::for_target(AppTokenEncoder::new(12345, &key), &target)?;
//!
//! let token = create_installation_token(&client, &target, OwnerMode::default(), true)?;
//! println!("{}", token.token);
//! # Ok(())
//! # }
//! ```

mod app_token;
pub mod cli;
mod client;
mod issuer;
mod legacy_pem;
mod private_key;
mod resolver;
mod specifier;
#[cfg(test)]
mod testutil;

use {std::collections::BTreeSet, thiserror::Error};

pub use crate::{
    app_token::{AppJwt, AppTokenEncoder, JwtError, DEFAULT_APP_TOKEN_LIFETIME},
    client::{
        Account, ApiError, AppsApi, GitHubAppClient, Installation, InstallationLookup,
        GITHUB_API_URL,
    },
    issuer::{issue_token, InstallationToken, InstallationTokenOptions, IssueError},
    legacy_pem::{DecryptError, LegacyCipher},
    private_key::{AppPrivateKey, KeyDecodeError, KeyFormat},
    resolver::{
        resolve_org_installation, resolve_owner_installation, resolve_repo_installation,
        resolve_user_installation, select_owner_installation, LookupFailure, NamespaceProbe,
        OwnerMode, ResolveError,
    },
    specifier::{enterprise_api_url, RepoTarget, SpecifierError, GITHUB_DOT_COM},
};

pub type Result<T> = anyhow::Result<T>;

/// Any failure while deriving an installation token.
#[derive(Debug, Error)]
pub enum GitHubAppTokenError {
    #[error("failed to parse repo specifier")]
    Specifier(#[from] SpecifierError),

    #[error(transparent)]
    KeyDecode(#[from] KeyDecodeError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Issue(#[from] IssueError),
}

/// Resolve the installation covering `target` and mint a token for it.
///
/// Owner targets resolve according to `mode` and yield a token with the installation's
/// full scope. Repository targets resolve through the repository itself; the token is
/// limited to that repository when `restrict_scope_to_repo` is set.
pub fn create_installation_token(
    api: &impl AppsApi,
    target: &RepoTarget,
    mode: OwnerMode,
    restrict_scope_to_repo: bool,
) -> std::result::Result<InstallationToken, GitHubAppTokenError> {
    match target.repo() {
        None => {
            let installation = resolve_owner_installation(api, target.owner(), mode)?;

            Ok(issue_token(api, &installation, None)?)
        }
        Some(repo) => {
            let installation = resolve_repo_installation(api, target.owner(), repo)?;
            let scope = restrict_scope_to_repo.then(|| BTreeSet::from([repo.to_string()]));

            Ok(issue_token(api, &installation, scope.as_ref())?)
        }
    }
}

/// Derive a token from raw inputs, talking to the GitHub instance named by `specifier`.
pub fn mint_installation_token(
    app_id: u64,
    pem_data: &[u8],
    passphrase: Option<&[u8]>,
    specifier: &str,
    mode: OwnerMode,
    restrict_scope_to_repo: bool,
) -> std::result::Result<InstallationToken, GitHubAppTokenError> {
    let target = RepoTarget::parse(specifier)?;
    let key = AppPrivateKey::from_pem(pem_data, passphrase)?;

    let client = GitHubAppClient::for_target(AppTokenEncoder::new(app_id, &key), &target)?;
    log::debug!("using API at {}", client.base_url());

    create_installation_token(&client, &target, mode, restrict_scope_to_repo)
}

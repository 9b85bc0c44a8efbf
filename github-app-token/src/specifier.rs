// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Repository and owner specifiers.
//!
//! A specifier names either an owner (organization or user) or an `owner/repo` pair,
//! optionally on a GitHub Enterprise host. The following shapes are accepted:
//!
//! * URL: `https://github.com/dayflower/ghatoken.git`, `https://enterprise.example.net/dayflower`
//! * SCP-like: `git@github.com:dayflower/ghatoken.git`, `enterprise.example.net:dayflower`
//! * Bare: `dayflower/ghatoken.git`, `dayflower/ghatoken`, `dayflower`

use {
    std::{
        fmt::{Display, Formatter},
        str::FromStr,
    },
    thiserror::Error,
    url::Url,
};

/// Host name of the public GitHub instance.
///
/// Specifiers on this host never produce an enterprise host.
pub const GITHUB_DOT_COM: &str = "github.com";

/// Resolve the REST API base URL for a GitHub Enterprise host.
pub fn enterprise_api_url(host: &str) -> String {
    format!("https://{host}/api/v3")
}

/// The owner or repository a token is requested for.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RepoTarget {
    enterprise_host: Option<String>,
    owner: String,
    repo: Option<String>,
}

impl RepoTarget {
    /// Parse a free-form specifier.
    pub fn parse(specifier: &str) -> Result<Self, SpecifierError> {
        let malformed = || SpecifierError::Malformed(specifier.to_string());

        let (host, path) = if specifier.contains("://") {
            let url = Url::parse(specifier).map_err(|source| SpecifierError::InvalidUrl {
                specifier: specifier.to_string(),
                source,
            })?;

            let path = raw_url_path(specifier);
            let path = urlencoding::decode(path.strip_prefix('/').unwrap_or(path))
                .map_err(|_| malformed())?;

            (url.host_str().map(String::from), path.into_owned())
        } else if let Some((host_part, path)) = specifier.split_once(':') {
            if path.contains(':') {
                return Err(malformed());
            }

            // user@host
            let host = host_part
                .rsplit_once('@')
                .map_or(host_part, |(_, host)| host);

            (Some(host.to_string()), path.to_string())
        } else {
            (None, specifier.to_string())
        };

        let enterprise_host =
            host.filter(|host| !host.is_empty() && !host.eq_ignore_ascii_case(GITHUB_DOT_COM));

        let mut segments = path.splitn(3, '/');
        let owner = segments.next().unwrap_or_default();
        let repo = segments.next().unwrap_or_default();

        if owner.is_empty() || segments.next().is_some_and(|extra| !extra.is_empty()) {
            return Err(malformed());
        }

        let repo = repo.strip_suffix(".git").unwrap_or(repo);

        if is_dot_segment(owner) || is_dot_segment(repo) {
            return Err(malformed());
        }

        Ok(Self {
            enterprise_host,
            owner: owner.to_string(),
            repo: (!repo.is_empty()).then(|| repo.to_string()),
        })
    }

    /// The GitHub Enterprise host, if the specifier didn't point at github.com.
    pub fn enterprise_host(&self) -> Option<&str> {
        self.enterprise_host.as_deref()
    }

    /// Organization or user login. Never empty.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Repository name, absent when the specifier only names an owner.
    pub fn repo(&self) -> Option<&str> {
        self.repo.as_deref()
    }

    /// API base URL to use for this target, if not the public API.
    pub fn enterprise_api_url(&self) -> Option<String> {
        self.enterprise_host.as_deref().map(enterprise_api_url)
    }
}

/// The path of a URL as written.
///
/// [Url] removes dot segments while parsing, which would let `owner/../other` through.
fn raw_url_path(specifier: &str) -> &str {
    let rest = specifier
        .split_once("://")
        .map_or(specifier, |(_, rest)| rest);
    let rest = rest.split(['?', '#']).next().unwrap_or_default();

    rest.find('/').map_or("", |start| &rest[start..])
}

fn is_dot_segment(segment: &str) -> bool {
    segment == "." || segment == ".."
}

impl FromStr for RepoTarget {
    type Err = SpecifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Renders the target in SCP-like form when an enterprise host is present, bare form otherwise.
impl Display for RepoTarget {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if let Some(host) = &self.enterprise_host {
            write!(f, "{host}:")?;
        }

        f.write_str(&self.owner)?;

        if let Some(repo) = &self.repo {
            write!(f, "/{repo}")?;
        }

        Ok(())
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum SpecifierError {
    #[error("invalid repository URL '{specifier}'")]
    InvalidUrl {
        specifier: String,
        #[source]
        source: url::ParseError,
    },

    #[error("malformed specifier '{0}'")]
    Malformed(String),
}

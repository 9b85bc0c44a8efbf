// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use crate::{mint_installation_token, OwnerMode};
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::env::VarError;
use std::io::{Read, Write};
use std::path::PathBuf;

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// Private key file. `-` reads the key from stdin.
    #[clap(short = 'f', long, value_name = "PATH", conflicts_with = "private_key_env")]
    pub private_key_file: Option<PathBuf>,
    /// Name of the environment variable holding the private key.
    #[clap(short = 'e', long, value_name = "NAME")]
    pub private_key_env: Option<String>,
    /// Name of the environment variable holding the private key passphrase.
    #[clap(short = 's', long, value_name = "NAME", default_value = "PASSPHRASE")]
    pub passphrase_env: String,
    /// Only look for an installation on this kind of owner.
    #[clap(long, value_enum)]
    pub force_owner: Option<ForceOwner>,
    /// Restrict the token scope to the specified repository only.
    #[clap(short = 'r', long)]
    pub restrict_scope_repo: bool,
    /// GitHub App ID.
    pub app_id: u64,
    /// Repository or owner, e.g. `dayflower/ghatoken` or `git@github.com:dayflower`.
    pub specifier: String,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum ForceOwner {
    Org,
    User,
}

impl Args {
    pub fn owner_mode(&self) -> OwnerMode {
        match self.force_owner {
            None => OwnerMode::org_or_user(),
            Some(ForceOwner::Org) => OwnerMode::org_only(),
            Some(ForceOwner::User) => OwnerMode::user_only(),
        }
    }

    pub fn run(self) -> Result<()> {
        let pem_data = self.load_private_key_pem()?;
        let passphrase = self.load_passphrase()?;

        let token = mint_installation_token(
            self.app_id,
            &pem_data,
            passphrase.as_deref().map(str::as_bytes),
            &self.specifier,
            self.owner_mode(),
            self.restrict_scope_repo,
        )?;

        let mut stdout = std::io::stdout().lock();
        stdout.write_all(token.token.as_bytes())?;
        stdout.flush()?;

        Ok(())
    }

    /// Passphrase from the configured environment variable. Unset or empty means none.
    fn load_passphrase(&self) -> Result<Option<String>> {
        read_env(&self.passphrase_env).with_context(|| {
            format!(
                "failed to read passphrase environment variable '{}'",
                self.passphrase_env
            )
        })
    }

    fn load_private_key_pem(&self) -> Result<Vec<u8>> {
        if let Some(path) = &self.private_key_file {
            let data = if path.as_os_str() == "-" {
                let mut data = vec![];
                std::io::stdin()
                    .read_to_end(&mut data)
                    .map(|_| data)
            } else {
                std::fs::read(path)
            };

            data.context("failed to load private key pem")
        } else if let Some(name) = &self.private_key_env {
            match read_env(name).with_context(|| {
                format!("failed to read private key environment variable '{name}'")
            })? {
                Some(data) => Ok(data.into_bytes()),
                None => anyhow::bail!("private key environment variable '{name}' is not set"),
            }
        } else {
            anyhow::bail!(
                "you must specify either file name (--private-key-file) or environment name (--private-key-env) for the private key"
            );
        }
    }
}

/// Read an environment variable, treating unset and empty alike.
fn read_env(name: &str) -> std::result::Result<Option<String>, VarError> {
    match std::env::var(name) {
        Ok(value) => Ok(Some(value).filter(|v| !v.is_empty())),
        Err(VarError::NotPresent) => Ok(None),
        Err(e) => Err(e),
    }
}

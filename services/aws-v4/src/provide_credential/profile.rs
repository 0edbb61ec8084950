// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

use crate::{constants::*, Credential};
use async_trait::async_trait;
use elastic_http_core::{Context, Error, ProvideCredential, Result};
use ini::{Ini, Properties};
use log::debug;

/// ProfileCredentialProvider loads AWS credentials from the shared files.
///
/// This provider reads credentials from:
/// - `~/.aws/credentials` (or the path specified by `AWS_SHARED_CREDENTIALS_FILE`)
/// - `~/.aws/config` (or the path specified by `AWS_CONFIG_FILE`)
///
/// The profile to use is determined by:
/// 1. The `AWS_PROFILE` environment variable
/// 2. The profile specified via `with_profile()`
/// 3. Default to "default"
#[derive(Debug, Clone)]
pub struct ProfileCredentialProvider {
    profile: String,
    config_file: Option<String>,
    credentials_file: Option<String>,
}

impl Default for ProfileCredentialProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl ProfileCredentialProvider {
    /// Create a new ProfileCredentialProvider with default settings.
    pub fn new() -> Self {
        Self {
            profile: "default".to_string(),
            config_file: None,
            credentials_file: None,
        }
    }

    /// Set the profile name to use.
    pub fn with_profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = profile.into();
        self
    }

    /// Set the path to the config file.
    pub fn with_config_file(mut self, path: impl Into<String>) -> Self {
        self.config_file = Some(path.into());
        self
    }

    /// Set the path to the credentials file.
    pub fn with_credentials_file(mut self, path: impl Into<String>) -> Self {
        self.credentials_file = Some(path.into());
        self
    }

    /// Look `profile` up in one of the shared files.
    async fn load(
        &self,
        ctx: &Context,
        file: SharedFile,
        profile: &str,
    ) -> Result<Option<Credential>> {
        let (configured, env_key, fallback) = match file {
            SharedFile::Credentials => (
                &self.credentials_file,
                AWS_SHARED_CREDENTIALS_FILE,
                "~/.aws/credentials",
            ),
            SharedFile::Config => (&self.config_file, AWS_CONFIG_FILE, "~/.aws/config"),
        };
        let path = configured
            .clone()
            .or_else(|| ctx.env_var(env_key))
            .unwrap_or_else(|| fallback.to_string());

        let Some(conf) = load_ini(ctx, &path).await? else {
            return Ok(None);
        };

        // Non-default profiles live under `[profile <name>]` in the config file.
        let section = match (file, profile) {
            (SharedFile::Config, p) if p != "default" => format!("profile {p}"),
            (_, p) => p.to_string(),
        };

        match conf.section(Some(section.as_str())) {
            Some(props) => Ok(credential_from(props)),
            None => {
                debug!("section {section} not found in {path}");
                Ok(None)
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum SharedFile {
    Credentials,
    Config,
}

/// Read and parse an ini file, `None` if it can't be read.
async fn load_ini(ctx: &Context, path: &str) -> Result<Option<Ini>> {
    let Some(expanded_path) = ctx.expand_home_dir(path) else {
        debug!("failed to expand homedir for path: {path}");
        return Ok(None);
    };

    let content = match ctx.file_read(&expanded_path).await {
        Ok(content) => content,
        Err(err) => {
            debug!("failed to read {expanded_path}: {err:?}");
            return Ok(None);
        }
    };

    let conf = Ini::load_from_str(&String::from_utf8_lossy(&content)).map_err(|e| {
        Error::config_invalid(format!("failed to parse {expanded_path}")).with_source(e)
    })?;
    Ok(Some(conf))
}

fn credential_from(props: &Properties) -> Option<Credential> {
    let access_key_id = props.get("aws_access_key_id")?;
    let secret_access_key = props.get("aws_secret_access_key")?;

    Some(Credential {
        access_key_id: access_key_id.to_string(),
        secret_access_key: secret_access_key.to_string(),
        session_token: props.get("aws_session_token").map(|s| s.to_string()),
    })
}

#[async_trait]
impl ProvideCredential for ProfileCredentialProvider {
    type Credential = Credential;

    async fn provide_credential(&self, ctx: &Context) -> Result<Option<Self::Credential>> {
        let profile = ctx
            .env_var(AWS_PROFILE)
            .unwrap_or_else(|| self.profile.clone());

        // The credentials file wins over the config file.
        for file in [SharedFile::Credentials, SharedFile::Config] {
            if let Some(cred) = self.load(ctx, file, &profile).await? {
                return Ok(Some(cred));
            }
        }
        Ok(None)
    }
}

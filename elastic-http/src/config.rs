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

use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::time::Duration;

use elastic_http_core::{Error, Result};
use serde::Deserialize;
use serde_json::Value;

use crate::client::ClusterUrl;

/// Options whose values are numbers rather than templates or plain strings.
const NUMERIC_OPTIONS: [&str; 3] = ["flush_limit", "connect_timeout", "timeout"];

/// How requests reach the cluster.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum ClientMode {
    /// Plain HTTP, no signing.
    #[default]
    Http,
    /// Every request is signed with AWS SigV4.
    Aws,
}

impl FromStr for ClientMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "http" => Ok(ClientMode::Http),
            "aws" => Ok(ClientMode::Aws),
            v => Err(Error::config_invalid(format!(
                "client_mode must be http or aws, got {v:?}"
            ))),
        }
    }
}

impl TryFrom<String> for ClientMode {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl Display for ClientMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ClientMode::Http => f.write_str("http"),
            ClientMode::Aws => f.write_str("aws"),
        }
    }
}

/// Destination options, immutable once the destination is initialized.
///
/// `message_template`, `index`, `type` and `custom_id` are templates
/// resolved against every record.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Options {
    /// Base URL of the Elasticsearch endpoint.
    pub cluster_url: String,
    /// `http` or `aws`.
    #[serde(default)]
    pub client_mode: ClientMode,
    /// `1` sends every record on its own, larger values batch through `_bulk`.
    #[serde(default = "default_flush_limit")]
    pub flush_limit: usize,
    /// SigV4 region.
    #[serde(default = "default_aws_region")]
    pub aws_region: String,
    /// SigV4 service, only `es` is accepted.
    #[serde(default = "default_aws_service")]
    pub aws_service: String,
    /// Template producing the document JSON.
    pub message_template: String,
    /// Template producing the index name.
    pub index: String,
    /// Template producing the document type.
    #[serde(rename = "type", default = "default_type")]
    pub doc_type: String,
    /// Template producing the document id, empty lets the server assign one.
    #[serde(default)]
    pub custom_id: String,
    /// Connect timeout in seconds.
    #[serde(default)]
    pub connect_timeout: Option<u64>,
    /// Whole request timeout in seconds.
    #[serde(default)]
    pub timeout: Option<u64>,
}

fn default_flush_limit() -> usize {
    1
}

fn default_aws_region() -> String {
    "us-east-1".to_string()
}

fn default_aws_service() -> String {
    "es".to_string()
}

fn default_type() -> String {
    "_doc".to_string()
}

impl Options {
    /// Create options with the required values, everything else defaulted.
    pub fn new(cluster_url: &str, index: &str, message_template: &str) -> Self {
        Self {
            cluster_url: cluster_url.to_string(),
            client_mode: ClientMode::default(),
            flush_limit: default_flush_limit(),
            aws_region: default_aws_region(),
            aws_service: default_aws_service(),
            message_template: message_template.to_string(),
            index: index.to_string(),
            doc_type: default_type(),
            custom_id: String::new(),
            connect_timeout: None,
            timeout: None,
        }
    }

    /// Build options from the key/value pairs a host hands over.
    ///
    /// Keys are matched case-insensitively and `-` is accepted in place of `_`.
    pub fn from_map(map: &HashMap<String, String>) -> Result<Self> {
        let mut obj = serde_json::Map::with_capacity(map.len());
        for (key, value) in map {
            let key = key.trim().to_ascii_lowercase().replace('-', "_");
            let value = if NUMERIC_OPTIONS.contains(&key.as_str()) {
                let n: u64 = value.trim().parse().map_err(|e| {
                    Error::config_invalid(format!("option {key} must be a number, got {value:?}"))
                        .with_source(e)
                })?;
                Value::from(n)
            } else {
                Value::String(value.clone())
            };
            obj.insert(key, value);
        }

        serde_json::from_value(Value::Object(obj))
            .map_err(|e| Error::config_invalid(format!("invalid options: {e}")).with_source(e))
    }

    /// Check the options before any client is built.
    pub fn validate(&self) -> Result<()> {
        ClusterUrl::parse(&self.cluster_url)?;

        if self.flush_limit == 0 {
            return Err(Error::config_invalid("flush_limit must be at least 1"));
        }
        if self.index.trim().is_empty() {
            return Err(Error::config_invalid("index must not be empty"));
        }
        if self.message_template.trim().is_empty() {
            return Err(Error::config_invalid("message_template must not be empty"));
        }
        if self.aws_service != "es" {
            return Err(Error::config_invalid(format!(
                "aws_service must be es, got {:?}",
                self.aws_service
            )));
        }
        if self.client_mode == ClientMode::Aws && self.aws_region.trim().is_empty() {
            return Err(Error::config_invalid(
                "aws_region must not be empty in aws client mode",
            ));
        }

        Ok(())
    }

    /// `flush_limit` above one selects bulk mode.
    pub fn is_bulk(&self) -> bool {
        self.flush_limit > 1
    }

    /// Connect timeout as a [`Duration`].
    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout.map(Duration::from_secs)
    }

    /// Request timeout as a [`Duration`].
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout.map(Duration::from_secs)
    }
}

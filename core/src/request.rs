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

use std::collections::btree_map;
use std::collections::BTreeMap;
use std::fmt::{Debug, Formatter};

use bytes::Bytes;
use http::Method;
use percent_encoding::percent_decode_str;

use crate::utils::Redact;

/// Query parameters keyed by name, values kept in arrival order per key.
pub type QueryParams = BTreeMap<String, Vec<String>>;

/// Header values that must never show up in logs.
const SENSITIVE_HEADERS: [&str; 2] = ["authorization", "x-amz-security-token"];

/// Case-insensitive header container.
///
/// Entries are ordered by lowercased name. The spelling of a name is the one
/// seen first; inserting the same name again (in any case) replaces the value.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SigningHeaders {
    entries: BTreeMap<String, (String, String)>,
}

impl SigningHeaders {
    /// Create an empty header set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a header, replacing the value of any header with the same name.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.entries.entry(name.to_lowercase()) {
            btree_map::Entry::Occupied(mut entry) => entry.get_mut().1 = value,
            btree_map::Entry::Vacant(entry) => {
                entry.insert((name, value));
            }
        }
    }

    /// Get header value by name, ignoring case.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .get(&name.to_lowercase())
            .map(|(_, v)| v.as_str())
    }

    /// Check whether a header exists, ignoring case.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(&name.to_lowercase())
    }

    /// Number of distinct headers.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check whether there are no headers.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate `(name, value)` pairs in case-insensitive name order.
    ///
    /// Names keep the spelling they were first inserted with.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .values()
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Iterate `(lowercase name, value)` pairs in the same order as [`Self::iter`].
    pub fn iter_lowercase(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(k, (_, v))| (k.as_str(), v.as_str()))
    }
}

impl Debug for SigningHeaders {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut m = f.debug_map();
        for (lower, (name, value)) in &self.entries {
            if SENSITIVE_HEADERS.contains(&lower.as_str()) {
                m.entry(name, &Redact::from(value));
            } else {
                m.entry(name, value);
            }
        }
        m.finish()
    }
}

impl<K, V> FromIterator<(K, V)> for SigningHeaders
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut headers = SigningHeaders::new();
        for (k, v) in iter {
            headers.insert(k, v);
        }
        headers
    }
}

/// The transport independent view of a request handed to a signer.
#[derive(Debug, Clone)]
pub struct SigningRequest {
    /// HTTP method.
    pub method: Method,
    /// Decoded URI path, without query.
    pub path: String,
    /// Query parameters.
    pub query: QueryParams,
    /// HTTP headers.
    pub headers: SigningHeaders,
    /// Request body, `None` if the request carries no entity.
    pub payload: Option<Bytes>,
}

impl SigningRequest {
    /// Create a signing request for `method` and `path` with nothing else set.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: QueryParams::new(),
            headers: SigningHeaders::new(),
            payload: None,
        }
    }

    /// Append a query parameter.
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query
            .entry(key.into())
            .or_default()
            .push(value.into());
        self
    }

    /// Insert a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Set the payload.
    pub fn with_payload(mut self, payload: impl Into<Bytes>) -> Self {
        self.payload = Some(payload.into());
        self
    }

    /// Parse a raw query string into [`QueryParams`].
    ///
    /// - Pairs are split on `&` and trimmed; empty pairs are skipped.
    /// - Each pair is split on its first `=`.
    /// - Pairs without `=`, with an empty key or with an empty value are dropped.
    /// - Keys and values are percent-decoded after splitting.
    pub fn parse_query(raw: &str) -> QueryParams {
        let mut params = QueryParams::new();

        for pair in raw.split('&').map(str::trim).filter(|v| !v.is_empty()) {
            let Some((key, value)) = pair.split_once('=') else {
                continue;
            };
            if key.is_empty() || value.is_empty() {
                continue;
            }

            params
                .entry(percent_decode_str(key).decode_utf8_lossy().into_owned())
                .or_default()
                .push(percent_decode_str(value).decode_utf8_lossy().into_owned());
        }

        params
    }
}

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

//! In-memory transport recording every request, for tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use elastic_http_core::{Error, HttpSend, Result};
use http::{HeaderMap, Method, StatusCode};

/// A request as seen by the transport.
#[derive(Debug, Clone)]
pub(crate) struct Recorded {
    pub method: Method,
    pub uri: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl Recorded {
    pub fn path(&self) -> &str {
        let without_scheme = self.uri.split_once("://").map_or(self.uri.as_str(), |(_, v)| v);
        without_scheme
            .find('/')
            .map_or("/", |pos| &without_scheme[pos..])
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

#[derive(Debug, Clone, Copy)]
enum Behavior {
    Status(StatusCode),
    /// Every request fails with a transport error.
    Unreachable,
    /// Only `GET /_nodes` fails with a transport error.
    ProbeUnreachable,
}

/// `GET /_nodes` answers with a cluster named `test-cluster`, other requests
/// with the configured status.
#[derive(Debug, Clone)]
pub(crate) struct MockHttpSend {
    requests: Arc<Mutex<Vec<Recorded>>>,
    behavior: Arc<Mutex<Behavior>>,
}

impl MockHttpSend {
    pub fn new() -> Self {
        Self::with_behavior(Behavior::Status(StatusCode::CREATED))
    }

    pub fn with_status(status: StatusCode) -> Self {
        Self::with_behavior(Behavior::Status(status))
    }

    pub fn unreachable() -> Self {
        Self::with_behavior(Behavior::Unreachable)
    }

    pub fn probe_unreachable() -> Self {
        Self::with_behavior(Behavior::ProbeUnreachable)
    }

    fn with_behavior(behavior: Behavior) -> Self {
        Self {
            requests: Arc::default(),
            behavior: Arc::new(Mutex::new(behavior)),
        }
    }

    /// Change the status returned from now on.
    pub fn set_status(&self, status: StatusCode) {
        *self.behavior.lock().expect("lock must not be poisoned") = Behavior::Status(status);
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests
            .lock()
            .expect("lock must not be poisoned")
            .clone()
    }

    /// Requests except the `GET /_nodes` probes.
    pub fn document_requests(&self) -> Vec<Recorded> {
        self.requests()
            .into_iter()
            .filter(|r| r.path() != "/_nodes")
            .collect()
    }
}

#[async_trait]
impl HttpSend for MockHttpSend {
    async fn http_send(&self, req: http::Request<Bytes>) -> Result<http::Response<Bytes>> {
        let (parts, body) = req.into_parts();
        let recorded = Recorded {
            method: parts.method,
            uri: parts.uri.to_string(),
            headers: parts.headers,
            body,
        };
        let is_probe = recorded.path() == "/_nodes";
        self.requests
            .lock()
            .expect("lock must not be poisoned")
            .push(recorded);

        let behavior = *self.behavior.lock().expect("lock must not be poisoned");
        match behavior {
            Behavior::Unreachable => Err(Error::transport("connection refused")),
            Behavior::ProbeUnreachable if is_probe => Err(Error::transport("connection refused")),
            _ if is_probe => Ok(http::Response::builder()
                .status(StatusCode::OK)
                .body(Bytes::from_static(
                    br#"{"_nodes":{"total":1},"cluster_name":"test-cluster","nodes":{}}"#,
                ))?),
            Behavior::Status(status) => Ok(http::Response::builder()
                .status(status)
                .body(Bytes::from_static(b"{}"))?),
            Behavior::ProbeUnreachable => Ok(http::Response::builder()
                .status(StatusCode::CREATED)
                .body(Bytes::from_static(b"{}"))?),
        }
    }
}

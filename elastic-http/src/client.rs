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

use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use bytes::Bytes;
use elastic_http_core::{Context, Error, Intercept, Result};
use http::header::{CONTENT_LENGTH, CONTENT_TYPE, HOST};
use http::{Method, Request, Response};
use log::debug;

use crate::action::{bulk_body, IndexAction};

const APPLICATION_JSON: &str = "application/json";
const APPLICATION_NDJSON: &str = "application/x-ndjson";

/// A cluster url split into what requests are built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ClusterUrl {
    /// `scheme://host[:port][/prefix]` without trailing `/`.
    pub base_url: String,
    /// `host[:port]`, the value of the `host` header.
    pub host: String,
}

impl ClusterUrl {
    /// Parse an absolute http(s) url.
    ///
    /// Endpoint paths are appended to the url, so a query, a fragment or
    /// user info would end up in the wrong place and are rejected.
    pub fn parse(cluster_url: &str) -> Result<Self> {
        let raw = cluster_url.trim();
        let invalid =
            |reason: &str| Error::config_invalid(format!("cluster_url {cluster_url:?} {reason}"));

        let uri: http::Uri = raw
            .parse()
            .map_err(|e| invalid("is not a valid url").with_source(e))?;
        let (Some(scheme @ ("http" | "https")), Some(authority)) =
            (uri.scheme_str(), uri.authority())
        else {
            return Err(invalid("must be an absolute http or https url"));
        };
        if authority.as_str().contains('@') {
            return Err(invalid("must not contain user info"));
        }
        if uri.query().is_some() || raw.contains('#') {
            return Err(invalid("must not contain a query or a fragment"));
        }

        let host = match authority.port_u16() {
            Some(port) => format!("{}:{port}", authority.host()),
            None => authority.host().to_string(),
        };
        Ok(Self {
            base_url: format!("{scheme}://{host}{}", uri.path().trim_end_matches('/')),
            host,
        })
    }
}

/// Minimal Elasticsearch client: single index, bulk and nodes info.
///
/// `host`, `content-type` and `content-length` are set before the
/// interceptors run, so a signing interceptor covers them.
#[derive(Clone)]
pub struct ElasticClient {
    ctx: Context,
    base_url: String,
    host: String,
    interceptors: Vec<Arc<dyn Intercept>>,
    closed: bool,
}

impl Debug for ElasticClient {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElasticClient")
            .field("base_url", &self.base_url)
            .field("interceptors", &self.interceptors)
            .field("closed", &self.closed)
            .finish()
    }
}

impl ElasticClient {
    /// Create a client for the cluster at `cluster_url`, sending through `ctx`.
    pub fn new(ctx: Context, cluster_url: &str) -> Result<Self> {
        let ClusterUrl { base_url, host } = ClusterUrl::parse(cluster_url)?;

        Ok(Self {
            ctx,
            base_url,
            host,
            interceptors: Vec::new(),
            closed: false,
        })
    }

    /// Register a pre-send hook. Hooks run in registration order.
    pub fn with_interceptor(mut self, interceptor: impl Intercept) -> Self {
        self.interceptors.push(Arc::new(interceptor));
        self
    }

    /// The cluster base url without trailing `/`.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `POST /<index>/<type>[/<id>]` with the document as body.
    pub async fn index(&self, action: &IndexAction) -> Result<()> {
        self.execute(
            Method::POST,
            &action.path(),
            Some(APPLICATION_JSON),
            Bytes::from(action.document.clone()),
        )
        .await?;
        Ok(())
    }

    /// `POST /_bulk` with one action/document line pair per action.
    pub async fn bulk(&self, actions: &[IndexAction]) -> Result<()> {
        let body = bulk_body(actions)?;
        self.execute(
            Method::POST,
            "/_bulk",
            Some(APPLICATION_NDJSON),
            Bytes::from(body),
        )
        .await?;
        Ok(())
    }

    /// `GET /_nodes`, returning the parsed response.
    pub async fn nodes_info(&self) -> Result<serde_json::Value> {
        let resp = self.execute(Method::GET, "/_nodes", None, Bytes::new()).await?;
        Ok(serde_json::from_slice(resp.body())?)
    }

    /// Name of the cluster as reported by `GET /_nodes`.
    pub async fn cluster_name(&self) -> Result<String> {
        let info = self.nodes_info().await?;
        info.get("cluster_name")
            .and_then(|v| v.as_str())
            .map(|v| v.to_string())
            .ok_or_else(|| Error::unexpected("nodes info has no cluster_name"))
    }

    /// Stop accepting requests.
    pub fn shutdown(&mut self) {
        debug!("shutting down client for {}", self.base_url);
        self.closed = true;
    }

    /// Check whether [`Self::shutdown`] has been called.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    async fn execute(
        &self,
        method: Method,
        path: &str,
        content_type: Option<&'static str>,
        body: Bytes,
    ) -> Result<Response<Bytes>> {
        if self.closed {
            return Err(Error::transport("client has been shut down"));
        }

        let mut builder = Request::builder()
            .method(method.clone())
            .uri(format!("{}{}", self.base_url, path))
            .header(HOST, self.host.as_str());
        if let Some(content_type) = content_type {
            builder = builder
                .header(CONTENT_TYPE, content_type)
                .header(CONTENT_LENGTH, body.len());
        }
        let mut req = builder.body(body)?;

        for interceptor in &self.interceptors {
            interceptor.intercept(&mut req).await?;
        }

        debug!("sending {method} {path} ({} bytes)", req.body().len());
        let resp = self.ctx.http_send(req).await?;

        let status = resp.status();
        if !status.is_success() {
            debug!(
                "{method} {path} failed: {}",
                String::from_utf8_lossy(resp.body())
            );
            return Err(Error::transport(format!(
                "{method} {path} failed with status {status}"
            )));
        }

        Ok(resp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockHttpSend;
    use elastic_http_core::ErrorKind;
    use http::StatusCode;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    fn client(mock: &MockHttpSend) -> ElasticClient {
        ElasticClient::new(
            Context::new().with_http_send(mock.clone()),
            "http://search.example.com:9200/",
        )
        .expect("client must build")
    }

    #[test_case("http://localhost:9200", "http://localhost:9200", "localhost:9200" ; "host and port")]
    #[test_case(" https://search.example.com/ ", "https://search.example.com", "search.example.com" ; "trailing slash")]
    #[test_case("http://proxy:8080/es/", "http://proxy:8080/es", "proxy:8080" ; "path prefix")]
    fn test_cluster_url_parse(input: &str, base_url: &str, host: &str) {
        let url = ClusterUrl::parse(input).expect("url must parse");
        assert_eq!(url.base_url, base_url);
        assert_eq!(url.host, host);
    }

    #[test_case("http://localhost:9200/?pretty=true" ; "query")]
    #[test_case("http://localhost:9200?pretty" ; "query without path")]
    #[test_case("http://localhost:9200/#top" ; "fragment")]
    #[test_case("http://user:pw@localhost:9200" ; "user info")]
    #[test_case("localhost:9200" ; "no scheme")]
    #[test_case("/_nodes" ; "relative")]
    fn test_cluster_url_rejects(input: &str) {
        let err = ElasticClient::new(Context::new(), input).expect_err("url must be rejected");
        assert_eq!(err.kind(), ErrorKind::ConfigInvalid);
    }

    #[tokio::test]
    async fn test_path_prefix_is_kept() -> anyhow::Result<()> {
        let mock = MockHttpSend::new();
        let client = ElasticClient::new(
            Context::new().with_http_send(mock.clone()),
            "http://proxy:8080/es/",
        )?;
        client
            .index(&IndexAction::new("{}", "logs", "_doc", "1"))
            .await?;

        let requests = mock.requests();
        assert_eq!(requests[0].uri, "http://proxy:8080/es/logs/_doc/1");
        assert_eq!(requests[0].header("host"), Some("proxy:8080"));
        Ok(())
    }

    #[tokio::test]
    async fn test_index_request() -> anyhow::Result<()> {
        let mock = MockHttpSend::new();
        client(&mock)
            .index(&IndexAction::new(r#"{"m":"x"}"#, "logs-2024", "_doc", "abc"))
            .await?;

        let requests = mock.requests();
        assert_eq!(requests.len(), 1);
        let req = &requests[0];
        assert_eq!(req.method, Method::POST);
        assert_eq!(req.uri, "http://search.example.com:9200/logs-2024/_doc/abc");
        assert_eq!(req.header("host"), Some("search.example.com:9200"));
        assert_eq!(req.header("content-type"), Some("application/json"));
        assert_eq!(req.header("content-length"), Some("9"));
        assert_eq!(req.body.as_ref(), br#"{"m":"x"}"#);
        Ok(())
    }

    #[tokio::test]
    async fn test_bulk_request() -> anyhow::Result<()> {
        let mock = MockHttpSend::new();
        client(&mock)
            .bulk(&[
                IndexAction::new("{}", "a", "_doc", ""),
                IndexAction::new("{}", "b", "_doc", ""),
            ])
            .await?;

        let requests = mock.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].path(), "/_bulk");
        assert_eq!(requests[0].header("content-type"), Some("application/x-ndjson"));
        assert_eq!(
            String::from_utf8_lossy(&requests[0].body),
            "{\"index\":{\"_index\":\"a\",\"_type\":\"_doc\"}}\n{}\n\
             {\"index\":{\"_index\":\"b\",\"_type\":\"_doc\"}}\n{}\n"
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_cluster_name() -> anyhow::Result<()> {
        let mock = MockHttpSend::new();
        assert_eq!(client(&mock).cluster_name().await?, "test-cluster");

        let requests = mock.requests();
        assert_eq!(requests[0].method, Method::GET);
        assert_eq!(requests[0].path(), "/_nodes");
        assert_eq!(requests[0].header("content-length"), None);
        Ok(())
    }

    #[tokio::test]
    async fn test_non_success_status_is_transport_error() {
        let mock = MockHttpSend::with_status(StatusCode::BAD_REQUEST);
        let err = client(&mock)
            .index(&IndexAction::new("{}", "logs", "_doc", ""))
            .await
            .expect_err("must fail");
        assert_eq!(err.kind(), ErrorKind::Transport);
    }

    #[tokio::test]
    async fn test_shutdown_rejects_requests() {
        let mock = MockHttpSend::new();
        let mut client = client(&mock);
        client.shutdown();
        assert!(client.is_closed());

        let err = client.cluster_name().await.expect_err("must fail");
        assert_eq!(err.kind(), ErrorKind::Transport);
        assert!(mock.requests().is_empty());
    }

    #[tokio::test]
    async fn test_interceptors_run_in_order() -> anyhow::Result<()> {
        #[derive(Debug)]
        struct AppendHeader(&'static str);

        #[async_trait::async_trait]
        impl Intercept for AppendHeader {
            async fn intercept(&self, req: &mut Request<Bytes>) -> Result<()> {
                req.headers_mut()
                    .append("x-trace", http::HeaderValue::from_static(self.0));
                Ok(())
            }
        }

        let mock = MockHttpSend::new();
        client(&mock)
            .with_interceptor(AppendHeader("first"))
            .with_interceptor(AppendHeader("second"))
            .index(&IndexAction::new("{}", "logs", "_doc", ""))
            .await?;

        let requests = mock.requests();
        let values: Vec<_> = requests[0]
            .headers
            .get_all("x-trace")
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect();
        assert_eq!(values, vec!["first", "second"]);
        Ok(())
    }

    #[test]
    fn test_invalid_cluster_url() {
        let err = ElasticClient::new(Context::new(), "not a url").expect_err("must fail");
        assert_eq!(err.kind(), ErrorKind::ConfigInvalid);
        let err = ElasticClient::new(Context::new(), "/relative").expect_err("must fail");
        assert_eq!(err.kind(), ErrorKind::ConfigInvalid);
    }
}

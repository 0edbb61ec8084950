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

use std::fmt::{Display, Formatter};
use std::sync::Arc;

use elastic_http_aws_v4::{Credential, DefaultCredentialProvider, RequestSigner, SigningInterceptor};
use elastic_http_core::{Context, Error, ProvideCredential, Result};
use log::{debug, info, warn};

use crate::action::IndexAction;
use crate::client::ElasticClient;
use crate::config::{ClientMode, Options};
use crate::processor::MessageProcessor;
use crate::template::{ResolveTemplate, TimeZone};

/// Name reported when the cluster could not be probed.
const UNNAMED_CLUSTER: &str = "unnamed";

/// Lifecycle of a [`Destination`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestinationState {
    /// Created, not initialized yet.
    New,
    /// Options validated, client and processor built.
    Initialized,
    /// Accepting records.
    Opened,
    /// Pending records flushed.
    Closed,
    /// Client shut down.
    Deinitialized,
}

impl Display for DestinationState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DestinationState::New => "new",
            DestinationState::Initialized => "initialized",
            DestinationState::Opened => "opened",
            DestinationState::Closed => "closed",
            DestinationState::Deinitialized => "deinitialized",
        };
        f.write_str(s)
    }
}

/// Forwards records to Elasticsearch.
///
/// Every record is resolved into an [`IndexAction`] through the four
/// templates of [`Options`] and handed to the [`MessageProcessor`]. The host
/// drives one instance from a single thread: `init`, `open`, `send`, `close`
/// and `deinit` never overlap.
#[derive(Debug)]
pub struct Destination<R: ResolveTemplate> {
    options: Options,
    resolver: R,
    ctx: Context,
    credential_provider: Option<Arc<dyn ProvideCredential<Credential = Credential>>>,

    state: DestinationState,
    client: Option<ElasticClient>,
    processor: Option<MessageProcessor>,
    cluster_name: Option<String>,
}

impl<R: ResolveTemplate> Destination<R> {
    /// Create a destination sending through `ctx`.
    pub fn new(options: Options, resolver: R, ctx: Context) -> Self {
        Self {
            options,
            resolver,
            ctx,
            credential_provider: None,

            state: DestinationState::New,
            client: None,
            processor: None,
            cluster_name: None,
        }
    }

    /// Create a destination with [`crate::default_context`].
    pub fn with_default_context(options: Options, resolver: R) -> Result<Self> {
        let ctx = crate::default_context(&options)?;
        Ok(Self::new(options, resolver, ctx))
    }

    /// Use `provider` instead of [`DefaultCredentialProvider`] in aws client mode.
    pub fn with_credential_provider(
        mut self,
        provider: impl ProvideCredential<Credential = Credential>,
    ) -> Self {
        self.credential_provider = Some(Arc::new(provider));
        self
    }

    /// The options this destination was created with.
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Current lifecycle state.
    pub fn state(&self) -> DestinationState {
        self.state
    }

    /// Cluster name probed during `init`, `unnamed` if the probe failed.
    pub fn cluster_name(&self) -> Option<&str> {
        self.cluster_name.as_deref()
    }

    /// Validate options, build the client and the processor, then probe the cluster.
    pub async fn init(&mut self) -> Result<()> {
        self.check_state(&[DestinationState::New], "init")?;
        debug!("initializing elasticsearch destination");

        self.options.validate()?;
        let client = self.build_client()?;
        let processor = MessageProcessor::new(self.options.flush_limit);
        debug!(
            "built {} client with {} processor",
            self.options.client_mode,
            if self.options.is_bulk() { "bulk" } else { "single" }
        );

        let cluster_name = match client.cluster_name().await {
            Ok(name) => name,
            Err(err) => {
                warn!("failed to probe cluster name, using {UNNAMED_CLUSTER}: {err}");
                UNNAMED_CLUSTER.to_string()
            }
        };
        info!(
            "elasticsearch destination initialized for cluster {cluster_name} at {}",
            client.base_url()
        );

        self.client = Some(client);
        self.processor = Some(processor);
        self.cluster_name = Some(cluster_name);
        self.state = DestinationState::Initialized;
        Ok(())
    }

    /// Always succeeds once initialized. Requests open their own connections.
    pub fn open(&mut self) -> Result<()> {
        self.check_state(
            &[
                DestinationState::Initialized,
                DestinationState::Opened,
                DestinationState::Closed,
            ],
            "open",
        )?;
        self.state = DestinationState::Opened;
        Ok(())
    }

    /// There is no connection to lose, so this is always `true`.
    pub fn is_opened(&self) -> bool {
        true
    }

    /// Resolve `record` and forward it.
    ///
    /// Returns `Ok(false)` when the request failed in transport or signing
    /// and the host should redeliver. Template failures are errors.
    pub async fn send(&mut self, record: &R::Record) -> Result<bool> {
        self.check_state(
            &[DestinationState::Initialized, DestinationState::Opened],
            "send",
        )?;

        let action = self.index_action(record)?;
        debug!(
            "outgoing log entry to {}/{}: {}",
            action.index, action.doc_type, action.document
        );

        let (Some(client), Some(processor)) = (&self.client, &mut self.processor) else {
            return Err(Error::unexpected("destination has no client"));
        };
        processor.send(client, action).await
    }

    /// Flush pending records.
    pub async fn close(&mut self) -> Result<bool> {
        self.check_state(
            &[DestinationState::Initialized, DestinationState::Opened],
            "close",
        )?;

        let flushed = match (&self.client, &mut self.processor) {
            (Some(client), Some(processor)) => processor.flush(client).await?,
            _ => true,
        };
        if !flushed {
            warn!("failed to flush pending records on close");
        }

        self.state = DestinationState::Closed;
        Ok(flushed)
    }

    /// Shut the client down and release the processor.
    ///
    /// Records still pending are dropped.
    pub fn deinit(&mut self) -> Result<()> {
        self.check_state(
            &[
                DestinationState::Initialized,
                DestinationState::Opened,
                DestinationState::Closed,
            ],
            "deinit",
        )?;

        if let Some(processor) = self.processor.take() {
            if processor.pending() > 0 {
                warn!(
                    "dropping {} pending records on deinit",
                    processor.pending()
                );
            }
        }
        if let Some(client) = self.client.as_mut() {
            client.shutdown();
        }

        self.state = DestinationState::Deinitialized;
        Ok(())
    }

    /// Identity of this destination: `ElasticSearch,<cluster_name>,<index template>`.
    pub fn name_by_uniq_options(&self) -> String {
        format!(
            "ElasticSearch,{},{}",
            self.cluster_name.as_deref().unwrap_or(UNNAMED_CLUSTER),
            self.options.index
        )
    }

    fn build_client(&self) -> Result<ElasticClient> {
        let client = ElasticClient::new(self.ctx.clone(), &self.options.cluster_url)?;

        match self.options.client_mode {
            ClientMode::Http => Ok(client),
            ClientMode::Aws => {
                let provider: Arc<dyn ProvideCredential<Credential = Credential>> =
                    match &self.credential_provider {
                        Some(provider) => provider.clone(),
                        None => Arc::new(DefaultCredentialProvider::new()),
                    };
                let signer = RequestSigner::from_shared_provider(
                    self.ctx.clone(),
                    provider,
                    &self.options.aws_region,
                    &self.options.aws_service,
                );
                debug!(
                    "signing requests for region {} service {}",
                    signer.region(),
                    signer.service()
                );
                Ok(client.with_interceptor(SigningInterceptor::new(signer)))
            }
        }
    }

    fn index_action(&self, record: &R::Record) -> Result<IndexAction> {
        let resolve = |template: &str| self.resolver.resolve(template, record, TimeZone::Send);

        Ok(IndexAction {
            document: resolve(&self.options.message_template)?,
            index: resolve(&self.options.index)?,
            doc_type: resolve(&self.options.doc_type)?,
            id: resolve(&self.options.custom_id)?,
        })
    }

    fn check_state(&self, allowed: &[DestinationState], op: &str) -> Result<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(Error::unexpected(format!(
                "{op} is not allowed when destination is {}",
                self.state
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockHttpSend;
    use crate::template::MacroTemplate;
    use elastic_http_aws_v4::StaticCredentialProvider;
    use elastic_http_core::{ErrorKind, StaticEnv};
    use http::StatusCode;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn options() -> Options {
        let mut options = Options::new("http://localhost:9200", "logs-${YEAR}", r#"{"m":"$MSG"}"#);
        options.custom_id = "$ID".to_string();
        options
    }

    fn record(msg: &str, id: &str) -> HashMap<String, String> {
        HashMap::from([
            ("MSG".to_string(), msg.to_string()),
            ("ID".to_string(), id.to_string()),
            ("YEAR".to_string(), "2024".to_string()),
        ])
    }

    fn destination(options: Options, mock: &MockHttpSend) -> Destination<MacroTemplate> {
        let ctx = Context::new().with_http_send(mock.clone());
        Destination::new(options, MacroTemplate, ctx)
    }

    #[tokio::test]
    async fn test_single_send_posts_document() -> anyhow::Result<()> {
        let _ = env_logger::builder().is_test(true).try_init();

        let mock = MockHttpSend::new();
        let mut dest = destination(options(), &mock);
        dest.init().await?;
        dest.open()?;

        assert!(dest.send(&record("x", "abc")).await?);

        let requests = mock.document_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, http::Method::POST);
        assert_eq!(requests[0].path(), "/logs-2024/_doc/abc");
        assert_eq!(requests[0].body.as_ref(), br#"{"m":"x"}"#);
        assert_eq!(requests[0].header("content-type"), Some("application/json"));
        assert_eq!(requests[0].header("authorization"), None);

        assert!(dest.close().await?);
        dest.deinit()?;
        assert_eq!(dest.state(), DestinationState::Deinitialized);
        Ok(())
    }

    #[tokio::test]
    async fn test_init_probes_cluster_name() -> anyhow::Result<()> {
        let mock = MockHttpSend::new();
        let mut dest = destination(options(), &mock);
        assert_eq!(dest.name_by_uniq_options(), "ElasticSearch,unnamed,logs-${YEAR}");

        dest.init().await?;
        assert_eq!(dest.cluster_name(), Some("test-cluster"));
        assert_eq!(
            dest.name_by_uniq_options(),
            "ElasticSearch,test-cluster,logs-${YEAR}"
        );
        assert_eq!(mock.requests().len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_unreachable_probe_is_unnamed() -> anyhow::Result<()> {
        let mock = MockHttpSend::probe_unreachable();
        let mut dest = destination(options(), &mock);

        dest.init().await?;
        assert_eq!(dest.state(), DestinationState::Initialized);
        assert_eq!(dest.cluster_name(), Some("unnamed"));
        assert_eq!(dest.name_by_uniq_options(), "ElasticSearch,unnamed,logs-${YEAR}");

        // Sending still works once the cluster answers document requests.
        dest.open()?;
        assert!(dest.send(&record("x", "1")).await?);
        Ok(())
    }

    #[tokio::test]
    async fn test_bulk_send_and_close_flushes() -> anyhow::Result<()> {
        let mock = MockHttpSend::new();
        let mut options = options();
        options.flush_limit = 3;
        options.custom_id = String::new();
        let mut dest = destination(options, &mock);
        dest.init().await?;
        dest.open()?;

        for n in 0..4 {
            assert!(dest.send(&record(&n.to_string(), "")).await?);
        }
        let requests = mock.document_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].path(), "/_bulk");
        assert_eq!(
            requests[0].header("content-type"),
            Some("application/x-ndjson")
        );
        let body = String::from_utf8_lossy(&requests[0].body).to_string();
        assert_eq!(
            body,
            concat!(
                r#"{"index":{"_index":"logs-2024","_type":"_doc"}}"#,
                "\n",
                r#"{"m":"0"}"#,
                "\n",
                r#"{"index":{"_index":"logs-2024","_type":"_doc"}}"#,
                "\n",
                r#"{"m":"1"}"#,
                "\n",
                r#"{"index":{"_index":"logs-2024","_type":"_doc"}}"#,
                "\n",
                r#"{"m":"2"}"#,
                "\n",
            )
        );

        assert!(dest.close().await?);
        let requests = mock.document_requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(String::from_utf8_lossy(&requests[1].body).lines().count(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_send_failure_asks_for_redelivery() -> anyhow::Result<()> {
        let mock = MockHttpSend::new();
        let mut dest = destination(options(), &mock);
        dest.init().await?;
        dest.open()?;

        mock.set_status(StatusCode::SERVICE_UNAVAILABLE);
        assert!(!dest.send(&record("x", "1")).await?);

        mock.set_status(StatusCode::CREATED);
        assert!(dest.send(&record("x", "1")).await?);
        Ok(())
    }

    #[tokio::test]
    async fn test_template_error_is_returned() -> anyhow::Result<()> {
        let mock = MockHttpSend::new();
        let mut options = options();
        options.index = "logs-${YEAR".to_string();
        let mut dest = destination(options, &mock);
        dest.init().await?;
        dest.open()?;

        let err = dest
            .send(&record("x", "1"))
            .await
            .expect_err("template must fail");
        assert_eq!(err.kind(), ErrorKind::TemplateInvalid);
        assert!(mock.document_requests().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_invalid_options_fail_init() {
        let mock = MockHttpSend::new();
        let mut options = options();
        options.flush_limit = 0;
        let mut dest = destination(options, &mock);

        let err = dest.init().await.expect_err("init must fail");
        assert_eq!(err.kind(), ErrorKind::ConfigInvalid);
        assert_eq!(dest.state(), DestinationState::New);
        assert!(mock.requests().is_empty());
    }

    #[tokio::test]
    async fn test_cluster_url_with_query_fails_init() {
        let mock = MockHttpSend::new();
        let mut options = options();
        options.cluster_url = "http://localhost:9200/?pretty=true".to_string();
        let mut dest = destination(options, &mock);

        let err = dest.init().await.expect_err("init must fail");
        assert_eq!(err.kind(), ErrorKind::ConfigInvalid);
        assert_eq!(dest.state(), DestinationState::New);
        assert!(mock.requests().is_empty());
    }

    #[tokio::test]
    async fn test_lifecycle_order_is_enforced() -> anyhow::Result<()> {
        let mock = MockHttpSend::new();
        let mut dest = destination(options(), &mock);

        assert!(dest.open().is_err());
        assert!(dest.send(&record("x", "1")).await.is_err());
        assert!(dest.close().await.is_err());
        assert!(dest.deinit().is_err());
        assert!(dest.is_opened());

        dest.init().await?;
        let err = dest.init().await.expect_err("second init must fail");
        assert_eq!(err.kind(), ErrorKind::Unexpected);

        dest.open()?;
        assert!(dest.close().await?);
        assert!(dest.send(&record("x", "1")).await.is_err());

        // A closed destination can be reopened.
        dest.open()?;
        assert!(dest.send(&record("x", "1")).await?);
        assert!(dest.close().await?);

        dest.deinit()?;
        assert!(dest.open().is_err());
        assert!(dest.deinit().is_err());
        Ok(())
    }

    #[tokio::test]
    async fn test_deinit_drops_pending() -> anyhow::Result<()> {
        let mock = MockHttpSend::new();
        let mut options = options();
        options.flush_limit = 10;
        let mut dest = destination(options, &mock);
        dest.init().await?;
        dest.open()?;

        assert!(dest.send(&record("x", "1")).await?);
        dest.deinit()?;
        assert!(mock.document_requests().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_aws_mode_signs_requests() -> anyhow::Result<()> {
        let mock = MockHttpSend::new();
        let ctx = Context::new()
            .with_http_send(mock.clone())
            .with_env(StaticEnv {
                home_dir: None,
                envs: HashMap::from([
                    ("AWS_ACCESS_KEY_ID".to_string(), "AKIDEXAMPLE".to_string()),
                    (
                        "AWS_SECRET_ACCESS_KEY".to_string(),
                        "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY".to_string(),
                    ),
                ]),
            });
        let mut options = options();
        options.client_mode = ClientMode::Aws;
        options.aws_region = "eu-west-1".to_string();
        let mut dest = Destination::new(options, MacroTemplate, ctx);

        dest.init().await?;
        dest.open()?;
        assert!(dest.send(&record("x", "abc")).await?);

        let requests = mock.requests();
        assert_eq!(requests.len(), 2);
        for req in &requests {
            let auth = req.header("authorization").expect("request must be signed");
            assert!(auth.starts_with("AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/"));
            assert!(auth.contains("/eu-west-1/es/aws4_request"));
            assert!(req.header("x-amz-date").is_some());
        }

        let probe = requests[0].header("authorization").unwrap_or_default();
        assert!(probe.contains("SignedHeaders=host;x-amz-date,"));
        let doc = requests[1].header("authorization").unwrap_or_default();
        assert!(doc.contains("SignedHeaders=content-length;content-type;host;x-amz-date,"));
        Ok(())
    }

    #[tokio::test]
    async fn test_aws_mode_without_credential_asks_for_redelivery() -> anyhow::Result<()> {
        let mock = MockHttpSend::new();
        let mut options = options();
        options.client_mode = ClientMode::Aws;
        let mut dest = destination(options, &mock)
            .with_credential_provider(StaticCredentialProvider::new("", ""));

        dest.init().await?;
        assert_eq!(dest.cluster_name(), Some("unnamed"));
        dest.open()?;
        assert!(!dest.send(&record("x", "1")).await?);
        assert!(mock.requests().is_empty());
        Ok(())
    }
}

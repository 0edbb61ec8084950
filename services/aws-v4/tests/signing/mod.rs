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

//! Live signing tests against an Amazon Elasticsearch domain.
//!
//! Enabled with `ELASTIC_HTTP_AWS_V4_TEST=on`; settings may come from `.env`.

mod special_chars;
mod standard;

use std::env;

use anyhow::Result;
use bytes::Bytes;
use elastic_http_aws_v4::{DefaultCredentialProvider, RequestSigner, SigningInterceptor};
use elastic_http_core::{Context, Intercept, OsEnv};
use elastic_http_file_read_tokio::TokioFileRead;
use elastic_http_send_reqwest::ReqwestHttpSend;
use http::{Request, StatusCode};
use log::debug;

/// Initialize test environment
pub fn init_signing_test() -> Option<(Context, SigningInterceptor, String)> {
    let _ = env_logger::builder().is_test(true).try_init();
    let _ = dotenv::dotenv();

    if env::var("ELASTIC_HTTP_AWS_V4_TEST").ok().as_deref() != Some("on") {
        return None;
    }

    let region =
        env::var("ELASTIC_HTTP_AWS_V4_REGION").expect("ELASTIC_HTTP_AWS_V4_REGION must be set");
    let url = env::var("ELASTIC_HTTP_AWS_V4_URL").expect("ELASTIC_HTTP_AWS_V4_URL must be set");

    let ctx = Context::new()
        .with_file_read(TokioFileRead)
        .with_http_send(ReqwestHttpSend::default())
        .with_env(OsEnv);
    let signer = RequestSigner::new(ctx.clone(), DefaultCredentialProvider::new(), &region, "es");

    Some((ctx, SigningInterceptor::new(signer), url))
}

/// Sign the request, send it and return the response
pub async fn send_signed_request(
    ctx: &Context,
    interceptor: &SigningInterceptor,
    mut req: Request<Bytes>,
) -> Result<(StatusCode, String)> {
    let authority = req
        .uri()
        .authority()
        .map(|v| v.to_string())
        .unwrap_or_default();
    req.headers_mut().insert(http::header::HOST, authority.parse()?);

    interceptor.intercept(&mut req).await?;
    debug!("signed request: {req:?}");

    let resp = ctx.http_send(req).await?;
    let status = resp.status();
    let body = String::from_utf8_lossy(resp.body()).to_string();
    debug!("got response: {status} {body}");

    Ok((status, body))
}

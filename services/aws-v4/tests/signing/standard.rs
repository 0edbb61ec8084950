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

use super::{init_signing_test, send_signed_request};
use anyhow::Result;
use bytes::Bytes;
use http::{Method, Request, StatusCode};
use log::warn;

#[tokio::test]
async fn test_get_nodes() -> Result<()> {
    let Some((ctx, interceptor, url)) = init_signing_test() else {
        warn!("ELASTIC_HTTP_AWS_V4_TEST is not set, skipped");
        return Ok(());
    };

    let req = Request::builder()
        .method(Method::GET)
        .uri(format!("{url}/_nodes"))
        .body(Bytes::new())?;

    let (status, body) = send_signed_request(&ctx, &interceptor, req).await?;
    assert_eq!(StatusCode::OK, status);
    assert!(body.contains("cluster_name"));
    Ok(())
}

#[tokio::test]
async fn test_index_document() -> Result<()> {
    let Some((ctx, interceptor, url)) = init_signing_test() else {
        warn!("ELASTIC_HTTP_AWS_V4_TEST is not set, skipped");
        return Ok(());
    };

    let body = Bytes::from_static(br#"{"message":"signed by elastic-http"}"#);
    let req = Request::builder()
        .method(Method::POST)
        .uri(format!("{url}/elastic-http-test/_doc"))
        .header(http::header::CONTENT_TYPE, "application/json")
        .header(http::header::CONTENT_LENGTH, body.len())
        .body(body)?;

    let (status, _body) = send_signed_request(&ctx, &interceptor, req).await?;
    assert_eq!(StatusCode::CREATED, status);
    Ok(())
}

#[tokio::test]
async fn test_get_missing_document() -> Result<()> {
    let Some((ctx, interceptor, url)) = init_signing_test() else {
        warn!("ELASTIC_HTTP_AWS_V4_TEST is not set, skipped");
        return Ok(());
    };

    let req = Request::builder()
        .method(Method::GET)
        .uri(format!("{url}/elastic-http-test/_doc/not_exist_document"))
        .body(Bytes::new())?;

    let (status, _body) = send_signed_request(&ctx, &interceptor, req).await?;
    assert_eq!(StatusCode::NOT_FOUND, status);
    Ok(())
}

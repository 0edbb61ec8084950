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

use async_trait::async_trait;
use bytes::Bytes;
use elastic_http_core::{Error, Intercept, Result, SigningHeaders, SigningRequest};
use http::header::{HeaderMap, HeaderName, HeaderValue};
use percent_encoding::percent_decode_str;

use crate::constants::*;
use crate::RequestSigner;

/// SigningInterceptor signs every outgoing request with a [`RequestSigner`].
///
/// The request's header set is replaced by the signer's output, so each
/// header appears exactly once afterwards.
#[derive(Debug, Clone)]
pub struct SigningInterceptor {
    signer: RequestSigner,
}

impl SigningInterceptor {
    /// Create a new interceptor around `signer`.
    pub fn new(signer: RequestSigner) -> Self {
        Self { signer }
    }

    /// The signer used by this interceptor.
    pub fn signer(&self) -> &RequestSigner {
        &self.signer
    }
}

#[async_trait]
impl Intercept for SigningInterceptor {
    async fn intercept(&self, req: &mut http::Request<Bytes>) -> Result<()> {
        let signing_req = build_signing_request(req)?;
        let signed = self.signer.sign(&signing_req).await?;

        *req.headers_mut() = to_header_map(&signed)?;
        Ok(())
    }
}

/// Extract the signing view of `req`.
///
/// - The path is percent-decoded.
/// - The query is split with [`SigningRequest::parse_query`].
/// - Repeated header values are merged left to right with `,`.
/// - An empty body signs as no payload.
fn build_signing_request(req: &http::Request<Bytes>) -> Result<SigningRequest> {
    let path = percent_decode_str(req.uri().path())
        .decode_utf8()
        .map_err(|e| Error::request_invalid("request path is not valid utf-8").with_source(e))?
        .into_owned();
    let query = req
        .uri()
        .query()
        .map(SigningRequest::parse_query)
        .unwrap_or_default();

    let mut headers = SigningHeaders::new();
    for name in req.headers().keys() {
        let values = req
            .headers()
            .get_all(name)
            .iter()
            .map(|v| v.to_str())
            .collect::<std::result::Result<Vec<_>, _>>()?;
        headers.insert(name.as_str(), values.join(","));
    }

    let payload = (!req.body().is_empty()).then(|| req.body().clone());

    Ok(SigningRequest {
        method: req.method().clone(),
        path,
        query,
        headers,
        payload,
    })
}

fn to_header_map(signed: &SigningHeaders) -> Result<HeaderMap> {
    let mut headers = HeaderMap::with_capacity(signed.len());
    for (name, value) in signed.iter() {
        let name = HeaderName::from_bytes(name.as_bytes())?;
        let mut value = HeaderValue::from_str(value)?;
        if name == http::header::AUTHORIZATION || name.as_str() == X_AMZ_SECURITY_TOKEN {
            value.set_sensitive(true);
        }
        headers.insert(name, value);
    }
    Ok(headers)
}

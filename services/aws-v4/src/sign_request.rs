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

use std::fmt::Write;
use std::sync::Arc;

use elastic_http_core::hash::{hex_hmac_sha256, hex_sha256, hmac_sha256};
use elastic_http_core::time::{format_date, format_iso8601, Clock, DateTime, SystemClock};
use elastic_http_core::{
    Context, Error, ProvideCredential, QueryParams, Result, SigningCredential, SigningHeaders,
    SigningRequest,
};
use log::debug;
use percent_encoding::utf8_percent_encode;

use crate::constants::*;
use crate::Credential;

/// RequestSigner that implements AWS SigV4 header signing.
///
/// Credentials are fetched from the provider on every call, and one clock
/// reading is used for every derived value of a signature.
///
/// - [Signature Version 4 signing process](https://docs.aws.amazon.com/general/latest/gr/signature-version-4.html)
#[derive(Debug, Clone)]
pub struct RequestSigner {
    ctx: Context,
    provider: Arc<dyn ProvideCredential<Credential = Credential>>,
    region: String,
    service: String,

    clock: Arc<dyn Clock>,
}

impl RequestSigner {
    /// Create a new signer for `region` and `service`.
    pub fn new(
        ctx: Context,
        provider: impl ProvideCredential<Credential = Credential>,
        region: &str,
        service: &str,
    ) -> Self {
        Self::from_shared_provider(ctx, Arc::new(provider), region, service)
    }

    /// Create a new signer around a provider shared with other signers.
    pub fn from_shared_provider(
        ctx: Context,
        provider: Arc<dyn ProvideCredential<Credential = Credential>>,
        region: &str,
        service: &str,
    ) -> Self {
        Self {
            ctx,
            provider,
            region: region.into(),
            service: service.into(),

            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the clock used to timestamp signatures.
    ///
    /// Tests pin it with [`elastic_http_core::time::FixedClock`].
    pub fn with_clock(mut self, clock: impl Clock) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// The region signatures are scoped to.
    pub fn region(&self) -> &str {
        &self.region
    }

    /// The service signatures are scoped to.
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Sign the request, returning its headers augmented with `x-amz-date`,
    /// `x-amz-security-token` (session credentials only) and `Authorization`.
    ///
    /// An `Authorization` header already present on the input is dropped
    /// before canonicalization, so signing a signed request yields the same
    /// header set again.
    pub async fn sign(&self, req: &SigningRequest) -> Result<SigningHeaders> {
        let now = self.clock.now();
        let cred = self.credential().await?;

        let mut headers = canonicalize_header(&req.headers, &cred, now);
        let signed_headers = signed_header_names(&headers);

        let creq = canonical_request(req, &headers, &signed_headers)?;
        let encoded_req = hex_sha256(creq.as_bytes());

        // Scope: "20220313/<region>/<service>/aws4_request"
        let scope = format!(
            "{}/{}/{}/{}",
            format_date(now),
            self.region,
            self.service,
            AWS4_REQUEST
        );
        debug!("calculated scope: {scope}");

        let string_to_sign = string_to_sign(now, &scope, &encoded_req)?;
        debug!("calculated string to sign: {string_to_sign}");

        let signing_key =
            generate_signing_key(&cred.secret_access_key, now, &self.region, &self.service);
        let signature = hex_hmac_sha256(&signing_key, string_to_sign.as_bytes());

        headers.insert(
            AUTHORIZATION,
            format!(
                "{AWS4_HMAC_SHA256} Credential={}/{}, SignedHeaders={}, Signature={}",
                cred.access_key_id, scope, signed_headers, signature
            ),
        );

        Ok(headers)
    }

    async fn credential(&self) -> Result<Credential> {
        let cred = self
            .provider
            .provide_credential(&self.ctx)
            .await
            .map_err(|e| Error::credential_invalid("failed to load credential").with_source(e))?;

        match cred {
            Some(cred) if cred.is_valid() => Ok(cred),
            Some(_) => Err(Error::credential_invalid(
                "credential provider returned an empty access key",
            )),
            None => Err(Error::credential_invalid(
                "no credential found from provider",
            )),
        }
    }
}

/// Build the header set that gets signed.
///
/// `x-amz-date` is only added when the request carries no `date` header.
fn canonicalize_header(
    headers: &SigningHeaders,
    cred: &Credential,
    now: DateTime,
) -> SigningHeaders {
    let mut headers: SigningHeaders = headers
        .iter()
        .filter(|(k, _)| !k.eq_ignore_ascii_case(AUTHORIZATION))
        .collect();

    if !headers.contains(DATE) {
        headers.insert(X_AMZ_DATE, format_iso8601(now));
    }
    if let Some(token) = &cred.session_token {
        headers.insert(X_AMZ_SECURITY_TOKEN, token.as_str());
    }

    headers
}

fn signed_header_names(headers: &SigningHeaders) -> String {
    headers
        .iter_lowercase()
        .map(|(k, _)| k)
        .collect::<Vec<_>>()
        .join(";")
}

fn canonical_request(
    req: &SigningRequest,
    headers: &SigningHeaders,
    signed_headers: &str,
) -> Result<String> {
    // 256 is specially chosen to avoid reallocation for most requests.
    let mut f = String::with_capacity(256);

    writeln!(f, "{}", req.method)?;
    writeln!(f, "{}", canonical_uri(&req.path))?;
    writeln!(f, "{}", canonical_query(&req.query))?;
    for (name, value) in headers.iter_lowercase() {
        writeln!(f, "{}", canonical_header(name, value))?;
    }
    writeln!(f)?;
    writeln!(f, "{signed_headers}")?;
    write!(f, "{}", payload_hash(req.payload.as_deref()))?;

    Ok(f)
}

/// Path is encoded twice, keeping `/` both times.
fn canonical_uri(path: &str) -> String {
    let once = utf8_percent_encode(path, &AWS_URI_ENCODE_SET).to_string();
    utf8_percent_encode(&once, &AWS_URI_ENCODE_SET).to_string()
}

fn canonical_query(query: &QueryParams) -> String {
    query
        .iter()
        .flat_map(|(k, values)| values.iter().map(move |v| (k, v)))
        .map(|(k, v)| {
            format!(
                "{}={}",
                utf8_percent_encode(k, &PATH_SEGMENT_ENCODE_SET),
                utf8_percent_encode(v, &PATH_SEGMENT_ENCODE_SET)
            )
        })
        .collect::<Vec<_>>()
        .join("&")
}

/// `name` is already lowercased.
///
/// `connection` always signs as `close`, and a zero `content-length` signs
/// with an empty value.
fn canonical_header(name: &str, value: &str) -> String {
    match name {
        CONNECTION => format!("{CONNECTION}:close"),
        CONTENT_LENGTH if value == "0" => format!("{CONTENT_LENGTH}:"),
        _ => format!("{name}:{value}"),
    }
}

/// A missing payload hashes like an empty one.
fn payload_hash(payload: Option<&[u8]>) -> String {
    hex_sha256(payload.unwrap_or_default())
}

// StringToSign:
//
// AWS4-HMAC-SHA256
// 20220313T072004Z
// 20220313/<region>/<service>/aws4_request
// <hashed_canonical_request>
fn string_to_sign(now: DateTime, scope: &str, encoded_req: &str) -> Result<String> {
    let mut f = String::new();
    writeln!(f, "{AWS4_HMAC_SHA256}")?;
    writeln!(f, "{}", format_iso8601(now))?;
    writeln!(f, "{scope}")?;
    write!(f, "{encoded_req}")?;
    Ok(f)
}

fn generate_signing_key(secret: &str, time: DateTime, region: &str, service: &str) -> Vec<u8> {
    // Sign secret
    let secret = format!("AWS4{secret}");
    // Sign date
    let sign_date = hmac_sha256(secret.as_bytes(), format_date(time).as_bytes());
    // Sign region
    let sign_region = hmac_sha256(sign_date.as_slice(), region.as_bytes());
    // Sign service
    let sign_service = hmac_sha256(sign_region.as_slice(), service.as_bytes());
    // Sign request
    hmac_sha256(sign_service.as_slice(), AWS4_REQUEST.as_bytes())
}

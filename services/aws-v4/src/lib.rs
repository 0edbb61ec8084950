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

//! AWS SigV4 signing for Elasticsearch requests.
//!
//! [`RequestSigner`] turns a [`elastic_http_core::SigningRequest`] into the
//! signed header set, and [`SigningInterceptor`] applies it to outgoing
//! `http::Request`s as a pre-send hook.
//!
//! ## Example
//!
//! ```no_run
//! use elastic_http_aws_v4::{DefaultCredentialProvider, RequestSigner, SigningInterceptor};
//! use elastic_http_core::{Context, OsEnv};
//! use elastic_http_file_read_tokio::TokioFileRead;
//!
//! let ctx = Context::new().with_file_read(TokioFileRead).with_env(OsEnv);
//! let signer = RequestSigner::new(ctx, DefaultCredentialProvider::new(), "eu-west-1", "es");
//! let interceptor = SigningInterceptor::new(signer);
//! ```

// Make sure all our public APIs have docs.
#![warn(missing_docs)]

mod constants;

mod credential;
pub use credential::Credential;

mod provide_credential;
pub use provide_credential::*;

mod sign_request;
pub use sign_request::RequestSigner;

mod intercept;
pub use intercept::SigningInterceptor;

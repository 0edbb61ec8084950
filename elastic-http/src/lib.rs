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

//! Elasticsearch HTTP destination.
//!
//! Records are turned into Elasticsearch `index` actions through four
//! templates (document, index, type and id) and sent either one by one or
//! in `_bulk` batches. Against Amazon Elasticsearch Service, requests are
//! signed with AWS Signature Version 4 by
//! [`elastic_http_aws_v4::SigningInterceptor`].
//!
//! ## Example
//!
//! ```no_run
//! use std::collections::HashMap;
//!
//! use elastic_http::{Destination, MacroTemplate, Options};
//!
//! #[tokio::main]
//! async fn main() -> elastic_http::Result<()> {
//!     let options = Options::from_map(&HashMap::from([
//!         ("cluster-url".to_string(), "http://localhost:9200".to_string()),
//!         ("index".to_string(), "logs-${YEAR}".to_string()),
//!         ("message-template".to_string(), r#"{"msg":"$MSG"}"#.to_string()),
//!         ("flush-limit".to_string(), "100".to_string()),
//!     ]))?;
//!
//!     let mut dest = Destination::with_default_context(options, MacroTemplate)?;
//!     dest.init().await?;
//!     dest.open()?;
//!
//!     let record = HashMap::from([
//!         ("YEAR".to_string(), "2024".to_string()),
//!         ("MSG".to_string(), "disk full".to_string()),
//!     ]);
//!     if !dest.send(&record).await? {
//!         // Hand the record back for redelivery.
//!     }
//!
//!     dest.close().await?;
//!     dest.deinit()
//! }
//! ```

// Make sure all our public APIs have docs.
#![warn(missing_docs)]

mod action;
pub use action::{bulk_body, IndexAction};

mod client;
pub use client::ElasticClient;

mod config;
pub use config::{ClientMode, Options};

mod context;
pub use context::default_context;

mod destination;
pub use destination::{Destination, DestinationState};

mod processor;
pub use processor::MessageProcessor;

mod template;
pub use template::{MacroTemplate, ResolveTemplate, TimeZone};

#[cfg(test)]
mod mock;

pub use elastic_http_core::{Error, ErrorKind, Result};

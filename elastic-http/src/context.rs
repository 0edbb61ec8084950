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

use elastic_http_core::{Context, OsEnv, Result};
use elastic_http_file_read_tokio::TokioFileRead;
use elastic_http_send_reqwest::ReqwestHttpSend;

use crate::Options;

/// Build the context a destination runs with outside of tests.
///
/// Files are read with tokio, requests go through reqwest with the
/// timeouts from `options`, and the process environment is used.
pub fn default_context(options: &Options) -> Result<Context> {
    let http = ReqwestHttpSend::with_timeouts(options.connect_timeout(), options.timeout())?;

    Ok(Context::new()
        .with_file_read(TokioFileRead)
        .with_http_send(http)
        .with_env(OsEnv))
}

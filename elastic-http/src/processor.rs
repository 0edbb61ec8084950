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

use elastic_http_core::Result;
use log::{debug, warn};

use crate::action::IndexAction;
use crate::client::ElasticClient;

/// Dispatches index actions one at a time or in `_bulk` batches.
///
/// Actions leave in the order they were accepted. Nothing is retried: a
/// `false` result hands the record back to the host for redelivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageProcessor {
    /// One request per action.
    Single,
    /// Actions are buffered and sent once `limit` of them are pending.
    Bulk {
        /// Batch size.
        limit: usize,
        /// Accepted actions not sent yet.
        pending: Vec<IndexAction>,
    },
}

impl MessageProcessor {
    /// `flush_limit` of one selects single mode, anything larger bulk mode.
    pub fn new(flush_limit: usize) -> Self {
        if flush_limit > 1 {
            MessageProcessor::Bulk {
                limit: flush_limit,
                pending: Vec::with_capacity(flush_limit),
            }
        } else {
            MessageProcessor::Single
        }
    }

    /// Accept one action.
    ///
    /// Single mode sends it right away. Bulk mode buffers it and sends the
    /// whole batch once the limit is reached.
    pub async fn send(&mut self, client: &ElasticClient, action: IndexAction) -> Result<bool> {
        match self {
            MessageProcessor::Single => dispatch(client.index(&action).await, "index"),
            MessageProcessor::Bulk { limit, pending } => {
                pending.push(action);
                if pending.len() < *limit {
                    return Ok(true);
                }
                let batch = std::mem::take(pending);
                send_batch(client, batch).await
            }
        }
    }

    /// Send whatever is pending. A no-op in single mode.
    pub async fn flush(&mut self, client: &ElasticClient) -> Result<bool> {
        match self {
            MessageProcessor::Single => Ok(true),
            MessageProcessor::Bulk { pending, .. } => {
                if pending.is_empty() {
                    return Ok(true);
                }
                let batch = std::mem::take(pending);
                send_batch(client, batch).await
            }
        }
    }

    /// Number of accepted actions not sent yet.
    pub fn pending(&self) -> usize {
        match self {
            MessageProcessor::Single => 0,
            MessageProcessor::Bulk { pending, .. } => pending.len(),
        }
    }
}

/// A failed batch is dropped as a whole.
async fn send_batch(client: &ElasticClient, batch: Vec<IndexAction>) -> Result<bool> {
    debug!("flushing bulk of {} actions", batch.len());
    dispatch(client.bulk(&batch).await, "bulk")
}

fn dispatch(result: Result<()>, what: &str) -> Result<bool> {
    match result {
        Ok(()) => Ok(true),
        Err(err) if err.is_transport_error() => {
            warn!("{what} request failed: {err}");
            Ok(false)
        }
        Err(err) => Err(err),
    }
}

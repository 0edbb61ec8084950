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

use elastic_http_core::{Error, Result};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::Serialize;

/// Characters kept as-is in a path segment of an Elasticsearch endpoint.
static PATH_SEGMENT: AsciiSet = NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~')
    .remove(b'+')
    .remove(b',')
    .remove(b':')
    .remove(b'@');

/// An Elasticsearch `index` action for one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexAction {
    /// Document JSON.
    pub document: String,
    /// Target index.
    pub index: String,
    /// Document type.
    pub doc_type: String,
    /// Document id, empty lets the server assign one.
    pub id: String,
}

#[derive(Serialize)]
struct BulkAction<'a> {
    index: BulkMeta<'a>,
}

#[derive(Serialize)]
struct BulkMeta<'a> {
    #[serde(rename = "_index")]
    index: &'a str,
    #[serde(rename = "_type")]
    doc_type: &'a str,
    #[serde(rename = "_id", skip_serializing_if = "str::is_empty")]
    id: &'a str,
}

impl IndexAction {
    /// Create a new index action.
    pub fn new(
        document: impl Into<String>,
        index: impl Into<String>,
        doc_type: impl Into<String>,
        id: impl Into<String>,
    ) -> Self {
        Self {
            document: document.into(),
            index: index.into(),
            doc_type: doc_type.into(),
            id: id.into(),
        }
    }

    /// Endpoint of the single document request: `/<index>/<type>[/<id>]`.
    pub fn path(&self) -> String {
        let mut path = format!(
            "/{}/{}",
            utf8_percent_encode(&self.index, &PATH_SEGMENT),
            utf8_percent_encode(&self.doc_type, &PATH_SEGMENT)
        );
        if !self.id.is_empty() {
            path.push('/');
            path.extend(utf8_percent_encode(&self.id, &PATH_SEGMENT));
        }
        path
    }

    /// Append the action line and the document line to a `_bulk` body.
    ///
    /// Both lines end with `\n`. A document spanning several lines is
    /// compacted first when it is valid JSON.
    pub fn write_bulk(&self, buf: &mut String) -> Result<()> {
        let action = BulkAction {
            index: BulkMeta {
                index: &self.index,
                doc_type: &self.doc_type,
                id: &self.id,
            },
        };
        let line = serde_json::to_string(&action)
            .map_err(|e| Error::unexpected("failed to serialize bulk action").with_source(e))?;
        buf.push_str(&line);
        buf.push('\n');

        if self.document.contains('\n') {
            match serde_json::from_str::<serde_json::Value>(&self.document) {
                Ok(doc) => buf.push_str(&doc.to_string()),
                Err(_) => buf.push_str(&self.document.replace('\n', " ")),
            }
        } else {
            buf.push_str(&self.document);
        }
        buf.push('\n');

        Ok(())
    }
}

/// Render the newline delimited `_bulk` body for `actions`, in order.
pub fn bulk_body(actions: &[IndexAction]) -> Result<String> {
    let mut buf = String::with_capacity(actions.iter().map(|a| a.document.len() + 64).sum());
    for action in actions {
        action.write_bulk(&mut buf)?;
    }
    Ok(buf)
}

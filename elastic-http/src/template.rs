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

//! Template resolution seam.
//!
//! The host pipeline owns template evaluation. [`ResolveTemplate`] is the
//! callable the destination consumes, and [`MacroTemplate`] is a small
//! resolver usable without a host.

use std::collections::HashMap;
use std::fmt::Debug;

use elastic_http_core::{Error, Result};

/// Which time zone time-related macros are rendered in.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum TimeZone {
    /// The local time zone of the host.
    Local,
    /// The time zone configured for sending.
    #[default]
    Send,
}

/// Resolve a template against a record.
pub trait ResolveTemplate: Debug + Send + Sync + 'static {
    /// Record type handed over by the host.
    type Record;

    /// Resolve `template` against `record`.
    ///
    /// Failures are reported as [`elastic_http_core::ErrorKind::TemplateInvalid`].
    fn resolve(&self, template: &str, record: &Self::Record, tz: TimeZone) -> Result<String>;
}

/// Expands `$NAME` and `${NAME}` macros from a string map.
///
/// - Names are made of ASCII alphanumerics, `_` and `.`.
/// - `$$` renders a literal `$`.
/// - Unknown names expand to the empty string.
/// - Template functions (`$(...)`) are not supported.
///
/// Values carry no time information, so the time zone is ignored.
#[derive(Debug, Default, Clone, Copy)]
pub struct MacroTemplate;

impl ResolveTemplate for MacroTemplate {
    type Record = HashMap<String, String>;

    fn resolve(&self, template: &str, record: &Self::Record, _: TimeZone) -> Result<String> {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;

        while let Some(pos) = rest.find('$') {
            out.push_str(&rest[..pos]);
            rest = &rest[pos + 1..];

            let (name, remain) = if let Some(braced) = rest.strip_prefix('{') {
                let Some(end) = braced.find('}') else {
                    return Err(Error::template_invalid(format!(
                        "unterminated macro in template {template:?}"
                    )));
                };
                (&braced[..end], &braced[end + 1..])
            } else if let Some(remain) = rest.strip_prefix('$') {
                out.push('$');
                rest = remain;
                continue;
            } else if rest.starts_with('(') {
                return Err(Error::template_invalid(format!(
                    "template functions are not supported: {template:?}"
                )));
            } else {
                let end = rest
                    .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_' || c == '.'))
                    .unwrap_or(rest.len());
                (&rest[..end], &rest[end..])
            };

            if name.is_empty() {
                // A lone `$` stays literal.
                out.push('$');
            } else if let Some(value) = record.get(name) {
                out.push_str(value);
            }
            rest = remain;
        }
        out.push_str(rest);

        Ok(out)
    }
}

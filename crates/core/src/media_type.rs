// SPDX-FileCopyrightText: © 2025 PadLink Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Media type descriptors and category matching.
//!
//! A [`MediaType`] is an opaque structured string such as
//! `video/x-raw, format=I420, width=854, height=480`. Only its *category* (the
//! structure name before the first `,`) takes part in compatibility checks, which
//! are deliberately simple prefix matches driven by a [`CategoryFilter`].

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Describes the shape of data a port produces or consumes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct MediaType(String);

impl MediaType {
    pub fn new(descriptor: impl Into<String>) -> Self {
        Self(descriptor.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The structure name, e.g. `video/x-raw` for `video/x-raw, format=I420`.
    pub fn category(&self) -> &str {
        self.0.split(',').next().unwrap_or_default().trim()
    }

    /// Iterates the `key=value` fields following the category.
    ///
    /// Malformed fields without `=` are skipped.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0
            .split(',')
            .skip(1)
            .filter_map(|field| field.split_once('='))
            .map(|(key, value)| (key.trim(), value.trim()))
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MediaType {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for MediaType {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Category pattern a waiting input port requires, e.g. `video/x-raw` or `video/*`.
///
/// Matching is a prefix test against [`MediaType::category`]. A trailing `*` is
/// accepted and ignored, so `video/x-raw*` and `video/x-raw` behave the same. An
/// empty pattern (or a lone `*`) accepts everything.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct CategoryFilter(String);

impl CategoryFilter {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self(pattern.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn prefix(&self) -> &str {
        self.0.trim().trim_end_matches('*')
    }

    pub fn matches(&self, media_type: &MediaType) -> bool {
        media_type.category().starts_with(self.prefix())
    }
}

impl fmt::Display for CategoryFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CategoryFilter {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Reassembly of line-delimited JSON generation frames
//!
//! The generation service streams one JSON object per line, each carrying a
//! fragment of the answer under `message.content`. Lines may arrive with an
//! SSE-style `data:` prefix, truncated, or as a `[DONE]` sentinel. Bad lines
//! are recorded and skipped; only a response with no usable text fails.

use medexplain_core::AssemblyMode;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

const EXCERPT_CHARS: usize = 80;
const DONE_SENTINEL: &str = "[DONE]";

/// A line that could not contribute text
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MalformedFragment {
    /// 1-based line number within the payload
    pub line_number: usize,
    pub excerpt: String,
    pub reason: String,
}

impl MalformedFragment {
    fn new(line_number: usize, line: &str, reason: impl Into<String>) -> Self {
        Self {
            line_number,
            excerpt: line.chars().take(EXCERPT_CHARS).collect(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, Error)]
#[error("generation produced no text ({} malformed fragments skipped)", skipped.len())]
pub struct EmptyGeneration {
    pub skipped: Vec<MalformedFragment>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Assembly {
    pub text: String,
    /// Number of frames that contributed content
    pub fragments: usize,
    pub skipped: Vec<MalformedFragment>,
    /// Set by a `"done": true` frame or the `[DONE]` sentinel
    pub done: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseAssembler {
    mode: AssemblyMode,
}

impl ResponseAssembler {
    pub fn new(mode: AssemblyMode) -> Self {
        Self { mode }
    }

    pub fn assemble(&self, payload: &str) -> Result<Assembly, EmptyGeneration> {
        self.assemble_lines(payload.lines())
    }

    pub fn assemble_lines<I, S>(&self, lines: I) -> Result<Assembly, EmptyGeneration>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut text = String::new();
        let mut fragments = 0;
        let mut skipped = Vec::new();
        let mut done = false;

        for (idx, raw) in lines.into_iter().enumerate() {
            let line_number = idx + 1;
            let line = raw.as_ref().trim();
            let line = line.strip_prefix("data:").map(str::trim_start).unwrap_or(line);
            if line.is_empty() {
                continue;
            }
            if line == DONE_SENTINEL {
                done = true;
                continue;
            }

            let frame: Value = match serde_json::from_str(line) {
                Ok(v) => v,
                Err(e) => {
                    warn!(line_number, error = %e, "Skipping malformed generation fragment");
                    skipped.push(MalformedFragment::new(line_number, line, e.to_string()));
                    continue;
                }
            };

            if let Some(err) = frame.get("error") {
                let reason = err
                    .as_str()
                    .map(str::to_string)
                    .unwrap_or_else(|| err.to_string());
                warn!(line_number, error = %reason, "Generation frame reported an error");
                skipped.push(MalformedFragment::new(line_number, line, reason));
                continue;
            }

            if frame.get("done").and_then(Value::as_bool) == Some(true) {
                done = true;
            }

            if let Some(content) = frame.pointer("/message/content").and_then(Value::as_str) {
                if self.mode == AssemblyMode::Spaced && !text.is_empty() && !content.is_empty() {
                    text.push(' ');
                }
                text.push_str(content);
                fragments += 1;
            }
        }

        if text.trim().is_empty() {
            return Err(EmptyGeneration { skipped });
        }

        debug!(fragments, skipped = skipped.len(), done, "Assembled generation response");
        Ok(Assembly {
            text,
            fragments,
            skipped,
            done,
        })
    }
}

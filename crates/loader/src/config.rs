// Copyright 2025 Crrow
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use bon::Builder;
use jiff::SignedDuration;
use smart_default::SmartDefault;
use url::Url;

/// Configuration for the resource loader
#[derive(Debug, Clone, SmartDefault, Builder)]
pub struct LoaderConfig {
    /// Base against which relative locations are resolved. Without one,
    /// relative locations are local file paths.
    pub base_url: Option<Url>,

    /// Custom User-Agent header
    #[builder(into)]
    pub user_agent: Option<String>,

    /// Overall timeout for HTTP requests (default: none, a hung transfer stays
    /// pending until the caller gives up)
    pub timeout: Option<SignedDuration>,

    /// Whether transports should deliver responses incrementally. When false,
    /// streaming retrievals fall back to a single buffered chunk.
    #[default = true]
    #[builder(default = true)]
    pub progressive: bool,

    /// Read size for local files (default: 64KB)
    #[default(64 * 1024)]
    #[builder(default = 64 * 1024)]
    pub file_chunk_size: usize,

    /// Capacity of the event channel between a streaming transfer and its
    /// consumer (default: 32)
    #[default = 32]
    #[builder(default = 32)]
    pub event_buffer: usize,
}

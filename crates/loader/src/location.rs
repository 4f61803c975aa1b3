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

use std::{fmt, path::PathBuf};

use snafu::ResultExt;
use url::Url;

use crate::error::{InvalidLocationSnafu, LoaderError, UnsupportedSchemeSnafu};

/// Where a location points once resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// `http` or `https` URL
    Http(Url),
    /// Local file, reached through `file://` or a plain path
    File(PathBuf),
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http(url) => write!(f, "{url}"),
            Self::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Resolve a location string.
///
/// Absolute URLs keep their scheme. Relative locations are joined onto `base`
/// when one is given, otherwise they are local paths.
pub fn resolve(location: &str, base: Option<&Url>) -> Result<Target, LoaderError> {
    match Url::parse(location) {
        // Windows drive letters parse as one-letter schemes.
        Ok(url) if url.scheme().len() == 1 => Ok(Target::File(PathBuf::from(location))),
        Ok(url) => from_url(location, url),
        Err(url::ParseError::RelativeUrlWithoutBase) => match base {
            Some(base) => {
                let url = base.join(location).context(InvalidLocationSnafu { location })?;
                from_url(location, url)
            }
            None => Ok(Target::File(PathBuf::from(location))),
        },
        Err(source) => Err(LoaderError::InvalidLocation {
            location: location.to_string(),
            source,
        }),
    }
}

fn from_url(location: &str, url: Url) -> Result<Target, LoaderError> {
    match url.scheme() {
        "http" | "https" => Ok(Target::Http(url)),
        "file" => url.to_file_path().map(Target::File).map_err(|()| {
            UnsupportedSchemeSnafu {
                location,
                scheme: "file (non-local host)",
            }
            .build()
        }),
        scheme => UnsupportedSchemeSnafu { location, scheme }.fail(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absolute_http() {
        let target = resolve("https://example.com/movie.swf", None).unwrap();
        assert_eq!(
            target,
            Target::Http(Url::parse("https://example.com/movie.swf").unwrap())
        );
    }

    #[test]
    fn test_relative_without_base_is_local() {
        let target = resolve("assets/data.bin", None).unwrap();
        assert_eq!(target, Target::File(PathBuf::from("assets/data.bin")));
    }

    #[test]
    fn test_relative_with_base_joins() {
        let base = Url::parse("http://localhost:8080/player/").unwrap();
        let target = resolve("data.bin", Some(&base)).unwrap();
        assert_eq!(
            target,
            Target::Http(Url::parse("http://localhost:8080/player/data.bin").unwrap())
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_file_url() {
        let target = resolve("file:///tmp/local.bin", None).unwrap();
        assert_eq!(target, Target::File(PathBuf::from("/tmp/local.bin")));
    }

    #[test]
    fn test_unsupported_scheme() {
        let err = resolve("rtmp://media.example.com/live", None).unwrap_err();
        assert!(matches!(err, LoaderError::UnsupportedScheme { scheme, .. } if scheme == "rtmp"));
    }

    #[test]
    fn test_invalid_url() {
        let err = resolve("http://[::1", None).unwrap_err();
        assert!(matches!(err, LoaderError::InvalidLocation { .. }));
    }
}

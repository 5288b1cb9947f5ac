//! Configuration types and utilities

use crate::dump::canonical_header_name;
use crate::error::ConfigError;
use crate::flags::DumpFlags;
use bytes::Bytes;
use lazy_static::lazy_static;
use std::fmt;
use std::sync::Arc;

/// Sink for dump lines: called once per separator, banner and dumped block
pub type Logf = Arc<dyn Fn(fmt::Arguments<'_>) + Send + Sync>;

/// Header prefixes redacted unless [`DumpFlags::AUTH`] is set
pub const DEFAULT_AUTH: [&[u8]; 2] = [b"Authorization: ", b"X-Auth-Token: "];

/// Environment variable holding a dump flag list, e.g. `headers,auth`
pub const ENV_DUMP: &str = "DEBUGHTTP_DUMP";

/// Environment variable holding comma separated header names to redact
pub const ENV_AUTH_HEADERS: &str = "DEBUGHTTP_AUTH_HEADERS";

/// Target used by the default tracing sink
pub const LOG_TARGET: &str = "debughttp";

lazy_static! {
    static ref DEFAULT_OPTIONS: Options = Options {
        flags: DumpFlags::HEADERS,
        logf: tracing_logf(),
        auth: DEFAULT_AUTH.into_iter().map(Bytes::from_static).collect(),
    };
}

/// Sink that forwards every dump line to `tracing` at info level
pub fn tracing_logf() -> Logf {
    Arc::new(|args: fmt::Arguments<'_>| {
        tracing::info!(target: LOG_TARGET, "{}", args);
    })
}

/// Controls what a [`DebugTransport`](crate::DebugTransport) logs and where.
///
/// `Options::default()` dumps headers to `tracing` and redacts the
/// [`DEFAULT_AUTH`] headers. Override single fields with struct update syntax:
///
/// ```
/// use debughttp_core::{DumpFlags, Options};
///
/// let options = Options {
///     flags: DumpFlags::REQUESTS | DumpFlags::AUTH,
///     ..Default::default()
/// };
/// assert!(options.flags.reveal_auth());
/// ```
#[derive(Clone)]
pub struct Options {
    /// Which parts of the HTTP transaction are dumped
    pub flags: DumpFlags,
    /// Where dumped transactions are logged
    pub logf: Logf,
    /// Header prefixes treated as auth and redacted, in pass order
    pub auth: Vec<Bytes>,
}

impl Default for Options {
    fn default() -> Self {
        DEFAULT_OPTIONS.clone()
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let auth: Vec<_> = self
            .auth
            .iter()
            .map(|prefix| String::from_utf8_lossy(prefix).into_owned())
            .collect();
        f.debug_struct("Options")
            .field("flags", &self.flags)
            .field("auth", &auth)
            .finish_non_exhaustive()
    }
}

impl Options {
    /// Default options with the given flags
    pub fn new(flags: DumpFlags) -> Self {
        Self {
            flags,
            ..Default::default()
        }
    }

    /// Dumps headers and bodies in both directions
    pub fn dump_bodies() -> Self {
        Self::new(DumpFlags::BODIES)
    }

    pub fn with_flags(mut self, flags: DumpFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_logf<F>(mut self, logf: F) -> Self
    where
        F: Fn(fmt::Arguments<'_>) + Send + Sync + 'static,
    {
        self.logf = Arc::new(logf);
        self
    }

    /// Replaces the redaction prefixes with raw byte prefixes
    pub fn with_auth<I, P>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Bytes>,
    {
        self.auth = prefixes.into_iter().map(Into::into).collect();
        self
    }

    /// Replaces the redaction prefixes with `"<Name>: "` for each header name.
    ///
    /// Names are put in the canonical form used by dumps, so `x-api-key`
    /// becomes the prefix `X-Api-Key: `.
    pub fn with_auth_headers<I, S>(self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.with_auth(
            names
                .into_iter()
                .map(|name| Bytes::from(format!("{}: ", canonical_header_name(name.as_ref().trim())))),
        )
    }

    /// Loads options from `DEBUGHTTP_DUMP` and `DEBUGHTTP_AUTH_HEADERS`.
    ///
    /// Unset variables keep their defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|var| std::env::var(var).ok())
    }

    pub(crate) fn from_vars<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut options = Self::default();

        if let Some(raw) = lookup(ENV_DUMP) {
            options.flags = raw.parse().map_err(|source| ConfigError::InvalidFlags {
                var: ENV_DUMP,
                source,
            })?;
        }

        if let Some(raw) = lookup(ENV_AUTH_HEADERS) {
            let names = raw
                .split(',')
                .map(str::trim)
                .map(|name| {
                    if is_header_name(name) {
                        Ok(name.to_string())
                    } else {
                        Err(ConfigError::InvalidHeaderName {
                            var: ENV_AUTH_HEADERS,
                            name: name.to_string(),
                        })
                    }
                })
                .collect::<Result<Vec<_>, _>>()?;
            options = options.with_auth_headers(names);
        }

        Ok(options)
    }
}

fn is_header_name(name: &str) -> bool {
    http::HeaderName::from_bytes(name.as_bytes()).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let options = Options::default();
        assert_eq!(options.flags, DumpFlags::HEADERS);
        assert_eq!(options.auth.len(), 2);
        assert_eq!(&options.auth[0][..], b"Authorization: ");
        assert_eq!(&options.auth[1][..], b"X-Auth-Token: ");

        assert_eq!(Options::dump_bodies().flags, DumpFlags::BODIES);
    }

    #[test]
    fn test_default_instances_are_independent() {
        let mut first = Options::default();
        first.auth.clear();
        first.flags = DumpFlags::AUTH;

        let second = Options::default();
        assert_eq!(second.flags, DumpFlags::HEADERS);
        assert_eq!(second.auth.len(), 2);
    }

    #[test]
    fn test_with_logf() {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let sink = lines.clone();
        let options = Options::default()
            .with_logf(move |args: fmt::Arguments<'_>| sink.lock().unwrap().push(args.to_string()));

        (options.logf)(format_args!("{} {}", "hello", 42));
        assert_eq!(lines.lock().unwrap().as_slice(), ["hello 42"]);
    }

    #[test]
    fn test_with_auth_headers() {
        let options = Options::default().with_auth_headers(["X-Api-Key", " cookie ", "proxy-authorization"]);
        assert_eq!(&options.auth[0][..], b"X-Api-Key: ");
        assert_eq!(&options.auth[1][..], b"Cookie: ");
        assert_eq!(&options.auth[2][..], b"Proxy-Authorization: ");
    }

    #[test]
    fn test_from_vars_unset_keeps_defaults() {
        let options = Options::from_vars(vars(&[])).unwrap();
        assert_eq!(options.flags, DumpFlags::HEADERS);
        assert_eq!(options.auth.len(), 2);
    }

    #[test]
    fn test_from_vars_overrides() {
        let options = Options::from_vars(vars(&[
            (ENV_DUMP, "bodies,auth"),
            (ENV_AUTH_HEADERS, "X-Api-Key,Proxy-Authorization"),
        ]))
        .unwrap();
        assert_eq!(options.flags, DumpFlags::BODIES | DumpFlags::AUTH);
        assert_eq!(&options.auth[0][..], b"X-Api-Key: ");
        assert_eq!(&options.auth[1][..], b"Proxy-Authorization: ");

        // An empty flag list switches dumping off
        let options = Options::from_vars(vars(&[(ENV_DUMP, "")])).unwrap();
        assert!(!options.flags.logging_enabled());
    }

    #[test]
    fn test_from_vars_errors() {
        let err = Options::from_vars(vars(&[(ENV_DUMP, "headers,everything")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidFlags { var: ENV_DUMP, .. }));

        let err = Options::from_vars(vars(&[(ENV_AUTH_HEADERS, "X-Api-Key,,Cookie")])).unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidHeaderName {
                var: ENV_AUTH_HEADERS,
                name: String::new(),
            }
        );
    }
}

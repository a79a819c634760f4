//! Unified error type.

use std::fmt;

/// An optional response-writer capability.
///
/// Writers always support byte and status writes. These three are extras a
/// writer may or may not offer; asking an unsupported writer for one yields
/// [`Error::Unsupported`].
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Capability {
    Flush,
    Hijack,
    CloseNotify,
}

impl Capability {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Flush       => "flush",
            Self::Hijack      => "hijack",
            Self::CloseNotify => "close-notify",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The error type returned by tally's fallible operations.
///
/// Body writes report through [`std::io::Result`] like any other writer. This
/// type covers the rest: capability mismatches, hijacking, and the host
/// server's bind/accept failures.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("response writer does not support {0}")]
    Unsupported(Capability),

    #[error("connection already hijacked")]
    Hijacked,

    #[error("invalid socket address: {0}")]
    Addr(#[from] std::net::AddrParseError),
}

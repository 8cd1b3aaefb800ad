/// Session failure classification, in the dense order used by the error
/// histogram and the `err (...)` column of the result line.
///
/// `EarlyEof` is recorded when a session reaches end-of-stream before the
/// configured byte cap; a download test is expected to be cut off by the cap,
/// so a server-closed stream counts as an anomaly rather than a success.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
pub enum ErrorKind {
    #[strum(serialize = "resolve")]
    Resolve,

    #[strum(serialize = "connect")]
    Connect,

    #[strum(serialize = "request")]
    Request,

    #[strum(serialize = "recv")]
    Recv,

    #[strum(serialize = "bad_http")]
    BadHttp,

    #[strum(serialize = "timeout")]
    TimeoutForNoData,

    #[strum(serialize = "early_eof")]
    EarlyEof,
}

impl ErrorKind {
    pub const COUNT: usize = 7;

    pub const ALL: [ErrorKind; Self::COUNT] = [
        ErrorKind::Resolve,
        ErrorKind::Connect,
        ErrorKind::Request,
        ErrorKind::Recv,
        ErrorKind::BadHttp,
        ErrorKind::TimeoutForNoData,
        ErrorKind::EarlyEof,
    ];

    #[must_use]
    pub fn index(self) -> usize {
        match self {
            ErrorKind::Resolve => 0,
            ErrorKind::Connect => 1,
            ErrorKind::Request => 2,
            ErrorKind::Recv => 3,
            ErrorKind::BadHttp => 4,
            ErrorKind::TimeoutForNoData => 5,
            ErrorKind::EarlyEof => 6,
        }
    }
}

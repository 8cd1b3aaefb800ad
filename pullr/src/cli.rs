use std::path::PathBuf;

use clap::Parser;
use pullr_core::Overrides;

#[derive(Debug, Parser)]
#[command(
    name = "pullr",
    author,
    version,
    about = "HTTP streaming-download performance tester",
    long_about = "pullr opens many concurrent HTTP GET connections, streams response bodies until a byte cap or end-of-stream, and reports per-phase latencies (resolve, connect, header, first chunk) and sustained throughput, per URL and overall.",
    after_help = "Examples:\n  pullr -u http://files.example/clip.flv\n  pullr -n 100 -i 10000 -r 4194304 -u \"http://a/x, http://b/y\"\n  pullr -c test.json --detail"
)]
pub struct Cli {
    /// Number of testing clients
    #[arg(short = 'n', long)]
    pub clients: Option<u64>,

    /// Max content length to receive per client (bytes)
    #[arg(short = 'r', long)]
    pub recvlen: Option<u64>,

    /// Interval between client launches (us)
    #[arg(short = 'i', long)]
    pub interval: Option<u64>,

    /// Testing urls, separated by commas or whitespace
    #[arg(short = 'u', long)]
    pub urls: Option<String>,

    /// Max timeout for no-data-duration (s)
    #[arg(short = 't', long)]
    pub timeout: Option<u64>,

    /// JSON config file with the same keys; flag values override file values
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Produce detailed statistic data (in csv format)
    #[arg(short = 'd', long)]
    pub detail: bool,
}

impl Cli {
    pub fn overrides(&self) -> Overrides {
        Overrides {
            clients: self.clients,
            recvlen: self.recvlen,
            interval: self.interval,
            urls: self.urls.clone(),
            timeout: self.timeout,
            detail: self.detail,
        }
    }
}

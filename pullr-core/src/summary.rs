use std::io::{self, Write};

use crate::agg::Avg;
use crate::kind::ErrorKind;
use crate::series::Series;

pub(crate) const SERIES_RESOLVE: &str = "resolve cost (ms)";
pub(crate) const SERIES_CONNECT: &str = "connect cost (ms)";
pub(crate) const SERIES_RECVHDR: &str = "recvhdr cost (ms)";
pub(crate) const SERIES_FIRST_CHUNK: &str = "1stchunk cost (ms)";

/// Aggregated results for one URL (or for the whole run).
///
/// The four timing gauges are weighted by sample count; the throughput gauge
/// is weighted by elapsed milliseconds with bytes as the value, so its
/// average is bytes-per-millisecond. The result line labels that column
/// `KB/s` and leaves the number unconverted, matching the original tool.
#[derive(Debug, Clone)]
pub struct Summary {
    resolving: Avg,
    connecting: Avg,
    recv_header: Avg,
    first_chunk: Avg,
    throughput: Avg,

    resolve_series: Series,
    connect_series: Series,
    recvhdr_series: Series,
    first_chunk_series: Series,

    errors: [u64; ErrorKind::COUNT],
}

impl Default for Summary {
    fn default() -> Self {
        Self {
            resolving: Avg::default(),
            connecting: Avg::default(),
            recv_header: Avg::default(),
            first_chunk: Avg::default(),
            throughput: Avg::default(),
            resolve_series: Series::new(SERIES_RESOLVE),
            connect_series: Series::new(SERIES_CONNECT),
            recvhdr_series: Series::new(SERIES_RECVHDR),
            first_chunk_series: Series::new(SERIES_FIRST_CHUNK),
            errors: [0; ErrorKind::COUNT],
        }
    }
}

impl Summary {
    pub fn update_resolving(&mut self, ms: i32, record: bool) {
        self.resolving.update(1, ms.max(0) as u64);
        if record {
            self.resolve_series.push(ms);
        }
    }

    pub fn update_connecting(&mut self, ms: i32, record: bool) {
        self.connecting.update(1, ms.max(0) as u64);
        if record {
            self.connect_series.push(ms);
        }
    }

    pub fn update_recv_header(&mut self, ms: i32, record: bool) {
        self.recv_header.update(1, ms.max(0) as u64);
        if record {
            self.recvhdr_series.push(ms);
        }
    }

    pub fn update_first_chunk(&mut self, ms: i32, record: bool) {
        self.first_chunk.update(1, ms.max(0) as u64);
        if record {
            self.first_chunk_series.push(ms);
        }
    }

    /// One throughput window: `bytes` read over `ms` milliseconds. Callers
    /// clamp `ms` to at least one.
    pub fn update_throughput(&mut self, bytes: u64, ms: i32) {
        self.throughput.update(ms.max(1) as u64, bytes);
    }

    pub fn record_error(&mut self, kind: ErrorKind) {
        self.errors[kind.index()] += 1;
    }

    #[must_use]
    pub fn error_count(&self, kind: ErrorKind) -> u64 {
        self.errors[kind.index()]
    }

    #[must_use]
    pub fn resolving(&self) -> &Avg {
        &self.resolving
    }

    #[must_use]
    pub fn connecting(&self) -> &Avg {
        &self.connecting
    }

    #[must_use]
    pub fn recv_header(&self) -> &Avg {
        &self.recv_header
    }

    #[must_use]
    pub fn first_chunk(&self) -> &Avg {
        &self.first_chunk
    }

    #[must_use]
    pub fn throughput(&self) -> &Avg {
        &self.throughput
    }

    fn detail_series(&self) -> [&Series; 4] {
        [
            &self.resolve_series,
            &self.connect_series,
            &self.recvhdr_series,
            &self.first_chunk_series,
        ]
    }

    /// Emit the per-sample series as CSV: a header row of series names, then
    /// one row per sample index, short series padded with empty cells.
    pub fn write_csv<W: Write>(&self, out: &mut W) -> io::Result<()> {
        let series = self.detail_series();

        let names: Vec<&str> = series.iter().map(|s| s.name()).collect();
        writeln!(out, "{}", names.join(","))?;

        let rows = series.iter().map(|s| s.len()).max().unwrap_or(0);
        for i in 0..rows {
            let cells: Vec<String> = series.iter().map(|s| s.cell(i)).collect();
            writeln!(out, "{}", cells.join(","))?;
        }
        Ok(())
    }
}

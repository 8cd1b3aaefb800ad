use indicatif::HumanBytes;
use pullr_core::{Config, ErrorKind, Summary, TestReport};

pub(crate) fn print_run_header(cfg: &Config) {
    println!(
        "clients: {}  recvlen: {}  interval: {} us  timeout: {} s  urls: {}",
        cfg.clients(),
        HumanBytes(cfg.max_recv_length()),
        cfg.interval().as_micros(),
        cfg.timeout().as_secs(),
        cfg.targets().len(),
    );
}

pub(crate) fn print_report(report: &TestReport) {
    for stats in &report.per_url {
        println!("Result for {}:", stats.url);
        println!("{}", summary_line(&stats.summary));
    }

    println!("Result for all:");
    println!("{}", summary_line(&report.overall));
}

/// One result line. `bps` is the throughput gauge rendered as-is: bytes over
/// milliseconds, labelled `KB/s` the way the original tool labelled it.
pub(crate) fn summary_line(sum: &Summary) -> String {
    let err_labels: Vec<String> = ErrorKind::ALL.iter().map(ToString::to_string).collect();
    let err_counts: Vec<String> = ErrorKind::ALL
        .iter()
        .map(|kind| sum.error_count(*kind).to_string())
        .collect();

    format!(
        "  resolve (avg/max/min): {}/{}/{} (ms)\
         \x20 connect (avg/max/min): {}/{}/{} (ms)\
         \x20 recvhdr (avg/max/min): {}/{}/{} (ms)\
         \x20 first_chunk (avg/max/min): {}/{}/{} (ms)\
         \x20 bps (avg/max/min): {}/{}/{} (KB/s)\
         \x20 err ({}): {}",
        sum.resolving().value(),
        sum.resolving().max(),
        sum.resolving().min(),
        sum.connecting().value(),
        sum.connecting().max(),
        sum.connecting().min(),
        sum.recv_header().value(),
        sum.recv_header().max(),
        sum.recv_header().min(),
        sum.first_chunk().value(),
        sum.first_chunk().max(),
        sum.first_chunk().min(),
        sum.throughput().value(),
        sum.throughput().max(),
        sum.throughput().min(),
        err_labels.join("/"),
        err_counts.join("/"),
    )
}

use std::env;
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};

use nettrace::monitor::{self, TrafficMonitor, DEFAULT_PROBE_TARGET, PROBE_TIMEOUT};
use nettrace::network::session::{load_interfaces, CaptureSession, CAPTURE_WINDOW};
use nettrace::network::types::CaptureEvent;
use nettrace::utils::{format_bytes, format_duration, format_rate};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .init();

    let args: Vec<String> = env::args().collect();
    let command = match args.get(1) {
        Some(command) => command.as_str(),
        None => {
            print_usage(&args[0]);
            std::process::exit(2);
        }
    };

    match command {
        "interfaces" => cmd_interfaces(),
        "capture" => cmd_capture(&args[2..]),
        "read" => cmd_read(&args[2..]),
        "monitor" => cmd_monitor(&args[2..]),
        _ => {
            print_usage(&args[0]);
            std::process::exit(2);
        }
    }
}

fn print_usage(program: &str) {
    eprintln!("Usage: {} <command>", program);
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  interfaces");
    eprintln!("      list capturable interfaces");
    eprintln!("  capture <iface>... [--duration SECS] [--write FILE]");
    eprintln!("      capture live traffic and print per-protocol counts");
    eprintln!("  read <FILE> [--protocol P] [--source IP] [--dest IP] [--detail INDEX]");
    eprintln!("      inspect a capture file");
    eprintln!("  monitor [IFACE] [--count N]");
    eprintln!("      sample traffic counters and probe latency once per second");
}

fn cmd_interfaces() -> Result<()> {
    let interfaces = load_interfaces()?;
    if interfaces.is_empty() {
        println!("No capturable interfaces found.");
        return Ok(());
    }
    for name in interfaces {
        println!("{}", name);
    }
    Ok(())
}

fn cmd_capture(args: &[String]) -> Result<()> {
    let mut interfaces = Vec::new();
    let mut duration = CAPTURE_WINDOW;
    let mut write_path: Option<PathBuf> = None;

    let mut it = args.iter();
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--duration" => {
                let value = it.next().context("--duration needs a value in seconds")?;
                duration = Duration::from_secs(
                    value.parse().context("--duration must be a whole number")?,
                );
            }
            "--write" => {
                write_path = Some(PathBuf::from(
                    it.next().context("--write needs a file path")?,
                ));
            }
            name => interfaces.push(name.to_string()),
        }
    }

    let mut session = CaptureSession::new();
    session.start_capture(&interfaces)?;
    println!(
        "Capturing on {} for {}...",
        interfaces.join(", "),
        format_duration(duration)
    );

    let deadline = Instant::now() + duration;
    while Instant::now() < deadline {
        match session.next_event(Duration::from_millis(200)) {
            Some(CaptureEvent::Frame { interface, frame }) => {
                println!("[{}] {}", interface, frame.summary);
            }
            Some(CaptureEvent::Error { interface, error }) => {
                eprintln!("[{}] {}", interface, error);
            }
            None => {}
        }
    }
    session.stop_capture();

    println!();
    println!("{} frames captured", session.frame_count());
    let mut counts: Vec<(String, u64)> = session.protocol_stats().into_iter().collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    for (name, count) in counts {
        println!("  {:<10} {}", name, count);
    }

    if let Some(path) = write_path {
        if session.frame_count() == 0 {
            println!("Nothing to write.");
        } else {
            let written = session.save_pcap(&path, None)?;
            println!("Wrote {} frames to {}", written, path.display());
        }
    }
    Ok(())
}

fn cmd_read(args: &[String]) -> Result<()> {
    let mut path: Option<PathBuf> = None;
    let mut protocol: Option<String> = None;
    let mut source: Option<String> = None;
    let mut destination: Option<String> = None;
    let mut detail: Option<usize> = None;

    let mut it = args.iter();
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--protocol" => protocol = Some(it.next().context("--protocol needs a value")?.clone()),
            "--source" => source = Some(it.next().context("--source needs a value")?.clone()),
            "--dest" => destination = Some(it.next().context("--dest needs a value")?.clone()),
            "--detail" => {
                let value = it.next().context("--detail needs a frame index")?;
                detail = Some(value.parse().context("--detail must be a frame index")?);
            }
            other => path = Some(PathBuf::from(other)),
        }
    }
    let path = path.context("read needs a capture file path")?;

    let session = CaptureSession::new();
    let loaded = session.load_pcap(&path)?;
    println!("Loaded {} frames from {}", loaded, path.display());

    let frames = session.apply_filters(
        protocol.as_deref(),
        source.as_deref(),
        destination.as_deref(),
    );
    let filtered = protocol.is_some() || source.is_some() || destination.is_some();
    if filtered {
        println!("{} frames match the filters", frames.len());
    }
    for (index, frame) in frames.iter().enumerate() {
        println!("{:>5}  {}", index, frame.summary);
    }

    println!();
    let mut counts: Vec<(String, u64)> = session.protocol_stats().into_iter().collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    for (name, count) in counts {
        println!("  {:<10} {}", name, count);
    }

    if let Some(index) = detail {
        println!();
        match session.frame_detail(index) {
            Some(text) => println!("{}", text),
            None => println!("No frame at index {}", index),
        }
    }
    Ok(())
}

fn cmd_monitor(args: &[String]) -> Result<()> {
    let mut interface: Option<String> = None;
    let mut count = 10u64;

    let mut it = args.iter();
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--count" => {
                let value = it.next().context("--count needs a value")?;
                count = value.parse().context("--count must be a whole number")?;
            }
            name => interface = Some(name.to_string()),
        }
    }

    let label = interface.clone().unwrap_or_else(|| "all interfaces".to_string());
    println!("Monitoring {} ({} samples)...", label, count);

    let mut monitor_state = TrafficMonitor::new(interface);
    let mut latencies = Vec::new();
    for tick in 0..count {
        let latency = monitor::probe_latency(DEFAULT_PROBE_TARGET, PROBE_TIMEOUT);
        if let Some(ms) = latency {
            latencies.push(ms);
        }
        let sample = monitor_state.sample(latency);
        let latency_text = sample
            .latency_ms
            .map(|ms| format!("{:.1} ms", ms))
            .unwrap_or_else(|| "unreachable".to_string());
        println!(
            "rx {} ({})  tx {} ({})  latency {}",
            format_bytes(sample.rx_bytes),
            format_rate(sample.rx_rate),
            format_bytes(sample.tx_bytes),
            format_rate(sample.tx_rate),
            latency_text
        );
        if tick + 1 < count {
            thread::sleep(Duration::from_secs(1));
        }
    }
    println!("jitter: {:.1} ms over {} probes", monitor::jitter(&latencies), latencies.len());
    Ok(())
}

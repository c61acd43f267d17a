//! # rUDPd
//!
//! `rUDPd` runs a minimal UDP/IPv4 stack over Ethernet II on a single
//! network interface.
extern crate rUDPd;
use rUDPd::{run, Config};

// getopts
use getopts::Options;

// ctrlc (linux signal handling)
extern crate ctrlc;

// std
use std::env;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

// usage() function
fn usage(program: &str, opts: &Options) {
    let brief = format!("Usage: {} -m MODE [options]", program);
    print!("{}", opts.usage(&brief));
    println!(
        "\nModes:
  0  sniff and display frames
  1  run the UDP/IPv4 stack in the foreground
  2  run the UDP/IPv4 stack as a daemon"
    );
}

// parse_cli_opts() function
// returns the parsed library configuration, or None after reporting the
// problem on stderr
fn parse_cli_opts(args: &[String]) -> Option<Config> {
    let mut opts = Options::new();
    opts.optflag("h", "help", "print this help menu");
    opts.optopt(
        "m",
        "mode",
        "operation mode: 0 sniffer, 1 foreground stack, 2 daemonized stack",
        "MODE",
    );
    opts.optopt("i", "iface", "interface to sniff on (mode 0 only)", "IFNAME");
    opts.optopt(
        "c",
        "conf",
        "configuration file path (default /etc/rudpd/rudpd.conf)",
        "FILE",
    );
    opts.optopt(
        "d",
        "debug",
        "verbosity, 0 (quiet) through 5 (extensive)",
        "LEVEL",
    );

    let matches = match opts.parse(&args[1..]) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("error(cli): {}", e);
            return None;
        }
    };

    if matches.opt_present("h") || args.len() < 2 {
        usage(&args[0], &opts);
        return None;
    }

    // the operation mode drives which other options are meaningful
    let mode = match matches.opt_str("m").as_ref().map(|s| &s[..]) {
        Some("0") => 0,
        Some("1") => 1,
        Some("2") => 2,
        Some(m) => {
            eprintln!("error(cli): unknown operation mode {}", m);
            return None;
        }
        None => {
            eprintln!("error(cli): an operation mode is required, see -h");
            return None;
        }
    };

    let iface = matches.opt_str("i");
    if mode == 0 && iface.is_none() {
        eprintln!("error(cli): sniffer mode needs an interface, see -h");
        return None;
    }

    let debug = match matches.opt_str("d") {
        Some(level) => match level.parse::<u8>() {
            Ok(v) => Some(v),
            Err(_) => {
                eprintln!("error(cli): the debugging level must be numeric");
                return None;
            }
        },
        None => None,
    };

    Some(Config::new(iface, mode, matches.opt_str("c"), debug))
}

// main() function
fn main() {
    let args: Vec<String> = env::args().collect();

    let cfg = match parse_cli_opts(&args) {
        Some(c) => c,
        None => std::process::exit(1),
    };

    // global shutdown flag, raised from the SIGINT handler
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_sig = Arc::clone(&shutdown);
    ctrlc::set_handler(move || shutdown_sig.store(true, Ordering::Relaxed))
        .expect("cannot install the SIGINT handler");

    if let Err(e) = run(&cfg, shutdown) {
        eprintln!("error(main): {}", e);
        std::process::exit(1);
    }
}

//! # rUDPd library
//! `rUDPd` is a minimal UDP/IPv4 stack over Ethernet II for hosts with a
//! single network interface, with ARP resolution handled in-process.
#![allow(non_snake_case)]

// libc
extern crate libc;

// byteorder
extern crate byteorder;

// itertools
extern crate itertools;

// serde
extern crate serde;
#[macro_use]
extern crate serde_derive;

// toml
extern crate toml;

// chrono
extern crate chrono;

// deamonize
extern crate daemonize;

// generic constants
pub mod constants;
use constants::*;

// checksums
pub mod checksums;

// debug
pub mod debug;
use debug::{print_debug, Verbose};

// configuration
pub mod config;
use config::{decode_config, HostConfig};

// timers
pub mod timers;
use timers::{Clock, MonotonicClock};

// address resolution protocol
pub mod arp;
use arp::ArpShared;

// ethernet framing
pub mod ethernet;

// internet protocol
pub mod ip;

// user datagram protocol
pub mod udp;

// channels and threads
pub mod threads;
use threads::RxWorker;

// operating systems support
pub mod os;
use os::drivers::MacDriver;

// std
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex};

/// Library Config Structure
///
/// Includes library configuration parameters
pub struct Config {
    iface: Option<String>,
    mode: u8,
    conf: Option<String>,
    debug: Option<u8>,
}

// Config Implementation
impl Config {
    // new() method
    pub fn new(iface: Option<String>, mode: u8, conf: Option<String>, debug: Option<u8>) -> Config {
        Config {
            iface,
            mode,
            conf,
            debug,
        }
    }
    // iface() getter
    pub fn iface(&self) -> String {
        match &self.iface {
            Some(s) => s.clone(),
            None => String::new(),
        }
    }
    // mode() getter
    pub fn mode(&self) -> u8 {
        self.mode
    }
    // conf() getter
    pub fn conf(&self) -> String {
        match &self.conf {
            Some(s) => s.clone(),
            // default configuration file path
            None => RUDPD_DFLT_CFG_FILE.to_string(),
        }
    }
    // debug() getter
    pub fn debug(&self) -> Option<u8> {
        self.debug
    }
}

/// Network Stack Structure
///
/// Owns the shared ARP state and the receive worker; hands out UDP sender
/// handles to application threads.
pub struct NetStack {
    host: Arc<HostConfig>,
    arp: Arc<Mutex<ArpShared>>,
    driver: Arc<dyn MacDriver>,
    clock: Arc<dyn Clock>,
    sink: Arc<Mutex<Option<mpsc::Sender<Vec<u8>>>>>,
    debug: Verbose,
    worker: Option<RxWorker>,
}

// NetStack Implementation
impl NetStack {
    // new() method
    pub fn new(
        host: HostConfig,
        driver: Arc<dyn MacDriver>,
        clock: Arc<dyn Clock>,
        debug: Verbose,
    ) -> NetStack {
        NetStack {
            host: Arc::new(host),
            arp: Arc::new(Mutex::new(ArpShared::new())),
            driver,
            clock,
            sink: Arc::new(Mutex::new(None)),
            debug,
            worker: None,
        }
    }
    // register_sink() method
    /// register the application channel receiving delivered UDP payloads;
    /// without one, payloads are echoed through the debug printer
    pub fn register_sink(&self, tx: mpsc::Sender<Vec<u8>>) {
        *self.sink.lock().unwrap() = Some(tx);
    }
    // sender() method
    /// hand out a UDP sender handle owning its own transmit frame
    pub fn sender(&self) -> UdpSender {
        UdpSender {
            frame: [0; ETHER_MAX_FRAME_SIZE],
            host: Arc::clone(&self.host),
            arp: Arc::clone(&self.arp),
            driver: Arc::clone(&self.driver),
            clock: Arc::clone(&self.clock),
            debug: self.debug.clone(),
        }
    }
    // start() method
    /// spawn the receive worker and announce our address mapping
    pub fn start(&mut self, shutdown: Arc<AtomicBool>) -> io::Result<()> {
        // print debugging information
        print_debug(
            &self.debug,
            DEBUG_LEVEL_EXTENSIVE,
            DEBUG_SRC_MAIN,
            format!("starting receive worker"),
        );

        self.worker = Some(RxWorker::spawn(
            Arc::clone(&self.host),
            Arc::clone(&self.arp),
            Arc::clone(&self.driver),
            Arc::clone(&self.clock),
            Arc::clone(&self.sink),
            shutdown,
            self.debug.clone(),
        ));

        // make our presence known on the segment
        self.gratuitous_arp()
    }
    // gratuitous_arp() method
    /// broadcast a gratuitous ARP request for our own IP
    pub fn gratuitous_arp(&self) -> io::Result<()> {
        let mut shared = self.arp.lock().unwrap();
        arp::arp_gratuitous(&mut shared, &self.host, self.driver.as_ref(), &self.debug)
    }
    // dump_arp_cache() method
    /// print every ARP cache slot with its age and state
    pub fn dump_arp_cache(&self) {
        let shared = self.arp.lock().unwrap();
        debug::dump_arp_cache(&shared.cache, self.clock.ticks());
    }
    // join() method
    /// wait for the receive worker to exit
    pub fn join(&mut self) {
        if let Some(worker) = &mut self.worker {
            worker.join();
        }
    }
}

/// UDP Sender Structure
///
/// Owns the transmit frame under construction; taking it by `&mut self`
/// serializes concurrent senders at compile time.
pub struct UdpSender {
    frame: [u8; ETHER_MAX_FRAME_SIZE],
    host: Arc<HostConfig>,
    arp: Arc<Mutex<ArpShared>>,
    driver: Arc<dyn MacDriver>,
    clock: Arc<dyn Clock>,
    debug: Verbose,
}

// UdpSender Implementation
impl UdpSender {
    // send() method
    /// send a datagram to the configured destination IP and port; datagram
    /// semantics apply, the caller never learns about a dropped frame
    pub fn send(&mut self, payload: &[u8]) -> io::Result<()> {
        udp::udp_send(
            &mut self.frame,
            payload,
            &self.host,
            &self.arp,
            self.driver.as_ref(),
            self.clock.as_ref(),
            &self.debug,
        )
    }
}

// run() function
/// Library entry point
///
/// Runs the sniffer (mode 0) or the UDP/IP stack in the foreground or as a
/// daemon (modes 1 and 2) on a Linux raw socket.
#[cfg(target_os = "linux")]
pub fn run(cfg: &Config, shutdown: Arc<AtomicBool>) -> io::Result<()> {
    use daemonize::Daemonize;
    use os::drivers::PflagOp;
    use os::linux::netdev::LinuxNetDev;
    use std::fs::File;

    // read operation mode
    match cfg.mode() {
        // sniffer mode
        0 => sniffer(cfg, shutdown),
        // stack modes
        1 | 2 => {
            // read configuration file
            let file_config = decode_config(cfg.conf());

            // read debugging level from Config first
            let debug_level = match cfg.debug() {
                Some(v) => v,
                // if None, then read debug level from configuration file
                None => file_config.debug(),
            };

            // initialize 'debug' variable of type Verbose
            let debug: Verbose = Verbose::new(
                debug_level,
                file_config.time_zone(),
                file_config.time_format(),
            );

            // if the mode is 2, then daemonize:
            if cfg.mode() == 2 {
                // create log files
                let stdout = File::create(file_config.main_log())?;
                let stderr = File::create(file_config.error_log())?;
                // initialize the daemon
                let daemon = Daemonize::new()
                    .pid_file(file_config.pid())
                    .chown_pid_file(true)
                    .working_directory(file_config.working_dir())
                    .user("root")
                    .group("root")
                    .umask(0o027)
                    .stdout(stdout)
                    .stderr(stderr);
                // daemonize the process
                match daemon.start() {
                    Ok(_) => println!("rUDPd (v{}) daemon started", RUDPD_VERSION),
                    Err(e) => eprintln!("Error while starting rUDPd daemon: {}", e),
                }
            }

            // open the raw socket driver on the configured interface
            let iface = file_config.host().interface().clone();
            let netdev = LinuxNetDev::open(&iface)?;
            netdev.set_promiscuous(PflagOp::Set)?;
            let driver = Arc::new(netdev);

            // build the runtime host configuration
            let host = HostConfig::from_cconfig(&file_config);

            // assemble and start the stack
            let clock = Arc::new(MonotonicClock::new());
            let mut stack = NetStack::new(host, driver.clone(), clock, debug.clone());
            stack.start(Arc::clone(&shutdown))?;

            // print information
            print_debug(
                &debug,
                DEBUG_LEVEL_INFO,
                DEBUG_SRC_INFO,
                format!("Starting UDP/IPv4 stack on interface {}", iface),
            );

            loop {
                // check if global shutdown variable is set
                // if set, remove promisc mode on interface and exit
                if shutdown.load(Ordering::Relaxed) {
                    driver.set_promiscuous(PflagOp::Unset)?;
                    println!("Exiting...");
                    std::process::exit(0);
                }
                std::thread::sleep(std::time::Duration::from_millis(250));
            }
        }
        _ => {
            println!("Unknown operation mode specified.");
            std::process::exit(1);
        }
    }
}

// run() function
/// Library entry point
#[cfg(not(target_os = "linux"))]
pub fn run(_cfg: &Config, _shutdown: Arc<AtomicBool>) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Other,
        "the raw socket MAC driver requires Linux",
    ))
}

// sniffer() function
/// Listen for frames on the given interface and display their headers
#[cfg(target_os = "linux")]
fn sniffer(cfg: &Config, shutdown: Arc<AtomicBool>) -> io::Result<()> {
    use os::drivers::PflagOp;
    use os::linux::netdev::LinuxNetDev;

    // open the raw socket driver
    let netdev = LinuxNetDev::open(&cfg.iface())?;

    // set promiscuous flag on interface
    netdev.set_promiscuous(PflagOp::Set)?;

    // print information
    println!("Listening for frames on {}\n", cfg.iface());

    let mut frame = [0u8; ETHER_MAX_FRAME_SIZE];

    // starts loop
    loop {
        // check if global shutdown variable is set
        // if set, then remove promisc mode on interface
        if shutdown.load(Ordering::Relaxed) {
            netdev.set_promiscuous(PflagOp::Unset)?;
            println!("Exiting...");
            std::process::exit(0);
        }

        // block on receiving frames
        let len = netdev.get_frame(&mut frame)?;
        debug::dump_eth_frame(&frame[..len]);
    }
}

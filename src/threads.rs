//! threads module
//! This module implements the receive worker thread, the only consumer of
//! the MAC driver's ingress queue.
use crate::arp::{self, ArpShared};
use crate::config::HostConfig;
use crate::constants::*;
use crate::debug::{print_debug, Verbose};
use crate::ethernet;
use crate::ip;
use crate::os::drivers::MacDriver;
use crate::timers::Clock;

// concurrency
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;

/// RxWorker Structure
pub struct RxWorker {
    // we wrap thread::JoinHandle in a Option<T> so we can
    // consume the thread later when calling .join().
    thread: Option<thread::JoinHandle<()>>,
}

// RxWorker Implementation
impl RxWorker {
    // spawn() method
    /// start the receive worker thread
    pub fn spawn(
        host: Arc<HostConfig>,
        arp: Arc<Mutex<ArpShared>>,
        driver: Arc<dyn MacDriver>,
        clock: Arc<dyn Clock>,
        sink: Arc<Mutex<Option<mpsc::Sender<Vec<u8>>>>>,
        shutdown: Arc<AtomicBool>,
        debug: Verbose,
    ) -> RxWorker {
        let worker_thread = thread::spawn(move || {
            // print debugging information
            print_debug(
                &debug,
                DEBUG_LEVEL_EXTENSIVE,
                DEBUG_SRC_THREAD,
                format!("spawning receive worker thread"),
            );
            rx_loop(host, arp, driver, clock, sink, shutdown, debug);
        });

        RxWorker {
            thread: Some(worker_thread),
        }
    }
    // join() method
    /// wait for the worker thread to exit
    pub fn join(&mut self) {
        // take the thread out of the worker structure and leave a None
        if let Some(thread) = self.thread.take() {
            thread.join().unwrap();
        }
    }
}

// rx_loop() function
/// the receive super-loop: fetch one frame, classify it by EtherType and
/// dispatch it; every frame is fully processed before the next is fetched
fn rx_loop(
    host: Arc<HostConfig>,
    arp: Arc<Mutex<ArpShared>>,
    driver: Arc<dyn MacDriver>,
    clock: Arc<dyn Clock>,
    sink: Arc<Mutex<Option<mpsc::Sender<Vec<u8>>>>>,
    shutdown: Arc<AtomicBool>,
    debug: Verbose,
) {
    // zero the cache and stamp every slot before any frame is handled
    {
        let mut shared = arp.lock().unwrap();
        shared.cache.init(clock.ticks());
    }

    // the one receive staging area, reused for every incoming frame
    let mut in_frame = [0u8; ETHER_MAX_FRAME_SIZE];

    loop {
        // check if global shutdown variable is set
        if shutdown.load(Ordering::Relaxed) {
            break;
        }

        // block on receiving one complete frame
        let len = match driver.get_frame(&mut in_frame) {
            Ok(len) => len,
            Err(e) => {
                if !shutdown.load(Ordering::Relaxed) {
                    print_debug(
                        &debug,
                        DEBUG_LEVEL_LOW,
                        DEBUG_SRC_WORKER,
                        format!("receive error: {}", e),
                    );
                }
                break;
            }
        };

        match ethernet::eth_check(&in_frame[..len], host.mac()) {
            ETHER_P_ARP => {
                // the lock is held for the duration of arp_in only
                let mut shared = arp.lock().unwrap();
                if let Err(e) = arp::arp_in(
                    &in_frame[..len],
                    &mut shared,
                    &host,
                    driver.as_ref(),
                    clock.as_ref(),
                    &debug,
                ) {
                    print_debug(
                        &debug,
                        DEBUG_LEVEL_LOW,
                        DEBUG_SRC_WORKER,
                        format!("error while answering ARP: {}", e),
                    );
                }
            }
            ETHER_P_IP => ip::ip_in(&in_frame[..len], &host, &sink, &debug),
            // not for us, or an EtherType we do not speak
            _ => {}
        }
    }

    // print debugging information
    print_debug(
        &debug,
        DEBUG_LEVEL_HIGH,
        DEBUG_SRC_WORKER,
        format!("receive worker thread exited"),
    );
}

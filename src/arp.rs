//! address resolution protocol module
//! This module implements the ARP cache, the request/reply state machine
//! and the bounded resolution retry loop used by the IP send path.
use crate::config::HostConfig;
use crate::constants::*;
use crate::debug::{format_ipv4, format_mac, print_debug, Verbose};
use crate::ethernet;
use crate::os::drivers::MacDriver;
use crate::timers::Clock;

// byteorder
use byteorder::{ByteOrder, NetworkEndian};

// std
use std::io;
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

/// Cache Resolution State Enumerator
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CacheState {
    Miss,     // no entry for this address
    Partial,  // request sent, reply pending, or entry gone stale
    Complete, // usable hardware address
}

/// ARP Cache Slot Structure
///
/// An all-zero IP marks a conceptually empty slot; an all-zero MAC marks a
/// partial entry awaiting its reply.
#[derive(Debug, Clone, Copy)]
pub struct ArpSlot {
    ip: [u8; 4],
    mac: [u8; 6],
    ts: u32, // millisecond ticks of the most recent insert/update
}

// ArpSlot Implementation
impl ArpSlot {
    // empty() method
    const fn empty() -> ArpSlot {
        ArpSlot {
            ip: [0; 4],
            mac: [0; 6],
            ts: 0,
        }
    }
    // ip() getter
    pub fn ip(&self) -> &[u8; 4] {
        &self.ip
    }
    // mac() getter
    pub fn mac(&self) -> &[u8; 6] {
        &self.mac
    }
    // ts() getter
    pub fn ts(&self) -> u32 {
        self.ts
    }
    // state_name() method
    // resolution state of the slot for display purposes
    pub fn state_name(&self, now: u32) -> &'static str {
        if self.ip == [0u8; 4] {
            "empty"
        } else if self.mac == [0u8; 6] {
            "partial"
        } else if now.wrapping_sub(self.ts) > ARP_CACHE_TTL {
            "stale"
        } else {
            "complete"
        }
    }
}

/// ARP Cache Structure
#[derive(Debug)]
pub struct ArpCache {
    slots: [ArpSlot; ARP_CACHE_SIZE],
}

// ArpCache Implementation
impl ArpCache {
    // new() method
    pub fn new() -> ArpCache {
        ArpCache {
            slots: [ArpSlot::empty(); ARP_CACHE_SIZE],
        }
    }
    // init() method
    /// zero every slot and stamp it with the current ticks
    pub fn init(&mut self, now: u32) {
        for slot in self.slots.iter_mut() {
            *slot = ArpSlot::empty();
            slot.ts = now;
        }
    }
    // lookup() method
    /// find the slot holding ip and its resolution state; on a miss,
    /// return the least recently stamped slot for replacement
    pub fn lookup(&self, ip: &[u8; 4], now: u32) -> (usize, CacheState) {
        for (idx, slot) in self.slots.iter().enumerate() {
            if slot.ip == *ip {
                // a stale entry is handled like a pending one: re-resolve
                if slot.mac == [0u8; 6] || now.wrapping_sub(slot.ts) > ARP_CACHE_TTL {
                    return (idx, CacheState::Partial);
                }
                return (idx, CacheState::Complete);
            }
        }

        // no entry: select the LRU slot, oldest timestamp wins
        let mut lru = 0;
        let mut age = now.wrapping_sub(self.slots[0].ts);
        for idx in 1..ARP_CACHE_SIZE {
            let slot_age = now.wrapping_sub(self.slots[idx].ts);
            if slot_age > age {
                age = slot_age;
                lru = idx;
            }
        }
        (lru, CacheState::Miss)
    }
    // update() method
    /// record an authoritative sender IP/MAC pair from a received ARP frame
    pub fn update(&mut self, sender_ip: &[u8; 4], sender_mac: &[u8; 6], now: u32) {
        let (idx, state) = self.lookup(sender_ip, now);
        let slot = &mut self.slots[idx];
        if let CacheState::Miss = state {
            slot.ip = *sender_ip;
        }
        slot.mac = *sender_mac;
        slot.ts = now;
    }
    // slots() getter
    pub fn slots(&self) -> &[ArpSlot] {
        &self.slots
    }
}

/// Shared ARP State Structure
///
/// The cache and the ARP frame staging buffer live behind one mutex; every
/// access to either happens with the lock held.
pub struct ArpShared {
    pub(crate) cache: ArpCache,
    frame: [u8; ETHER_MAX_FRAME_SIZE],
}

// ArpShared Implementation
impl ArpShared {
    // new() method
    pub fn new() -> ArpShared {
        ArpShared {
            cache: ArpCache::new(),
            frame: [0; ETHER_MAX_FRAME_SIZE],
        }
    }
}

// arp_request() function
/// build an ARP request for target_ip into the shared ARP frame and
/// broadcast it; caller must hold the ARP lock
pub fn arp_request(
    shared: &mut ArpShared,
    host: &HostConfig,
    target_ip: &[u8; 4],
    driver: &dyn MacDriver,
    debug: &Verbose,
) -> io::Result<()> {
    print_debug(
        debug,
        DEBUG_LEVEL_HIGH,
        DEBUG_SRC_ARP,
        format!("sending ARP request for {}", format_ipv4(target_ip)),
    );

    let frame = &mut shared.frame;
    frame[ARP_FIXED_HDR_POS..ARP_FIXED_HDR_POS + 6].copy_from_slice(&ARP_FIXED_HDR);
    NetworkEndian::write_u16(&mut frame[ARP_OPCODE_POS..ARP_OPCODE_POS + 2], ARP_OP_REQUEST);
    frame[ARP_SENDER_MAC_POS..ARP_SENDER_MAC_POS + 6].copy_from_slice(host.mac());
    frame[ARP_SENDER_IP_POS..ARP_SENDER_IP_POS + 4].copy_from_slice(host.ip());
    frame[ARP_TARGET_MAC_POS..ARP_TARGET_MAC_POS + 6].copy_from_slice(&[0u8; 6]);
    frame[ARP_TARGET_IP_POS..ARP_TARGET_IP_POS + 4].copy_from_slice(target_ip);

    ethernet::dispatch_arp(frame, &ETHER_BROADCAST_MAC, host.mac(), driver)
}

// arp_gratuitous() function
/// announce our own address mapping, a request for our own IP
pub fn arp_gratuitous(
    shared: &mut ArpShared,
    host: &HostConfig,
    driver: &dyn MacDriver,
    debug: &Verbose,
) -> io::Result<()> {
    let host_ip = *host.ip();
    arp_request(shared, host, &host_ip, driver, debug)
}

// arp_reply() function
/// answer the ARP request held in in_frame; the reply's target fields are
/// the request's sender fields, copied verbatim
fn arp_reply(
    in_frame: &[u8],
    shared: &mut ArpShared,
    host: &HostConfig,
    driver: &dyn MacDriver,
    debug: &Verbose,
) -> io::Result<()> {
    print_debug(
        debug,
        DEBUG_LEVEL_HIGH,
        DEBUG_SRC_ARP,
        format!(
            "answering ARP request from {}",
            format_ipv4(&in_frame[ARP_SENDER_IP_POS..ARP_SENDER_IP_POS + 4])
        ),
    );

    let frame = &mut shared.frame;
    frame[ARP_FIXED_HDR_POS..ARP_FIXED_HDR_POS + 6].copy_from_slice(&ARP_FIXED_HDR);
    NetworkEndian::write_u16(&mut frame[ARP_OPCODE_POS..ARP_OPCODE_POS + 2], ARP_OP_REPLY);
    frame[ARP_SENDER_MAC_POS..ARP_SENDER_MAC_POS + 6].copy_from_slice(host.mac());
    frame[ARP_SENDER_IP_POS..ARP_SENDER_IP_POS + 4].copy_from_slice(host.ip());
    frame[ARP_TARGET_MAC_POS..ARP_TARGET_IP_POS + 4]
        .copy_from_slice(&in_frame[ARP_SENDER_MAC_POS..ARP_SENDER_IP_POS + 4]);

    // the requester's MAC is now the reply's target hardware address
    let mut target_mac = [0u8; 6];
    target_mac.copy_from_slice(&frame[ARP_TARGET_MAC_POS..ARP_TARGET_MAC_POS + 6]);

    ethernet::dispatch_arp(frame, &target_mac, host.mac(), driver)
}

// arp_in() function
/// handle a received ARP frame; caller must hold the ARP lock
pub fn arp_in(
    in_frame: &[u8],
    shared: &mut ArpShared,
    host: &HostConfig,
    driver: &dyn MacDriver,
    clock: &dyn Clock,
    debug: &Verbose,
) -> io::Result<()> {
    // drop truncated frames and anything but IPv4-over-Ethernet resolution
    if in_frame.len() < ARP_FRAME_SIZE {
        return Ok(());
    }
    if in_frame[ARP_FIXED_HDR_POS..ARP_FIXED_HDR_POS + 6] != ARP_FIXED_HDR {
        return Ok(());
    }

    let mut sender_ip = [0u8; 4];
    sender_ip.copy_from_slice(&in_frame[ARP_SENDER_IP_POS..ARP_SENDER_IP_POS + 4]);
    let mut sender_mac = [0u8; 6];
    sender_mac.copy_from_slice(&in_frame[ARP_SENDER_MAC_POS..ARP_SENDER_MAC_POS + 6]);

    match NetworkEndian::read_u16(&in_frame[ARP_OPCODE_POS..ARP_OPCODE_POS + 2]) {
        ARP_OP_REQUEST => {
            // answer requests for our own IP only
            if &in_frame[ARP_TARGET_IP_POS..ARP_TARGET_IP_POS + 4] == host.ip() {
                shared.cache.update(&sender_ip, &sender_mac, clock.ticks());
                arp_reply(in_frame, shared, host, driver, debug)?;
            }
            Ok(())
        }
        ARP_OP_REPLY => {
            if &sender_ip == host.ip() {
                // another station answers for our address
                print_debug(
                    debug,
                    DEBUG_LEVEL_INFO,
                    DEBUG_SRC_ARP,
                    format!(
                        "IP conflict detected: {} also in use by {}",
                        format_ipv4(&sender_ip),
                        format_mac(&sender_mac)
                    ),
                );
            } else {
                shared.cache.update(&sender_ip, &sender_mac, clock.ticks());
            }
            Ok(())
        }
        // unknown opcode
        _ => Ok(()),
    }
}

// arp_get_mac() function
/// return the hardware address of ip when its cache entry is complete;
/// otherwise transmit a request and report the miss. caller must hold the
/// ARP lock
pub fn arp_get_mac(
    shared: &mut ArpShared,
    host: &HostConfig,
    ip: &[u8; 4],
    driver: &dyn MacDriver,
    clock: &dyn Clock,
    debug: &Verbose,
) -> io::Result<Option<[u8; 6]>> {
    let (idx, state) = shared.cache.lookup(ip, clock.ticks());
    match state {
        CacheState::Complete => Ok(Some(shared.cache.slots[idx].mac)),
        _ => {
            arp_request(shared, host, ip, driver, debug)?;
            Ok(None)
        }
    }
}

// enquire_arp() function
/// resolve a next-hop hardware address with a bounded retry; the lock is
/// released before each back-off so the receive task can ingest the reply
pub fn enquire_arp(
    arp: &Mutex<ArpShared>,
    host: &HostConfig,
    ip: &[u8; 4],
    driver: &dyn MacDriver,
    clock: &dyn Clock,
    debug: &Verbose,
) -> io::Result<Option<[u8; 6]>> {
    for attempt in 0..ARP_ENQUIRE_ATTEMPTS {
        // lookup, possibly transmitting a request, then drop the lock
        let resolved = {
            let mut shared = arp.lock().unwrap();
            arp_get_mac(&mut shared, host, ip, driver, clock, debug)?
        };
        if resolved.is_some() {
            return Ok(resolved);
        }

        // back off while the reply travels
        let wait = if attempt == 0 {
            ARP_ENQUIRE_SHORT_WAIT
        } else {
            ARP_ENQUIRE_LONG_WAIT
        };
        thread::sleep(Duration::from_millis(wait));
    }

    print_debug(
        debug,
        DEBUG_LEVEL_MEDIUM,
        DEBUG_SRC_ARP,
        format!("resolution of {} timed out", format_ipv4(ip)),
    );
    Ok(None)
}

//! End-to-end scenarios over two stacks cross-wired through an in-memory
//! channel MAC driver.
#![allow(non_snake_case)]

use rUDPd::config::HostConfig;
use rUDPd::constants::*;
use rUDPd::debug::Verbose;
use rUDPd::os::drivers::MacDriver;
use rUDPd::timers::MonotonicClock;
use rUDPd::NetStack;

use std::io;
use std::sync::atomic::AtomicBool;
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

const MAC_A: [u8; 6] = [0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff];
const MAC_B: [u8; 6] = [0x02, 0x4e, 0x49, 0x47, 0x45, 0x02];
const MAC_ROUTER: [u8; 6] = [0x02, 0x4e, 0x49, 0x47, 0x45, 0x01];
const IP_A: [u8; 4] = [192, 168, 1, 101];
const IP_B: [u8; 4] = [192, 168, 1, 102];
const IP_ROUTER: [u8; 4] = [192, 168, 1, 1];

/// In-memory wire: frames pushed by the driver land on the peer's channel
/// and are also recorded locally for assertions.
struct WireDriver {
    sent: Mutex<Vec<Vec<u8>>>,
    peer_tx: Mutex<mpsc::Sender<Vec<u8>>>,
    rx: Mutex<mpsc::Receiver<Vec<u8>>>,
}

impl WireDriver {
    fn new(peer_tx: mpsc::Sender<Vec<u8>>, rx: mpsc::Receiver<Vec<u8>>) -> WireDriver {
        WireDriver {
            sent: Mutex::new(Vec::new()),
            peer_tx: Mutex::new(peer_tx),
            rx: Mutex::new(rx),
        }
    }
    fn sent(&self) -> Vec<Vec<u8>> {
        self.sent.lock().unwrap().clone()
    }
}

impl MacDriver for WireDriver {
    fn get_frame(&self, buf: &mut [u8]) -> io::Result<usize> {
        match self.rx.lock().unwrap().recv() {
            Ok(f) => {
                buf[..f.len()].copy_from_slice(&f);
                Ok(f.len())
            }
            Err(_) => Err(io::Error::new(io::ErrorKind::BrokenPipe, "wire closed")),
        }
    }
    fn put_frame(&self, frame: &[u8]) -> io::Result<()> {
        self.sent.lock().unwrap().push(frame.to_vec());
        // a disconnected peer swallows the frame, as a real segment would
        let _ = self.peer_tx.lock().unwrap().send(frame.to_vec());
        Ok(())
    }
}

fn host_a() -> HostConfig {
    let mut host = HostConfig::new();
    host.set_mac(MAC_A);
    host.set_ip(IP_A);
    host.set_subnet([255, 255, 255, 0]);
    host.set_router(IP_ROUTER);
    host.set_udp_src_port(7000);
    host.set_udp_dst_port(5000);
    host.set_udp_dest_ip(IP_B);
    host
}

fn host_b() -> HostConfig {
    let mut host = HostConfig::new();
    host.set_mac(MAC_B);
    host.set_ip(IP_B);
    host.set_subnet([255, 255, 255, 0]);
    host.set_router(IP_ROUTER);
    host.set_udp_src_port(5000);
    host.set_udp_dst_port(7000);
    host.set_udp_dest_ip(IP_A);
    host
}

fn stack(host: HostConfig, driver: Arc<WireDriver>) -> NetStack {
    NetStack::new(
        host,
        driver,
        Arc::new(MonotonicClock::new()),
        Verbose::new(0, 0, 0),
    )
}

fn read_u16(b: &[u8]) -> u16 {
    (b[0] as u16) << 8 | b[1] as u16
}

fn is_arp_request(f: &[u8]) -> bool {
    read_u16(&f[12..14]) == ETHER_P_ARP && read_u16(&f[20..22]) == ARP_OP_REQUEST
}

fn is_udp(f: &[u8]) -> bool {
    read_u16(&f[12..14]) == ETHER_P_IP && f[23] == IP_UPPER_PROTO_UDP
}

// craft a minimal ARP frame with the given opcode and address fields
fn arp_frame(
    dst_mac: &[u8; 6],
    src_mac: &[u8; 6],
    opcode: u16,
    sender_mac: &[u8; 6],
    sender_ip: &[u8; 4],
    target_mac: &[u8; 6],
    target_ip: &[u8; 4],
) -> Vec<u8> {
    let mut f = vec![0u8; 60];
    f[0..6].copy_from_slice(dst_mac);
    f[6..12].copy_from_slice(src_mac);
    f[12..14].copy_from_slice(&ETHER_P_ARP.to_be_bytes());
    f[14..20].copy_from_slice(&ARP_FIXED_HDR);
    f[20..22].copy_from_slice(&opcode.to_be_bytes());
    f[22..28].copy_from_slice(sender_mac);
    f[28..32].copy_from_slice(sender_ip);
    f[32..38].copy_from_slice(target_mac);
    f[38..42].copy_from_slice(target_ip);
    f
}

#[test]
fn arp_who_has_draws_one_reply() {
    // we play host A on the wire, stack B answers
    let (to_b_tx, to_b_rx) = mpsc::channel();
    let (to_a_tx, to_a_rx) = mpsc::channel();
    let driver_b = Arc::new(WireDriver::new(to_a_tx, to_b_rx));

    let mut b = stack(host_b(), Arc::clone(&driver_b));
    b.start(Arc::new(AtomicBool::new(false))).unwrap();

    // who has 192.168.1.102? tell 192.168.1.101
    to_b_tx
        .send(arp_frame(
            &ETHER_BROADCAST_MAC,
            &MAC_A,
            ARP_OP_REQUEST,
            &MAC_A,
            &IP_A,
            &[0u8; 6],
            &IP_B,
        ))
        .unwrap();

    // skip B's startup gratuitous announcement, keep the reply
    let deadline = Instant::now() + Duration::from_secs(2);
    let reply = loop {
        assert!(Instant::now() < deadline, "no ARP reply on the wire");
        let f = to_a_rx.recv_timeout(Duration::from_secs(2)).unwrap();
        if read_u16(&f[12..14]) == ETHER_P_ARP && read_u16(&f[20..22]) == ARP_OP_REPLY {
            break f;
        }
    };

    assert_eq!(&reply[0..6], &MAC_A);
    assert_eq!(&reply[6..12], &MAC_B);
    assert_eq!(&reply[22..28], &MAC_B);
    assert_eq!(&reply[28..32], &IP_B);
    assert_eq!(&reply[32..38], &MAC_A);
    assert_eq!(&reply[38..42], &IP_A);

    // the requester's mapping is now cached: a send from B goes straight
    // out as UDP with no further resolution on the wire
    let requests_before = driver_b.sent().iter().filter(|f| is_arp_request(f)).count();
    let mut sender = b.sender();
    sender.send(b"pong").unwrap();

    let sent = driver_b.sent();
    let requests_after = sent.iter().filter(|f| is_arp_request(f)).count();
    assert_eq!(requests_before, requests_after);
    let udp: Vec<_> = sent.iter().filter(|f| is_udp(f)).collect();
    assert_eq!(udp.len(), 1);
    assert_eq!(&udp[0][0..6], &MAC_A);
}

#[test]
fn udp_echo_between_two_stacks() {
    let (to_b_tx, to_b_rx) = mpsc::channel();
    let (to_a_tx, to_a_rx) = mpsc::channel();
    let driver_a = Arc::new(WireDriver::new(to_b_tx, to_a_rx));
    let driver_b = Arc::new(WireDriver::new(to_a_tx, to_b_rx));

    let mut a = stack(host_a(), Arc::clone(&driver_a));
    let mut b = stack(host_b(), Arc::clone(&driver_b));

    let (sink_b_tx, sink_b_rx) = mpsc::channel();
    b.register_sink(sink_b_tx);
    let (sink_a_tx, sink_a_rx) = mpsc::channel();
    a.register_sink(sink_a_tx);

    a.start(Arc::new(AtomicBool::new(false))).unwrap();
    b.start(Arc::new(AtomicBool::new(false))).unwrap();

    // A resolves B through a live ARP exchange, then delivers the payload
    let mut sender_a = a.sender();
    sender_a.send(b"ping").unwrap();
    let got = sink_b_rx.recv_timeout(Duration::from_secs(3)).unwrap();
    assert_eq!(got, b"ping".to_vec());

    // on-subnet direct delivery: the frame went straight to B's MAC
    let udp: Vec<_> = driver_a.sent().into_iter().filter(|f| is_udp(f)).collect();
    assert_eq!(udp.len(), 1);
    assert_eq!(&udp[0][0..6], &MAC_B);
    assert_eq!(&udp[0][30..34], &IP_B);

    // and back the other way
    let mut sender_b = b.sender();
    sender_b.send(b"pong").unwrap();
    let got = sink_a_rx.recv_timeout(Duration::from_secs(3)).unwrap();
    assert_eq!(got, b"pong".to_vec());
}

#[test]
fn off_subnet_datagram_goes_through_router() {
    let (to_router_tx, to_router_rx) = mpsc::channel();
    let (to_a_tx, to_a_rx) = mpsc::channel();
    let driver_a = Arc::new(WireDriver::new(to_router_tx, to_a_rx));

    let mut host = host_a();
    host.set_udp_dest_ip([8, 8, 8, 8]);
    let mut a = stack(host, Arc::clone(&driver_a));
    a.start(Arc::new(AtomicBool::new(false))).unwrap();

    // the send path blocks while resolving, so it runs on its own thread
    let mut sender = a.sender();
    let send_thread = thread::spawn(move || sender.send(b"x").unwrap());

    // play the router: answer the resolution request for our address
    let deadline = Instant::now() + Duration::from_secs(2);
    loop {
        assert!(Instant::now() < deadline, "no ARP request for the router");
        let f = to_router_rx.recv_timeout(Duration::from_secs(2)).unwrap();
        if is_arp_request(&f) && &f[38..42] == &IP_ROUTER {
            to_a_tx
                .send(arp_frame(
                    &MAC_A,
                    &MAC_ROUTER,
                    ARP_OP_REPLY,
                    &MAC_ROUTER,
                    &IP_ROUTER,
                    &MAC_A,
                    &IP_A,
                ))
                .unwrap();
            break;
        }
    }
    send_thread.join().unwrap();

    // indirect delivery: Ethernet to the router, IP destination unchanged
    let udp: Vec<_> = driver_a.sent().into_iter().filter(|f| is_udp(f)).collect();
    assert_eq!(udp.len(), 1);
    assert_eq!(&udp[0][0..6], &MAC_ROUTER);
    assert_eq!(&udp[0][30..34], &[8, 8, 8, 8]);
}

#[test]
fn resolution_timeout_drops_datagram() {
    // nobody on the other end of the wire
    let (to_peer_tx, _) = mpsc::channel();
    let (_to_a_tx, to_a_rx) = mpsc::channel::<Vec<u8>>();
    let driver_a = Arc::new(WireDriver::new(to_peer_tx, to_a_rx));

    let a = stack(host_a(), Arc::clone(&driver_a));
    let mut sender = a.sender();

    let t0 = Instant::now();
    sender.send(b"hi").unwrap();
    let elapsed = t0.elapsed();

    // two back-off windows, roughly two seconds end to end
    assert!(elapsed >= Duration::from_millis(1900));
    assert!(elapsed < Duration::from_secs(5));

    // exactly the two resolution requests went out, and no UDP frame
    let sent = driver_a.sent();
    assert_eq!(sent.len(), 2);
    assert!(sent.iter().all(|f| is_arp_request(f)));
    for f in &sent {
        assert_eq!(&f[38..42], &IP_B);
    }
}

#[test]
fn datagram_to_foreign_port_is_not_delivered() {
    let (to_b_tx, to_b_rx) = mpsc::channel();
    let (to_a_tx, to_a_rx) = mpsc::channel();
    let driver_a = Arc::new(WireDriver::new(to_b_tx, to_a_rx));
    let driver_b = Arc::new(WireDriver::new(to_a_tx, to_b_rx));

    // A aims one port above B's open port
    let mut host = host_a();
    host.set_udp_dst_port(5001);
    let mut a = stack(host, Arc::clone(&driver_a));
    let mut b = stack(host_b(), Arc::clone(&driver_b));

    let (sink_tx, sink_rx) = mpsc::channel();
    b.register_sink(sink_tx);

    a.start(Arc::new(AtomicBool::new(false))).unwrap();
    b.start(Arc::new(AtomicBool::new(false))).unwrap();

    let mut sender = a.sender();
    sender.send(b"ping").unwrap();

    // the datagram reached B's wire but never the application
    let deadline = Instant::now() + Duration::from_secs(2);
    while driver_a.sent().iter().filter(|f| is_udp(f)).count() == 0 {
        assert!(Instant::now() < deadline, "UDP frame never left A");
        thread::sleep(Duration::from_millis(20));
    }
    assert!(sink_rx.recv_timeout(Duration::from_millis(500)).is_err());
}

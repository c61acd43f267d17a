//! linux specific network device functions module
//! This module implements the MAC driver contract on top of an AF_PACKET
//! raw socket bound to a single interface.
use crate::os::drivers::{MacDriver, PflagOp};

// libc
use libc::{
    bind, c_short, c_void, close, if_nametoindex, ioctl, recvfrom, sendto, sockaddr, sockaddr_ll,
    socket, socklen_t, AF_PACKET, ETH_P_ALL, IFF_PROMISC, IF_NAMESIZE, SIOCGIFFLAGS, SIOCSIFFLAGS,
    SOCK_RAW,
};

// std
use std::ffi::CString;
use std::io;
use std::mem;

/// ioctl_flags Structure
#[repr(C)]
struct ioctl_flags {
    ifr_name: [u8; IF_NAMESIZE],
    ifr_flags: c_short,
}

/// LinuxNetDev Structure
///
/// AF_PACKET raw socket MAC driver
pub struct LinuxNetDev {
    fd: i32,
    ifindex: i32,
    ifname: CString,
}

// LinuxNetDev Implementation
impl LinuxNetDev {
    // open() method
    /// Open a raw AF_PACKET socket and bind it to the named interface
    pub fn open(iface: &str) -> io::Result<LinuxNetDev> {
        let ifname = CString::new(iface.as_bytes() as &[u8]).unwrap();

        unsafe {
            // man 2 socket
            // returns a file descriptor or -1 if error.
            let fd = match socket(AF_PACKET, SOCK_RAW, (ETH_P_ALL as u16).to_be() as i32) {
                -1 => return Err(io::Error::last_os_error()),
                fd => fd,
            };

            // get the interface index from its name
            let ifindex = match if_nametoindex(ifname.as_ptr()) {
                0 => {
                    close(fd);
                    return Err(io::Error::last_os_error());
                }
                r => r as i32,
            };

            // bind the socket to the interface so only its frames are seen
            let mut sa: sockaddr_ll = mem::zeroed();
            sa.sll_family = AF_PACKET as u16;
            sa.sll_protocol = (ETH_P_ALL as u16).to_be();
            sa.sll_ifindex = ifindex;

            let ptr_sockaddr = mem::transmute::<*mut sockaddr_ll, *mut sockaddr>(&mut sa);
            if bind(fd, ptr_sockaddr, mem::size_of::<sockaddr_ll>() as socklen_t) == -1 {
                close(fd);
                return Err(io::Error::last_os_error());
            }

            Ok(LinuxNetDev { fd, ifindex, ifname })
        }
    }
    // set_promiscuous() method
    /// Set or unset the promiscuous flag on the bound interface
    pub fn set_promiscuous(&self, op: PflagOp) -> io::Result<()> {
        let mut ifopts = ioctl_flags {
            ifr_name: [0; IF_NAMESIZE],
            ifr_flags: 0,
        };

        // copy the interface name into the ioctl request
        for (i, b) in self.ifname.as_bytes_with_nul().iter().enumerate() {
            ifopts.ifr_name[i] = *b;
        }

        unsafe {
            // read the current interface flags
            if ioctl(self.fd, SIOCGIFFLAGS, &mut ifopts) == -1 {
                return Err(io::Error::last_os_error());
            }
            // set or unset the promiscuous flag
            match op {
                PflagOp::Set => ifopts.ifr_flags |= IFF_PROMISC as c_short,
                PflagOp::Unset => ifopts.ifr_flags &= !(IFF_PROMISC as c_short),
            }
            // write the interface flags back
            if ioctl(self.fd, SIOCSIFFLAGS, &mut ifopts) == -1 {
                return Err(io::Error::last_os_error());
            }
        }

        Ok(())
    }
}

impl MacDriver for LinuxNetDev {
    // get_frame() method
    /// Receive one Ethernet frame from the bound interface
    fn get_frame(&self, buf: &mut [u8]) -> io::Result<usize> {
        // stack variables
        let len: isize;
        let mut sa: sockaddr_ll = unsafe { mem::zeroed() };
        let mut addr_buf_len: socklen_t = mem::size_of::<sockaddr_ll>() as socklen_t;

        unsafe {
            // unsafe transmute of sockaddr_ll to a sockaddr type
            let addr_ptr = mem::transmute::<*mut sockaddr_ll, *mut sockaddr>(&mut sa);
            // unsafe call to libc's recvfrom (man 2 recvfrom)
            // returns length of message, -1 if error
            len = match recvfrom(
                self.fd,                         // socket file descriptor
                buf.as_mut_ptr() as *mut c_void, // pointer to buffer
                buf.len(),                       // buffer length
                0,                               // flags
                addr_ptr,                        // pointer to source address
                &mut addr_buf_len,               // address buffer length
            ) {
                -1 => {
                    return Err(io::Error::last_os_error());
                }
                len => len,
            }
        }

        Ok(len as usize)
    }
    // put_frame() method
    /// Transmit one Ethernet frame on the bound interface
    fn put_frame(&self, frame: &[u8]) -> io::Result<()> {
        // sockaddr_ll (man 7 packet)
        let mut sa: sockaddr_ll = unsafe { mem::zeroed() };
        sa.sll_family = AF_PACKET as u16;
        sa.sll_protocol = (ETH_P_ALL as u16).to_be();
        sa.sll_ifindex = self.ifindex;

        unsafe {
            // unsafe call to sendto()
            let ptr_sockaddr = mem::transmute::<*mut sockaddr_ll, *mut sockaddr>(&mut sa);
            match sendto(
                self.fd,
                frame as *const _ as *const c_void,
                frame.len(),
                0,
                ptr_sockaddr,
                mem::size_of::<sockaddr_ll>() as socklen_t,
            ) {
                -1 => Err(io::Error::last_os_error()),
                _ => Ok(()),
            }
        }
    }
}

impl Drop for LinuxNetDev {
    // drop() method
    // close the raw socket file descriptor
    fn drop(&mut self) {
        unsafe {
            close(self.fd);
        }
    }
}

//! OSC message sending
//!
//! One OSC message per UDP datagram. The mapping engine sends feedback
//! through the `OscSink` trait so tests can substitute a recording sink.

use rosc::{OscMessage, OscPacket, OscType};
use std::net::{SocketAddr, UdpSocket};

/// Outgoing OSC seam
///
/// `false` means the message was not delivered; implementations must never
/// panic on an unreachable peer.
pub trait OscSink {
    fn send(&mut self, addr: &str, args: Vec<OscType>, to: SocketAddr) -> bool;
}

/// UDP OSC sender
pub struct OscSender {
    socket: UdpSocket,
}

impl OscSender {
    /// Create a sender on an ephemeral local port
    pub fn new() -> std::io::Result<Self> {
        let socket = UdpSocket::bind("0.0.0.0:0")?;
        Ok(Self { socket })
    }
}

impl OscSink for OscSender {
    fn send(&mut self, addr: &str, args: Vec<OscType>, to: SocketAddr) -> bool {
        let packet = OscPacket::Message(OscMessage {
            addr: addr.to_string(),
            args,
        });

        let bytes = match rosc::encoder::encode(&packet) {
            Ok(b) => b,
            Err(e) => {
                log::warn!("OSC: Failed to encode message for {}: {}", addr, e);
                return false;
            }
        };

        match self.socket.send_to(&bytes, to) {
            Ok(_) => {
                log::trace!("[OSC OUT] {} to {}", addr, to);
                true
            }
            Err(e) => {
                log::warn!("OSC: Failed to send {} to {}: {}", addr, to, e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_send_reaches_listener() {
        let listener = UdpSocket::bind("127.0.0.1:0").unwrap();
        listener
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();
        let target = listener.local_addr().unwrap();

        let mut sender = OscSender::new().unwrap();
        assert!(sender.send("/transport/play", vec![OscType::Float(1.0)], target));

        let mut buf = [0u8; 1024];
        let (n, _) = listener.recv_from(&mut buf).unwrap();
        let (_, packet) = rosc::decoder::decode_udp(&buf[..n]).unwrap();
        match packet {
            OscPacket::Message(msg) => {
                assert_eq!(msg.addr, "/transport/play");
                assert_eq!(msg.args, vec![OscType::Float(1.0)]);
            }
            _ => panic!("expected message"),
        }
    }
}

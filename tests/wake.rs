use std::io;
use std::net::UdpSocket;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use home_hub_rs::runtime::block_on;
use home_hub_rs::{MacAddress, WakeMethod, WakeOnLan, magic_packet, repeat_unconfirmed};

#[test]
fn test_unconfirmed_wake_never_fails() {
    let sent_at = Arc::new(Mutex::new(Vec::new()));
    let record = Arc::clone(&sent_at);

    let report = block_on(repeat_unconfirmed(5, Duration::from_millis(100), move |_| {
        record.lock().unwrap().push(Instant::now());
        async { Err::<(), _>(io::Error::other("network unreachable")) }
    }));

    assert_eq!(report.attempts, 5);
    assert_eq!(report.failures, 5);
    let sent_at = sent_at.lock().unwrap();
    assert_eq!(sent_at.len(), 5);
    assert!(
        sent_at
            .windows(2)
            .all(|w| w[1] - w[0] >= Duration::from_millis(100))
    );
}

#[test]
fn test_native_wake_sends_five_magic_packets() {
    let listener = UdpSocket::bind("127.0.0.1:0").unwrap();
    listener
        .set_read_timeout(Some(Duration::from_secs(5)))
        .unwrap();
    let port = listener.local_addr().unwrap().port();

    let receiver = thread::spawn(move || {
        let mut packets = Vec::new();
        let mut buf = [0u8; 256];
        for _ in 0..5 {
            let (len, _) = listener.recv_from(&mut buf).unwrap();
            packets.push(buf[..len].to_vec());
        }
        packets
    });

    let mac: MacAddress = "aa:bb:cc:dd:ee:ff".parse().unwrap();
    let target = WakeOnLan::new(mac)
        .with_host("127.0.0.1")
        .with_port(port)
        .with_method(WakeMethod::Native);
    let started = Instant::now();
    let report = block_on(target.wake());

    assert_eq!(report.attempts, 5);
    assert_eq!(report.failures, 0);
    assert!(started.elapsed() >= Duration::from_secs(2));

    let packets = receiver.join().unwrap();
    assert!(packets.iter().all(|p| p.len() == 102));
    assert!(packets.iter().all(|p| *p == magic_packet(&mac)));
}

#[test]
fn test_wake_target_from_json() {
    let target: WakeOnLan =
        serde_json::from_str(r#"{"mac": "00-11-22-33-44-55", "manual_interface": "eth0"}"#).unwrap();
    assert_eq!(target.method(), WakeMethod::EtherWake);
    assert_eq!(target.mac().to_string(), "00:11:22:33:44:55");
    assert_eq!(target.endpoint().address(), "255.255.255.255:9");
}

use std::io::Read;
use std::net::TcpListener;
use std::thread::{self, JoinHandle};

use home_hub_rs::runtime::block_on;
use home_hub_rs::{
    Bulb, Color, ColorCommand, Delivery, Endpoint, Error, Function, Mode, Packet, RampHeader,
    Room, Speed, encode, send_bulb_command,
};

/// Accept `count` connections and return what each one wrote.
fn listen(count: usize) -> (u16, JoinHandle<Vec<Vec<u8>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let handle = thread::spawn(move || {
        (0..count)
            .map(|_| {
                let (mut stream, _) = listener.accept().unwrap();
                let mut bytes = Vec::new();
                stream.read_to_end(&mut bytes).unwrap();
                bytes
            })
            .collect()
    });
    (port, handle)
}

fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

#[test]
fn test_change_color_writes_one_packet() {
    let (port, server) = listen(1);
    let bulb = Bulb::with_endpoint(Endpoint::new("127.0.0.1", port));
    let command = ColorCommand::color(Color::rgb(255, 0, 0)).with_brightness(128);

    let delivery = block_on(bulb.change_color(&command)).unwrap();
    assert!(delivery.is_sent());

    let received = server.join().unwrap();
    assert_eq!(received, vec![vec![0x31, 0x80, 0x00, 0x00, 0x00, 0xf0, 0x0f, 0xb0]]);
    assert_eq!(received[0], encode(&command).unwrap().as_bytes());
    assert!(Packet::parse(&received[0]).is_ok());

    let history = block_on(bulb.history());
    assert_eq!(history.summary().sent_count, 1);
}

#[test]
fn test_function_packet_over_the_wire() {
    let (port, server) = listen(1);
    let command = ColorCommand::function(Function::try_from(37).unwrap(), Speed::create(10).unwrap());
    let delivery = block_on(send_bulb_command(&Endpoint::new("127.0.0.1", port), &command)).unwrap();
    assert!(delivery.is_sent());
    assert_eq!(server.join().unwrap(), vec![vec![0x61, 0x25, 0x0a, 0x0f, 0x9f]]);
}

#[test]
fn test_unreachable_bulb_is_not_an_error() {
    let bulb = Bulb::with_endpoint(Endpoint::new("127.0.0.1", closed_port()));
    let delivery = block_on(bulb.change_color(&ColorCommand::white(10))).unwrap();
    assert!(matches!(delivery, Delivery::Failed(_)));

    let history = block_on(bulb.history());
    assert_eq!(history.summary().failed_count, 1);
    assert!(history.last_error().is_some());
}

#[test]
fn test_invalid_command_fails_before_io() {
    let bulb = Bulb::with_endpoint(Endpoint::new("127.0.0.1", closed_port()));
    let command = ColorCommand::raw(Color::new(), 255, Mode::Function, Some(39), Speed::new());
    let result = block_on(bulb.change_color(&command));
    assert!(matches!(result, Err(Error::UnsupportedFunction(39))));
    assert!(block_on(bulb.history()).is_empty());
}

#[test]
fn test_fade_out_is_strictly_decreasing() {
    let (port, server) = listen(51);
    let bulb = Bulb::with_endpoint(Endpoint::new("127.0.0.1", port));
    let start = ColorCommand::white(255);

    let report = block_on(bulb.fade(Some(&start), None, 5, RampHeader::Color)).unwrap();
    assert_eq!(report.sent, 51);
    assert_eq!(report.failed, 0);

    let packets = server.join().unwrap();
    assert_eq!(packets.len(), 51);
    let whites: Vec<u8> = packets
        .iter()
        .map(|bytes| {
            let packet = Packet::parse(bytes).unwrap();
            assert_eq!(packet.header(), 0x31);
            bytes[4]
        })
        .collect();
    assert_eq!(whites[0], 255);
    assert_eq!(*whites.last().unwrap(), 5);
    assert!(whites.windows(2).all(|w| w[0] > w[1]));
}

#[test]
fn test_fade_in_with_camera_header() {
    let (port, server) = listen(3);
    let bulb = Bulb::with_endpoint(Endpoint::new("127.0.0.1", port));
    let stop = ColorCommand::color(Color::rgb(0, 0, 255));

    let report = block_on(bulb.fade(None, Some(&stop), 100, RampHeader::Camera)).unwrap();
    assert_eq!(report.total(), 3);

    let blues: Vec<u8> = server
        .join()
        .unwrap()
        .iter()
        .map(|bytes| {
            assert_eq!(bytes[0], 0x41);
            bytes[3]
        })
        .collect();
    assert_eq!(blues, vec![0, 100, 200]);
}

#[test]
fn test_fade_rejects_zero_step() {
    let bulb = Bulb::new("127.0.0.1");
    let result = block_on(bulb.fade(Some(&ColorCommand::white(255)), None, 0, RampHeader::Color));
    assert!(matches!(result, Err(Error::InvalidStep)));
}

#[test]
fn test_room_sends_to_every_bulb() {
    let (first_port, first) = listen(1);
    let (second_port, second) = listen(1);
    let mut room = Room::new("Office");
    room.add_bulb(Bulb::with_endpoint(Endpoint::new("127.0.0.1", first_port)))
        .unwrap();
    room.add_bulb(Bulb::with_endpoint(Endpoint::new("127.0.0.1", second_port)))
        .unwrap();

    let command = ColorCommand::white(200);
    let deliveries = block_on(room.change_color(&command)).unwrap();
    assert!(deliveries.iter().all(Delivery::is_sent));

    let expected = encode(&command).unwrap().as_bytes().to_vec();
    assert_eq!(first.join().unwrap(), vec![expected.clone()]);
    assert_eq!(second.join().unwrap(), vec![expected]);
}

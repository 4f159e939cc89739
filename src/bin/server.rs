// Echoes everything a single client sends, then closes its side once the client has finished.

static EVENT_TIMEOUT: std::time::Duration = std::time::Duration::from_millis(1000);

fn main() {
    env_logger::init();

    let bind_address = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "127.0.0.1:8888".to_string());

    let mut stream =
        bramble::udp::Stream::listen(bind_address.as_str()).expect("failed to create stream");

    println!("listening on {}", stream.local_addr());

    loop {
        while let Some(event) = stream.wait_event_timeout(EVENT_TIMEOUT) {
            match event {
                bramble::udp::Event::Connect => {
                    println!("udp::Event::Connect {:?}", stream.peer_addr());
                }
                bramble::udp::Event::Receive(bytes) => {
                    println!("udp::Event::Receive {:02X?}", bytes);

                    let written = stream.write(&bytes);

                    if written < bytes.len() {
                        println!("outbound stream full, dropped {} bytes", bytes.len() - written);
                    }
                }
                bramble::udp::Event::Disconnect => {
                    println!("udp::Event::Disconnect");

                    stream.shutdown_write();
                }
                bramble::udp::Event::Error(kind) => {
                    println!("udp::Event::Error {}", kind);
                    return;
                }
            }
        }

        if !stream.active() {
            println!("closed");
            return;
        }
    }
}

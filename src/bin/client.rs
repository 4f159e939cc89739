// Sends a message to the echo server and prints what comes back.

static EVENT_TIMEOUT: std::time::Duration = std::time::Duration::from_millis(1000);

fn main() {
    env_logger::init();

    let mut args = std::env::args().skip(1);

    let server_address = args.next().unwrap_or_else(|| "127.0.0.1:8888".to_string());
    let message = args.next().unwrap_or_else(|| "hello, bramble".to_string());

    let mut stream =
        bramble::udp::Stream::connect(server_address.as_str()).expect("failed to create stream");

    let mut echoed = Vec::new();

    loop {
        while let Some(event) = stream.wait_event_timeout(EVENT_TIMEOUT) {
            match event {
                bramble::udp::Event::Connect => {
                    println!("udp::Event::Connect");

                    stream.write(message.as_bytes());
                    stream.shutdown_write();
                }
                bramble::udp::Event::Receive(bytes) => {
                    println!("udp::Event::Receive {:02X?}", bytes);

                    echoed.extend_from_slice(&bytes);
                }
                bramble::udp::Event::Disconnect => {
                    println!("udp::Event::Disconnect");
                    println!("echo: {}", String::from_utf8_lossy(&echoed));
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

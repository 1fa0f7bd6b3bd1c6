//! End-to-end tests over a real TCP loopback socket, exercising the
//! server-side greeting/dispatch edge cases (spec §4.3).

use std::time::Duration;

use logline_proto::server::{Server, ServerConfig};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

async fn start_server() -> (std::net::SocketAddr, tokio::sync::oneshot::Sender<()>) {
    let server = Server::bind("127.0.0.1:0", ServerConfig::default())
        .await
        .unwrap();
    let addr = server.local_addr().unwrap();
    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel();
    tokio::spawn(async move {
        server
            .run(
                |_channel| {},
                async {
                    let _ = stop_rx.await;
                },
            )
            .await;
    });
    (addr, stop_tx)
}

async fn read_line(reader: &mut (impl AsyncBufReadExt + Unpin)) -> String {
    let mut line = String::new();
    tokio::time::timeout(Duration::from_secs(5), reader.read_line(&mut line))
        .await
        .expect("timed out waiting for a line")
        .expect("read failed");
    line.trim_end_matches(['\r', '\n']).to_owned()
}

#[tokio::test]
async fn first_operational_line_after_greeting_is_dispatched() {
    let (addr, stop) = start_server().await;
    let stream = TcpStream::connect(addr).await.unwrap();
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    // Drain the server's own greeting.
    let greeting = read_line(&mut reader).await;
    assert!(greeting.contains("HELLO"));

    // No greeting of our own: this line is both the end of the handshake
    // and the first operational command, per spec §4.3.
    write_half
        .write_all(b"[a01] SET PROCESS_ID 1234\n")
        .await
        .unwrap();

    let reply = read_line(&mut reader).await;
    assert_eq!(reply, "[a01] OK");

    let _ = stop.send(());
}

#[tokio::test]
async fn malformed_command_id_gets_a_framing_error_not_nok() {
    let (addr, stop) = start_server().await;
    let stream = TcpStream::connect(addr).await.unwrap();
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    let greeting = read_line(&mut reader).await;
    assert!(greeting.contains("HELLO"));

    write_half.write_all(b"[a-1] SET X\n").await.unwrap();

    let reply = read_line(&mut reader).await;
    assert_eq!(reply, "ERROR malformed_id ([a-1] SET X)");

    let _ = stop.send(());
}

#[tokio::test]
async fn overlong_line_is_reported_and_connection_keeps_working() {
    let (addr, stop) = start_server().await;
    let stream = TcpStream::connect(addr).await.unwrap();
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    let greeting = read_line(&mut reader).await;
    assert!(greeting.contains("HELLO"));

    // No newline: this never completes as a logical line on its own, so the
    // decoder's max-length ceiling (32768 chars) is what trips here.
    let overlong = "a".repeat(40_000);
    write_half.write_all(overlong.as_bytes()).await.unwrap();
    write_half.write_all(b"\n").await.unwrap();

    let reply = read_line(&mut reader).await;
    assert!(reply.starts_with("ERROR line_too_long ("));

    // The connection must still be usable afterward.
    write_half
        .write_all(b"[a02] SET PROCESS_ID 1\n")
        .await
        .unwrap();
    let reply = read_line(&mut reader).await;
    assert_eq!(reply, "[a02] OK");

    let _ = stop.send(());
}

// beacond - A line-oriented directory/tracker service for a peer-to-peer file-sharing overlay
// Copyright (C) 2012  Justin Hill, Gordon Keesler, Matt Layher
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

use std::time::Duration;

use beacond::{Config, Server};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::time::timeout;

async fn start_server() -> (Server, std::net::SocketAddr) {
    let mut config = Config::default();
    config.general.bind_address = "127.0.0.1".to_string();
    config.general.port = 0;

    let server = Server::bind(&config).await.expect("bind should succeed");
    let addr = server.local_addr().expect("listener should have a local addr");
    (server, addr)
}

/// Drives `serve` in the background for the duration of one test.
fn spawn_serving(server: Server) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let never = std::future::pending::<()>();
        let _ = server.serve(never).await;
    })
}

async fn connect(addr: std::net::SocketAddr) -> (BufReader<tokio::net::tcp::OwnedReadHalf>, OwnedWriteHalf) {
    let stream = TcpStream::connect(addr).await.unwrap();
    let (read_half, write_half) = stream.into_split();
    (BufReader::new(read_half), write_half)
}

async fn read_line(reader: &mut (impl AsyncBufReadExt + Unpin)) -> String {
    let mut line = String::new();
    timeout(Duration::from_secs(2), reader.read_line(&mut line))
        .await
        .expect("read should not time out")
        .expect("read should succeed");
    line.trim_end_matches(['\r', '\n']).to_string()
}

async fn write_line(writer: &mut OwnedWriteHalf, line: &str) {
    writer.write_all(line.as_bytes()).await.unwrap();
    writer.write_all(b"\n").await.unwrap();
}

#[tokio::test]
async fn handshake_then_quit() {
    let (server, addr) = start_server().await;
    let _handle = spawn_serving(server);

    let (mut reader, mut writer) = connect(addr).await;
    let _banner = read_line(&mut reader).await;

    write_line(&mut writer, "CONNECT").await;
    assert_eq!(read_line(&mut reader).await, "HELLO");

    write_line(&mut writer, "QUIT").await;
    assert_eq!(read_line(&mut reader).await, "GOODBYE");
}

#[tokio::test]
async fn add_list_delete_list() {
    let (server, addr) = start_server().await;
    let _handle = spawn_serving(server);

    let (mut reader, mut writer) = connect(addr).await;
    let _banner = read_line(&mut reader).await;
    write_line(&mut writer, "CONNECT").await;
    assert_eq!(read_line(&mut reader).await, "HELLO");

    write_line(&mut writer, "ADD song.mp3 deadbeef 4096").await;
    assert_eq!(read_line(&mut reader).await, "OK");

    write_line(&mut writer, "LIST").await;
    assert_eq!(read_line(&mut reader).await, "song.mp3 4096");
    assert_eq!(read_line(&mut reader).await, "OK");

    write_line(&mut writer, "DELETE song.mp3 deadbeef").await;
    assert_eq!(read_line(&mut reader).await, "OK");

    write_line(&mut writer, "LIST").await;
    assert_eq!(read_line(&mut reader).await, "OK");
}

#[tokio::test]
async fn duplicate_add_is_rejected() {
    let (server, addr) = start_server().await;
    let _handle = spawn_serving(server);

    let (mut reader, mut writer) = connect(addr).await;
    let _banner = read_line(&mut reader).await;
    write_line(&mut writer, "CONNECT").await;
    assert_eq!(read_line(&mut reader).await, "HELLO");

    write_line(&mut writer, "ADD a.bin h1 10").await;
    assert_eq!(read_line(&mut reader).await, "OK");

    write_line(&mut writer, "ADD a.bin h1 10").await;
    assert_eq!(read_line(&mut reader).await, "ERROR A4");
}

#[tokio::test]
async fn argument_validation_errors() {
    let (server, addr) = start_server().await;
    let _handle = spawn_serving(server);

    let (mut reader, mut writer) = connect(addr).await;
    let _banner = read_line(&mut reader).await;
    write_line(&mut writer, "CONNECT").await;
    assert_eq!(read_line(&mut reader).await, "HELLO");

    write_line(&mut writer, "ADD").await;
    assert_eq!(read_line(&mut reader).await, "ERROR A1");

    write_line(&mut writer, "ADD a.bin").await;
    assert_eq!(read_line(&mut reader).await, "ERROR A2");

    write_line(&mut writer, "ADD a.bin h1 notanumber").await;
    assert_eq!(read_line(&mut reader).await, "ERROR A3");

    write_line(&mut writer, "DELETE").await;
    assert_eq!(read_line(&mut reader).await, "ERROR D1");

    write_line(&mut writer, "DELETE a.bin").await;
    assert_eq!(read_line(&mut reader).await, "ERROR D2");

    write_line(&mut writer, "REQUEST").await;
    assert_eq!(read_line(&mut reader).await, "ERROR R1");

    write_line(&mut writer, "FROBNICATE").await;
    assert_eq!(read_line(&mut reader).await, "ERROR C0");
}

#[tokio::test]
async fn request_aggregates_peers_sorted() {
    let (server, addr) = start_server().await;
    let _handle = spawn_serving(server);

    let (mut r1, mut w1) = connect(addr).await;
    let _ = read_line(&mut r1).await;
    write_line(&mut w1, "CONNECT").await;
    assert_eq!(read_line(&mut r1).await, "HELLO");
    write_line(&mut w1, "ADD report.pdf h1 1000").await;
    assert_eq!(read_line(&mut r1).await, "OK");

    let (mut r2, mut w2) = connect(addr).await;
    let _ = read_line(&mut r2).await;
    write_line(&mut w2, "CONNECT").await;
    assert_eq!(read_line(&mut r2).await, "HELLO");
    write_line(&mut w2, "ADD report.pdf h2 1000").await;
    assert_eq!(read_line(&mut r2).await, "OK");

    write_line(&mut w1, "REQUEST report.pdf").await;
    let line1 = read_line(&mut r1).await;
    let line2 = read_line(&mut r1).await;
    let ok = read_line(&mut r1).await;

    assert_eq!(ok, "OK");
    assert_ne!(line1, line2);
    assert!(line1.ends_with(" 1000") && line2.ends_with(" 1000"));
    // Replies are sorted ascending by peer address string, matching the catalog's order.
    let mut sorted = vec![line1.clone(), line2.clone()];
    sorted.sort();
    assert_eq!(vec![line1, line2], sorted);
}

#[tokio::test]
async fn disconnect_without_quit_revokes_announcements() {
    let (server, addr) = start_server().await;
    let _handle = spawn_serving(server);

    {
        let (mut reader, mut writer) = connect(addr).await;
        let _banner = read_line(&mut reader).await;
        write_line(&mut writer, "CONNECT").await;
        assert_eq!(read_line(&mut reader).await, "HELLO");
        write_line(&mut writer, "ADD ghost.bin h1 1").await;
        assert_eq!(read_line(&mut reader).await, "OK");
        // reader/writer drop here without sending QUIT, closing the socket.
    }

    tokio::time::sleep(Duration::from_millis(200)).await;

    let (mut reader, mut writer) = connect(addr).await;
    let _banner = read_line(&mut reader).await;
    write_line(&mut writer, "CONNECT").await;
    assert_eq!(read_line(&mut reader).await, "HELLO");

    write_line(&mut writer, "REQUEST ghost.bin").await;
    assert_eq!(read_line(&mut reader).await, "OK");
}

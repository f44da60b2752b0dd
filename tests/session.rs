mod common;

use common::FakeNetwork;
use lcd_network_menu::{
    config::SessionConfig,
    session::{Session, SessionState},
};
use std::time::Duration;
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, duplex},
    time::Instant,
};

const GREETING: &[u8] = b"connect LCDproc 0.5.9 protocol 0.3 lcd wid 20 hgt 4 cellwid 5 cellhgt 8\n";
const ROOT_PLACEHOLDER_GONE: &str = "menu_del_item \"\" \"_dummy\"";

fn config(refresh_interval: Option<Duration>) -> SessionConfig {
    SessionConfig {
        client_name: "Netzwerk".to_string(),
        refresh_interval,
        scan_settle: Duration::from_secs(4),
    }
}

async fn read_until<R: AsyncBufRead + Unpin>(lines: &mut Lines<R>, last: &str) -> Vec<String> {
    let mut received = Vec::new();
    while let Some(line) = lines.next_line().await.unwrap() {
        let done = line == last;
        received.push(line);
        if done {
            break;
        }
    }
    received
}

#[tokio::test]
async fn handshake_builds_main_menu() {
    let network = FakeNetwork::fixture();
    let (daemon, client) = duplex(4096);
    let mut session = Session::new(client, network, config(None));

    let daemon = async move {
        let (read, mut write) = tokio::io::split(daemon);
        let mut lines = BufReader::new(read).lines();

        assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("hello"));
        write.write_all(GREETING).await.unwrap();

        read_until(&mut lines, ROOT_PLACEHOLDER_GONE).await
    };

    let (result, received) = tokio::join!(session.run(), daemon);
    result.unwrap();

    assert_eq!(received[0], "client_set -name \"Netzwerk\"");
    let adds: Vec<&str> = received
        .iter()
        .map(String::as_str)
        .filter(|line| line.starts_with("menu_add_item ") && !line.contains("\"_dummy\""))
        .collect();
    assert_eq!(
        adds,
        vec![
            "menu_add_item \"\" \"eth0\" menu \"eth0 up\"",
            "menu_add_item \"\" \"wlan0\" menu \"wlan0 up\"",
        ]
    );
    assert_eq!(received.last().map(String::as_str), Some(ROOT_PLACEHOLDER_GONE));
    assert_eq!(session.state(), SessionState::Disconnected);
}

#[tokio::test]
async fn events_before_greeting_are_ignored() {
    let network = FakeNetwork::fixture();
    let (daemon, client) = duplex(4096);
    let mut session = Session::new(client, network.clone(), config(None));

    let daemon = async move {
        let (read, mut write) = tokio::io::split(daemon);
        let mut lines = BufReader::new(read).lines();

        assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("hello"));
        let mut early = b"menuevent enter _client_menu_\n".to_vec();
        early.extend_from_slice(GREETING);
        write.write_all(&early).await.unwrap();

        read_until(&mut lines, ROOT_PLACEHOLDER_GONE).await
    };

    let (result, received) = tokio::join!(session.run(), daemon);
    result.unwrap();

    assert_eq!(received[0], "client_set -name \"Netzwerk\"");
    assert_eq!(network.calls(), vec!["list_interfaces"]);
}

#[tokio::test(start_paused = true)]
async fn scan_results_arrive_after_settle_delay() {
    let network = FakeNetwork::fixture();
    let (daemon, client) = duplex(4096);
    let mut session = Session::new(client, network.clone(), config(None));

    let daemon = async move {
        let (read, mut write) = tokio::io::split(daemon);
        let mut lines = BufReader::new(read).lines();

        lines.next_line().await.unwrap();
        write.write_all(GREETING).await.unwrap();
        read_until(&mut lines, ROOT_PLACEHOLDER_GONE).await;

        write.write_all(b"menuevent enter wlan0\n").await.unwrap();
        read_until(&mut lines, "menu_del_item \"\" \"wlan0_dummy\"").await;

        let started = Instant::now();
        write.write_all(b"menuevent enter wlan0_list\n").await.unwrap();
        let received = read_until(&mut lines, "menu_del_item \"\" \"wlan0_list_dummy\"").await;

        (started.elapsed(), received)
    };

    let (result, (elapsed, received)) = tokio::join!(session.run(), daemon);
    result.unwrap();

    assert!(elapsed >= Duration::from_secs(4), "results after {elapsed:?}");
    assert_eq!(
        received[0],
        "menu_set_item \"\" \"wlan0_list_dummy\" -text \"Scanning...\""
    );
    assert!(received.contains(&"menu_add_item \"wlan0_list\" \"wlan0_list_aa02\" menu \"Office\"".to_string()));

    let calls = network.calls();
    let requested = calls.iter().position(|call| call == "request_scan wlan0").unwrap();
    let listed = calls
        .iter()
        .position(|call| call == "list_access_points wlan0")
        .unwrap();
    assert!(requested < listed);
}

#[tokio::test(start_paused = true)]
async fn main_menu_is_refreshed_periodically() {
    let network = FakeNetwork::fixture();
    let (daemon, client) = duplex(4096);
    let mut session = Session::new(
        client,
        network.clone(),
        config(Some(Duration::from_secs(30))),
    );

    let daemon = {
        let network = network.clone();
        async move {
            let (read, mut write) = tokio::io::split(daemon);
            let mut lines = BufReader::new(read).lines();

            lines.next_line().await.unwrap();
            write.write_all(GREETING).await.unwrap();
            read_until(&mut lines, ROOT_PLACEHOLDER_GONE).await;

            let started = Instant::now();
            network.remove_interface("wlan0");
            read_until(&mut lines, "menu_del_item \"\" \"wlan0\"").await;

            started.elapsed()
        }
    };

    let (result, elapsed) = tokio::join!(session.run(), daemon);
    result.unwrap();

    assert!(elapsed >= Duration::from_secs(30), "refreshed after {elapsed:?}");
    let refreshes = network
        .calls()
        .iter()
        .filter(|call| *call == "list_interfaces")
        .count();
    assert_eq!(refreshes, 2);
}

//! End-to-end rendezvous against a real prober child process.
//!
//! Spawns the `probegridd prober` binary over a shared arena file, then
//! plays a requester process: signal, wait for a fresh cycle, and read
//! the published verdicts.

use std::io::Write;
use std::net::{TcpListener, UdpSocket};
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::sync::mpsc;
use std::time::{Duration, Instant};

use probe_core::{Liveness, NodeId};
use probegrid_arena::ProbeArena;
use probegrid_rendezvous::{
    CancellationToken, ProbeRequest, RendezvousCoordinator, UdpWakeSender,
};

/// Kills the prober child even when an assertion fails first.
struct ChildGuard(Child);

impl Drop for ChildGuard {
    fn drop(&mut self) {
        let _ = self.0.kill();
        let _ = self.0.wait();
    }
}

fn free_udp_port() -> u16 {
    UdpSocket::bind(("127.0.0.1", 0))
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

fn write_config(
    dir: &tempfile::TempDir,
    arena_path: &PathBuf,
    up_port: u16,
    down_port: u16,
    wake_port: u16,
) -> PathBuf {
    let config_path = dir.path().join("grid.toml");
    let mut file = std::fs::File::create(&config_path).unwrap();
    write!(
        file,
        r#"
[cluster]
arena_path = "{arena}"

[[cluster.nodes]]
id = 1
host = "127.0.0.1"
port = {up_port}

[[cluster.nodes]]
id = 2
host = "127.0.0.1"
port = {down_port}

[fault_detection]
probe_interval = "2s"
probe_timeout = "500ms"
poll_interval = "10ms"
wake_port = {wake_port}
"#,
        arena = arena_path.display(),
    )
    .unwrap();
    config_path
}

#[test]
fn requester_rendezvous_with_live_prober_process() {
    let dir = tempfile::tempdir().unwrap();
    let arena_path = dir.path().join("control.arena");

    // Node 1 gets a live listener; node 2 points at a port nothing
    // listens on.
    let up_listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let up_port = up_listener.local_addr().unwrap().port();
    let down_port = free_udp_port(); // nothing listens on TCP there
    let wake_port = free_udp_port();

    let config_path = write_config(&dir, &arena_path, up_port, down_port, wake_port);

    // The one-time init, ordered before anyone attaches.
    ProbeArena::create(&arena_path, 3).unwrap();

    let child = Command::new(env!("CARGO_BIN_EXE_probegridd"))
        .args(["prober", "--config"])
        .arg(&config_path)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();
    let _child = ChildGuard(child);

    // Wait for the child to claim the prober slot.
    let arena = Arc::new(ProbeArena::attach(&arena_path).unwrap());
    let deadline = Instant::now() + Duration::from_secs(15);
    while !arena.is_prober_running() {
        assert!(Instant::now() < deadline, "prober never registered");
        std::thread::sleep(Duration::from_millis(20));
    }
    assert!(!arena.prober_is_self());

    // Play the requester from a thread so a wedged rendezvous fails the
    // test instead of hanging it.
    let (tx, rx) = mpsc::channel();
    {
        let arena = arena.clone();
        std::thread::spawn(move || {
            let coordinator =
                RendezvousCoordinator::new(arena, UdpWakeSender::new(wake_port).unwrap())
                    .with_poll_interval(Duration::from_millis(10));
            let _ = tx.send(coordinator.request_fresh_probe(&CancellationToken::new()));
        });
    }
    let outcome = rx
        .recv_timeout(Duration::from_secs(20))
        .expect("rendezvous timed out")
        .unwrap();
    assert_eq!(outcome, ProbeRequest::Fresh);

    // The cycle the rendezvous proved fresh published these verdicts.
    let (started, completed) = arena.counters();
    assert!(completed >= 1);
    assert!(completed <= started);
    assert_eq!(arena.status_of(NodeId(1)).unwrap(), Liveness::Up);
    assert_eq!(arena.status_of(NodeId(2)).unwrap(), Liveness::Down);
    assert!(arena.status_version() >= 1);
}

#[test]
fn request_without_prober_is_a_noop() {
    let dir = tempfile::tempdir().unwrap();
    let arena_path = dir.path().join("control.arena");
    ProbeArena::create(&arena_path, 3).unwrap();

    let arena = Arc::new(ProbeArena::attach(&arena_path).unwrap());
    let coordinator = RendezvousCoordinator::new(
        arena.clone(),
        UdpWakeSender::new(free_udp_port()).unwrap(),
    )
    .with_poll_interval(Duration::from_millis(10));

    let outcome = coordinator
        .request_fresh_probe(&CancellationToken::new())
        .unwrap();

    assert_eq!(outcome, ProbeRequest::Skipped);
    assert_eq!(arena.counters(), (0, 0));
}

use std::collections::HashSet;
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use cmdlog::{CommandLog, DeviceConfig, DeviceError, Interrupted, Signal};

fn device(capacity: usize) -> CommandLog {
    CommandLog::new(DeviceConfig {
        capacity,
        ..DeviceConfig::default()
    })
    .unwrap()
}

#[test]
fn test_piecewise_writers_complete_one_command_each() {
    let writers = 16;
    let dev = device(64);
    let commands: Vec<String> = (0..writers)
        .map(|w| format!("writer-{w:02}-{}\n", "x".repeat(w)))
        .collect();

    thread::scope(|s| {
        for command in &commands {
            let dev = &dev;
            s.spawn(move || {
                let sig = Signal::new();
                for piece in command.as_bytes().chunks(3) {
                    assert_eq!(dev.write(piece, &sig), Ok(piece.len()));
                }
            });
        }
    });

    // Pieces of different writers share the pending buffer, but every
    // delimiter completes exactly one command and no byte is lost
    let live = dev.live_commands(&Signal::new()).unwrap();
    assert_eq!(live.len(), writers);
    for cmd in &live {
        assert_eq!(cmd.iter().filter(|&&b| b == b'\n').count(), 1);
        assert_eq!(cmd.last(), Some(&b'\n'));
    }
    let stored: usize = live.iter().map(Vec::len).sum();
    let written: usize = commands.iter().map(String::len).sum();
    assert_eq!(stored, written);
}

#[test]
fn test_single_chunk_writers_produce_exact_commands() {
    let writers = 32;
    let dev = device(writers);

    thread::scope(|s| {
        for w in 0..writers {
            let dev = &dev;
            s.spawn(move || {
                let command = format!("cmd {w} {}\n", "y".repeat(w * 3));
                assert_eq!(dev.write(command.as_bytes(), &Signal::new()), Ok(command.len()));
            });
        }
    });

    let live: HashSet<Vec<u8>> = dev
        .live_commands(&Signal::new())
        .unwrap()
        .into_iter()
        .collect();
    let expected: HashSet<Vec<u8>> = (0..writers)
        .map(|w| format!("cmd {w} {}\n", "y".repeat(w * 3)).into_bytes())
        .collect();
    assert_eq!(live, expected);
}

#[test]
fn test_eviction_under_concurrency_keeps_capacity() {
    let dev = device(5);

    thread::scope(|s| {
        for w in 0..8 {
            let dev = &dev;
            s.spawn(move || {
                for i in 0..50 {
                    let command = format!("{w}:{i}\n");
                    dev.write(command.as_bytes(), &Signal::new()).unwrap();
                }
            });
        }
    });

    let live = dev.live_commands(&Signal::new()).unwrap();
    assert_eq!(live.len(), 5);
    let total: usize = live.iter().map(Vec::len).sum();
    assert_eq!(dev.logical_len(&Signal::new()), Ok(total as u64));
}

#[test]
fn test_readers_see_whole_entries_only() {
    let dev = device(4);
    let commands = ["aaaa\n", "bbbbbbbb\n", "cc\n", "dddddddddddd\n"];

    thread::scope(|s| {
        let dev = &dev;
        s.spawn(move || {
            for round in 0..200 {
                let cmd = commands[round % commands.len()];
                dev.write(cmd.as_bytes(), &Signal::new()).unwrap();
            }
        });
        for _ in 0..4 {
            s.spawn(move || {
                for _ in 0..200 {
                    let mut pos = 0;
                    let mut buf = vec![0u8; 64];
                    let n = dev
                        .read(&mut pos, buf.as_mut_slice(), 64, &Signal::new())
                        .unwrap();
                    if n > 0 {
                        let got = &buf[..n];
                        assert!(commands.iter().any(|c| c.as_bytes() == got), "{got:?}");
                    }
                }
            });
        }
    });
}

/// Run `op` on another thread while a stalled reader holds the guard,
/// raising its signal once it has had time to block
///
/// `dev` must hold at least one command so the stalled read reaches the copy.
fn interrupt_while_guard_held<R: Send>(
    dev: &CommandLog,
    op: impl FnOnce(&Signal) -> R + Send,
) -> R {
    let signal = Signal::new();
    thread::scope(|s| {
        let (locked_tx, locked_rx) = mpsc::channel();
        let (done_tx, done_rx) = mpsc::channel::<()>();

        s.spawn(move || {
            let mut stalling = StallingSink {
                locked: Some(locked_tx),
                done: done_rx,
            };
            let mut pos = 0;
            let n = dev.read(&mut pos, &mut stalling, 1, &Signal::new()).unwrap();
            assert_eq!(n, 1);
        });
        locked_rx.recv().unwrap();

        let blocked_signal = signal.clone();
        let blocked = s.spawn(move || op(&blocked_signal));
        thread::sleep(Duration::from_millis(20));
        signal.raise();
        let result = blocked.join().unwrap();

        done_tx.send(()).unwrap();
        result
    })
}

#[test]
fn test_interrupted_write_leaves_device_unchanged() {
    let dev = device(10);
    let sig = Signal::new();
    dev.write(b"done\n", &sig).unwrap();
    dev.write(b"pending", &sig).unwrap();

    let result = interrupt_while_guard_held(&dev, |signal| dev.write(b" more\n", signal));

    assert_eq!(result, Err(DeviceError::Interrupted));
    assert_eq!(dev.pending_len(&sig), Ok(7));
    assert_eq!(dev.live_commands(&sig).unwrap(), vec![b"done\n".to_vec()]);

    // Retrying with a fresh signal goes through
    assert_eq!(dev.write(b" more\n", &sig), Ok(6));
}

#[test]
fn test_interrupted_read_does_not_advance() {
    let dev = device(10);
    dev.write(b"first\n", &Signal::new()).unwrap();

    let (result, pos, buf) = interrupt_while_guard_held(&dev, |signal| {
        let mut pos = 2;
        let mut buf = [0u8; 8];
        let result = dev.read(&mut pos, buf.as_mut_slice(), 8, signal);
        (result, pos, buf)
    });

    assert_eq!(result, Err(DeviceError::Interrupted));
    assert_eq!(pos, 2);
    assert_eq!(buf, [0u8; 8]);
}

#[test]
fn test_file_signal_interrupts_its_blocked_call() {
    let dev = device(10);
    dev.write(b"first\n", &Signal::new()).unwrap();
    let mut file = dev.open();
    file.seek(embedded_io::SeekFrom::Start(1)).unwrap();
    let file_signal = file.signal().clone();

    // The helper raises its own signal, the file's is raised alongside it
    let result = interrupt_while_guard_held(&dev, |signal| {
        thread::scope(|s| {
            let relay = s.spawn(|| {
                while !signal.is_raised() {
                    thread::sleep(Duration::from_millis(1));
                }
                file_signal.raise();
            });
            let result = file.read(&mut [0u8; 4]);
            relay.join().unwrap();
            result
        })
    });

    assert_eq!(result, Err(DeviceError::Interrupted));
    assert_eq!(file.tell(), 1);
}

/// Caller memory that stalls inside the device's critical section
struct StallingSink {
    locked: Option<mpsc::Sender<()>>,
    done: mpsc::Receiver<()>,
}

impl cmdlog::UserSink for StallingSink {
    fn len(&self) -> usize {
        1
    }

    fn copy_from(&mut self, _src: &[u8]) -> Result<(), cmdlog::TransferFault> {
        if let Some(locked) = self.locked.take() {
            locked.send(()).unwrap();
        }
        self.done.recv().unwrap();
        Ok(())
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_spawn_blocking_writers() {
    let dev = Arc::new(device(100));

    let tasks: Vec<_> = (0..20)
        .map(|i| {
            let dev = Arc::clone(&dev);
            tokio::task::spawn_blocking(move || {
                let mut file = dev.open();
                let n = file.write(format!("task {i}\n").as_bytes());
                dev.release(file);
                n
            })
        })
        .collect();
    for task in tasks {
        assert!(task.await.unwrap().is_ok());
    }

    assert_eq!(dev.live_commands(&Signal::new()).unwrap().len(), 20);
}

#[test]
fn test_interrupted_is_distinct_from_other_errors() {
    let err: DeviceError = Interrupted.into();
    assert!(err.is_retryable());
    assert_ne!(err, DeviceError::TransferFault);
}

//! Command log CLI demo
//!
//! Reads lines from stdin, stores each as a command, then prints the log.
//!
//! Usage: `cmdlog_demo [config.json]`

use std::sync::Arc;

use cmdlog::{CommandLog, DeviceConfig, DeviceError};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let config = match std::env::args().nth(1) {
        Some(path) => DeviceConfig::from_json(&std::fs::read_to_string(path)?)?,
        None => DeviceConfig::default(),
    };
    let delimiter = config.delimiter;
    let device = Arc::new(CommandLog::new(config)?);

    println!("Enter commands (empty line to quit):");
    write_all(Arc::clone(&device), delimiter).await?;

    let dump = tokio::task::spawn_blocking(move || dump_log(&device)).await??;
    print!("{dump}");
    Ok(())
}

async fn write_all(
    device: Arc<CommandLog>,
    delimiter: u8,
) -> Result<(), Box<dyn std::error::Error>> {
    let stdin = tokio::io::stdin();
    let reader = tokio::io::BufReader::new(stdin);
    let mut lines = tokio::io::AsyncBufReadExt::lines(reader);

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            break;
        }

        let mut command = line.into_bytes();
        command.push(delimiter);
        let device = Arc::clone(&device);
        // The device may block on its lock, keep it off the async workers
        let written = tokio::task::spawn_blocking(move || {
            let mut file = device.open();
            let result = embedded_io::Write::write_all(&mut file, &command);
            device.release(file);
            result
        })
        .await?;
        if let Err(e) = written {
            eprintln!("Write error: {e} (errno={})", e.errno());
        }
    }
    Ok(())
}

fn dump_log(device: &CommandLog) -> Result<String, DeviceError> {
    let mut file = device.open();
    let mut out = Vec::new();
    let mut buf = [0u8; 16];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        // `n` is the number of bytes the read put into `buf`
        #[allow(clippy::indexing_slicing)]
        let data = &buf[..n];
        out.extend_from_slice(data);
    }
    device.release(file);
    Ok(String::from_utf8_lossy(&out).into_owned())
}

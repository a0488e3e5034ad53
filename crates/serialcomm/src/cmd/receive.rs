use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::RecvTimeoutError;
use std::sync::Arc;
use std::time::Duration;

use serialcomm_link::{ChannelDelivery, Receiver};
use tracing::info;

use crate::cmd::ReceiveArgs;
use crate::exit::{link_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{print_message, OutputFormat};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

pub fn run(args: ReceiveArgs, format: OutputFormat) -> CliResult<i32> {
    let config = args.link.to_config(Some(&args.port))?;

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let (delivery, messages) = ChannelDelivery::channel();
    let receiver =
        Receiver::start(&config, delivery).map_err(|err| link_error("receiver start failed", err))?;
    info!(
        port = %config.port.display(),
        baud_rate = config.baud_rate,
        "waiting for frames"
    );

    let mut printed = 0usize;
    while running.load(Ordering::SeqCst) {
        match messages.recv_timeout(POLL_INTERVAL) {
            Ok(message) => {
                print_message(&message, format);
                printed = printed.saturating_add(1);
                if args.count.is_some_and(|count| printed >= count) {
                    break;
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                if !receiver.is_running() {
                    return Err(CliError::new(INTERNAL, "receiver worker exited unexpectedly"));
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    receiver
        .close()
        .map_err(|err| link_error("receiver shutdown failed", err))?;
    info!(received = printed, "receiver stopped");
    Ok(SUCCESS)
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}

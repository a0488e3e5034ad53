use serialcomm_link::{ChannelDelivery, Message, MessageDecoder, ReceiveLoop, Receiver, Sender};
use serialcomm_transport::SerialStream;
use tracing::info;

use crate::cmd::LoopbackArgs;
use crate::exit::{link_error, transport_error, CliError, CliResult, SUCCESS, TIMEOUT};
use crate::output::{print_message, OutputFormat};

pub fn run(args: LoopbackArgs, format: OutputFormat) -> CliResult<i32> {
    let config = args.link.to_config(None)?;

    let (near, far) =
        SerialStream::pair().map_err(|err| transport_error("socket pair failed", err))?;

    let (delivery, messages) = ChannelDelivery::channel();
    let receive_loop = ReceiveLoop::new(far, MessageDecoder, delivery, &config)
        .map_err(|err| link_error("socket pair setup failed", err))?;
    let receiver =
        Receiver::spawn(receive_loop).map_err(|err| link_error("receiver start failed", err))?;
    let mut sender =
        Sender::new(near, &config).map_err(|err| link_error("socket pair setup failed", err))?;

    for index in 0..args.count {
        let message = Message {
            request_id: format!("loopback-{index}"),
            ..Message::sample()
        };
        let report = sender
            .send_message(&message)
            .map_err(|err| link_error("send failed", err))?;
        let delivered = messages
            .recv_timeout(config.feedback_timeout)
            .map_err(|err| CliError::new(TIMEOUT, format!("delivery not observed: {err}")))?;
        info!(index, attempts = report.attempts, "loopback message delivered");
        print_message(&delivered, format);
    }

    receiver
        .close()
        .map_err(|err| link_error("receiver shutdown failed", err))?;
    Ok(SUCCESS)
}

use powerprims_frame::{Envelope, FrameConfig, MessageId};
use powerprims_rpc::Channel;
use serde::Serialize;

use crate::cmd::{parse_duration, CallArgs};
use crate::exit::{frame_error, rpc_error, CliError, CliResult, FAILURE, SUCCESS, USAGE};
use crate::output::{payload_preview, print_json, print_raw, table, OutputFormat};

#[derive(Serialize)]
struct ResponseOutput<'a> {
    type_id: &'a str,
    payload_size: usize,
    payload_hex: String,
}

pub fn run(args: CallArgs, format: OutputFormat) -> CliResult<i32> {
    MessageId::parse(&args.type_id).map_err(|err| frame_error("invalid type id", err))?;
    let payload = match &args.hex {
        Some(text) => decode_hex(text)?,
        None => Vec::new(),
    };

    let mut config = FrameConfig::default();
    if let Some(timeout) = &args.timeout {
        let timeout = parse_duration(timeout)?;
        config.read_timeout = Some(timeout);
        config.write_timeout = Some(timeout);
    }

    let channel = Channel::connect_with_config(&args.addr, config)
        .map_err(|err| rpc_error("connect failed", err))?;
    let response = channel
        .call_raw(&args.type_id, &payload)
        .map_err(|err| rpc_error("call failed", err))?;

    if let Some(message) = response.error_message() {
        return Err(CliError::new(FAILURE, format!("remote error: {message}")));
    }
    print_response(&response, format);
    Ok(SUCCESS)
}

fn decode_hex(text: &str) -> CliResult<Vec<u8>> {
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    hex::decode(compact).map_err(|err| CliError::new(USAGE, format!("--hex is not valid hex: {err}")))
}

fn print_response(response: &Envelope, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&ResponseOutput {
            type_id: &response.type_id,
            payload_size: response.payload.len(),
            payload_hex: hex::encode(&response.payload),
        }),
        OutputFormat::Table => {
            let mut out = table(vec!["TYPE", "SIZE", "PAYLOAD"]);
            out.add_row(vec![
                response.type_id.clone(),
                response.payload.len().to_string(),
                hex::encode(&response.payload),
            ]);
            println!("{out}");
        }
        OutputFormat::Pretty => {
            println!(
                "type={} size={} payload={}",
                response.type_id,
                response.payload.len(),
                payload_preview(&response.payload)
            );
        }
        OutputFormat::Raw => print_raw(&response.payload),
    }
}

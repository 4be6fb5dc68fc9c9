use std::error::Error;

use tabled::settings::{Panel, Style};
use tabled::{Table, Tabled};

use crate::drivers::ultimate_2c::{
    driver::PACKET_SIZE,
    event::{InputReport, AXES, BUTTONS},
    macros,
    state::GamepadState,
};

#[derive(Tabled)]
struct InputRow {
    input: String,
    value: String,
}

/// Decode a hex encoded packet the way the driver does for a freshly
/// attached gamepad. Shorter packets are padded with zeros. Returns `None`
/// if the packet carries no input data.
pub fn decode_packet(packet: &str) -> Result<Option<InputReport>, Box<dyn Error + Send + Sync>> {
    let packet: String = packet.split_whitespace().collect();
    let bytes = hex::decode(packet)?;
    if bytes.is_empty() || bytes.len() > PACKET_SIZE {
        return Err(format!("Packet must be 1 to {PACKET_SIZE} bytes long").into());
    }

    let mut buf = [0; PACKET_SIZE];
    buf[..bytes.len()].copy_from_slice(&bytes);

    let Some(state) = GamepadState::decode(&buf, &GamepadState::default())? else {
        return Ok(None);
    };
    let state = macros::apply(state);

    Ok(Some(InputReport::from(&state)))
}

pub fn handle_decode(packet: &str) -> Result<(), Box<dyn Error + Send + Sync>> {
    let Some(report) = decode_packet(packet)? else {
        println!("Not an input data report");
        return Ok(());
    };

    let mut rows = Vec::with_capacity(BUTTONS.len() + AXES.len());
    for button in BUTTONS {
        rows.push(InputRow {
            input: format!("{button:?}"),
            value: report.button(button).to_string(),
        });
    }
    for axis in AXES {
        rows.push(InputRow {
            input: format!("{axis:?}"),
            value: report.axis(axis).to_string(),
        });
    }

    let mut table = Table::new(rows);
    table
        .with(Style::modern_rounded())
        .with(Panel::header("Input Report"));
    println!("{table}");

    Ok(())
}

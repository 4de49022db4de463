use crate::cli::PortsArgs;
use crate::exit_codes;
use serde::Serialize;

#[derive(Serialize)]
struct PortEntry {
    name: String,
    kind: String,
}

fn describe(port_type: &tokio_serial::SerialPortType) -> String {
    match port_type {
        tokio_serial::SerialPortType::UsbPort(usb) => format!(
            "usb {:04x}:{:04x}{}",
            usb.vid,
            usb.pid,
            usb.product
                .as_deref()
                .map(|p| format!(" {}", p))
                .unwrap_or_default()
        ),
        tokio_serial::SerialPortType::BluetoothPort => "bluetooth".to_string(),
        tokio_serial::SerialPortType::PciPort => "pci".to_string(),
        tokio_serial::SerialPortType::Unknown => "unknown".to_string(),
    }
}

pub fn execute(args: PortsArgs) -> i32 {
    let ports = match tokio_serial::available_ports() {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Error: failed to enumerate serial ports: {}", e);
            return exit_codes::TRANSPORT_ERROR;
        }
    };

    let entries: Vec<PortEntry> = ports
        .iter()
        .map(|p| PortEntry {
            name: p.port_name.clone(),
            kind: describe(&p.port_type),
        })
        .collect();

    if args.json {
        match serde_json::to_string_pretty(&entries) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Error serializing port list: {}", e);
                return exit_codes::EXECUTION_ERROR;
            }
        }
    } else if entries.is_empty() {
        println!("No serial ports found");
    } else {
        for entry in &entries {
            println!("{:<24} {}", entry.name, entry.kind);
        }
    }

    exit_codes::SUCCESS
}

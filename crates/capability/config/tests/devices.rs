use std::path::PathBuf;

use domain::{DeviceType, TransportKind};
use lis_config::{ConfigError, load_devices};

fn write_temp(name: &str, contents: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("lis-config-{}-{name}.json", std::process::id()));
    std::fs::write(&path, contents).expect("write temp file");
    path
}

#[test]
fn devices_file_is_parsed() {
    let path = write_temp(
        "ok",
        r#"[
            {"id": 1, "name": "Trias", "type": "ANALYX_TRIA", "receive_port": "5100"},
            {"id": 2, "name": "NCC", "type": "NEOMEDICA_NCC_3300", "receive_port": "/dev/ttyUSB0", "baud_rate": 115200},
            {"id": 3, "type": "SOMETHING_NEW", "receive_port": "5200"}
        ]"#,
    );
    let devices = load_devices(&path).expect("devices");
    assert_eq!(devices.len(), 3);
    assert_eq!(devices[0].device_type, DeviceType::AnalyxTria);
    assert_eq!(devices[0].baud_rate, 9600);
    assert_eq!(devices[1].transport_kind(), TransportKind::Serial);
    assert_eq!(devices[1].baud_rate, 115200);
    assert_eq!(devices[2].transport_kind(), TransportKind::Unsupported);
    let _ = std::fs::remove_file(path);
}

#[test]
fn duplicate_ids_are_rejected() {
    let path = write_temp(
        "dup",
        r#"[
            {"id": 1, "type": "BA400", "receive_port": "5100"},
            {"id": 1, "type": "A15", "receive_port": "5101"}
        ]"#,
    );
    let err = load_devices(&path).expect_err("duplicate");
    assert!(matches!(err, ConfigError::Devices { .. }));
    assert!(err.to_string().contains("duplicate device id 1"));
    let _ = std::fs::remove_file(path);
}

#[test]
fn missing_file_is_reported() {
    let err = load_devices("/nonexistent/lis-devices.json").expect_err("missing");
    assert!(matches!(err, ConfigError::Devices { .. }));
}

use domain::{Device, DeviceType, ServerState, TransportKind};

#[test]
fn device_deserializes_from_config_json() {
    let json = r#"{"id": 7, "name": "Trias", "type": "ANALYX_TRIA", "receive_port": "5100"}"#;
    let device: Device = serde_json::from_str(json).expect("device");

    assert_eq!(device.id, 7);
    assert_eq!(device.device_type, DeviceType::AnalyxTria);
    assert_eq!(device.receive_port, "5100");
    assert_eq!(device.baud_rate, 9600);
    assert_eq!(device.transport_kind(), TransportKind::Tcp);
}

#[test]
fn unknown_device_type_is_unsupported() {
    let device_type = DeviceType::from("SOMETHING_NEW".to_string());
    assert_eq!(device_type, DeviceType::Unknown("SOMETHING_NEW".to_string()));
    assert_eq!(device_type.transport_kind(), TransportKind::Unsupported);
    assert_eq!(device_type.as_str(), "SOMETHING_NEW");
}

#[test]
fn serial_and_non_hl7_types_are_classified() {
    assert_eq!(
        DeviceType::NeomedicaNcc3300.transport_kind(),
        TransportKind::Serial
    );
    assert_eq!(DeviceType::Abbott.transport_kind(), TransportKind::Unsupported);
    assert_eq!(
        String::from(DeviceType::VerifyU120),
        "VERIFY_U120".to_string()
    );
}

#[test]
fn server_state_displays_wire_name() {
    assert_eq!(ServerState::NoServer.to_string(), "NO_SERVER");
    assert_eq!(ServerState::Serving.as_str(), "SERVING");
}

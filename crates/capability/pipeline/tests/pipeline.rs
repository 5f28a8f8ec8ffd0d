use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::NaiveDate;
use domain::{CanonicalMessage, DeviceType, Specimen};
use lis_hl7::PipeCodec;
use lis_pipeline::{AnalyzerPort, DeviceProfile, PipelineError, PortError, ProtocolPipeline};

const TRIAS_ORU: &[u8] = include_bytes!("../../hl7/tests/fixtures/trias_oru_r01.hl7");

#[derive(Default)]
struct RecordingPort {
    received: Mutex<Vec<CanonicalMessage>>,
    orders: Vec<Specimen>,
    fail: bool,
}

#[async_trait]
impl AnalyzerPort for RecordingPort {
    async fn process_oru_r01(&self, message: CanonicalMessage) -> Result<(), PortError> {
        if self.fail {
            return Err(PortError::new("store unavailable"));
        }
        self.received.lock().expect("lock").push(message);
        Ok(())
    }

    async fn process_orm_o01(&self, message: CanonicalMessage) -> Result<Vec<Specimen>, PortError> {
        self.received.lock().expect("lock").push(message);
        Ok(self.orders.clone())
    }
}

fn pipeline(device_type: DeviceType, port: Arc<RecordingPort>) -> ProtocolPipeline {
    let profile = DeviceProfile::for_device_type(&device_type).expect("hl7 profile");
    ProtocolPipeline::new(profile, Arc::new(PipeCodec::new()), port)
}

fn fixed_now() -> chrono::NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 6, 10)
        .and_then(|d| d.and_hms_opt(19, 30, 0))
        .expect("time")
}

fn lines(reply: &[u8]) -> Vec<String> {
    String::from_utf8(reply.to_vec())
        .expect("utf8")
        .split('\r')
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

#[tokio::test]
async fn trias_fixture_round_trip() {
    let port = Arc::new(RecordingPort::default());
    let pipeline = pipeline(DeviceType::AnalyxTria, port.clone());

    let reply = pipeline
        .handle_at(TRIAS_ORU, fixed_now())
        .await
        .expect("ack");

    let received = port.received.lock().expect("lock");
    assert_eq!(received.len(), 1);
    let message = &received[0];
    let obx_lines = std::str::from_utf8(TRIAS_ORU)
        .expect("utf8")
        .split(['\r', '\n'])
        .filter(|l| l.starts_with("OBX|"))
        .count();
    assert_eq!(message.result_count(), obx_lines);
    assert!(
        message
            .specimens
            .iter()
            .flat_map(|s| &s.observation_results)
            .all(|r| !r.test_code.is_empty())
    );
    let wbc = &message.specimens[0].observation_results[0];
    assert_eq!(wbc.test_code, "WBC");
    assert_eq!(wbc.values, vec!["7.56".to_string()]);
    assert_eq!(wbc.unit, "10^9/L");
    assert_eq!(message.specimens[0].barcode, "9");

    let ack = lines(&reply);
    assert_eq!(ack.len(), 2);
    assert!(ack[0].starts_with("MSH|^~\\&|LIS|Lab01|"));
    assert!(ack[0].contains("|ACK^R01|391|P|2.3.1"));
    assert_eq!(ack[1], "MSA|AA|391");
}

#[tokio::test]
async fn pid_identifier_wins_over_obr_filler() {
    let port = Arc::new(RecordingPort::default());
    let pipeline = pipeline(DeviceType::Ba400, port.clone());
    let frame = b"MSH|^~\\&|BA400|LAB|||20250101120000||ORU^R01^ORU_R01|77|P|2.5.1\rPID|1||WBL001||Doe^John\rOBR|1||INTERNAL42|GLU\rOBX|1|NM|GLU^Glucose||5.4|mmol/L|3.9-6.1|N|||F";

    pipeline.handle_at(frame, fixed_now()).await.expect("ack");

    let received = port.received.lock().expect("lock");
    assert_eq!(received[0].specimens[0].barcode, "WBL001");
    assert_eq!(received[0].patient.last_name, "Doe");
    assert_eq!(received[0].specimens[0].observation_results[0].abnormal_flag, "N");
}

#[tokio::test]
async fn wondfo_prefix_barcode_and_embedded_unit() {
    let port = Arc::new(RecordingPort::default());
    let pipeline = pipeline(DeviceType::Wondfo, port.clone());
    let frame = b"\x0bMSH|^~\\&|Wondfo|FIA|||20250102030405||ORU^R01|W9|P|2.4\\nPID|1||12^^^^MR||SER2025001^Lee\\nOBR|1|||PCT\\nOBX|1|NM|PCT^Procalcitonin||0.42 ng/mL||0-0.5||||F\x1c\r";

    let reply = pipeline.handle_at(frame, fixed_now()).await.expect("ack");

    let received = port.received.lock().expect("lock");
    let specimen = &received[0].specimens[0];
    assert_eq!(specimen.barcode, "SER2025001");
    assert_eq!(specimen.observation_results[0].values, vec!["0.42".to_string()]);
    assert_eq!(specimen.observation_results[0].unit, "ng/mL");

    let ack = lines(&reply);
    assert!(ack[0].starts_with("MSH|^~\\&|Wondfo|FIA|LIS|Lab01|"));
    assert!(ack[0].ends_with("|NE|NE|CHN|UTF8|||LAB-28^IHE"));
    assert_eq!(ack[1], "MSA|AA|W9");
}

#[tokio::test]
async fn edan_quirks_allow_decoding() {
    let port = Arc::new(RecordingPort::default());
    let pipeline = pipeline(DeviceType::EdanH30, port.clone());
    let frame = b"\x0bMSH|^~\\&|EDAN|H30|||20250102030405||ORU^R01|E1|P|2.4\rPID|1|S-100\rOBR|1||S-100|CBC||Auto\rOBX|1|NM|WBC||6.1|10\\S\\9/L|3.5^9.5||||F|20250101XX\x1c\r";

    let reply = pipeline.handle_at(frame, fixed_now()).await.expect("ack");

    let received = port.received.lock().expect("lock");
    let result = &received[0].specimens[0].observation_results[0];
    assert_eq!(result.unit, "10e9/L");
    assert_eq!(result.reference_range, "3.5^9.5");
    assert_eq!(received[0].specimens[0].barcode, "S-100");
    assert!(lines(&reply)[0].contains("|2.4|||NE|NE|ID|UTF8|||LAB-28^IHE"));
}

#[tokio::test]
async fn order_is_answered_with_orr() {
    let port = Arc::new(RecordingPort {
        orders: vec![Specimen {
            barcode: "B100".into(),
            observation_results: Vec::new(),
            observation_requests: vec![domain::ObservationRequest {
                test_code: "GLU".into(),
                description: "Glucose".into(),
                requested_at: None,
            }],
        }],
        ..RecordingPort::default()
    });
    let pipeline = pipeline(DeviceType::AnalyxTria, port.clone());
    let frame = b"MSH|^~\\&|TRIAS|LAB|||20250101120000||ORM^O01|555|P|2.3.1\rPID|1|P1||Doe^Jane||19800101|F\rORC|NW||B100\rOBR|1||B100|GLU^Glucose";

    let reply = pipeline.handle_at(frame, fixed_now()).await.expect("orr");

    let received = port.received.lock().expect("lock");
    assert_eq!(received[0].specimens[0].barcode, "B100");
    assert_eq!(received[0].specimens[0].observation_requests[0].test_code, "GLU");

    let orr = lines(&reply);
    assert!(orr[0].contains("|ORR^O02|555|P|2.3.1"));
    assert_eq!(orr[1], "MSA|AA|555|Message accepted");
    assert_eq!(orr[2], "PID|1|P1||Doe^Jane||19800101|F");
    assert!(orr[3].starts_with("ORC|AF|1|B100|"));
    assert!(orr[4].ends_with("|HM"));
}

#[tokio::test]
async fn order_without_returned_specimens_is_not_acked() {
    let port = Arc::new(RecordingPort::default());
    let pipeline = pipeline(DeviceType::AnalyxTria, port);
    let frame = b"MSH|^~\\&|TRIAS|LAB|||20250101120000||ORM^O01|556|P|2.3.1\rORC|NW||B1\rOBR|1||B1|GLU";

    let err = pipeline.handle_at(frame, fixed_now()).await.expect_err("no ack");
    assert!(matches!(err, PipelineError::Process(_)));
}

#[tokio::test]
async fn failures_produce_no_ack() {
    let pipeline_ok = pipeline(DeviceType::Ba200, Arc::new(RecordingPort::default()));

    let err = pipeline_ok.handle_at(b"\r\n", fixed_now()).await.expect_err("frame");
    assert!(matches!(err, PipelineError::Frame(_)));

    let err = pipeline_ok
        .handle_at(b"PID|1|X\rOBX|1|NM|A||1", fixed_now())
        .await
        .expect_err("decode");
    assert!(matches!(err, PipelineError::Decode(_)));

    let err = pipeline_ok
        .handle_at(
            b"MSH|^~\\&|BA200|LAB|||20250101||ORU^R01|1|P|2.5.1\rPID|1|X",
            fixed_now(),
        )
        .await
        .expect_err("mapping");
    assert!(matches!(err, PipelineError::Mapping(_)));

    let failing = pipeline(
        DeviceType::Ba200,
        Arc::new(RecordingPort {
            fail: true,
            ..RecordingPort::default()
        }),
    );
    let err = failing
        .handle_at(
            b"MSH|^~\\&|BA200|LAB|||20250101||ORU^R01|1|P|2.5.1\rOBR|1||B1\rOBX|1|NM|A||1",
            fixed_now(),
        )
        .await
        .expect_err("process");
    assert!(matches!(err, PipelineError::Process(_)));
}

use std::sync::Arc;

use domain::DeviceType;
use lis_gateway::StoreAnalyzerPort;
use lis_hl7::PipeCodec;
use lis_pipeline::{DeviceProfile, PipelineError, ProtocolPipeline};
use lis_storage::{InMemoryResultStore, ResultStore};

fn pipeline(device_type: DeviceType, store: Arc<InMemoryResultStore>) -> ProtocolPipeline {
    let profile = DeviceProfile::for_device_type(&device_type).expect("hl7 profile");
    let port = Arc::new(StoreAnalyzerPort::new(store));
    ProtocolPipeline::new(profile, Arc::new(PipeCodec::new()), port)
}

#[tokio::test]
async fn oru_results_become_pending_sync() {
    let store = Arc::new(InMemoryResultStore::new());
    let pipeline = pipeline(DeviceType::Ba400, Arc::clone(&store));
    let frame = b"MSH|^~\\&|BA400|LAB|||20250101120000||ORU^R01|77|P|2.5.1\rPID|1||WBL001||Doe^John\rOBR|1||WBL001|GLU\rOBX|1|NM|GLU^Glucose||5.4|mmol/L|3.9-6.1|N|||F\rOBX|2|NM|CHOL||4.2|mmol/L";

    let ack = pipeline.handle(frame).await.expect("ack");
    assert!(String::from_utf8_lossy(&ack).contains("MSA|AA|77"));

    let pending = store.pending_sync().await.expect("pending");
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].barcode, "WBL001");
    assert_eq!(pending[0].results.len(), 2);
    assert_eq!(pending[0].results[0].result.test_code, "GLU");
}

#[tokio::test]
async fn orm_for_known_barcode_gets_orr() {
    let store = Arc::new(InMemoryResultStore::new());
    let results = pipeline(DeviceType::Ba400, Arc::clone(&store));
    results
        .handle(b"MSH|^~\\&|BA400|LAB|||20250101120000||ORU^R01|77|P|2.5.1\rPID|1||B100\rOBR|1||B100|GLU\rOBX|1|NM|GLU||5.4|mmol/L")
        .await
        .expect("ack");

    let orders = pipeline(DeviceType::AnalyxTria, Arc::clone(&store));
    let reply = orders
        .handle(b"MSH|^~\\&|TRIAS|LAB|||20250101120000||ORM^O01|555|P|2.3.1\rPID|1|P1||Doe^Jane||19800101|F\rORC|NW||B100\rOBR|1||B100|GLU^Glucose")
        .await
        .expect("orr");
    let reply = String::from_utf8(reply).expect("utf8");
    assert!(reply.contains("ORR^O02"));
    assert!(reply.contains("MSA|AA|555"));
    assert!(reply.contains("B100"));
}

#[tokio::test]
async fn orm_for_unknown_barcode_is_not_acknowledged() {
    let store = Arc::new(InMemoryResultStore::new());
    let orders = pipeline(DeviceType::AnalyxTria, store);
    let err = orders
        .handle(b"MSH|^~\\&|TRIAS|LAB|||20250101120000||ORM^O01|556|P|2.3.1\rORC|NW||B1\rOBR|1||B1|GLU")
        .await
        .expect_err("no orr");
    assert!(matches!(err, PipelineError::Process(_)));
}

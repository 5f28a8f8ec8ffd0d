//! ACK^R01 与 ORR^O02 应答构造。

use chrono::NaiveDateTime;
use domain::{Patient, Specimen};
use lis_hl7::{Delimiters, Msh, RawMessage, Segment, format_ts};

use crate::profile::{AckPolicy, THIS_APPLICATION, THIS_FACILITY};

fn put(segment: &mut Segment, index: usize, value: &str, d: &Delimiters) {
    segment.set_components(index, &[value], d);
}

/// 组装应答 MSH：发送方 / 接收方互换，控制 ID 回显来报 MSH-10。
fn header(
    inbound: &Msh,
    policy: &AckPolicy,
    message_type: [&str; 3],
    now: NaiveDateTime,
) -> Segment {
    let d = &inbound.delimiters;
    let mut msh = Segment::header(d);
    let (sender, receiver) = if policy.keep_inbound_sender {
        (
            (inbound.sending_application.as_str(), inbound.sending_facility.as_str()),
            (THIS_APPLICATION, THIS_FACILITY),
        )
    } else {
        (
            (THIS_APPLICATION, THIS_FACILITY),
            (inbound.sending_application.as_str(), inbound.sending_facility.as_str()),
        )
    };
    put(&mut msh, 3, sender.0, d);
    put(&mut msh, 4, sender.1, d);
    put(&mut msh, 5, receiver.0, d);
    put(&mut msh, 6, receiver.1, d);
    put(&mut msh, 7, &format_ts(&now), d);

    // 2.3.x 没有 MSH-9.3 消息结构
    let components: &[&str] = if policy.version.starts_with("2.3") {
        &message_type[..2]
    } else {
        &message_type
    };
    msh.set_components(9, components, d);
    put(&mut msh, 10, &inbound.control_id, d);
    put(&mut msh, 11, policy.processing_id, d);
    put(&mut msh, 12, policy.version, d);
    put(&mut msh, 15, policy.accept_ack_type, d);
    put(&mut msh, 16, policy.application_ack_type, d);
    put(&mut msh, 17, policy.country_code, d);
    put(&mut msh, 18, policy.charset, d);
    msh.set_components(21, policy.message_profile, d);
    msh
}

fn msa(inbound: &Msh, text: Option<&str>) -> Segment {
    let d = &inbound.delimiters;
    let mut msa = Segment::new("MSA");
    put(&mut msa, 1, "AA", d);
    put(&mut msa, 2, &inbound.control_id, d);
    if let Some(text) = text {
        put(&mut msa, 3, text, d);
    }
    msa
}

/// ORU^R01 的 ACK^R01。
pub fn build_ack(inbound: &Msh, policy: &AckPolicy, now: NaiveDateTime) -> RawMessage {
    let mut ack = RawMessage::new(inbound.delimiters);
    ack.push(header(inbound, policy, ["ACK", "R01", "ACK"], now));
    ack.push(msa(inbound, None));
    ack
}

/// ORM^O01 的 ORR^O02：PID 取规范化患者，每个返回标本的每项申请生成一对 ORC / OBR。
pub fn build_orr(
    inbound: &Msh,
    policy: &AckPolicy,
    patient: &Patient,
    specimens: &[Specimen],
    now: NaiveDateTime,
) -> RawMessage {
    let d = &inbound.delimiters;
    let stamp = format_ts(&now);
    let mut orr = RawMessage::new(inbound.delimiters);
    orr.push(header(inbound, policy, ["ORR", "O02", "ORR_O02"], now));
    orr.push(msa(inbound, Some("Message accepted")));

    let mut pid = Segment::new("PID");
    put(&mut pid, 1, "1", d);
    put(&mut pid, 2, &patient.id, d);
    pid.set_components(5, &[&patient.last_name, &patient.first_name], d);
    if let Some(birthdate) = patient.birthdate {
        put(&mut pid, 7, &birthdate.format("%Y%m%d").to_string(), d);
    }
    put(&mut pid, 8, patient.sex.code(), d);
    orr.push(pid);

    for specimen in specimens {
        for (index, request) in specimen.observation_requests.iter().enumerate() {
            let set_id = (index + 1).to_string();

            let mut orc = Segment::new("ORC");
            put(&mut orc, 1, "AF", d);
            put(&mut orc, 2, &set_id, d);
            put(&mut orc, 3, &specimen.barcode, d);
            put(&mut orc, 9, &stamp, d);
            orr.push(orc);

            let mut obr = Segment::new("OBR");
            put(&mut obr, 1, &set_id, d);
            put(&mut obr, 3, &specimen.barcode, d);
            put(&mut obr, 4, &request.test_code, d);
            put(&mut obr, 6, &stamp, d);
            put(&mut obr, 7, &stamp, d);
            put(&mut obr, 14, &stamp, d);
            put(&mut obr, 24, "HM", d);
            orr.push(obr);
        }
    }
    orr
}

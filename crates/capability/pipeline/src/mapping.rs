//! 类型化报文 → 规范化消息。

use domain::{
    CanonicalMessage, MessageHeader, ObservationRequest, ObservationResult, Patient, Sex,
    Specimen,
};
use lis_hl7::{DecodedMessage, Msh, Obr, Obx, OrmO01, OruR01, Pid};

use crate::error::MappingError;
use crate::profile::DeviceProfile;

const PLACEHOLDERS: [&str; 2] = ["", "0"];

fn usable(value: &str) -> bool {
    !PLACEHOLDERS.contains(&value.trim())
}

/// 按设备族配置映射；没有任何结果（ORU）或申请（ORM）时返回 `MappingError::Empty`。
pub fn map_message(
    decoded: &DecodedMessage,
    profile: &DeviceProfile,
) -> Result<CanonicalMessage, MappingError> {
    match decoded {
        DecodedMessage::OruR01(message) => map_oru(message, profile),
        DecodedMessage::OrmO01(message) => map_orm(message),
    }
}

fn map_oru(message: &OruR01, profile: &DeviceProfile) -> Result<CanonicalMessage, MappingError> {
    let d = message.msh.delimiters;
    let pid = message.pid.as_ref();
    let specimens: Vec<Specimen> = message
        .order_observations
        .iter()
        .map(|group| Specimen {
            barcode: profile.barcode.resolve(pid, group.obr.as_ref(), &d),
            observation_results: group
                .observations
                .iter()
                .map(|obx| map_result(obx, profile.split_value_unit))
                .collect(),
            observation_requests: group.obr.iter().filter_map(map_request).collect(),
        })
        .collect();

    let canonical = CanonicalMessage {
        header: map_header(&message.msh),
        patient: pid.map(map_patient).unwrap_or_default(),
        specimens,
    };
    if canonical.result_count() == 0 {
        return Err(MappingError::Empty);
    }
    Ok(canonical)
}

/// ORM：条码依次取 ORC-3、OBR-3、ORC-2、OBR-2，同条码的申请归入同一标本。
fn map_orm(message: &OrmO01) -> Result<CanonicalMessage, MappingError> {
    let mut specimens: Vec<Specimen> = Vec::new();
    for group in &message.orders {
        let orc = group.orc.as_ref();
        let obr = group.obr.as_ref();
        let barcode = [
            orc.map(|o| o.filler_order_number.as_str()),
            obr.map(|o| o.filler_order_number.as_str()),
            orc.map(|o| o.placer_order_number.as_str()),
            obr.map(|o| o.placer_order_number.as_str()),
        ]
        .into_iter()
        .flatten()
        .find(|candidate| usable(candidate))
        .unwrap_or_default()
        .trim()
        .to_string();

        let Some(request) = obr.and_then(map_request) else {
            continue;
        };
        match specimens.iter_mut().find(|s| s.barcode == barcode) {
            Some(specimen) => specimen.observation_requests.push(request),
            None => specimens.push(Specimen {
                barcode,
                observation_results: Vec::new(),
                observation_requests: vec![request],
            }),
        }
    }
    if specimens.is_empty() {
        return Err(MappingError::Empty);
    }
    Ok(CanonicalMessage {
        header: map_header(&message.msh),
        patient: message.pid.as_ref().map(map_patient).unwrap_or_default(),
        specimens,
    })
}

fn map_header(msh: &Msh) -> MessageHeader {
    MessageHeader {
        sending_application: msh.sending_application.clone(),
        sending_facility: msh.sending_facility.clone(),
        receiving_application: msh.receiving_application.clone(),
        receiving_facility: msh.receiving_facility.clone(),
        message_type: msh.message_type.clone(),
        trigger_event: msh.trigger_event.clone(),
        control_id: msh.control_id.clone(),
        version: msh.version.clone(),
        message_time: msh.timestamp,
    }
}

fn map_patient(pid: &Pid) -> Patient {
    let id = if usable(&pid.patient_id) {
        pid.patient_id.clone()
    } else {
        pid.identifiers
            .iter()
            .find(|id| usable(id))
            .cloned()
            .unwrap_or_default()
    };
    let name = pid.names.first();
    Patient {
        id,
        first_name: name.map(|n| n.given.clone()).unwrap_or_default(),
        last_name: name.map(|n| n.family.clone()).unwrap_or_default(),
        birthdate: pid.birth_date.map(|dt| dt.date()),
        sex: Sex::from_code(&pid.sex),
        address: pid.address.clone(),
    }
}

fn map_request(obr: &Obr) -> Option<ObservationRequest> {
    let service = &obr.universal_service;
    if service.identifier.is_empty() && service.text.is_empty() {
        return None;
    }
    Some(ObservationRequest {
        test_code: service.identifier.clone(),
        description: if service.text.is_empty() {
            service.identifier.clone()
        } else {
            service.text.clone()
        },
        requested_at: obr.requested_at,
    })
}

fn map_result(obx: &Obx, split_value_unit: bool) -> ObservationResult {
    let test_code = if usable(&obx.observation_id.identifier) {
        obx.observation_id.identifier.clone()
    } else {
        obx.sub_id.clone()
    };
    let description = if obx.observation_id.text.is_empty() {
        test_code.clone()
    } else {
        obx.observation_id.text.clone()
    };

    let (values, unit) = if split_value_unit {
        split_values(&obx.values, &obx.units.identifier)
    } else {
        (obx.values.clone(), obx.units.identifier.clone())
    };

    let comments = if obx.notes.is_empty() {
        obx.result_status.clone()
    } else {
        obx.notes.join(" ")
    };

    ObservationResult {
        test_code,
        description,
        values,
        unit,
        reference_range: obx.reference_range.clone(),
        abnormal_flag: obx.abnormal_flags.join(","),
        value_type: obx.value_type.clone(),
        timestamp: obx.observed_at.or(obx.analyzed_at),
        comments,
    }
}

/// `"0.42 ng/mL"` → 值 `0.42`，单位 `ng/mL`；首个值不带单位时沿用 OBX-6。
fn split_values(values: &[String], declared_unit: &str) -> (Vec<String>, String) {
    let embedded_unit = values
        .first()
        .and_then(|value| value.split_whitespace().nth(1))
        .map(str::to_string);
    let values = values
        .iter()
        .map(|value| {
            value
                .split_whitespace()
                .next()
                .unwrap_or_default()
                .to_string()
        })
        .collect();
    (values, embedded_unit.unwrap_or_else(|| declared_unit.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_unit_split() {
        let (values, unit) = split_values(&["0.42 ng/mL".to_string()], "");
        assert_eq!(values, vec!["0.42".to_string()]);
        assert_eq!(unit, "ng/mL");

        let (values, unit) = split_values(&["12.5".to_string()], "mmol/L");
        assert_eq!(values, vec!["12.5".to_string()]);
        assert_eq!(unit, "mmol/L");
    }

    #[test]
    fn test_code_falls_back_to_sub_id() {
        let obx = Obx {
            observation_id: lis_hl7::CodedElement {
                identifier: "0".into(),
                ..Default::default()
            },
            sub_id: "HGB".into(),
            values: vec!["13.1".into()],
            result_status: "F".into(),
            ..Default::default()
        };
        let result = map_result(&obx, false);
        assert_eq!(result.test_code, "HGB");
        assert_eq!(result.description, "HGB");
        assert_eq!(result.comments, "F");
    }
}

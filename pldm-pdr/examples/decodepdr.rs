//! Decode a single Get PDR response capture
//!
//! Basic handling only, the pldm-pdr-util binary is the full inspector.

use pldm_pdr::deku::DekuContainerRead;
use pldm_pdr::proto::GetPDRResp;
use pldm_pdr::record::*;

use log::*;
use num_traits::FromPrimitive;

fn main() {
    env_logger::init();

    let a: Vec<_> = std::env::args().collect();
    let f = a.get(1).expect("Need input file argument");
    println!("loading {f}");
    let d = std::fs::read(f).unwrap();

    let (rsp, crc) = GetPDRResp::from_payload(&d)
        .map_err(|e| {
            println!("GetPDR parse error {e:?}");
            panic!("Bad GetPDR response")
        })
        .unwrap();
    println!("rsp {rsp:?}");
    if let Some(crc) = crc {
        println!("record data crc {crc:#04x}");
    }

    let ((body, _), hdr) =
        RecordHeader::from_bytes((&rsp.record_data, 0)).unwrap();
    println!("header {hdr:?}");

    match PdrType::from_u8(hdr.pdr_type) {
        Some(PdrType::EntityAssociation) => {
            let (_, pdr) =
                EntityAssociationPdr::from_bytes((body, 0)).unwrap();
            println!("PDR {pdr:?}");
        }
        Some(PdrType::FruRecordSet) => {
            let (_, pdr) = FruRecordSetPdr::from_bytes((body, 0)).unwrap();
            println!("PDR {pdr:?}");
        }
        Some(PdrType::StateSensor) => {
            let (_, pdr) = StateSensorPdr::from_bytes((body, 0)).unwrap();
            println!("PDR {pdr:?}");
        }
        Some(PdrType::StateEffecter) => {
            let (_, pdr) = StateEffecterPdr::from_bytes((body, 0)).unwrap();
            println!("PDR {pdr:?}");
        }
        t => {
            trace!("no body decoder for {t:?}");
            println!("PDR type {} body {body:x?}", hdr.pdr_type);
        }
    }
}

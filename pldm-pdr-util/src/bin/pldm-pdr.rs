// SPDX-License-Identifier: MIT OR Apache-2.0
/*
 * PLDM PDR inspection utility.
 *
 * Copyright (c) 2025 Code Construct
 */
#[allow(unused)]
use log::{debug, error, info, trace, warn};

use anyhow::{bail, Result};

use argh::FromArgs;
use num_traits::FromPrimitive;

use pldm_base::{
    ccode_result, pldm_req_buf, pldm_resp_buf, PldmRequest, PldmResponse,
    PLDM_MAX_MSGSIZE,
};
use pldm_pdr::deku::{DekuContainerRead, DekuContainerWrite};
use pldm_pdr::entity::{AssociationType, EntityTree};
use pldm_pdr::proto::{
    crc8, decode_payload, event_class, Cmd, EffecterId,
    GetPDRRepositoryInfoResp, GetPDRReq, GetPDRResp,
    PlatformEventMessageReq, SensorEvent, SensorEventData, SensorId,
    SensorOperationalState, StateField, TransferOperationFlag,
};
use pldm_pdr::record::{
    pdr_add, EntityAssociationPdr, FruRecordSetPdr, PdrType,
    PossibleStates, RecordHeader, StateEffecterPdr, StateSensorPdr,
};
use pldm_pdr::repo::Repo;
use pldm_pdr::responder::Responder;
use pldm_pdr::state_sets;
use pldm_pdr::PLDM_TYPE_PLATFORM;

#[derive(FromArgs, Debug)]
#[argh(description = "PLDM PDR repository inspector")]
struct Args {
    #[argh(switch, short = 'd')]
    /// debug logging
    debug: bool,

    #[argh(switch)]
    /// trace logging
    trace: bool,

    #[argh(subcommand)]
    command: Command,
}

#[derive(FromArgs, Debug)]
#[argh(subcommand)]
enum Command {
    Version(VersionCommand),
    Decode(DecodeCommand),
    Demo(DemoCommand),
}

#[derive(FromArgs, Debug)]
#[argh(subcommand, name = "version", description = "Print version")]
struct VersionCommand {}

#[derive(FromArgs, Debug)]
#[argh(
    subcommand,
    name = "decode",
    description = "Decode a PDR record from a file"
)]
struct DecodeCommand {
    /// file holds a GetPDR response payload rather than a bare record
    #[argh(switch)]
    resp: bool,

    /// input file
    #[argh(positional)]
    file: String,
}

#[derive(FromArgs, Debug)]
#[argh(
    subcommand,
    name = "demo",
    description = "Build and dump a demonstration repository"
)]
struct DemoCommand {
    /// sensor ID for the demonstration sensor
    #[argh(option, default = "SensorId(7)")]
    sensor: SensorId,

    /// effecter ID for the demonstration effecter
    #[argh(option, default = "EffecterId(3)")]
    effecter: EffecterId,
}

fn dump_possible_states(composite: &[PossibleStates]) {
    for set in composite {
        match state_sets::set_name(set.state_set_id) {
            Some(name) => println!(
                "  states for set {} ({name}): {:02x?}",
                set.state_set_id, set.states
            ),
            None => println!(
                "  states for set {}: {:02x?}",
                set.state_set_id, set.states
            ),
        }
    }
}

fn dump_record(data: &[u8]) -> Result<()> {
    let ((body, _), hdr) = RecordHeader::from_bytes((data, 0))?;
    println!(
        "record handle {:#010x} type {} change {} length {}",
        hdr.record_handle, hdr.pdr_type, hdr.record_change_num, hdr.length
    );

    match PdrType::from_u8(hdr.pdr_type) {
        Some(PdrType::EntityAssociation) => {
            let (_, pdr) = EntityAssociationPdr::from_bytes((body, 0))?;
            println!(
                "  entity association, container id {} {:?}",
                pdr.container_id, pdr.association_type
            );
            println!("  container {:?}", pdr.container);
            for child in &pdr.children {
                println!("  child {child:?}");
            }
        }
        Some(PdrType::FruRecordSet) => {
            let (_, pdr) = FruRecordSetPdr::from_bytes((body, 0))?;
            println!("  fru record set {pdr:?}");
        }
        Some(PdrType::StateSensor) => {
            let (_, pdr) = StateSensorPdr::from_bytes((body, 0))?;
            println!(
                "  state sensor {} terminus {} {:?}",
                pdr.sensor_id, pdr.terminus_handle, pdr.entity
            );
            dump_possible_states(&pdr.composite);
        }
        Some(PdrType::StateEffecter) => {
            let (_, pdr) = StateEffecterPdr::from_bytes((body, 0))?;
            println!(
                "  state effecter {} terminus {} {:?}",
                pdr.effecter_id, pdr.terminus_handle, pdr.entity
            );
            dump_possible_states(&pdr.composite);
        }
        t => {
            trace!("no body decoder for {t:?}");
            println!("  body {body:x?}");
        }
    }
    Ok(())
}

fn decode(cmd: &DecodeCommand) -> Result<()> {
    let d = std::fs::read(&cmd.file)?;

    if cmd.resp {
        let (rsp, crc) = GetPDRResp::from_payload(&d)?;
        println!(
            "next record handle {:#010x}, transfer flag {:?}",
            rsp.next_record_handle, rsp.transfer_flag
        );
        if let Some(crc) = crc {
            let calc = crc8(&rsp.record_data);
            if crc != calc {
                bail!("record data crc {crc:#04x}, expected {calc:#04x}");
            }
            println!("record data crc {crc:#04x} ok");
        }
        dump_record(&rsp.record_data)
    } else {
        dump_record(&d)
    }
}

/// Round trip one request through the responder, through serialised
/// message buffers as a transport would carry them. Returns the response
/// payload, failing on a non-success completion code.
fn transact(
    responder: &mut Responder,
    repo: &Repo,
    cmd: Cmd,
    payload: &[u8],
) -> Result<Vec<u8>> {
    let req =
        PldmRequest::new_borrowed(PLDM_TYPE_PLATFORM, cmd as u8, payload);
    let mut reqbuf = [0u8; PLDM_MAX_MSGSIZE];
    let msg = pldm_req_buf(&req, &mut reqbuf)?;
    let req = PldmRequest::from_buf_borrowed(msg)?;

    let resp = responder.handle(repo, &req)?;

    let mut respbuf = [0u8; PLDM_MAX_MSGSIZE];
    let msg = pldm_resp_buf(&resp, &mut respbuf)?;
    let resp = PldmResponse::from_buf_borrowed(&req, msg)?;
    ccode_result(resp.cc)?;
    Ok(resp.data.to_vec())
}

fn demo(cmd: &DemoCommand) -> Result<()> {
    // one top level entity, two type-2 children with devices below, a
    // logical association, and a pair of type-5 containers of their own
    let mut tree = EntityTree::new();
    let n1 = tree.add(1, None, AssociationType::Physical);
    let n2a = tree.add(2, Some(n1), AssociationType::Physical);
    tree.add(2, Some(n1), AssociationType::Physical);
    tree.add(3, Some(n1), AssociationType::Logical);
    tree.add(4, Some(n2a), AssociationType::Physical);
    let n5a = tree.add(5, Some(n2a), AssociationType::Physical);
    let n5b = tree.add(5, Some(n2a), AssociationType::Physical);
    tree.add(6, Some(n5a), AssociationType::Physical);
    tree.add(7, Some(n5b), AssociationType::Physical);

    let mut repo = Repo::new();
    pdr_add(&mut tree, &mut repo, false)?;

    // a FRU record set per type-2 entity
    for rsi in [1u16, 2] {
        let Some(node) = tree.find(2, rsi) else {
            bail!("missing entity 2:{rsi}");
        };
        let e = tree.entity(node);
        repo.add_fru_record_set(
            1,
            rsi,
            e.entity_type,
            e.entity_instance_num,
            e.entity_container_id,
        );
    }

    // a health sensor and a run state effecter on the first of them
    let Some(node) = tree.find(2, 1) else {
        bail!("missing entity 2:1");
    };
    let entity = tree.entity(node);

    let sensor = StateSensorPdr {
        terminus_handle: 1,
        sensor_id: cmd.sensor.0,
        entity,
        sensor_init: 0,
        sensor_auxiliary_names_pdr: false,
        composite: vec![PossibleStates {
            state_set_id: state_sets::HealthState::ID,
            states: vec![0x1f],
        }],
    };
    repo.add(&sensor.to_record()?, 0, false);

    let effecter = StateEffecterPdr {
        terminus_handle: 1,
        effecter_id: cmd.effecter.0,
        entity,
        effecter_semantic_id: 0,
        effecter_init: 0,
        has_description_pdr: false,
        composite: vec![PossibleStates {
            state_set_id: state_sets::OperationalRunningStatus::ID,
            states: vec![0x7f],
        }],
    };
    repo.add(&effecter.to_record()?, 0, false);

    println!("{} records, {} bytes", repo.record_count(), repo.repo_size());
    let mut cur = repo.find_record(0);
    while let Some(r) = cur {
        let rec = repo.record(r);
        println!(
            "repository handle {:#010x}{}",
            rec.handle(),
            if rec.is_remote() { " (remote)" } else { "" }
        );
        dump_record(rec.data())?;
        cur = repo.next_record(r);
    }

    // serve the repository the way a terminus would
    let mut responder = Responder::new();

    let data =
        transact(&mut responder, &repo, Cmd::GetPDRRepositoryInfo, &[])?;
    let info: GetPDRRepositoryInfoResp = decode_payload(&data)?;
    println!(
        "repository info: {:?}, {} records, {} bytes, largest record {}",
        info.repository_state,
        info.record_count,
        info.repository_size,
        info.largest_record_size
    );

    let mut handle = 0;
    loop {
        let b = GetPDRReq {
            record_handle: handle,
            data_transfer_handle: 0,
            transfer_op_flag: TransferOperationFlag::FirstPart,
            request_count: 1024,
            record_change_number: 0,
        }
        .to_bytes()?;
        let data = transact(&mut responder, &repo, Cmd::GetPDR, &b)?;
        let (pdr, _) = GetPDRResp::from_payload(&data)?;
        debug!("GetPDR returned {} bytes", pdr.record_data.len());
        handle = pdr.next_record_handle;
        if handle == 0 {
            break;
        }
    }
    println!("walked all records via GetPDR");

    // a sensor event arriving from the terminus
    let ev = SensorEventData {
        sensor_id: cmd.sensor,
        event: SensorEvent::StateSensorState {
            sensor_offset: 0,
            event_state: state_sets::HealthState::Critical as u8,
            previous_event_state: state_sets::HealthState::Normal as u8,
        },
    };
    let mut payload =
        PlatformEventMessageReq::new(1, event_class::SENSOR_EVENT)
            .to_bytes()?;
    payload.extend_from_slice(&ev.to_bytes()?);
    transact(&mut responder, &repo, Cmd::PlatformEventMessage, &payload)?;

    // present the new state the way a requester would display it
    let field = StateField {
        op_state: SensorOperationalState::Enabled,
        present_state: state_sets::HealthState::Critical as u8,
        previous_state: state_sets::HealthState::Normal as u8,
        event_state: state_sets::HealthState::Critical as u8,
    };
    println!(
        "sensor {} reading: {:?}",
        cmd.sensor.0,
        field.debug_state_set(state_sets::HealthState::ID)
    );

    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args: Args = argh::from_env();

    let level = if args.trace {
        log::LevelFilter::Trace
    } else if args.debug {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    env_logger::Builder::new()
        .filter_level(level)
        .format_timestamp(None)
        .init();

    match args.command {
        Command::Version(_) => info!("pldm-pdr {}", env!("VERSION")),
        Command::Decode(c) => decode(&c)?,
        Command::Demo(c) => demo(&c)?,
    }
    Ok(())
}

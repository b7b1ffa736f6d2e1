//! bthostd demo: drives the pairing/credential core with a scripted
//! controller and an auto-accepting agent, then prints what got persisted.
//!
//! The host is not `Send` (single dispatch context), so it runs on a
//! current-thread runtime inside a `LocalSet`.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use bthost_core::{Address, AddressType};
use bthost_host::{
    AgentRequest, AgentResponse, ControllerLink, DiscoveryReport, DiscoverySink, Event, Host,
    HostInput, PairingAgent, Registry, SessionToken,
};
use bthost_keystore::{LinkKey, MemoryStore};
use tokio::sync::mpsc::{self, UnboundedSender};
use tracing::{info, warn};

/// Agent that immediately accepts every prompt, feeding its decision back
/// into the dispatch loop the way a real interactive agent would.
struct AutoAgent {
    inputs: UnboundedSender<HostInput>,
    pin: String,
}

impl PairingAgent for AutoAgent {
    fn bound(&self) -> bool {
        true
    }

    fn request(&mut self, token: SessionToken, request: AgentRequest) {
        info!(?request, "agent prompt");
        let response = match request {
            AgentRequest::PinCode { .. } => AgentResponse::PinCode(self.pin.clone()),
            AgentRequest::DisplayPinCode { .. } | AgentRequest::DisplayPasskey { .. } => {
                AgentResponse::Displayed
            }
            AgentRequest::ConfirmPasskey { .. } => AgentResponse::Confirmed,
            AgentRequest::Passkey => AgentResponse::Passkey(0),
        };
        let _ = self.inputs.send(HostInput::Agent { token, response });
    }

    fn cancel(&mut self, token: SessionToken) {
        warn!(peer = %token.device.peer, "agent prompt cancelled");
    }
}

/// Controller reply path that just logs what would go on the wire.
struct LogLink;

impl ControllerLink for LogLink {
    fn pincode_reply(
        &mut self,
        _local: Address,
        peer: Address,
        pin: Option<&str>,
    ) -> Result<(), bthost_core::error::ReplyError> {
        info!(%peer, pin = pin.unwrap_or("<reject>"), "pincode reply");
        Ok(())
    }

    fn confirm_reply(
        &mut self,
        _local: Address,
        peer: Address,
        _peer_type: AddressType,
        confirm: bool,
    ) -> Result<(), bthost_core::error::ReplyError> {
        info!(%peer, confirm, "confirm reply");
        Ok(())
    }

    fn passkey_reply(
        &mut self,
        _local: Address,
        peer: Address,
        _peer_type: AddressType,
        passkey: u32,
    ) -> Result<(), bthost_core::error::ReplyError> {
        info!(%peer, passkey, "passkey reply");
        Ok(())
    }

    fn request_disconnect(
        &mut self,
        _local: Address,
        peer: Address,
    ) -> Result<(), bthost_core::error::ReplyError> {
        info!(%peer, "disconnect requested");
        Ok(())
    }
}

struct LogDiscovery;

impl DiscoverySink for LogDiscovery {
    fn device_found(&mut self, _local: Address, report: &DiscoveryReport) {
        info!(peer = %report.peer, rssi = report.rssi, "device found");
    }
}

fn main() {
    tracing_subscriber::fmt().init();

    let local: Address = "00:1A:7D:DA:71:13".parse().expect("valid address");
    let peer: Address = "AA:BB:CC:DD:EE:FF".parse().expect("valid address");

    let store = Rc::new(RefCell::new(MemoryStore::new()));
    let mut registry = Registry::new();
    registry.add_adapter(local);

    let (tx, rx) = mpsc::unbounded_channel();
    let host = Host::new(
        registry,
        Box::new(store.clone()),
        Box::new(store.clone()),
        Box::new(AutoAgent {
            inputs: tx.clone(),
            pin: "0000".to_string(),
        }),
        Box::new(LogLink),
        Box::new(LogDiscovery),
    );

    // A short scripted pairing: discovery, connection with a name, a PIN
    // round trip, and the controller delivering the resulting link key.
    let script = [
        Event::DeviceFound {
            local,
            report: DiscoveryReport {
                peer,
                address_type: AddressType::BrEdr,
                rssi: -52,
                confirm_name: false,
                legacy: true,
                eir: Vec::new(),
            },
        },
        Event::ConnComplete {
            local,
            peer,
            address_type: AddressType::BrEdr,
            class: 0x5a020c,
            name: Some(b"Demo Speaker".to_vec()),
        },
        Event::PinRequested {
            local,
            peer,
            secure: false,
        },
        Event::LinkKeyNotify {
            local,
            peer,
            key: LinkKey {
                key: [0x42; 16],
                key_type: 0x04,
                pin_length: 4,
            },
        },
    ];
    for event in script {
        tx.send(HostInput::Event(event)).expect("loop running");
    }
    drop(tx);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("runtime");
    let set = tokio::task::LocalSet::new();
    runtime.block_on(set.run_until(async {
        // The agent holds a sender, so the channel never closes on its own;
        // the script is long since drained by the time the timer fires.
        tokio::select! {
            _ = host.run(rx) => {}
            _ = tokio::time::sleep(Duration::from_millis(200)) => {}
        }
    }));

    let store = store.borrow();
    info!(
        name = store.name(local, peer).unwrap_or("<none>"),
        class = store.class(local, peer),
        link_key = store
            .link_key(local, peer, AddressType::BrEdr)
            .unwrap_or("<none>"),
        "persisted state"
    );
}

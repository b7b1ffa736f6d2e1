//! The device lifecycle controller.
//!
//! One handler per controller event. Every handler resolves the event's
//! (local, peer) pair to registry handles, applies the bonding/connection
//! state machine, and where needed starts a pairing session or persists a
//! credential. Handlers run to completion before the next input; the agent's
//! asynchronous decision re-enters through [`Host::agent_response`].

use std::collections::HashMap;
use std::time::SystemTime;

use bthost_core::error::{Error, ReplyError};
use bthost_core::{sanitize_remote_name, Address, AddressType, Result};
use bthost_keystore::{DeviceCache, KeyStore, LinkKey, LongTermKey};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::agent::{AgentRequest, AgentResponse, PairingAgent, SessionToken};
use crate::link::{ControllerLink, DiscoveryReport, DiscoverySink};
use crate::pairing::{select_pin_path, Method, PinPath, Session, INVALID_PASSKEY};
use crate::registry::{DeviceKey, Registry};
use crate::resolver::{resolve_create, resolve_existing};

/// One parsed, validated controller notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Classic PIN code request.
    PinRequested {
        local: Address,
        peer: Address,
        secure: bool,
    },
    /// Numeric-comparison confirmation request.
    UserConfirmRequested {
        local: Address,
        peer: Address,
        passkey: u32,
    },
    /// Passkey-entry request.
    UserPasskeyRequested { local: Address, peer: Address },
    /// Passkey-display notification; `entered` counts remote keystrokes.
    PasskeyNotify {
        local: Address,
        peer: Address,
        passkey: u32,
        entered: u8,
    },
    /// Simple-pairing procedure finished with `status`.
    SimplePairingComplete {
        local: Address,
        peer: Address,
        status: u8,
    },
    /// Inquiry/scan report.
    DeviceFound {
        local: Address,
        report: DiscoveryReport,
    },
    /// Remote name received, raw controller bytes.
    RemoteName {
        local: Address,
        peer: Address,
        name: Vec<u8>,
    },
    /// Classic link key delivered by the controller.
    LinkKeyNotify {
        local: Address,
        peer: Address,
        key: LinkKey,
    },
    /// LE long-term key delivered by the controller.
    LongTermKeyNotify {
        local: Address,
        peer: Address,
        address_type: AddressType,
        key: LongTermKey,
    },
    /// Connection established.
    ConnComplete {
        local: Address,
        peer: Address,
        address_type: AddressType,
        class: u32,
        name: Option<Vec<u8>>,
    },
    /// Connection attempt failed with `status`.
    ConnFailed {
        local: Address,
        peer: Address,
        status: u8,
    },
    /// Link torn down.
    DisconnComplete { local: Address, peer: Address },
    DeviceBlocked { local: Address, peer: Address },
    DeviceUnblocked { local: Address, peer: Address },
    /// Pairing removed by the controller or user.
    DeviceUnpaired { local: Address, peer: Address },
    /// Controller re-confirmed an already-known link key.
    ReturnedLinkKey { local: Address, peer: Address },
}

/// One unit of work for the dispatch loop: a controller event or an agent
/// decision re-entering with its session token.
#[derive(Debug)]
pub enum HostInput {
    Event(Event),
    Agent {
        token: SessionToken,
        response: AgentResponse,
    },
}

/// The pairing-and-credential coordination core.
pub struct Host {
    registry: Registry,
    keys: Box<dyn KeyStore>,
    cache: Box<dyn DeviceCache>,
    agent: Box<dyn PairingAgent>,
    link: Box<dyn ControllerLink>,
    discovery: Box<dyn DiscoverySink>,
    sessions: HashMap<DeviceKey, Session>,
}

impl Host {
    pub fn new(
        registry: Registry,
        keys: Box<dyn KeyStore>,
        cache: Box<dyn DeviceCache>,
        agent: Box<dyn PairingAgent>,
        link: Box<dyn ControllerLink>,
        discovery: Box<dyn DiscoverySink>,
    ) -> Self {
        Self {
            registry,
            keys,
            cache,
            agent,
            link,
            discovery,
            sessions: HashMap::new(),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    /// Whether a pairing session is active for (local, peer).
    pub fn session_active(&self, local: Address, peer: Address) -> bool {
        self.sessions.contains_key(&DeviceKey {
            adapter: local,
            peer,
        })
    }

    /// Dispatch one event to its handler.
    pub fn handle(&mut self, event: Event) -> Result<()> {
        match event {
            Event::PinRequested { local, peer, secure } => {
                self.pin_requested(local, peer, secure)
            }
            Event::UserConfirmRequested {
                local,
                peer,
                passkey,
            } => self.user_confirm_requested(local, peer, passkey),
            Event::UserPasskeyRequested { local, peer } => {
                self.user_passkey_requested(local, peer)
            }
            Event::PasskeyNotify {
                local,
                peer,
                passkey,
                entered,
            } => self.passkey_notify(local, peer, passkey, entered),
            Event::SimplePairingComplete {
                local,
                peer,
                status,
            } => self.simple_pairing_complete(local, peer, status),
            Event::DeviceFound { local, report } => self.device_found(local, &report),
            Event::RemoteName { local, peer, name } => self.remote_name(local, peer, &name),
            Event::LinkKeyNotify { local, peer, key } => self.link_key_notify(local, peer, &key),
            Event::LongTermKeyNotify {
                local,
                peer,
                address_type,
                key,
            } => self.long_term_key_notify(local, peer, address_type, &key),
            Event::ConnComplete {
                local,
                peer,
                address_type,
                class,
                name,
            } => self.conn_complete(local, peer, address_type, class, name.as_deref()),
            Event::ConnFailed {
                local,
                peer,
                status,
            } => self.conn_failed(local, peer, status),
            Event::DisconnComplete { local, peer } => self.disconn_complete(local, peer),
            Event::DeviceBlocked { local, peer } => self.device_blocked(local, peer),
            Event::DeviceUnblocked { local, peer } => self.device_unblocked(local, peer),
            Event::DeviceUnpaired { local, peer } => self.device_unpaired(local, peer),
            Event::ReturnedLinkKey { local, peer } => self.returned_link_key(local, peer),
        }
    }

    /// Process inputs strictly in arrival order until the channel closes.
    ///
    /// Failed events are dropped with an error log; they never abort the
    /// loop. Returns the host so callers can inspect final state.
    pub async fn run(mut self, mut inputs: mpsc::UnboundedReceiver<HostInput>) -> Self {
        while let Some(input) = inputs.recv().await {
            let outcome = match input {
                HostInput::Event(event) => self.handle(event),
                HostInput::Agent { token, response } => self.agent_response(token, response),
            };
            if let Err(e) = outcome {
                error!("dropping event: {e}");
            }
        }
        self
    }

    /// Classic PIN request. A usable cached PIN short-circuits the agent
    /// round trip; otherwise the PIN-entry method is started.
    fn pin_requested(&mut self, local: Address, peer: Address, secure: bool) -> Result<()> {
        let key = resolve_create(&mut self.registry, local, peer)?;

        let cached = self
            .registry
            .adapter(local)
            .and_then(|a| a.fixed_pin())
            .cloned();
        let bonding = self
            .registry
            .device(key)
            .is_some_and(|d| d.is_bonding_requested());

        match select_pin_path(cached.as_ref(), secure, bonding) {
            PinPath::ReplyNow { pin } => {
                debug!(%peer, "replying with cached pin");
                self.link
                    .pincode_reply(local, peer, Some(&pin))
                    .map_err(|e| self.log_reply_failure(e))?;
                Ok(())
            }
            PinPath::DisplayToAgent { pin } => {
                self.start_session(
                    key,
                    Method::PinEntry,
                    AgentRequest::DisplayPinCode { pin, secure },
                );
                Ok(())
            }
            PinPath::AskAgent => {
                self.start_session(key, Method::PinEntry, AgentRequest::PinCode { secure });
                Ok(())
            }
        }
    }

    /// Numeric-comparison request. Auto-rejects when no agent is bound.
    fn user_confirm_requested(
        &mut self,
        local: Address,
        peer: Address,
        passkey: u32,
    ) -> Result<()> {
        let key = resolve_create(&mut self.registry, local, peer)?;

        if !self.agent.bound() {
            warn!(%peer, "no agent bound, rejecting confirmation");
            let peer_type = self.peer_type(key);
            self.link
                .confirm_reply(local, peer, peer_type, false)
                .map_err(|e| self.log_reply_failure(e))?;
            return Ok(());
        }

        self.start_session(
            key,
            Method::Confirmation,
            AgentRequest::ConfirmPasskey { passkey },
        );
        Ok(())
    }

    /// Passkey-entry request.
    fn user_passkey_requested(&mut self, local: Address, peer: Address) -> Result<()> {
        let key = resolve_create(&mut self.registry, local, peer)?;
        self.start_session(key, Method::PasskeyEntry, AgentRequest::Passkey);
        Ok(())
    }

    /// Passkey-display notification. Keystroke updates re-use the active
    /// display session instead of starting a second one.
    fn passkey_notify(
        &mut self,
        local: Address,
        peer: Address,
        passkey: u32,
        entered: u8,
    ) -> Result<()> {
        let key = resolve_create(&mut self.registry, local, peer)?;
        let request = AgentRequest::DisplayPasskey { passkey, entered };

        if let Some(session) = self.sessions.get(&key) {
            if session.method == Method::PasskeyDisplay {
                self.agent.request(session.token, request);
                return Ok(());
            }
        }

        self.start_session(key, Method::PasskeyDisplay, request);
        Ok(())
    }

    /// Simple-pairing completion. Status 0 allows creating the device
    /// record; a failure never creates one and never advances bonding.
    fn simple_pairing_complete(&mut self, local: Address, peer: Address, status: u8) -> Result<()> {
        debug!(status, %peer, "simple pairing complete");

        let key = if status == 0 {
            Some(resolve_create(&mut self.registry, local, peer)?)
        } else {
            resolve_existing(&self.registry, local, peer)?
        };

        if let Some(key) = key {
            if let Some(device) = self.registry.device_mut(key) {
                device.set_ssp_status(status);
            }
        }
        Ok(())
    }

    /// Discovery report: forwarded to the adapter's discovery aggregator.
    /// No device record is created at this level.
    fn device_found(&mut self, local: Address, report: &DiscoveryReport) -> Result<()> {
        if self.registry.adapter(local).is_none() {
            error!(%local, "unable to find matching adapter");
            return Err(Error::Resolve(
                bthost_core::error::ResolveError::NoSuchController(local),
            ));
        }
        self.discovery.device_found(local, report);
        Ok(())
    }

    /// Remote name received. The cache entry is written whenever the
    /// adapter is known, even for an untracked device; the in-memory name
    /// is updated only when a record exists.
    fn remote_name(&mut self, local: Address, peer: Address, raw: &[u8]) -> Result<()> {
        let name = sanitize_remote_name(raw);
        let key = resolve_existing(&self.registry, local, peer)?;

        self.cache.store_name(local, peer, &name).map_err(|e| {
            warn!(%peer, "failed to cache remote name: {e}");
            e
        })?;

        if let Some(key) = key {
            if let Some(device) = self.registry.device_mut(key) {
                device.set_name(&name);
            }
        }
        Ok(())
    }

    /// Classic link key delivered: persist, then mark bonded and clear the
    /// temporary flag. A failed persist leaves the record untouched.
    fn link_key_notify(&mut self, local: Address, peer: Address, key: &LinkKey) -> Result<()> {
        let dkey = resolve_create(&mut self.registry, local, peer)?;

        debug!(key_type = key.key_type, %peer, "storing link key");

        let peer_type = self.peer_type(dkey);
        self.keys
            .store_link_key(local, peer, peer_type, key)
            .map_err(|e| {
                warn!(%peer, "failed to store link key: {e}");
                e
            })?;

        self.mark_bonded(dkey);
        Ok(())
    }

    /// LE long-term key delivered: same bonded/temporary effect as the
    /// classic path on successful persist.
    fn long_term_key_notify(
        &mut self,
        local: Address,
        peer: Address,
        address_type: AddressType,
        key: &LongTermKey,
    ) -> Result<()> {
        let dkey = resolve_create(&mut self.registry, local, peer)?;

        self.keys
            .store_long_term_key(local, peer, address_type, key)
            .map_err(|e| {
                warn!(%peer, "failed to store long-term key: {e}");
                e
            })?;

        self.mark_bonded(dkey);
        Ok(())
    }

    /// Connection established: stamp last-used, persist a nonzero device
    /// class, record the address type, register the connection, and run the
    /// remote-name path inline when a name accompanied the event.
    fn conn_complete(
        &mut self,
        local: Address,
        peer: Address,
        address_type: AddressType,
        class: u32,
        name: Option<&[u8]>,
    ) -> Result<()> {
        let key = resolve_create(&mut self.registry, local, peer)?;

        if let Err(e) = self
            .cache
            .store_last_seen(local, peer, address_type, SystemTime::now())
        {
            warn!(%peer, "failed to store last-used timestamp: {e}");
        }

        if class != 0 {
            if let Err(e) = self.cache.store_class(local, peer, class) {
                warn!(%peer, "failed to store device class: {e}");
            }
        }

        if let Some(device) = self.registry.device_mut(key) {
            device.set_address_type(address_type);
            device.add_connection();
        }

        if let Some(raw) = name {
            self.remote_name(local, peer, raw)?;
        }
        Ok(())
    }

    /// Connection failed: cancel an active bonding session exactly once,
    /// then drop the record if it was temporary.
    fn conn_failed(&mut self, local: Address, peer: Address, status: u8) -> Result<()> {
        debug!(status, %peer, "connection failed");

        let Some(key) = resolve_existing(&self.registry, local, peer)? else {
            return Ok(());
        };

        if let Some(session) = self.sessions.remove(&key) {
            info!(%peer, status, "cancelling bonding");
            self.agent.cancel(session.token);
            if let Some(device) = self.registry.device_mut(key) {
                device.set_bonding_method(None);
                device.set_bonding_requested(false);
            }
        }

        if self.registry.device(key).is_some_and(|d| d.is_temporary()) {
            self.registry.remove_device(key);
        }
        Ok(())
    }

    /// Link torn down: deregister the connection.
    fn disconn_complete(&mut self, local: Address, peer: Address) -> Result<()> {
        let Some(key) = resolve_existing(&self.registry, local, peer)? else {
            return Ok(());
        };
        if let Some(device) = self.registry.device_mut(key) {
            device.remove_connection();
        }
        Ok(())
    }

    fn device_blocked(&mut self, local: Address, peer: Address) -> Result<()> {
        self.set_blocked(local, peer, true)
    }

    fn device_unblocked(&mut self, local: Address, peer: Address) -> Result<()> {
        self.set_blocked(local, peer, false)
    }

    /// Unpaired: the record reverts to temporary. A connected device is
    /// asked to disconnect first; an idle one is removed immediately.
    fn device_unpaired(&mut self, local: Address, peer: Address) -> Result<()> {
        let Some(key) = resolve_existing(&self.registry, local, peer)? else {
            return Ok(());
        };

        let connected = match self.registry.device_mut(key) {
            Some(device) => {
                device.set_temporary(true);
                device.is_connected()
            }
            None => return Ok(()),
        };

        if connected {
            self.link
                .request_disconnect(local, peer)
                .map_err(|e| self.log_reply_failure(e))?;
        } else {
            self.registry.remove_device(key);
        }
        Ok(())
    }

    /// The controller already holds a credential for this peer: record the
    /// pairing as established. Paired is distinct from bonded.
    fn returned_link_key(&mut self, local: Address, peer: Address) -> Result<()> {
        let key = resolve_create(&mut self.registry, local, peer)?;
        if let Some(device) = self.registry.device_mut(key) {
            device.set_paired(true);
        }
        Ok(())
    }

    /// Agent decision re-entering the dispatch context.
    ///
    /// The token is validated against device liveness before any mutation:
    /// a reply for a destroyed or re-created record retires the session (if
    /// one is still tracked) and is otherwise a no-op.
    pub fn agent_response(&mut self, token: SessionToken, response: AgentResponse) -> Result<()> {
        let live = self
            .registry
            .device(token.device)
            .is_some_and(|d| d.generation() == token.generation);
        if !live {
            debug!(peer = %token.device.peer, "discarding agent reply for dead session");
            self.sessions.remove(&token.device);
            return Ok(());
        }

        let Some(session) = self.sessions.remove(&token.device) else {
            debug!(peer = %token.device.peer, "agent reply without session");
            return Ok(());
        };

        if let Some(device) = self.registry.device_mut(token.device) {
            device.set_bonding_method(None);
        }

        let local = token.device.adapter;
        let peer = token.device.peer;
        let peer_type = self.peer_type(token.device);

        let outcome = match (session.method, response) {
            (Method::PinEntry, AgentResponse::PinCode(pin)) => {
                self.link.pincode_reply(local, peer, Some(&pin))
            }
            // Display-only confirmation acknowledged: reply the shown PIN
            (Method::PinEntry, AgentResponse::Displayed) => {
                self.link
                    .pincode_reply(local, peer, session.display_pin.as_deref())
            }
            // Cancel/error on the PIN path: zero-length PIN signals rejection
            (Method::PinEntry, _) => self.link.pincode_reply(local, peer, None),
            (Method::Confirmation, AgentResponse::Confirmed) => {
                self.link.confirm_reply(local, peer, peer_type, true)
            }
            (Method::Confirmation, _) => self.link.confirm_reply(local, peer, peer_type, false),
            (Method::PasskeyEntry, AgentResponse::Passkey(passkey)) => {
                self.link.passkey_reply(local, peer, peer_type, passkey)
            }
            (Method::PasskeyEntry, _) => {
                self.link
                    .passkey_reply(local, peer, peer_type, INVALID_PASSKEY)
            }
            // Display-only sessions owe the controller nothing
            (Method::PasskeyDisplay, _) => Ok(()),
        };

        outcome.map_err(|e| self.log_reply_failure(e))?;
        Ok(())
    }

    /// Open a session for `key` and hand the request to the agent. The
    /// caller guarantees no session is active for the device.
    fn start_session(&mut self, key: DeviceKey, method: Method, request: AgentRequest) {
        let Some(device) = self.registry.device_mut(key) else {
            return;
        };
        device.set_bonding_method(Some(method));
        let token = SessionToken {
            device: key,
            generation: device.generation(),
        };
        let display_pin = match &request {
            AgentRequest::DisplayPinCode { pin, .. } => Some(pin.clone()),
            _ => None,
        };
        self.sessions.insert(
            key,
            Session {
                token,
                method,
                display_pin,
            },
        );
        self.agent.request(token, request);
    }

    /// Successful credential persist: the device is now bonded and no
    /// longer temporary.
    fn mark_bonded(&mut self, key: DeviceKey) {
        if let Some(device) = self.registry.device_mut(key) {
            device.set_bonded(true);
            if device.is_temporary() {
                device.set_temporary(false);
            }
        }
    }

    fn set_blocked(&mut self, local: Address, peer: Address, blocked: bool) -> Result<()> {
        let Some(key) = resolve_existing(&self.registry, local, peer)? else {
            return Ok(());
        };
        if let Some(device) = self.registry.device_mut(key) {
            device.set_blocked(blocked);
        }
        Ok(())
    }

    fn peer_type(&self, key: DeviceKey) -> AddressType {
        self.registry
            .device(key)
            .map(|d| d.address_type())
            .unwrap_or_default()
    }

    fn log_reply_failure(&self, err: ReplyError) -> Error {
        warn!("sending controller reply failed: {err}");
        err.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    use bthost_keystore::MemoryStore;

    use crate::agent::MockPairingAgent;

    #[derive(Default)]
    struct RecordingLink {
        pins: Vec<Option<String>>,
        confirms: Vec<bool>,
    }

    struct SharedLink(Rc<RefCell<RecordingLink>>);

    impl ControllerLink for SharedLink {
        fn pincode_reply(
            &mut self,
            _local: Address,
            _peer: Address,
            pin: Option<&str>,
        ) -> std::result::Result<(), ReplyError> {
            self.0.borrow_mut().pins.push(pin.map(str::to_string));
            Ok(())
        }

        fn confirm_reply(
            &mut self,
            _local: Address,
            _peer: Address,
            _peer_type: AddressType,
            confirm: bool,
        ) -> std::result::Result<(), ReplyError> {
            self.0.borrow_mut().confirms.push(confirm);
            Ok(())
        }

        fn passkey_reply(
            &mut self,
            _local: Address,
            _peer: Address,
            _peer_type: AddressType,
            _passkey: u32,
        ) -> std::result::Result<(), ReplyError> {
            Ok(())
        }

        fn request_disconnect(
            &mut self,
            _local: Address,
            _peer: Address,
        ) -> std::result::Result<(), ReplyError> {
            Ok(())
        }
    }

    struct NullDiscovery;

    impl DiscoverySink for NullDiscovery {
        fn device_found(&mut self, _local: Address, _report: &DiscoveryReport) {}
    }

    fn local() -> Address {
        Address::new([0, 0, 0, 0, 0, 1])
    }

    fn peer() -> Address {
        Address::new([0, 0, 0, 0, 0, 2])
    }

    fn host_with_agent(agent: MockPairingAgent) -> (Host, Rc<RefCell<RecordingLink>>) {
        let link = Rc::new(RefCell::new(RecordingLink::default()));
        let mut registry = Registry::new();
        registry.add_adapter(local());
        let host = Host::new(
            registry,
            Box::new(MemoryStore::new()),
            Box::new(MemoryStore::new()),
            Box::new(agent),
            Box::new(SharedLink(link.clone())),
            Box::new(NullDiscovery),
        );
        (host, link)
    }

    #[test]
    fn confirmation_auto_rejects_without_agent() {
        let mut agent = MockPairingAgent::new();
        agent.expect_bound().return_const(false);
        agent.expect_request().never();

        let (mut host, link) = host_with_agent(agent);
        host.handle(Event::UserConfirmRequested {
            local: local(),
            peer: peer(),
            passkey: 123456,
        })
        .unwrap();

        assert_eq!(link.borrow().confirms, vec![false]);
        assert!(!host.session_active(local(), peer()));
    }

    #[test]
    fn confirmation_with_agent_starts_session() {
        let mut agent = MockPairingAgent::new();
        agent.expect_bound().return_const(true);
        agent
            .expect_request()
            .withf(|_, request| {
                matches!(request, AgentRequest::ConfirmPasskey { passkey: 123456 })
            })
            .times(1)
            .return_const(());

        let (mut host, link) = host_with_agent(agent);
        host.handle(Event::UserConfirmRequested {
            local: local(),
            peer: peer(),
            passkey: 123456,
        })
        .unwrap();

        assert!(link.borrow().confirms.is_empty());
        assert!(host.session_active(local(), peer()));
    }

    #[test]
    fn event_for_unknown_controller_is_fatal() {
        let (mut host, _link) = host_with_agent(MockPairingAgent::new());
        let other = Address::new([9, 9, 9, 9, 9, 9]);

        let err = host
            .handle(Event::PinRequested {
                local: other,
                peer: peer(),
                secure: false,
            })
            .unwrap_err();
        assert!(matches!(err, Error::Resolve(_)));
    }

    #[test]
    fn cached_pin_skips_agent_round_trip() {
        let mut agent = MockPairingAgent::new();
        agent.expect_request().never();

        let (mut host, link) = host_with_agent(agent);
        host.registry_mut()
            .adapter_mut(local())
            .unwrap()
            .set_fixed_pin(Some(crate::registry::FixedPin {
                pin: "0000".to_string(),
                display: false,
            }));

        host.handle(Event::PinRequested {
            local: local(),
            peer: peer(),
            secure: false,
        })
        .unwrap();

        assert_eq!(link.borrow().pins, vec![Some("0000".to_string())]);
        assert!(!host.session_active(local(), peer()));
    }
}

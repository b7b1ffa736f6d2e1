//! Identity resolution: (controller address, peer address) to handles.
//!
//! Every event handler starts here. An unknown controller is fatal for the
//! event; an unknown device is fatal only on the creating path. Callers of
//! [`resolve_existing`] that receive `None` silently ignore the event, which
//! is the expected outcome for informational events about untracked peers.

use bthost_core::error::ResolveError;
use bthost_core::Address;
use tracing::error;

use crate::registry::{DeviceKey, Registry};

/// Resolve to an existing device record, creating one if absent.
///
/// Fails with [`ResolveError::NoSuchController`] when no adapter context
/// exists for `local`, or [`ResolveError::DeviceCreateFailed`] when the
/// record could not be allocated. Both are fatal for the calling event.
pub fn resolve_create(
    registry: &mut Registry,
    local: Address,
    peer: Address,
) -> Result<DeviceKey, ResolveError> {
    let key = DeviceKey {
        adapter: local,
        peer,
    };

    if registry.adapter(local).is_none() {
        error!(%local, "unable to find matching adapter");
        return Err(ResolveError::NoSuchController(local));
    }

    registry
        .get_or_create_device(key)
        .map(|_| key)
        .ok_or(ResolveError::DeviceCreateFailed(peer))
}

/// Resolve to an existing device record without creating one.
///
/// Fails only when the controller context is unknown; an unknown device is
/// reported as `Ok(None)` and has no side effects.
pub fn resolve_existing(
    registry: &Registry,
    local: Address,
    peer: Address,
) -> Result<Option<DeviceKey>, ResolveError> {
    let Some(adapter) = registry.adapter(local) else {
        error!(%local, "unable to find matching adapter");
        return Err(ResolveError::NoSuchController(local));
    };

    let key = DeviceKey {
        adapter: local,
        peer,
    };
    Ok(adapter.device(peer).map(|_| key))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local() -> Address {
        Address::new([0, 0, 0, 0, 0, 1])
    }

    fn peer() -> Address {
        Address::new([0, 0, 0, 0, 0, 2])
    }

    #[test]
    fn unknown_controller_is_fatal() {
        let mut registry = Registry::new();
        assert_eq!(
            resolve_create(&mut registry, local(), peer()),
            Err(ResolveError::NoSuchController(local()))
        );
        assert_eq!(
            resolve_existing(&registry, local(), peer()),
            Err(ResolveError::NoSuchController(local()))
        );
    }

    #[test]
    fn create_path_allocates_record() {
        let mut registry = Registry::new();
        registry.add_adapter(local());

        let key = resolve_create(&mut registry, local(), peer()).unwrap();
        assert!(registry.device(key).is_some());
    }

    #[test]
    fn existing_path_has_no_side_effects() {
        let mut registry = Registry::new();
        registry.add_adapter(local());

        assert_eq!(resolve_existing(&registry, local(), peer()), Ok(None));
        let key = DeviceKey {
            adapter: local(),
            peer: peer(),
        };
        assert!(registry.device(key).is_none());
    }

    #[test]
    fn existing_path_finds_created_record() {
        let mut registry = Registry::new();
        registry.add_adapter(local());
        let key = resolve_create(&mut registry, local(), peer()).unwrap();

        assert_eq!(resolve_existing(&registry, local(), peer()), Ok(Some(key)));
    }
}

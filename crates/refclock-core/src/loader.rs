//! Process-wide firmware-loader registry.
//!
//! A generic "load firmware onto some device" surface dispatches to
//! family-specific loaders. Registration is one explicit call made at
//! process start, not implicit static initialization; each entry carries
//! the operator guidance to show when its loader fails mid-burn.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, LazyLock, Mutex};
use std::time::Duration;

use tracing::{error, info};

use crate::discovery::{DeviceAddr, DeviceFinder};
use crate::error::BurnError;
use crate::session::{BurnSession, SessionConfig};
use crate::transport::UdpConnector;

/// Arguments to a "load firmware" request.
#[derive(Debug, Clone, Default)]
pub struct LoaderArgs {
    /// Device-selection filters.
    pub filters: DeviceAddr,
    /// Explicit firmware path; a loader resolves its own default otherwise.
    pub firmware_path: Option<PathBuf>,
    /// Whether firmware should actually be loaded. A loader that matches a
    /// device but is asked not to load reports the request unhandled.
    pub load_firmware: bool,
}

/// A registered loader: returns whether it handled the request.
pub type LoaderFn = Box<dyn Fn(&LoaderArgs) -> Result<bool, BurnError> + Send + Sync>;

struct LoaderEntry {
    loader: LoaderFn,
    recovery_instructions: String,
}

static REGISTRY: LazyLock<Mutex<BTreeMap<String, LoaderEntry>>> =
    LazyLock::new(|| Mutex::new(BTreeMap::new()));

/// Register a loader under a device-family name, replacing any previous
/// registration for that name.
pub fn register_loader(name: &str, recovery_instructions: &str, loader: LoaderFn) {
    REGISTRY.lock().unwrap().insert(
        name.to_string(),
        LoaderEntry {
            loader,
            recovery_instructions: recovery_instructions.to_string(),
        },
    );
}

/// Operator guidance for a registered family, if any.
pub fn recovery_instructions(name: &str) -> Option<String> {
    REGISTRY
        .lock()
        .unwrap()
        .get(name)
        .map(|entry| entry.recovery_instructions.clone())
}

/// Walk the registry until some loader claims the request.
///
/// Returns whether any loader handled it. A loader failure is terminal: its
/// recovery instructions are logged and the error is handed back to the
/// caller for presentation.
pub fn load_firmware(args: &LoaderArgs) -> Result<bool, BurnError> {
    let registry = REGISTRY.lock().unwrap();
    for (name, entry) in registry.iter() {
        match (entry.loader)(args) {
            Ok(true) => {
                info!(family = %name, "firmware load handled");
                return Ok(true);
            }
            Ok(false) => continue,
            Err(e) => {
                error!(family = %name, "firmware load failed: {e}");
                error!("{}", entry.recovery_instructions);
                return Err(e);
            }
        }
    }
    Ok(false)
}

/// Operator guidance after a failed refclock burn.
pub const REFCLOCK_RECOVERY_INSTRUCTIONS: &str = "\
Aborting. The refclock firmware is now corrupt. The bootloader is still \
functional, but the unit will not distribute clock signals until a good \
image is burned. Run this utility again to restore functionality.";

/// Install the refclock loader into the registry.
///
/// Call once at process start. The loader sets up a session against the
/// supplied discovery collaborator, burns over UDP, and reports the request
/// unhandled when no unit matches the filters.
pub fn register_refclock_loader(finder: Arc<dyn DeviceFinder + Send + Sync>, config: SessionConfig) {
    register_loader(
        "refclock",
        REFCLOCK_RECOVERY_INSTRUCTIONS,
        Box::new(move |args: &LoaderArgs| {
            let connector = UdpConnector::new(Duration::from_millis(config.response_timeout_ms));
            let Some(mut session) = BurnSession::setup(
                finder.as_ref(),
                &connector,
                &args.filters,
                args.firmware_path.clone(),
                &config,
            )?
            else {
                return Ok(false);
            };
            if !args.load_firmware {
                return Ok(false);
            }

            info!(
                unit = %session.device().display_name(),
                addr = %session.device().addr().unwrap_or_default(),
                firmware = %session.given_filepath().display(),
                "burning firmware"
            );
            session.run(finder.as_ref())?;
            Ok(true)
        }),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_registry_dispatch_order_and_claiming() {
        let calls = Arc::new(AtomicUsize::new(0));

        let c = Arc::clone(&calls);
        register_loader(
            "aaa-declines",
            "n/a",
            Box::new(move |_| {
                c.fetch_add(1, Ordering::SeqCst);
                Ok(false)
            }),
        );
        let c = Arc::clone(&calls);
        register_loader(
            "bbb-claims",
            "n/a",
            Box::new(move |_| {
                c.fetch_add(1, Ordering::SeqCst);
                Ok(true)
            }),
        );
        register_loader(
            "ccc-unreached",
            "n/a",
            Box::new(|_| panic!("must not be called once a loader claims")),
        );

        let handled = load_firmware(&LoaderArgs::default()).unwrap();
        assert!(handled);
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        assert_eq!(recovery_instructions("bbb-claims").as_deref(), Some("n/a"));
        assert!(recovery_instructions("zzz-missing").is_none());
    }
}

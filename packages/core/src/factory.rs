//! Session factory: wire a facade to a fresh or restored controller.
//!
//! Every entry point follows the same steps:
//!
//! 1. pick the side (from [`SessionOptions::side`] or freshly generated; a
//!    restored session keeps the side its snapshot was taken under);
//! 2. pick the welcome handler (custom or the stock [`WelcomeEvaluator`]);
//! 3. build the requested facade;
//! 4. have the [`ControllerFactory`] build a controller that reports to it;
//! 5. bind the controller, install tracing if asked, and start it.

use std::sync::{Arc, Weak};

use tracing::{info, warn};
use wormhole_api::SerializedWormhole;

use crate::config::SessionOptions;
use crate::controller::{
    ControllerContext, ControllerFactory, EventSink, RestoredController, SessionController,
};
use crate::delegate::{DelegatedWormhole, WormholeDelegate};
use crate::error::WormholeError;
use crate::facade::FacadeCore;
use crate::identity::Side;
use crate::promise::PromiseWormhole;
use crate::trace;
use crate::welcome::{WelcomeEvaluator, WelcomeHandler};

fn fresh_side(options: &SessionOptions) -> Side {
    options.side.clone().unwrap_or_else(Side::generate)
}

fn build_core(side: Side, relay_url: &str, options: &SessionOptions) -> FacadeCore {
    let welcome: Arc<dyn WelcomeHandler> = match &options.welcome_handler {
        Some(handler) => Arc::clone(handler),
        None => Arc::new(WelcomeEvaluator::new(relay_url, options.client_version())),
    };
    FacadeCore::new(side, welcome).with_relay_url(relay_url)
}

fn bind_and_start(
    core: &FacadeCore,
    controller: Arc<dyn SessionController>,
    options: &SessionOptions,
) -> Result<(), WormholeError> {
    core.bind(controller)?;
    if let Some(t) = &options.trace {
        core.debug_set_trace(&t.client_name, &t.machines, trace::default_logger());
    }
    core.start();
    Ok(())
}

fn context(side: &Side, appid: &str, relay_url: &str, events: EventSink) -> ControllerContext {
    ControllerContext {
        side: side.clone(),
        appid: appid.to_string(),
        relay_url: relay_url.to_string(),
        events,
    }
}

/// Start a promise-style session.
pub fn create(
    appid: &str,
    relay_url: &str,
    controllers: &dyn ControllerFactory,
    options: SessionOptions,
) -> Result<Arc<PromiseWormhole>, WormholeError> {
    let core = build_core(fresh_side(&options), relay_url, &options);
    let wormhole = Arc::new(PromiseWormhole::new(core));
    let core = crate::Wormhole::core(wormhole.as_ref());
    info!(side = %core.side(), appid, relay_url, "creating promise-style session");

    let ctx = context(core.side(), appid, relay_url, EventSink::attach(&wormhole));
    let controller = controllers.create(ctx)?;
    bind_and_start(core, controller, &options)?;
    Ok(wormhole)
}

/// Start a delegate-style session reporting to `delegate`.
pub fn create_with_delegate(
    appid: &str,
    relay_url: &str,
    delegate: Arc<dyn WormholeDelegate>,
    controllers: &dyn ControllerFactory,
    options: SessionOptions,
) -> Result<Arc<DelegatedWormhole>, WormholeError> {
    let core = build_core(fresh_side(&options), relay_url, &options);
    let wormhole = Arc::new(DelegatedWormhole::new(core, delegate));
    let core = crate::Wormhole::core(wormhole.as_ref());
    info!(side = %core.side(), appid, relay_url, "creating delegate-style session");

    let ctx = context(core.side(), appid, relay_url, EventSink::attach(&wormhole));
    let controller = controllers.create(ctx)?;
    bind_and_start(core, controller, &options)?;
    Ok(wormhole)
}

/// Resume a delegate-style session from a snapshot.
///
/// Only delegate-style sessions can be restored: pending observations of a
/// promise-style session cannot be carried across a snapshot. The restored
/// facade does not replay events the controller delivered before the
/// snapshot was taken.
///
/// The facade takes its side and relay URL from the restored controller;
/// [`SessionOptions::side`] is ignored here.
///
/// # Errors
///
/// [`WormholeError::Snapshot`] if the envelope version is not 1, or
/// whatever the controller factory reports for its own state.
pub fn from_serialized(
    snapshot: SerializedWormhole,
    delegate: Arc<dyn WormholeDelegate>,
    controllers: &dyn ControllerFactory,
    options: SessionOptions,
) -> Result<Arc<DelegatedWormhole>, WormholeError> {
    snapshot.check_version()?;
    let SerializedWormhole { boss, .. } = snapshot;

    // The controller must exist before the facade can be built around its
    // side, and it needs a sink pointing at that facade.
    let mut restored: Option<Result<RestoredController, WormholeError>> = None;
    let wormhole = Arc::new_cyclic(|me: &Weak<DelegatedWormhole>| {
        let outcome = controllers.restore(EventSink::from_weak(me.clone()), boss);
        let (side, relay_url) = match &outcome {
            Ok(r) => (r.side.clone(), r.relay_url.clone()),
            Err(_) => (Side::generate(), String::new()),
        };
        restored = Some(outcome);
        DelegatedWormhole::new(build_core(side, &relay_url, &options), delegate)
    });
    let RestoredController { controller, .. } = restored
        .ok_or_else(|| WormholeError::Failed("controller factory was not consulted".into()))??;

    let core = crate::Wormhole::core(wormhole.as_ref());
    if let Some(wanted) = options.side.as_ref().filter(|s| *s != core.side()) {
        warn!(side = %core.side(), "ignoring side {wanted} from options: snapshot has its own");
    }
    info!(side = %core.side(), relay_url = core.relay_url(), "restoring delegate-style session");

    bind_and_start(core, controller, &options)?;
    Ok(wormhole)
}

//! Service Lifecycle Manager stage.

use anyhow::Result;
use tracing::{instrument, warn};

use crate::core::machine::StageOutcome;
use crate::core::render::{ServiceInputs, render_service_unit};
use crate::core::types::HostContext;
use crate::io::config::ServiceConfig;
use crate::io::layout::InstallLayout;
use crate::io::supervisor::{ServiceSupervisor, ServiceUnit};

/// Register and enable the background service when a supervisor exists.
///
/// Nothing here is fatal to the install: a missing supervisor is skipped and
/// a failed registration degrades.
#[instrument(skip_all, fields(service = %cfg.name))]
pub fn configure_service(
    supervisor: &dyn ServiceSupervisor,
    layout: &InstallLayout,
    host: &HostContext,
    cfg: &ServiceConfig,
    requested: bool,
) -> Result<StageOutcome> {
    if !cfg.enabled || !requested {
        return Ok(StageOutcome::Skipped(
            "background service not requested".to_string(),
        ));
    }
    if !supervisor.is_available() {
        return Ok(StageOutcome::Skipped(
            "no service supervisor on this host; run the command directly".to_string(),
        ));
    }

    let contents = render_service_unit(&ServiceInputs {
        description: &cfg.description,
        user: &host.user.name,
        group: &host.user.group,
        install_root: &layout.root,
        wrapper: &layout.wrapper_path,
        start_command: &cfg.start_command,
        stop_command: &cfg.stop_command,
    })?;
    let unit = ServiceUnit {
        name: cfg.name.clone(),
        path: layout.unit_path.clone(),
        contents,
    };

    match supervisor.register(&unit, &host.privilege) {
        Ok(()) => Ok(StageOutcome::Completed(format!(
            "{}.service registered and enabled (not started)",
            unit.name
        ))),
        Err(err) => {
            warn!(err = %err, "service registration failed");
            Ok(StageOutcome::Degraded(format!(
                "background service management unavailable: {err:#}"
            )))
        }
    }
}

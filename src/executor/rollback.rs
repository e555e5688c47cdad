//! Best-effort reversal of recorded effects.

use std::path::PathBuf;

use tracing::{info, warn};

use super::context::{InstallationContext, ModificationKind};
use crate::host::Host;

/// Outcome of a rollback. Failures are collected, never raised.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RollbackReport {
    pub reverted_env: usize,
    pub removed_paths: Vec<PathBuf>,
    pub warnings: Vec<String>,
}

impl RollbackReport {
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

/// Undo every environment modification and delete every recorded path
/// other than the working directory itself, newest first.
pub fn rollback<H: Host + ?Sized>(host: &H, ctx: &InstallationContext) -> RollbackReport {
    let mut report = RollbackReport::default();

    for m in ctx.env_modifications.iter().rev() {
        let result = match m.kind {
            ModificationKind::PathAddition => host.remove_from_path(&m.value),
            ModificationKind::EnvVariable => {
                host.restore_env_var(&m.name, m.original_value.as_deref())
            }
        };
        match result {
            Ok(()) => report.reverted_env += 1,
            Err(e) => {
                warn!(variable = %m.name, value = %m.value, "rollback: {}", e);
                report.warnings.push(format!("{}: {}", m.name, e));
            }
        }
    }

    for path in ctx.files.iter().rev() {
        if *path == ctx.work_dir {
            continue;
        }
        match host.delete(path) {
            Ok(()) => report.removed_paths.push(path.clone()),
            Err(e) => {
                warn!(path = %path.display(), "rollback: {}", e);
                report.warnings.push(format!("{}: {}", path.display(), e));
            }
        }
    }

    info!(
        package = %ctx.package,
        env = report.reverted_env,
        paths = report.removed_paths.len(),
        warnings = report.warnings.len(),
        "rollback finished"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::EnvironmentModification;
    use crate::executor::testing::FakeHost;

    fn failed_context() -> InstallationContext {
        let mut ctx = InstallationContext::new("app", "1.0.0", "/work/app");
        ctx.record_path(PathBuf::from("/work/app"));
        ctx.record_path(PathBuf::from("/work/app/out"));
        ctx.record_env(EnvironmentModification::path_addition("/work/app/out/bin"));
        ctx.record_env(EnvironmentModification::env_variable(
            "APP_HOME",
            "/work/app",
            Some("/old".to_string()),
        ));
        ctx
    }

    #[test]
    fn test_rollback_reverts_everything_but_work_dir() {
        let host = FakeHost::default();
        let report = rollback(&host, &failed_context());

        assert!(report.is_clean());
        assert_eq!(report.reverted_env, 2);
        assert_eq!(report.removed_paths, [PathBuf::from("/work/app/out")]);
        assert_eq!(
            host.calls(),
            [
                "restore_env_var APP_HOME",
                "remove_from_path /work/app/out/bin",
                "delete /work/app/out",
            ]
        );
    }

    #[test]
    fn test_rollback_failures_become_warnings() {
        let host = FakeHost {
            fail_removals: true,
            ..Default::default()
        };
        let report = rollback(&host, &failed_context());

        assert!(!report.is_clean());
        assert_eq!(report.warnings.len(), 2);
        assert_eq!(report.reverted_env, 1);
        assert!(report.removed_paths.is_empty());
    }
}

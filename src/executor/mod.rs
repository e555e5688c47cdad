//! Instruction executor: runs a parsed script against an installation context.
//!
//! Execution is strictly sequential. The first failing instruction marks the
//! context `Failed` and stops the run; effects applied so far stay recorded
//! in the context so the caller can [`rollback`] them.

mod context;
mod error;
mod rollback;

pub use context::{
    EnvironmentModification, InstallStatus, InstallationContext, ModificationKind,
};
pub use error::ExecuteError;
pub use rollback::{RollbackReport, rollback};

use tracing::{debug, info, warn};

use crate::host::{Host, HostError};
use crate::instruction::{Instruction, InstructionKind};

/// Drives instructions through a [`Host`].
pub struct Executor<'h, H: Host + ?Sized> {
    host: &'h H,
}

impl<'h, H: Host + ?Sized> Executor<'h, H> {
    pub fn new(host: &'h H) -> Self {
        Self { host }
    }

    /// Run every instruction in order against `ctx`.
    ///
    /// `ctx` must be `Pending`. On return it is `Completed` or `Failed`.
    pub fn run(
        &self,
        instructions: &[Instruction],
        ctx: &mut InstallationContext,
    ) -> Result<InstallStatus, ExecuteError> {
        if ctx.status != InstallStatus::Pending {
            return Err(ExecuteError::AlreadyStarted(ctx.status));
        }

        ctx.begin();
        info!(
            package = %ctx.package,
            version = %ctx.version,
            steps = instructions.len(),
            "executing instructions"
        );

        for ins in instructions {
            debug!(line = ins.line, instruction = %ins.raw, "apply");
            if !ins.kind.arity().contains(&ins.args.len()) {
                let expected = ins.kind.arity_description();
                ctx.fail(format!("line {}: {}: expected {}", ins.line, ins.raw, expected));
                return Err(ExecuteError::Malformed {
                    line: ins.line,
                    raw: ins.raw.clone(),
                    expected,
                });
            }
            if let Err(source) = self.apply(ins, ctx) {
                ctx.fail(format!("line {}: {}: {}", ins.line, ins.raw, source));
                return Err(ExecuteError::Instruction {
                    line: ins.line,
                    raw: ins.raw.clone(),
                    source,
                });
            }
        }

        ctx.complete();
        Ok(ctx.status)
    }

    /// Apply one arity-checked instruction.
    fn apply(&self, ins: &Instruction, ctx: &mut InstallationContext) -> Result<(), HostError> {
        let src = ctx.resolve(ins.source());
        let dst = ins.destination().map(|d| ctx.resolve(d));

        match ins.kind {
            InstructionKind::Extract | InstructionKind::ExtractTar | InstructionKind::ExtractTarGz => {
                let dest = dst.unwrap_or_else(|| ctx.work_dir.clone());
                match ins.kind {
                    InstructionKind::ExtractTar => self.host.extract_tar(&src, &dest)?,
                    InstructionKind::ExtractTarGz => self.host.extract_tar_gz(&src, &dest)?,
                    _ => self.host.extract_zip(&src, &dest)?,
                }
                if let Err(e) = self.host.delete(&src) {
                    warn!(archive = %src.display(), "failed to delete archive: {}", e);
                }
                ctx.record_path(dest);
            }
            InstructionKind::Move | InstructionKind::Rename => {
                let dst = dst.unwrap_or_else(|| ctx.work_dir.clone());
                self.host.move_path(&src, &dst)?;
                ctx.record_path(dst);
            }
            InstructionKind::Copy => {
                let dst = dst.unwrap_or_else(|| ctx.work_dir.clone());
                self.host.copy_path(&src, &dst)?;
                ctx.record_path(dst);
            }
            InstructionKind::Delete => self.host.delete(&src)?,
            InstructionKind::Chmod => self.host.make_executable(&src)?,
            InstructionKind::AddToPath => match self.host.add_to_path(&src)? {
                Some(value) => {
                    info!(dir = %value, "added to PATH");
                    ctx.record_env(EnvironmentModification::path_addition(value));
                }
                None => {
                    debug!(dir = %src.display(), "already on PATH, not recorded");
                    ctx.record_shared_path(src.display().to_string());
                }
            },
            InstructionKind::SetLocation => ctx.location = Some(src),
            InstructionKind::RunScript => {
                let work_dir = ctx.work_dir.clone();
                let args = ins.args.get(1..).unwrap_or_default();
                self.host.run_script(&src, args, &work_dir)?;
            }
        }

        Ok(())
    }
}

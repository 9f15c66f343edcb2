use super::{print_json, Context};
use crate::exit;
use crate::{ui_err, ui_ok, ui_warn};
use resloc_core::ResLocError;
use std::path::Path;

pub fn run_translate(ctx: &Context, dir: &Path, table: &Path) -> color_eyre::Result<i32> {
    tracing::debug!(event = "translate_args", dir = %dir.display(), table = %table.display());
    if !dir.is_dir() {
        ui_err!("Directory not found: {}", dir.display());
        return Ok(exit::NO_DIRECTORY);
    }

    let mut confirm = ctx.confirmation();
    let summary =
        resloc_services::translate(dir, table, &ctx.report_options(), confirm.as_mut())?;

    if ctx.json() {
        print_json(&summary)?;
    } else {
        for f in &summary.files {
            if f.status == "kept-existing" {
                ui_warn!("Kept existing {}", f.output);
            } else {
                ui_ok!("{} -> {} ({} replaced)", f.path, f.output, f.replaced);
            }
            if f.node_failures > 0 {
                ui_warn!("{} nodes in {} could not be updated", f.node_failures, f.path);
            }
        }
        for f in &summary.failed {
            ui_warn!("Skipped {}: {}", f.path, f.error);
        }
    }

    if summary.outcome == "cancelled" {
        return Err(ResLocError::UserCancelled(format!(
            "{} reports not translated",
            summary.not_attempted.len()
        ))
        .into());
    }
    Ok(exit::OK)
}

use super::{print_json, Context};
use crate::exit;
use crate::{ui_err, ui_ok, ui_warn};
use std::path::Path;

pub fn run_prepare(ctx: &Context, dir: &Path, table: &Path) -> color_eyre::Result<i32> {
    tracing::debug!(event = "prepare_args", dir = %dir.display(), table = %table.display());
    if !dir.is_dir() {
        ui_err!("Directory not found: {}", dir.display());
        return Ok(exit::NO_DIRECTORY);
    }

    let summary = resloc_services::prepare(dir, table, &ctx.report_options())?;

    if ctx.json() {
        print_json(&summary)?;
    } else {
        for f in &summary.failed {
            ui_warn!("Skipped unreadable report {}: {}", f.path, f.error);
        }
        ui_ok!(
            "Translation table written: {} ({} values from {} reports)",
            summary.table,
            summary.values,
            summary.files.len()
        );
    }
    Ok(exit::OK)
}

use super::{print_json, Context};
use crate::exit;
use crate::{ui_err, ui_info, ui_ok, ui_out, ui_warn};
use color_eyre::eyre::eyre;
use resloc_core::{Decision, ResLocError};
use resloc_services::{discover, plan, run_batch, BatchOutcome, TrashDir};
use std::path::Path;

pub fn run_swap(
    ctx: &Context,
    neutral_tag: &str,
    import_tag: &str,
    dir: &Path,
    dry_run: bool,
) -> color_eyre::Result<i32> {
    tracing::debug!(
        event = "swap_args",
        neutral = neutral_tag,
        import = import_tag,
        dir = %dir.display(),
        dry_run = dry_run
    );
    if !dir.is_dir() {
        ui_err!("Directory not found: {}", dir.display());
        return Ok(exit::NO_DIRECTORY);
    }
    let opts = ctx.swap_options();

    if dry_run {
        let candidates = discover(dir, neutral_tag, import_tag, &opts)?;
        let plan = plan(&candidates);
        if ctx.json() {
            print_json(&plan)?;
        } else {
            for e in &plan.ready {
                ui_out!("would rotate {} <- {} (old values to {})", e.neutral, e.import, e.export);
            }
            for s in &plan.skipped {
                ui_out!("skip {} ({})", s.path, s.reason);
            }
            ui_info!("DRY-RUN: {} to rotate, {} skipped", plan.ready.len(), plan.skipped.len());
        }
        return Ok(exit::OK);
    }

    let mut confirm = ctx.confirmation();
    let question = format!(
        "Will recursively switch neutral language from [{neutral_tag}] to [{import_tag}] \
         in directory {}",
        dir.display()
    );
    match confirm.decide(&question)? {
        Decision::Proceed => {}
        Decision::Skip => {
            ui_info!("Nothing changed");
            return Ok(exit::DECLINED);
        }
        Decision::Cancel => {
            return Err(ResLocError::UserCancelled("swap not started".into()).into());
        }
    }

    let candidates = discover(dir, neutral_tag, import_tag, &opts)?;
    let trash = TrashDir::new(opts.trash_path(dir), dir);
    let report = run_batch(candidates, confirm.as_mut(), &trash);

    if ctx.json() {
        print_json(&report.to_summary())?;
    } else {
        for r in &report.completed {
            ui_ok!("{}: {} values swapped, old values in {}", r.neutral, r.swapped.len(), r.export);
            if !r.missing_in_neutral.is_empty() {
                ui_warn!(
                    "{}: keys not in neutral file: {}",
                    r.neutral,
                    r.missing_in_neutral.join(", ")
                );
            }
        }
        for (base, reason) in &report.skipped {
            ui_info!("Skipped {} ({})", base.display(), reason.as_str());
        }
        for t in &report.declined {
            ui_info!("Declined {}", t.neutral.display());
        }
        if !report.not_attempted.is_empty() {
            ui_warn!("{} files were not processed", report.not_attempted.len());
        }
    }

    match report.outcome {
        BatchOutcome::Completed => Ok(exit::OK),
        BatchOutcome::Cancelled => Err(ResLocError::UserCancelled(format!(
            "{} rotations completed before cancel",
            report.completed.len()
        ))
        .into()),
        BatchOutcome::Failed(reason) => Err(eyre!("rotation failed: {reason}")),
    }
}

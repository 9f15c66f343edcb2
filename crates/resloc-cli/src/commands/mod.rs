pub mod prepare;
pub mod swap;
pub mod translate;

use crate::prompt::ConsolePrompt;
use clap::ValueEnum;
use resloc_config::ResLocConfig;
use resloc_services::{AlwaysProceed, ConfirmationPort, ReportOptions, SwapOptions};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Text,
    Json,
}

/// Settings every command sees.
pub struct Context {
    pub yes: bool,
    pub format: Format,
    pub config: ResLocConfig,
}

impl Context {
    pub fn confirmation(&self) -> Box<dyn ConfirmationPort> {
        if self.yes {
            Box::new(AlwaysProceed)
        } else {
            Box::new(ConsolePrompt::new(std::io::stdin().lock()))
        }
    }

    pub fn report_options(&self) -> ReportOptions {
        let mut opts = ReportOptions::default();
        if let Some(cfg) = &self.config.report {
            if let Some(ext) = &cfg.extension {
                opts.extension = ext.trim_start_matches('.').to_string();
            }
            if let Some(sel) = &cfg.selector {
                opts.selector = sel.clone();
            }
            if let Some(prefix) = &cfg.output_prefix {
                opts.output_prefix = prefix.clone();
            }
        }
        opts
    }

    pub fn swap_options(&self) -> SwapOptions {
        let mut opts = SwapOptions::default();
        if let Some(cfg) = &self.config.swap {
            if let Some(ext) = &cfg.extension {
                opts.extension = ext.trim_start_matches('.').to_string();
            }
            if let Some(dir) = &cfg.trash_dir {
                opts.trash_dir = PathBuf::from(dir);
            }
        }
        opts
    }

    pub fn json(&self) -> bool {
        self.format == Format::Json
    }
}

pub fn print_json<T: Serialize>(value: &T) -> color_eyre::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

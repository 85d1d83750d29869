//! Outputs command - show what the parts bundle would upload

use crate::cli::args::{OutputFormat, OutputsArgs};
use crate::config::Config;
use crate::error::SyncResult;
use crate::fingerprint::{CompilationOutput, FingerprintProcessor, SourceState};
use crate::project::ProjectLayout;
use crate::ui::{self, UiContext};
use console::style;

/// Execute the outputs command
pub async fn execute(args: OutputsArgs, config: &Config) -> SyncResult<()> {
    let root = super::project_root(args.project)?;
    let layout = ProjectLayout::new(&root, &config.layout)?;

    let state_file = args.state.unwrap_or_else(|| layout.sources_state_file.clone());
    let state = SourceState::load(&state_file)?;

    let processor = FingerprintProcessor::new(layout.out_dir.clone())
        .with_groups(config.fingerprint.groups.clone())
        .with_token(config.fingerprint.build_dir_token.clone());
    let outputs = processor.compilation_outputs(&state)?;

    match args.format {
        OutputFormat::Table => print_table(&outputs),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&outputs)?),
        OutputFormat::Plain => {
            for output in &outputs {
                println!("{}", output.address());
            }
        }
    }

    Ok(())
}

fn print_table(outputs: &[CompilationOutput]) {
    let ctx = UiContext::detect();

    if outputs.is_empty() {
        ui::step_info(&ctx, "No compilation outputs in source state");
        return;
    }

    ui::intro(&ctx, "Compilation outputs");

    println!(
        "{:<32} {:<28} {:<34} {}",
        style("NAME").bold(),
        style("CATEGORY").bold(),
        style("HASH").bold(),
        style("PATH").bold()
    );
    println!("{}", "-".repeat(110));

    for output in outputs {
        let path = if output.local_path.is_dir() {
            style(output.local_path.display().to_string()).dim()
        } else {
            style(format!("{} (missing)", output.local_path.display())).yellow()
        };

        println!(
            "{:<32} {:<28} {:<34} {}",
            output.name, output.category, output.hash, path
        );
    }

    println!();
    println!("{} output(s)", outputs.len());
}

//! Coordinator assembly and the interactive menu loop.

use crate::config::EnsembleConfig;
use crate::display::{ConsoleDisplay, ConsoleProgress};
use crate::menu::{parse_choice, render_menu, MenuChoice};
use ensemble_builtins::register_builtins;
use ensemble_core::{EnsembleError, EnsembleResult};
use ensemble_orchestrator::{
    render_result, BroadcastEngine, Participant, ParticipantRegistry, TaskCategory,
    TaskCoordinator,
};
use ensemble_skills::CapabilityRegistry;
use std::io::{BufRead, Write};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Register the built-in providers, resolve configured participants against
/// them, and wire a coordinator with console rendering.
pub fn build_coordinator(config: &EnsembleConfig) -> EnsembleResult<TaskCoordinator> {
    let mut capabilities = CapabilityRegistry::new();
    register_builtins(&mut capabilities, &config.builtins);

    let mut registry = ParticipantRegistry::new();
    for spec in config.participants() {
        let capability = capabilities.get(&spec.capability).cloned().ok_or_else(|| {
            EnsembleError::Config(format!("Unknown capability '{}'", spec.capability))
        })?;
        let description = spec
            .description
            .unwrap_or_else(|| capability.descriptor().description.clone());
        let mut participant = Participant::new(spec.identity, description, capability);
        if spec.protected {
            participant = participant.protected();
        }
        registry.register(participant)?;
    }
    info!(participants = registry.len(), "Participants ready");

    Ok(TaskCoordinator::new(
        config.orchestration.clone(),
        config.timeout_profile(),
        registry,
        Arc::new(BroadcastEngine::new()),
    )
    .with_display_sink(Arc::new(ConsoleDisplay))
    .with_progress_sink(Arc::new(ConsoleProgress::default())))
}

/// Forward lines from `reader` over a channel, read on a detached thread.
///
/// A read blocked on a terminal never holds up runtime shutdown. The channel
/// closes at end of input.
pub fn spawn_line_reader<R>(reader: R) -> mpsc::Receiver<String>
where
    R: BufRead + Send + 'static,
{
    let (tx, rx) = mpsc::channel(16);
    let spawned = std::thread::Builder::new()
        .name("ensemble-input".to_string())
        .spawn(move || {
            for line in reader.lines() {
                let Ok(line) = line else { break };
                if tx.blocking_send(line).is_err() {
                    break;
                }
            }
        });
    if let Err(e) = spawned {
        warn!(error = %e, "Could not start the input reader");
    }
    rx
}

/// Read one trimmed line, or `None` at end of input.
async fn prompt<W: Write>(
    input: &mut mpsc::Receiver<String>,
    out: &mut W,
    text: &str,
) -> EnsembleResult<Option<String>> {
    write!(out, "{text}")?;
    out.flush()?;
    Ok(input.recv().await.map(|line| line.trim().to_string()))
}

/// Menu loop: pick a preset or type a query, run it, ask whether to go on.
pub async fn run_session<W: Write>(
    coordinator: &TaskCoordinator,
    mut input: mpsc::Receiver<String>,
    out: &mut W,
) -> EnsembleResult<()> {
    let participants: Vec<(String, String)> = coordinator
        .participants()
        .into_iter()
        .map(|p| (p.identity, p.description))
        .collect();

    loop {
        writeln!(out, "{}", render_menu(&participants))?;
        let Some(choice) = prompt(&mut input, out, "\nSelect (e.g. 1, 2, 99 or 0): ").await? else {
            break;
        };

        let (query, category) = match parse_choice(&choice) {
            MenuChoice::Exit => break,
            MenuChoice::Custom => {
                let Some(query) = prompt(&mut input, out, "\nEnter your question: ").await? else {
                    break;
                };
                if query.is_empty() {
                    writeln!(out, "The question cannot be empty")?;
                    continue;
                }
                (query, TaskCategory::MultiAgent)
            }
            MenuChoice::Preset(preset) => {
                writeln!(out, "\nSelected: {}", preset.query)?;
                writeln!(out, "Category: {}", preset.category)?;
                (preset.query.to_string(), preset.category)
            }
            MenuChoice::Invalid => {
                writeln!(out, "Invalid selection, try again")?;
                continue;
            }
        };

        writeln!(
            out,
            "\nDeadline: {}s",
            coordinator.policy().effective_timeout(category)
        )?;
        let result = coordinator.process_query(&query, category).await;
        writeln!(out, "{}", render_result(&result))?;
        writeln!(
            out,
            "{}",
            if result.success { "Query completed" } else { "Query failed" }
        )?;

        let again = prompt(&mut input, out, "\nContinue? (y/n): ").await?;
        match again.as_deref().map(str::to_lowercase).as_deref() {
            Some("y" | "yes" | "") => {}
            _ => break,
        }
    }

    writeln!(out, "\nGoodbye!")?;
    Ok(())
}

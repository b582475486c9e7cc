//! Local batch execution against the simulated editor.

use super::{Session, Workspace};
use anyhow::{Context, Result};
use buildq_core::{BatchResult, TargetId, TargetSwitcher};
use buildq_scheduler::{Step, Submission, Suspension};
use std::sync::{Arc, Mutex};
use std::time::Duration;

type Delivered = Arc<Mutex<Option<Vec<BatchResult>>>>;

/// Submit a named batch and drive it to completion.
pub async fn run(config_path: &str, batch: &str, active: Option<String>) -> Result<()> {
    let workspace = Workspace::load(config_path)?;
    let builds = workspace
        .project
        .batch(batch)
        .with_context(|| format!("Unknown batch: {}", batch))?
        .builds
        .clone();

    let mut session = workspace.session(batch, active.map(TargetId::from))?;

    println!("Running batch: {}", batch);
    println!("Builds: {}", builds.len());
    println!("Active target: {}", session.editor.active_target());
    println!("\n--- Starting batch execution ---\n");

    let (delivered, on_complete) = result_sink();
    let step = match session
        .queue
        .submit(&builds, on_complete)
        .context("Failed to submit build batch")?
    {
        Submission::Accepted(step) => step,
        Submission::Rejected(results) => {
            print_summary(&results);
            anyhow::bail!(
                "Another build batch is in flight; run `buildq resume` or `buildq cancel` first"
            );
        }
    };

    if drive(&mut session, Some(step)).await? {
        finish(&delivered)
    } else {
        Ok(())
    }
}

/// Continue a batch left behind by an earlier run.
pub async fn resume(config_path: &str) -> Result<()> {
    let workspace = Workspace::load(config_path)?;
    let mut session = workspace.session("", None)?;

    let (delivered, on_complete) = result_sink();
    session.queue.set_completion_handler(on_complete);

    if !session.queue.resume().context("Failed to load build queue")? {
        println!("No build batch queued");
        return Ok(());
    }

    let status = session.queue.status()?;
    println!(
        "Resuming batch: {}/{} builds finished",
        status.finished, status.total
    );
    println!("Active target: {}", session.editor.active_target());
    println!("\n--- Resuming batch execution ---\n");

    if drive(&mut session, None).await? {
        finish(&delivered)
    } else {
        Ok(())
    }
}

/// Tick the editor until the batch completes.
///
/// Returns `false` when interrupted; the batch stays persisted for `resume`.
async fn drive(session: &mut Session, mut step: Option<Step>) -> Result<bool> {
    let mut interval = tokio::time::interval(Duration::from_millis(session.tick_ms));
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut last: Option<Suspension> = None;

    loop {
        match step.take() {
            Some(Step::Completed { .. } | Step::Idle) => return Ok(true),
            Some(Step::Suspended(suspension)) => {
                if last.as_ref() != Some(&suspension) {
                    report(&suspension);
                    last = Some(suspension);
                }
            }
            None => {}
        }

        tokio::select! {
            _ = interval.tick() => {
                if session.editor.tick()? {
                    step = Some(session.queue.run_step().context("Build step failed")?);
                }
            }
            _ = &mut ctrl_c => {
                println!("\nInterrupted; the batch stays queued. Run `buildq resume` to continue.");
                return Ok(false);
            }
        }
    }
}

fn report(suspension: &Suspension) {
    match suspension {
        Suspension::Recompiling => println!("… Waiting for recompilation"),
        Suspension::Switching(target) => println!("⇄ Switching active target to '{}'", target),
        Suspension::Restoring(target) => println!("⇄ Restoring original target '{}'", target),
    }
}

fn result_sink() -> (Delivered, impl FnOnce(Vec<BatchResult>) + Send + 'static) {
    let delivered: Delivered = Arc::new(Mutex::new(None));
    let slot = delivered.clone();
    (delivered, move |results| {
        if let Ok(mut slot) = slot.lock() {
            *slot = Some(results);
        }
    })
}

fn finish(delivered: &Delivered) -> Result<()> {
    let results = delivered.lock().ok().and_then(|mut slot| slot.take());
    let Some(results) = results else {
        println!("--- Batch is no longer queued ---");
        return Ok(());
    };

    print_summary(&results);

    let failed = results.iter().filter(|r| r.is_failure()).count();
    if failed == 0 {
        println!("\n✓ All builds succeeded!");
        Ok(())
    } else {
        anyhow::bail!("{} of {} builds failed", failed, results.len());
    }
}

fn print_summary(results: &[BatchResult]) {
    println!("\n--- Build Summary ---");
    for result in results {
        let mark = if result.success { "✓" } else { "✗" };
        println!("  {} {} - {}", mark, result.config_id, result.message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use buildq_core::{ConfigId, ResourceId};
    use std::path::{Path, PathBuf};

    const PROJECT: &str = r#"
        queue {
            switch-ticks 2
            recompile-ticks 1
        }
        targets "linux" "windows"
        configuration "linux-player" target="linux" { run "echo ${target} >> built.txt"; }
        configuration "win-player" target="windows" { run "echo ${target} >> built.txt"; }
        configuration "docs" { run "echo docs >> built.txt"; }
        batch "release" {
            build "win-player" "linux-player" "docs"
        }
    "#;

    fn project_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("buildq-run-{}", ResourceId::new()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("buildq.kdl"), PROJECT).unwrap();
        dir
    }

    fn load(dir: &Path) -> Workspace {
        Workspace::load(dir.join("buildq.kdl").to_str().unwrap()).unwrap()
    }

    /// Tick the host by hand until the batch completes.
    fn tick_until_done(session: &mut Session) -> Step {
        for _ in 0..64 {
            if session.editor.tick().unwrap() {
                let step = session.queue.run_step().unwrap();
                if matches!(step, Step::Completed { .. }) {
                    return step;
                }
            }
        }
        panic!("batch did not complete");
    }

    fn release(workspace: &Workspace) -> Vec<ConfigId> {
        workspace.project.batch("release").unwrap().builds.clone()
    }

    #[test]
    fn test_batch_switches_targets_and_restores() {
        let dir = project_dir();
        let workspace = load(&dir);
        let mut session = workspace.session("release", None).unwrap();
        let (delivered, on_complete) = result_sink();

        let step = match session.queue.submit(&release(&workspace), on_complete).unwrap() {
            Submission::Accepted(step) => step,
            Submission::Rejected(results) => panic!("rejected: {results:?}"),
        };
        assert_eq!(
            step,
            Step::Suspended(Suspension::Switching(TargetId::new("windows")))
        );

        assert_eq!(tick_until_done(&mut session), Step::Completed { results: 3 });
        assert_eq!(session.editor.active_target(), TargetId::new("linux"));

        let results = delivered.lock().unwrap().take().unwrap();
        let ids: Vec<&str> = results.iter().map(|r| r.config_id.as_str()).collect();
        assert_eq!(ids, vec!["win-player", "linux-player", "docs"]);
        assert!(results.iter().all(|r| r.success));

        let built = std::fs::read_to_string(dir.join("built.txt")).unwrap();
        assert_eq!(built, "linux\ndocs\nwindows\n");

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_interrupted_batch_resumes_in_new_session() {
        let dir = project_dir();
        let workspace = load(&dir);
        {
            let mut session = workspace.session("release", None).unwrap();
            let (_delivered, on_complete) = result_sink();
            session.queue.submit(&release(&workspace), on_complete).unwrap();
            assert!(session.editor.is_switching());
        }

        let mut session = workspace.session("", None).unwrap();
        assert!(session.editor.is_switching());
        let (delivered, on_complete) = result_sink();
        session.queue.set_completion_handler(on_complete);
        assert!(session.queue.resume().unwrap());

        assert_eq!(tick_until_done(&mut session), Step::Completed { results: 3 });
        let results = delivered.lock().unwrap().take().unwrap();
        assert_eq!(results.len(), 3);
        assert!(!session.queue.is_building().unwrap());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_rejected_run_with_active_target_leaves_batch_resumable() {
        let dir = project_dir();
        let workspace = load(&dir);
        {
            let mut session = workspace.session("release", None).unwrap();
            let (_delivered, on_complete) = result_sink();
            session.queue.submit(&release(&workspace), on_complete).unwrap();
            assert!(session.editor.is_switching());
        }

        {
            let mut other = workspace
                .session("release", Some(TargetId::new("linux")))
                .unwrap();
            assert!(other.editor.is_switching());
            let (_rejected, on_complete) = result_sink();
            let submission = other.queue.submit(&release(&workspace), on_complete).unwrap();
            assert!(matches!(submission, Submission::Rejected(_)));
        }

        let mut session = workspace.session("", None).unwrap();
        assert!(session.editor.is_switching());
        let (delivered, on_complete) = result_sink();
        session.queue.set_completion_handler(on_complete);
        assert!(session.queue.resume().unwrap());

        assert_eq!(tick_until_done(&mut session), Step::Completed { results: 3 });
        assert_eq!(delivered.lock().unwrap().take().unwrap().len(), 3);
        assert_eq!(session.editor.active_target(), TargetId::new("linux"));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_active_target_applies_when_idle() {
        let dir = project_dir();
        let workspace = load(&dir);

        let session = workspace
            .session("release", Some(TargetId::new("windows")))
            .unwrap();
        assert_eq!(session.editor.active_target(), TargetId::new("windows"));
        drop(session);

        let session = workspace.session("", None).unwrap();
        assert_eq!(session.editor.active_target(), TargetId::new("windows"));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_second_submission_rejected_while_in_flight() {
        let dir = project_dir();
        let workspace = load(&dir);
        let mut session = workspace.session("release", None).unwrap();
        let (_first, on_complete) = result_sink();
        session.queue.submit(&release(&workspace), on_complete).unwrap();

        let mut other = workspace.session("release", None).unwrap();
        let (_second, on_complete) = result_sink();
        match other.queue.submit(&[ConfigId::new("docs")], on_complete).unwrap() {
            Submission::Rejected(results) => {
                assert_eq!(results.len(), 1);
                assert!(results[0].message.contains("queue while executing"));
            }
            Submission::Accepted(step) => panic!("accepted: {step:?}"),
        }

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_result_sink_captures_delivery() {
        let (delivered, on_complete) = result_sink();
        on_complete(vec![BatchResult::success(ConfigId::new("a"), "built")]);
        assert!(finish(&delivered).is_ok());
        assert!(delivered.lock().unwrap().is_none());
    }

    #[test]
    fn test_failed_build_fails_the_command() {
        let (delivered, on_complete) = result_sink();
        on_complete(vec![
            BatchResult::success(ConfigId::new("a"), "built"),
            BatchResult::failure(ConfigId::new("b"), "missing required input: x"),
        ]);
        let err = finish(&delivered).unwrap_err();
        assert_eq!(err.to_string(), "1 of 2 builds failed");
    }

    #[test]
    fn test_undelivered_batch_is_not_an_error() {
        let (delivered, _on_complete) = result_sink();
        assert!(finish(&delivered).is_ok());
    }
}

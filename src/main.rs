use releaser::changelog::{render_section, write_changelog, ChangelogSource, GitHubPrSource, GitLogSource, PrCache};
use releaser::cli::commands::{
    BumpArgs, ChangelogCommand, CheckCommand, CiCommand, CiWaitCommand, ReleaseCommand, TagCommand,
};
use releaser::cli::display::run_display;
use releaser::cli::output::*;
use releaser::cli::{Cli, Command};
use releaser::core::config::{ChangelogSourceKind, ReleaseFileConfig};
use releaser::core::plan::{
    artifact_wait_options, ci_wait_options, resolve_github, resolve_previous_tag, GitHubTarget,
    ReleaseConfig,
};
use releaser::core::trigger::{load_workflow_triggers, triggered_by_tag};
use releaser::core::version::{next_from_tags, BumpKind};
use releaser::execution::events::DEFAULT_QUEUE_CAPACITY;
use releaser::execution::executor::tag_message;
use releaser::execution::{
    wait_until_ready, CancelSignal, ChannelSink, Collaborators, EventSink, ReadinessCheck,
    ReleaseEvent, ReleaseOrchestrator, StepExecutor, StepReporter, WaitOptions,
};
use releaser::providers::pypi::package_version;
use releaser::providers::{
    slack, CiCompletionCheck, CiRunSource, GitCli, GitHubClient, JustRunner, PackageIndexCheck,
    RegistryCheck, Vcs,
};

use anyhow::{anyhow, Context, Result};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    // Initialize logging. Logs go to stderr so stdout stays for release output.
    let log_level = if cli.verbose { Level::DEBUG } else { Level::WARN };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.as_str().to_lowercase()));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set logging subscriber")?;

    // Execute command
    match &cli.command {
        Command::Release(cmd) => run_release(cmd, &cli).await?,
        Command::Tag(TagCommand::Next(cmd)) => next_tag(&cmd.bump, cmd.create, &cli).await?,
        Command::Ci(CiCommand::Workflows(cmd)) => list_workflows(&cmd.tag, &cli)?,
        Command::Ci(CiCommand::Wait(cmd)) => wait_for_ci(cmd, &cli).await?,
        Command::Check(cmd) => check_artifact(cmd, &cli).await?,
        Command::Changelog(cmd) => generate_changelog(cmd, &cli).await?,
    }

    Ok(())
}

fn load_config(cli: &Cli) -> Result<ReleaseFileConfig> {
    ReleaseFileConfig::load_or_default(cli.config_path()).context("Failed to load release config")
}

fn github_client(target: &GitHubTarget) -> Result<Arc<GitHubClient>> {
    let client = GitHubClient::new(
        &target.api_url,
        &target.owner,
        &target.repo,
        Some(target.token.clone()),
    )?;
    Ok(Arc::new(client))
}

fn changelog_source(
    kind: ChangelogSourceKind,
    github: Option<&GitHubTarget>,
    vcs: Arc<dyn Vcs>,
    repo_root: &Path,
    cache_prs: bool,
    pr_limit: usize,
    dry_run: bool,
) -> Result<Arc<dyn ChangelogSource>> {
    match kind {
        ChangelogSourceKind::Commits => Ok(Arc::new(GitLogSource::new(vcs)) as Arc<dyn ChangelogSource>),
        ChangelogSourceKind::Prs => {
            let target = github.ok_or_else(|| {
                anyhow!("pull request changelogs need GitHub enabled and a token (GITHUB_TOKEN)")
            })?;
            let mut source = GitHubPrSource::new(github_client(target)?, vcs)
                .with_limit(pr_limit)
                .dry_run(dry_run);
            if cache_prs {
                source = source.with_cache(PrCache::in_repo(repo_root));
            }
            Ok(Arc::new(source) as Arc<dyn ChangelogSource>)
        }
    }
}

fn build_collaborators(config: &ReleaseConfig, vcs: Arc<GitCli>) -> Result<Collaborators> {
    let ci: Option<Arc<dyn CiRunSource>> = match &config.github {
        Some(target) => Some(github_client(target)? as Arc<dyn CiRunSource>),
        None => None,
    };

    let changelog = changelog_source(
        config.changelog_source,
        config.github.as_ref(),
        vcs.clone(),
        &config.repo_root,
        config.cache_prs,
        0,
        config.dry_run,
    )?;

    let package: Option<Arc<dyn ReadinessCheck>> = match &config.package {
        Some(name) => {
            let check = PackageIndexCheck::new(
                &config.package_index_url,
                name,
                Some(package_version(&config.tag).to_string()),
            )?;
            Some(Arc::new(check) as Arc<dyn ReadinessCheck>)
        }
        None => None,
    };

    let image: Option<Arc<dyn ReadinessCheck>> = match &config.image {
        Some(image) => {
            let check = RegistryCheck::new(&format!("{}:{}", image, config.tag))?;
            Some(Arc::new(check) as Arc<dyn ReadinessCheck>)
        }
        None => None,
    };

    Ok(Collaborators {
        vcs,
        recipes: Arc::new(JustRunner::new(&config.recipes_dir)),
        changelog,
        ci,
        package,
        image,
    })
}

async fn run_release(cmd: &ReleaseCommand, cli: &Cli) -> Result<()> {
    let file = load_config(cli)?;
    let vcs = Arc::new(GitCli::new(&cli.repo));

    let config = ReleaseConfig::resolve(&file, &cmd.overrides(), vcs.as_ref(), &cli.repo)
        .await
        .context("Failed to resolve release inputs")?;

    println!(
        "{} Next tag: {} (previous: {})",
        INFO,
        style(&config.tag).bold(),
        style(config.previous_tag.as_deref().unwrap_or("none")).dim()
    );

    let collaborators = build_collaborators(&config, vcs)?;

    let cancel = CancelSignal::new();
    let _interrupt = cancel.cancel_on_interrupt();
    let _deadline = cmd
        .deadline_secs
        .map(|secs| cancel.cancel_after(Duration::from_secs(secs)));

    // Live display on a terminal, plain lines everywhere else
    let interactive = console::Term::stdout().is_term() && !cmd.no_tui;
    let (sink, display): (Arc<dyn EventSink>, _) = if interactive {
        let (sink, events) = ChannelSink::new(DEFAULT_QUEUE_CAPACITY);
        (
            Arc::new(sink) as Arc<dyn EventSink>,
            Some(tokio::spawn(run_display(events))),
        )
    } else {
        (Arc::new(LineSink::new()) as Arc<dyn EventSink>, None)
    };

    let orchestrator =
        ReleaseOrchestrator::new(StepExecutor::new(config.clone(), collaborators), sink).with_cancel(cancel);

    println!();
    let run = orchestrator.run().await;

    if let Some(display) = display {
        if let Ok(state) = display.await {
            if state.dropped > 0 {
                tracing::debug!("Display dropped {} events", state.dropped);
            }
        }
    }

    print_run_summary(&run);

    if !config.dry_run {
        if let (Some(webhook), Some(outcome)) = (file.slack.resolved_webhook(), &run.outcome) {
            slack::notify_run_complete(&webhook, &run.tag, outcome).await;
        }
    }

    if !run.succeeded() {
        if let Some(outcome) = &run.outcome {
            error!("{}", outcome);
        }
        std::process::exit(1);
    }

    Ok(())
}

async fn next_tag(bump: &BumpArgs, create: bool, cli: &Cli) -> Result<()> {
    let bump = BumpKind::from_flags(bump.rc, bump.alpha, bump.release, bump.major)?;
    let vcs = GitCli::new(&cli.repo);

    let tags = vcs.list_tags().await.context("Failed to list tags")?;
    let next = next_from_tags(&tags, bump)?;
    println!("{}", next);

    if create {
        vcs.create_tag(&next, &tag_message(&next))
            .await
            .with_context(|| format!("Failed to create tag {}", next))?;
        println!("{} Created tag {}", CHECK, style(&next).bold());
    }

    Ok(())
}

fn list_workflows(tag: &str, cli: &Cli) -> Result<()> {
    let file = load_config(cli)?;
    let dir = file.workflows_dir();
    let triggers = load_workflow_triggers(&cli.repo, &dir)?;
    let matched = triggered_by_tag(&triggers, tag);

    if matched.is_empty() {
        println!(
            "{} No workflows in {} are triggered by pushing {}",
            INFO,
            dir.display(),
            style(tag).bold()
        );
        return Ok(());
    }

    println!("{} Workflows triggered by tag {}:", INFO, style(tag).bold());
    for trigger in matched {
        let patterns = if trigger.tag_patterns.is_empty() {
            "all tags".to_string()
        } else {
            trigger.tag_patterns.join(", ")
        };
        println!(
            "  - {} {} {}",
            style(&trigger.name).cyan(),
            style(trigger.path.display()).dim(),
            style(format!("[{}]", patterns)).dim()
        );
    }

    Ok(())
}

/// A reporter that mirrors progress into a spinner
fn spinner_reporter(spinner: &indicatif::ProgressBar, prefix: String) -> StepReporter {
    let spinner = spinner.clone();
    let sink = move |event: ReleaseEvent| match event {
        ReleaseEvent::StepProgress {
            current,
            total,
            label,
            ..
        } => spinner.set_message(format!(
            "{} ({}/{} {})",
            prefix,
            current,
            total,
            label.unwrap_or_default()
        )),
        ReleaseEvent::StepMessage { line, .. } => spinner.set_message(format!("{} ({})", prefix, line)),
        _ => {}
    };
    StepReporter::new(Arc::new(sink), 0)
}

async fn wait_with_spinner(check: &dyn ReadinessCheck, options: WaitOptions) -> bool {
    let spinner = create_spinner(format!("Waiting for {}", check.resource()));
    let cancel = CancelSignal::new();
    let _interrupt = cancel.cancel_on_interrupt();

    let result = wait_until_ready(check, options, &cancel).await;
    spinner.finish_and_clear();

    match result {
        Ok(summary) => {
            println!(
                "{} {} ready after {}s",
                CHECK,
                check.resource(),
                summary.elapsed.as_secs()
            );
            true
        }
        Err(e) => {
            println!("{} {}", CROSS, style(e).red());
            false
        }
    }
}

async fn wait_for_ci(cmd: &CiWaitCommand, cli: &Cli) -> Result<()> {
    let file = load_config(cli)?;
    let vcs = GitCli::new(&cli.repo);

    let target = resolve_github(&file, &vcs, &file.release.remote)
        .await?
        .ok_or_else(|| anyhow!("waiting for workflows needs GitHub enabled and a token (GITHUB_TOKEN)"))?;
    let client = github_client(&target)?;

    let sha = vcs
        .verify_tag(&cmd.tag)
        .await
        .with_context(|| format!("Failed to resolve tag {}", cmd.tag))?;

    let expected: Vec<String> = if cmd.all {
        Vec::new()
    } else {
        let triggers = load_workflow_triggers(&cli.repo, &file.workflows_dir())?;
        triggered_by_tag(&triggers, &cmd.tag)
            .into_iter()
            .map(|t| t.name.clone())
            .collect()
    };

    let options = ci_wait_options(&file, cmd.timeout_secs, cmd.interval_secs)?;

    let spinner = create_spinner(format!("Waiting for workflows on {}", cmd.tag));
    let reporter = spinner_reporter(&spinner, format!("Waiting for workflows on {}", cmd.tag));
    let check = CiCompletionCheck::new(client, sha, expected, reporter);

    let cancel = CancelSignal::new();
    let _interrupt = cancel.cancel_on_interrupt();
    let result = wait_until_ready(&check, options, &cancel).await;
    spinner.finish_and_clear();

    match result {
        Ok(_) => {
            println!("{} All workflow runs for {} succeeded", CHECK, style(&cmd.tag).bold());
            Ok(())
        }
        Err(e) => {
            println!("{} {}", CROSS, style(e).red());
            std::process::exit(1);
        }
    }
}

async fn check_artifact(cmd: &CheckCommand, cli: &Cli) -> Result<()> {
    let file = load_config(cli)?;
    let options = artifact_wait_options(&file, None, None)?;

    let (check, wait): (Box<dyn ReadinessCheck>, bool) = match cmd {
        CheckCommand::Package(p) => {
            let check = PackageIndexCheck::new(
                &file.release.package_index_url,
                &p.name,
                p.version.clone(),
            )?;
            (Box::new(check) as Box<dyn ReadinessCheck>, p.wait)
        }
        CheckCommand::Image(i) => {
            let check = RegistryCheck::new(&i.image)?;
            (Box::new(check) as Box<dyn ReadinessCheck>, i.wait)
        }
    };

    let available = if wait {
        wait_with_spinner(check.as_ref(), options).await
    } else {
        let found = check.check_ready().await?;
        if found {
            println!("{} {} is available", CHECK, check.resource());
        } else {
            println!("{} {} not found", CROSS, check.resource());
        }
        found
    };

    if !available {
        std::process::exit(1);
    }
    Ok(())
}

async fn generate_changelog(cmd: &ChangelogCommand, cli: &Cli) -> Result<()> {
    let file = load_config(cli)?;
    let vcs = Arc::new(GitCli::new(&cli.repo));

    let tags = vcs.list_tags().await.context("Failed to list tags")?;
    let explicit_previous = cmd.prev_tag.as_deref().or(file.previous_release_tag.as_deref());
    let previous = resolve_previous_tag(vcs.as_ref(), explicit_previous, &tags).await?;
    let version = match cmd.heading() {
        Some(heading) => heading,
        None => next_from_tags(&tags, BumpKind::Patch)?,
    };

    let kind = if cmd.use_prs {
        ChangelogSourceKind::Prs
    } else {
        file.changelog.source
    };
    let github = match kind {
        ChangelogSourceKind::Prs => resolve_github(&file, vcs.as_ref(), &file.release.remote).await?,
        ChangelogSourceKind::Commits => None,
    };
    let source = changelog_source(
        kind,
        github.as_ref(),
        vcs.clone(),
        &cli.repo,
        file.changelog.cache_prs,
        cmd.limit,
        cmd.dry_run,
    )?;

    let entries = source
        .gather(previous.as_deref(), &cmd.head, &StepReporter::detached())
        .await
        .context("Failed to gather changelog entries")?;
    let section = render_section(&version, &entries);

    if cmd.dry_run {
        print!("{}", section);
        return Ok(());
    }

    let path = cli.repo.join(&file.changelog.output);
    write_changelog(&path, &section)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    println!(
        "{} Prepended {} ({}) to {}",
        CHECK,
        style(&version).bold(),
        entries.describe(),
        path.display()
    );

    Ok(())
}

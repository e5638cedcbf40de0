//! Top-level run: configuration, preflight, crawl, downloads, exit outcome.

use std::future::Future;
use std::path::Path;

use anyhow::{Context, Result, bail};
use downhub::{
    CancelSignal, CrawlError, CrawlReport, Crawler, DownloadManager, DownloadRun,
    HttpClientFactory, ManifestWriter, PageFetcher, RepositoryTarget, read_repository_list,
};
use tracing::{debug, error, info, warn};

use crate::app::{config_manager, exit_handler, terminal};
use crate::app_config::FileConfig;
use crate::cli::{Cli, Command, ConfigCommand};
use crate::{ProcessExit, commands};

#[derive(Debug, Default)]
struct RunTotals {
    succeeded: usize,
    failed: usize,
    failed_repositories: usize,
    skipped_repositories: usize,
}

pub(crate) async fn run_downhub(cli: Cli) -> Result<ProcessExit> {
    let (loaded, settings) = config_manager::resolve_config(&cli.run)?;

    let default_level = terminal::resolve_log_level(
        cli.run.verbose,
        cli.run.quiet,
        settings.log_level.as_deref(),
    );
    terminal::init_tracing(default_level, terminal::is_no_color_requested(&cli.run));
    debug!(?settings, "configuration resolved");
    for key in loaded.config.ignored_legacy_keys() {
        warn!(%key, "ignoring config key that is no longer supported");
    }

    if let Some(Command::Config {
        command: ConfigCommand::Show,
    }) = &cli.command
    {
        commands::run_config_show_command(&loaded, &settings)?;
        return Ok(ProcessExit::Success);
    }

    let urls = collect_repository_urls(&cli, &loaded.config)?;
    if urls.is_empty() {
        info!("no repositories to process");
        return Ok(ProcessExit::Success);
    }

    let targets = urls
        .iter()
        .map(|url| RepositoryTarget::parse(url))
        .collect::<Result<Vec<_>, _>>()
        .context("invalid repository URL")?;

    let factory = HttpClientFactory::new(settings.client_settings())
        .context("invalid proxy configuration")?;

    if !cli.run.skip_check
        && let Some(first) = targets.first()
    {
        let origin = first.origin_url();
        if !factory.is_reachable(&origin).await {
            warn!(
                url = %origin,
                "site is unreachable; check the network or pass --proxy (or --skip-check)"
            );
            return Ok(ProcessExit::Failure);
        }
    }

    let client = factory.build().context("failed to build HTTP client")?;
    let crawler = Crawler::new(
        PageFetcher::new(client.clone(), settings.crawl_parallelism),
        settings.crawl_options(),
    );
    let manager = DownloadManager::new(
        client,
        settings.download_options(terminal::progress_mode(&cli.run)),
    )
    .context("invalid download configuration")?;
    let manifests = ManifestWriter::new(&settings.manifest_dir);

    let cancel = CancelSignal::new();
    spawn_interrupt_listener(cancel.clone());

    info!(repositories = targets.len(), "downhub starting");

    let reports = tokio::select! {
        reports = crawler.crawl_all(targets) => reports,
        () = cancel.cancelled() => {
            warn!("interrupted while crawling tag pages");
            return Ok(ProcessExit::Partial);
        }
    };

    let totals = download_reports(
        &manager,
        &manifests,
        &settings.source_root,
        reports,
        &cancel,
    )
    .await;

    info!(
        succeeded = totals.succeeded,
        failed = totals.failed,
        failed_repositories = totals.failed_repositories,
        skipped_repositories = totals.skipped_repositories,
        interrupted = cancel.is_cancelled(),
        "run complete"
    );

    Ok(exit_handler::determine_exit_outcome(
        totals.failed + totals.failed_repositories + totals.skipped_repositories,
    ))
}

/// Downloads the archives of each crawled repository in turn. Once `cancel`
/// fires, repositories not yet started are skipped without touching disk.
async fn download_reports(
    manager: &DownloadManager,
    manifests: &ManifestWriter,
    source_root: &Path,
    reports: Vec<Result<CrawlReport, CrawlError>>,
    cancel: &CancelSignal,
) -> RunTotals {
    let mut totals = RunTotals::default();
    for report in reports {
        if cancel.is_cancelled() {
            totals.skipped_repositories += 1;
            continue;
        }

        let report = match report {
            Ok(report) => report,
            Err(e) => {
                error!(error = %e, "crawl failed");
                totals.failed_repositories += 1;
                continue;
            }
        };

        let repo = report.target.repo_name().to_string();
        let destination = source_root.join(report.target.relative_dir());
        match manager
            .download_all(&report.target, &report.assets, &destination, manifests, cancel)
            .await
        {
            Ok(DownloadRun::NothingToDownload) => {
                info!(%repo, "no release archives found");
            }
            Ok(DownloadRun::Finished { summary, .. }) => {
                totals.succeeded += summary.succeeded();
                totals.failed += summary.failed();
            }
            Err(e) => {
                error!(%repo, error = %e, "download run failed");
                totals.failed_repositories += 1;
            }
        }
    }

    if totals.skipped_repositories > 0 {
        warn!(
            skipped = totals.skipped_repositories,
            "interrupted, remaining repositories were not downloaded"
        );
    }
    totals
}

fn collect_repository_urls(cli: &Cli, config: &FileConfig) -> Result<Vec<String>> {
    match &cli.command {
        None => Ok(cli.url.iter().map(|url| url.trim().to_string()).collect()),
        Some(command @ Command::Batch { .. }) => {
            let Some(path) = command.batch_file() else {
                bail!("`batch` needs a repository list: downhub batch FILE (or -f FILE)");
            };
            read_repository_list(path)
                .with_context(|| format!("failed to read repository list '{}'", path.display()))
        }
        Some(Command::Common) => Ok(config.source_repositories()),
        Some(Command::Config { .. }) => Ok(Vec::new()),
    }
}

/// Exit status of a process stopped by a repeated interrupt.
const FORCED_EXIT_CODE: i32 = 130;

fn spawn_interrupt_listener(cancel: CancelSignal) {
    tokio::spawn(async move {
        if watch_interrupts(&cancel, tokio::signal::ctrl_c).await {
            error!("second interrupt received, exiting immediately");
            std::process::exit(FORCED_EXIT_CODE);
        }
    });
}

/// Cancels the run on the first interrupt. Returns true once a second
/// interrupt arrives; false if the signal source fails.
async fn watch_interrupts<F, Fut>(cancel: &CancelSignal, mut next_interrupt: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::io::Result<()>>,
{
    if next_interrupt().await.is_err() {
        return false;
    }
    warn!("interrupt received, stopping downloads (press Ctrl-C again to quit)");
    cancel.cancel();

    next_interrupt().await.is_ok()
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use clap::Parser;

    use downhub::{ClassifiedAssets, CrawlOutcome, DownloadOptions};
    use tempfile::TempDir;

    use super::*;
    use crate::app_config::RepositoryEntry;

    fn report(url: &str, archives: &[&str]) -> Result<CrawlReport, CrawlError> {
        let mut assets = ClassifiedAssets::new();
        for archive in archives {
            assets.classify(archive);
        }
        Ok(CrawlReport {
            target: RepositoryTarget::parse(url).unwrap(),
            assets,
            pages_visited: 1,
            outcome: CrawlOutcome::Completed,
        })
    }

    #[test]
    fn test_collect_single_url() {
        let cli = Cli::parse_from(["downhub", " https://github.com/o/r "]);
        let urls = collect_repository_urls(&cli, &FileConfig::default()).unwrap();
        assert_eq!(urls, vec!["https://github.com/o/r"]);
    }

    #[test]
    fn test_collect_batch_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "https://github.com/a/one\n\nhttps://github.com/b/two").unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let cli = Cli::parse_from(["downhub", "batch", "-f", path.as_str()]);
        let urls = collect_repository_urls(&cli, &FileConfig::default()).unwrap();
        assert_eq!(urls.len(), 2);
    }

    #[test]
    fn test_collect_batch_without_file_is_error() {
        let cli = Cli::parse_from(["downhub", "batch"]);
        assert!(collect_repository_urls(&cli, &FileConfig::default()).is_err());
    }

    #[test]
    fn test_collect_common_uses_marked_repositories() {
        let mut config = FileConfig::default();
        config.repositories = vec![
            RepositoryEntry {
                name: "a".into(),
                url: "https://github.com/o/a".into(),
                download_source: true,
                ..RepositoryEntry::default()
            },
            RepositoryEntry {
                name: "b".into(),
                url: "https://github.com/o/b".into(),
                download_source: false,
                ..RepositoryEntry::default()
            },
        ];
        let cli = Cli::parse_from(["downhub", "common"]);
        let urls = collect_repository_urls(&cli, &config).unwrap();
        assert_eq!(urls, vec!["https://github.com/o/a"]);
    }

    #[tokio::test]
    async fn test_interrupted_run_skips_remaining_repositories() {
        let dir = TempDir::new().unwrap();
        let manifests = ManifestWriter::new(dir.path());
        let manager = DownloadManager::new(reqwest::Client::new(), DownloadOptions::default()).unwrap();
        let reports = vec![
            report(
                "http://127.0.0.1:9/a/one",
                &["http://127.0.0.1:9/a/one/archive/refs/tags/v1.zip"],
            ),
            report(
                "http://127.0.0.1:9/b/two",
                &["http://127.0.0.1:9/b/two/archive/refs/tags/v1.zip"],
            ),
        ];

        let cancel = CancelSignal::new();
        cancel.cancel();
        let totals = download_reports(&manager, &manifests, dir.path(), reports, &cancel).await;

        assert_eq!(totals.skipped_repositories, 2);
        assert_eq!(totals.failed, 0);
        assert!(!dir.path().join("a").exists());
        assert!(!dir.path().join("b").exists());
        assert!(!manifests.path_for("one").exists());
        assert!(!manifests.path_for("two").exists());
    }

    #[tokio::test]
    async fn test_download_reports_counts_crawl_failures() {
        let dir = TempDir::new().unwrap();
        let manifests = ManifestWriter::new(dir.path());
        let manager = DownloadManager::new(reqwest::Client::new(), DownloadOptions::default()).unwrap();
        let reports = vec![
            Err(RepositoryTarget::parse("not-a-url").unwrap_err()),
            report("http://127.0.0.1:9/o/empty", &[]),
        ];

        let totals =
            download_reports(&manager, &manifests, dir.path(), reports, &CancelSignal::new()).await;

        assert_eq!(totals.failed_repositories, 1);
        assert_eq!(totals.skipped_repositories, 0);
        assert_eq!(totals.succeeded, 0);
    }

    #[tokio::test]
    async fn test_first_interrupt_cancels_second_forces_exit() {
        let cancel = CancelSignal::new();
        let forced = watch_interrupts(&cancel, || std::future::ready(Ok(()))).await;
        assert!(forced);
        assert!(cancel.is_cancelled());
    }

    #[tokio::test]
    async fn test_failing_signal_source_neither_cancels_nor_exits() {
        let cancel = CancelSignal::new();
        let forced = watch_interrupts(&cancel, || {
            std::future::ready(Err(std::io::Error::other("no signal handler")))
        })
        .await;
        assert!(!forced);
        assert!(!cancel.is_cancelled());
    }
}

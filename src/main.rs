//! Binary entry point for the syncdet CLI.

use std::collections::BTreeSet;
use std::io::{self, Write};
use std::process;

use camino::Utf8PathBuf;
use clap::Parser;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use syncdet::barrier::service::{self, ServiceConfig, ServiceError};
use syncdet::dirtree::physical_digest;
use syncdet::{DirTreeError, MemoryBarrier, RunId, lucky_actor};

mod cli;

use cli::{Cli, DigestCommand, LuckyCommand, ServeCommand};

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Service(#[from] ServiceError),
    #[error(transparent)]
    DirTree(#[from] DirTreeError),
    #[error("{0} does not exist or changed while it was scanned")]
    Unreadable(Utf8PathBuf),
    #[error("a run needs at least one actor")]
    NoActors,
    #[error("failed to write output: {0}")]
    Output(#[from] io::Error),
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();
    let exit_code = match dispatch(cli, &mut io::stdout()).await {
        Ok(()) => 0,
        Err(err) => {
            report_error(&err);
            1
        }
    };

    process::exit(exit_code);
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

async fn dispatch(cli: Cli, out: &mut impl Write) -> Result<(), CliError> {
    match cli {
        Cli::Serve(command) => serve(command).await,
        Cli::Digest(command) => digest(&command, out),
        Cli::Lucky(command) => lucky(&command, out),
        Cli::RunId => {
            writeln!(out, "{}", RunId::generate())?;
            Ok(())
        }
    }
}

async fn serve(command: ServeCommand) -> Result<(), CliError> {
    let config = ServiceConfig {
        host: command.host,
        port: command.port,
    };
    service::serve(&config, MemoryBarrier::new()).await?;
    Ok(())
}

fn digest(command: &DigestCommand, out: &mut impl Write) -> Result<(), CliError> {
    let path = Utf8PathBuf::from(&command.path);
    let ignore: BTreeSet<String> = command.ignore.iter().cloned().collect();
    let digest = physical_digest(&path, &ignore)?.ok_or(CliError::Unreadable(path))?;
    writeln!(out, "{digest}")?;
    Ok(())
}

fn lucky(command: &LuckyCommand, out: &mut impl Write) -> Result<(), CliError> {
    let index = lucky_actor(&command.seed, command.actors).ok_or(CliError::NoActors)?;
    writeln!(out, "{index}")?;
    Ok(())
}

fn report_error(err: &CliError) {
    write_error(io::stderr(), err);
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "{err}").ok();
}

#[cfg(test)]
mod tests {
    use super::*;
    use cap_std::{ambient_authority, fs_utf8::Dir};
    use rstest::rstest;
    use syncdet::test_support::utf8_path;
    use tempfile::TempDir;

    async fn run(cli: Cli) -> Result<String, CliError> {
        let mut buf = Vec::new();
        dispatch(cli, &mut buf).await?;
        Ok(String::from_utf8(buf).expect("utf8 output"))
    }

    #[rstest]
    #[case(1)]
    #[case(5)]
    #[tokio::test]
    async fn lucky_prints_the_shared_choice(#[case] actors: usize) {
        let output = run(Cli::Lucky(LuckyCommand {
            seed: String::from("run-7"),
            actors,
        }))
        .await
        .expect("lucky");
        let expected = lucky_actor("run-7", actors).expect("actors > 0");
        assert_eq!(output, format!("{expected}\n"));
    }

    #[tokio::test]
    async fn lucky_rejects_empty_runs() {
        let err = run(Cli::Lucky(LuckyCommand {
            seed: String::from("s"),
            actors: 0,
        }))
        .await
        .expect_err("no actors");
        assert!(matches!(err, CliError::NoActors));
    }

    #[tokio::test]
    async fn digest_ignores_listed_content() {
        let tmp = TempDir::new().expect("tempdir");
        let root = utf8_path(tmp.path());
        let dir = Dir::open_ambient_dir(&root, ambient_authority()).expect("open");
        dir.write("log", "first").expect("write");
        let command = || {
            Cli::Digest(DigestCommand {
                path: root.to_string(),
                ignore: vec![String::from("log")],
            })
        };

        let before = run(command()).await.expect("digest");
        dir.write("log", "second").expect("rewrite");
        let after = run(command()).await.expect("digest");
        assert_eq!(before, after);
        assert_eq!(before.trim().len(), 64);
    }

    #[tokio::test]
    async fn digest_of_missing_directory_is_an_error() {
        let err = run(Cli::Digest(DigestCommand {
            path: String::from("/definitely/not/here"),
            ignore: Vec::new(),
        }))
        .await
        .expect_err("missing path");
        assert!(matches!(err, CliError::Unreadable(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn run_id_prints_a_fresh_identifier() {
        let first = run(Cli::RunId).await.expect("run-id");
        let second = run(Cli::RunId).await.expect("run-id");
        assert_ne!(first, second);
        assert!(RunId::new(first.trim()).is_ok());
    }

    #[test]
    fn write_error_writes_cli_error() {
        let mut buf = Vec::new();
        write_error(&mut buf, &CliError::NoActors);
        let rendered = String::from_utf8(buf).expect("utf8");
        assert!(rendered.contains("at least one actor"), "rendered: {rendered}");
    }
}

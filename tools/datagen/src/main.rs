use anyhow::Result;
use clap::{ArgGroup, Parser};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use cohort_shared::AwsDirectory;

mod deprovision;
mod ledger;
mod points;
mod provision;
mod template;
#[cfg(test)]
mod testutil;

/// Ledger written by `--gen` and consumed by `--delete`.
const GENERATED_UIDS_FILE: &str = "./genUIDS";

/// Seeds and tears down portal accounts against the hosted directory.
#[derive(Parser, Debug)]
#[command(name = "datagen", version, about, long_about = None)]
#[command(group(
    ArgGroup::new("workflow")
        .required(true)
        .args(["gen", "delete", "points"])
))]
struct Args {
    /// Generate accounts using the passed in file as template
    #[arg(short, long, value_name = "FILE")]
    gen: Option<PathBuf>,

    /// Delete all UIDs listed in the file
    #[arg(short, long, value_name = "FILE")]
    delete: Option<PathBuf>,

    /// Reset the activity & event points
    #[arg(short, long)]
    points: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = Args::parse();

    // One directory handle for the whole run, closed on every exit path.
    let directory = AwsDirectory::connect().await?;
    let outcome = run(&args, &directory).await;
    directory.close();
    outcome
}

async fn run(args: &Args, directory: &AwsDirectory) -> Result<()> {
    if let Some(template_path) = &args.gen {
        let specs = template::load_specs(template_path).await?;
        let ledger = ledger::Ledger::append_to(GENERATED_UIDS_FILE).await?;
        let results = provision::provision(directory, specs, &ledger).await;
        provision::summarize(&results);
    } else if let Some(uid_path) = &args.delete {
        let results = deprovision::deprovision(directory, uid_path).await?;
        deprovision::summarize(&results);
    } else if args.points {
        points::reset_points(directory, Path::new(points::AEPOINTS_FILE)).await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exactly_one_workflow_flag_is_required() {
        assert!(Args::try_parse_from(["datagen"]).is_err());
        assert!(Args::try_parse_from(["datagen", "--gen", "people.json", "--points"]).is_err());
        assert!(Args::try_parse_from(["datagen", "--delete", "genUIDS", "--points"]).is_err());
    }

    #[test]
    fn each_workflow_parses_alone() {
        let args = Args::try_parse_from(["datagen", "--gen", "people.json"]).unwrap();
        assert_eq!(args.gen.as_deref(), Some(Path::new("people.json")));

        let args = Args::try_parse_from(["datagen", "-d", "genUIDS"]).unwrap();
        assert_eq!(args.delete.as_deref(), Some(Path::new("genUIDS")));

        let args = Args::try_parse_from(["datagen", "-p"]).unwrap();
        assert!(args.points);
    }
}

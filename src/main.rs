use anyhow::Context;
use clap::{Arg, Command};
use std::path::Path;
use std::process;

use deepracer_setup::command::{CommandRunner, DryRunRunner, SystemRunner};
use deepracer_setup::config::{FailurePolicy, ProvisionConfig};
use deepracer_setup::doctor;
use deepracer_setup::provision::ProvisioningRunner;

#[macro_use]
extern crate log;

use env_logger::Env;

fn main() {
    let env = Env::default().filter_or("RUST_LOG", "info");
    env_logger::init_from_env(env);
    let matches = Command::new("deepracer-setup")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Generates missing SSH host keys and nginx certificates")
        .arg(
            Arg::new("root")
                .help("Directory to resolve guarded paths under")
                .long("root")
                .takes_value(true)
                .default_value("/")
                .global(true),
        )
        .arg(
            Arg::new("dry-run")
                .help("Log the commands that would run, without running them")
                .long("dry-run"),
        )
        .arg(
            Arg::new("strict")
                .help("Exit non-zero if a provisioning command fails")
                .long("strict"),
        )
        .subcommand(Command::new("status").about("Report which guarded files and tools are present"))
        .get_matches();

    let root = matches.value_of("root").unwrap_or("/");
    let mut config = match ProvisionConfig::with_root(Path::new(root)) {
        Ok(c) => c,
        Err(e) => {
            error!("{}", e);
            process::exit(2);
        }
    };

    if matches.subcommand_matches("status").is_some() {
        let report = doctor::status(&config);
        print!("{}", report.render());
        if !report.is_provisioned() {
            process::exit(1);
        }
        return;
    }

    config.dry_run = matches.is_present("dry-run");
    if matches.is_present("strict") {
        config.policy = FailurePolicy::Strict;
    }
    if let Err(e) = provision(&config) {
        error!("{:#}", e);
        process::exit(1);
    }
}

fn provision(config: &ProvisionConfig) -> anyhow::Result<()> {
    let runner: Box<dyn CommandRunner> = if config.dry_run {
        Box::new(DryRunRunner)
    } else {
        Box::new(SystemRunner)
    };
    let report = ProvisioningRunner::new(config, runner.as_ref())
        .run()
        .context("Provisioning failed")?;
    if report.failures() > 0 {
        warn!(
            "{} provisioning step(s) failed; check {} and tool logs",
            report.failures(),
            config.root.display()
        );
    } else {
        debug!("Provisioning complete: {:?}", report);
    }
    Ok(())
}

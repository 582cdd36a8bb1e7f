// SPDX-License-Identifier: GPL-3.0-only

//! `provision` - provision NixOS instances on OCI and bootstrap their
//! storage layout

use std::collections::BTreeMap;
use std::io::Write;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt};

mod adapters;
mod cli;
mod config;

use adapters::{OciCli, SshChannel};
use cli::{Cli, Command, ImageCommand};
use config::{Credentials, SpecFile};
use provision_engine::{
    BootstrapConfig, BootstrapOutcome, ImageResolver, InstanceProvisioner, NixImageBuild,
    Readiness, ReadinessProbe, StorageBootstrap, adapters::ShellGuest, readiness,
};
use provision_types::{Arch, ImageArtifact, InstanceSpec, StorageLayoutPlan};

#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("provision=info,warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let parsed = Cli::parse();
    match parsed.command {
        Command::Provision {
            spec,
            name,
            apply,
            skip_bootstrap,
        } => {
            let credentials = Credentials::from_env()?;
            let api = OciCli::new(credentials)?;
            let spec_file = SpecFile::load(&spec)?;
            let selected = spec_file.select(name.as_deref())?;
            provision_all(&api, &spec_file, &selected, apply, skip_bootstrap).await
        }
        Command::Bootstrap { host, user, apply } => {
            let channel = SshChannel::new(&user, &host)?;
            run_bootstrap(channel, apply).await
        }
        Command::Image(image) => match image {
            ImageCommand::Resolve {
                arch,
                flake,
                keep_staged,
            } => {
                let credentials = Credentials::from_env()?;
                let api = OciCli::new(credentials)?;
                let builder = NixImageBuild::new(flake);
                let mut resolver = ImageResolver::new(&api, &builder);
                if keep_staged {
                    resolver = resolver.keep_staged_object();
                }
                let artifact = resolver.resolve(arch).await?;
                println!(
                    "{} {} {}",
                    artifact.image_id.as_deref().unwrap_or("<pending>"),
                    artifact.arch,
                    artifact.content_hash
                );
                Ok(())
            }
            ImageCommand::Prune { keep, force } => {
                let credentials = Credentials::from_env()?;
                let api = OciCli::new(credentials)?;
                let deleted = provision_engine::prune(&api, keep, force, confirm_deletion).await?;
                println!("deleted {} image(s)", deleted.len());
                Ok(())
            }
        },
    }
}

async fn provision_all(
    api: &OciCli,
    spec_file: &SpecFile,
    selected: &[&InstanceSpec],
    apply: bool,
    skip_bootstrap: bool,
) -> Result<()> {
    let mut resolved: BTreeMap<Arch, ImageArtifact> = BTreeMap::new();

    for instance_spec in selected {
        let artifact = match resolved.get(&instance_spec.arch) {
            Some(artifact) => artifact.clone(),
            None => {
                let builder = NixImageBuild::new(spec_file.flake.clone());
                let resolver = ImageResolver::new(api, &builder);
                let artifact = resolver.resolve(instance_spec.arch).await?;
                resolved.insert(instance_spec.arch, artifact.clone());
                artifact
            }
        };
        let image_id = artifact
            .image_id
            .clone()
            .context("resolved image has no remote id")?;

        let provisioner = InstanceProvisioner::new(api);
        let handle = provisioner
            .launch(instance_spec, &image_id, &spec_file.ssh_public_key)
            .await?;
        let host = handle
            .public_ip
            .clone()
            .with_context(|| format!("instance {} has no public address", handle.id))?;

        let channel = SshChannel::new(&instance_spec.ssh_user, &host)?;
        match readiness::wait_for_ready(&channel, &ReadinessProbe::default()).await? {
            Readiness::Ready => {}
            Readiness::Timeout => bail!("instance {} never became ready", instance_spec.name),
        }

        provisioner
            .attach_data_volume(instance_spec, &handle.id)
            .await?;

        if skip_bootstrap {
            tracing::info!(name = %instance_spec.name, "skipping storage bootstrap");
        } else {
            run_bootstrap(channel, apply).await?;
        }

        println!("{}: {}", instance_spec.name, host);
    }

    Ok(())
}

async fn run_bootstrap(channel: SshChannel, apply: bool) -> Result<()> {
    let guest = ShellGuest::new(channel);
    let config = BootstrapConfig {
        apply_system_config: apply,
        ..BootstrapConfig::default()
    };
    let orchestrator = StorageBootstrap::new(&guest, &guest, &guest, &guest, config);
    let plan = StorageLayoutPlan::data_volume();

    match orchestrator.run(&plan).await? {
        BootstrapOutcome::Completed { instructions } => {
            if let Some(instructions) = instructions {
                println!("{instructions}");
            }
        }
        BootstrapOutcome::Skipped(reason) => {
            tracing::info!(%reason, "storage bootstrap skipped");
        }
    }
    Ok(())
}

/// Interactive confirmation for the prune batch.
fn confirm_deletion(candidates: &[ImageArtifact]) -> bool {
    println!("About to delete {} image(s):", candidates.len());
    for artifact in candidates {
        println!(
            "  {}  {}  {}",
            artifact.image_id.as_deref().unwrap_or("<unregistered>"),
            artifact.display_name,
            artifact
                .time_created
                .map(|time| time.to_rfc3339())
                .unwrap_or_else(|| "<no timestamp>".to_string()),
        );
    }
    print!("Proceed? [y/N] ");
    let _ = std::io::stdout().flush();

    let mut answer = String::new();
    if std::io::stdin().read_line(&mut answer).is_err() {
        return false;
    }
    matches!(answer.trim(), "y" | "Y" | "yes")
}

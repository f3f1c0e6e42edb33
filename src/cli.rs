// src/cli.rs
use crate::adapters::AdapterTable;
use crate::config::EngineConfig;
use crate::dom::Page;
use crate::fields::catalog;
use crate::fill::FillOptions;
use crate::page_info::{PageInfo, TracingSink};
use crate::profile::Profile;
use crate::session::Session;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "formpilot")]
#[command(about = "Detect and autofill job application forms")]
pub struct FormCli {
    #[command(subcommand)]
    pub command: FormCommand,

    /// Engine configuration (YAML); falls back to FORMPILOT_CONFIG
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Write JSON logs to this file instead of stderr
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum FormCommand {
    /// Report the application form, wizard state and fields of a saved page
    Detect {
        page: PathBuf,
        /// URL the page was saved from
        #[arg(long)]
        url: String,
    },
    /// Fill a saved page from a profile and write the fill report
    Fill {
        page: PathBuf,
        #[arg(long)]
        url: String,
        /// Profile file (yaml, json or toml)
        #[arg(long)]
        profile: PathBuf,
        /// Type character by character with randomized pauses
        #[arg(long)]
        human_like: bool,
        #[arg(long)]
        no_validate: bool,
        /// Seed for the pacing RNG
        #[arg(long)]
        seed: Option<u64>,
        /// Fill report destination; stdout when omitted
        #[arg(long)]
        out: Option<PathBuf>,
        /// Also write the filled page markup here
        #[arg(long)]
        html_out: Option<PathBuf>,
        /// Record the application in the log
        #[arg(long)]
        log_application: bool,
    },
    /// List the site adapters in effect
    Adapters,
}

pub async fn handle_command(cli: FormCli) -> Result<()> {
    let config = EngineConfig::load(cli.config.as_deref())?;

    match cli.command {
        FormCommand::Detect { page, url } => {
            let mut page = load_page(&page, &url)?;
            let mut session = Session::new(config.clone(), &url);
            let form = session.detect(&mut page);

            let fields = match form {
                Some(form) => catalog(page.dom(), form.container, config.walk_limits(true)),
                None => {
                    warn!("No application form detected on {}", url);
                    Vec::new()
                }
            };
            let report = json!({
                "url": url,
                "adapter": session.adapter().name,
                "ats": PageInfo::new(&page).ats_type(),
                "form": form,
                "wizard": session.wizard(),
                "fields": fields,
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }

        FormCommand::Fill {
            page,
            url,
            profile,
            human_like,
            no_validate,
            seed,
            out,
            html_out,
            log_application,
        } => {
            let mut page = load_page(&page, &url)?;
            let profile = Profile::load(&profile)?;
            let mut options = FillOptions::default()
                .with_human_like(human_like)
                .with_validation(!no_validate);
            if let Some(seed) = seed {
                options = options.with_pacing_seed(seed);
            }

            let mut session = Session::new(config, &url);
            session.start(&mut page).await;
            let result = session.fill(&mut page, &profile, options).await;
            info!(
                "Filled {}, failed {}, skipped {}, {} uploads left for the user",
                result.filled.len(),
                result.failed.len(),
                result.skipped.len(),
                result.file_uploads.len()
            );

            if log_application {
                session.log_application(&page, &mut TracingSink)?;
            }

            let report = result.to_json()?;
            match out {
                Some(path) => std::fs::write(&path, report)
                    .with_context(|| format!("Failed to write fill report: {}", path.display()))?,
                None => println!("{}", report),
            }
            if let Some(path) = html_out {
                std::fs::write(&path, page.to_html())
                    .with_context(|| format!("Failed to write page: {}", path.display()))?;
            }
        }

        FormCommand::Adapters => {
            let table = AdapterTable::from_config(&config);
            println!("{}", serde_yaml::to_string(table.adapters())?);
        }
    }

    Ok(())
}

fn load_page(path: &Path, url: &str) -> Result<Page> {
    let html = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read page: {}", path.display()))?;
    Page::from_html(url, &html)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fill_arguments() {
        let cli = FormCli::try_parse_from([
            "formpilot",
            "fill",
            "page.html",
            "--url",
            "https://jobs.lever.co/acme/1",
            "--profile",
            "me.yaml",
            "--seed",
            "9",
            "--no-validate",
            "--log-file",
            "/tmp/formpilot.log",
        ])
        .unwrap();

        assert_eq!(cli.log_file, Some(PathBuf::from("/tmp/formpilot.log")));
        match cli.command {
            FormCommand::Fill {
                seed,
                no_validate,
                human_like,
                ..
            } => {
                assert_eq!(seed, Some(9));
                assert!(no_validate);
                assert!(!human_like);
            }
            _ => panic!("expected fill"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_fill_writes_report_and_page() {
        let dir = tempfile::tempdir().unwrap();
        let page = dir.path().join("page.html");
        let profile = dir.path().join("me.yaml");
        let out = dir.path().join("report.json");
        let html_out = dir.path().join("filled.html");
        std::fs::write(
            &page,
            r#"<form id="apply"><input name="email"><input name="phone"><input type="file" name="cv"></form>"#,
        )
        .unwrap();
        std::fs::write(&profile, "email: ada@example.com\nphone: 555-0100\n").unwrap();

        let cli = FormCli {
            command: FormCommand::Fill {
                page,
                url: "https://acme.example/apply".to_string(),
                profile,
                human_like: false,
                no_validate: false,
                seed: Some(1),
                out: Some(out.clone()),
                html_out: Some(html_out.clone()),
                log_application: true,
            },
            config: None,
            log_file: None,
        };
        handle_command(cli).await.unwrap();

        let report: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
        assert_eq!(report["filled"].as_array().unwrap().len(), 2);
        assert_eq!(report["file_uploads"][0]["name"], "cv");
        let html = std::fs::read_to_string(&html_out).unwrap();
        assert!(html.contains("ada@example.com"));
    }
}

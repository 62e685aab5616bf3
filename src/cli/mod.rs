mod catalog;
mod entries;
mod generate;
mod patterns;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Result, bail};
use console::style;

use crate::core::config::AppConfig;
use crate::core::store::ShiftStore;
use crate::core::terminal;

fn print_help() {
    terminal::print_heading("shiftgen: monthly shift schedule generation");
    println!();
    let commands: &[(&str, &str)] = &[
        ("generate <YYYY-MM> [--count N]", "Generate candidate patterns for a month"),
        ("status <job-id> | --period <YYYY-MM>", "Show a generation job"),
        ("patterns <YYYY-MM>", "List stored patterns for a month"),
        ("show <pattern-id>", "Show a pattern with its entries"),
        ("select <pattern-id>", "Mark a pattern as the selected one"),
        ("finalize <pattern-id>", "Freeze a pattern"),
        (
            "entry add <pattern-id> --staff S --date D --start HH:MM --end HH:MM [--break N]",
            "Add a shift by hand",
        ),
        (
            "entry update <entry-id> [--start HH:MM] [--end HH:MM] [--break N]",
            "Adjust a shift",
        ),
        ("entry delete <entry-id>", "Remove a shift"),
        ("check --period <YYYY-MM> --candidate <file>", "Validate a candidate JSON file"),
        ("import --file <file>", "Load staff, availability, targets and rules"),
    ];
    for (usage, about) in commands {
        println!("  {:<46} {}", style(usage).green(), about);
    }
    println!(
        "\n {} {} [--config <file>] <command>\n",
        style("Usage:").bold(),
        style("shiftgen").green()
    );
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Command {
    Generate {
        period: String,
        count: Option<usize>,
    },
    Status {
        job_id: Option<String>,
        period: Option<String>,
    },
    Patterns {
        period: String,
    },
    Show {
        pattern_id: String,
    },
    Select {
        pattern_id: String,
    },
    Finalize {
        pattern_id: String,
    },
    EntryAdd {
        pattern_id: String,
        staff_id: String,
        date: String,
        start: String,
        end: String,
        break_minutes: u32,
    },
    EntryUpdate {
        entry_id: String,
        start: Option<String>,
        end: Option<String>,
        break_minutes: Option<u32>,
    },
    EntryDelete {
        entry_id: String,
    },
    Check {
        period: String,
        candidate: PathBuf,
    },
    Import {
        file: PathBuf,
    },
    Help,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CliArgs {
    pub config: Option<PathBuf>,
    pub command: Command,
}

/// Splits `--flag value` pairs from positional arguments.
fn split_flags(args: &[String]) -> Result<(Vec<(String, String)>, Vec<String>)> {
    let mut flags = Vec::new();
    let mut positional = Vec::new();
    let mut i = 0;
    while i < args.len() {
        let arg = &args[i];
        if arg == "--help" {
            positional.push("help".to_string());
            i += 1;
        } else if let Some(name) = arg.strip_prefix("--") {
            if i + 1 >= args.len() {
                bail!("--{} requires a value", name);
            }
            flags.push((name.to_string(), args[i + 1].clone()));
            i += 2;
        } else {
            positional.push(arg.clone());
            i += 1;
        }
    }
    Ok((flags, positional))
}

fn flag(flags: &[(String, String)], names: &[&str]) -> Option<String> {
    flags
        .iter()
        .rev()
        .find(|(name, _)| names.contains(&name.as_str()))
        .map(|(_, value)| value.clone())
}

fn break_flag(flags: &[(String, String)]) -> Result<Option<u32>> {
    match flag(flags, &["break"]) {
        Some(raw) => match raw.parse::<u32>() {
            Ok(n) => Ok(Some(n)),
            Err(_) => bail!("--break expects minutes, got '{}'", raw),
        },
        None => Ok(None),
    }
}

fn required(value: Option<String>, what: &str) -> Result<String> {
    match value {
        Some(v) => Ok(v),
        None => bail!("missing {}", what),
    }
}

/// Parses `args` as received from the OS (program name first).
pub(crate) fn parse_args(args: &[String]) -> Result<CliArgs> {
    let rest = args.get(1..).unwrap_or_default();
    let (flags, positional) = split_flags(rest)?;
    let config = flag(&flags, &["config"]).map(PathBuf::from);
    let mut positional = positional.into_iter();
    let Some(cmd) = positional.next() else {
        return Ok(CliArgs {
            config,
            command: Command::Help,
        });
    };
    let first = positional.next();
    let second = positional.next();

    let command = match cmd.as_str() {
        "generate" => {
            let count = match flag(&flags, &["count", "patterns"]) {
                Some(raw) => match raw.parse::<usize>() {
                    Ok(n) => Some(n),
                    Err(_) => bail!("--count expects a number, got '{}'", raw),
                },
                None => None,
            };
            Command::Generate {
                period: required(first.or_else(|| flag(&flags, &["period"])), "period")?,
                count,
            }
        }
        "status" => {
            let period = flag(&flags, &["period"]);
            if first.is_none() && period.is_none() {
                bail!("status needs a job id or --period");
            }
            Command::Status {
                job_id: first,
                period,
            }
        }
        "patterns" => Command::Patterns {
            period: required(first.or_else(|| flag(&flags, &["period"])), "period")?,
        },
        "show" => Command::Show {
            pattern_id: required(first, "pattern id")?,
        },
        "select" => Command::Select {
            pattern_id: required(first, "pattern id")?,
        },
        "finalize" => Command::Finalize {
            pattern_id: required(first, "pattern id")?,
        },
        "entry" => match first.as_deref() {
            Some("add") => Command::EntryAdd {
                pattern_id: required(second.or_else(|| flag(&flags, &["pattern"])), "pattern id")?,
                staff_id: required(flag(&flags, &["staff"]), "--staff")?,
                date: required(flag(&flags, &["date"]), "--date")?,
                start: required(flag(&flags, &["start"]), "--start")?,
                end: required(flag(&flags, &["end"]), "--end")?,
                break_minutes: break_flag(&flags)?.unwrap_or(0),
            },
            Some("update") => {
                let start = flag(&flags, &["start"]);
                let end = flag(&flags, &["end"]);
                let break_minutes = break_flag(&flags)?;
                if start.is_none() && end.is_none() && break_minutes.is_none() {
                    bail!("entry update needs --start, --end or --break");
                }
                Command::EntryUpdate {
                    entry_id: required(second, "entry id")?,
                    start,
                    end,
                    break_minutes,
                }
            }
            Some("delete") => Command::EntryDelete {
                entry_id: required(second, "entry id")?,
            },
            Some(other) => bail!("unknown entry action '{}'", other),
            None => bail!("entry needs add, update or delete"),
        },
        "check" => Command::Check {
            period: required(flag(&flags, &["period"]), "--period")?,
            candidate: PathBuf::from(required(
                first.or_else(|| flag(&flags, &["candidate"])),
                "--candidate",
            )?),
        },
        "import" => Command::Import {
            file: PathBuf::from(required(first.or_else(|| flag(&flags, &["file"])), "--file")?),
        },
        "help" | "-h" => Command::Help,
        other => bail!("unknown command '{}'", other),
    };
    Ok(CliArgs { config, command })
}

pub async fn run_main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let parsed = match parse_args(&args) {
        Ok(parsed) => parsed,
        Err(e) => {
            terminal::print_error(&e.to_string());
            print_help();
            std::process::exit(2);
        }
    };
    if parsed.command == Command::Help {
        print_help();
        return Ok(());
    }

    let config = AppConfig::load(parsed.config.as_deref()).await?;
    crate::logging::init(&config.logging)?;
    let store = Arc::new(ShiftStore::open(&config.storage.database_path).await?);

    match parsed.command {
        Command::Generate { period, count } => {
            generate::run_generate(&config, store, &period, count).await
        }
        Command::Status { job_id, period } => {
            generate::run_status(&store, job_id.as_deref(), period.as_deref()).await
        }
        Command::Patterns { period } => patterns::run_list(&store, &period).await,
        Command::Show { pattern_id } => patterns::run_show(&store, &pattern_id).await,
        Command::Select { pattern_id } => patterns::run_select(&store, &pattern_id).await,
        Command::Finalize { pattern_id } => patterns::run_finalize(&store, &pattern_id).await,
        Command::EntryAdd {
            pattern_id,
            staff_id,
            date,
            start,
            end,
            break_minutes,
        } => {
            entries::run_add(&store, &pattern_id, &staff_id, &date, &start, &end, break_minutes)
                .await
        }
        Command::EntryUpdate {
            entry_id,
            start,
            end,
            break_minutes,
        } => {
            entries::run_update(&store, &entry_id, start.as_deref(), end.as_deref(), break_minutes)
                .await
        }
        Command::EntryDelete { entry_id } => entries::run_delete(&store, &entry_id).await,
        Command::Check { period, candidate } => {
            catalog::run_check(store, &period, &candidate).await
        }
        Command::Import { file } => catalog::run_import(&store, &file).await,
        Command::Help => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        std::iter::once("shiftgen")
            .chain(list.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn no_arguments_prints_help() {
        let parsed = parse_args(&args(&[])).unwrap();
        assert_eq!(parsed.command, Command::Help);
        assert_eq!(parsed.config, None);
    }

    #[test]
    fn generate_reads_period_and_count() {
        let parsed = parse_args(&args(&["generate", "2025-03", "--count", "2"])).unwrap();
        assert_eq!(
            parsed.command,
            Command::Generate {
                period: "2025-03".into(),
                count: Some(2)
            }
        );
    }

    #[test]
    fn generate_rejects_non_numeric_count() {
        assert!(parse_args(&args(&["generate", "2025-03", "--count", "many"])).is_err());
    }

    #[test]
    fn config_flag_can_precede_the_command() {
        let parsed = parse_args(&args(&["--config", "/etc/shiftgen.toml", "patterns", "2025-04"]))
            .unwrap();
        assert_eq!(parsed.config, Some(PathBuf::from("/etc/shiftgen.toml")));
        assert_eq!(
            parsed.command,
            Command::Patterns {
                period: "2025-04".into()
            }
        );
    }

    #[test]
    fn check_needs_period_and_candidate() {
        let parsed = parse_args(&args(&[
            "check",
            "--period",
            "2025-03",
            "--candidate",
            "c.json",
        ]))
        .unwrap();
        assert_eq!(
            parsed.command,
            Command::Check {
                period: "2025-03".into(),
                candidate: PathBuf::from("c.json")
            }
        );
        assert!(parse_args(&args(&["check", "--candidate", "c.json"])).is_err());
    }

    #[test]
    fn status_accepts_job_id_or_period() {
        let by_id = parse_args(&args(&["status", "abc"])).unwrap();
        assert_eq!(
            by_id.command,
            Command::Status {
                job_id: Some("abc".into()),
                period: None
            }
        );
        assert!(parse_args(&args(&["status"])).is_err());
    }

    #[test]
    fn entry_add_collects_shift_fields() {
        let parsed = parse_args(&args(&[
            "entry", "add", "p1", "--staff", "s1", "--date", "2025-03-04", "--start", "09:00",
            "--end", "17:00", "--break", "45",
        ]))
        .unwrap();
        assert_eq!(
            parsed.command,
            Command::EntryAdd {
                pattern_id: "p1".into(),
                staff_id: "s1".into(),
                date: "2025-03-04".into(),
                start: "09:00".into(),
                end: "17:00".into(),
                break_minutes: 45,
            }
        );
        assert!(parse_args(&args(&["entry", "add", "p1", "--staff", "s1"])).is_err());
    }

    #[test]
    fn entry_update_needs_at_least_one_change() {
        let parsed = parse_args(&args(&["entry", "update", "e1", "--end", "18:00"])).unwrap();
        assert_eq!(
            parsed.command,
            Command::EntryUpdate {
                entry_id: "e1".into(),
                start: None,
                end: Some("18:00".into()),
                break_minutes: None,
            }
        );
        assert!(parse_args(&args(&["entry", "update", "e1"])).is_err());
        assert!(parse_args(&args(&["entry", "update", "e1", "--break", "long"])).is_err());
    }

    #[test]
    fn entry_delete_and_unknown_actions() {
        assert_eq!(
            parse_args(&args(&["entry", "delete", "e1"])).unwrap().command,
            Command::EntryDelete {
                entry_id: "e1".into()
            }
        );
        assert!(parse_args(&args(&["entry", "move", "e1"])).is_err());
        assert!(parse_args(&args(&["entry"])).is_err());
    }

    #[test]
    fn dangling_flag_is_an_error() {
        assert!(parse_args(&args(&["import", "--file"])).is_err());
    }

    #[test]
    fn unknown_command_is_an_error() {
        assert!(parse_args(&args(&["explode"])).is_err());
    }
}

use std::env;
use std::path::PathBuf;
use std::process;

use chrono::Duration;
use getopts::{Matches, Options};
use tokio::time::Duration as Delay;

use crate::config::{Config, Mode};
use crate::prayer::EventStyle;

const OUTPUT_VAR: &str = "VAKTIJA_ICS_OUTPUT";
const LOCATION_VAR: &str = "VAKTIJA_ICS_LOCATION";
const API_VAR: &str = "VAKTIJA_ICS_API";

fn opts() -> Options {
    let mut opts = Options::new();
    opts.optflag(
        "h",
        "help",
        concat!("Print the help output of ", env!("CARGO_PKG_NAME")),
    );
    opts.optopt(
        "o",
        "output",
        "Calendar file to read and update [Default: Vaktija_Sarajevo.ics]",
        "PATH",
    );
    opts.optopt(
        "l",
        "location",
        "vaktija.ba location id [Default: 77 (Sarajevo)]",
        "ID",
    );
    opts.optopt(
        "",
        "api",
        "Base URL of the prayer-times API [Default: https://api.vaktija.ba/vaktija/v1]",
        "URL",
    );
    opts.optflag(
        "b",
        "bulk",
        "Fetch whole months from January this year instead of resuming day by day",
    );
    opts.optopt(
        "y",
        "years",
        "Years after the current one to fetch in bulk mode [Default: 2]",
        "YEARS",
    );
    opts.optopt(
        "",
        "horizon",
        "Days after today to fetch in incremental mode [Default: 60]",
        "DAYS",
    );
    opts.optopt(
        "s",
        "style",
        "Event style, `point` or `interval` [Default: point]",
        "STYLE",
    );
    opts.optopt(
        "d",
        "duration",
        "Length of point events [Default: 1]",
        "MINUTES",
    );
    opts.optopt(
        "",
        "delay",
        "Pause between requests [Default: 2]",
        "SECONDS",
    );
    opts
}

#[derive(Debug)]
pub enum Parsed {
    Help(String),
    Run(Config),
}

fn parse_value<T: std::str::FromStr>(matches: &Matches, name: &str, default: T) -> Result<T, String>
where
    T::Err: std::fmt::Display,
{
    matches
        .opt_get_default(name, default)
        .map_err(|err| format!("Provided value for option '{name}' is invalid: {err}"))
}

/// Builds a [`Config`] from the defaults, then the environment, then `args`
/// (without the program name).
pub fn try_parse<I>(args: I, vars: impl Fn(&str) -> Option<String>) -> Result<Parsed, String>
where
    I: IntoIterator<Item = String>,
{
    let opts = opts();
    let matches = opts.parse(args).map_err(|fail| fail.to_string())?;

    if matches.opt_present("help") {
        return Ok(Parsed::Help(
            opts.usage(&opts.short_usage(env!("CARGO_PKG_NAME"))),
        ));
    }

    let mut config = Config::default();

    if let Some(output) = vars(OUTPUT_VAR) {
        config.output = PathBuf::from(output);
    }
    if let Some(location) = vars(LOCATION_VAR) {
        config.location_id = location
            .parse()
            .map_err(|err| format!("`{LOCATION_VAR}` environment variable is invalid: {err}"))?;
    }
    if let Some(api) = vars(API_VAR) {
        config.api_base = api;
    }

    if let Some(output) = matches.opt_str("output") {
        config.output = PathBuf::from(output);
    }
    config.location_id = parse_value(&matches, "location", config.location_id)?;
    if let Some(api) = matches.opt_str("api") {
        config.api_base = api;
    }

    config.mode = if matches.opt_present("bulk") {
        Mode::Bulk {
            years_forward: parse_value(&matches, "years", 2)?,
        }
    } else {
        Mode::Incremental {
            horizon_days: parse_value(&matches, "horizon", 60)?,
        }
    };

    let minutes: u32 = parse_value(&matches, "duration", 1)?;
    if minutes == 0 {
        return Err("Provided value for option 'duration' must be at least 1".into());
    }

    config.style = match matches.opt_str("style").as_deref() {
        None | Some("point") => EventStyle::Point {
            duration: Duration::minutes(minutes.into()),
        },
        Some("interval") => EventStyle::Interval,
        Some(other) => {
            return Err(format!(
                "Provided value for option 'style' is invalid: `{other}`, expected `point` or `interval`"
            ))
        }
    };

    config.request_delay = Delay::from_secs(parse_value(&matches, "delay", 2)?);

    Ok(Parsed::Run(config))
}

pub fn parse(args: Vec<String>) -> Config {
    match try_parse(args, |name| env::var(name).ok()) {
        Ok(Parsed::Run(config)) => config,
        Ok(Parsed::Help(usage)) => {
            println!("{usage}");
            process::exit(0);
        }
        Err(err) => {
            eprintln!("{err}");
            process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(ToString::to_string).collect()
    }

    fn run(list: &[&str], vars: &[(&str, &str)]) -> Result<Config, String> {
        let vars = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<Vec<_>>();
        let lookup = |name: &str| {
            vars.iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.clone())
        };

        match try_parse(args(list), lookup)? {
            Parsed::Run(config) => Ok(config),
            Parsed::Help(_) => Err("help".into()),
        }
    }

    #[test]
    fn no_arguments_means_defaults() {
        let config = run(&[], &[]).unwrap();

        assert_eq!(config.location_id, 77);
        assert_eq!(config.output, PathBuf::from("Vaktija_Sarajevo.ics"));
        assert_eq!(config.mode, Mode::Incremental { horizon_days: 60 });
        assert_eq!(
            config.style,
            EventStyle::Point {
                duration: Duration::minutes(1)
            }
        );
        assert_eq!(config.request_delay, Delay::from_secs(2));
    }

    #[test]
    fn flags_override_environment() {
        let config = run(
            &["-o", "flag.ics", "--style", "interval", "--bulk", "-y", "1"],
            &[(OUTPUT_VAR, "env.ics"), (LOCATION_VAR, "1")],
        )
        .unwrap();

        assert_eq!(config.output, PathBuf::from("flag.ics"));
        assert_eq!(config.location_id, 1);
        assert_eq!(config.style, EventStyle::Interval);
        assert_eq!(config.mode, Mode::Bulk { years_forward: 1 });
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(run(&["--style", "blocks"], &[]).is_err());
        assert!(run(&["--delay", "soon"], &[]).is_err());
        assert!(run(&["-d", "0"], &[]).is_err());
        assert!(run(&[], &[(LOCATION_VAR, "sarajevo")]).is_err());
    }

    #[test]
    fn help_is_reported() {
        let parsed = try_parse(args(&["--help"]), |_| None).unwrap();
        assert!(matches!(parsed, Parsed::Help(usage) if usage.contains("--output")));
    }
}

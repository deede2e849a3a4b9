use std::{env, path::PathBuf};

use anyhow::{Result, anyhow};

const USAGE: &str = "usage: desire-arbiter [--config <path>]";

pub fn config_path_from_args() -> Result<PathBuf> {
    let default = env::current_dir()?.join("arbiter.jsonc");
    parse_config_path(env::args().skip(1), default)
}

fn parse_config_path<I>(mut args: I, default: PathBuf) -> Result<PathBuf>
where
    I: Iterator<Item = String>,
{
    let mut config_path = None;
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                let value = args
                    .next()
                    .ok_or_else(|| anyhow!("missing value for --config. {USAGE}"))?;
                if config_path.replace(PathBuf::from(value)).is_some() {
                    return Err(anyhow!("--config given more than once. {USAGE}"));
                }
            }
            other => return Err(anyhow!("unknown argument: {other}. {USAGE}")),
        }
    }

    Ok(config_path.unwrap_or(default))
}
